// Copyright (c) 2026 supernote-server contributors
// SPDX-License-Identifier: AGPL-3.0
//! VFS application service: ownership-checked node CRUD, path/ID resolution,
//! recursive ops, recycle bin, search, flattened-category view, autorename,
//! cyclic-move detection (spec §4.1).

use chrono::Utc;
use std::sync::Arc;

use crate::application::ids::SnowflakeGenerator;
use crate::domain::error::VfsError;
use crate::domain::repository::VfsRepository;
use crate::domain::user::User;
use crate::domain::vfs::{flatten_segments, is_category_container, is_system_directory, PathInfo, RecycleEntry, UserFileNode};

pub struct VfsService {
    repo: Arc<dyn VfsRepository>,
    ids: Arc<SnowflakeGenerator>,
}

impl VfsService {
    pub fn new(repo: Arc<dyn VfsRepository>, ids: Arc<SnowflakeGenerator>) -> Self {
        Self { repo, ids }
    }

    pub async fn get_node_by_id(&self, user: &User, id: i64) -> Result<UserFileNode, VfsError> {
        self.repo
            .find_by_id(user.id, id)
            .await?
            .ok_or(VfsError::NotFound)
    }

    pub async fn list_directory(&self, user: &User, parent: i64) -> Result<Vec<UserFileNode>, VfsError> {
        Ok(self.repo.list_children(user.id, parent).await?)
    }

    pub async fn list_recursive(&self, user: &User, parent: i64) -> Result<Vec<(UserFileNode, String)>, VfsError> {
        let nodes = self.repo.list_descendants(user.id, parent).await?;
        let mut by_id = std::collections::HashMap::new();
        for n in &nodes {
            by_id.insert(n.id, n.clone());
        }
        let mut out = Vec::with_capacity(nodes.len());
        for n in &nodes {
            let mut segments = vec![n.name.clone()];
            let mut cursor = n.parent_id;
            while cursor != parent && cursor != 0 {
                match by_id.get(&cursor) {
                    Some(p) => {
                        segments.push(p.name.clone());
                        cursor = p.parent_id;
                    }
                    None => break,
                }
            }
            segments.reverse();
            out.push((n.clone(), segments.join("/")));
        }
        Ok(out)
    }

    pub async fn search_files(&self, user: &User, keyword: &str) -> Result<Vec<UserFileNode>, VfsError> {
        Ok(self.repo.search(user.id, keyword).await?)
    }

    /// Web-view listing (spec §4.1: "List ... always flatten in web-API
    /// callers"). Identical to [`Self::list_directory`] except that, at the
    /// root, category containers are replaced by their own children so the
    /// container names never appear in the flattened view; listing inside a
    /// container directly (or anywhere below root) is unaffected since
    /// containers only ever live at the root.
    pub async fn list_directory_flattened(&self, user: &User, parent: i64) -> Result<Vec<UserFileNode>, VfsError> {
        let children = self.repo.list_children(user.id, parent).await?;
        if parent != 0 {
            return Ok(children);
        }
        let mut out = Vec::with_capacity(children.len());
        for child in children {
            if child.is_folder && is_category_container(&child.name) {
                out.extend(self.repo.list_children(user.id, child.id).await?);
            } else {
                out.push(child);
            }
        }
        Ok(out)
    }

    pub async fn find_child(&self, user: &User, parent: i64, name: &str) -> Result<Option<UserFileNode>, VfsError> {
        Ok(self.repo.find_by_parent_and_name(user.id, parent, name).await?)
    }

    /// Persists an already-constructed node unchanged, bypassing the
    /// name-collision policy. Used by `FileService` when overwriting an
    /// existing sibling in place (spec §4.5 point 4).
    pub async fn save_node(&self, node: UserFileNode) -> Result<UserFileNode, VfsError> {
        Ok(self.repo.update_node(node).await?)
    }

    pub async fn sum_active_size(&self, user: &User) -> Result<i64, VfsError> {
        Ok(self.repo.sum_active_size(user.id).await?)
    }

    pub async fn create_directory(
        &self,
        user: &User,
        parent: i64,
        name: &str,
        autorename: bool,
    ) -> Result<UserFileNode, VfsError> {
        self.create_node(user, parent, name, true, 0, None, None, autorename).await
    }

    pub async fn create_file(
        &self,
        user: &User,
        parent: i64,
        name: &str,
        size: i64,
        md5: String,
        storage_key: String,
        autorename: bool,
    ) -> Result<UserFileNode, VfsError> {
        self.create_node(user, parent, name, false, size, Some(md5), Some(storage_key), autorename)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn create_node(
        &self,
        user: &User,
        parent: i64,
        name: &str,
        is_folder: bool,
        size: i64,
        md5: Option<String>,
        storage_key: Option<String>,
        autorename: bool,
    ) -> Result<UserFileNode, VfsError> {
        let final_name = self.resolve_name_collision(user, parent, name, autorename).await?;
        let now = Utc::now();
        let node = UserFileNode {
            id: self.ids.next_id(),
            user_id: user.id,
            parent_id: parent,
            name: final_name,
            is_folder,
            size,
            md5,
            storage_key,
            is_active: true,
            create_time: now,
            update_time: now,
        };
        Ok(self.repo.insert_node(node).await?)
    }

    /// Applies the create/move/copy name-collision policy: autorename finds
    /// the smallest `(N)` suffix that yields a free sibling name; otherwise
    /// a collision is a `CONFLICT`.
    async fn resolve_name_collision(
        &self,
        user: &User,
        parent: i64,
        name: &str,
        autorename: bool,
    ) -> Result<String, VfsError> {
        let existing = self.repo.find_by_parent_and_name(user.id, parent, name).await?;
        if existing.is_none() {
            return Ok(name.to_string());
        }
        if !autorename {
            return Err(VfsError::Conflict(name.to_string()));
        }
        let (stem, ext) = split_extension(name);
        let mut n: u32 = 1;
        loop {
            let candidate = match &ext {
                Some(ext) => format!("{stem}({n}).{ext}"),
                None => format!("{stem}({n})"),
            };
            if self.repo.find_by_parent_and_name(user.id, parent, &candidate).await?.is_none() {
                return Ok(candidate);
            }
            n += 1;
        }
    }

    pub async fn ensure_directory_path(&self, user: &User, path: &str) -> Result<i64, VfsError> {
        let mut parent = 0i64;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let node = match self.repo.find_by_parent_and_name(user.id, parent, segment).await? {
                Some(existing) => existing,
                None => self.create_directory(user, parent, segment, false).await?,
            };
            if !node.is_folder {
                return Err(VfsError::NotAFolder);
            }
            parent = node.id;
        }
        Ok(parent)
    }

    pub async fn resolve_path(&self, user: &User, path: &str) -> Result<Option<UserFileNode>, VfsError> {
        let mut parent = 0i64;
        let mut node = None;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            match self.repo.find_by_parent_and_name(user.id, parent, segment).await? {
                Some(found) => {
                    parent = found.id;
                    node = Some(found);
                }
                None => return Ok(None),
            }
        }
        Ok(node)
    }

    pub async fn delete_node(&self, user: &User, id: i64) -> Result<RecycleEntry, VfsError> {
        let node = self.get_node_by_id(user, id).await?;
        if node.is_folder && is_system_directory(&node.name) && node.parent_id == 0 {
            return Err(VfsError::SystemDirectory);
        }
        self.repo.deactivate_subtree(user.id, id).await?;
        let entry = RecycleEntry {
            id: self.ids.next_id(),
            user_id: user.id,
            node_id: node.id,
            name: node.name.clone(),
            is_folder: node.is_folder,
            size: node.size,
            delete_time: Utc::now(),
            original_parent_id: node.parent_id,
        };
        Ok(self.repo.insert_recycle_entry(entry).await?)
    }

    pub async fn restore(&self, user: &User, recycle_id: i64) -> Result<UserFileNode, VfsError> {
        let entry = self
            .repo
            .find_recycle_entry(user.id, recycle_id)
            .await?
            .ok_or(VfsError::NotFound)?;
        self.repo.reactivate_subtree(user.id, entry.node_id).await?;
        self.repo.delete_recycle_entry(user.id, recycle_id).await?;
        self.repo
            .find_by_id(user.id, entry.node_id)
            .await?
            .ok_or(VfsError::NotFound)
    }

    pub async fn purge_recycle(&self, user: &User, ids: Option<Vec<i64>>) -> Result<(), VfsError> {
        match ids {
            Some(ids) => {
                for id in ids {
                    self.repo.delete_recycle_entry(user.id, id).await?;
                }
                Ok(())
            }
            None => Ok(self.repo.clear_recycle_entries(user.id).await?),
        }
    }

    pub async fn list_recycle(&self, user: &User) -> Result<Vec<RecycleEntry>, VfsError> {
        Ok(self.repo.list_recycle_entries(user.id).await?)
    }

    pub async fn move_node(
        &self,
        user: &User,
        id: i64,
        new_parent: i64,
        new_name: &str,
        autorename: bool,
    ) -> Result<UserFileNode, VfsError> {
        let mut node = self.get_node_by_id(user, id).await?;
        if is_system_directory(&node.name) && node.parent_id == 0 {
            return Err(VfsError::SystemDirectory);
        }
        if node.is_folder {
            self.reject_if_cyclic(user, &node, new_parent).await?;
        }
        let final_name = self.resolve_name_collision(user, new_parent, new_name, autorename).await?;
        node.parent_id = new_parent;
        node.name = final_name;
        node.update_time = Utc::now();
        Ok(self.repo.update_node(node).await?)
    }

    /// Walks up from `candidate_parent` toward the root; if `moved.id` is
    /// encountered, the destination is inside the moved subtree (spec §4.1,
    /// §9: "move-cycle detection walks up from the candidate destination
    /// parent and rejects if the moved node is encountered").
    async fn reject_if_cyclic(&self, user: &User, moved: &UserFileNode, candidate_parent: i64) -> Result<(), VfsError> {
        let mut cursor = candidate_parent;
        loop {
            if cursor == moved.id {
                return Err(VfsError::Cyclic(format!(
                    "cannot move '{}' into its own descendant",
                    moved.name
                )));
            }
            if cursor == 0 {
                return Ok(());
            }
            match self.repo.find_by_id(user.id, cursor).await? {
                Some(ancestor) => cursor = ancestor.parent_id,
                None => return Ok(()),
            }
        }
    }

    pub async fn copy_node(
        &self,
        user: &User,
        id: i64,
        new_parent: i64,
        new_name: &str,
        autorename: bool,
    ) -> Result<UserFileNode, VfsError> {
        let source = self.get_node_by_id(user, id).await?;
        self.copy_recursive(user, &source, new_parent, new_name, autorename).await
    }

    fn copy_recursive<'a>(
        &'a self,
        user: &'a User,
        source: &'a UserFileNode,
        new_parent: i64,
        new_name: &'a str,
        autorename: bool,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<UserFileNode, VfsError>> + 'a>> {
        Box::pin(async move {
            let copy = if source.is_folder {
                self.create_directory(user, new_parent, new_name, autorename).await?
            } else {
                self.create_file(
                    user,
                    new_parent,
                    new_name,
                    source.size,
                    source.md5.clone().unwrap_or_default(),
                    source.storage_key.clone().unwrap_or_default(),
                    autorename,
                )
                .await?
            };
            if source.is_folder {
                let children = self.repo.list_children(user.id, source.id).await?;
                for child in children {
                    self.copy_recursive(user, &child, copy.id, &child.name, false).await?;
                }
            }
            Ok(copy)
        })
    }

    /// Builds the human-readable path and parallel id chain from root to
    /// `id`; when `flatten` is set, a leading category-container segment is
    /// stripped per spec §4.1.
    pub async fn get_path_info(&self, user: &User, id: i64, flatten: bool) -> Result<PathInfo, VfsError> {
        let mut names = Vec::new();
        let mut ids = Vec::new();
        let mut cursor = id;
        loop {
            let node = self.repo.find_by_id(user.id, cursor).await?.ok_or(VfsError::NotFound)?;
            names.push(node.name.clone());
            ids.push(node.id);
            if node.parent_id == 0 {
                break;
            }
            cursor = node.parent_id;
        }
        names.reverse();
        ids.reverse();
        let stripped = if flatten && !names.is_empty() && is_category_prefix(&names) {
            ids.remove(0);
            flatten_segments(&names)
        } else {
            names
        };
        Ok(PathInfo {
            path: format!("/{}", stripped.join("/")),
            id_path: ids,
        })
    }
}

fn is_category_prefix(names: &[String]) -> bool {
    flatten_segments(names).len() < names.len()
}

/// Splits `"name.ext"` into `(stem, Some(ext))`, or `(name, None)` if there
/// is no extension (hidden dotfiles with no further dot are treated as
/// extensionless).
fn split_extension(name: &str) -> (String, Option<String>) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => (name[..idx].to_string(), Some(name[idx + 1..].to_string())),
        _ => (name.to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_extension() {
        assert_eq!(split_extension("Item.note"), ("Item".to_string(), Some("note".to_string())));
        assert_eq!(split_extension("Item"), ("Item".to_string(), None));
        assert_eq!(split_extension(".hidden"), (".hidden".to_string(), None));
    }
}
