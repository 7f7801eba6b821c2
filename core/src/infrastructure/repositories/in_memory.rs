// Copyright (c) 2026 supernote-server contributors
// SPDX-License-Identifier: AGPL-3.0
//! In-memory repository implementations. Selected via
//! [`crate::domain::repository::StorageBackend::InMemory`] — used by the test
//! suite and by `supernote-server serve --storage memory` for zero-dependency
//! local trials (spec §9).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::domain::chunk::ChunkUpload;
use crate::domain::coordination::CoordinationService;
use crate::domain::error::{CoordinationError, RepositoryError};
use crate::domain::note_page::NotePage;
use crate::domain::repository::{
    ChunkRepository, NotePageRepository, SummaryRepository, SyncLeaseRepository, SystemTaskRepository, UserRepository,
    VfsRepository,
};
use crate::domain::summary::{Summary, SummaryKind, SummaryTag};
use crate::domain::system_task::{SystemTask, TaskStatus};
use crate::domain::user::{LoginRecord, User};
use crate::domain::vfs::{RecycleEntry, UserFileNode};

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: Mutex<HashMap<i64, User>>,
    logins: Mutex<Vec<LoginRecord>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        Ok(self.users.lock().values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, RepositoryError> {
        Ok(self.users.lock().get(&id).cloned())
    }

    async fn count(&self) -> Result<i64, RepositoryError> {
        Ok(self.users.lock().len() as i64)
    }

    async fn insert(&self, user: User) -> Result<User, RepositoryError> {
        self.users.lock().insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_active(&self, id: i64, is_active: bool) -> Result<(), RepositoryError> {
        if let Some(user) = self.users.lock().get_mut(&id) {
            user.is_active = is_active;
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<User>, RepositoryError> {
        let mut users: Vec<User> = self.users.lock().values().cloned().collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    async fn insert_login_record(&self, record: LoginRecord) -> Result<(), RepositoryError> {
        self.logins.lock().push(record);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryVfsRepository {
    nodes: Mutex<HashMap<i64, UserFileNode>>,
    recycle: Mutex<HashMap<i64, RecycleEntry>>,
}

impl InMemoryVfsRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn descendants_of(nodes: &HashMap<i64, UserFileNode>, user_id: i64, root: i64) -> Vec<UserFileNode> {
        let mut out = Vec::new();
        let mut frontier = vec![root];
        while let Some(parent) = frontier.pop() {
            for node in nodes.values() {
                if node.user_id == user_id && node.parent_id == parent && node.is_active {
                    frontier.push(node.id);
                    out.push(node.clone());
                }
            }
        }
        out
    }
}

#[async_trait]
impl VfsRepository for InMemoryVfsRepository {
    async fn insert_node(&self, node: UserFileNode) -> Result<UserFileNode, RepositoryError> {
        self.nodes.lock().insert(node.id, node.clone());
        Ok(node)
    }

    async fn update_node(&self, node: UserFileNode) -> Result<UserFileNode, RepositoryError> {
        self.nodes.lock().insert(node.id, node.clone());
        Ok(node)
    }

    async fn find_by_id(&self, user_id: i64, id: i64) -> Result<Option<UserFileNode>, RepositoryError> {
        Ok(self.nodes.lock().get(&id).filter(|n| n.user_id == user_id && n.is_active).cloned())
    }

    async fn find_owner(&self, id: i64) -> Result<Option<i64>, RepositoryError> {
        Ok(self.nodes.lock().get(&id).map(|n| n.user_id))
    }

    async fn find_by_parent_and_name(
        &self,
        user_id: i64,
        parent_id: i64,
        name: &str,
    ) -> Result<Option<UserFileNode>, RepositoryError> {
        Ok(self
            .nodes
            .lock()
            .values()
            .find(|n| n.user_id == user_id && n.parent_id == parent_id && n.name == name && n.is_active)
            .cloned())
    }

    async fn list_children(&self, user_id: i64, parent_id: i64) -> Result<Vec<UserFileNode>, RepositoryError> {
        let mut children: Vec<UserFileNode> = self
            .nodes
            .lock()
            .values()
            .filter(|n| n.user_id == user_id && n.parent_id == parent_id && n.is_active)
            .cloned()
            .collect();
        children.sort_by_key(|n| n.id);
        Ok(children)
    }

    async fn list_descendants(&self, user_id: i64, parent_id: i64) -> Result<Vec<UserFileNode>, RepositoryError> {
        let nodes = self.nodes.lock();
        Ok(Self::descendants_of(&nodes, user_id, parent_id))
    }

    async fn search(&self, user_id: i64, keyword: &str) -> Result<Vec<UserFileNode>, RepositoryError> {
        let keyword = keyword.to_lowercase();
        let mut matches: Vec<UserFileNode> = self
            .nodes
            .lock()
            .values()
            .filter(|n| n.user_id == user_id && n.is_active && n.name.to_lowercase().contains(&keyword))
            .cloned()
            .collect();
        matches.sort_by_key(|n| n.id);
        Ok(matches)
    }

    async fn deactivate_subtree(&self, user_id: i64, root_id: i64) -> Result<Vec<UserFileNode>, RepositoryError> {
        let mut nodes = self.nodes.lock();
        let mut subtree = vec![root_id];
        subtree.extend(Self::descendants_of(&nodes, user_id, root_id).iter().map(|n| n.id));
        let mut affected = Vec::new();
        for id in subtree {
            if let Some(node) = nodes.get_mut(&id) {
                node.is_active = false;
                affected.push(node.clone());
            }
        }
        Ok(affected)
    }

    async fn reactivate_subtree(&self, user_id: i64, root_id: i64) -> Result<Vec<UserFileNode>, RepositoryError> {
        let mut nodes = self.nodes.lock();
        if let Some(root) = nodes.get_mut(&root_id) {
            root.is_active = true;
        }
        let owned_ids: Vec<i64> = nodes.values().filter(|n| n.user_id == user_id).map(|n| n.id).collect();

        // Fixed-point walk: a descendant reactivates once its parent is
        // active, regardless of the order nodes are visited in.
        let mut affected = Vec::new();
        let mut changed = true;
        while changed {
            changed = false;
            for &id in &owned_ids {
                let parent_id = match nodes.get(&id) {
                    Some(node) if !node.is_active => node.parent_id,
                    _ => continue,
                };
                let parent_active = parent_id == root_id || nodes.get(&parent_id).map(|p| p.is_active).unwrap_or(false);
                if parent_active {
                    let node = nodes.get_mut(&id).expect("id came from this map");
                    node.is_active = true;
                    affected.push(node.clone());
                    changed = true;
                }
            }
        }
        Ok(affected)
    }

    async fn count_active_files(&self, user_id: i64) -> Result<i64, RepositoryError> {
        Ok(self
            .nodes
            .lock()
            .values()
            .filter(|n| n.user_id == user_id && n.is_active && !n.is_folder)
            .count() as i64)
    }

    async fn sum_active_size(&self, user_id: i64) -> Result<i64, RepositoryError> {
        Ok(self
            .nodes
            .lock()
            .values()
            .filter(|n| n.user_id == user_id && n.is_active && !n.is_folder)
            .map(|n| n.size)
            .sum())
    }

    async fn list_active_files(&self, user_id: i64) -> Result<Vec<UserFileNode>, RepositoryError> {
        Ok(self
            .nodes
            .lock()
            .values()
            .filter(|n| n.user_id == user_id && n.is_active && !n.is_folder)
            .cloned()
            .collect())
    }

    async fn insert_recycle_entry(&self, entry: RecycleEntry) -> Result<RecycleEntry, RepositoryError> {
        self.recycle.lock().insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn find_recycle_entry(&self, user_id: i64, id: i64) -> Result<Option<RecycleEntry>, RepositoryError> {
        Ok(self.recycle.lock().get(&id).filter(|e| e.user_id == user_id).cloned())
    }

    async fn list_recycle_entries(&self, user_id: i64) -> Result<Vec<RecycleEntry>, RepositoryError> {
        let mut entries: Vec<RecycleEntry> = self.recycle.lock().values().filter(|e| e.user_id == user_id).cloned().collect();
        entries.sort_by_key(|e| e.id);
        Ok(entries)
    }

    async fn delete_recycle_entry(&self, user_id: i64, id: i64) -> Result<(), RepositoryError> {
        let mut recycle = self.recycle.lock();
        if recycle.get(&id).map(|e| e.user_id) == Some(user_id) {
            recycle.remove(&id);
        }
        Ok(())
    }

    async fn clear_recycle_entries(&self, user_id: i64) -> Result<(), RepositoryError> {
        self.recycle.lock().retain(|_, e| e.user_id != user_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryChunkRepository {
    uploads: Mutex<HashMap<(i64, String), ChunkUpload>>,
}

impl InMemoryChunkRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChunkRepository for InMemoryChunkRepository {
    async fn get(&self, user_id: i64, upload_id: &str) -> Result<Option<ChunkUpload>, RepositoryError> {
        Ok(self.uploads.lock().get(&(user_id, upload_id.to_string())).cloned())
    }

    async fn put(&self, upload: ChunkUpload) -> Result<(), RepositoryError> {
        self.uploads.lock().insert((upload.user_id, upload.upload_id.clone()), upload);
        Ok(())
    }

    async fn delete(&self, user_id: i64, upload_id: &str) -> Result<(), RepositoryError> {
        self.uploads.lock().remove(&(user_id, upload_id.to_string()));
        Ok(())
    }
}

/// In-memory note page store. `index_file` is a test-only seam that lets
/// callers register the `(user_id, name)` a `file_id` belongs to, since
/// `search_candidates`' name filter joins against the owning file node and
/// `NotePage` itself carries no user or name (spec §4.8).
#[derive(Default)]
pub struct InMemoryNotePageRepository {
    pages: Mutex<HashMap<(i64, String), NotePage>>,
    file_index: Mutex<HashMap<i64, (i64, String)>>,
}

impl InMemoryNotePageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index_file(&self, file_id: i64, user_id: i64, name: impl Into<String>) {
        self.file_index.lock().insert(file_id, (user_id, name.into()));
    }
}

#[async_trait]
impl NotePageRepository for InMemoryNotePageRepository {
    async fn upsert(&self, page: NotePage) -> Result<(), RepositoryError> {
        self.pages.lock().insert((page.file_id, page.page_id.clone()), page);
        Ok(())
    }

    async fn find(&self, file_id: i64, page_id: &str) -> Result<Option<NotePage>, RepositoryError> {
        Ok(self.pages.lock().get(&(file_id, page_id.to_string())).cloned())
    }

    async fn list_for_file(&self, file_id: i64) -> Result<Vec<NotePage>, RepositoryError> {
        let mut pages: Vec<NotePage> = self.pages.lock().values().filter(|p| p.file_id == file_id).cloned().collect();
        pages.sort_by_key(|p| p.page_index);
        Ok(pages)
    }

    async fn delete(&self, file_id: i64, page_id: &str) -> Result<(), RepositoryError> {
        self.pages.lock().remove(&(file_id, page_id.to_string()));
        Ok(())
    }

    async fn delete_for_file(&self, file_id: i64) -> Result<(), RepositoryError> {
        self.pages.lock().retain(|_, p| p.file_id != file_id);
        Ok(())
    }

    async fn clear_content(&self, file_id: i64, page_id: &str) -> Result<(), RepositoryError> {
        if let Some(page) = self.pages.lock().get_mut(&(file_id, page_id.to_string())) {
            page.text_content = None;
            page.embedding = None;
        }
        Ok(())
    }

    async fn search_candidates(
        &self,
        user_id: i64,
        name_filter: Option<&str>,
    ) -> Result<Vec<(NotePage, String)>, RepositoryError> {
        let index = self.file_index.lock();
        let name_filter = name_filter.map(|f| f.to_lowercase());
        let mut out = Vec::new();
        for page in self.pages.lock().values() {
            if page.embedding.is_none() {
                continue;
            }
            let Some((owner, name)) = index.get(&page.file_id) else { continue };
            if *owner != user_id {
                continue;
            }
            if let Some(filter) = &name_filter {
                if !name.to_lowercase().contains(filter) {
                    continue;
                }
            }
            out.push((page.clone(), name.clone()));
        }
        Ok(out)
    }
}

#[derive(Default)]
pub struct InMemorySystemTaskRepository {
    tasks: Mutex<HashMap<(i64, String, String), SystemTask>>,
}

impl InMemorySystemTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SystemTaskRepository for InMemorySystemTaskRepository {
    async fn upsert(&self, task: SystemTask) -> Result<(), RepositoryError> {
        self.tasks
            .lock()
            .insert((task.file_id, task.task_type.clone(), task.key.clone()), task);
        Ok(())
    }

    async fn find(&self, file_id: i64, task_type: &str, key: &str) -> Result<Option<SystemTask>, RepositoryError> {
        Ok(self.tasks.lock().get(&(file_id, task_type.to_string(), key.to_string())).cloned())
    }

    async fn delete(&self, file_id: i64, task_type: &str, key: &str) -> Result<(), RepositoryError> {
        self.tasks.lock().remove(&(file_id, task_type.to_string(), key.to_string()));
        Ok(())
    }

    async fn delete_for_file(&self, file_id: i64) -> Result<(), RepositoryError> {
        self.tasks.lock().retain(|_, t| t.file_id != file_id);
        Ok(())
    }

    async fn list_incomplete(&self) -> Result<Vec<SystemTask>, RepositoryError> {
        Ok(self
            .tasks
            .lock()
            .values()
            .filter(|t| t.status != TaskStatus::Completed)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemorySummaryRepository {
    summaries: Mutex<HashMap<Uuid, Summary>>,
    tags: Mutex<Vec<SummaryTag>>,
}

impl InMemorySummaryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SummaryRepository for InMemorySummaryRepository {
    async fn upsert(&self, summary: Summary) -> Result<(), RepositoryError> {
        self.summaries.lock().insert(summary.id, summary);
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Summary>, RepositoryError> {
        Ok(self.summaries.lock().get(&id).cloned())
    }

    async fn list_for_file(&self, file_id: i64, kind: SummaryKind) -> Result<Vec<Summary>, RepositoryError> {
        Ok(self
            .summaries
            .lock()
            .values()
            .filter(|s| s.file_id == file_id && s.kind == kind)
            .cloned()
            .collect())
    }

    async fn add_tag(&self, tag: SummaryTag) -> Result<(), RepositoryError> {
        self.tags.lock().push(tag);
        Ok(())
    }

    async fn search_by_tag(&self, user_id: i64, keyword: &str) -> Result<Vec<Summary>, RepositoryError> {
        let keyword = keyword.to_lowercase();
        let matching_ids: Vec<Uuid> = self
            .tags
            .lock()
            .iter()
            .filter(|t| t.tag.to_lowercase().contains(&keyword))
            .map(|t| t.summary_id)
            .collect();
        Ok(self
            .summaries
            .lock()
            .values()
            .filter(|s| s.user_id == user_id && matching_ids.contains(&s.id))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemorySyncLeaseRepository {
    leases: Mutex<HashMap<String, (String, DateTime<Utc>)>>,
}

impl InMemorySyncLeaseRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SyncLeaseRepository for InMemorySyncLeaseRepository {
    async fn get(&self, user_email: &str) -> Result<Option<(String, DateTime<Utc>)>, RepositoryError> {
        Ok(self.leases.lock().get(user_email).cloned())
    }

    async fn set(&self, user_email: &str, equipment_no: &str, expires_at: DateTime<Utc>) -> Result<(), RepositoryError> {
        self.leases.lock().insert(user_email.to_string(), (equipment_no.to_string(), expires_at));
        Ok(())
    }

    async fn clear(&self, user_email: &str) -> Result<(), RepositoryError> {
        self.leases.lock().remove(user_email);
        Ok(())
    }
}

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self) -> bool {
        self.expires_at.map(|at| Instant::now() >= at).unwrap_or(false)
    }
}

/// In-memory KV store backing [`CoordinationService`]. TTLs are tracked with
/// [`Instant`] rather than wall-clock time, matching the single-process
/// scope this backend is meant for (spec §9).
#[derive(Default)]
pub struct InMemoryCoordinationService {
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemoryCoordinationService {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CoordinationService for InMemoryCoordinationService {
    async fn set_value(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CoordinationError> {
        self.entries.lock().insert(
            key.to_string(),
            Entry { value: value.to_string(), expires_at: ttl.map(|d| Instant::now() + d) },
        );
        Ok(())
    }

    async fn get_value(&self, key: &str) -> Result<Option<String>, CoordinationError> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.is_expired() => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn delete_value(&self, key: &str) -> Result<(), CoordinationError> {
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn pop_value(&self, key: &str) -> Result<Option<String>, CoordinationError> {
        let entry = self.entries.lock().remove(key);
        match entry {
            Some(entry) if !entry.is_expired() => Ok(Some(entry.value)),
            _ => Ok(None),
        }
    }

    async fn increment(&self, key: &str, ttl: Option<Duration>) -> Result<i64, CoordinationError> {
        let mut entries = self.entries.lock();
        let current = match entries.get(key) {
            Some(entry) if !entry.is_expired() => entry.value.parse::<i64>().unwrap_or(0),
            _ => 0,
        };
        let next = current + 1;
        entries.insert(
            key.to_string(),
            Entry { value: next.to_string(), expires_at: ttl.map(|d| Instant::now() + d) },
        );
        Ok(next)
    }

    async fn acquire_lock(&self, key: &str, holder: &str, ttl: Duration) -> Result<bool, CoordinationError> {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get(key) {
            if !entry.is_expired() && entry.value != holder {
                return Ok(false);
            }
        }
        entries.insert(
            key.to_string(),
            Entry { value: holder.to_string(), expires_at: Some(Instant::now() + ttl) },
        );
        Ok(true)
    }

    async fn release_lock(&self, key: &str, holder: &str) -> Result<(), CoordinationError> {
        let mut entries = self.entries.lock();
        if entries.get(key).map(|e| e.value.as_str()) == Some(holder) {
            entries.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn coordination_pop_is_single_use() {
        let service = InMemoryCoordinationService::new();
        service.set_value("k", "v", None).await.unwrap();
        assert_eq!(service.pop_value("k").await.unwrap(), Some("v".to_string()));
        assert_eq!(service.pop_value("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn coordination_lock_excludes_other_holders() {
        let service = InMemoryCoordinationService::new();
        assert!(service.acquire_lock("lock", "a", Duration::from_secs(60)).await.unwrap());
        assert!(!service.acquire_lock("lock", "b", Duration::from_secs(60)).await.unwrap());
        service.release_lock("lock", "a").await.unwrap();
        assert!(service.acquire_lock("lock", "b", Duration::from_secs(60)).await.unwrap());
    }

    #[tokio::test]
    async fn vfs_deactivate_and_reactivate_subtree_round_trip() {
        let repo = InMemoryVfsRepository::new();
        let now = Utc::now();
        let root = UserFileNode {
            id: 1,
            user_id: 1,
            parent_id: 0,
            name: "Folder".to_string(),
            is_folder: true,
            size: 0,
            md5: None,
            storage_key: None,
            is_active: true,
            create_time: now,
            update_time: now,
        };
        let mut child = root.clone();
        child.id = 2;
        child.parent_id = 1;
        child.name = "child.note".to_string();
        child.is_folder = false;
        repo.insert_node(root).await.unwrap();
        repo.insert_node(child).await.unwrap();

        let deactivated = repo.deactivate_subtree(1, 1).await.unwrap();
        assert_eq!(deactivated.len(), 2);
        assert!(repo.find_by_id(1, 2).await.unwrap().is_none());

        let reactivated = repo.reactivate_subtree(1, 1).await.unwrap();
        assert_eq!(reactivated.len(), 2);
        assert!(repo.find_by_id(1, 2).await.unwrap().is_some());
    }
}
