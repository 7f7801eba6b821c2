// Copyright (c) 2026 supernote-server contributors
// SPDX-License-Identifier: AGPL-3.0
//! FileService: orchestrates VFS + BlobStore + ChunkStore + UrlSigner (spec
//! §4.5). Upload apply/finish, download resolve, move/copy/delete, recycle
//! ops, usage accounting.

use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;

use crate::application::chunk_store::new_inner_name;
use crate::application::event_bus::EventBus;
use crate::application::url_signer::UrlSigner;
use crate::application::vfs_service::VfsService;
use crate::domain::blob::{BlobStore, Bucket};
use crate::domain::error::{StorageError, VfsError};
use crate::domain::user::User;
use crate::domain::vfs::UserFileNode;

const NOTEBOOK_EXTENSION: &str = ".note";
const DEFAULT_TOTAL_CAPACITY: i64 = 25_485_312_000;

#[derive(Debug, Error)]
pub enum FileServiceError {
    #[error(transparent)]
    Vfs(#[from] VfsError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub struct UploadApply {
    pub inner_name: String,
    pub full_upload_url: String,
    pub part_upload_url: String,
}

pub struct FileService {
    vfs: Arc<VfsService>,
    blobs: Arc<dyn BlobStore>,
    signer: Arc<UrlSigner>,
    events: Arc<EventBus>,
}

impl FileService {
    pub fn new(vfs: Arc<VfsService>, blobs: Arc<dyn BlobStore>, signer: Arc<UrlSigner>, events: Arc<EventBus>) -> Self {
        Self { vfs, blobs, signer, events }
    }

    /// Mints a fresh opaque storage key and pre-signs the two URLs the
    /// device uploads through (spec §4.5).
    pub async fn upload_apply(&self, user: &User, file_name: &str) -> Result<UploadApply, FileServiceError> {
        let inner_name = new_inner_name(file_name);
        let full_upload_url = format!(
            "/api/oss/upload?object_name={inner_name}&{}",
            self.sign("/api/oss/upload", user).await?
        );
        let part_upload_url = format!(
            "/api/oss/upload/part?object_name={inner_name}&{}",
            self.sign("/api/oss/upload/part", user).await?
        );
        Ok(UploadApply { inner_name, full_upload_url, part_upload_url })
    }

    async fn sign(&self, path: &str, user: &User) -> Result<String, FileServiceError> {
        self.signer
            .sign(path, &user.email)
            .await
            .map_err(|e| StorageError::Io(e.to_string()).into())
    }

    /// Completes an upload: verifies the staged blob, optionally checks its
    /// hash, ensures the destination directory exists, replaces any
    /// same-name sibling in place, creates the file node, and publishes
    /// `NoteUpdated` for notebook files (spec §4.5).
    pub async fn finish_upload(
        &self,
        user: &User,
        file_name: &str,
        path: &str,
        content_hash: Option<&str>,
        inner_name: &str,
    ) -> Result<UserFileNode, FileServiceError> {
        if !self.blobs.exists(Bucket::UserData, inner_name).await? {
            return Err(StorageError::NotFound(inner_name.to_string()).into());
        }
        let size = self.blobs.get_size(Bucket::UserData, inner_name).await?;
        let bytes = self.blobs.get(Bucket::UserData, inner_name).await?;
        let computed_md5 = compute_md5_hex(&bytes);
        if let Some(expected) = content_hash {
            if computed_md5 != expected {
                return Err(StorageError::HashMismatch.into());
            }
        }

        let parent = self.vfs.ensure_directory_path(user, path).await?;
        let node = self
            .upsert_file_node(user, parent, file_name, size as i64, computed_md5, inner_name.to_string())
            .await?;

        if file_name.ends_with(NOTEBOOK_EXTENSION) {
            let path_info = self.vfs.get_path_info(user, node.id, false).await?;
            self.events.publish_note_updated(user.id, node.id, path_info.path);
        }

        Ok(node)
    }

    async fn upsert_file_node(
        &self,
        user: &User,
        parent: i64,
        name: &str,
        size: i64,
        md5: String,
        storage_key: String,
    ) -> Result<UserFileNode, FileServiceError> {
        // Same-user same-name overwrite replaces the target node in place
        // (spec §4.5 point 4); the orphaned blob is not eagerly collected.
        if let Some(mut node) = self.vfs.find_child(user, parent, name).await? {
            node.size = size;
            node.md5 = Some(md5);
            node.storage_key = Some(storage_key);
            node.update_time = Utc::now();
            return Ok(self.vfs.save_node(node).await?);
        }
        Ok(self.vfs.create_file(user, parent, name, size, md5, storage_key, false).await?)
    }

    pub async fn delete(&self, user: &User, id: i64) -> Result<(), FileServiceError> {
        let node = self.vfs.get_node_by_id(user, id).await?;
        self.vfs.delete_node(user, id).await?;
        if !node.is_folder {
            self.events.publish_note_deleted(user.id, node.id);
        }
        Ok(())
    }

    pub async fn download_url(&self, user: &User, node: &UserFileNode) -> Result<String, FileServiceError> {
        let query = self.sign("/api/oss/download", user).await?;
        Ok(format!("/api/oss/download?id={}&{query}", node.id))
    }

    /// Returns `(used, allocated)` bytes for the space-usage endpoints.
    pub async fn get_space_usage(&self, user: &User) -> Result<(i64, i64), FileServiceError> {
        let used = self.vfs.sum_active_size(user).await?;
        Ok((used, DEFAULT_TOTAL_CAPACITY))
    }
}

fn compute_md5_hex(bytes: &[u8]) -> String {
    use md5::{Digest, Md5};
    let mut hasher = Md5::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ids::SnowflakeGenerator;
    use crate::domain::coordination::CoordinationService;
    use crate::domain::repository::VfsRepository;
    use crate::infrastructure::repositories::in_memory::{InMemoryCoordinationService, InMemoryVfsRepository};
    use crate::infrastructure::storage::local::LocalBlobStore;
    use tempfile::TempDir;

    async fn service() -> (FileService, Arc<UrlSigner>, User) {
        let dir = TempDir::new().unwrap();
        let ids = Arc::new(SnowflakeGenerator::new(1));
        let vfs_repo: Arc<dyn VfsRepository> = Arc::new(InMemoryVfsRepository::new());
        let vfs = Arc::new(VfsService::new(vfs_repo, ids.clone()));
        let blobs: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(dir.path()).await.unwrap());
        let coordination: Arc<dyn CoordinationService> = Arc::new(InMemoryCoordinationService::new());
        let signer = Arc::new(UrlSigner::new(b"secret".to_vec(), std::time::Duration::from_secs(900), coordination));
        let events = Arc::new(EventBus::with_default_capacity());
        let user = User::new(ids.next_id(), "alice@example.com".to_string(), "hash".to_string(), "Alice".to_string(), false);
        let file_service = FileService::new(vfs, blobs, signer.clone(), events);
        (file_service, signer, user)
    }

    fn parse_query(query: &str) -> crate::application::url_signer::SignedParams {
        let mut signature = String::new();
        let mut timestamp = 0i64;
        let mut nonce = String::new();
        let mut user = String::new();
        for pair in query.split('&') {
            let (k, v) = pair.split_once('=').unwrap();
            match k {
                "signature" => signature = v.to_string(),
                "timestamp" => timestamp = v.parse().unwrap(),
                "nonce" => nonce = v.to_string(),
                "user" => user = v.to_string(),
                _ => {}
            }
        }
        crate::application::url_signer::SignedParams { signature, timestamp, nonce, user }
    }

    /// Reproduces the exact path the `/api/oss/download` handler verifies
    /// against, guarding against `download_url` folding the `id` query
    /// parameter into the signed message (it must stay outside it).
    #[tokio::test]
    async fn download_url_verifies_against_the_bare_download_path() {
        let (file_service, signer, user) = service().await;
        let node = file_service
            .vfs
            .create_file(&user, 0, "notes.note", 1024, "deadbeef".to_string(), "inner-key".to_string(), false)
            .await
            .unwrap();

        let url = file_service.download_url(&user, &node).await.unwrap();
        let (path, query) = url.split_once('?').expect("download url carries a query string");
        assert_eq!(path, "/api/oss/download");

        let (id_param, signed_query) = query.split_once('&').expect("id param precedes the signed params");
        assert_eq!(id_param, format!("id={}", node.id));

        let params = parse_query(signed_query);
        signer
            .verify("/api/oss/download", &params, true)
            .await
            .expect("the path download_url signs must match the path the download handler verifies");
    }
}
