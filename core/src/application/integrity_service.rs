// Copyright (c) 2026 supernote-server contributors
// SPDX-License-Identifier: AGPL-3.0
//! Integrity audit (spec §4.9): a read-only scan that cross-checks VFS
//! metadata against BlobStore reality. Never mutates state.

use serde::Serialize;
use std::sync::Arc;

use crate::domain::blob::{BlobStore, Bucket};
use crate::domain::error::RepositoryError;
use crate::domain::repository::VfsRepository;

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct IntegrityReport {
    pub scanned: u64,
    pub ok: u64,
    pub missing_blob: u64,
    pub size_mismatch: u64,
}

pub struct IntegrityService {
    vfs: Arc<dyn VfsRepository>,
    blobs: Arc<dyn BlobStore>,
}

impl IntegrityService {
    pub fn new(vfs: Arc<dyn VfsRepository>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { vfs, blobs }
    }

    /// Iterates every active file node for `user_id`, verifying the
    /// referenced USER_DATA blob exists and its size matches the node.
    pub async fn scan_user(&self, user_id: i64) -> Result<IntegrityReport, RepositoryError> {
        let files = self.vfs.list_active_files(user_id).await?;
        let mut report = IntegrityReport::default();

        for file in files {
            report.scanned += 1;
            let Some(storage_key) = file.storage_key.as_deref() else {
                report.missing_blob += 1;
                continue;
            };
            match self.blobs.exists(Bucket::UserData, storage_key).await {
                Ok(true) => match self.blobs.get_size(Bucket::UserData, storage_key).await {
                    Ok(size) if size as i64 == file.size => report.ok += 1,
                    _ => report.size_mismatch += 1,
                },
                _ => report.missing_blob += 1,
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::vfs::UserFileNode;
    use crate::infrastructure::repositories::in_memory::InMemoryVfsRepository;
    use crate::infrastructure::storage::local::LocalBlobStore;
    use bytes::Bytes;
    use chrono::Utc;
    use tempfile::TempDir;

    fn node(id: i64, size: i64, storage_key: Option<&str>) -> UserFileNode {
        UserFileNode {
            id,
            user_id: 1,
            parent_id: 0,
            name: format!("file-{id}"),
            is_folder: false,
            size,
            md5: None,
            storage_key: storage_key.map(str::to_string),
            is_active: true,
            create_time: Utc::now(),
            update_time: Utc::now(),
        }
    }

    #[tokio::test]
    async fn reports_ok_missing_and_mismatched() {
        let dir = TempDir::new().unwrap();
        let blobs = Arc::new(LocalBlobStore::new(dir.path()).await.unwrap());
        let vfs = Arc::new(InMemoryVfsRepository::new());

        blobs.put(Bucket::UserData, "good", Bytes::from_static(b"12345")).await.unwrap();
        vfs.insert_node(node(1, 5, Some("good"))).await.unwrap();
        vfs.insert_node(node(2, 5, Some("missing"))).await.unwrap();
        blobs.put(Bucket::UserData, "wrong-size", Bytes::from_static(b"12345")).await.unwrap();
        vfs.insert_node(node(3, 999, Some("wrong-size"))).await.unwrap();

        let service = IntegrityService::new(vfs, blobs);
        let report = service.scan_user(1).await.unwrap();
        assert_eq!(report.scanned, 3);
        assert_eq!(report.ok, 1);
        assert_eq!(report.missing_blob, 1);
        assert_eq!(report.size_mismatch, 1);
    }
}
