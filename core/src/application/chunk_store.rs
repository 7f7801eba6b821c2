// Copyright (c) 2026 supernote-server contributors
// SPDX-License-Identifier: AGPL-3.0
//! ChunkStore: per-(user, uploadId) chunk staging, ordered merge to a single
//! blob, cleanup (spec §4.3).

use bytes::Bytes;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::blob::{BlobStore, Bucket};
use crate::domain::chunk::{ChunkPart, ChunkUpload};
use crate::domain::error::StorageError;
use crate::domain::repository::ChunkRepository;

pub struct MergeOutcome {
    pub merged: bool,
    pub md5: Option<String>,
    pub size: Option<u64>,
}

pub struct ChunkStore {
    repo: Arc<dyn ChunkRepository>,
    blobs: Arc<dyn BlobStore>,
}

impl ChunkStore {
    pub fn new(repo: Arc<dyn ChunkRepository>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { repo, blobs }
    }

    fn staging_key(user_id: i64, upload_id: &str, part_number: u32) -> String {
        format!("chunks/{user_id}/{upload_id}/{part_number}")
    }

    /// Writes one chunk of a chunked upload. When `part_number` is the last
    /// chunk (`== total_chunks`), merges all staged parts in numeric order
    /// into `object_name` and cleans up staging. Receiving the same
    /// `part_number` twice before that point is a no-op overwrite.
    pub async fn put_part(
        &self,
        user_id: i64,
        upload_id: &str,
        object_name: &str,
        total_chunks: u32,
        part_number: u32,
        bytes: Bytes,
    ) -> Result<MergeOutcome, StorageError> {
        let staged_key = Self::staging_key(user_id, upload_id, part_number);
        let size = bytes.len() as u64;
        self.blobs.put(Bucket::UserData, &staged_key, bytes).await?;

        let mut upload = match self.repo.get(user_id, upload_id).await.map_err(|e| StorageError::Io(e.to_string()))? {
            Some(u) => u,
            None => ChunkUpload::new(user_id, upload_id.to_string(), object_name.to_string(), total_chunks),
        };
        upload.upsert_part(ChunkPart { part_number, staged_key, size });

        if upload.is_complete(part_number) {
            let (md5, merged_size) = self.merge(&upload).await?;
            self.repo.delete(user_id, upload_id).await.map_err(|e| StorageError::Io(e.to_string()))?;
            Ok(MergeOutcome { merged: true, md5: Some(md5), size: Some(merged_size) })
        } else {
            self.repo.put(upload).await.map_err(|e| StorageError::Io(e.to_string()))?;
            Ok(MergeOutcome { merged: false, md5: None, size: None })
        }
    }

    async fn merge(&self, upload: &ChunkUpload) -> Result<(String, u64), StorageError> {
        let mut buffer = Vec::new();
        for part in upload.ordered_parts() {
            let part_bytes = self.blobs.get(Bucket::UserData, &part.staged_key).await?;
            buffer.extend_from_slice(&part_bytes);
        }
        let size = buffer.len() as u64;
        let md5 = self.blobs.put(Bucket::UserData, &upload.object_name, Bytes::from(buffer)).await?;
        for part in &upload.parts {
            let _ = self.blobs.delete(Bucket::UserData, &part.staged_key).await;
        }
        Ok((md5, size))
    }
}

/// Allocates a fresh opaque key for a new upload, combining a random UUID
/// with the extension of the user-supplied file name (spec §4.5:
/// "`inner_name` is a newly generated opaque key (UUID + extension)").
pub fn new_inner_name(file_name: &str) -> String {
    let ext = file_name.rsplit('.').next().filter(|e| *e != file_name);
    match ext {
        Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
        None => Uuid::new_v4().to_string(),
    }
}
