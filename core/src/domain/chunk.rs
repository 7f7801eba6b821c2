// Copyright (c) 2026 supernote-server contributors
// SPDX-License-Identifier: AGPL-3.0
//! Chunked-upload staging entity (spec §4.3).

use serde::{Deserialize, Serialize};

/// One staged part of a chunked upload, keyed by `(user_id, upload_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkPart {
    pub part_number: u32,
    pub staged_key: String,
    pub size: u64,
}

/// Tracks the parts received so far for a single in-flight chunked upload.
/// Lives from the first `PUT part` until merge or cleanup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkUpload {
    pub user_id: i64,
    pub upload_id: String,
    pub object_name: String,
    pub total_chunks: u32,
    pub parts: Vec<ChunkPart>,
}

impl ChunkUpload {
    pub fn new(user_id: i64, upload_id: String, object_name: String, total_chunks: u32) -> Self {
        Self {
            user_id,
            upload_id,
            object_name,
            total_chunks,
            parts: Vec::new(),
        }
    }

    /// Records or overwrites a part. Receiving the same `part_number` twice
    /// is a no-op overwrite, matching idempotent retry semantics.
    pub fn upsert_part(&mut self, part: ChunkPart) {
        if let Some(existing) = self.parts.iter_mut().find(|p| p.part_number == part.part_number) {
            *existing = part;
        } else {
            self.parts.push(part);
        }
    }

    pub fn is_complete(&self, part_number: u32) -> bool {
        part_number == self.total_chunks
    }

    /// Parts in ascending numeric order, ready for merge.
    pub fn ordered_parts(&self) -> Vec<ChunkPart> {
        let mut parts = self.parts.clone();
        parts.sort_by_key(|p| p.part_number);
        parts
    }
}
