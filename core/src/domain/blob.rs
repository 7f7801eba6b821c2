// Copyright (c) 2026 supernote-server contributors
// SPDX-License-Identifier: AGPL-3.0
//! BlobStore domain trait: bucket-scoped content addressing over immutable
//! byte ranges, keyed by opaque strings (spec §4.2).

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::fmt;

use crate::domain::error::StorageError;

/// The two namespace-disjoint physical buckets a BlobStore serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    /// User-uploaded file bytes, referenced by `UserFileNode::storage_key`.
    UserData,
    /// Derived processing artifacts (page rasters, etc.), addressed by
    /// convention (`<file_id>/pages/<page_id>.png`).
    Cache,
}

impl Bucket {
    pub const fn as_str(self) -> &'static str {
        match self {
            Bucket::UserData => "USER_DATA",
            Bucket::Cache => "CACHE",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chunk of bytes read from `BlobStore::open_blob`, honoring byte-range
/// seeks for `Range:` request support.
pub type BlobByteStream = BoxStream<'static, std::io::Result<Bytes>>;

/// Bucket-scoped content-addressable object store. Keys are opaque; the
/// store performs no cross-key dedup or garbage collection (spec §4.2, §9).
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Writes `bytes` at `(bucket, key)` via temp-file-then-rename and
    /// returns the MD5 digest of the written content.
    async fn put(&self, bucket: Bucket, key: &str, bytes: Bytes) -> Result<String, StorageError>;

    /// Streams `data` to a temp file computing MD5 on the fly, renaming to
    /// the final path only on success; the temp file is removed on failure.
    async fn put_stream(
        &self,
        bucket: Bucket,
        key: &str,
        data: BoxStream<'static, std::io::Result<Bytes>>,
    ) -> Result<(String, u64), StorageError>;

    async fn get(&self, bucket: Bucket, key: &str) -> Result<Bytes, StorageError>;

    /// Returns a seekable async byte stream starting at `range_start`
    /// (inclusive) through `range_end` (inclusive, `None` = end of blob).
    async fn open_blob(
        &self,
        bucket: Bucket,
        key: &str,
        range_start: u64,
        range_end: Option<u64>,
    ) -> Result<BlobByteStream, StorageError>;

    async fn exists(&self, bucket: Bucket, key: &str) -> Result<bool, StorageError>;

    async fn delete(&self, bucket: Bucket, key: &str) -> Result<(), StorageError>;

    async fn get_size(&self, bucket: Bucket, key: &str) -> Result<u64, StorageError>;

    /// Deletes every key under `bucket` matching the `prefix` (used to purge
    /// `<file_id>/pages/*` on `NoteDeleted`).
    async fn delete_prefix(&self, bucket: Bucket, prefix: &str) -> Result<(), StorageError>;
}
