// Copyright (c) 2026 supernote-server contributors
// SPDX-License-Identifier: AGPL-3.0
//! Local-filesystem [`BlobStore`]: two namespace-disjoint buckets sharing a
//! root directory, content written via temp-file-then-rename so readers
//! never observe partial writes (spec §4.2, §5, §6's filesystem layout
//! `<root>/blobs/<bucket>/<key[0:2]>/<key>`).

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use md5::{Digest, Md5};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use crate::domain::blob::{BlobByteStream, BlobStore, Bucket};
use crate::domain::error::StorageError;

const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Filesystem-backed [`BlobStore`]. Suitable for single-node deployments;
/// per spec §1's Non-goals, no distributed or multi-node variant is
/// provided — a later backend could implement the same trait.
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(root.join("temp")).await?;
        Ok(Self { root })
    }

    fn shard_prefix(key: &str) -> &str {
        let end = key.char_indices().nth(2).map(|(i, _)| i).unwrap_or(key.len());
        &key[..end]
    }

    fn final_path(&self, bucket: Bucket, key: &str) -> Result<PathBuf, StorageError> {
        if key.is_empty() || key.contains("..") {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self
            .root
            .join("blobs")
            .join(bucket.as_str())
            .join(Self::shard_prefix(key))
            .join(key))
    }

    fn temp_path(&self) -> PathBuf {
        self.root.join("temp").join(uuid::Uuid::new_v4().to_string())
    }

    async fn ensure_parent(path: &Path) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, bucket: Bucket, key: &str, bytes: Bytes) -> Result<String, StorageError> {
        let final_path = self.final_path(bucket, key)?;
        let temp_path = self.temp_path();

        let mut hasher = Md5::new();
        hasher.update(&bytes);
        let digest = hex::encode(hasher.finalize());

        let write_result = async {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(&bytes).await?;
            file.sync_all().await?;
            Ok::<_, std::io::Error>(())
        }
        .await;
        if let Err(e) = write_result {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        Self::ensure_parent(&final_path).await?;
        fs::rename(&temp_path, &final_path).await?;
        Ok(digest)
    }

    async fn put_stream(
        &self,
        bucket: Bucket,
        key: &str,
        mut data: BoxStream<'static, std::io::Result<Bytes>>,
    ) -> Result<(String, u64), StorageError> {
        let final_path = self.final_path(bucket, key)?;
        let temp_path = self.temp_path();

        let result = async {
            let mut file = fs::File::create(&temp_path).await?;
            let mut hasher = Md5::new();
            let mut total: u64 = 0;
            while let Some(chunk) = data.next().await {
                let chunk = chunk?;
                hasher.update(&chunk);
                total += chunk.len() as u64;
                file.write_all(&chunk).await?;
            }
            file.sync_all().await?;
            Ok::<_, std::io::Error>((hex::encode(hasher.finalize()), total))
        }
        .await;

        match result {
            Ok((digest, size)) => {
                Self::ensure_parent(&final_path).await?;
                fs::rename(&temp_path, &final_path).await?;
                Ok((digest, size))
            }
            Err(e) => {
                let _ = fs::remove_file(&temp_path).await;
                Err(e.into())
            }
        }
    }

    async fn get(&self, bucket: Bucket, key: &str) -> Result<Bytes, StorageError> {
        let path = self.final_path(bucket, key)?;
        let bytes = fs::read(&path)
            .await
            .map_err(|_| StorageError::NotFound(key.to_string()))?;
        Ok(Bytes::from(bytes))
    }

    async fn open_blob(
        &self,
        bucket: Bucket,
        key: &str,
        range_start: u64,
        range_end: Option<u64>,
    ) -> Result<BlobByteStream, StorageError> {
        let path = self.final_path(bucket, key)?;
        let mut file = fs::File::open(&path)
            .await
            .map_err(|_| StorageError::NotFound(key.to_string()))?;
        file.seek(std::io::SeekFrom::Start(range_start)).await?;

        let remaining = range_end.map(|end| end.saturating_sub(range_start) + 1);
        let stream = stream::unfold((file, remaining), |(mut file, remaining)| async move {
            if remaining == Some(0) {
                return None;
            }
            let to_read = remaining.map(|r| r.min(READ_CHUNK_SIZE as u64) as usize).unwrap_or(READ_CHUNK_SIZE);
            let mut buf = vec![0u8; to_read];
            match file.read(&mut buf).await {
                Ok(0) => None,
                Ok(n) => {
                    buf.truncate(n);
                    let next_remaining = remaining.map(|r| r.saturating_sub(n as u64));
                    Some((Ok(Bytes::from(buf)), (file, next_remaining)))
                }
                Err(e) => Some((Err(e), (file, Some(0)))),
            }
        });
        Ok(stream.boxed())
    }

    async fn exists(&self, bucket: Bucket, key: &str) -> Result<bool, StorageError> {
        let path = self.final_path(bucket, key)?;
        Ok(fs::metadata(&path).await.is_ok())
    }

    async fn delete(&self, bucket: Bucket, key: &str) -> Result<(), StorageError> {
        let path = self.final_path(bucket, key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_size(&self, bucket: Bucket, key: &str) -> Result<u64, StorageError> {
        let path = self.final_path(bucket, key)?;
        let metadata = fs::metadata(&path).await.map_err(|_| StorageError::NotFound(key.to_string()))?;
        Ok(metadata.len())
    }

    async fn delete_prefix(&self, bucket: Bucket, prefix: &str) -> Result<(), StorageError> {
        // CACHE keys are nested (`<file_id>/pages/<page_id>.png`); the whole
        // `<file_id>/pages` subtree lives under one shard directory, so a
        // recursive removal of that directory is enough (spec §4.7:
        // "delete CACHE blobs matching `<file_id>/pages/*`").
        let dir = self.root.join("blobs").join(bucket.as_str()).join(Self::shard_prefix(prefix)).join(prefix);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use tempfile::TempDir;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = LocalBlobStore::new(dir.path()).await.unwrap();
        let digest = store.put(Bucket::UserData, "abc123.note", Bytes::from_static(b"hello")).await.unwrap();
        assert_eq!(digest, format!("{:x}", Md5::digest(b"hello")));
        let bytes = store.get(Bucket::UserData, "abc123.note").await.unwrap();
        assert_eq!(bytes, Bytes::from_static(b"hello"));
        assert!(store.exists(Bucket::UserData, "abc123.note").await.unwrap());
        assert_eq!(store.get_size(Bucket::UserData, "abc123.note").await.unwrap(), 5);
    }

    #[tokio::test]
    async fn missing_key_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = LocalBlobStore::new(dir.path()).await.unwrap();
        let result = store.get(Bucket::UserData, "missing").await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn user_data_and_cache_are_namespace_disjoint() {
        let dir = TempDir::new().unwrap();
        let store = LocalBlobStore::new(dir.path()).await.unwrap();
        store.put(Bucket::UserData, "k", Bytes::from_static(b"one")).await.unwrap();
        store.put(Bucket::Cache, "k", Bytes::from_static(b"two")).await.unwrap();
        assert_eq!(store.get(Bucket::UserData, "k").await.unwrap(), Bytes::from_static(b"one"));
        assert_eq!(store.get(Bucket::Cache, "k").await.unwrap(), Bytes::from_static(b"two"));
    }

    #[tokio::test]
    async fn open_blob_honors_byte_range() {
        let dir = TempDir::new().unwrap();
        let store = LocalBlobStore::new(dir.path()).await.unwrap();
        store.put(Bucket::UserData, "range.bin", Bytes::from_static(b"0123456789")).await.unwrap();
        let stream = store.open_blob(Bucket::UserData, "range.bin", 2, Some(5)).await.unwrap();
        let chunks: Vec<Bytes> = stream.try_collect().await.unwrap();
        let collected: Vec<u8> = chunks.into_iter().flatten().collect();
        assert_eq!(collected, b"2345");
    }

    #[tokio::test]
    async fn delete_prefix_removes_nested_cache_artifacts() {
        let dir = TempDir::new().unwrap();
        let store = LocalBlobStore::new(dir.path()).await.unwrap();
        store.put(Bucket::Cache, "42/pages/P1.png", Bytes::from_static(b"png")).await.unwrap();
        store.delete_prefix(Bucket::Cache, "42/pages").await.unwrap();
        assert!(!store.exists(Bucket::Cache, "42/pages/P1.png").await.unwrap());
    }

    #[tokio::test]
    async fn put_stream_computes_md5_and_size() {
        let dir = TempDir::new().unwrap();
        let store = LocalBlobStore::new(dir.path()).await.unwrap();
        let chunks: Vec<std::io::Result<Bytes>> = vec![Ok(Bytes::from_static(b"hel")), Ok(Bytes::from_static(b"lo"))];
        let data = stream::iter(chunks).boxed();
        let (digest, size) = store.put_stream(Bucket::UserData, "streamed", data).await.unwrap();
        assert_eq!(size, 5);
        assert_eq!(digest, format!("{:x}", Md5::digest(b"hello")));
    }
}
