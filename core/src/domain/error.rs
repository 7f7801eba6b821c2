// Copyright (c) 2026 supernote-server contributors
// SPDX-License-Identifier: AGPL-3.0
//! Domain-level error kinds, one `thiserror` enum per bounded concern.
//!
//! These are translated to the `{success,errorCode,errorMsg}` HTTP envelope by
//! [`crate::presentation::error::ApiError`]; nothing in `domain` or
//! `application` knows about HTTP status codes.

use thiserror::Error;

/// Errors raised by VFS operations (node CRUD, path resolution, recycle bin).
#[derive(Debug, Error)]
pub enum VfsError {
    #[error("node not found")]
    NotFound,
    #[error("name collision: {0}")]
    Conflict(String),
    #[error("cyclic move rejected: {0}")]
    Cyclic(String),
    #[error("operation not permitted on system directory")]
    SystemDirectory,
    #[error("not a folder")]
    NotAFolder,
    #[error("not a file")]
    NotAFile,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Errors raised by BlobStore/ChunkStore operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("blob not found: {0}")]
    NotFound(String),
    #[error("declared hash does not match stored blob")]
    HashMismatch,
    #[error("io error: {0}")]
    Io(String),
    #[error("invalid key: {0}")]
    InvalidKey(String),
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e.to_string())
    }
}

/// Errors raised by the CoordinationService KV primitives.
#[derive(Debug, Error)]
pub enum CoordinationError {
    #[error("key not found: {0}")]
    NotFound(String),
    #[error("lock already held: {0}")]
    LockHeld(String),
    #[error("backend error: {0}")]
    Backend(String),
}

/// Errors raised by the SyncCoordinator.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("sync lease held by another equipment")]
    Conflict,
    #[error(transparent)]
    Coordination(#[from] CoordinationError),
}

/// Errors raised by UserService.
#[derive(Debug, Error)]
pub enum UserError {
    #[error("account already registered")]
    AlreadyExists,
    #[error("account not found or inactive")]
    NotFound,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("rate limited")]
    RateLimited,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Errors raised by ProcessorService modules. Modules never let these escape
/// `process_file` — they are caught and written to `SystemTask.last_error`.
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("renderer failed: {0}")]
    Renderer(String),
    #[error("inference service failed: {0}")]
    Inference(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Generic repository-layer failure (connection loss, constraint violation
/// not otherwise typed, serialization failure). Bubbled up and wrapped by the
/// more specific domain error enums above.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(e: sqlx::Error) -> Self {
        RepositoryError::Database(e.to_string())
    }
}
