// Copyright (c) 2026 supernote-server contributors
// SPDX-License-Identifier: AGPL-3.0
//! The single presentation-boundary error type (spec §7): every domain and
//! application error converges here and renders as the
//! `{success,errorCode,errorMsg}` envelope with the matching HTTP status.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

use crate::application::file_service::FileServiceError;
use crate::application::url_signer::SignatureError;
use crate::domain::error::{CoordinationError, ProcessorError, RepositoryError, StorageError, SyncError, UserError, VfsError};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("conflict")]
    Conflict { code: Option<&'static str>, message: String },
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("declared content hash does not match stored blob")]
    HashMismatch,
    #[error("rate limited")]
    RateLimited,
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorEnvelope {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_code: Option<&'static str>,
    error_msg: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, None, self.to_string()),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, None, self.to_string()),
            ApiError::NotFound => (StatusCode::NOT_FOUND, None, self.to_string()),
            ApiError::Conflict { code, message } => (StatusCode::CONFLICT, *code, message.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, None, msg.clone()),
            ApiError::HashMismatch => (StatusCode::BAD_REQUEST, None, self.to_string()),
            ApiError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, None, self.to_string()),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "unhandled internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, None, "internal error".to_string())
            }
        };

        let body = Json(json!(ErrorEnvelope {
            success: false,
            error_code: code,
            error_msg: message,
        }));
        (status, body).into_response()
    }
}

impl From<VfsError> for ApiError {
    fn from(e: VfsError) -> Self {
        match e {
            VfsError::NotFound => ApiError::NotFound,
            VfsError::Conflict(name) => ApiError::Conflict { code: None, message: format!("name collision: {name}") },
            VfsError::Cyclic(msg) => ApiError::BadRequest(msg),
            VfsError::SystemDirectory => ApiError::Forbidden,
            VfsError::NotAFolder | VfsError::NotAFile => ApiError::BadRequest(e.to_string()),
            VfsError::Repository(r) => r.into(),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(_) => ApiError::NotFound,
            StorageError::HashMismatch => ApiError::HashMismatch,
            StorageError::InvalidKey(msg) => ApiError::BadRequest(msg),
            StorageError::Io(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<UserError> for ApiError {
    fn from(e: UserError) -> Self {
        match e {
            UserError::AlreadyExists => ApiError::Conflict { code: None, message: e.to_string() },
            UserError::NotFound | UserError::InvalidCredentials => ApiError::Unauthorized,
            UserError::RateLimited => ApiError::RateLimited,
            UserError::Repository(r) => r.into(),
        }
    }
}

impl From<SyncError> for ApiError {
    fn from(e: SyncError) -> Self {
        match e {
            SyncError::Conflict => ApiError::Conflict {
                code: Some(crate::application::sync_coordinator::SYNC_CONFLICT_ERROR_CODE),
                message: e.to_string(),
            },
            SyncError::Coordination(c) => c.into(),
        }
    }
}

impl From<CoordinationError> for ApiError {
    fn from(e: CoordinationError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<SignatureError> for ApiError {
    fn from(e: SignatureError) -> Self {
        match e {
            SignatureError::BadSignature | SignatureError::ClockSkew => ApiError::Forbidden,
            SignatureError::Expired | SignatureError::AlreadyUsed => ApiError::Forbidden,
            SignatureError::Coordination(c) => c.into(),
        }
    }
}

impl From<FileServiceError> for ApiError {
    fn from(e: FileServiceError) -> Self {
        match e {
            FileServiceError::Vfs(v) => v.into(),
            FileServiceError::Storage(s) => s.into(),
        }
    }
}

impl From<ProcessorError> for ApiError {
    fn from(e: ProcessorError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<RepositoryError> for ApiError {
    fn from(e: RepositoryError) -> Self {
        ApiError::Internal(e.to_string())
    }
}
