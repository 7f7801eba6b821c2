// Copyright (c) 2026 supernote-server contributors
// SPDX-License-Identifier: AGPL-3.0
//! Public OSS routes (spec §6): signature-authenticated, no session token.
//! Raw upload, chunked upload/part, and range-aware download — these stand
//! in for the vendor's object-storage backend that the device talks to
//! directly.

use axum::body::Body;
use axum::extract::{Multipart, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::application::url_signer::SignedParams;
use crate::domain::blob::Bucket;
use crate::presentation::error::ApiError;
use crate::presentation::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/oss/upload", post(upload))
        .route("/api/oss/upload/part", post(upload_part).put(upload_part))
        .route("/api/oss/download", get(download))
}

#[derive(Deserialize)]
struct UploadQuery {
    object_name: String,
    signature: String,
    timestamp: i64,
    nonce: String,
    user: String,
}

impl UploadQuery {
    fn signed_params(&self) -> SignedParams {
        SignedParams {
            signature: self.signature.clone(),
            timestamp: self.timestamp,
            nonce: self.nonce.clone(),
            user: self.user.clone(),
        }
    }
}

async fn upload(
    State(state): State<AppState>,
    Query(q): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let params = q.signed_params();
    state.signer.verify("/api/oss/upload", &params, true).await?;

    let mut field_bytes: Option<Bytes> = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| ApiError::BadRequest(e.to_string()))? {
        if field.name() == Some("file") {
            field_bytes = Some(field.bytes().await.map_err(|e| ApiError::BadRequest(e.to_string()))?);
            break;
        }
    }
    let bytes = field_bytes.ok_or_else(|| ApiError::BadRequest("missing multipart field 'file'".to_string()))?;

    let md5 = state.blobs.put(Bucket::UserData, &q.object_name, bytes).await?;
    Ok(Json(json!({"inner_name": q.object_name, "md5": md5})))
}

#[derive(Deserialize)]
struct UploadPartQuery {
    object_name: String,
    #[serde(rename = "uploadId")]
    upload_id: String,
    #[serde(rename = "partNumber")]
    part_number: u32,
    #[serde(rename = "totalChunks")]
    total_chunks: u32,
    signature: String,
    timestamp: i64,
    nonce: String,
    user: String,
}

impl UploadPartQuery {
    fn signed_params(&self) -> SignedParams {
        SignedParams {
            signature: self.signature.clone(),
            timestamp: self.timestamp,
            nonce: self.nonce.clone(),
            user: self.user.clone(),
        }
    }
}

#[derive(Serialize)]
struct UploadPartResponse {
    upload_id: String,
    part_number: u32,
    chunk_md5: Option<String>,
    status: &'static str,
}

async fn upload_part(
    State(state): State<AppState>,
    Query(q): Query<UploadPartQuery>,
    body: Bytes,
) -> Result<Json<UploadPartResponse>, ApiError> {
    let params = q.signed_params();
    state.signer.verify("/api/oss/upload/part", &params, false).await?;

    let user = state.users.find_by_email(&params.user).await?;
    let outcome = state
        .chunks
        .put_part(user.id, &q.upload_id, &q.object_name, q.total_chunks, q.part_number, body)
        .await?;

    Ok(Json(UploadPartResponse {
        upload_id: q.upload_id,
        part_number: q.part_number,
        chunk_md5: outcome.md5,
        status: "success",
    }))
}

#[derive(Deserialize)]
struct DownloadQuery {
    id: i64,
    signature: String,
    timestamp: i64,
    nonce: String,
    user: String,
}

impl DownloadQuery {
    fn signed_params(&self) -> SignedParams {
        SignedParams {
            signature: self.signature.clone(),
            timestamp: self.timestamp,
            nonce: self.nonce.clone(),
            user: self.user.clone(),
        }
    }
}

async fn download(State(state): State<AppState>, Query(q): Query<DownloadQuery>, headers: HeaderMap) -> Result<Response, ApiError> {
    let params = q.signed_params();
    state.signer.verify("/api/oss/download", &params, true).await?;

    let user = state.users.find_by_email(&params.user).await?;
    let node = state.vfs.get_node_by_id(&user, q.id).await?;
    let storage_key = node.storage_key.ok_or(ApiError::NotFound)?;
    let total_size = state.blobs.get_size(Bucket::UserData, &storage_key).await?;

    let range = headers.get(axum::http::header::RANGE).and_then(|v| v.to_str().ok());
    let (start, end, status) = match range.and_then(|r| parse_range(r, total_size)) {
        Some((start, end)) => (start, end, StatusCode::PARTIAL_CONTENT),
        None if range.is_some() => {
            return Ok(Response::builder()
                .status(StatusCode::RANGE_NOT_SATISFIABLE)
                .header(axum::http::header::CONTENT_RANGE, format!("bytes */{total_size}"))
                .body(Body::empty())
                .expect("response with an empty body is always constructible"))
        }
        None => (0, total_size.saturating_sub(1), StatusCode::OK),
    };

    let body_len = end.saturating_sub(start) + 1;
    let stream = state.blobs.open_blob(Bucket::UserData, &storage_key, start, Some(end)).await?;
    let body = Body::from_stream(stream);

    let mut response = Response::builder()
        .status(status)
        .header(axum::http::header::CONTENT_LENGTH, body_len)
        .header(axum::http::header::ACCEPT_RANGES, "bytes")
        .header(axum::http::header::CONTENT_TYPE, "application/octet-stream");
    if status == StatusCode::PARTIAL_CONTENT {
        response = response.header(axum::http::header::CONTENT_RANGE, format!("bytes {start}-{end}/{total_size}"));
    }
    Ok(response.body(body).expect("response with a streamed body is always constructible"))
}

/// Parses a single-range `Range: bytes=start-end` header (spec §6: "honors
/// `Range: bytes=start-end` with 206/416"). Multi-range requests and any
/// other unit are rejected by returning `None`, which the caller turns into
/// a 416.
fn parse_range(header: &str, total_size: u64) -> Option<(u64, u64)> {
    let spec = header.strip_prefix("bytes=")?;
    if spec.contains(',') {
        return None;
    }
    let (start_str, end_str) = spec.split_once('-')?;
    let (start, end) = if start_str.is_empty() {
        let suffix_len: u64 = end_str.parse().ok()?;
        if suffix_len == 0 || total_size == 0 {
            return None;
        }
        (total_size.saturating_sub(suffix_len), total_size - 1)
    } else {
        let start: u64 = start_str.parse().ok()?;
        let end = if end_str.is_empty() { total_size.saturating_sub(1) } else { end_str.parse().ok()? };
        (start, end)
    };
    if start > end || end >= total_size {
        return None;
    }
    Some((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bounded_range() {
        assert_eq!(parse_range("bytes=2-5", 10), Some((2, 5)));
    }

    #[test]
    fn parses_open_ended_range() {
        assert_eq!(parse_range("bytes=8-", 10), Some((8, 9)));
    }

    #[test]
    fn parses_suffix_range() {
        assert_eq!(parse_range("bytes=-3", 10), Some((7, 9)));
    }

    #[test]
    fn rejects_out_of_bounds_range() {
        assert_eq!(parse_range("bytes=5-20", 10), None);
        assert_eq!(parse_range("bytes=20-25", 10), None);
    }

    #[test]
    fn rejects_multi_range() {
        assert_eq!(parse_range("bytes=0-1,3-4", 10), None);
    }
}
