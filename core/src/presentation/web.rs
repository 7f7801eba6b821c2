// Copyright (c) 2026 supernote-server contributors
// SPDX-License-Identifier: AGPL-3.0
//! Web-facing HTTP API (spec §6): the same operations as [`crate::presentation::device`]
//! behind `camelCase` JSON and a flattened (category-container-hidden) view,
//! plus the session-token-authenticated semantic search endpoint.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::user::User;
use crate::domain::vfs::UserFileNode;
use crate::presentation::error::ApiError;
use crate::presentation::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/file/list/query", post(list_query))
        .route("/api/file/folder/add", post(folder_add))
        .route("/api/file/folder/list/query", post(list_query))
        .route("/api/file/move", post(move_file))
        .route("/api/file/copy", post(copy_file))
        .route("/api/file/rename", post(rename_file))
        .route("/api/file/delete", post(delete_file))
        .route("/api/file/capacity/query", post(capacity_query))
        .route("/api/file/path/query", post(path_query))
        .route("/api/file/upload/apply/query", post(upload_apply))
        .route("/api/file/upload/finish/query", post(upload_finish))
        .route("/api/file/recycle/list/query", post(recycle_list))
        .route("/api/file/recycle/delete", post(recycle_delete))
        .route("/api/file/recycle/revert", post(recycle_revert))
        .route("/api/file/recycle/clear", post(recycle_clear))
        .route("/api/search/query", post(search_query))
}

async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<User, ApiError> {
    let token = headers
        .get("x-access-token")
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;
    Ok(state.users.resolve_session(token).await?)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserFileVo {
    id: i64,
    name: String,
    is_folder: bool,
    size: i64,
    content_hash: Option<String>,
    update_time: i64,
}

impl From<&UserFileNode> for UserFileVo {
    fn from(n: &UserFileNode) -> Self {
        Self {
            id: n.id,
            name: n.name.clone(),
            is_folder: n.is_folder,
            size: n.size,
            content_hash: n.md5.clone(),
            update_time: n.update_time.timestamp_millis(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListQueryResponse {
    user_file_vo_list: Vec<UserFileVo>,
    page_size: usize,
    total: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQueryRequest {
    #[serde(default)]
    parent_id: i64,
    #[serde(default)]
    page_size: Option<usize>,
}

async fn list_query(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ListQueryRequest>,
) -> Result<Json<ListQueryResponse>, ApiError> {
    let user = authenticate(&state, &headers).await?;
    let children = state.vfs.list_directory_flattened(&user, req.parent_id).await?;
    let page_size = req.page_size.unwrap_or(children.len().max(1));
    let total = children.len();
    let user_file_vo_list = children.iter().map(UserFileVo::from).collect();
    Ok(Json(ListQueryResponse { user_file_vo_list, page_size, total }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FolderAddRequest {
    parent_id: i64,
    name: String,
    #[serde(default)]
    autorename: bool,
}

async fn folder_add(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<FolderAddRequest>,
) -> Result<Json<UserFileVo>, ApiError> {
    let user = authenticate(&state, &headers).await?;
    let node = state.vfs.create_directory(&user, req.parent_id, &req.name, req.autorename).await?;
    Ok(Json(UserFileVo::from(&node)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MoveCopyRequest {
    id: i64,
    new_parent_id: i64,
    #[serde(default)]
    autorename: bool,
}

async fn move_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<MoveCopyRequest>,
) -> Result<Json<UserFileVo>, ApiError> {
    let user = authenticate(&state, &headers).await?;
    let node = state.vfs.get_node_by_id(&user, req.id).await?;
    let moved = state.vfs.move_node(&user, req.id, req.new_parent_id, &node.name, req.autorename).await?;
    Ok(Json(UserFileVo::from(&moved)))
}

async fn copy_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<MoveCopyRequest>,
) -> Result<Json<UserFileVo>, ApiError> {
    let user = authenticate(&state, &headers).await?;
    let node = state.vfs.get_node_by_id(&user, req.id).await?;
    let copied = state.vfs.copy_node(&user, req.id, req.new_parent_id, &node.name, req.autorename).await?;
    Ok(Json(UserFileVo::from(&copied)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenameRequest {
    id: i64,
    new_name: String,
    #[serde(default)]
    autorename: bool,
}

async fn rename_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RenameRequest>,
) -> Result<Json<UserFileVo>, ApiError> {
    let user = authenticate(&state, &headers).await?;
    let node = state.vfs.get_node_by_id(&user, req.id).await?;
    let renamed = state.vfs.move_node(&user, req.id, node.parent_id, &req.new_name, req.autorename).await?;
    Ok(Json(UserFileVo::from(&renamed)))
}

#[derive(Deserialize)]
struct IdRequest {
    id: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SuccessResponse {
    success: bool,
}

async fn delete_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<IdRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let user = authenticate(&state, &headers).await?;
    state.files.delete(&user, req.id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CapacityResponse {
    used: i64,
    allocated: i64,
}

async fn capacity_query(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<CapacityResponse>, ApiError> {
    let user = authenticate(&state, &headers).await?;
    let (used, allocated) = state.files.get_space_usage(&user).await?;
    Ok(Json(CapacityResponse { used, allocated }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PathResponse {
    path: String,
    id_path: Vec<i64>,
}

async fn path_query(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<IdRequest>,
) -> Result<Json<PathResponse>, ApiError> {
    let user = authenticate(&state, &headers).await?;
    let info = state.vfs.get_path_info(&user, req.id, true).await?;
    Ok(Json(PathResponse { path: info.path, id_path: info.id_path }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadApplyRequest {
    file_name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadApplyResponse {
    inner_name: String,
    full_upload_url: String,
    part_upload_url: String,
}

async fn upload_apply(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<UploadApplyRequest>,
) -> Result<Json<UploadApplyResponse>, ApiError> {
    let user = authenticate(&state, &headers).await?;
    let applied = state.files.upload_apply(&user, &req.file_name).await?;
    Ok(Json(UploadApplyResponse {
        inner_name: applied.inner_name,
        full_upload_url: applied.full_upload_url,
        part_upload_url: applied.part_upload_url,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadFinishRequest {
    file_name: String,
    path: String,
    #[serde(default)]
    content_hash: Option<String>,
    inner_name: String,
}

async fn upload_finish(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<UploadFinishRequest>,
) -> Result<Json<UserFileVo>, ApiError> {
    let user = authenticate(&state, &headers).await?;
    let node = state
        .files
        .finish_upload(&user, &req.file_name, &req.path, req.content_hash.as_deref(), &req.inner_name)
        .await?;
    Ok(Json(UserFileVo::from(&node)))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecycleListResponse {
    total: usize,
    recycle_file_vo_list: Vec<crate::domain::vfs::RecycleEntry>,
}

async fn recycle_list(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<RecycleListResponse>, ApiError> {
    let user = authenticate(&state, &headers).await?;
    let entries = state.vfs.list_recycle(&user).await?;
    Ok(Json(RecycleListResponse { total: entries.len(), recycle_file_vo_list: entries }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecycleIdsRequest {
    #[serde(default)]
    ids: Option<Vec<i64>>,
}

async fn recycle_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RecycleIdsRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let user = authenticate(&state, &headers).await?;
    state.vfs.purge_recycle(&user, req.ids).await?;
    Ok(Json(SuccessResponse { success: true }))
}

async fn recycle_revert(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<IdRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let user = authenticate(&state, &headers).await?;
    state.vfs.restore(&user, req.id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

async fn recycle_clear(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<SuccessResponse>, ApiError> {
    let user = authenticate(&state, &headers).await?;
    state.vfs.purge_recycle(&user, None).await?;
    Ok(Json(SuccessResponse { success: true }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchQueryRequest {
    query: String,
    #[serde(default)]
    top_n: Option<usize>,
    #[serde(default)]
    name_filter: Option<String>,
    #[serde(default)]
    date_after: Option<DateTime<Utc>>,
    #[serde(default)]
    date_before: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchResultVo {
    file_id: i64,
    file_name: String,
    page_index: i32,
    page_id: String,
    score: f32,
    text_preview: String,
    date: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchQueryResponse {
    results: Vec<SearchResultVo>,
}

const DEFAULT_SEARCH_TOP_N: usize = 20;

async fn search_query(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SearchQueryRequest>,
) -> Result<Json<SearchQueryResponse>, ApiError> {
    let user = authenticate(&state, &headers).await?;
    let hits = state
        .search
        .search_chunks(
            user.id,
            &req.query,
            req.top_n.unwrap_or(DEFAULT_SEARCH_TOP_N),
            req.name_filter.as_deref(),
            req.date_after,
            req.date_before,
        )
        .await;
    let results = hits
        .into_iter()
        .map(|h| SearchResultVo {
            file_id: h.file_id,
            file_name: h.file_name,
            page_index: h.page_index,
            page_id: h.page_id,
            score: h.score,
            text_preview: h.text_preview,
            date: h.date,
        })
        .collect();
    Ok(Json(SearchQueryResponse { results }))
}
