// Copyright (c) 2026 supernote-server contributors
// SPDX-License-Identifier: AGPL-3.0
//! Device-facing HTTP API (spec §6): snake_case JSON, `x-access-token`
//! header session auth, the vendor device's own route shapes.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::domain::user::User;
use crate::domain::vfs::UserFileNode;
use crate::presentation::error::ApiError;
use crate::presentation::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/file/query/server", get(query_server))
        .route("/api/official/user/query/random/code", post(random_code))
        .route("/api/official/user/account/login/new", post(login))
        .route("/api/official/user/account/login/equipment", post(login))
        .route("/api/file/2/files/synchronous/start", post(sync_start))
        .route("/api/file/2/files/synchronous/end", post(sync_end))
        .route("/api/file/2/files/list_folder", post(list_folder))
        .route("/api/file/3/files/list_folder_v3", post(list_folder_v3))
        .route("/api/file/2/users/get_space_usage", post(get_space_usage))
        .route("/api/file/3/files/query/by/path_v3", post(query_by_path_v3))
        .route("/api/file/3/files/query_v3", post(query_v3))
        .route("/api/file/3/files/upload/apply", post(upload_apply))
        .route("/api/file/2/files/upload/finish", post(upload_finish))
        .route("/api/file/3/files/download_v3", post(download_v3))
        .route("/api/file/3/files/create_folder_v2", post(create_folder_v2))
        .route("/api/file/3/files/delete_folder_v3", post(delete_folder_v3))
        .route("/api/file/3/files/move_v3", post(move_v3))
        .route("/api/file/3/files/copy_v3", post(copy_v3))
        .route("/api/file/recycle/list/query", post(recycle_list))
        .route("/api/file/recycle/delete", post(recycle_delete))
        .route("/api/file/recycle/revert", post(recycle_revert))
        .route("/api/file/recycle/clear", post(recycle_clear))
        .route("/api/file/label/list/search", post(label_search))
}

async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<User, ApiError> {
    let token = headers
        .get("x-access-token")
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;
    Ok(state.users.resolve_session(token).await?)
}

async fn query_server() -> Json<Value> {
    Json(json!({"success": true}))
}

#[derive(Deserialize)]
struct RandomCodeRequest {
    account: String,
}

async fn random_code(
    State(state): State<AppState>,
    Json(req): Json<RandomCodeRequest>,
) -> Result<Json<Value>, ApiError> {
    let (random_code, timestamp) = state.users.generate_random_code(&req.account).await?;
    Ok(Json(json!({"randomCode": random_code, "timestamp": timestamp})))
}

#[derive(Deserialize)]
struct LoginRequest {
    account: String,
    #[serde(rename = "password")]
    client_hash: String,
    timestamp: String,
    #[serde(default)]
    equipment_no: Option<String>,
    #[serde(default = "default_login_method")]
    login_method: String,
}

fn default_login_method() -> String {
    "password".to_string()
}

async fn login(State(state): State<AppState>, Json(req): Json<LoginRequest>) -> Result<Json<Value>, ApiError> {
    let (token, user) = state
        .users
        .login(&req.account, &req.client_hash, &req.timestamp, req.equipment_no, &req.login_method)
        .await?;
    Ok(Json(json!({
        "token": token,
        "userName": user.display_name,
        "isBind": true,
        "isBindEquipment": true,
    })))
}

#[derive(Deserialize)]
struct SyncRequest {
    equipment_no: String,
}

async fn sync_start(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SyncRequest>,
) -> Result<Json<Value>, ApiError> {
    let user = authenticate(&state, &headers).await?;
    let storage_is_empty = state.vfs.list_directory(&user, 0).await?.is_empty();
    let syn_type = state.sync.start(&user.email, &req.equipment_no, storage_is_empty, state.lease_ttl).await?;
    Ok(Json(json!({"synType": syn_type})))
}

async fn sync_end(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SyncRequest>,
) -> Result<Json<Value>, ApiError> {
    let user = authenticate(&state, &headers).await?;
    state.sync.end(&user.email, &req.equipment_no).await?;
    Ok(Json(json!({"success": true})))
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
struct DeviceEntry {
    id: i64,
    name: String,
    path_display: String,
    parent_path: String,
    content_hash: Option<String>,
    is_downloadable: bool,
    size: i64,
    last_update_time: i64,
    tag: &'static str,
}

fn to_entry(node: &UserFileNode, path_display: String, parent_path: String) -> DeviceEntry {
    DeviceEntry {
        id: node.id,
        name: node.name.clone(),
        path_display,
        parent_path,
        content_hash: node.md5.clone(),
        is_downloadable: !node.is_folder,
        size: node.size,
        last_update_time: node.update_time.timestamp_millis(),
        tag: if node.is_folder { "folder" } else { "file" },
    }
}

#[derive(Deserialize)]
struct ListFolderRequest {
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    equipment_no: Option<String>,
    #[serde(default)]
    recursive: bool,
}

async fn list_folder(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ListFolderRequest>,
) -> Result<Json<Value>, ApiError> {
    let user = authenticate(&state, &headers).await?;
    let parent = resolve_folder_id(&state, &user, req.path.as_deref(), req.id).await?;
    list_folder_entries(&state, &user, parent, req.recursive).await
}

async fn list_folder_v3(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ListFolderRequest>,
) -> Result<Json<Value>, ApiError> {
    list_folder(State(state), headers, Json(req)).await
}

async fn resolve_folder_id(state: &AppState, user: &User, path: Option<&str>, id: Option<i64>) -> Result<i64, ApiError> {
    if let Some(id) = id {
        return Ok(id);
    }
    match path {
        Some(path) if !path.is_empty() && path != "/" => {
            let node = state.vfs.resolve_path(user, path).await?.ok_or(ApiError::NotFound)?;
            Ok(node.id)
        }
        _ => Ok(0),
    }
}

async fn list_folder_entries(state: &AppState, user: &User, parent: i64, recursive: bool) -> Result<Json<Value>, ApiError> {
    let entries = if recursive {
        let rows = state.vfs.list_recursive(user, parent).await?;
        rows.into_iter()
            .map(|(node, path)| to_entry(&node, format!("/{path}"), parent_path_of(&path)))
            .collect::<Vec<_>>()
    } else {
        let rows = state.vfs.list_directory(user, parent).await?;
        rows.into_iter().map(|node| to_entry(&node, format!("/{}", node.name), String::new())).collect()
    };
    Ok(Json(json!({"entries": entries})))
}

fn parent_path_of(path: &str) -> String {
    match path.rfind('/') {
        Some(idx) => format!("/{}", &path[..idx]),
        None => "/".to_string(),
    }
}

#[derive(Deserialize)]
struct SpaceUsageRequest {
    #[serde(default)]
    equipment_no: Option<String>,
}

async fn get_space_usage(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(_req): Json<SpaceUsageRequest>,
) -> Result<Json<Value>, ApiError> {
    let user = authenticate(&state, &headers).await?;
    let (used, allocated) = state.files.get_space_usage(&user).await?;
    Ok(Json(json!({"used": used, "allocation_vo": {"allocated": allocated}})))
}

#[derive(Deserialize)]
struct QueryByPathRequest {
    path: String,
    #[serde(default)]
    equipment_no: Option<String>,
}

async fn query_by_path_v3(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<QueryByPathRequest>,
) -> Result<Json<Value>, ApiError> {
    let user = authenticate(&state, &headers).await?;
    let node = state.vfs.resolve_path(&user, &req.path).await?.ok_or(ApiError::NotFound)?;
    Ok(Json(json!({"entries_vo": to_entry(&node, format!("/{}", node.name), parent_path_of(&req.path))})))
}

#[derive(Deserialize)]
struct QueryByIdRequest {
    id: i64,
    #[serde(default)]
    equipment_no: Option<String>,
}

async fn query_v3(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<QueryByIdRequest>,
) -> Result<Json<Value>, ApiError> {
    let user = authenticate(&state, &headers).await?;
    let node = state.vfs.get_node_by_id(&user, req.id).await?;
    let path_info = state.vfs.get_path_info(&user, node.id, false).await?;
    Ok(Json(json!({"entries_vo": to_entry(&node, path_info.path.clone(), parent_path_of(&path_info.path))})))
}

#[derive(Deserialize)]
struct UploadApplyRequest {
    file_name: String,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    size: Option<i64>,
    #[serde(default)]
    equipment_no: Option<String>,
}

async fn upload_apply(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<UploadApplyRequest>,
) -> Result<Json<Value>, ApiError> {
    let user = authenticate(&state, &headers).await?;
    let applied = state.files.upload_apply(&user, &req.file_name).await?;
    Ok(Json(json!({
        "inner_name": applied.inner_name,
        "full_upload_url": applied.full_upload_url,
        "part_upload_url": applied.part_upload_url,
    })))
}

#[derive(Deserialize)]
struct UploadFinishRequest {
    file_name: String,
    path: String,
    #[serde(default)]
    content_hash: Option<String>,
    inner_name: String,
    #[serde(default)]
    equipment_no: Option<String>,
}

async fn upload_finish(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<UploadFinishRequest>,
) -> Result<Json<Value>, ApiError> {
    let user = authenticate(&state, &headers).await?;
    let node = state
        .files
        .finish_upload(&user, &req.file_name, &req.path, req.content_hash.as_deref(), &req.inner_name)
        .await?;
    Ok(Json(json!({
        "id": node.id,
        "path_display": format!("{}/{}", req.path.trim_end_matches('/'), node.name),
        "size": node.size,
        "content_hash": node.md5,
    })))
}

async fn download_v3(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<QueryByIdRequest>,
) -> Result<Json<Value>, ApiError> {
    let user = authenticate(&state, &headers).await?;
    let node = state.vfs.get_node_by_id(&user, req.id).await?;
    let url = state.files.download_url(&user, &node).await?;
    Ok(Json(json!({
        "url": url,
        "id": node.id,
        "name": node.name,
        "content_hash": node.md5,
        "size": node.size,
    })))
}

#[derive(Deserialize)]
struct CreateFolderRequest {
    parent_id: i64,
    name: String,
    #[serde(default)]
    autorename: bool,
    #[serde(default)]
    equipment_no: Option<String>,
}

async fn create_folder_v2(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateFolderRequest>,
) -> Result<Json<Value>, ApiError> {
    let user = authenticate(&state, &headers).await?;
    let node = state.vfs.create_directory(&user, req.parent_id, &req.name, req.autorename).await?;
    Ok(Json(json!({"id": node.id, "name": node.name})))
}

#[derive(Deserialize)]
struct IdRequest {
    id: i64,
    #[serde(default)]
    equipment_no: Option<String>,
}

async fn delete_folder_v3(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<IdRequest>,
) -> Result<Json<Value>, ApiError> {
    let user = authenticate(&state, &headers).await?;
    state.files.delete(&user, req.id).await?;
    Ok(Json(json!({"success": true})))
}

#[derive(Deserialize)]
struct MoveCopyRequest {
    id: i64,
    new_parent_id: i64,
    #[serde(default)]
    new_name: Option<String>,
    #[serde(default)]
    autorename: bool,
    #[serde(default)]
    equipment_no: Option<String>,
}

async fn move_v3(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<MoveCopyRequest>,
) -> Result<Json<Value>, ApiError> {
    let user = authenticate(&state, &headers).await?;
    let node = state.vfs.get_node_by_id(&user, req.id).await?;
    let name = req.new_name.unwrap_or(node.name);
    let moved = state.vfs.move_node(&user, req.id, req.new_parent_id, &name, req.autorename).await?;
    Ok(Json(json!({"success": true, "id": moved.id})))
}

async fn copy_v3(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<MoveCopyRequest>,
) -> Result<Json<Value>, ApiError> {
    let user = authenticate(&state, &headers).await?;
    let node = state.vfs.get_node_by_id(&user, req.id).await?;
    let name = req.new_name.unwrap_or(node.name);
    let copied = state.vfs.copy_node(&user, req.id, req.new_parent_id, &name, req.autorename).await?;
    Ok(Json(json!({"success": true, "id": copied.id})))
}

async fn recycle_list(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<Value>, ApiError> {
    let user = authenticate(&state, &headers).await?;
    let entries = state.vfs.list_recycle(&user).await?;
    Ok(Json(json!({"total": entries.len(), "recycle_file_vo_list": entries})))
}

#[derive(Deserialize)]
struct RecycleIdsRequest {
    #[serde(default)]
    ids: Option<Vec<i64>>,
}

async fn recycle_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RecycleIdsRequest>,
) -> Result<Json<Value>, ApiError> {
    let user = authenticate(&state, &headers).await?;
    state.vfs.purge_recycle(&user, req.ids).await?;
    Ok(Json(json!({"success": true})))
}

#[derive(Deserialize)]
struct RecycleIdRequest {
    id: i64,
}

async fn recycle_revert(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RecycleIdRequest>,
) -> Result<Json<Value>, ApiError> {
    let user = authenticate(&state, &headers).await?;
    let node = state.vfs.restore(&user, req.id).await?;
    Ok(Json(json!({"success": true, "id": node.id})))
}

async fn recycle_clear(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<Value>, ApiError> {
    let user = authenticate(&state, &headers).await?;
    state.vfs.purge_recycle(&user, None).await?;
    Ok(Json(json!({"success": true})))
}

#[derive(Deserialize)]
struct LabelSearchRequest {
    keyword: String,
    #[serde(default)]
    equipment_no: Option<String>,
}

async fn label_search(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<LabelSearchRequest>,
) -> Result<Json<Value>, ApiError> {
    let user = authenticate(&state, &headers).await?;
    let hits = state.vfs.search_files(&user, &req.keyword).await?;
    let entries = hits.into_iter().map(|n| to_entry(&n, format!("/{}", n.name), String::new())).collect::<Vec<_>>();
    Ok(Json(json!({"entries": entries})))
}
