// Copyright (c) 2026 supernote-server contributors
// SPDX-License-Identifier: AGPL-3.0
//! Shared `axum` application state: `Arc`-typed handles to every application
//! service, constructed once by the `cli` binary and cloned per request.

use std::sync::Arc;
use std::time::Duration;

use crate::application::chunk_store::ChunkStore;
use crate::application::event_bus::EventBus;
use crate::application::file_service::FileService;
use crate::application::integrity_service::IntegrityService;
use crate::application::processor::ProcessorHandle;
use crate::application::search_service::SearchService;
use crate::application::sync_coordinator::SyncCoordinator;
use crate::application::url_signer::UrlSigner;
use crate::application::user_service::UserService;
use crate::application::vfs_service::VfsService;
use crate::domain::blob::BlobStore;

#[derive(Clone)]
pub struct AppState {
    pub vfs: Arc<VfsService>,
    pub files: Arc<FileService>,
    pub users: Arc<UserService>,
    pub sync: Arc<SyncCoordinator>,
    pub chunks: Arc<ChunkStore>,
    pub search: Arc<SearchService>,
    pub integrity: Arc<IntegrityService>,
    pub signer: Arc<UrlSigner>,
    pub blobs: Arc<dyn BlobStore>,
    pub events: Arc<EventBus>,
    /// Kept alive for the server's lifetime so its worker tasks aren't
    /// dropped; the HTTP layer never calls into it directly.
    pub processor: Arc<ProcessorHandle>,
    pub registration_enabled: bool,
    /// Configured sync-lease lifetime (spec §10), passed to
    /// [`SyncCoordinator::start`] on every `sync/start` call.
    pub lease_ttl: Duration,
}
