// Copyright (c) 2026 supernote-server contributors
// SPDX-License-Identifier: AGPL-3.0
//! Application layer: use-case orchestration over the domain's repository
//! and infrastructure-seam traits. Nothing here depends on axum or sqlx
//! directly — those belong to `presentation` and `infrastructure`.

pub mod chunk_store;
pub mod event_bus;
pub mod file_service;
pub mod ids;
pub mod integrity_service;
pub mod processor;
pub mod search_service;
pub mod sync_coordinator;
pub mod url_signer;
pub mod user_service;
pub mod vfs_service;
