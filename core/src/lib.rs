// Copyright (c) 2026 supernote-server contributors
// SPDX-License-Identifier: AGPL-3.0
//! # supernote-server-core
//!
//! Domain, application, infrastructure and presentation layers for a
//! self-hosted sync server that impersonates a vendor-proprietary backend
//! for a family of handwriting e-ink tablets, while also exposing a web API
//! and a semantic search API over notebook contents.
//!
//! ## Core subsystems
//!
//! | Subsystem | Module | Responsibility |
//! |---|---|---|
//! | Virtual Filesystem | [`application::vfs_service`] | soft-delete tree, recycle bin, flattened web view |
//! | Blob store | [`domain::blob`], [`infrastructure::storage::local`] | content-addressed object storage |
//! | Chunked upload | [`application::chunk_store`] | resumable chunk staging and merge |
//! | Signed URLs | [`application::url_signer`] | HMAC-signed, single-use, time-boxed URLs |
//! | File orchestration | [`application::file_service`] | upload/download/move/copy glue |
//! | Sync coordination | [`application::sync_coordinator`] | per-user exclusive sync lease |
//! | Content pipeline | [`application::processor`] | hash → rasterize → OCR → embed → summarize |
//! | Semantic search | [`application::search_service`] | query embedding + cosine ranking |
//! | Integrity audit | [`application::integrity_service`] | VFS-vs-blob consistency scan |
//!
//! ## Layer structure
//!
//! ```text
//! presentation/   ← HTTP API (axum): device, web, and public OSS routers
//!     ↓
//! application/    ← use-cases, service orchestration
//!     ↓
//! domain/         ← aggregates, value objects, repository/seam traits
//!     ↓
//! infrastructure/ ← Postgres repositories, in-memory repositories, local blob store
//! ```

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
