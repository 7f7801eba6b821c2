// Copyright (c) 2026 supernote-server contributors
// SPDX-License-Identifier: AGPL-3.0
//! Infrastructure layer: concrete adapters for the domain's repository and
//! seam traits — Postgres and in-memory repositories, the local-filesystem
//! BlobStore, the Postgres connection pool wrapper, the placeholder
//! Renderer, and the HTTP InferenceService client.

pub mod db;
pub mod inference;
pub mod renderer;
pub mod repositories;
pub mod storage;
