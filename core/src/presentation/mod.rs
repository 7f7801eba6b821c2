// Copyright (c) 2026 supernote-server contributors
// SPDX-License-Identifier: AGPL-3.0
//! Presentation layer: three independent `axum` routers — `device` (vendor
//! device API), `web` (browser/web-client API), and `oss` (signature-auth
//! object storage) — merged under a single [`AppState`](state::AppState) by
//! [`router`].

pub mod device;
pub mod error;
pub mod oss;
pub mod state;
pub mod web;

use axum::Router;

use crate::presentation::state::AppState;

/// The full HTTP surface (spec §10): the device, web, and OSS sub-routers
/// merged into one tree. Callers add their own tracing/compression layers.
pub fn router() -> Router<AppState> {
    Router::new().merge(device::router()).merge(web::router()).merge(oss::router())
}
