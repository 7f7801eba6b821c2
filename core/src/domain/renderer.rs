// Copyright (c) 2026 supernote-server contributors
// SPDX-License-Identifier: AGPL-3.0
//! The notebook binary parser and rasterizer are out of scope (spec §1);
//! this trait is the opaque seam the hashing/PNG processor modules call
//! through.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to parse notebook: {0}")]
    Parse(String),
    #[error("failed to rasterize page {0}")]
    Rasterize(i32),
}

#[derive(Debug, Clone)]
pub struct PageDescriptor {
    pub page_index: i32,
    pub page_id: String,
    pub content_hash: String,
}

#[async_trait]
pub trait Renderer: Send + Sync {
    /// Parses a notebook's bytes and enumerates its pages with stable
    /// `page_id`s and per-page `content_hash`es, in index order.
    async fn enumerate_pages(&self, notebook_bytes: &[u8]) -> Result<Vec<PageDescriptor>, RenderError>;

    /// Rasterizes a single page to a PNG byte buffer.
    async fn render_page_png(&self, notebook_bytes: &[u8], page_index: i32) -> Result<Bytes, RenderError>;
}
