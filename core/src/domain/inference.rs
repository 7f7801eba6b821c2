// Copyright (c) 2026 supernote-server contributors
// SPDX-License-Identifier: AGPL-3.0
//! The external generative-model client is out of scope (spec §1); this
//! trait is the opaque seam OCR, embedding, and summary modules call
//! through. Implementations are responsible for their own outbound
//! concurrency limiting (spec §4.7's semaphore).

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("inference service unavailable: {0}")]
    Unavailable(String),
    #[error("inference service returned an unexpected response: {0}")]
    BadResponse(String),
}

#[derive(Debug, Clone)]
pub struct SummaryResult {
    pub title: String,
    pub summary: String,
    pub transcript: String,
}

#[async_trait]
pub trait InferenceService: Send + Sync {
    async fn ocr_page(&self, png: Bytes) -> Result<String, InferenceError>;
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, InferenceError>;
    async fn summarize(&self, transcript: &str) -> Result<SummaryResult, InferenceError>;
}
