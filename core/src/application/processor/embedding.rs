// Copyright (c) 2026 supernote-server contributors
// SPDX-License-Identifier: AGPL-3.0
//! Embedding module (spec §4.7): depends on non-empty `text_content`; writes
//! a JSON-encoded float vector so embeddings stay readable through the
//! `NotePage.embedding: Option<serde_json::Value>` column without a
//! bytea/pgvector dependency (spec §8: "Embedding is present only if
//! text_content is non-empty").

use async_trait::async_trait;

use crate::application::processor::module::{ModuleContext, PageRef, ProcessorModule};
use crate::domain::error::ProcessorError;
use crate::domain::system_task::{page_task_key, TaskStatus, TaskType};

pub struct EmbeddingModule;

#[async_trait]
impl ProcessorModule for EmbeddingModule {
    fn name(&self) -> &'static str {
        "embedding"
    }

    fn task_type(&self) -> TaskType {
        TaskType::Embedding
    }

    async fn run_if_needed(&self, ctx: &ModuleContext, page: Option<&PageRef>) -> Result<bool, ProcessorError> {
        let page = page.expect("embedding module always runs per-page");
        let key = page_task_key(&page.page_id);
        let task = ctx.tasks.find(ctx.file_id, TaskType::Embedding.as_str(), &key).await?;
        let completed = matches!(task, Some(ref t) if t.status == TaskStatus::Completed);
        if !completed {
            return Ok(true);
        }
        let has_embedding = ctx.note_pages.find(ctx.file_id, &page.page_id).await?.and_then(|p| p.embedding).is_some();
        Ok(!has_embedding)
    }

    async fn process(&self, ctx: &ModuleContext, page: Option<&PageRef>) -> Result<(), ProcessorError> {
        let page = page.expect("embedding module always runs per-page");
        let mut note_page = ctx
            .note_pages
            .find(ctx.file_id, &page.page_id)
            .await?
            .ok_or_else(|| crate::domain::error::StorageError::NotFound(page.page_id.clone()).into())?;

        let text = match note_page.text_content.as_deref() {
            Some(t) if !t.is_empty() => t,
            _ => return Ok(()), // nothing to embed yet; next OCR pass will supply text
        };

        let _permit = ctx.limiter.acquire().await;
        let vector = ctx.inference.embed_text(text).await.map_err(|e| ProcessorError::Inference(e.to_string()))?;
        drop(_permit);

        note_page.embedding = Some(serde_json::to_value(vector).expect("Vec<f32> always serializes"));
        ctx.note_pages.upsert(note_page).await?;
        Ok(())
    }
}
