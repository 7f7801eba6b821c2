// Copyright (c) 2026 supernote-server contributors
// SPDX-License-Identifier: AGPL-3.0
//! Hashing module (spec §4.7 step 1): parses the notebook, upserts per-page
//! `NotePage` rows, invalidates downstream state for changed or removed
//! pages. Always runs — its own idempotent re-parse *is* the change
//! detection, so there is no stable end-state artifact to gate on.

use async_trait::async_trait;
use std::collections::HashSet;

use crate::application::processor::module::{ModuleContext, PageRef, ProcessorModule};
use crate::domain::error::ProcessorError;
use crate::domain::note_page::NotePage;
use crate::domain::system_task::{page_task_key, TaskType};

pub struct HashingModule;

#[async_trait]
impl ProcessorModule for HashingModule {
    fn name(&self) -> &'static str {
        "hashing"
    }

    fn task_type(&self) -> TaskType {
        TaskType::Hashing
    }

    async fn run_if_needed(&self, _ctx: &ModuleContext, _page: Option<&PageRef>) -> Result<bool, ProcessorError> {
        Ok(true)
    }

    async fn process(&self, ctx: &ModuleContext, _page: Option<&PageRef>) -> Result<(), ProcessorError> {
        let descriptors = ctx
            .renderer
            .enumerate_pages(&ctx.notebook_bytes)
            .await
            .map_err(|e| ProcessorError::Renderer(e.to_string()))?;

        let existing = ctx.note_pages.list_for_file(ctx.file_id).await?;
        let seen: HashSet<&str> = descriptors.iter().map(|d| d.page_id.as_str()).collect();

        for stale in existing.iter().filter(|p| !seen.contains(p.page_id.as_str())) {
            ctx.note_pages.delete(ctx.file_id, &stale.page_id).await?;
            let key = page_task_key(&stale.page_id);
            for task_type in [TaskType::PngConversion, TaskType::Ocr, TaskType::Embedding] {
                ctx.tasks.delete(ctx.file_id, task_type.as_str(), &key).await?;
            }
            ctx.blobs.delete(crate::domain::blob::Bucket::Cache, &format!("{}/pages/{}.png", ctx.file_id, stale.page_id)).await?;
        }

        for d in &descriptors {
            let prior = existing.iter().find(|p| p.page_id == d.page_id);
            let changed = prior.map(|p| p.content_hash != d.content_hash).unwrap_or(true);

            if changed {
                ctx.note_pages
                    .upsert(NotePage {
                        file_id: ctx.file_id,
                        page_index: d.page_index,
                        page_id: d.page_id.clone(),
                        content_hash: d.content_hash.clone(),
                        text_content: None,
                        embedding: None,
                    })
                    .await?;
                // Invalidate downstream stages so the next pass re-runs
                // PNG, OCR and EMBEDDING for this page (spec §8 scenario 5).
                let key = page_task_key(&d.page_id);
                ctx.tasks.delete(ctx.file_id, TaskType::PngConversion.as_str(), &key).await?;
                ctx.tasks.delete(ctx.file_id, TaskType::Ocr.as_str(), &key).await?;
                ctx.tasks.delete(ctx.file_id, TaskType::Embedding.as_str(), &key).await?;
            } else if prior.map(|p| p.page_index) != Some(d.page_index) {
                // Page reordered without content changing: keep downstream
                // artifacts, just correct the index.
                if let Some(mut page) = ctx.note_pages.find(ctx.file_id, &d.page_id).await? {
                    page.page_index = d.page_index;
                    ctx.note_pages.upsert(page).await?;
                }
            }
        }

        Ok(())
    }
}
