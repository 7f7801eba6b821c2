// Copyright (c) 2026 supernote-server contributors
// SPDX-License-Identifier: AGPL-3.0
//! OCR module (spec §4.7): depends on the PNG module having already run this
//! pass (enforced by `service::process_file`'s sequential gating, not by this
//! module); reads the cached PNG and writes `NotePage.text_content`.

use async_trait::async_trait;

use crate::application::processor::module::{ModuleContext, PageRef, ProcessorModule};
use crate::domain::blob::Bucket;
use crate::domain::error::ProcessorError;
use crate::domain::system_task::{page_task_key, TaskStatus, TaskType};

pub struct OcrModule;

#[async_trait]
impl ProcessorModule for OcrModule {
    fn name(&self) -> &'static str {
        "ocr"
    }

    fn task_type(&self) -> TaskType {
        TaskType::Ocr
    }

    async fn run_if_needed(&self, ctx: &ModuleContext, page: Option<&PageRef>) -> Result<bool, ProcessorError> {
        let page = page.expect("ocr module always runs per-page");
        let key = page_task_key(&page.page_id);
        let task = ctx.tasks.find(ctx.file_id, TaskType::Ocr.as_str(), &key).await?;
        let completed = matches!(task, Some(ref t) if t.status == TaskStatus::Completed);
        if !completed {
            return Ok(true);
        }
        let has_text = ctx
            .note_pages
            .find(ctx.file_id, &page.page_id)
            .await?
            .and_then(|p| p.text_content)
            .is_some_and(|t| !t.is_empty());
        Ok(!has_text)
    }

    async fn process(&self, ctx: &ModuleContext, page: Option<&PageRef>) -> Result<(), ProcessorError> {
        let page = page.expect("ocr module always runs per-page");
        let png = ctx.blobs.get(Bucket::Cache, &format!("{}/pages/{}.png", ctx.file_id, page.page_id)).await?;

        let _permit = ctx.limiter.acquire().await;
        let text = ctx.inference.ocr_page(png).await.map_err(|e| ProcessorError::Inference(e.to_string()))?;
        drop(_permit);

        let mut note_page = ctx
            .note_pages
            .find(ctx.file_id, &page.page_id)
            .await?
            .ok_or_else(|| crate::domain::error::StorageError::NotFound(page.page_id.clone()).into())?;
        note_page.text_content = Some(text);
        ctx.note_pages.upsert(note_page).await?;
        Ok(())
    }
}
