// Copyright (c) 2026 supernote-server contributors
// SPDX-License-Identifier: AGPL-3.0
//! PNG-rasterization module (spec §4.7, §8: "for every SystemTask COMPLETED
//! for PNG_CONVERSION, the CACHE blob `<file_id>/pages/<id>.png` exists").

use async_trait::async_trait;

use crate::application::processor::module::{ModuleContext, PageRef, ProcessorModule};
use crate::domain::blob::Bucket;
use crate::domain::error::ProcessorError;
use crate::domain::system_task::{page_task_key, TaskStatus, TaskType};

pub struct PngModule;

fn cache_key(file_id: i64, page_id: &str) -> String {
    format!("{file_id}/pages/{page_id}.png")
}

#[async_trait]
impl ProcessorModule for PngModule {
    fn name(&self) -> &'static str {
        "png"
    }

    fn task_type(&self) -> TaskType {
        TaskType::PngConversion
    }

    async fn run_if_needed(&self, ctx: &ModuleContext, page: Option<&PageRef>) -> Result<bool, ProcessorError> {
        let page = page.expect("png module always runs per-page");
        let key = page_task_key(&page.page_id);
        let task = ctx.tasks.find(ctx.file_id, TaskType::PngConversion.as_str(), &key).await?;
        let completed = matches!(task, Some(ref t) if t.status == TaskStatus::Completed);
        if !completed {
            return Ok(true);
        }
        let exists = ctx.blobs.exists(Bucket::Cache, &cache_key(ctx.file_id, &page.page_id)).await?;
        Ok(!exists)
    }

    async fn process(&self, ctx: &ModuleContext, page: Option<&PageRef>) -> Result<(), ProcessorError> {
        let page = page.expect("png module always runs per-page");
        let png = ctx
            .renderer
            .render_page_png(&ctx.notebook_bytes, page.page_index)
            .await
            .map_err(|e| ProcessorError::Renderer(e.to_string()))?;
        ctx.blobs.put(Bucket::Cache, &cache_key(ctx.file_id, &page.page_id), png).await?;
        Ok(())
    }
}
