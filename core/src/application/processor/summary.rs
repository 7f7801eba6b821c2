// Copyright (c) 2026 supernote-server contributors
// SPDX-License-Identifier: AGPL-3.0
//! Summary module (spec §4.7 step 3): runs once per file after all page work,
//! aggregating OCR transcripts into one `SUMMARY` and one `TRANSCRIPT`
//! `Summary` row keyed by a UUID derived from the file's `storage_key` so
//! reprocessing updates the same rows instead of duplicating them.

use async_trait::async_trait;
use chrono::Utc;

use crate::application::processor::module::{ModuleContext, PageRef, ProcessorModule};
use crate::domain::error::ProcessorError;
use crate::domain::summary::{summary_id_for, Summary, SummaryKind};
use crate::domain::system_task::{TaskStatus, TaskType, GLOBAL_TASK_KEY};

pub struct SummaryModule;

#[async_trait]
impl ProcessorModule for SummaryModule {
    fn name(&self) -> &'static str {
        "summary"
    }

    fn task_type(&self) -> TaskType {
        TaskType::Summary
    }

    async fn run_if_needed(&self, ctx: &ModuleContext, _page: Option<&PageRef>) -> Result<bool, ProcessorError> {
        let task = ctx.tasks.find(ctx.file_id, TaskType::Summary.as_str(), GLOBAL_TASK_KEY).await?;
        let completed = matches!(task, Some(ref t) if t.status == TaskStatus::Completed);
        if !completed {
            return Ok(true);
        }
        let has_summary = !ctx.summaries.list_for_file(ctx.file_id, SummaryKind::Summary).await?.is_empty();
        let has_transcript = !ctx.summaries.list_for_file(ctx.file_id, SummaryKind::Transcript).await?.is_empty();
        Ok(!(has_summary && has_transcript))
    }

    async fn process(&self, ctx: &ModuleContext, _page: Option<&PageRef>) -> Result<(), ProcessorError> {
        let pages = ctx.note_pages.list_for_file(ctx.file_id).await?;
        let mut ordered = pages;
        ordered.sort_by_key(|p| p.page_index);
        let transcript = ordered
            .iter()
            .filter_map(|p| p.text_content.as_deref())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");

        if transcript.is_empty() {
            return Ok(());
        }

        let _permit = ctx.limiter.acquire().await;
        let result = ctx.inference.summarize(&transcript).await.map_err(|e| ProcessorError::Inference(e.to_string()))?;
        drop(_permit);

        let now = Utc::now();
        ctx.summaries
            .upsert(Summary {
                id: summary_id_for(&ctx.storage_key, SummaryKind::Summary),
                user_id: ctx.user_id,
                file_id: ctx.file_id,
                kind: SummaryKind::Summary,
                title: result.title.clone(),
                content: result.summary,
                create_time: now,
                update_time: now,
            })
            .await?;
        ctx.summaries
            .upsert(Summary {
                id: summary_id_for(&ctx.storage_key, SummaryKind::Transcript),
                user_id: ctx.user_id,
                file_id: ctx.file_id,
                kind: SummaryKind::Transcript,
                title: result.title,
                content: result.transcript,
                create_time: now,
                update_time: now,
            })
            .await?;
        Ok(())
    }
}
