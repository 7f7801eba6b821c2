// Copyright (c) 2026 supernote-server contributors
// SPDX-License-Identifier: AGPL-3.0
//! The processing module contract (spec §4.7): `name`, `task_type`,
//! `run_if_needed` (the hybrid gate) and `process`. `run` is the shared
//! wrapper every module goes through — it owns the `SystemTask` bookkeeping
//! so individual modules only implement the gate check and the work itself.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{OnceCell, Semaphore};

use crate::domain::blob::BlobStore;
use crate::domain::error::ProcessorError;
use crate::domain::inference::InferenceService;
use crate::domain::renderer::Renderer;
use crate::domain::repository::{NotePageRepository, SummaryRepository, SystemTaskRepository};
use crate::domain::system_task::{page_task_key, SystemTask, TaskStatus, GLOBAL_TASK_KEY};

/// A lightweight reference to a page, enough for per-page modules to key
/// their SystemTask row and re-fetch fresh state; modules never trust a
/// `NotePage` snapshot taken before an earlier stage ran.
#[derive(Debug, Clone)]
pub struct PageRef {
    pub page_index: i32,
    pub page_id: String,
}

/// Shared dependencies every module needs, assembled once per `process_file`
/// call (spec §4.7's module contract lists these as `session`).
pub struct ModuleContext {
    pub file_id: i64,
    pub user_id: i64,
    pub storage_key: String,
    pub notebook_bytes: bytes::Bytes,
    pub renderer: Arc<dyn Renderer>,
    pub inference: Arc<dyn InferenceService>,
    pub blobs: Arc<dyn BlobStore>,
    pub note_pages: Arc<dyn NotePageRepository>,
    pub tasks: Arc<dyn SystemTaskRepository>,
    pub summaries: Arc<dyn SummaryRepository>,
    pub limiter: Arc<InferenceLimiter>,
}

/// Caps simultaneous outbound inference calls across every worker (spec
/// §4.7's external-service limiter), lazily creating its semaphore on first
/// acquire rather than at construction.
pub struct InferenceLimiter {
    permits: usize,
    semaphore: OnceCell<Arc<Semaphore>>,
}

impl InferenceLimiter {
    pub fn new(permits: usize) -> Self {
        Self { permits, semaphore: OnceCell::new() }
    }

    async fn semaphore(&self) -> Arc<Semaphore> {
        self.semaphore.get_or_init(|| async { Arc::new(Semaphore::new(self.permits.max(1))) }).await.clone()
    }

    pub async fn acquire(&self) -> InferencePermit {
        let semaphore = self.semaphore().await;
        let permit = semaphore.clone().acquire_owned().await.expect("semaphore never closed");
        InferencePermit { _semaphore: semaphore, _permit: permit }
    }
}

/// An acquired inference permit; held for the duration of one outbound call
/// and dropped to free the slot.
pub struct InferencePermit {
    _semaphore: Arc<Semaphore>,
    _permit: tokio::sync::OwnedSemaphorePermit,
}

#[async_trait]
pub trait ProcessorModule: Send + Sync {
    fn name(&self) -> &'static str;
    fn task_type(&self) -> crate::domain::system_task::TaskType;

    /// The hybrid gate: false only when the SystemTask row is COMPLETED *and*
    /// the end-state artifact already exists; true otherwise.
    async fn run_if_needed(&self, ctx: &ModuleContext, page: Option<&PageRef>) -> Result<bool, ProcessorError>;

    async fn process(&self, ctx: &ModuleContext, page: Option<&PageRef>) -> Result<(), ProcessorError>;
}

fn task_key(page: Option<&PageRef>) -> String {
    match page {
        Some(p) => page_task_key(&p.page_id),
        None => GLOBAL_TASK_KEY.to_string(),
    }
}

/// Runs one module to completion against the hybrid gate, recording the
/// outcome in `SystemTask`. Returns `Ok(true)` on success-or-skip, `Ok(false)`
/// on a caught processing failure (never propagated — spec §7: "Processor
/// modules catch all exceptions internally ... and never propagate").
pub async fn run(module: &dyn ProcessorModule, ctx: &ModuleContext, page: Option<&PageRef>) -> Result<bool, ProcessorError> {
    let key = task_key(page);
    let task_type = module.task_type().as_str();

    if !module.run_if_needed(ctx, page).await? {
        return Ok(true);
    }

    let retry_count = ctx.tasks.find(ctx.file_id, task_type, &key).await?.map(|t| t.retry_count).unwrap_or(0);

    ctx.tasks
        .upsert(SystemTask {
            file_id: ctx.file_id,
            task_type: task_type.to_string(),
            key: key.clone(),
            status: TaskStatus::Processing,
            retry_count,
            last_error: None,
            update_time: Utc::now(),
        })
        .await?;

    match module.process(ctx, page).await {
        Ok(()) => {
            ctx.tasks
                .upsert(SystemTask {
                    file_id: ctx.file_id,
                    task_type: task_type.to_string(),
                    key,
                    status: TaskStatus::Completed,
                    retry_count,
                    last_error: None,
                    update_time: Utc::now(),
                })
                .await?;
            Ok(true)
        }
        Err(e) => {
            ctx.tasks
                .upsert(SystemTask {
                    file_id: ctx.file_id,
                    task_type: task_type.to_string(),
                    key,
                    status: TaskStatus::Failed,
                    retry_count: retry_count + 1,
                    last_error: Some(e.to_string()),
                    update_time: Utc::now(),
                })
                .await?;
            Ok(false)
        }
    }
}
