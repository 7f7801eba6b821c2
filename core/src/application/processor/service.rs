// Copyright (c) 2026 supernote-server contributors
// SPDX-License-Identifier: AGPL-3.0
//! ProcessorService (spec §4.7): a per-file-deduped FIFO queue, a worker
//! pool, recovery of interrupted work on start, and the fixed per-file
//! pipeline hashing → (PNG → OCR → EMBEDDING) per page → summary.

use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::application::event_bus::EventBus;
use crate::application::processor::embedding::EmbeddingModule;
use crate::application::processor::hashing::HashingModule;
use crate::application::processor::module::{self, InferenceLimiter, ModuleContext, PageRef};
use crate::application::processor::ocr::OcrModule;
use crate::application::processor::png::PngModule;
use crate::application::processor::summary::SummaryModule;
use crate::domain::blob::{BlobStore, Bucket};
use crate::domain::error::ProcessorError;
use crate::domain::events::DomainEvent;
use crate::domain::inference::InferenceService;
use crate::domain::renderer::Renderer;
use crate::domain::repository::{NotePageRepository, SummaryRepository, SystemTaskRepository, VfsRepository};

const DEFAULT_INFERENCE_PERMITS: usize = 2;

struct WorkItem {
    user_id: i64,
    file_id: i64,
}

/// Shutdown + join handles for a running `ProcessorService`. Dropping this
/// without calling `shutdown` leaves the workers running; hold onto it for
/// the server's lifetime.
pub struct ProcessorHandle {
    workers: Vec<JoinHandle<()>>,
    listener: JoinHandle<()>,
    shutdown: Arc<Notify>,
}

impl ProcessorHandle {
    /// Signals workers to stop at their next suspension point and waits for
    /// them to drain (spec §5: "workers stop on shutdown signal; in-flight
    /// processing completes the current stage").
    pub async fn shutdown(self) {
        self.shutdown.notify_waiters();
        self.listener.abort();
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

pub struct ProcessorService {
    vfs: Arc<dyn VfsRepository>,
    blobs: Arc<dyn BlobStore>,
    note_pages: Arc<dyn NotePageRepository>,
    tasks: Arc<dyn SystemTaskRepository>,
    summaries: Arc<dyn SummaryRepository>,
    renderer: Arc<dyn Renderer>,
    inference: Arc<dyn InferenceService>,
    events: Arc<EventBus>,
    limiter: Arc<InferenceLimiter>,
    concurrency: usize,

    hashing: HashingModule,
    png: PngModule,
    ocr: OcrModule,
    embedding: EmbeddingModule,
    summary: SummaryModule,

    sender: mpsc::UnboundedSender<WorkItem>,
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<WorkItem>>>,
    in_flight: Mutex<HashSet<i64>>,
}

impl ProcessorService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        vfs: Arc<dyn VfsRepository>,
        blobs: Arc<dyn BlobStore>,
        note_pages: Arc<dyn NotePageRepository>,
        tasks: Arc<dyn SystemTaskRepository>,
        summaries: Arc<dyn SummaryRepository>,
        renderer: Arc<dyn Renderer>,
        inference: Arc<dyn InferenceService>,
        events: Arc<EventBus>,
        concurrency: usize,
        inference_permits: Option<usize>,
    ) -> Arc<Self> {
        let (sender, receiver) = mpsc::unbounded_channel();
        Arc::new(Self {
            vfs,
            blobs,
            note_pages,
            tasks,
            summaries,
            renderer,
            inference,
            events,
            limiter: Arc::new(InferenceLimiter::new(inference_permits.unwrap_or(DEFAULT_INFERENCE_PERMITS))),
            concurrency: concurrency.max(1),
            hashing: HashingModule,
            png: PngModule,
            ocr: OcrModule,
            embedding: EmbeddingModule,
            summary: SummaryModule,
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
            in_flight: Mutex::new(HashSet::new()),
        })
    }

    /// Enqueues `file_id` unless it already has pending or in-flight work
    /// (spec §4.7: "re-enqueuing the same file while it is in flight is a
    /// no-op").
    async fn enqueue(self: &Arc<Self>, user_id: i64, file_id: i64) {
        let mut in_flight = self.in_flight.lock().await;
        if !in_flight.insert(file_id) {
            return;
        }
        drop(in_flight);
        if self.sender.send(WorkItem { user_id, file_id }).is_err() {
            self.in_flight.lock().await.remove(&file_id);
        }
    }

    /// Scans `SystemTask` for non-COMPLETED rows and re-enqueues their
    /// (deduped) file_ids, resolving each file's owner via
    /// `VfsRepository::find_owner`. Files whose owner can't be resolved are
    /// skipped (most likely deleted since the task row was written).
    async fn recover(self: &Arc<Self>) {
        let incomplete = match self.tasks.list_incomplete().await {
            Ok(rows) => rows,
            Err(e) => {
                error!(error = %e, "failed to list incomplete system tasks during recovery");
                return;
            }
        };
        let mut seen = HashSet::new();
        for task in incomplete {
            if !seen.insert(task.file_id) {
                continue;
            }
            match self.vfs.find_owner(task.file_id).await {
                Ok(Some(user_id)) => self.enqueue(user_id, task.file_id).await,
                Ok(None) => warn!(file_id = task.file_id, "skipping recovery for file with unresolvable owner"),
                Err(e) => error!(file_id = task.file_id, error = %e, "failed to resolve file owner during recovery"),
            }
        }
    }

    /// Starts recovery, the event-bus listener, and the worker pool.
    pub async fn spawn(self: &Arc<Self>) -> ProcessorHandle {
        self.recover().await;

        let shutdown = Arc::new(Notify::new());

        let mut workers = Vec::with_capacity(self.concurrency);
        for _ in 0..self.concurrency {
            let service = Arc::clone(self);
            let receiver = Arc::clone(&self.receiver);
            let shutdown = Arc::clone(&shutdown);
            workers.push(tokio::spawn(async move {
                loop {
                    let item = {
                        let mut rx = receiver.lock().await;
                        tokio::select! {
                            _ = shutdown.notified() => None,
                            item = rx.recv() => item,
                        }
                    };
                    match item {
                        Some(item) => {
                            service.process_file(item.user_id, item.file_id).await;
                            service.in_flight.lock().await.remove(&item.file_id);
                        }
                        None => break,
                    }
                }
            }));
        }

        let events = Arc::clone(&self.events);
        let service = Arc::clone(self);
        let listener = tokio::spawn(async move {
            let mut rx = events.subscribe();
            loop {
                match rx.recv().await {
                    Ok(DomainEvent::NoteUpdated { user_id, file_id, .. }) => {
                        service.enqueue(user_id, file_id).await;
                    }
                    Ok(DomainEvent::NoteDeleted { user_id: _, file_id }) => {
                        service.handle_delete(file_id).await;
                    }
                    Err(e) => {
                        warn!(error = %e, "processor event listener lagging or closed");
                    }
                }
            }
        });

        ProcessorHandle { workers, listener, shutdown }
    }

    /// Cleans up all derived state for a deleted file (spec §4.7's deletion
    /// handling).
    async fn handle_delete(&self, file_id: i64) {
        if let Err(e) = self.note_pages.delete_for_file(file_id).await {
            error!(file_id, error = %e, "failed to delete note pages for removed file");
        }
        if let Err(e) = self.tasks.delete_for_file(file_id).await {
            error!(file_id, error = %e, "failed to delete system tasks for removed file");
        }
        if let Err(e) = self.blobs.delete_prefix(Bucket::Cache, &format!("{file_id}/pages")).await {
            error!(file_id, error = %e, "failed to delete cache artifacts for removed file");
        }
    }

    /// Runs the full pipeline for one file: hashing, then per-page PNG → OCR
    /// → EMBEDDING fanned out in parallel, then summary (spec §4.7).
    async fn process_file(&self, user_id: i64, file_id: i64) {
        if let Err(e) = self.process_file_inner(user_id, file_id).await {
            error!(file_id, error = %e, "file processing pipeline failed unexpectedly");
        }
    }

    async fn process_file_inner(&self, user_id: i64, file_id: i64) -> Result<(), ProcessorError> {
        let node = match self.vfs.find_by_id(user_id, file_id).await? {
            Some(node) => node,
            None => return Ok(()), // deleted concurrently; NoteDeleted already cleans up
        };
        let Some(storage_key) = node.storage_key else {
            return Ok(());
        };
        let notebook_bytes = self.blobs.get(Bucket::UserData, &storage_key).await?;

        let ctx = ModuleContext {
            file_id,
            user_id,
            storage_key,
            notebook_bytes,
            renderer: Arc::clone(&self.renderer),
            inference: Arc::clone(&self.inference),
            blobs: Arc::clone(&self.blobs),
            note_pages: Arc::clone(&self.note_pages),
            tasks: Arc::clone(&self.tasks),
            summaries: Arc::clone(&self.summaries),
            limiter: Arc::clone(&self.limiter),
        };

        let hashing_ok = module::run(&self.hashing, &ctx, None).await?;
        if !hashing_ok {
            info!(file_id, "hashing module failed; skipping page work and summary this pass");
            return Ok(());
        }

        let pages = self.note_pages.list_for_file(file_id).await?;
        let page_refs: Vec<PageRef> = pages.iter().map(|p| PageRef { page_index: p.page_index, page_id: p.page_id.clone() }).collect();

        let page_futures = page_refs.into_iter().map(|page| {
            let ctx = &ctx;
            let png = &self.png;
            let ocr = &self.ocr;
            let embedding = &self.embedding;
            async move {
                let png_ok = module::run(png, ctx, Some(&page)).await.unwrap_or_else(|e| {
                    warn!(file_id = ctx.file_id, page_id = %page.page_id, error = %e, "png module errored");
                    false
                });
                if !png_ok {
                    return;
                }
                let ocr_ok = module::run(ocr, ctx, Some(&page)).await.unwrap_or_else(|e| {
                    warn!(file_id = ctx.file_id, page_id = %page.page_id, error = %e, "ocr module errored");
                    false
                });
                if !ocr_ok {
                    return;
                }
                if let Err(e) = module::run(embedding, ctx, Some(&page)).await {
                    warn!(file_id = ctx.file_id, page_id = %page.page_id, error = %e, "embedding module errored");
                }
            }
        });
        futures::future::join_all(page_futures).await;

        if let Err(e) = module::run(&self.summary, &ctx, None).await {
            warn!(file_id, error = %e, "summary module errored");
        }

        Ok(())
    }
}
