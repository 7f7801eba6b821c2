// Copyright (c) 2026 supernote-server contributors
// SPDX-License-Identifier: AGPL-3.0
//! Repository traits: pure interfaces the application layer depends on.
//! Infrastructure provides both a Postgres-backed and an in-memory
//! implementation of each, selected by [`StorageBackend`] (spec §9: "permits
//! substitution of an in-process map (tests) for the SQL-backed
//! implementation (production) without changes to consumers").

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::chunk::ChunkUpload;
use crate::domain::error::RepositoryError;
use crate::domain::note_page::NotePage;
use crate::domain::summary::{Summary, SummaryKind, SummaryTag};
use crate::domain::system_task::SystemTask;
use crate::domain::user::{LoginRecord, User};
use crate::domain::vfs::{RecycleEntry, UserFileNode};

#[derive(Clone)]
pub enum StorageBackend {
    InMemory,
    PostgreSql(PgPool),
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, RepositoryError>;
    async fn count(&self) -> Result<i64, RepositoryError>;
    async fn insert(&self, user: User) -> Result<User, RepositoryError>;
    async fn update_active(&self, id: i64, is_active: bool) -> Result<(), RepositoryError>;
    async fn list(&self) -> Result<Vec<User>, RepositoryError>;
    async fn insert_login_record(&self, record: LoginRecord) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait VfsRepository: Send + Sync {
    async fn insert_node(&self, node: UserFileNode) -> Result<UserFileNode, RepositoryError>;
    async fn update_node(&self, node: UserFileNode) -> Result<UserFileNode, RepositoryError>;
    async fn find_by_id(&self, user_id: i64, id: i64) -> Result<Option<UserFileNode>, RepositoryError>;
    /// Resolves a node's owning `user_id` without already knowing it, for
    /// background jobs (ProcessorService recovery) that only have a
    /// `file_id` from a `SystemTask` row.
    async fn find_owner(&self, id: i64) -> Result<Option<i64>, RepositoryError>;
    async fn find_by_parent_and_name(
        &self,
        user_id: i64,
        parent_id: i64,
        name: &str,
    ) -> Result<Option<UserFileNode>, RepositoryError>;
    async fn list_children(&self, user_id: i64, parent_id: i64) -> Result<Vec<UserFileNode>, RepositoryError>;
    async fn list_descendants(&self, user_id: i64, parent_id: i64) -> Result<Vec<UserFileNode>, RepositoryError>;
    async fn search(&self, user_id: i64, keyword: &str) -> Result<Vec<UserFileNode>, RepositoryError>;
    async fn deactivate_subtree(&self, user_id: i64, root_id: i64) -> Result<Vec<UserFileNode>, RepositoryError>;
    async fn reactivate_subtree(&self, user_id: i64, root_id: i64) -> Result<Vec<UserFileNode>, RepositoryError>;
    async fn count_active_files(&self, user_id: i64) -> Result<i64, RepositoryError>;
    async fn sum_active_size(&self, user_id: i64) -> Result<i64, RepositoryError>;
    async fn list_active_files(&self, user_id: i64) -> Result<Vec<UserFileNode>, RepositoryError>;

    async fn insert_recycle_entry(&self, entry: RecycleEntry) -> Result<RecycleEntry, RepositoryError>;
    async fn find_recycle_entry(&self, user_id: i64, id: i64) -> Result<Option<RecycleEntry>, RepositoryError>;
    async fn list_recycle_entries(&self, user_id: i64) -> Result<Vec<RecycleEntry>, RepositoryError>;
    async fn delete_recycle_entry(&self, user_id: i64, id: i64) -> Result<(), RepositoryError>;
    async fn clear_recycle_entries(&self, user_id: i64) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait ChunkRepository: Send + Sync {
    async fn get(&self, user_id: i64, upload_id: &str) -> Result<Option<ChunkUpload>, RepositoryError>;
    async fn put(&self, upload: ChunkUpload) -> Result<(), RepositoryError>;
    async fn delete(&self, user_id: i64, upload_id: &str) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait NotePageRepository: Send + Sync {
    async fn upsert(&self, page: NotePage) -> Result<(), RepositoryError>;
    async fn find(&self, file_id: i64, page_id: &str) -> Result<Option<NotePage>, RepositoryError>;
    async fn list_for_file(&self, file_id: i64) -> Result<Vec<NotePage>, RepositoryError>;
    async fn delete(&self, file_id: i64, page_id: &str) -> Result<(), RepositoryError>;
    async fn delete_for_file(&self, file_id: i64) -> Result<(), RepositoryError>;
    async fn clear_content(&self, file_id: i64, page_id: &str) -> Result<(), RepositoryError>;
    /// Candidates for semantic search: pages with a non-null embedding,
    /// joined against the user's active file nodes.
    async fn search_candidates(
        &self,
        user_id: i64,
        name_filter: Option<&str>,
    ) -> Result<Vec<(NotePage, String)>, RepositoryError>;
}

#[async_trait]
pub trait SystemTaskRepository: Send + Sync {
    async fn upsert(&self, task: SystemTask) -> Result<(), RepositoryError>;
    async fn find(&self, file_id: i64, task_type: &str, key: &str) -> Result<Option<SystemTask>, RepositoryError>;
    async fn delete(&self, file_id: i64, task_type: &str, key: &str) -> Result<(), RepositoryError>;
    async fn delete_for_file(&self, file_id: i64) -> Result<(), RepositoryError>;
    async fn list_incomplete(&self) -> Result<Vec<SystemTask>, RepositoryError>;
}

#[async_trait]
pub trait SummaryRepository: Send + Sync {
    async fn upsert(&self, summary: Summary) -> Result<(), RepositoryError>;
    async fn find(&self, id: Uuid) -> Result<Option<Summary>, RepositoryError>;
    async fn list_for_file(&self, file_id: i64, kind: SummaryKind) -> Result<Vec<Summary>, RepositoryError>;
    async fn add_tag(&self, tag: SummaryTag) -> Result<(), RepositoryError>;
    async fn search_by_tag(&self, user_id: i64, keyword: &str) -> Result<Vec<Summary>, RepositoryError>;
}

/// Lease state for `SyncCoordinator`, persisted separately from the generic
/// KV store so lease lookups don't depend on the CoordinationService's
/// string-typed value encoding.
#[async_trait]
pub trait SyncLeaseRepository: Send + Sync {
    async fn get(&self, user_email: &str) -> Result<Option<(String, DateTime<Utc>)>, RepositoryError>;
    async fn set(&self, user_email: &str, equipment_no: &str, expires_at: DateTime<Utc>) -> Result<(), RepositoryError>;
    async fn clear(&self, user_email: &str) -> Result<(), RepositoryError>;
}
