// Copyright (c) 2026 supernote-server contributors
// SPDX-License-Identifier: AGPL-3.0
//! PostgreSQL-backed repository implementations, one struct per trait in
//! [`crate::domain::repository`] plus [`PostgresCoordinationService`] (spec
//! §9: "permits substitution ... without changes to consumers"). Queries are
//! raw `sqlx::query` + `Row::try_get` rather than the `query!` compile-time
//! macro, since no live database is available to check against at build time
//! here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::Row;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::chunk::{ChunkPart, ChunkUpload};
use crate::domain::coordination::CoordinationService;
use crate::domain::error::{CoordinationError, RepositoryError};
use crate::domain::note_page::NotePage;
use crate::domain::repository::{
    ChunkRepository, NotePageRepository, SummaryRepository, SyncLeaseRepository, SystemTaskRepository, UserRepository,
    VfsRepository,
};
use crate::domain::summary::{Summary, SummaryKind, SummaryTag};
use crate::domain::system_task::{SystemTask, TaskStatus};
use crate::domain::user::{LoginRecord, User};
use crate::domain::vfs::{RecycleEntry, UserFileNode};

fn status_str(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "PENDING",
        TaskStatus::Processing => "PROCESSING",
        TaskStatus::Completed => "COMPLETED",
        TaskStatus::Failed => "FAILED",
    }
}

fn parse_status(s: &str) -> Result<TaskStatus, RepositoryError> {
    s.parse().map_err(RepositoryError::Serialization)
}

fn kind_str(kind: SummaryKind) -> &'static str {
    match kind {
        SummaryKind::Summary => "SUMMARY",
        SummaryKind::Transcript => "TRANSCRIPT",
    }
}

fn parse_kind(s: &str) -> Result<SummaryKind, RepositoryError> {
    match s {
        "SUMMARY" => Ok(SummaryKind::Summary),
        "TRANSCRIPT" => Ok(SummaryKind::Transcript),
        other => Err(RepositoryError::Serialization(format!("unknown summary kind: {other}"))),
    }
}

fn user_row(row: &sqlx::postgres::PgRow) -> Result<User, RepositoryError> {
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        password_md5: row.try_get("password_md5")?,
        display_name: row.try_get("display_name")?,
        is_active: row.try_get("is_active")?,
        is_admin: row.try_get("is_admin")?,
        created_at: row.try_get("created_at")?,
    })
}

pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM users WHERE email = $1").bind(email).fetch_optional(&self.pool).await?;
        row.as_ref().map(user_row).transpose()
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM users WHERE id = $1").bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(user_row).transpose()
    }

    async fn count(&self) -> Result<i64, RepositoryError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM users").fetch_one(&self.pool).await?;
        Ok(row.try_get("n")?)
    }

    async fn insert(&self, user: User) -> Result<User, RepositoryError> {
        sqlx::query(
            "INSERT INTO users (id, email, password_md5, display_name, is_active, is_admin, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_md5)
        .bind(&user.display_name)
        .bind(user.is_active)
        .bind(user.is_admin)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;
        Ok(user)
    }

    async fn update_active(&self, id: i64, is_active: bool) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE users SET is_active = $1 WHERE id = $2").bind(is_active).bind(id).execute(&self.pool).await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<User>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM users ORDER BY id ASC").fetch_all(&self.pool).await?;
        rows.iter().map(user_row).collect()
    }

    async fn insert_login_record(&self, record: LoginRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO login_records (id, user_id, equipment_no, login_method, occurred_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(record.id)
        .bind(record.user_id)
        .bind(&record.equipment_no)
        .bind(&record.login_method)
        .bind(record.occurred_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn node_row(row: &sqlx::postgres::PgRow) -> Result<UserFileNode, RepositoryError> {
    Ok(UserFileNode {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        parent_id: row.try_get("parent_id")?,
        name: row.try_get("name")?,
        is_folder: row.try_get("is_folder")?,
        size: row.try_get("size")?,
        md5: row.try_get("md5")?,
        storage_key: row.try_get("storage_key")?,
        is_active: row.try_get("is_active")?,
        create_time: row.try_get("create_time")?,
        update_time: row.try_get("update_time")?,
    })
}

fn recycle_row(row: &sqlx::postgres::PgRow) -> Result<RecycleEntry, RepositoryError> {
    Ok(RecycleEntry {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        node_id: row.try_get("node_id")?,
        name: row.try_get("name")?,
        is_folder: row.try_get("is_folder")?,
        size: row.try_get("size")?,
        delete_time: row.try_get("delete_time")?,
        original_parent_id: row.try_get("original_parent_id")?,
    })
}

pub struct PostgresVfsRepository {
    pool: PgPool,
}

impl PostgresVfsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VfsRepository for PostgresVfsRepository {
    async fn insert_node(&self, node: UserFileNode) -> Result<UserFileNode, RepositoryError> {
        sqlx::query(
            "INSERT INTO user_files (id, user_id, parent_id, name, is_folder, size, md5, storage_key, is_active, create_time, update_time)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(node.id)
        .bind(node.user_id)
        .bind(node.parent_id)
        .bind(&node.name)
        .bind(node.is_folder)
        .bind(node.size)
        .bind(&node.md5)
        .bind(&node.storage_key)
        .bind(node.is_active)
        .bind(node.create_time)
        .bind(node.update_time)
        .execute(&self.pool)
        .await?;
        Ok(node)
    }

    async fn update_node(&self, node: UserFileNode) -> Result<UserFileNode, RepositoryError> {
        sqlx::query(
            "UPDATE user_files SET parent_id = $1, name = $2, is_folder = $3, size = $4, md5 = $5,
             storage_key = $6, is_active = $7, update_time = $8 WHERE id = $9 AND user_id = $10",
        )
        .bind(node.parent_id)
        .bind(&node.name)
        .bind(node.is_folder)
        .bind(node.size)
        .bind(&node.md5)
        .bind(&node.storage_key)
        .bind(node.is_active)
        .bind(node.update_time)
        .bind(node.id)
        .bind(node.user_id)
        .execute(&self.pool)
        .await?;
        Ok(node)
    }

    async fn find_by_id(&self, user_id: i64, id: i64) -> Result<Option<UserFileNode>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM user_files WHERE id = $1 AND user_id = $2 AND is_active")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(node_row).transpose()
    }

    async fn find_owner(&self, id: i64) -> Result<Option<i64>, RepositoryError> {
        let row = sqlx::query("SELECT user_id FROM user_files WHERE id = $1").bind(id).fetch_optional(&self.pool).await?;
        row.map(|r| r.try_get::<i64, _>("user_id")).transpose().map_err(RepositoryError::from)
    }

    async fn find_by_parent_and_name(
        &self,
        user_id: i64,
        parent_id: i64,
        name: &str,
    ) -> Result<Option<UserFileNode>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM user_files WHERE user_id = $1 AND parent_id = $2 AND name = $3 AND is_active")
            .bind(user_id)
            .bind(parent_id)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(node_row).transpose()
    }

    async fn list_children(&self, user_id: i64, parent_id: i64) -> Result<Vec<UserFileNode>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM user_files WHERE user_id = $1 AND parent_id = $2 AND is_active ORDER BY id ASC")
            .bind(user_id)
            .bind(parent_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(node_row).collect()
    }

    async fn list_descendants(&self, user_id: i64, parent_id: i64) -> Result<Vec<UserFileNode>, RepositoryError> {
        // Recursive CTE walks the subtree in one round trip rather than the
        // N+1 a naive per-level fetch would cost.
        let rows = sqlx::query(
            r#"
            WITH RECURSIVE subtree AS (
                SELECT * FROM user_files WHERE user_id = $1 AND parent_id = $2 AND is_active
                UNION ALL
                SELECT f.* FROM user_files f
                JOIN subtree s ON f.parent_id = s.id
                WHERE f.user_id = $1 AND f.is_active
            )
            SELECT * FROM subtree
            "#,
        )
        .bind(user_id)
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(node_row).collect()
    }

    async fn search(&self, user_id: i64, keyword: &str) -> Result<Vec<UserFileNode>, RepositoryError> {
        let pattern = format!("%{}%", keyword.to_lowercase());
        let rows = sqlx::query(
            "SELECT * FROM user_files WHERE user_id = $1 AND is_active AND LOWER(name) LIKE $2 ORDER BY id ASC",
        )
        .bind(user_id)
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(node_row).collect()
    }

    async fn deactivate_subtree(&self, user_id: i64, root_id: i64) -> Result<Vec<UserFileNode>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            WITH RECURSIVE subtree AS (
                SELECT id FROM user_files WHERE user_id = $1 AND id = $2
                UNION ALL
                SELECT f.id FROM user_files f JOIN subtree s ON f.parent_id = s.id WHERE f.user_id = $1
            )
            UPDATE user_files SET is_active = FALSE
            WHERE user_id = $1 AND id IN (SELECT id FROM subtree)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(root_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(node_row).collect()
    }

    async fn reactivate_subtree(&self, user_id: i64, root_id: i64) -> Result<Vec<UserFileNode>, RepositoryError> {
        // The subtree was soft-deleted together, so a single pass over the
        // (now-inactive) descendants read through the original parent chain
        // reactivates everyone in one statement.
        let rows = sqlx::query(
            r#"
            WITH RECURSIVE subtree AS (
                SELECT id FROM user_files WHERE user_id = $1 AND id = $2
                UNION ALL
                SELECT f.id FROM user_files f JOIN subtree s ON f.parent_id = s.id WHERE f.user_id = $1
            )
            UPDATE user_files SET is_active = TRUE
            WHERE user_id = $1 AND id IN (SELECT id FROM subtree)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(root_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(node_row).collect()
    }

    async fn count_active_files(&self, user_id: i64) -> Result<i64, RepositoryError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM user_files WHERE user_id = $1 AND is_active AND NOT is_folder")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }

    async fn sum_active_size(&self, user_id: i64) -> Result<i64, RepositoryError> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(size), 0) AS total FROM user_files WHERE user_id = $1 AND is_active AND NOT is_folder",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("total")?)
    }

    async fn list_active_files(&self, user_id: i64) -> Result<Vec<UserFileNode>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM user_files WHERE user_id = $1 AND is_active AND NOT is_folder ORDER BY id ASC")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(node_row).collect()
    }

    async fn insert_recycle_entry(&self, entry: RecycleEntry) -> Result<RecycleEntry, RepositoryError> {
        sqlx::query(
            "INSERT INTO recycle_files (id, user_id, node_id, name, is_folder, size, delete_time, original_parent_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(entry.id)
        .bind(entry.user_id)
        .bind(entry.node_id)
        .bind(&entry.name)
        .bind(entry.is_folder)
        .bind(entry.size)
        .bind(entry.delete_time)
        .bind(entry.original_parent_id)
        .execute(&self.pool)
        .await?;
        Ok(entry)
    }

    async fn find_recycle_entry(&self, user_id: i64, id: i64) -> Result<Option<RecycleEntry>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM recycle_files WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(recycle_row).transpose()
    }

    async fn list_recycle_entries(&self, user_id: i64) -> Result<Vec<RecycleEntry>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM recycle_files WHERE user_id = $1 ORDER BY id ASC")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(recycle_row).collect()
    }

    async fn delete_recycle_entry(&self, user_id: i64, id: i64) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM recycle_files WHERE id = $1 AND user_id = $2").bind(id).bind(user_id).execute(&self.pool).await?;
        Ok(())
    }

    async fn clear_recycle_entries(&self, user_id: i64) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM recycle_files WHERE user_id = $1").bind(user_id).execute(&self.pool).await?;
        Ok(())
    }
}

pub struct PostgresChunkRepository {
    pool: PgPool,
}

impl PostgresChunkRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChunkRepository for PostgresChunkRepository {
    async fn get(&self, user_id: i64, upload_id: &str) -> Result<Option<ChunkUpload>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM chunk_uploads WHERE user_id = $1 AND upload_id = $2")
            .bind(user_id)
            .bind(upload_id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else { return Ok(None) };
        let parts_json: serde_json::Value = row.try_get("parts")?;
        let parts: Vec<ChunkPart> = serde_json::from_value(parts_json).map_err(|e| RepositoryError::Serialization(e.to_string()))?;
        Ok(Some(ChunkUpload {
            user_id: row.try_get("user_id")?,
            upload_id: row.try_get("upload_id")?,
            object_name: row.try_get("object_name")?,
            total_chunks: row.try_get::<i32, _>("total_chunks")? as u32,
            parts,
        }))
    }

    async fn put(&self, upload: ChunkUpload) -> Result<(), RepositoryError> {
        let parts_json = serde_json::to_value(&upload.parts).map_err(|e| RepositoryError::Serialization(e.to_string()))?;
        sqlx::query(
            "INSERT INTO chunk_uploads (user_id, upload_id, object_name, total_chunks, parts)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (user_id, upload_id) DO UPDATE SET
                object_name = EXCLUDED.object_name, total_chunks = EXCLUDED.total_chunks, parts = EXCLUDED.parts",
        )
        .bind(upload.user_id)
        .bind(&upload.upload_id)
        .bind(&upload.object_name)
        .bind(upload.total_chunks as i32)
        .bind(parts_json)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, user_id: i64, upload_id: &str) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM chunk_uploads WHERE user_id = $1 AND upload_id = $2")
            .bind(user_id)
            .bind(upload_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn page_row(row: &sqlx::postgres::PgRow) -> Result<NotePage, RepositoryError> {
    Ok(NotePage {
        file_id: row.try_get("file_id")?,
        page_index: row.try_get("page_index")?,
        page_id: row.try_get("page_id")?,
        content_hash: row.try_get("content_hash")?,
        text_content: row.try_get("text_content")?,
        embedding: row.try_get("embedding")?,
    })
}

pub struct PostgresNotePageRepository {
    pool: PgPool,
}

impl PostgresNotePageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotePageRepository for PostgresNotePageRepository {
    async fn upsert(&self, page: NotePage) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO note_pages (file_id, page_index, page_id, content_hash, text_content, embedding)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (file_id, page_id) DO UPDATE SET
                page_index = EXCLUDED.page_index, content_hash = EXCLUDED.content_hash,
                text_content = EXCLUDED.text_content, embedding = EXCLUDED.embedding",
        )
        .bind(page.file_id)
        .bind(page.page_index)
        .bind(&page.page_id)
        .bind(&page.content_hash)
        .bind(&page.text_content)
        .bind(&page.embedding)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find(&self, file_id: i64, page_id: &str) -> Result<Option<NotePage>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM note_pages WHERE file_id = $1 AND page_id = $2")
            .bind(file_id)
            .bind(page_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(page_row).transpose()
    }

    async fn list_for_file(&self, file_id: i64) -> Result<Vec<NotePage>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM note_pages WHERE file_id = $1 ORDER BY page_index ASC")
            .bind(file_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(page_row).collect()
    }

    async fn delete(&self, file_id: i64, page_id: &str) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM note_pages WHERE file_id = $1 AND page_id = $2").bind(file_id).bind(page_id).execute(&self.pool).await?;
        Ok(())
    }

    async fn delete_for_file(&self, file_id: i64) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM note_pages WHERE file_id = $1").bind(file_id).execute(&self.pool).await?;
        Ok(())
    }

    async fn clear_content(&self, file_id: i64, page_id: &str) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE note_pages SET text_content = NULL, embedding = NULL WHERE file_id = $1 AND page_id = $2")
            .bind(file_id)
            .bind(page_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn search_candidates(
        &self,
        user_id: i64,
        name_filter: Option<&str>,
    ) -> Result<Vec<(NotePage, String)>, RepositoryError> {
        let pattern = name_filter.map(|f| format!("%{}%", f.to_lowercase()));
        let rows = sqlx::query(
            r#"
            SELECT p.*, f.name AS file_name
            FROM note_pages p
            JOIN user_files f ON f.id = p.file_id
            WHERE f.user_id = $1 AND f.is_active AND p.embedding IS NOT NULL
              AND ($2::text IS NULL OR LOWER(f.name) LIKE $2)
            "#,
        )
        .bind(user_id)
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let page = page_row(row)?;
                let file_name: String = row.try_get("file_name")?;
                Ok((page, file_name))
            })
            .collect()
    }
}

fn task_row(row: &sqlx::postgres::PgRow) -> Result<SystemTask, RepositoryError> {
    let status: String = row.try_get("status")?;
    Ok(SystemTask {
        file_id: row.try_get("file_id")?,
        task_type: row.try_get("task_type")?,
        key: row.try_get("key")?,
        status: parse_status(&status)?,
        retry_count: row.try_get("retry_count")?,
        last_error: row.try_get("last_error")?,
        update_time: row.try_get("update_time")?,
    })
}

pub struct PostgresSystemTaskRepository {
    pool: PgPool,
}

impl PostgresSystemTaskRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SystemTaskRepository for PostgresSystemTaskRepository {
    async fn upsert(&self, task: SystemTask) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO system_tasks (file_id, task_type, key, status, retry_count, last_error, update_time)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (file_id, task_type, key) DO UPDATE SET
                status = EXCLUDED.status, retry_count = EXCLUDED.retry_count,
                last_error = EXCLUDED.last_error, update_time = EXCLUDED.update_time",
        )
        .bind(task.file_id)
        .bind(&task.task_type)
        .bind(&task.key)
        .bind(status_str(task.status))
        .bind(task.retry_count)
        .bind(&task.last_error)
        .bind(task.update_time)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find(&self, file_id: i64, task_type: &str, key: &str) -> Result<Option<SystemTask>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM system_tasks WHERE file_id = $1 AND task_type = $2 AND key = $3")
            .bind(file_id)
            .bind(task_type)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(task_row).transpose()
    }

    async fn delete(&self, file_id: i64, task_type: &str, key: &str) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM system_tasks WHERE file_id = $1 AND task_type = $2 AND key = $3")
            .bind(file_id)
            .bind(task_type)
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_for_file(&self, file_id: i64) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM system_tasks WHERE file_id = $1").bind(file_id).execute(&self.pool).await?;
        Ok(())
    }

    async fn list_incomplete(&self) -> Result<Vec<SystemTask>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM system_tasks WHERE status != 'COMPLETED'").fetch_all(&self.pool).await?;
        rows.iter().map(task_row).collect()
    }
}

fn summary_row(row: &sqlx::postgres::PgRow) -> Result<Summary, RepositoryError> {
    let kind: String = row.try_get("kind")?;
    Ok(Summary {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        file_id: row.try_get("file_id")?,
        kind: parse_kind(&kind)?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        create_time: row.try_get("create_time")?,
        update_time: row.try_get("update_time")?,
    })
}

pub struct PostgresSummaryRepository {
    pool: PgPool,
}

impl PostgresSummaryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SummaryRepository for PostgresSummaryRepository {
    async fn upsert(&self, summary: Summary) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO summaries (id, user_id, file_id, kind, title, content, create_time, update_time)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (id) DO UPDATE SET
                title = EXCLUDED.title, content = EXCLUDED.content, update_time = EXCLUDED.update_time",
        )
        .bind(summary.id)
        .bind(summary.user_id)
        .bind(summary.file_id)
        .bind(kind_str(summary.kind))
        .bind(&summary.title)
        .bind(&summary.content)
        .bind(summary.create_time)
        .bind(summary.update_time)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Summary>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM summaries WHERE id = $1").bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(summary_row).transpose()
    }

    async fn list_for_file(&self, file_id: i64, kind: SummaryKind) -> Result<Vec<Summary>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM summaries WHERE file_id = $1 AND kind = $2")
            .bind(file_id)
            .bind(kind_str(kind))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(summary_row).collect()
    }

    async fn add_tag(&self, tag: SummaryTag) -> Result<(), RepositoryError> {
        sqlx::query("INSERT INTO summary_tags (summary_id, tag) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(tag.summary_id)
            .bind(&tag.tag)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn search_by_tag(&self, user_id: i64, keyword: &str) -> Result<Vec<Summary>, RepositoryError> {
        let pattern = format!("%{}%", keyword.to_lowercase());
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT s.* FROM summaries s
            JOIN summary_tags t ON t.summary_id = s.id
            WHERE s.user_id = $1 AND LOWER(t.tag) LIKE $2
            "#,
        )
        .bind(user_id)
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(summary_row).collect()
    }
}

pub struct PostgresSyncLeaseRepository {
    pool: PgPool,
}

impl PostgresSyncLeaseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SyncLeaseRepository for PostgresSyncLeaseRepository {
    async fn get(&self, user_email: &str) -> Result<Option<(String, DateTime<Utc>)>, RepositoryError> {
        let row = sqlx::query("SELECT equipment_no, expires_at FROM sync_leases WHERE user_email = $1")
            .bind(user_email)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some((row.try_get("equipment_no")?, row.try_get("expires_at")?))),
            None => Ok(None),
        }
    }

    async fn set(&self, user_email: &str, equipment_no: &str, expires_at: DateTime<Utc>) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO sync_leases (user_email, equipment_no, expires_at) VALUES ($1, $2, $3)
             ON CONFLICT (user_email) DO UPDATE SET equipment_no = EXCLUDED.equipment_no, expires_at = EXCLUDED.expires_at",
        )
        .bind(user_email)
        .bind(equipment_no)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn clear(&self, user_email: &str) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM sync_leases WHERE user_email = $1").bind(user_email).execute(&self.pool).await?;
        Ok(())
    }
}

/// KV-backed [`CoordinationService`] over the `kv` table; TTL is checked
/// lazily against `expires_at` on read rather than by a background sweeper
/// (spec §5: "neither is checked by a background timer").
pub struct PostgresCoordinationService {
    pool: PgPool,
}

impl PostgresCoordinationService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn expires_at(ttl: Option<Duration>) -> Option<DateTime<Utc>> {
        ttl.map(|d| Utc::now() + chrono::Duration::from_std(d).unwrap_or(chrono::Duration::zero()))
    }
}

fn coordination_err(e: sqlx::Error) -> CoordinationError {
    CoordinationError::Backend(e.to_string())
}

#[async_trait]
impl CoordinationService for PostgresCoordinationService {
    async fn set_value(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CoordinationError> {
        sqlx::query(
            "INSERT INTO kv (key, value, expires_at) VALUES ($1, $2, $3)
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, expires_at = EXCLUDED.expires_at",
        )
        .bind(key)
        .bind(value)
        .bind(Self::expires_at(ttl))
        .execute(&self.pool)
        .await
        .map_err(coordination_err)?;
        Ok(())
    }

    async fn get_value(&self, key: &str) -> Result<Option<String>, CoordinationError> {
        let row = sqlx::query("SELECT value FROM kv WHERE key = $1 AND (expires_at IS NULL OR expires_at > NOW())")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(coordination_err)?;
        row.map(|r| r.try_get("value")).transpose().map_err(coordination_err)
    }

    async fn delete_value(&self, key: &str) -> Result<(), CoordinationError> {
        sqlx::query("DELETE FROM kv WHERE key = $1").bind(key).execute(&self.pool).await.map_err(coordination_err)?;
        Ok(())
    }

    async fn pop_value(&self, key: &str) -> Result<Option<String>, CoordinationError> {
        let row = sqlx::query("DELETE FROM kv WHERE key = $1 AND (expires_at IS NULL OR expires_at > NOW()) RETURNING value")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(coordination_err)?;
        row.map(|r| r.try_get("value")).transpose().map_err(coordination_err)
    }

    async fn increment(&self, key: &str, ttl: Option<Duration>) -> Result<i64, CoordinationError> {
        let mut tx = self.pool.begin().await.map_err(coordination_err)?;
        let row = sqlx::query("SELECT value FROM kv WHERE key = $1 AND (expires_at IS NULL OR expires_at > NOW()) FOR UPDATE")
            .bind(key)
            .fetch_optional(&mut *tx)
            .await
            .map_err(coordination_err)?;
        let current: i64 = row.map(|r| r.try_get::<String, _>("value").unwrap_or_default().parse().unwrap_or(0)).unwrap_or(0);
        let next = current + 1;
        sqlx::query(
            "INSERT INTO kv (key, value, expires_at) VALUES ($1, $2, $3)
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, expires_at = EXCLUDED.expires_at",
        )
        .bind(key)
        .bind(next.to_string())
        .bind(Self::expires_at(ttl))
        .execute(&mut *tx)
        .await
        .map_err(coordination_err)?;
        tx.commit().await.map_err(coordination_err)?;
        Ok(next)
    }

    async fn acquire_lock(&self, key: &str, holder: &str, ttl: Duration) -> Result<bool, CoordinationError> {
        let mut tx = self.pool.begin().await.map_err(coordination_err)?;
        let row = sqlx::query("SELECT value FROM kv WHERE key = $1 AND (expires_at IS NULL OR expires_at > NOW()) FOR UPDATE")
            .bind(key)
            .fetch_optional(&mut *tx)
            .await
            .map_err(coordination_err)?;
        if let Some(row) = &row {
            let holder_value: String = row.try_get("value").map_err(coordination_err)?;
            if holder_value != holder {
                return Ok(false);
            }
        }
        sqlx::query(
            "INSERT INTO kv (key, value, expires_at) VALUES ($1, $2, $3)
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, expires_at = EXCLUDED.expires_at",
        )
        .bind(key)
        .bind(holder)
        .bind(Self::expires_at(Some(ttl)))
        .execute(&mut *tx)
        .await
        .map_err(coordination_err)?;
        tx.commit().await.map_err(coordination_err)?;
        Ok(true)
    }

    async fn release_lock(&self, key: &str, holder: &str) -> Result<(), CoordinationError> {
        sqlx::query("DELETE FROM kv WHERE key = $1 AND value = $2").bind(key).bind(holder).execute(&self.pool).await.map_err(coordination_err)?;
        Ok(())
    }
}
