// Copyright (c) 2026 supernote-server contributors
// SPDX-License-Identifier: AGPL-3.0
//! PostgreSQL connection pool wrapper, injected into the Postgres-backed
//! repository implementations (spec §9: repositories are swappable behind
//! [`crate::domain::repository::StorageBackend`]). Absent a connection
//! string, the CLI falls back to the in-memory repositories instead of
//! constructing one of these.

use anyhow::{Context, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};

const DEFAULT_SCHEMA: &str = include_str!("../../schema.sql");

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn connect(connection_string: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(connection_string)
            .await
            .context("failed to connect to Postgres")?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Applies the logical schema described in spec §6. Idempotent: every
    /// statement uses `CREATE TABLE IF NOT EXISTS`.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(DEFAULT_SCHEMA).execute(&self.pool).await.context("failed to apply schema")?;
        Ok(())
    }
}
