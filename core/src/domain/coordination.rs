// Copyright (c) 2026 supernote-server contributors
// SPDX-License-Identifier: AGPL-3.0
//! CoordinationService: a key/value store with TTL and atomic primitives.
//! Backs sync locks, rate limits, session tokens, and single-use signed-URL
//! nonces (spec §2, §9). The trait permits substituting an in-process map
//! (tests) for a SQL-backed implementation (production) with no change to
//! consumers.

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::error::CoordinationError;

#[async_trait]
pub trait CoordinationService: Send + Sync {
    /// Sets `key` to `value` with an optional TTL. A `None` TTL means no
    /// expiry.
    async fn set_value(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CoordinationError>;

    async fn get_value(&self, key: &str) -> Result<Option<String>, CoordinationError>;

    async fn delete_value(&self, key: &str) -> Result<(), CoordinationError>;

    /// Atomically deletes `key` and returns its prior value, or `None` if it
    /// did not exist. Used to enforce single-use nonces.
    async fn pop_value(&self, key: &str) -> Result<Option<String>, CoordinationError>;

    /// Atomically increments the integer stored at `key` (creating it at 0
    /// first if absent) and returns the new value.
    async fn increment(&self, key: &str, ttl: Option<Duration>) -> Result<i64, CoordinationError>;

    /// Attempts to acquire an exclusive lock named `key` for `ttl`. Returns
    /// `Ok(true)` if acquired, `Ok(false)` if already held by someone else.
    async fn acquire_lock(&self, key: &str, holder: &str, ttl: Duration) -> Result<bool, CoordinationError>;

    /// Releases `key` only if currently held by `holder`.
    async fn release_lock(&self, key: &str, holder: &str) -> Result<(), CoordinationError>;
}
