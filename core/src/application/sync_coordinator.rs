// Copyright (c) 2026 supernote-server contributors
// SPDX-License-Identifier: AGPL-3.0
//! Per-user exclusive sync lease coordination (spec §4.6).

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::error::SyncError;
use crate::domain::repository::SyncLeaseRepository;

pub const DEFAULT_LEASE_TTL: Duration = Duration::from_secs(300);
pub const SYNC_CONFLICT_ERROR_CODE: &str = "E0078";

pub struct SyncCoordinator {
    repo: Arc<dyn SyncLeaseRepository>,
}

impl SyncCoordinator {
    pub fn new(repo: Arc<dyn SyncLeaseRepository>) -> Self {
        Self { repo }
    }

    /// Starts (or renews) a sync session. Returns `sync_type` — whether the
    /// device should treat this as a non-empty (incremental) sync.
    pub async fn start(&self, user_email: &str, equipment_no: &str, storage_is_empty: bool, ttl: Duration) -> Result<bool, SyncError> {
        let now = Utc::now();
        if let Some((holder, expires_at)) = self.repo.get(user_email).await? {
            let unexpired = now < expires_at;
            if unexpired && holder != equipment_no {
                return Err(SyncError::Conflict);
            }
        }
        let expires_at = now + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::seconds(300));
        self.repo.set(user_email, equipment_no, expires_at).await?;
        Ok(!storage_is_empty)
    }

    pub async fn end(&self, user_email: &str, equipment_no: &str) -> Result<(), SyncError> {
        if let Some((holder, expires_at)) = self.repo.get(user_email).await? {
            if holder == equipment_no && Utc::now() < expires_at {
                self.repo.clear(user_email).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::repositories::in_memory::InMemorySyncLeaseRepository;

    #[tokio::test]
    async fn second_equipment_is_rejected_while_lease_held() {
        let repo = Arc::new(InMemorySyncLeaseRepository::new());
        let coordinator = SyncCoordinator::new(repo);
        coordinator.start("u@example.com", "SN1", true, DEFAULT_LEASE_TTL).await.unwrap();
        let result = coordinator.start("u@example.com", "SN2", true, DEFAULT_LEASE_TTL).await;
        assert!(matches!(result, Err(SyncError::Conflict)));
    }

    #[tokio::test]
    async fn releasing_lease_allows_other_equipment() {
        let repo = Arc::new(InMemorySyncLeaseRepository::new());
        let coordinator = SyncCoordinator::new(repo);
        coordinator.start("u@example.com", "SN1", true, DEFAULT_LEASE_TTL).await.unwrap();
        coordinator.end("u@example.com", "SN1").await.unwrap();
        coordinator.start("u@example.com", "SN2", true, DEFAULT_LEASE_TTL).await.unwrap();
    }
}
