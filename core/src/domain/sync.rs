// Copyright (c) 2026 supernote-server contributors
// SPDX-License-Identifier: AGPL-3.0
//! Per-user exclusive sync lease (spec §4.6).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncLease {
    pub user_email: String,
    pub equipment_no: String,
    pub expires_at: DateTime<Utc>,
}

impl SyncLease {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn held_by(&self, equipment_no: &str, now: DateTime<Utc>) -> bool {
        !self.is_expired(now) && self.equipment_no == equipment_no
    }
}
