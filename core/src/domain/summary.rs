// Copyright (c) 2026 supernote-server contributors
// SPDX-License-Identifier: AGPL-3.0
//! User-scoped, UUID-keyed summarization output written by the summary
//! processor module (spec §3, §4.7).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SummaryKind {
    Summary,
    Transcript,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub id: Uuid,
    pub user_id: i64,
    pub file_id: i64,
    pub kind: SummaryKind,
    pub title: String,
    pub content: String,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryTag {
    pub summary_id: Uuid,
    pub tag: String,
}

/// Deterministic UUID derived from a file's `storage_key` so re-processing
/// the same file updates the same Summary row instead of creating a new one
/// (spec §4.7: "keyed by stable UUIDs derived from the file's storage_key").
pub fn summary_id_for(storage_key: &str, kind: SummaryKind) -> Uuid {
    let namespace = Uuid::NAMESPACE_OID;
    let discriminant = match kind {
        SummaryKind::Summary => "summary",
        SummaryKind::Transcript => "transcript",
    };
    Uuid::new_v5(&namespace, format!("{storage_key}:{discriminant}").as_bytes())
}
