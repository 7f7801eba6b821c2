// Copyright (c) 2026 supernote-server contributors
// SPDX-License-Identifier: AGPL-3.0
//! Per-page notebook content, keyed `(file_id, page_id)` (spec §3).

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotePage {
    pub file_id: i64,
    pub page_index: i32,
    pub page_id: String,
    pub content_hash: String,
    pub text_content: Option<String>,
    /// JSON-encoded array of floats; present only if `text_content` is
    /// non-empty (spec §8 invariant).
    pub embedding: Option<serde_json::Value>,
}

impl NotePage {
    /// Parses the inferred page date out of `page_id`'s `P<YYYYMMDDhhmmss>`
    /// prefix (GLOSSARY), used by search date filters without re-parsing the
    /// notebook.
    pub fn inferred_date(&self) -> Option<DateTime<Utc>> {
        parse_page_id_date(&self.page_id)
    }
}

pub fn parse_page_id_date(page_id: &str) -> Option<DateTime<Utc>> {
    let digits = page_id.strip_prefix('P')?;
    if digits.len() < 14 || !digits.as_bytes()[..14].iter().all(u8::is_ascii_digit) {
        return None;
    }
    let stamp = &digits[..14];
    let naive = NaiveDateTime::parse_from_str(stamp, "%Y%m%d%H%M%S").ok()?;
    Some(DateTime::from_naive_utc_and_offset(naive, Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_page_id() {
        let d = parse_page_id_date("P20240115093000abcd").unwrap();
        assert_eq!(d.format("%Y-%m-%d %H:%M:%S").to_string(), "2024-01-15 09:30:00");
    }

    #[test]
    fn rejects_malformed_page_id() {
        assert!(parse_page_id_date("not-a-page-id").is_none());
        assert!(parse_page_id_date("P2024").is_none());
    }
}
