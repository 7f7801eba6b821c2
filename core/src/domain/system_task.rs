// Copyright (c) 2026 supernote-server contributors
// SPDX-License-Identifier: AGPL-3.0
//! Per-(file, module, key) processing intent/outcome record (spec §3, §4.7).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Processing => "PROCESSING",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TaskStatus::Pending),
            "PROCESSING" => Ok(TaskStatus::Processing),
            "COMPLETED" => Ok(TaskStatus::Completed),
            "FAILED" => Ok(TaskStatus::Failed),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

/// The processing module a task row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskType {
    Hashing,
    PngConversion,
    Ocr,
    Embedding,
    Summary,
}

impl TaskType {
    pub const fn as_str(self) -> &'static str {
        match self {
            TaskType::Hashing => "HASHING",
            TaskType::PngConversion => "PNG_CONVERSION",
            TaskType::Ocr => "OCR",
            TaskType::Embedding => "EMBEDDING",
            TaskType::Summary => "SUMMARY",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemTask {
    pub file_id: i64,
    pub task_type: String,
    /// `page_<page_id>` for per-page modules, `global` for file-wide modules.
    pub key: String,
    pub status: TaskStatus,
    pub retry_count: i32,
    pub last_error: Option<String>,
    pub update_time: DateTime<Utc>,
}

pub fn page_task_key(page_id: &str) -> String {
    format!("page_{page_id}")
}

pub const GLOBAL_TASK_KEY: &str = "global";
