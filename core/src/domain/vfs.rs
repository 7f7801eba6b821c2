// Copyright (c) 2026 supernote-server contributors
// SPDX-License-Identifier: AGPL-3.0
//! Virtual filesystem node and recycle-bin entities, plus the fixed
//! category-container table that distinguishes the device tree view from the
//! flattened web view (spec §3, §4.1).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A node in a user's private tree, rooted at `parent_id == 0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserFileNode {
    pub id: i64,
    pub user_id: i64,
    pub parent_id: i64,
    pub name: String,
    pub is_folder: bool,
    pub size: i64,
    pub md5: Option<String>,
    pub storage_key: Option<String>,
    pub is_active: bool,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

impl UserFileNode {
    pub fn is_root(&self) -> bool {
        self.parent_id == 0
    }
}

/// Created atomically with a soft-delete; reversed by `VfsService::restore`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecycleEntry {
    pub id: i64,
    pub user_id: i64,
    pub node_id: i64,
    pub name: String,
    pub is_folder: bool,
    pub size: i64,
    pub delete_time: DateTime<Utc>,
    pub original_parent_id: i64,
}

/// Resolved path plus the parallel chain of node IDs from root to leaf,
/// returned by `VfsService::get_path_info`.
#[derive(Debug, Clone)]
pub struct PathInfo {
    pub path: String,
    pub id_path: Vec<i64>,
}

/// A fixed-name parent directory visible in the device view and hidden by
/// the flattened web view. Membership is the conventional set described in
/// spec §9's Open Questions, not something discovered from data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryContainer {
    Note,
    Document,
}

impl CategoryContainer {
    pub const fn name(self) -> &'static str {
        match self {
            CategoryContainer::Note => "NOTE",
            CategoryContainer::Document => "DOCUMENT",
        }
    }

    /// Well-known children that live directly under this container and whose
    /// presence as the child of a container name triggers path flattening.
    pub const fn children(self) -> &'static [&'static str] {
        match self {
            CategoryContainer::Note => &["Note", "MyStyle"],
            CategoryContainer::Document => &["Document"],
        }
    }

    pub fn all() -> &'static [CategoryContainer] {
        &[CategoryContainer::Note, CategoryContainer::Document]
    }
}

/// Root-level folders that exist outside any category container but are
/// still part of the fixed device-view layout (spec §9).
pub const ROOT_WELL_KNOWN_FOLDERS: &[&str] = &["Export", "Inbox", "Screenshot"];

/// System directories that may never be renamed, moved, or deleted.
pub const SYSTEM_DIRECTORIES: &[&str] = &["NOTE", "DOCUMENT", "Export", "Inbox", "Screenshot"];

pub fn is_system_directory(name: &str) -> bool {
    SYSTEM_DIRECTORIES.contains(&name)
}

/// True if `name` is one of the fixed category container names (`NOTE`,
/// `DOCUMENT`) that the flattened web view hides at the root.
pub fn is_category_container(name: &str) -> bool {
    CategoryContainer::all().iter().any(|c| c.name() == name)
}

/// Strips a leading container name from `segments` when the next segment is
/// a recognized child of that container — the container itself is hidden,
/// but the child folder (e.g. `Note`) still appears at the root (spec §3:
/// "child folders appear at the root, and containers are hidden").
pub fn flatten_segments(segments: &[String]) -> Vec<String> {
    if segments.len() >= 2 {
        for container in CategoryContainer::all() {
            if segments[0] == container.name() && container.children().contains(&segments[1].as_str()) {
                return segments[1..].to_vec();
            }
        }
    }
    segments.to_vec()
}
