// Copyright (c) 2026 supernote-server contributors
// SPDX-License-Identifier: AGPL-3.0
//! User aggregate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered account. `password_md5` mirrors the vendor device's own
/// password-hashing convention (the device hashes before ever sending a
/// password over the wire) rather than a server-chosen scheme.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub password_md5: String,
    pub display_name: String,
    pub is_active: bool,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(id: i64, email: String, password_md5: String, display_name: String, is_admin: bool) -> Self {
        Self {
            id,
            email,
            password_md5,
            display_name,
            is_active: true,
            is_admin,
            created_at: Utc::now(),
        }
    }
}

/// Append-only record of a successful login, written by `UserService::login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRecord {
    pub id: i64,
    pub user_id: i64,
    pub equipment_no: Option<String>,
    pub login_method: String,
    pub occurred_at: DateTime<Utc>,
}

/// Device-facing profile view returned by `/api/official/user/*` routes.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_name: String,
    pub email: String,
    pub phone: String,
    pub country_code: String,
    pub total_capacity: String,
    pub file_server: String,
    pub avatars_url: String,
    pub birthday: String,
    pub sex: String,
}

impl From<&User> for UserProfile {
    fn from(u: &User) -> Self {
        Self {
            user_name: u.display_name.clone(),
            email: u.email.clone(),
            phone: String::new(),
            country_code: "1".to_string(),
            total_capacity: "25485312".to_string(),
            file_server: "0".to_string(),
            avatars_url: String::new(),
            birthday: String::new(),
            sex: String::new(),
        }
    }
}
