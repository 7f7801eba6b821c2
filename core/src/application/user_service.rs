// Copyright (c) 2026 supernote-server contributors
// SPDX-License-Identifier: AGPL-3.0
//! UserService: registration, bootstrap admin, the random-code/hash login
//! challenge used by the device API, and session token mint/revoke (spec
//! §4.10).

use chrono::Utc;
use md5::{Digest, Md5};
use rand::RngCore;
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;

use crate::application::ids::SnowflakeGenerator;
use crate::domain::coordination::CoordinationService;
use crate::domain::error::UserError;
use crate::domain::repository::UserRepository;
use crate::domain::user::{LoginRecord, User, UserProfile};

const SESSION_TTL: Duration = Duration::from_secs(3600 * 24 * 30);
const RANDOM_CODE_TTL: Duration = Duration::from_secs(120);

/// Rate-limit window and threshold for both the login-code challenge and the
/// login attempt itself, keyed per account (spec §2, §7 RATE_LIMITED).
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(300);
const RATE_LIMIT_MAX_ATTEMPTS: i64 = 10;

pub struct UserService {
    users: Arc<dyn UserRepository>,
    coordination: Arc<dyn CoordinationService>,
    ids: Arc<SnowflakeGenerator>,
}

impl UserService {
    pub fn new(users: Arc<dyn UserRepository>, coordination: Arc<dyn CoordinationService>, ids: Arc<SnowflakeGenerator>) -> Self {
        Self { users, coordination, ids }
    }

    pub fn hash_password(password: &str) -> String {
        let mut hasher = Md5::new();
        hasher.update(password.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Registers a new account. The first successful registration becomes
    /// admin regardless of `registration_enabled` (spec §3 bootstrap
    /// invariant) — callers gate the flag before calling this.
    pub async fn register(&self, email: &str, password: &str, display_name: &str) -> Result<User, UserError> {
        if self.users.find_by_email(email).await?.is_some() {
            return Err(UserError::AlreadyExists);
        }
        let is_first_user = self.users.count().await? == 0;
        let user = User::new(self.ids.next_id(), email.to_string(), Self::hash_password(password), display_name.to_string(), is_first_user);
        Ok(self.users.insert(user).await?)
    }

    pub async fn deactivate(&self, email: &str) -> Result<(), UserError> {
        let user = self.users.find_by_email(email).await?.ok_or(UserError::NotFound)?;
        Ok(self.users.update_active(user.id, false).await?)
    }

    pub async fn list_users(&self) -> Result<Vec<User>, UserError> {
        Ok(self.users.list().await?)
    }

    /// Resolves the account embedded in a signed OSS URL (spec §4.4) back to
    /// a `User`, bypassing session-token lookup entirely.
    pub async fn find_by_email(&self, email: &str) -> Result<User, UserError> {
        self.users.find_by_email(email).await?.filter(|u| u.is_active).ok_or(UserError::NotFound)
    }

    /// Mints an 8-hex-char challenge code plus the millisecond timestamp the
    /// client must echo back with its hash. Only one active code per
    /// account is kept (overwriting any prior).
    pub async fn generate_random_code(&self, account: &str) -> Result<(String, String), UserError> {
        self.check_rate_limit(account).await?;
        let mut bytes = [0u8; 4];
        rand::rng().fill_bytes(&mut bytes);
        let code = hex::encode(bytes);
        let timestamp = Utc::now().timestamp_millis().to_string();
        self.coordination
            .set_value(&format!("logincode:{account}"), &format!("{code}:{timestamp}"), Some(RANDOM_CODE_TTL))
            .await
            .map_err(|e| UserError::Repository(crate::domain::error::RepositoryError::Database(e.to_string())))?;
        Ok((code, timestamp))
    }

    /// Atomically bumps the per-account attempt counter and returns
    /// `UserError::RateLimited` once it crosses the threshold within the
    /// window. The window slides forward on every attempt, so a client that
    /// keeps hammering an account stays locked out rather than ever
    /// recovering mid-window.
    async fn check_rate_limit(&self, account: &str) -> Result<(), UserError> {
        let count = self
            .coordination
            .increment(&format!("ratelimit:{account}"), Some(RATE_LIMIT_WINDOW))
            .await
            .map_err(|e| UserError::Repository(crate::domain::error::RepositoryError::Database(e.to_string())))?;
        if count > RATE_LIMIT_MAX_ATTEMPTS {
            return Err(UserError::RateLimited);
        }
        Ok(())
    }

    fn verify_login_hash(&self, user: &User, random_code: &str, timestamp: &str, client_hash: &str) -> bool {
        let concat = format!("{}{random_code}{timestamp}", user.password_md5);
        let mut hasher = Sha256::new();
        hasher.update(concat.as_bytes());
        let expected = hex::encode(hasher.finalize());
        expected == client_hash
    }

    pub async fn login(
        &self,
        account: &str,
        client_hash: &str,
        timestamp: &str,
        equipment_no: Option<String>,
        login_method: &str,
    ) -> Result<(String, User), UserError> {
        self.check_rate_limit(account).await?;
        let user = self.users.find_by_email(account).await?.filter(|u| u.is_active).ok_or(UserError::NotFound)?;

        let stored = self
            .coordination
            .get_value(&format!("logincode:{account}"))
            .await
            .map_err(|e| UserError::Repository(crate::domain::error::RepositoryError::Database(e.to_string())))?
            .ok_or(UserError::InvalidCredentials)?;
        let (random_code, issued_timestamp) = stored.split_once(':').ok_or(UserError::InvalidCredentials)?;
        if issued_timestamp != timestamp {
            return Err(UserError::InvalidCredentials);
        }
        if !self.verify_login_hash(&user, random_code, timestamp, client_hash) {
            return Err(UserError::InvalidCredentials);
        }

        let token = uuid::Uuid::new_v4().to_string();
        self.coordination
            .set_value(&format!("session:{token}"), &format!("{account}:{}", equipment_no.clone().unwrap_or_default()), Some(SESSION_TTL))
            .await
            .map_err(|e| UserError::Repository(crate::domain::error::RepositoryError::Database(e.to_string())))?;

        self.users
            .insert_login_record(LoginRecord {
                id: self.ids.next_id(),
                user_id: user.id,
                equipment_no,
                login_method: login_method.to_string(),
                occurred_at: Utc::now(),
            })
            .await?;

        Ok((token, user))
    }

    pub async fn resolve_session(&self, token: &str) -> Result<User, UserError> {
        let value = self
            .coordination
            .get_value(&format!("session:{token}"))
            .await
            .map_err(|e| UserError::Repository(crate::domain::error::RepositoryError::Database(e.to_string())))?
            .ok_or(UserError::InvalidCredentials)?;
        let (account, _equipment) = value.split_once(':').ok_or(UserError::InvalidCredentials)?;
        self.users.find_by_email(account).await?.filter(|u| u.is_active).ok_or(UserError::NotFound)
    }

    pub async fn logout(&self, token: &str) -> Result<(), UserError> {
        self.coordination
            .delete_value(&format!("session:{token}"))
            .await
            .map_err(|e| UserError::Repository(crate::domain::error::RepositoryError::Database(e.to_string())))
    }

    pub fn profile(user: &User) -> UserProfile {
        UserProfile::from(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::repositories::in_memory::{InMemoryCoordinationService, InMemoryUserRepository};

    fn service() -> UserService {
        UserService::new(
            Arc::new(InMemoryUserRepository::new()),
            Arc::new(InMemoryCoordinationService::new()),
            Arc::new(SnowflakeGenerator::new(1)),
        )
    }

    #[tokio::test]
    async fn first_registrant_becomes_admin() {
        let svc = service();
        let user = svc.register("admin@example.com", "hunter2", "Admin").await.unwrap();
        assert!(user.is_admin);
        let second = svc.register("bob@example.com", "hunter2", "Bob").await.unwrap();
        assert!(!second.is_admin);
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let svc = service();
        svc.register("admin@example.com", "hunter2", "Admin").await.unwrap();
        let result = svc.register("admin@example.com", "other", "Admin2").await;
        assert!(matches!(result, Err(UserError::AlreadyExists)));
    }

    #[tokio::test]
    async fn login_challenge_round_trip() {
        let svc = service();
        let user = svc.register("admin@example.com", "hunter2", "Admin").await.unwrap();
        let (code, timestamp) = svc.generate_random_code(&user.email).await.unwrap();
        let concat = format!("{}{code}{timestamp}", user.password_md5);
        let mut hasher = Sha256::new();
        hasher.update(concat.as_bytes());
        let client_hash = hex::encode(hasher.finalize());
        let (token, logged_in) = svc.login(&user.email, &client_hash, &timestamp, Some("SN1".to_string()), "password").await.unwrap();
        assert_eq!(logged_in.id, user.id);
        let resolved = svc.resolve_session(&token).await.unwrap();
        assert_eq!(resolved.id, user.id);
    }

    #[tokio::test]
    async fn login_is_rate_limited_past_threshold() {
        let svc = service();
        let user = svc.register("admin@example.com", "hunter2", "Admin").await.unwrap();
        for _ in 0..RATE_LIMIT_MAX_ATTEMPTS {
            let result = svc.login(&user.email, "wrong", "0", None, "password").await;
            assert!(matches!(result, Err(UserError::InvalidCredentials)));
        }
        let result = svc.login(&user.email, "wrong", "0", None, "password").await;
        assert!(matches!(result, Err(UserError::RateLimited)));
    }
}
