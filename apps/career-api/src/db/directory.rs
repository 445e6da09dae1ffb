//! Identity lookups used by request authentication and the gateway handshake.

use async_trait::async_trait;
use career_common::id::{has_prefix, prefix};
use dashmap::DashMap;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::db::pool::DbPool;
use crate::db::schema::users;
use crate::error::ApiError;
use crate::models::user::{Role, User};

/// The subset of a user account needed to authorize a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub full_name: Option<String>,
    pub role: Role,
    pub is_active: bool,
}

impl UserRecord {
    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or(&self.email)
    }
}

/// Resolves a token subject to a user account.
///
/// Backed by PostgreSQL in production and an in-memory map in tests.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>, ApiError>;
}

// ---------------------------------------------------------------------------
// PostgreSQL implementation
// ---------------------------------------------------------------------------

pub struct PgDirectory {
    pool: DbPool,
}

impl PgDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgDirectory {
    async fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>, ApiError> {
        if !has_prefix(user_id, prefix::USER) {
            return Ok(None);
        }

        // The pooled connection is released when this function returns.
        let mut conn = self.pool.get().await?;

        let user: Option<User> = users::table
            .find(user_id)
            .select(User::as_select())
            .first(&mut conn)
            .await
            .optional()?;

        let Some(user) = user else {
            return Ok(None);
        };

        let Some(role) = user.role() else {
            tracing::warn!(user_id = %user.id, role = %user.role, "user has unknown role");
            return Ok(None);
        };

        Ok(Some(UserRecord {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            role,
            is_active: user.is_active,
        }))
    }
}

// ---------------------------------------------------------------------------
// In-memory implementation (tests)
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryDirectory {
    users: DashMap<String, UserRecord>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user: UserRecord) {
        self.users.insert(user.id.clone(), user);
    }

    pub fn set_active(&self, user_id: &str, active: bool) {
        if let Some(mut user) = self.users.get_mut(user_id) {
            user.is_active = active;
        }
    }

    pub fn remove(&self, user_id: &str) {
        self.users.remove(user_id);
    }
}

#[async_trait]
impl UserDirectory for MemoryDirectory {
    async fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>, ApiError> {
        Ok(self.users.get(user_id).map(|u| u.clone()))
    }
}
