//! Persistence seam. Handlers and the auth core only see these traits;
//! `PgStore` backs them in production and `MemoryStore` in development/tests.

use async_trait::async_trait;

use crate::{
    auth::repo_types::{NewUser, User},
    events::repo_types::{Event, EventPatch, NewEvent},
};

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("store unavailable: {0}")]
    ConnectionFailure(String),
    #[error("store error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                StoreError::Conflict(db.message().to_string())
            }
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed => StoreError::ConnectionFailure(e.to_string()),
            other => StoreError::Backend(other.to_string()),
        }
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;
    /// Fails with `Conflict` when the email is already taken.
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError>;
}

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn insert_event(&self, event: NewEvent) -> Result<Event, StoreError>;
    /// Ordered by date, time, id. `search` matches title or description,
    /// case-insensitively.
    async fn list_events(&self, search: Option<&str>) -> Result<Vec<Event>, StoreError>;
    async fn get_event(&self, id: i64) -> Result<Option<Event>, StoreError>;
    /// Fails with `NotFound` when no event has this id.
    async fn update_event(&self, id: i64, patch: EventPatch) -> Result<Event, StoreError>;
    /// Fails with `NotFound` when no event has this id.
    async fn delete_event(&self, id: i64) -> Result<(), StoreError>;
}
