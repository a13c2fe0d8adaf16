use std::collections::BTreeMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use super::{EventStore, StoreError, UserStore};
use crate::{
    auth::repo_types::{NewUser, User},
    events::repo_types::{Event, EventPatch, NewEvent},
};

/// In-process store. Email uniqueness is checked under the write lock,
/// which plays the role of the table's unique constraint.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    users: BTreeMap<i64, User>,
    events: BTreeMap<i64, Event>,
    last_user_id: i64,
    last_event_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut inner = self.inner.write().await;
        if inner.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(format!(
                "email {} already exists",
                user.email
            )));
        }
        inner.last_user_id += 1;
        let now = OffsetDateTime::now_utc();
        let stored = User {
            id: inner.last_user_id,
            name: user.name,
            email: user.email,
            hashed_password: user.hashed_password,
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        inner.users.insert(stored.id, stored.clone());
        Ok(stored)
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn insert_event(&self, event: NewEvent) -> Result<Event, StoreError> {
        let mut inner = self.inner.write().await;
        inner.last_event_id += 1;
        let now = OffsetDateTime::now_utc();
        let stored = Event {
            id: inner.last_event_id,
            title: event.title,
            description: event.description,
            date: event.date,
            time: event.time,
            image_url: event.image_url,
            created_at: now,
            updated_at: now,
        };
        inner.events.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn list_events(&self, search: Option<&str>) -> Result<Vec<Event>, StoreError> {
        let inner = self.inner.read().await;
        let mut out: Vec<Event> = inner
            .events
            .values()
            .filter(|e| search.map_or(true, |needle| e.matches(needle)))
            .cloned()
            .collect();
        out.sort_by_key(|e| (e.date, e.time, e.id));
        Ok(out)
    }

    async fn get_event(&self, id: i64) -> Result<Option<Event>, StoreError> {
        Ok(self.inner.read().await.events.get(&id).cloned())
    }

    async fn update_event(&self, id: i64, patch: EventPatch) -> Result<Event, StoreError> {
        let mut inner = self.inner.write().await;
        let event = inner.events.get_mut(&id).ok_or(StoreError::NotFound)?;
        patch.apply(event);
        event.updated_at = OffsetDateTime::now_utc();
        Ok(event.clone())
    }

    async fn delete_event(&self, id: i64) -> Result<(), StoreError> {
        self.inner
            .write()
            .await
            .events
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }
}
