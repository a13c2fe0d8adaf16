use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};

use super::{EventStore, StoreError, UserStore};
use crate::{
    auth::repo_types::{NewUser, User, UserRow},
    events::repo_types::{Event, EventPatch, NewEvent},
};

const USER_COLUMNS: &str = "id, name, email, hashed_password, role, created_at, updated_at";
const EVENT_COLUMNS: &str =
    "id, title, description, date, time, image_url, created_at, updated_at";

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    /// Connects the pool and brings the schema up to date.
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("connect to database")?;

        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .context("run migrations")?;

        Ok(Self { db })
    }
}

fn into_user(row: UserRow) -> Result<User, StoreError> {
    User::try_from(row).map_err(|e| StoreError::Backend(e.to_string()))
}

/// `%needle%` with LIKE metacharacters escaped so the search is a plain substring match.
fn like_pattern(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len() + 2);
    out.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        row.map(into_user).transpose()
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        row.map(into_user).transpose()
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (name, email, hashed_password, role)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.hashed_password)
        .bind(user.role.as_str())
        .fetch_one(&self.db)
        .await?;
        into_user(row)
    }
}

#[async_trait]
impl EventStore for PgStore {
    async fn insert_event(&self, event: NewEvent) -> Result<Event, StoreError> {
        let row = sqlx::query_as::<_, Event>(&format!(
            r#"
            INSERT INTO events (title, description, date, time, image_url)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {EVENT_COLUMNS}
            "#
        ))
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.date)
        .bind(event.time)
        .bind(&event.image_url)
        .fetch_one(&self.db)
        .await?;
        Ok(row)
    }

    async fn list_events(&self, search: Option<&str>) -> Result<Vec<Event>, StoreError> {
        let rows = match search {
            Some(needle) => {
                sqlx::query_as::<_, Event>(&format!(
                    r#"
                    SELECT {EVENT_COLUMNS}
                    FROM events
                    WHERE title ILIKE $1 OR description ILIKE $1
                    ORDER BY date, time, id
                    "#
                ))
                .bind(like_pattern(needle))
                .fetch_all(&self.db)
                .await?
            }
            None => {
                sqlx::query_as::<_, Event>(&format!(
                    "SELECT {EVENT_COLUMNS} FROM events ORDER BY date, time, id"
                ))
                .fetch_all(&self.db)
                .await?
            }
        };
        Ok(rows)
    }

    async fn get_event(&self, id: i64) -> Result<Option<Event>, StoreError> {
        let row = sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn update_event(&self, id: i64, patch: EventPatch) -> Result<Event, StoreError> {
        let (set_image, image_url) = match patch.image_url {
            Some(v) => (true, v),
            None => (false, None),
        };
        let row = sqlx::query_as::<_, Event>(&format!(
            r#"
            UPDATE events SET
                title       = COALESCE($2, title),
                description = COALESCE($3, description),
                date        = COALESCE($4, date),
                time        = COALESCE($5, time),
                image_url   = CASE WHEN $6 THEN $7 ELSE image_url END,
                updated_at  = now()
            WHERE id = $1
            RETURNING {EVENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(patch.title)
        .bind(patch.description)
        .bind(patch.date)
        .bind(patch.time)
        .bind(set_image)
        .bind(image_url)
        .fetch_optional(&self.db)
        .await?;
        row.ok_or(StoreError::NotFound)
    }

    async fn delete_event(&self, id: i64) -> Result<(), StoreError> {
        let done = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        if done.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
