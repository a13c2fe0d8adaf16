use sqlx::FromRow;
use time::{Date, OffsetDateTime, Time};

#[derive(Debug, Clone, FromRow)]
pub struct Event {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub date: Date,
    pub time: Time,
    pub image_url: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    pub date: Date,
    pub time: Time,
    pub image_url: Option<String>,
}

/// Partial update. `None` leaves a column alone; for `image_url`,
/// `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct EventPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<Date>,
    pub time: Option<Time>,
    pub image_url: Option<Option<String>>,
}

impl EventPatch {
    pub fn apply(self, event: &mut Event) {
        if let Some(title) = self.title {
            event.title = title;
        }
        if let Some(description) = self.description {
            event.description = description;
        }
        if let Some(date) = self.date {
            event.date = date;
        }
        if let Some(time) = self.time {
            event.time = time;
        }
        if let Some(image_url) = self.image_url {
            event.image_url = image_url;
        }
    }
}

impl Event {
    /// Case-insensitive substring match on title or description.
    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.title.to_lowercase().contains(&needle)
            || self.description.to_lowercase().contains(&needle)
    }
}
