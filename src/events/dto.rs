use serde::{Deserialize, Deserializer, Serialize};
use time::{Date, OffsetDateTime, Time};

use super::repo_types::{Event, EventPatch, NewEvent};

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// Times go out as `HH:MM:SS`; input may omit the seconds.
mod time_of_day {
    use serde::{de::Error as _, ser::Error as _, Deserialize, Deserializer, Serializer};
    use time::{format_description::FormatItem, macros::format_description, Time};

    const HMS: &[FormatItem<'static>] = format_description!("[hour]:[minute]:[second]");
    const HM: &[FormatItem<'static>] = format_description!("[hour]:[minute]");

    pub fn parse(raw: &str) -> Result<Time, time::error::Parse> {
        let raw = raw.trim();
        Time::parse(raw, HMS).or_else(|_| Time::parse(raw, HM))
    }

    pub fn serialize<S: Serializer>(t: &Time, s: S) -> Result<S::Ok, S::Error> {
        let out = t.format(HMS).map_err(S::Error::custom)?;
        s.serialize_str(&out)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Time, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).map_err(D::Error::custom)
    }

    pub mod option {
        use serde::{de::Error as _, Deserialize, Deserializer};
        use time::Time;

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Time>, D::Error> {
            match Option::<String>::deserialize(d)? {
                Some(raw) => super::parse(&raw).map(Some).map_err(D::Error::custom),
                None => Ok(None),
            }
        }
    }
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
fn double_option<'de, T, D>(d: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(d).map(Some)
}

#[derive(Debug, Deserialize)]
pub struct EventCreate {
    pub title: String,
    pub description: String,
    #[serde(with = "iso_date")]
    pub date: Date,
    #[serde(deserialize_with = "time_of_day::deserialize")]
    pub time: Time,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl From<EventCreate> for NewEvent {
    fn from(e: EventCreate) -> Self {
        Self {
            title: e.title.trim().to_string(),
            description: e.description,
            date: e.date,
            time: e.time,
            image_url: e.image_url,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct EventUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, with = "iso_date::option")]
    pub date: Option<Date>,
    #[serde(default, deserialize_with = "time_of_day::option::deserialize")]
    pub time: Option<Time>,
    #[serde(default, deserialize_with = "double_option")]
    pub image_url: Option<Option<String>>,
}

impl From<EventUpdate> for EventPatch {
    fn from(u: EventUpdate) -> Self {
        Self {
            title: u.title.map(|t| t.trim().to_string()),
            description: u.description,
            date: u.date,
            time: u.time,
            image_url: u.image_url,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub search: Option<String>,
}

impl ListQuery {
    /// Blank searches mean "no filter".
    pub fn needle(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Serialize)]
pub struct EventOut {
    pub id: i64,
    pub title: String,
    pub description: String,
    #[serde(with = "iso_date")]
    pub date: Date,
    #[serde(serialize_with = "time_of_day::serialize")]
    pub time: Time,
    pub image_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<Event> for EventOut {
    fn from(e: Event) -> Self {
        Self {
            id: e.id,
            title: e.title,
            description: e.description,
            date: e.date,
            time: e.time,
            image_url: e.image_url,
            created_at: e.created_at,
            updated_at: e.updated_at,
        }
    }
}
