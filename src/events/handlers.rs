use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{error, info, instrument};

use super::{
    dto::{EventCreate, EventOut, EventUpdate, ListQuery},
    repo_types::{EventPatch, NewEvent},
};
use crate::{
    auth::extractors::AdminUser,
    error::ApiError,
    extract::{ApiJson, ApiPath},
    state::AppState,
    store::StoreError,
};

pub fn event_routes() -> Router<AppState> {
    Router::new()
        .route("/events", get(list_events).post(create_event))
        .route(
            "/events/:id",
            get(get_event).patch(update_event).delete(delete_event),
        )
}

fn event_error(e: StoreError) -> ApiError {
    match e {
        StoreError::NotFound => ApiError::NotFound("Event not found".into()),
        other => {
            error!(error = %other, "event store failure");
            ApiError::internal()
        }
    }
}

#[instrument(skip(state, admin, body))]
pub async fn create_event(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiJson(body): ApiJson<EventCreate>,
) -> Result<Json<EventOut>, ApiError> {
    let new_event = NewEvent::from(body);
    if new_event.title.is_empty() {
        return Err(ApiError::BadRequest("Title is required".into()));
    }
    let event = state
        .events
        .insert_event(new_event)
        .await
        .map_err(event_error)?;
    info!(event_id = event.id, admin_id = admin.id, "event created");
    Ok(Json(event.into()))
}

#[instrument(skip(state))]
pub async fn list_events(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Result<Json<Vec<EventOut>>, ApiError> {
    let events = state
        .events
        .list_events(q.needle())
        .await
        .map_err(event_error)?;
    Ok(Json(events.into_iter().map(EventOut::from).collect()))
}

#[instrument(skip(state))]
pub async fn get_event(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<EventOut>, ApiError> {
    match state.events.get_event(id).await.map_err(event_error)? {
        Some(event) => Ok(Json(event.into())),
        None => Err(ApiError::NotFound("Event not found".into())),
    }
}

#[instrument(skip(state, admin, body))]
pub async fn update_event(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<EventUpdate>,
) -> Result<Json<EventOut>, ApiError> {
    let patch = EventPatch::from(body);
    if patch.title.as_deref() == Some("") {
        return Err(ApiError::BadRequest("Title is required".into()));
    }
    let event = state
        .events
        .update_event(id, patch)
        .await
        .map_err(event_error)?;
    info!(event_id = event.id, admin_id = admin.id, "event updated");
    Ok(Json(event.into()))
}

#[instrument(skip(state, admin))]
pub async fn delete_event(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    state.events.delete_event(id).await.map_err(event_error)?;
    info!(event_id = id, admin_id = admin.id, "event deleted");
    Ok(StatusCode::NO_CONTENT)
}
