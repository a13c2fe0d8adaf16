use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, instrument, warn};

use crate::{
    auth::{
        dto::{LoginForm, RegisterRequest, TokenResponse, UserOut},
        extractors::CurrentUser,
        services::{login_user, register_user, LoginError, RegisterError},
    },
    error::ApiError,
    extract::{ApiForm, ApiJson},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/users/me", get(get_me))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<Json<UserOut>, ApiError> {
    match register_user(state.users.as_ref(), payload).await {
        Ok(user) => Ok(Json(user.into())),
        Err(e @ RegisterError::Invalid(_)) => {
            warn!(error = %e, "invalid registration");
            Err(ApiError::BadRequest(e.to_string()))
        }
        Err(e @ RegisterError::DuplicateEmail) => {
            warn!("email already registered");
            Err(ApiError::BadRequest(e.to_string()))
        }
        Err(e @ RegisterError::Failed(_)) => {
            error!(error = %e, "registration failed");
            Err(ApiError::Internal(
                "Registration failed: internal server error".into(),
            ))
        }
    }
}

#[instrument(skip(state, form))]
pub async fn login(
    State(state): State<AppState>,
    ApiForm(form): ApiForm<LoginForm>,
) -> Result<Json<TokenResponse>, ApiError> {
    let LoginForm { username, password } = form;
    match login_user(state.users.as_ref(), &state.keys, &username, password).await {
        Ok(token) => Ok(Json(TokenResponse::bearer(token))),
        Err(e @ LoginError::BadCredentials) => Err(ApiError::Unauthorized(e.to_string())),
        Err(e @ LoginError::Failed(_)) => {
            error!(error = %e, "login failed");
            Err(ApiError::internal())
        }
    }
}

#[instrument(skip_all)]
pub async fn get_me(CurrentUser(user): CurrentUser) -> Json<UserOut> {
    Json(user.into())
}
