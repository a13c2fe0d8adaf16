use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::warn;

use super::{
    access::{authenticate, require_role, AuthError},
    repo_types::{Role, User},
};
use crate::{error::ApiError, state::AppState};

/// Authenticated caller, resolved from `Authorization: Bearer <token>`.
pub struct CurrentUser(pub User);

/// Authenticated caller holding the `admin` role.
pub struct AdminUser(pub User);

fn bearer_token(parts: &Parts) -> Result<&str, AuthError> {
    let auth = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AuthError::MissingToken)?;

    // scheme is case-insensitive
    match auth.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(token.trim())
        }
        _ => Err(AuthError::MissingToken),
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let user = authenticate(state.users.as_ref(), &state.keys, token).await?;
        Ok(CurrentUser(user))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if let Err(e) = require_role(&user, Role::Admin) {
            warn!(user_id = user.id, role = %user.role, "admin access denied");
            return Err(e.into());
        }
        Ok(AdminUser(user))
    }
}
