use tracing::warn;

use super::{
    jwt::{JwtKeys, TokenError},
    repo_types::{Role, User},
};
use crate::store::{StoreError, UserStore};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,
    #[error("invalid token: {0}")]
    InvalidToken(#[from] TokenError),
    #[error("user not found")]
    UserNotFound,
    #[error("insufficient role")]
    Forbidden,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Resolves a bearer token to the user it was issued for.
pub async fn authenticate(
    users: &dyn UserStore,
    keys: &JwtKeys,
    token: &str,
) -> Result<User, AuthError> {
    let user_id = keys.validate(token).map_err(|e| {
        warn!(reason = %e, "token rejected");
        AuthError::InvalidToken(e)
    })?;

    users.find_user_by_id(user_id).await?.ok_or_else(|| {
        warn!(user_id, "token subject no longer exists");
        AuthError::UserNotFound
    })
}

/// Equality check, not a hierarchy: only `role` itself passes.
pub fn require_role(user: &User, role: Role) -> Result<(), AuthError> {
    if user.role == role {
        Ok(())
    } else {
        Err(AuthError::Forbidden)
    }
}
