use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use super::{
    dto::RegisterRequest,
    jwt::JwtKeys,
    password::{hash_password, verify_password},
    repo_types::{NewUser, User},
};
use crate::store::{StoreError, UserStore};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

#[derive(Debug, thiserror::Error)]
pub enum RegisterError {
    #[error("{0}")]
    Invalid(&'static str),
    #[error("Email already registered")]
    DuplicateEmail,
    #[error("Registration failed: {0}")]
    Failed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error("Incorrect email or password")]
    BadCredentials,
    #[error("Login failed: {0}")]
    Failed(String),
}

lazy_static! {
    /// Verified against when the email is unknown, so a miss costs as much
    /// as a wrong password.
    static ref DUMMY_HASH: String =
        hash_password("not-a-real-password").unwrap_or_default();
}

/// Hashing is deliberately slow, so it runs off the async workers.
async fn hash_blocking(password: String) -> anyhow::Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&password)).await?
}

async fn verify_blocking(password: String, hash: String) -> anyhow::Result<bool> {
    Ok(tokio::task::spawn_blocking(move || verify_password(&password, &hash)).await?)
}

/// Creates a user. The email pre-check is only a fast path; the store's
/// uniqueness guarantee decides races between concurrent registrations.
pub async fn register_user(
    users: &dyn UserStore,
    req: RegisterRequest,
) -> Result<User, RegisterError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(RegisterError::Invalid("Name is required"));
    }
    if !is_valid_email(&req.email) {
        return Err(RegisterError::Invalid("Invalid email"));
    }
    if req.password.is_empty() {
        return Err(RegisterError::Invalid("Password is required"));
    }

    match users.find_user_by_email(&req.email).await {
        Ok(Some(_)) => return Err(RegisterError::DuplicateEmail),
        Ok(None) => {}
        Err(e) => return Err(RegisterError::Failed(e.to_string())),
    }

    let hashed_password = hash_blocking(req.password)
        .await
        .map_err(|e| RegisterError::Failed(e.to_string()))?;

    let user = users
        .insert_user(NewUser {
            name: name.to_string(),
            email: req.email,
            hashed_password,
            role: req.role,
        })
        .await
        .map_err(|e| match e {
            StoreError::Conflict(_) => RegisterError::DuplicateEmail,
            other => RegisterError::Failed(other.to_string()),
        })?;

    info!(user_id = user.id, role = %user.role, "user registered");
    Ok(user)
}

/// Checks credentials and issues an access token.
pub async fn login_user(
    users: &dyn UserStore,
    keys: &JwtKeys,
    email: &str,
    password: String,
) -> Result<String, LoginError> {
    let user = match users.find_user_by_email(email).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!("login unknown email");
            let _ = verify_blocking(password, DUMMY_HASH.clone()).await;
            return Err(LoginError::BadCredentials);
        }
        Err(e) => return Err(LoginError::Failed(e.to_string())),
    };

    let ok = verify_blocking(password, user.hashed_password.clone())
        .await
        .map_err(|e| LoginError::Failed(e.to_string()))?;
    if !ok {
        warn!(user_id = user.id, "login invalid password");
        return Err(LoginError::BadCredentials);
    }

    let token = keys
        .issue(user.id)
        .map_err(|e| LoginError::Failed(e.to_string()))?;
    info!(user_id = user.id, "user logged in");
    Ok(token)
}
