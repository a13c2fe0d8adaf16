use serde::{Deserialize, Serialize};

/// JWT payload. `sub` is the stringified user id; times are unix seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>, // user ID
    pub exp: i64,            // expires at
    #[serde(default)]
    pub iat: i64,            // issued at
}
