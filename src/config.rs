use anyhow::Context;
use jsonwebtoken::Algorithm;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub algorithm: Algorithm,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `None` selects the in-process memory store.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub host: String,
    pub port: u16,
    pub jwt: JwtConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty() && v != "memory");

        let db_max_connections = match lookup("DB_MAX_CONNECTIONS") {
            Some(v) => v.parse::<u32>().context("DB_MAX_CONNECTIONS must be a number")?,
            None => 10,
        };

        let host = lookup("APP_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = match lookup("APP_PORT") {
            Some(v) => v.parse::<u16>().context("APP_PORT must be a port number")?,
            None => 8080,
        };

        let secret = lookup("JWT_SECRET")
            .filter(|v| !v.is_empty())
            .context("JWT_SECRET must be set")?;
        let algorithm = parse_algorithm(
            lookup("JWT_ALGORITHM").as_deref().unwrap_or("HS256"),
        )?;
        let ttl_minutes = match lookup("JWT_TTL_MINUTES") {
            Some(v) => v.parse::<i64>().context("JWT_TTL_MINUTES must be a number")?,
            None => 30,
        };
        anyhow::ensure!(ttl_minutes > 0, "JWT_TTL_MINUTES must be positive");

        Ok(Self {
            database_url,
            db_max_connections,
            host,
            port,
            jwt: JwtConfig {
                secret,
                algorithm,
                ttl_minutes,
            },
        })
    }
}

/// Only the symmetric HMAC family is accepted; the secret is a shared key.
fn parse_algorithm(raw: &str) -> anyhow::Result<Algorithm> {
    match raw.trim().to_ascii_uppercase().as_str() {
        "HS256" => Ok(Algorithm::HS256),
        "HS384" => Ok(Algorithm::HS384),
        "HS512" => Ok(Algorithm::HS512),
        other => anyhow::bail!("unsupported JWT_ALGORITHM {other}"),
    }
}
