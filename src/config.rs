use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
}

/// SMTP credentials for the password-reset mailer.
#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub frontend_url: String,
    pub jwt: JwtConfig,
    pub mail: Option<MailConfig>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

        let secret = std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        anyhow::ensure!(!secret.trim().is_empty(), "JWT_SECRET must not be empty");

        let jwt = JwtConfig {
            secret,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "coinvista".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "coinvista-users".into()),
        };

        let frontend_url = std::env::var("FRONTEND_URL")
            .unwrap_or_else(|_| "http://localhost:3000".into());

        Ok(Self {
            database_url,
            frontend_url,
            jwt,
            mail: MailConfig::from_env(),
        })
    }
}

impl MailConfig {
    /// Returns `None` unless both `EMAIL_USER` and `EMAIL_PASSWORD` are present.
    fn from_env() -> Option<Self> {
        let username = std::env::var("EMAIL_USER").ok().filter(|v| !v.is_empty())?;
        let password = std::env::var("EMAIL_PASSWORD").ok().filter(|v| !v.is_empty())?;
        Some(Self {
            host: std::env::var("SMTP_HOST").unwrap_or_else(|_| "smtp.gmail.com".into()),
            port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(587),
            from: std::env::var("EMAIL_FROM").unwrap_or_else(|_| username.clone()),
            username,
            password,
        })
    }
}
