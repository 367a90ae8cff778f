use anyhow::Context;
use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{info, warn};
use url::Url;

use tokio::sync::OnceCell;

use crate::auth::password::{hash_password_blocking, verify_password_blocking};
use crate::auth::reset::issue_reset_token;
use crate::error::AppError;
use crate::state::AppState;

pub const MIN_RESET_PASSWORD_LEN: usize = 6;
pub const FORGOT_PASSWORD_MESSAGE: &str =
    "If an account with that email exists, we've sent a password reset link.";
pub const RESET_PASSWORD_MESSAGE: &str = "Password has been reset successfully";

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

// Verified against when the email is unknown so both login failures cost the same.
static DUMMY_HASH: OnceCell<String> = OnceCell::const_new();

async fn dummy_hash() -> anyhow::Result<&'static str> {
    let hash = DUMMY_HASH
        .get_or_try_init(|| hash_password_blocking("coinvista-timing-pad".to_string()))
        .await?;
    Ok(hash.as_str())
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub async fn register(st: &AppState, email: &str, password: &str) -> Result<String, AppError> {
    let email = email.trim();
    if !is_valid_email(email) {
        return Err(AppError::validation("Invalid email"));
    }
    if password.is_empty() {
        return Err(AppError::validation("Password is required"));
    }

    if st.users.find_by_email(email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AppError::Conflict);
    }

    let hash = hash_password_blocking(password.to_string()).await?;

    // A concurrent registration may still win the insert; the unique index decides.
    let user = st
        .users
        .create(email, &hash)
        .await?
        .ok_or(AppError::Conflict)?;

    let token = st.keys.sign_access(user.id).context("sign access token")?;
    info!(user_id = %user.id, "user registered");
    Ok(token)
}

pub async fn login(st: &AppState, email: &str, password: &str) -> Result<String, AppError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(AppError::validation("Email is required"));
    }

    let Some(user) = st.users.find_by_email(email).await? else {
        let pad = dummy_hash().await?;
        let _ = verify_password_blocking(password.to_string(), pad.to_string()).await;
        warn!("login unknown email");
        return Err(AppError::InvalidCredentials);
    };

    if !verify_password_blocking(password.to_string(), user.password_hash.clone()).await? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    let token = st.keys.sign_access(user.id).context("sign access token")?;
    info!(user_id = %user.id, "user logged in");
    Ok(token)
}

pub async fn forgot_password(st: &AppState, email: &str) -> Result<(), AppError> {
    forgot_password_at(st, email, OffsetDateTime::now_utc()).await
}

/// Same outcome whether or not the account exists.
pub async fn forgot_password_at(
    st: &AppState,
    email: &str,
    now: OffsetDateTime,
) -> Result<(), AppError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(AppError::validation("Email is required"));
    }

    let Some(user) = st.users.find_by_email(email).await? else {
        info!("password reset requested for unknown email");
        return Ok(());
    };

    let reset = issue_reset_token(now);
    st.users
        .set_reset_token(user.id, &reset.token, reset.expires_at)
        .await?;

    let link = reset_link(&st.config.frontend_url, &reset.token, &user.email)?;
    st.mailer.send_password_reset(&user.email, &link).await?;

    info!(user_id = %user.id, "password reset issued");
    Ok(())
}

pub async fn reset_password(
    st: &AppState,
    token: &str,
    email: &str,
    new_password: &str,
) -> Result<(), AppError> {
    reset_password_at(st, token, email, new_password, OffsetDateTime::now_utc()).await
}

pub async fn reset_password_at(
    st: &AppState,
    token: &str,
    email: &str,
    new_password: &str,
    now: OffsetDateTime,
) -> Result<(), AppError> {
    let email = email.trim();
    if token.is_empty() || email.is_empty() || new_password.is_empty() {
        return Err(AppError::validation(
            "Token, email, and new password are required",
        ));
    }
    if new_password.chars().count() < MIN_RESET_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password must be at least {MIN_RESET_PASSWORD_LEN} characters long"
        )));
    }

    let Some(user) = st.users.find_by_reset_token(email, token, now).await? else {
        warn!("invalid or expired reset token");
        return Err(AppError::InvalidOrExpiredToken);
    };

    let hash = hash_password_blocking(new_password.to_string()).await?;

    // Conditional on the token again: a concurrent reset may have consumed it.
    if !st.users.complete_reset(email, token, now, &hash).await? {
        warn!(user_id = %user.id, "reset token consumed concurrently");
        return Err(AppError::InvalidOrExpiredToken);
    }

    info!(user_id = %user.id, "password reset completed");
    Ok(())
}

/// `<frontend>/reset-password?token=..&email=..` with the query percent-encoded.
pub fn reset_link(frontend_url: &str, token: &str, email: &str) -> anyhow::Result<String> {
    let base = frontend_url.trim_end_matches('/');
    let mut url = Url::parse(&format!("{base}/reset-password")).context("invalid FRONTEND_URL")?;
    url.query_pairs_mut()
        .append_pair("token", token)
        .append_pair("email", email);
    Ok(url.into())
}
