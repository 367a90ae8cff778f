use std::sync::Arc;

use sqlx::PgPool;
use tracing::warn;

use crate::auth::jwt::JwtKeys;
use crate::auth::repo::{PgUserStore, UserStore};
use crate::config::AppConfig;
use crate::mail::{Mailer, SmtpMailer, UnconfiguredMailer};
use crate::watchlist::repo::{PgWatchlistStore, WatchlistStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub keys: JwtKeys,
    pub users: Arc<dyn UserStore>,
    pub watchlist: Arc<dyn WatchlistStore>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub fn init(config: AppConfig, db: PgPool) -> anyhow::Result<Self> {
        let mailer: Arc<dyn Mailer> = match &config.mail {
            Some(mail) => Arc::new(SmtpMailer::new(mail)?),
            None => {
                warn!("EMAIL_USER / EMAIL_PASSWORD not set; password reset emails are disabled");
                Arc::new(UnconfiguredMailer)
            }
        };

        Ok(Self::from_parts(
            Arc::new(config),
            Arc::new(PgUserStore::new(db.clone())),
            Arc::new(PgWatchlistStore::new(db)),
            mailer,
        ))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        watchlist: Arc<dyn WatchlistStore>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            keys: JwtKeys::new(&config.jwt),
            config,
            users,
            watchlist,
            mailer,
        }
    }
}
