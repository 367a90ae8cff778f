use rand::{rngs::OsRng, RngCore};
use time::{Duration, OffsetDateTime};

/// How long a password-reset token stays valid after issuance.
pub const RESET_TOKEN_TTL: Duration = Duration::hours(1);

const RESET_TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone)]
pub struct ResetToken {
    pub token: String,
    pub expires_at: OffsetDateTime,
}

/// Opaque single-use credential drawn from the OS CSPRNG.
pub fn issue_reset_token(now: OffsetDateTime) -> ResetToken {
    let mut bytes = [0u8; RESET_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    ResetToken {
        token: hex::encode(bytes),
        expires_at: now + RESET_TOKEN_TTL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_hex_and_expires_in_one_hour() {
        let now = OffsetDateTime::now_utc();
        let t = issue_reset_token(now);
        assert_eq!(t.token.len(), RESET_TOKEN_BYTES * 2);
        assert!(t.token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(t.expires_at - now, Duration::hours(1));
    }

    #[test]
    fn tokens_do_not_repeat() {
        let now = OffsetDateTime::now_utc();
        assert_ne!(issue_reset_token(now).token, issue_reset_token(now).token);
    }
}
