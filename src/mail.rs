use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::info;

use crate::config::MailConfig;

const RESET_SUBJECT: &str = "Password Reset Request - CoinVista";

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_password_reset(&self, to: &str, reset_url: &str) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(cfg: &MailConfig) -> anyhow::Result<Self> {
        let from: Mailbox = format!("CoinVista <{}>", cfg.from)
            .parse()
            .context("invalid EMAIL_FROM address")?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.host)
            .with_context(|| format!("smtp relay {}", cfg.host))?
            .port(cfg.port)
            .credentials(Credentials::new(cfg.username.clone(), cfg.password.clone()))
            .timeout(Some(std::time::Duration::from_secs(10)))
            .build();
        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_password_reset(&self, to: &str, reset_url: &str) -> anyhow::Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to.parse().context("invalid recipient address")?)
            .subject(RESET_SUBJECT)
            .multipart(MultiPart::alternative_plain_html(
                reset_text_body(reset_url),
                reset_html_body(reset_url),
            ))
            .context("build reset email")?;

        self.transport
            .send(message)
            .await
            .context("send reset email")?;
        info!("password reset email sent");
        Ok(())
    }
}

/// Used when no SMTP credentials are configured; every send fails.
pub struct UnconfiguredMailer;

#[async_trait]
impl Mailer for UnconfiguredMailer {
    async fn send_password_reset(&self, _to: &str, _reset_url: &str) -> anyhow::Result<()> {
        anyhow::bail!("mail transport not configured (EMAIL_USER / EMAIL_PASSWORD)")
    }
}

fn reset_text_body(reset_url: &str) -> String {
    format!(
        "Password Reset Request\n\n\
         Hello,\n\n\
         You have requested to reset your password for your CoinVista account.\n\n\
         Please visit the following link to reset your password:\n\
         {reset_url}\n\n\
         This link will expire in 1 hour.\n\n\
         If you didn't request this password reset, please ignore this email and your \
         password will remain unchanged.\n"
    )
}

fn reset_html_body(reset_url: &str) -> String {
    format!(
        r#"<div style="max-width: 600px; margin: 0 auto; padding: 20px; font-family: Arial, sans-serif;">
  <h2 style="text-align: center;">Password Reset Request</h2>
  <p>Hello,</p>
  <p>You have requested to reset your password for your CoinVista account.</p>
  <p style="text-align: center; margin: 30px 0;">
    <a href="{reset_url}" style="background-color: #007bff; color: white; padding: 12px 25px; text-decoration: none; border-radius: 5px;">Reset Password</a>
  </p>
  <p>If the button doesn't work, copy and paste this link into your browser:</p>
  <p style="word-break: break-all; color: #666;">{reset_url}</p>
  <p style="font-size: 14px; color: #666;">This link will expire in 1 hour.</p>
  <p style="font-size: 14px; color: #666;">If you didn't request this password reset, please ignore this email and your password will remain unchanged.</p>
</div>"#
    )
}

#[cfg(test)]
pub mod fake {
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct SentReset {
        pub to: String,
        pub reset_url: String,
    }

    /// Records outgoing mail instead of sending it.
    #[derive(Default)]
    pub struct RecordingMailer {
        sent: Mutex<Vec<SentReset>>,
        fail: bool,
    }

    impl RecordingMailer {
        pub fn failing() -> Self {
            Self { fail: true, ..Default::default() }
        }

        pub fn sent(&self) -> Vec<SentReset> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send_password_reset(&self, to: &str, reset_url: &str) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("smtp unavailable");
            }
            self.sent.lock().unwrap().push(SentReset {
                to: to.to_string(),
                reset_url: reset_url.to_string(),
            });
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bodies_carry_link_and_expiry_note() {
        let url = "http://localhost:3000/reset-password?token=ab&email=a%40x.com";
        for body in [reset_text_body(url), reset_html_body(url)] {
            assert!(body.contains(url));
            assert!(body.contains("1 hour"));
        }
    }

    #[tokio::test]
    async fn unconfigured_mailer_always_fails() {
        let err = UnconfiguredMailer
            .send_password_reset("a@x.com", "http://x")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not configured"));
    }

    #[test]
    fn smtp_mailer_rejects_bad_from_address() {
        let cfg = MailConfig {
            host: "smtp.example.com".into(),
            port: 587,
            username: "user".into(),
            password: "pass".into(),
            from: "not an address".into(),
        };
        assert!(SmtpMailer::new(&cfg).is_err());
    }
}
