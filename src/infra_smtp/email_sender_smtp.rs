use crate::domain_port::*;
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, Message};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use tracing::{debug, error};

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

/// Delivers mail through an SMTP relay using STARTTLS.
pub struct SmtpEmailSender {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpEmailSender {
    pub fn new(cfg: &SmtpConfig) -> Result<Self, DeliveryError> {
        let from: Mailbox = cfg
            .from
            .parse()
            .map_err(|e| DeliveryError(format!("invalid from address: {e}")))?;

        let creds = Credentials::new(cfg.username.clone(), cfg.password.clone());
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.host)
            .map_err(|e| DeliveryError(format!("create SMTP transport: {e}")))?
            .credentials(creds)
            .port(cfg.port)
            .build();

        Ok(SmtpEmailSender { mailer, from })
    }
}

#[async_trait::async_trait]
impl EmailSender for SmtpEmailSender {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), DeliveryError> {
        let to_mailbox: Mailbox = to
            .parse()
            .map_err(|e| DeliveryError(format!("invalid recipient: {e}")))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to_mailbox)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body.to_string())
            .map_err(|e| DeliveryError(format!("build email: {e}")))?;

        match self.mailer.send(email).await {
            Ok(_) => {
                debug!(to, "email sent via SMTP");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "SMTP send failed");
                Err(DeliveryError(format!("SMTP send failed: {e}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(from: &str) -> SmtpConfig {
        SmtpConfig {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: "mailer".to_string(),
            password: "secret".to_string(),
            from: from.to_string(),
        }
    }

    #[tokio::test]
    async fn builds_with_a_named_sender() {
        assert!(SmtpEmailSender::new(&cfg("Latchkey <noreply@example.com>")).is_ok());
    }

    #[tokio::test]
    async fn rejects_an_unparseable_sender() {
        assert!(SmtpEmailSender::new(&cfg("not an address")).is_err());
    }

    #[tokio::test]
    async fn rejects_an_unparseable_recipient_before_connecting() {
        let sender = SmtpEmailSender::new(&cfg("noreply@example.com")).unwrap();
        let err = sender.send("nope", "subject", "<p>body</p>").await.unwrap_err();
        assert!(err.0.contains("invalid recipient"));
    }
}
