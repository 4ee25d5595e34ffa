use crate::domain_port::*;
use tracing::info;

#[derive(Debug, Default)]
pub struct FakeEmailSender;

impl FakeEmailSender {
    pub fn new() -> Self {
        Self
    }
}

// Development stand-in: the mail is logged, never delivered.
#[async_trait::async_trait]
impl EmailSender for FakeEmailSender {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), DeliveryError> {
        let link = html_body
            .split("href=\"")
            .nth(1)
            .and_then(|rest| rest.split('"').next())
            .unwrap_or(html_body);
        info!(to, subject, link, "fake email sent");
        Ok(())
    }
}
