#[async_trait::async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), DeliveryError>;
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("delivery failed: {0}")]
pub struct DeliveryError(pub String);
