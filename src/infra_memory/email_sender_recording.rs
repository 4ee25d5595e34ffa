use crate::domain_port::*;
use std::sync::{Mutex, PoisonError};
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

impl SentEmail {
    /// The `token` query parameter of the first link in the body.
    pub fn link_token(&self) -> Option<&str> {
        let start = self.html_body.find("token=")? + "token=".len();
        let rest = &self.html_body[start..];
        let end = rest
            .find(|c: char| c == '"' || c == '<' || c == '&' || c.is_whitespace())
            .unwrap_or(rest.len());
        Some(&rest[..end])
    }
}

/// Keeps every message instead of delivering it.
#[derive(Default)]
pub struct RecordingEmailSender {
    outbox: Mutex<Vec<SentEmail>>,
    failing: AtomicBool,
}

impl RecordingEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        // a panicking test thread must not hide what was already sent
        self.outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last(&self) -> Option<SentEmail> {
        self.sent().pop()
    }
}

#[async_trait::async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), DeliveryError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DeliveryError("recording sender switched to failure".to_string()));
        }
        self.outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SentEmail {
                to: to.to_string(),
                subject: subject.to_string(),
                html_body: html_body.to_string(),
            });
        Ok(())
    }
}
