//! Outbound email collaborator.
//! Delivery is external to this core and fire-and-forget: a failed send is
//! logged by the caller and never rolls back the state change that
//! triggered it.

use anyhow::Result;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

pub trait Mailer: Send + Sync {
    fn send(&self, mail: Mail) -> Result<()>;
}

/// Discards all mail. Default collaborator for embeddings that wire their
/// own delivery at the API layer.
#[derive(Debug, Clone, Default)]
pub struct NullMailer;

impl Mailer for NullMailer {
    fn send(&self, _mail: Mail) -> Result<()> {
        Ok(())
    }
}

/// Captures sent mail for assertions.
#[derive(Clone, Default)]
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<Mail>>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Mail> {
        self.sent.lock().clone()
    }
}

impl Mailer for RecordingMailer {
    fn send(&self, mail: Mail) -> Result<()> {
        self.sent.lock().push(mail);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_mailer_captures_sends() {
        let mailer = RecordingMailer::new();
        mailer
            .send(Mail {
                to: "alice@example.com".into(),
                subject: "Email Verification".into(),
                html_body: "<p>hi</p>".into(),
            })
            .unwrap();
        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "alice@example.com");
    }
}
