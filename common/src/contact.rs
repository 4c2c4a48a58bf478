//! Contact form submission against an injected backend.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const GENERIC_SUBMIT_ERROR: &str = "Failed to submit contact form. Please try again later.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactSubmission {
    pub name: String,
    pub email: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub name: String,
    pub email: String,
    pub message: String,
    #[serde(rename = "receivedAt")]
    pub received_at: DateTime<Utc>,
}

/// Remote store for contact messages. Accepts or rejects a submission as a whole.
pub trait ContactBackend {
    fn submit(&self, submission: ContactSubmission) -> Result<(), String>;
    fn list(&self) -> Result<Vec<ContactRecord>, String>;
}

impl<B: ContactBackend + ?Sized> ContactBackend for &B {
    fn submit(&self, submission: ContactSubmission) -> Result<(), String> {
        (**self).submit(submission)
    }

    fn list(&self) -> Result<Vec<ContactRecord>, String> {
        (**self).list()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContactError {
    #[error("{0}")]
    Rejected(String),
}

impl ContactError {
    pub fn message(&self) -> &str {
        match self {
            Self::Rejected(message) => message,
        }
    }
}

/// Forwards the three strings unchanged. No local validation, no retry.
pub fn submit_contact<B: ContactBackend + ?Sized>(
    backend: &B,
    name: &str,
    email: &str,
    message: &str,
) -> Result<(), ContactError> {
    let submission = ContactSubmission {
        name: name.to_string(),
        email: email.to_string(),
        message: message.to_string(),
    };

    backend.submit(submission).map_err(|err| {
        let text = err.trim();
        if text.is_empty() {
            ContactError::Rejected(GENERIC_SUBMIT_ERROR.to_string())
        } else {
            ContactError::Rejected(text.to_string())
        }
    })
}

/// Append-only, process-local contact store.
#[derive(Debug, Default)]
pub struct InMemoryContactBook {
    records: Mutex<Vec<ContactRecord>>,
}

impl InMemoryContactBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<ContactRecord>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }
}

impl ContactBackend for InMemoryContactBook {
    fn submit(&self, submission: ContactSubmission) -> Result<(), String> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| "contact store unavailable".to_string())?;
        records.push(ContactRecord {
            name: submission.name,
            email: submission.email,
            message: submission.message,
            received_at: Utc::now(),
        });
        Ok(())
    }

    fn list(&self) -> Result<Vec<ContactRecord>, String> {
        self.records
            .lock()
            .map(|records| records.clone())
            .map_err(|_| "contact store unavailable".to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactNotice {
    pub kind: NoticeKind,
    pub raised_at_ms: u64,
    pub expires_at_ms: u64,
}

impl ContactNotice {
    pub fn is_visible(&self, now_ms: u64) -> bool {
        now_ms < self.expires_at_ms
    }
}

/// Submission state as shown next to the form: one in-flight flag and at
/// most one notice, which dismisses itself.
#[derive(Debug, Clone)]
pub struct ContactForm {
    dismiss_after_ms: u64,
    in_flight: bool,
    notice: Option<ContactNotice>,
}

impl ContactForm {
    pub fn new(dismiss_after_ms: u64) -> Self {
        Self {
            dismiss_after_ms,
            in_flight: false,
            notice: None,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn begin(&mut self) {
        self.in_flight = true;
        self.notice = None;
    }

    pub fn finish(&mut self, outcome: &Result<(), ContactError>, now_ms: u64) {
        self.in_flight = false;
        let kind = match outcome {
            Ok(()) => NoticeKind::Success,
            Err(err) => NoticeKind::Error(err.message().to_string()),
        };
        self.notice = Some(ContactNotice {
            kind,
            raised_at_ms: now_ms,
            expires_at_ms: now_ms.saturating_add(self.dismiss_after_ms),
        });
    }

    pub fn submit<B: ContactBackend + ?Sized>(
        &mut self,
        backend: &B,
        name: &str,
        email: &str,
        message: &str,
        now_ms: u64,
    ) -> Result<(), ContactError> {
        self.begin();
        let outcome = submit_contact(backend, name, email, message);
        self.finish(&outcome, now_ms);
        outcome
    }

    pub fn notice(&self, now_ms: u64) -> Option<&ContactNotice> {
        self.notice.as_ref().filter(|notice| notice.is_visible(now_ms))
    }
}
