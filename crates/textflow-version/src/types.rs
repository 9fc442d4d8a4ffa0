use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use textflow_core::TextUnit;

/// Why and by whom a version was created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ChangeMeta {
    pub reason: Option<String>,
    pub author: Option<String>,
}

impl ChangeMeta {
    #[must_use]
    pub fn reason(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            author: None,
        }
    }

    #[must_use]
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }
}

/// Immutable snapshot of a logical document.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Version {
    pub id: String,
    pub document_id: String,
    /// Per-document, starts at 1, strictly increasing and contiguous.
    pub number: u64,
    pub created_at: DateTime<Utc>,
    pub content_hash: String,
    pub unit: TextUnit,
    pub valid_from: DateTime<Utc>,
    /// `None` while this is the current version.
    pub valid_to: Option<DateTime<Utc>>,
    pub change_reason: Option<String>,
    pub author: Option<String>,
}

impl Version {
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.valid_to.is_none()
    }

    /// Whether `t` falls inside `[valid_from, valid_to)`, an open window ending at `now`.
    #[must_use]
    pub fn is_valid_at(&self, t: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let end = self.valid_to.unwrap_or(now);
        if self.valid_to.is_none() {
            self.valid_from <= t && t <= end
        } else {
            self.valid_from <= t && t < end
        }
    }
}
