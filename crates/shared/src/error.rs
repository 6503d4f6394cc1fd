use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreErrorKind {
    /// Connection refused, DNS failure, reset mid-request.
    Transport,
    Timeout,
    NotFound,
    /// The store answered with a non-success status.
    Rejected,
    /// The store answered but the body did not match the activity shape.
    Decode,
    /// Rejected locally before any request was made.
    Validation,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind:?}: {message}")]
pub struct StoreError {
    pub kind: StoreErrorKind,
    pub message: String,
    pub status: Option<u16>,
}

impl StoreError {
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        let kind = if status == 404 {
            StoreErrorKind::NotFound
        } else {
            StoreErrorKind::Rejected
        };
        Self {
            kind,
            message: message.into(),
            status: Some(status),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Validation, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::NotFound, message)
    }

    pub fn kind(&self) -> StoreErrorKind {
        self.kind
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Whether a retry has a chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self.kind {
            StoreErrorKind::Transport | StoreErrorKind::Timeout => true,
            StoreErrorKind::Rejected => self
                .status()
                .is_some_and(|status| status == 429 || (500..600).contains(&status)),
            StoreErrorKind::NotFound | StoreErrorKind::Decode | StoreErrorKind::Validation => {
                false
            }
        }
    }
}

/// Error body returned by a PostgREST-style record store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreApiError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}

impl StoreApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
            details: None,
            hint: None,
        }
    }

    pub fn describe(&self) -> String {
        let mut out = match &self.code {
            Some(code) => format!("{code}: {}", self.message),
            None => self.message.clone(),
        };
        if let Some(details) = self.details.as_deref().filter(|d| !d.is_empty()) {
            out.push_str(&format!(" ({details})"));
        }
        out
    }

    pub fn into_store_error(self, status: u16) -> StoreError {
        StoreError::rejected(status, self.describe())
    }
}
