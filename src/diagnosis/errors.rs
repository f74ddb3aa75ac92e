//! Maps raw service error messages onto a fixed set of user-facing categories.

use std::fmt;

use thiserror::Error;

/// Category of a failed diagnosis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCategory {
    MissingDescription,
    AudioUploadFailed,
    NetworkError,
    QuotaExceeded,
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCategory::MissingDescription => "missing_description",
            ErrorCategory::AudioUploadFailed => "audio_upload_failed",
            ErrorCategory::NetworkError => "network_error",
            ErrorCategory::QuotaExceeded => "quota_exceeded",
            ErrorCategory::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// A raw message plus the category derived from it.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{category}: {raw_message}")]
pub struct ClassifiedError {
    pub category: ErrorCategory,
    pub raw_message: String,
}

/// Rules are checked top to bottom; the first matching needle wins.
/// Needles are lowercase and matched against the lowercased message.
const RULES: &[(ErrorCategory, &[&str])] = &[
    (ErrorCategory::MissingDescription, &["description"]),
    (ErrorCategory::AudioUploadFailed, &["audio", "voice"]),
    (
        ErrorCategory::NetworkError,
        &["network", "connection", "offline", "timed out"],
    ),
    (
        ErrorCategory::QuotaExceeded,
        &["quota", "remaining", "free diagnos"],
    ),
];

impl ClassifiedError {
    /// Classify a raw message from the service or transport.
    pub fn classify(raw: impl Into<String>) -> Self {
        let raw_message = raw.into();
        let haystack = raw_message.to_lowercase();
        let category = RULES
            .iter()
            .find(|(_, needles)| needles.iter().any(|n| haystack.contains(n)))
            .map(|(category, _)| *category)
            .unwrap_or(ErrorCategory::Unknown);
        Self {
            category,
            raw_message,
        }
    }

    /// Build an error whose category is already known locally.
    pub fn with_category(category: ErrorCategory, raw: impl Into<String>) -> Self {
        Self {
            category,
            raw_message: raw.into(),
        }
    }

    /// Text shown in the alert; unknown errors surface the raw message.
    pub fn user_message(&self) -> String {
        match self.category {
            ErrorCategory::MissingDescription => {
                "Please provide a text description or voice recording.".into()
            }
            ErrorCategory::AudioUploadFailed => {
                "There was a problem uploading your voice recording. Try describing the problem in text instead.".into()
            }
            ErrorCategory::NetworkError => {
                "Please check your internet connection and try again.".into()
            }
            ErrorCategory::QuotaExceeded => {
                "You've used all your free diagnoses. Sign up to continue.".into()
            }
            ErrorCategory::Unknown => self.raw_message.clone(),
        }
    }
}
