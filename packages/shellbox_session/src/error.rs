//! Error types for identity validation and tab policy rejections.
//!
//! Validation messages are fixed strings. The offending input is never
//! carried, so these errors are safe to log or return in an HTTP body.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid session ID format")]
    InvalidSessionId,

    #[error("Invalid terminal ID format")]
    InvalidTerminalId,

    #[error("Invalid bucket name")]
    InvalidBucketName,
}

impl ValidationError {
    pub fn error_code(&self) -> &str {
        match self {
            Self::InvalidSessionId => "invalid_session_id",
            Self::InvalidTerminalId => "invalid_terminal_id",
            Self::InvalidBucketName => "invalid_bucket_name",
        }
    }
}

/// A tab operation that would break a multiplexing invariant.
///
/// Rejections are policy outcomes, not faults: the state machine returns
/// them inside [`crate::MuxOutcome::Rejected`] and leaves its state untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum MuxPolicyRejection {
    #[error("session already has the maximum number of tabs")]
    TabLimitReached,

    #[error("tab 1 cannot be removed or moved")]
    PrimaryTabFixed,

    #[error("proposed order is not a permutation of the open tabs")]
    NotAPermutation,

    #[error("no such tab")]
    UnknownTab,

    #[error("no close confirmation is pending")]
    NothingPending,

    #[error("press was released before the hold threshold")]
    PressTooShort,

    #[error("stored tab entry is keyed under another tab's id")]
    TabKeyMismatch,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_messages_are_fixed() {
        assert_eq!(
            ValidationError::InvalidSessionId.to_string(),
            "Invalid session ID format"
        );
        assert_eq!(
            ValidationError::InvalidSessionId.error_code(),
            "invalid_session_id"
        );
        assert_eq!(
            ValidationError::InvalidTerminalId.error_code(),
            "invalid_terminal_id"
        );
    }

    #[test]
    fn rejection_serde() {
        let json = serde_json::to_string(&MuxPolicyRejection::PrimaryTabFixed).unwrap();
        assert_eq!(json, "\"primary_tab_fixed\"");
        let back: MuxPolicyRejection = serde_json::from_str(&json).unwrap();
        assert_eq!(back, MuxPolicyRejection::PrimaryTabFixed);
    }
}
