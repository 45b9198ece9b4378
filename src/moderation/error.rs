//! Error types for the moderation engine
//!
//! Every failure that crosses the coordinator boundary is one of these
//! kinds; raw platform errors never leak to the presentation layer.

use thiserror::Error;

/// Errors that can occur during moderation operations
#[derive(Debug, Error)]
pub enum ModerationError {
    /// Bad input shape or range; nothing was changed
    #[error("invalid input: {0}")]
    Validation(String),

    /// The actor is not allowed to do this to that target
    #[error("not allowed: {0}")]
    AuthorizationDenied(String),

    /// Referenced warning or member does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// The platform rejected the action for lack of permission; not retried
    #[error("platform refused to {action}: missing permission")]
    Forbidden { action: String },

    /// Network or platform failure; surfaced once, caller may retry
    #[error("platform failure while trying to {action}: {detail}")]
    Transient { action: String, detail: String },

    /// The ledger journal could not be written
    #[error("ledger write failed: {0}")]
    Persistence(String),
}

impl ModerationError {
    pub fn forbidden(action: impl Into<String>) -> Self {
        Self::Forbidden {
            action: action.into(),
        }
    }

    pub fn transient(action: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Transient {
            action: action.into(),
            detail: detail.into(),
        }
    }
}

/// Result type for moderation operations
pub type ModerationResult<T> = Result<T, ModerationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = ModerationError::Validation("reason must not be empty".to_string());
        assert_eq!(error.to_string(), "invalid input: reason must not be empty");

        let error = ModerationError::NotFound("warning 42".to_string());
        assert_eq!(error.to_string(), "not found: warning 42");

        let error = ModerationError::forbidden("time out member");
        assert_eq!(
            error.to_string(),
            "platform refused to time out member: missing permission"
        );

        let error = ModerationError::transient("lift timeout", "connection reset");
        assert_eq!(
            error.to_string(),
            "platform failure while trying to lift timeout: connection reset"
        );
    }
}
