// Error taxonomy for user-facing operations.
//
// Store and identity adapters speak anyhow::Result. The engagement, feed
// and identity-context operations translate failures into EngagementError
// so callers can decide between an inline message, a silent rollback, or a
// degraded guest/empty state.

use thiserror::Error;

/// Which write of the three-step tip sequence failed after the
/// transaction record was stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TipStage {
    /// Debiting the sender. The record exists but the balance is unchanged.
    Debit,
    /// Crediting the recipient. The sender is debited but not the recipient.
    Credit,
}

impl TipStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            TipStage::Debit => "debit sender",
            TipStage::Credit => "credit recipient",
        }
    }
}

#[derive(Error, Debug)]
pub enum EngagementError {
    #[error("Please sign in first")]
    NotAuthenticated,

    #[error("Not enough YallPoints: balance {balance}, tip {amount}")]
    InsufficientFunds { balance: u32, amount: u32 },

    #[error("Tip amount must be at least 1")]
    InvalidAmount,

    #[error("Unknown tip recipient {0}")]
    UnknownRecipient(String),

    #[error("Message is empty")]
    EmptyBody,

    #[error("Message is {len} characters, the limit is {max}")]
    BodyTooLong { len: usize, max: usize },

    #[error("Only the author can delete this")]
    NotAuthor,

    #[error("Reply {0} is not in this thread")]
    ReplyNotFound(String),

    #[error("{operation} timed out after {attempts} attempts")]
    RemoteTimeout {
        operation: &'static str,
        attempts: u32,
    },

    #[error("{operation} failed: {message}")]
    RemoteReadFailure {
        operation: &'static str,
        message: String,
    },

    #[error("{operation} failed: {message}")]
    RemoteWriteFailure {
        operation: &'static str,
        message: String,
    },

    #[error("Tip partially applied, failed to {}: {message}", .stage.as_str())]
    TipFailed { stage: TipStage, message: String },
}

impl EngagementError {
    pub fn read(operation: &'static str, err: anyhow::Error) -> Self {
        EngagementError::RemoteReadFailure {
            operation,
            message: format!("{err:#}"),
        }
    }

    pub fn write(operation: &'static str, err: anyhow::Error) -> Self {
        EngagementError::RemoteWriteFailure {
            operation,
            message: format!("{err:#}"),
        }
    }

    /// True for errors raised before any remote call was made.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            EngagementError::NotAuthenticated
                | EngagementError::InsufficientFunds { .. }
                | EngagementError::InvalidAmount
                | EngagementError::EmptyBody
                | EngagementError::BodyTooLong { .. }
                | EngagementError::NotAuthor
                | EngagementError::ReplyNotFound(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_funds_message() {
        let err = EngagementError::InsufficientFunds {
            balance: 10,
            amount: 15,
        };
        assert_eq!(err.to_string(), "Not enough YallPoints: balance 10, tip 15");
        assert!(err.is_local());
    }

    #[test]
    fn test_missing_reply_is_local() {
        let err = EngagementError::ReplyNotFound("r1".to_string());
        assert_eq!(err.to_string(), "Reply r1 is not in this thread");
        assert!(err.is_local());
    }

    #[test]
    fn test_tip_failed_names_stage() {
        let err = EngagementError::TipFailed {
            stage: TipStage::Credit,
            message: "boom".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Tip partially applied, failed to credit recipient: boom"
        );
        assert!(!err.is_local());
    }

    #[test]
    fn test_write_keeps_context_chain() {
        let inner = anyhow::anyhow!("disk full").context("insert like");
        let err = EngagementError::write("toggle like", inner);
        assert_eq!(err.to_string(), "toggle like failed: insert like: disk full");
    }
}
