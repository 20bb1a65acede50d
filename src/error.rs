//! Error types for the transaction orchestrator

use thiserror::Error;

/// Main error type for orchestration operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Connection error: {message}")]
    Connection { message: String },

    #[error("Failed to fetch account nonce: {0}")]
    NonceFetch(String),

    #[error("Pre-condition check failed")]
    PreConditionFailed,

    #[error("Post-condition check failed")]
    PostConditionFailed,

    #[error("Transaction rejected: {0}")]
    Submission(String),

    #[error("Client error: {0}")]
    Client(String),

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Timeout waiting for {operation}")]
    Timeout { operation: String },
}

impl Error {
    /// Check if this error is a nonce conflict the retry engine can absorb
    pub fn is_nonce_related(&self) -> bool {
        NonceIssue::classify(self).is_some()
    }
}

/// Result type for orchestration operations
pub type Result<T> = std::result::Result<T, Error>;

/// Classification of nonce-conflict errors reported by the network.
///
/// Nodes surface nonce problems as message text rather than structured codes,
/// so the classifier matches the phrasings geth and its derivatives emit. A
/// client implementation that does expose structured codes can map them into
/// these messages and get the same recovery behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceIssue {
    /// The held nonce was already consumed; skip forward by one.
    TooLow,
    /// The held nonce over-advanced past the chain's view; step back by one.
    TooHigh,
    /// Some other nonce complaint; resolve by re-fetching the pending nonce.
    Unclassified,
}

impl NonceIssue {
    /// Classify an error as a nonce conflict, if it is one.
    pub fn classify(err: &Error) -> Option<NonceIssue> {
        let message = match err {
            Error::Submission(m) | Error::Client(m) => m.as_str(),
            _ => return None,
        };
        let message = message.to_ascii_lowercase();

        if message.contains("nonce too low")
            || message.contains("nonce is too low")
            || message.contains("replacement transaction underpriced")
        {
            Some(NonceIssue::TooLow)
        } else if message.contains("nonce too high") || message.contains("nonce is too high") {
            Some(NonceIssue::TooHigh)
        } else if message.contains("nonce") {
            Some(NonceIssue::Unclassified)
        } else {
            None
        }
    }
}
