//! Error types for the carelink realtime layer.

use alloc::string::String;

/// Result type alias for carelink operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Error types surfaced by loaders, mutations and subscriptions.
///
/// A single-row fetch that finds nothing is not an error; loaders return
/// `Ok(None)` for it.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A snapshot query failed. The local collection is left unchanged.
    #[error("failed to load {table}: {message}")]
    Fetch { table: String, message: String },
    /// A write-path call (insert, update, upsert, soft delete) failed.
    #[error("failed to write {table}: {message}")]
    Mutation { table: String, message: String },
    /// A change channel failed to open or dropped.
    #[error("channel {channel} failed: {message}")]
    Subscription { channel: String, message: String },
    /// A row or change payload could not be decoded into its entity type.
    #[error("malformed {table} row: {message}")]
    Decode { table: String, message: String },
    /// A record violates a domain invariant.
    #[error("invalid record: {message}")]
    InvalidRecord { message: String },
}

impl Error {
    /// Creates a fetch error.
    pub fn fetch(table: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Fetch {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Creates a mutation error.
    pub fn mutation(table: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Mutation {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Creates a subscription error.
    pub fn subscription(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Subscription {
            channel: channel.into(),
            message: message.into(),
        }
    }

    /// Creates a decode error.
    pub fn decode(table: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Decode {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid record error.
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Error::InvalidRecord {
            message: message.into(),
        }
    }

    /// Returns true if repeating the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Fetch { .. } | Error::Mutation { .. } | Error::Subscription { .. }
        )
    }

    /// Returns a short message suitable for showing to a caregiver or patient.
    pub fn user_message(&self) -> &'static str {
        match self {
            Error::Fetch { .. } | Error::Decode { .. } => {
                "We couldn't refresh this list just now. Please try again in a moment."
            }
            Error::Mutation { .. } | Error::InvalidRecord { .. } => {
                "That change didn't save. Please try again."
            }
            Error::Subscription { .. } => {
                "Live updates are paused. Pull to refresh to catch up."
            }
        }
    }
}
