//! Error types for the AMI client

use crate::connection::DisconnectReason;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type AmiResult<T> = Result<T, AmiError>;

/// Errors surfaced by the AMI client.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AmiError {
    /// Underlying transport I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection ended; every pending action fails with this.
    #[error("disconnected: {reason}")]
    Disconnected {
        /// Why the connection ended.
        reason: DisconnectReason,
    },

    /// The client is already closed; no wire interaction was attempted.
    #[error("not connected")]
    NotConnected,

    /// A connect or response wait elapsed without completing.
    #[error("timed out after {timeout_ms}ms")]
    Timeout {
        /// The elapsed wait in milliseconds.
        timeout_ms: u64,
    },

    /// Wire-level protocol violation. Fatal to the connection.
    #[error("protocol error: {message}")]
    Protocol {
        /// Description of the violation.
        message: String,
    },

    /// A block contained a non-blank line without a colon.
    #[error("malformed line in block: {line:?}")]
    MalformedLine {
        /// The offending line.
        line: String,
    },

    /// The caller handed `publish` an unusable action message.
    /// Rejected synchronously, before any wire interaction.
    #[error("invalid action: {message}")]
    InvalidAction {
        /// What was wrong with it.
        message: String,
    },

    /// An identifier was registered twice. Identifier generation guarantees
    /// uniqueness, so this indicates a bug rather than a runtime condition.
    #[error("duplicate action id: {id}")]
    DuplicateActionId {
        /// The colliding identifier.
        id: String,
    },

    /// Login was rejected by the peer.
    #[error("authentication failed: {message}")]
    AuthenticationFailed {
        /// The peer's `Message` text, when present.
        message: String,
    },

    /// The peer answered `Response: Error`.
    #[error("action failed: {message}")]
    ActionFailed {
        /// The peer's `Message` text, when present.
        message: String,
    },

    /// The peer answered with a `Response` value the caller did not expect.
    #[error("unexpected response status: {status}")]
    UnexpectedResponse {
        /// The raw `Response` value.
        status: String,
    },

    /// One or more events were dropped because a subscriber fell behind.
    /// Delivered once per overflow episode through the event stream.
    #[error("event queue full, one or more events were dropped")]
    EventQueueFull,

    /// The inbound buffer grew past its limit without a block terminator.
    #[error("inbound buffer overflow: {size} bytes exceeds limit {limit}")]
    BufferOverflow {
        /// Buffered byte count.
        size: usize,
        /// The configured ceiling.
        limit: usize,
    },
}

impl AmiError {
    /// Shorthand for a [`AmiError::Protocol`] with an owned message.
    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        AmiError::Protocol {
            message: message.into(),
        }
    }
}
