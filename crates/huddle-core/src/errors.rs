//! Relay error taxonomy.
//!
//! None of these are fatal to the process. Each is recovered where it is
//! raised: invariant violations are logged, bad input is dropped, and
//! delivery or transport failures turn into a disconnect.

use crate::ids::SessionId;

/// Errors raised by the relay core.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// A session with this ID is already registered. Indicates a defect in
    /// the connection handler, never a user error.
    #[error("session {id} is already registered")]
    DuplicateSession {
        /// Offending session ID.
        id: SessionId,
    },

    /// Empty, whitespace-only, or oversized input.
    #[error("invalid {field}: {reason}")]
    InvalidInput {
        /// Which input was rejected (`"displayName"`, `"message"`).
        field: &'static str,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// The recipient's outbound channel is closed or full.
    #[error("recipient {id} unreachable: {reason}")]
    RecipientUnreachable {
        /// Recipient session ID.
        id: SessionId,
        /// `"closed"` or `"full"`.
        reason: &'static str,
    },

    /// The transport went away.
    #[error("connection lost: {reason}")]
    ConnectionLost {
        /// Transport-level description.
        reason: String,
    },

    /// A frame could not be decoded or encoded.
    #[error("protocol error: {reason}")]
    Protocol {
        /// Decoder message.
        reason: String,
    },
}

impl RelayError {
    /// Short stable label for metrics and client-facing error codes.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicateSession { .. } => "DUPLICATE_SESSION",
            Self::InvalidInput {
                field: "displayName",
                ..
            } => "INVALID_DISPLAY_NAME",
            Self::InvalidInput { .. } => "INVALID_INPUT",
            Self::RecipientUnreachable { .. } => "RECIPIENT_UNREACHABLE",
            Self::ConnectionLost { .. } => "CONNECTION_LOST",
            Self::Protocol { .. } => "PROTOCOL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let e = RelayError::DuplicateSession {
            id: SessionId::from("s1"),
        };
        assert_eq!(e.to_string(), "session s1 is already registered");

        let e = RelayError::RecipientUnreachable {
            id: SessionId::from("s2"),
            reason: "full",
        };
        assert!(e.to_string().contains("s2"));
        assert!(e.to_string().contains("full"));
    }

    #[test]
    fn codes_distinguish_display_name_from_other_input() {
        let name = RelayError::InvalidInput {
            field: "displayName",
            reason: "empty",
        };
        let text = RelayError::InvalidInput {
            field: "message",
            reason: "empty",
        };
        assert_eq!(name.code(), "INVALID_DISPLAY_NAME");
        assert_eq!(text.code(), "INVALID_INPUT");
    }

    #[test]
    fn codes_are_screaming_snake_case() {
        let errors = [
            RelayError::DuplicateSession {
                id: SessionId::from("x"),
            },
            RelayError::ConnectionLost {
                reason: "reset".into(),
            },
            RelayError::Protocol {
                reason: "eof".into(),
            },
        ];
        for e in errors {
            assert!(
                e.code().chars().all(|c| c.is_ascii_uppercase() || c == '_'),
                "code '{}' must be SCREAMING_SNAKE_CASE",
                e.code()
            );
        }
    }
}
