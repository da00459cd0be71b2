//! Classified failures.
//!
//! Engine functions return `anyhow::Result`; when a failure belongs to one of
//! the categories below it is raised as a [`BoardError`] so callers at the
//! edge (HTTP status mapping, MCP error text) can recover it with
//! `err.downcast_ref::<BoardError>()`.
//!
//! Partial-fetch failures have no variant here: they are logged and
//! absorbed, never surfaced.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BoardError {
    /// A request is malformed; raised before any network call.
    #[error("invalid request: {0}")]
    Validation(String),

    /// A named board, item, frame, or parent does not resolve.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A coordinate lies outside its frame's valid range.
    #[error("position out of bounds: {0}")]
    OutOfBounds(String),

    /// The remote store answered with a non-success status.
    #[error("upstream request failed (HTTP {status}): {message}")]
    Upstream { status: u16, message: String },
}

impl BoardError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        BoardError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Find a classified error anywhere in an `anyhow` chain.
    pub fn classify(err: &anyhow::Error) -> Option<&BoardError> {
        err.chain().find_map(|cause| cause.downcast_ref::<BoardError>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_classify_through_context() {
        let err: anyhow::Result<()> = Err(BoardError::not_found("item", "42").into());
        let err = err.context("loading hierarchy root").unwrap_err();
        match BoardError::classify(&err) {
            Some(BoardError::NotFound { kind, id }) => {
                assert_eq!(*kind, "item");
                assert_eq!(id, "42");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_messages_name_the_subject() {
        assert_eq!(
            BoardError::not_found("frame", "f-1").to_string(),
            "frame not found: f-1"
        );
    }
}
