//! Error types for the reactor core.
//!
//! Everything a client can cause is recoverable: the session reports it as an
//! `error` message and keeps going. Only transport failures end a session.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::component::HandlerError;
use crate::render::MarkupError;
use crate::store::StoreError;

/// Error category reported to clients on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    UnknownComponent,
    UnknownEvent,
    DuplicateId,
    HandlerError,
    Protocol,
}

/// Main error type for reactor operations.
#[derive(Error, Debug)]
pub enum ReactorError {
    #[error("unknown component: {id}")]
    UnknownComponent { id: String },

    #[error("unknown component type: {type_name}")]
    UnknownType { type_name: String },

    #[error("component type {type_name} has no handler for event {event}")]
    UnknownEvent { type_name: String, event: String },

    #[error("component id already in use: {id}")]
    DuplicateId { id: String },

    #[error(transparent)]
    Handler(#[from] HandlerError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("render produced malformed markup: {0}")]
    Markup(#[from] MarkupError),

    #[error("encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("session is closed")]
    Closed,

    #[error("transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReactorError {
    /// Map the error to the category a client sees.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownComponent { .. } | Self::UnknownType { .. } => ErrorKind::UnknownComponent,
            Self::UnknownEvent { .. } => ErrorKind::UnknownEvent,
            Self::DuplicateId { .. } => ErrorKind::DuplicateId,
            Self::Handler(_) | Self::Store(_) | Self::Markup(_) => ErrorKind::HandlerError,
            Self::Encode(_)
            | Self::Decode(_)
            | Self::Json(_)
            | Self::Protocol(_)
            | Self::InvalidConfig(_)
            | Self::Closed
            | Self::Transport(_)
            | Self::Io(_) => ErrorKind::Protocol,
        }
    }

    pub(crate) fn unknown_component(id: impl Into<String>) -> Self {
        Self::UnknownComponent { id: id.into() }
    }
}

/// Result type alias for reactor operations.
pub type Result<T> = std::result::Result<T, ReactorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_and_markup_failures_are_handler_errors() {
        let err = ReactorError::from(StoreError::Backend("disk full".into()));
        assert_eq!(err.kind(), ErrorKind::HandlerError);

        let err = ReactorError::from(HandlerError::new("boom"));
        assert_eq!(err.kind(), ErrorKind::HandlerError);
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn unknown_type_reports_as_unknown_component() {
        let err = ReactorError::UnknownType { type_name: "x-nope".into() };
        assert_eq!(err.kind(), ErrorKind::UnknownComponent);
    }

    #[test]
    fn error_kind_serializes_by_name() {
        let json = serde_json::to_string(&ErrorKind::UnknownEvent).unwrap();
        assert_eq!(json, "\"UnknownEvent\"");
    }
}
