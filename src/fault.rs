//! Remote protocol faults and their mapping onto [`PublisherError`].
//!
//! Transports report failures as [`RemoteFault`]. [`classify`] is the single
//! place that decides which of them become stream definition errors, which
//! one means the session has to be renewed, and which pass through untouched.

use std::time::Duration;

use thiserror::Error;

use crate::error::{PublisherError, StreamDefinitionErrorKind};

/// Typed fault raised by a transport or by the remote receiver.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RemoteFault {
    #[error("no stream definition exists: {0}")]
    NoSuchStream(String),

    #[error("session expired")]
    SessionExpired,

    #[error("a different stream definition is already defined: {0}")]
    DuplicateDefinition(String),

    #[error("malformed stream definition: {0}")]
    MalformedDefinition(String),

    #[error("stream definition fault: {0}")]
    DefinitionFault(String),

    #[error("credentials rejected: {0}")]
    AuthenticationFailed(String),

    #[error("endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("remote call timed out after {0:?}")]
    TimedOut(Duration),

    #[error("remote fault {code}: {message}")]
    Other { code: String, message: String },
}

impl RemoteFault {
    /// Connection-level failure, as opposed to a fault the receiver answered
    /// with.
    pub fn is_transport_failure(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::TimedOut(_))
    }
}

/// Result of classifying a [`RemoteFault`].
#[derive(Debug)]
pub enum FaultClass {
    /// The session used for the call is no longer valid and must be
    /// invalidated before the next attempt.
    SessionExpired,
    /// The fault maps onto a caller-facing error.
    Error(PublisherError),
}

/// Maps a remote fault onto the local error taxonomy.
pub fn classify(fault: RemoteFault) -> FaultClass {
    let definition_error = |kind: StreamDefinitionErrorKind, message: String| {
        FaultClass::Error(PublisherError::stream_definition(kind, message))
    };

    match fault {
        RemoteFault::SessionExpired => FaultClass::SessionExpired,
        RemoteFault::NoSuchStream(message) => {
            definition_error(StreamDefinitionErrorKind::NotFound, message)
        }
        RemoteFault::DuplicateDefinition(message) => {
            definition_error(StreamDefinitionErrorKind::AlreadyDefined, message)
        }
        RemoteFault::MalformedDefinition(message) => {
            definition_error(StreamDefinitionErrorKind::Malformed, message)
        }
        RemoteFault::DefinitionFault(message) => {
            definition_error(StreamDefinitionErrorKind::Rejected, message)
        }
        other => FaultClass::Error(PublisherError::Protocol(other)),
    }
}
