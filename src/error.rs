//! Local error taxonomy shared by every publisher component.

use std::fmt;

use thiserror::Error;

use crate::fault::RemoteFault;

/// Reason a stream definition call was refused.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum StreamDefinitionErrorKind {
    /// No definition exists under the requested name and version.
    NotFound,
    /// A different definition is already registered under the same key.
    AlreadyDefined,
    /// The receiver could not parse or validate the schema.
    Malformed,
    /// Any other definition-level rejection reported by the receiver.
    Rejected,
}

impl StreamDefinitionErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::AlreadyDefined => "already_defined",
            Self::Malformed => "malformed",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for StreamDefinitionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by the publisher, its connector, and the stream services.
#[derive(Debug, Error)]
pub enum PublisherError {
    /// Endpoint or credential input could not be used. Raised at construction.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The authentication endpoint rejected the credentials or could not be
    /// reached.
    #[error("authentication against {endpoint} failed: {source}")]
    Authentication {
        endpoint: String,
        #[source]
        source: RemoteFault,
    },

    /// Stream definition lookup or registration was refused.
    #[error("stream definition error ({kind}): {message}")]
    StreamDefinition {
        kind: StreamDefinitionErrorKind,
        message: String,
    },

    /// The session backing the call expired. The session has already been
    /// invalidated, so repeating the call authenticates a fresh one.
    #[error("session expired; repeat the call to renew the session")]
    SessionExpired,

    /// Publishing failed after the bounded session-renewal retry.
    #[error("publish failed: {reason}")]
    Publish {
        reason: String,
        #[source]
        source: Option<RemoteFault>,
    },

    /// A remote fault with no local mapping.
    #[error("protocol error: {0}")]
    Protocol(#[from] RemoteFault),
}

impl PublisherError {
    pub(crate) fn stream_definition(
        kind: StreamDefinitionErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self::StreamDefinition {
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn publish(reason: impl Into<String>, source: Option<RemoteFault>) -> Self {
        Self::Publish {
            reason: reason.into(),
            source,
        }
    }

    /// Returns the stream definition cause, if this is a definition error.
    pub fn stream_definition_kind(&self) -> Option<StreamDefinitionErrorKind> {
        match self {
            Self::StreamDefinition { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Whether repeating the same call may succeed without caller changes.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::SessionExpired => true,
            Self::Protocol(fault) => fault.is_transport_failure(),
            Self::Authentication { source, .. } => source.is_transport_failure(),
            Self::Configuration(_) | Self::StreamDefinition { .. } | Self::Publish { .. } => false,
        }
    }
}
