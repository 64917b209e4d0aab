//! Collaborator interface for the wire-level RPC transport.
//!
//! The crate does not speak the receiver's wire protocol itself. A
//! [`Transport`] authenticates against the authentication endpoint and binds
//! [`ReceiverClient`]s to the receiver endpoint; every failure is reported as
//! a typed [`RemoteFault`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Credentials;
use crate::endpoint::EndpointDescriptor;
use crate::event::EventBundle;
use crate::fault::RemoteFault;

/// Opaque session token issued by the authentication endpoint.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier the receiver assigns to a registered stream definition.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(String);

impl StreamId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Conventional `name:version` identifier.
    pub fn from_key(name: &str, version: &str) -> Self {
        Self(format!("{name}:{version}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StreamId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for StreamId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Client bound to the receiver endpoint for one session.
#[async_trait]
pub trait ReceiverClient: Send + Sync {
    async fn find_stream_id(
        &self,
        session: &SessionToken,
        name: &str,
        version: &str,
    ) -> Result<StreamId, RemoteFault>;

    async fn define_stream(
        &self,
        session: &SessionToken,
        schema: &str,
    ) -> Result<StreamId, RemoteFault>;

    async fn publish(&self, bundle: &EventBundle) -> Result<(), RemoteFault>;
}

/// Factory for sessions and session-bound receiver clients.
///
/// Implementations choose plain or TLS connections from
/// [`EndpointDescriptor::is_secure`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Authenticates `credentials` against the authentication endpoint.
    async fn authenticate(
        &self,
        endpoint: &EndpointDescriptor,
        credentials: &Credentials,
    ) -> Result<SessionToken, RemoteFault>;

    /// Opens a receiver client that issues calls under `session`.
    async fn bind(
        &self,
        endpoint: &EndpointDescriptor,
        session: &SessionToken,
    ) -> Result<Arc<dyn ReceiverClient>, RemoteFault>;
}
