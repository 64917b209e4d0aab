//! Client-side publisher for data bridge event receivers.
//!
//! The crate is organized around one session-backed connector:
//! - `endpoint`: receiver and authentication URL normalization.
//! - `session`: authenticated session lifecycle and renewal.
//! - `definition`: stream definition registration and lookup.
//! - `publish`: event publishing with a bounded expiry retry.
//! - `publisher`: façade combining the above.
//! - `transport`: the RPC collaborator interface implemented by callers.

/// Publisher configuration and credentials.
pub mod config;
/// Stream definition service.
pub mod definition;
/// Endpoint resolution.
pub mod endpoint;
/// Local error taxonomy.
pub mod error;
/// Events and bundles.
pub mod event;
/// Remote fault classification.
pub mod fault;
/// Event publishing.
pub mod publish;
/// Publisher façade.
pub mod publisher;
/// Retry and timeout helpers.
pub mod retry;
/// Session connector.
pub mod session;
/// Transport collaborator traits and identifiers.
pub mod transport;

pub use config::{Credentials, PublisherConfig, PublisherDefaults};
pub use definition::{StreamDefinition, StreamDefinitionService, StreamKey};
pub use endpoint::{EndpointDescriptor, ResolvedEndpoints, Scheme};
pub use error::{PublisherError, StreamDefinitionErrorKind};
pub use event::{AttributeValue, Event, EventBundle};
pub use fault::RemoteFault;
pub use publish::EventPublisher;
pub use publisher::Publisher;
pub use session::{SessionConnector, SessionHandle, SessionState};
pub use transport::{ReceiverClient, SessionToken, StreamId, Transport};
