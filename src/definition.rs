//! Stream definition registration and lookup.
//!
//! Nothing is cached locally; every call is a round trip to the receiver,
//! which is also the only place definitions are validated.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{PublisherError, StreamDefinitionErrorKind};
use crate::fault::{classify, FaultClass, RemoteFault};
use crate::session::{SessionConnector, SessionHandle};
use crate::transport::StreamId;

/// `{name, version}` key of a stream definition.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct StreamKey {
    pub name: String,
    pub version: String,
}

impl StreamKey {
    pub fn stream_id(&self) -> StreamId {
        StreamId::from_key(&self.name, &self.version)
    }
}

/// Caller-supplied stream definition document.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StreamDefinition {
    schema: String,
}

impl StreamDefinition {
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
        }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Derives the key from top-level `name` and `version` fields of a JSON
    /// document. Returns `None` for anything else.
    pub fn key(&self) -> Option<StreamKey> {
        #[derive(Deserialize)]
        struct KeyFields {
            name: String,
            version: String,
        }

        serde_json::from_str::<KeyFields>(&self.schema)
            .ok()
            .map(|fields| StreamKey {
                name: fields.name,
                version: fields.version,
            })
    }
}

impl From<&str> for StreamDefinition {
    fn from(schema: &str) -> Self {
        Self::new(schema)
    }
}

impl From<String> for StreamDefinition {
    fn from(schema: String) -> Self {
        Self::new(schema)
    }
}

/// Registers and looks up stream definitions through a shared connector.
#[derive(Clone, Debug)]
pub struct StreamDefinitionService {
    connector: Arc<SessionConnector>,
}

impl StreamDefinitionService {
    pub fn new(connector: Arc<SessionConnector>) -> Self {
        Self { connector }
    }

    /// Looks up the id of an existing definition.
    ///
    /// Session expiry is reported as [`PublisherError::SessionExpired`] after
    /// the session has been invalidated; it is not retried here.
    pub async fn find_stream(&self, name: &str, version: &str) -> Result<StreamId, PublisherError> {
        let session = self.connector.session().await?;
        let outcome = self
            .connector
            .bounded(
                session
                    .client()
                    .find_stream_id(session.session_id(), name, version),
            )
            .await;

        match outcome {
            Ok(stream_id) => {
                debug!(
                    event = "stream_found",
                    stream_name = name,
                    stream_version = version,
                    stream_id = %stream_id
                );
                Ok(stream_id)
            }
            Err(fault) => match self.surface(&session, "find_stream", fault).await {
                PublisherError::StreamDefinition {
                    kind: StreamDefinitionErrorKind::NotFound,
                    ..
                } => Err(PublisherError::stream_definition(
                    StreamDefinitionErrorKind::NotFound,
                    format!("stream definition {name}:{version} not found"),
                )),
                other => Err(other),
            },
        }
    }

    /// Registers `definition` and returns the id the receiver assigned.
    pub async fn add_stream_definition(
        &self,
        definition: &StreamDefinition,
    ) -> Result<StreamId, PublisherError> {
        let session = self.connector.session().await?;
        let outcome = self
            .connector
            .bounded(
                session
                    .client()
                    .define_stream(session.session_id(), definition.schema()),
            )
            .await;

        match outcome {
            Ok(stream_id) => {
                debug!(event = "stream_defined", stream_id = %stream_id);
                Ok(stream_id)
            }
            Err(fault) => Err(self.surface(&session, "add_stream_definition", fault).await),
        }
    }

    async fn surface(
        &self,
        session: &SessionHandle,
        operation: &'static str,
        fault: RemoteFault,
    ) -> PublisherError {
        match classify(fault) {
            FaultClass::SessionExpired => {
                warn!(
                    event = "session_expired",
                    operation,
                    generation = session.generation()
                );
                self.connector.invalidate_session(session).await;
                PublisherError::SessionExpired
            }
            FaultClass::Error(error) => error,
        }
    }
}
