//! Publisher façade tying endpoint resolution, the session connector, and
//! the stream services together.

use std::sync::Arc;

use secrecy::SecretString;
use tracing::info;

use crate::config::PublisherConfig;
use crate::definition::{StreamDefinition, StreamDefinitionService};
use crate::endpoint::resolve;
use crate::error::PublisherError;
use crate::event::Event;
use crate::publish::EventPublisher;
use crate::session::SessionConnector;
use crate::transport::{StreamId, Transport};

/// Client for one event receiver, sharing a single session across calls.
///
/// Cheap to clone; clones share the connector and therefore the session.
#[derive(Clone, Debug)]
pub struct Publisher {
    connector: Arc<SessionConnector>,
    definitions: StreamDefinitionService,
    events: EventPublisher,
}

impl Publisher {
    /// Builds a publisher from `config`.
    ///
    /// Endpoints are resolved immediately; authentication happens on first
    /// use. Fails with [`PublisherError::Configuration`] for unusable URLs.
    pub fn new(
        config: PublisherConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, PublisherError> {
        let endpoints = resolve(
            Some(config.receiver_url.as_str()),
            config.authentication_url.as_deref(),
        )?;
        info!(
            event = "publisher_configured",
            receiver = %endpoints.receiver,
            authentication = %endpoints.authentication
        );

        let connector = Arc::new(
            SessionConnector::new(endpoints, config.credentials(), transport)
                .with_call_timeout(config.call_timeout()),
        );
        Ok(Self::from_connector(connector))
    }

    /// Builds a publisher from loose arguments.
    pub fn connect(
        receiver_url: &str,
        username: &str,
        password: SecretString,
        authentication_url: Option<&str>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, PublisherError> {
        let config = PublisherConfig::new(receiver_url, username, password);
        let config = match authentication_url {
            Some(url) => config.with_authentication_url(url),
            None => config,
        };
        Self::new(config, transport)
    }

    /// Wraps an existing connector.
    pub fn from_connector(connector: Arc<SessionConnector>) -> Self {
        Self {
            definitions: StreamDefinitionService::new(Arc::clone(&connector)),
            events: EventPublisher::new(Arc::clone(&connector)),
            connector,
        }
    }

    pub fn connector(&self) -> &Arc<SessionConnector> {
        &self.connector
    }

    pub async fn find_stream(&self, name: &str, version: &str) -> Result<StreamId, PublisherError> {
        self.definitions.find_stream(name, version).await
    }

    pub async fn add_stream_definition(
        &self,
        definition: impl Into<StreamDefinition>,
    ) -> Result<StreamId, PublisherError> {
        self.definitions
            .add_stream_definition(&definition.into())
            .await
    }

    pub async fn publish(&self, event: &Event) -> Result<(), PublisherError> {
        self.events.publish(event).await
    }

    pub async fn publish_batch(&self, events: &[Event]) -> Result<(), PublisherError> {
        self.events.publish_batch(events).await
    }
}
