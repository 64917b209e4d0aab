//! Event publishing with a single session-renewal retry.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::PublisherError;
use crate::event::{validate_events, Event, EventBundle};
use crate::fault::RemoteFault;
use crate::retry::{retry_async, RetryPolicy};
use crate::session::SessionConnector;

/// Publishes events through a shared connector.
///
/// When the receiver answers a publish with session expiry, the session is
/// invalidated, a new one is authenticated, the bundle is rebuilt with the
/// new session id, and the publish is repeated once. Delivery is at most
/// once: success means the remote call returned without a fault.
#[derive(Clone, Debug)]
pub struct EventPublisher {
    connector: Arc<SessionConnector>,
    retry_policy: RetryPolicy,
}

enum AttemptError {
    Local(PublisherError),
    Expired,
    Fault(RemoteFault),
}

impl EventPublisher {
    pub fn new(connector: Arc<SessionConnector>) -> Self {
        Self {
            connector,
            retry_policy: RetryPolicy::session_renewal(),
        }
    }

    pub async fn publish(&self, event: &Event) -> Result<(), PublisherError> {
        self.publish_batch(std::slice::from_ref(event)).await
    }

    /// Publishes `events` as one bundle.
    pub async fn publish_batch(&self, events: &[Event]) -> Result<(), PublisherError> {
        validate_events(events)?;

        let outcome = retry_async(
            &self.retry_policy,
            |attempt| self.publish_attempt(events, attempt),
            |error: &AttemptError| matches!(error, AttemptError::Expired),
        )
        .await;

        outcome.map_err(|error| match error {
            AttemptError::Local(error) => error,
            AttemptError::Expired => PublisherError::publish(
                "session expired again after renewal",
                Some(RemoteFault::SessionExpired),
            ),
            AttemptError::Fault(fault) => {
                PublisherError::publish("receiver rejected the event bundle", Some(fault))
            }
        })
    }

    async fn publish_attempt(&self, events: &[Event], attempt: usize) -> Result<(), AttemptError> {
        let session = self
            .connector
            .session()
            .await
            .map_err(AttemptError::Local)?;
        let bundle = EventBundle::from_events(session.session_id().clone(), events)
            .map_err(AttemptError::Local)?;

        match self
            .connector
            .bounded(session.client().publish(&bundle))
            .await
        {
            Ok(()) => {
                debug!(
                    event = "bundle_published",
                    events = bundle.event_count(),
                    attempt,
                    generation = session.generation()
                );
                Ok(())
            }
            Err(RemoteFault::SessionExpired) => {
                warn!(
                    event = "publish_session_expired",
                    attempt,
                    generation = session.generation()
                );
                self.connector.invalidate_session(&session).await;
                Err(AttemptError::Expired)
            }
            Err(fault) => {
                warn!(event = "publish_failed", attempt, error = %fault);
                Err(AttemptError::Fault(fault))
            }
        }
    }
}
