//! Session-backed connector to the event receiver.
//!
//! `SessionConnector` owns the only session of a publisher. It authenticates
//! lazily on first use, hands out [`SessionHandle`]s (token plus bound
//! receiver client), and re-authenticates after a handle has been invalidated.
//!
//! All session mutation happens under one async mutex. Concurrent callers
//! that find the session expired queue on that mutex: the first one
//! re-authenticates and the rest pick up the fresh handle. Remote calls made
//! through a handle run outside the lock.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::Credentials;
use crate::endpoint::{EndpointDescriptor, ResolvedEndpoints};
use crate::error::PublisherError;
use crate::fault::RemoteFault;
use crate::retry::with_timeout;
use crate::transport::{ReceiverClient, SessionToken, Transport};

/// Lifecycle state of the connector's session.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SessionState {
    Unauthenticated,
    Active,
    Expired,
}

/// Snapshot of an authenticated session.
///
/// Cheap to clone. A handle stays usable after the connector moves on to a
/// newer session, but calls made with it will be answered with expiry.
#[derive(Clone)]
pub struct SessionHandle {
    session_id: SessionToken,
    client: Arc<dyn ReceiverClient>,
    generation: u64,
}

impl SessionHandle {
    pub fn session_id(&self) -> &SessionToken {
        &self.session_id
    }

    pub fn client(&self) -> &Arc<dyn ReceiverClient> {
        &self.client
    }

    /// Number of successful authentications up to and including this one.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("session_id", &self.session_id)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

struct SessionSlot {
    state: SessionState,
    current: Option<SessionHandle>,
    generation: u64,
}

/// Owner of the publisher's single authenticated session.
pub struct SessionConnector {
    receiver: EndpointDescriptor,
    authentication: EndpointDescriptor,
    credentials: Credentials,
    transport: Arc<dyn Transport>,
    call_timeout: Option<Duration>,
    slot: Mutex<SessionSlot>,
}

impl SessionConnector {
    /// Creates an unauthenticated connector. No network traffic happens until
    /// the first call to [`SessionConnector::session`].
    pub fn new(
        endpoints: ResolvedEndpoints,
        credentials: Credentials,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            receiver: endpoints.receiver,
            authentication: endpoints.authentication,
            credentials,
            transport,
            call_timeout: None,
            slot: Mutex::new(SessionSlot {
                state: SessionState::Unauthenticated,
                current: None,
                generation: 0,
            }),
        }
    }

    /// Bounds every remote round trip made through this connector.
    ///
    /// An elapsed timeout is reported as [`RemoteFault::TimedOut`], never as
    /// session expiry.
    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn receiver_endpoint(&self) -> &EndpointDescriptor {
        &self.receiver
    }

    pub fn authentication_endpoint(&self) -> &EndpointDescriptor {
        &self.authentication
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout
    }

    pub async fn state(&self) -> SessionState {
        self.slot.lock().await.state
    }

    /// Returns the active session, authenticating first if there is none.
    pub async fn session(&self) -> Result<SessionHandle, PublisherError> {
        let mut slot = self.slot.lock().await;
        if slot.state == SessionState::Active {
            if let Some(handle) = slot.current.as_ref() {
                return Ok(handle.clone());
            }
        }
        self.authenticate_locked(&mut slot).await
    }

    /// Receiver client bound to the active session.
    pub async fn client(&self) -> Result<Arc<dyn ReceiverClient>, PublisherError> {
        Ok(Arc::clone(self.session().await?.client()))
    }

    /// Token of the active session.
    pub async fn session_id(&self) -> Result<SessionToken, PublisherError> {
        Ok(self.session().await?.session_id().clone())
    }

    /// Replaces the current session with a freshly authenticated one.
    ///
    /// Always performs a new login, even while a session is active. Handles
    /// taken from the replaced session become stale: invalidating them is a
    /// no-op.
    pub async fn authenticate(&self) -> Result<SessionHandle, PublisherError> {
        let mut slot = self.slot.lock().await;
        self.authenticate_locked(&mut slot).await
    }

    /// Marks the session behind `stale` as expired without contacting the
    /// server.
    ///
    /// Has no effect if the connector already moved past `stale`, so a late
    /// caller cannot expire a session another caller just renewed. Returns
    /// whether the state changed.
    pub async fn invalidate_session(&self, stale: &SessionHandle) -> bool {
        let mut slot = self.slot.lock().await;
        let is_current = slot.state == SessionState::Active
            && slot
                .current
                .as_ref()
                .is_some_and(|current| current.generation == stale.generation);

        if !is_current {
            debug!(
                event = "session_invalidation_skipped",
                stale_generation = stale.generation,
                current_generation = slot.generation
            );
            return false;
        }

        slot.state = SessionState::Expired;
        info!(
            event = "session_invalidated",
            generation = stale.generation,
            receiver = %self.receiver
        );
        true
    }

    /// Runs one remote round trip under the configured call timeout.
    pub async fn bounded<T, Fut>(&self, call: Fut) -> Result<T, RemoteFault>
    where
        Fut: Future<Output = Result<T, RemoteFault>>,
    {
        match self.call_timeout {
            Some(limit) => with_timeout(limit, call)
                .await
                .unwrap_or(Err(RemoteFault::TimedOut(limit))),
            None => call.await,
        }
    }

    async fn authenticate_locked(
        &self,
        slot: &mut SessionSlot,
    ) -> Result<SessionHandle, PublisherError> {
        let previous_state = slot.state;

        let session_id = self
            .bounded(
                self.transport
                    .authenticate(&self.authentication, &self.credentials),
            )
            .await
            .map_err(|source| {
                warn!(
                    event = "session_authentication_failed",
                    endpoint = %self.authentication,
                    error = %source
                );
                PublisherError::Authentication {
                    endpoint: self.authentication.to_string(),
                    source,
                }
            })?;

        let client = self
            .bounded(self.transport.bind(&self.receiver, &session_id))
            .await
            .map_err(|fault| {
                warn!(
                    event = "receiver_bind_failed",
                    endpoint = %self.receiver,
                    error = %fault
                );
                PublisherError::Protocol(fault)
            })?;

        slot.generation += 1;
        let handle = SessionHandle {
            session_id,
            client,
            generation: slot.generation,
        };
        slot.state = SessionState::Active;
        slot.current = Some(handle.clone());

        info!(
            event = "session_authenticated",
            generation = handle.generation,
            previous_state = ?previous_state,
            receiver = %self.receiver,
            secure = self.receiver.is_secure()
        );
        Ok(handle)
    }
}

impl fmt::Debug for SessionConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConnector")
            .field("receiver", &self.receiver)
            .field("authentication", &self.authentication)
            .field("credentials", &self.credentials)
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use secrecy::SecretString;

    use super::{SessionConnector, SessionState};
    use crate::config::Credentials;
    use crate::endpoint::{resolve, EndpointDescriptor};
    use crate::error::PublisherError;
    use crate::event::EventBundle;
    use crate::fault::RemoteFault;
    use crate::transport::{ReceiverClient, SessionToken, StreamId, Transport};

    struct NullClient;

    #[async_trait]
    impl ReceiverClient for NullClient {
        async fn find_stream_id(
            &self,
            _session: &SessionToken,
            name: &str,
            version: &str,
        ) -> Result<StreamId, RemoteFault> {
            Ok(StreamId::from_key(name, version))
        }

        async fn define_stream(
            &self,
            _session: &SessionToken,
            _schema: &str,
        ) -> Result<StreamId, RemoteFault> {
            Ok(StreamId::new("defined:1"))
        }

        async fn publish(&self, _bundle: &EventBundle) -> Result<(), RemoteFault> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingTransport {
        authentications: AtomicUsize,
        reject: bool,
        auth_delay: Option<Duration>,
    }

    #[async_trait]
    impl Transport for CountingTransport {
        async fn authenticate(
            &self,
            _endpoint: &EndpointDescriptor,
            credentials: &Credentials,
        ) -> Result<SessionToken, RemoteFault> {
            if let Some(delay) = self.auth_delay {
                tokio::time::sleep(delay).await;
            }
            if self.reject {
                return Err(RemoteFault::AuthenticationFailed(format!(
                    "user {} rejected",
                    credentials.username()
                )));
            }
            let n = self.authentications.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(SessionToken::new(format!("session-{n}")))
        }

        async fn bind(
            &self,
            _endpoint: &EndpointDescriptor,
            _session: &SessionToken,
        ) -> Result<Arc<dyn ReceiverClient>, RemoteFault> {
            Ok(Arc::new(NullClient))
        }
    }

    fn connector(transport: Arc<CountingTransport>) -> SessionConnector {
        SessionConnector::new(
            resolve(Some("tcp://10.0.0.1:7611"), None).expect("resolve"),
            Credentials::new("admin", SecretString::new("admin".to_string())),
            transport,
        )
    }

    #[tokio::test]
    async fn authenticates_lazily_and_reuses_the_session() {
        let transport = Arc::new(CountingTransport::default());
        let connector = connector(Arc::clone(&transport));

        assert_eq!(connector.state().await, SessionState::Unauthenticated);
        assert_eq!(transport.authentications.load(Ordering::SeqCst), 0);

        let first = connector.session().await.expect("first session");
        let second = connector.session().await.expect("second session");

        assert_eq!(first.session_id(), second.session_id());
        assert_eq!(connector.state().await, SessionState::Active);
        assert_eq!(transport.authentications.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidation_leads_to_a_new_session() {
        let transport = Arc::new(CountingTransport::default());
        let connector = connector(Arc::clone(&transport));

        let first = connector.session().await.expect("session");
        assert!(connector.invalidate_session(&first).await);
        assert_eq!(connector.state().await, SessionState::Expired);

        let renewed = connector.session().await.expect("renewed session");
        assert_eq!(renewed.session_id().as_str(), "session-2");
        assert_eq!(renewed.generation(), 2);
        assert_eq!(connector.state().await, SessionState::Active);
    }

    #[tokio::test]
    async fn stale_handles_cannot_expire_a_renewed_session() {
        let transport = Arc::new(CountingTransport::default());
        let connector = connector(Arc::clone(&transport));

        let stale = connector.session().await.expect("session");
        assert!(connector.invalidate_session(&stale).await);
        connector.session().await.expect("renewed");

        assert!(!connector.invalidate_session(&stale).await);
        assert_eq!(connector.state().await, SessionState::Active);
        assert_eq!(transport.authentications.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn explicit_authentication_replaces_an_active_session() {
        let transport = Arc::new(CountingTransport::default());
        let connector = connector(Arc::clone(&transport));

        let first = connector.session().await.expect("session");
        assert_eq!(connector.state().await, SessionState::Active);

        let forced = connector.authenticate().await.expect("forced login");
        assert_eq!(forced.session_id().as_str(), "session-2");
        assert_eq!(forced.generation(), 2);
        assert_eq!(transport.authentications.load(Ordering::SeqCst), 2);

        assert!(!connector.invalidate_session(&first).await);
        assert_eq!(connector.state().await, SessionState::Active);
        let current = connector.session_id().await.expect("current session");
        assert_eq!(current.as_str(), "session-2");
    }

    #[tokio::test]
    async fn rejected_credentials_surface_as_authentication_error() {
        let transport = Arc::new(CountingTransport {
            reject: true,
            ..CountingTransport::default()
        });
        let connector = connector(transport);

        let error = connector.session().await.expect_err("should be rejected");
        match error {
            PublisherError::Authentication { endpoint, source } => {
                assert_eq!(endpoint, "https://10.0.0.1:9443");
                assert!(matches!(source, RemoteFault::AuthenticationFailed(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(connector.state().await, SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn authentication_timeout_is_a_transport_failure() {
        let transport = Arc::new(CountingTransport {
            auth_delay: Some(Duration::from_secs(5)),
            ..CountingTransport::default()
        });
        let connector = connector(transport).with_call_timeout(Some(Duration::from_millis(10)));

        let error = connector.session().await.expect_err("should time out");
        match error {
            PublisherError::Authentication { source, .. } => {
                assert_eq!(source, RemoteFault::TimedOut(Duration::from_millis(10)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(connector.session().await.is_err());
        assert_eq!(connector.state().await, SessionState::Unauthenticated);
    }
}
