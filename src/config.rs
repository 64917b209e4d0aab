//! Publisher configuration and credentials.

use std::fmt;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Deserializer};

use crate::endpoint::Scheme;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PublisherDefaults;

impl PublisherDefaults {
    /// Default binary RPC port of the event receiver.
    pub const RECEIVER_PORT: u16 = 7611;
    /// Default port of the secure authentication server.
    pub const AUTHENTICATION_PORT: u16 = 9443;
    pub const RECEIVER_SCHEME: Scheme = Scheme::Tcp;
    pub const AUTHENTICATION_SCHEME: Scheme = Scheme::Https;
}

/// Username and password presented to the authentication endpoint.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &SecretString {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Everything needed to build a [`Publisher`](crate::publisher::Publisher).
///
/// Deserializable so it can be embedded in an application's own config file.
/// Missing `receiver_url` deserializes to an empty string and is rejected when
/// the publisher is built.
#[derive(Clone, Deserialize)]
pub struct PublisherConfig {
    #[serde(default)]
    pub receiver_url: String,
    #[serde(default)]
    pub authentication_url: Option<String>,
    pub username: String,
    #[serde(deserialize_with = "deserialize_secret")]
    pub password: SecretString,
    /// Upper bound for each remote round trip, in milliseconds.
    #[serde(default)]
    pub call_timeout_ms: Option<u64>,
}

impl PublisherConfig {
    pub fn new(
        receiver_url: impl Into<String>,
        username: impl Into<String>,
        password: SecretString,
    ) -> Self {
        Self {
            receiver_url: receiver_url.into(),
            authentication_url: None,
            username: username.into(),
            password,
            call_timeout_ms: None,
        }
    }

    pub fn with_authentication_url(mut self, url: impl Into<String>) -> Self {
        self.authentication_url = Some(url.into());
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.username.clone(), self.password.clone())
    }
}

impl fmt::Debug for PublisherConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublisherConfig")
            .field("receiver_url", &self.receiver_url)
            .field("authentication_url", &self.authentication_url)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("call_timeout_ms", &self.call_timeout_ms)
            .finish()
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::new)
}
