//! Endpoint normalization for the event receiver and the authentication
//! server.
//!
//! Both endpoints are resolved once, when a publisher is built. Missing
//! schemes and ports are filled from [`PublisherDefaults`], `localhost` on the
//! receiver side is pinned to the IPv4 loopback address, and an absent
//! authentication URL is derived from the receiver host.

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::{Host, Url};

use crate::config::PublisherDefaults;
use crate::error::PublisherError;

/// Address used in place of `localhost` for the receiver.
pub const LOOPBACK_HOST: &str = "127.0.0.1";

const LOCALHOST: &str = "localhost";
// Non-special scheme so `url` keeps ports such as 443 verbatim.
const PARSE_SCHEME: &str = "endpoint";

/// Connection scheme of an endpoint.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Tcp,
    Ssl,
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Ssl => "ssl",
            Self::Http => "http",
            Self::Https => "https",
        }
    }

    /// Whether connections for this scheme must run over TLS.
    pub fn is_secure(self) -> bool {
        matches!(self, Self::Ssl | Self::Https)
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "tcp" => Some(Self::Tcp),
            "ssl" => Some(Self::Ssl),
            "http" => Some(Self::Http),
            "https" => Some(Self::Https),
            _ => None,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized `{scheme, host, port}` triple used to open a connection.
///
/// The host is never empty once resolution succeeds.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct EndpointDescriptor {
    scheme: Scheme,
    host: String,
    port: u16,
}

impl EndpointDescriptor {
    pub fn new(scheme: Scheme, host: impl Into<String>, port: u16) -> Result<Self, PublisherError> {
        let host = host.into();
        if host.trim().is_empty() {
            return Err(PublisherError::Configuration(
                "endpoint host must not be empty".to_string(),
            ));
        }
        Ok(Self { scheme, host, port })
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_secure(&self) -> bool {
        self.scheme.is_secure()
    }
}

impl fmt::Display for EndpointDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "{}://[{}]:{}", self.scheme, self.host, self.port)
        } else {
            write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
        }
    }
}

/// Receiver and authentication endpoints produced by [`resolve`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResolvedEndpoints {
    pub receiver: EndpointDescriptor,
    pub authentication: EndpointDescriptor,
}

/// Resolves the receiver URL and the optional authentication URL.
///
/// Fails with [`PublisherError::Configuration`] when the receiver URL is
/// missing or blank, or when either URL has no usable host.
pub fn resolve(
    receiver_url: Option<&str>,
    authentication_url: Option<&str>,
) -> Result<ResolvedEndpoints, PublisherError> {
    let receiver_url = receiver_url
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .ok_or_else(|| PublisherError::Configuration("receiver URL cannot be empty".to_string()))?;

    let receiver = resolve_receiver(receiver_url)?;
    let authentication = resolve_authentication(authentication_url, &receiver)?;
    Ok(ResolvedEndpoints {
        receiver,
        authentication,
    })
}

/// Resolves a `[tcp|ssl]://host[:port]`, bare IP, or bare `host:port`
/// receiver URL.
pub fn resolve_receiver(raw: &str) -> Result<EndpointDescriptor, PublisherError> {
    let invalid = || {
        PublisherError::Configuration(format!(
            "invalid receiver URL '{raw}', expected [tcp|ssl]://host[:port]"
        ))
    };

    let parts = split_endpoint(raw).ok_or_else(invalid)?;

    let mut host = parts.host;
    if host.eq_ignore_ascii_case(LOCALHOST) {
        info!(
            event = "receiver_host_aliased",
            from = LOCALHOST,
            to = LOOPBACK_HOST
        );
        host = LOOPBACK_HOST.to_string();
    }

    let scheme = match parts.scheme {
        Some(scheme) => scheme,
        None => {
            let scheme = PublisherDefaults::RECEIVER_SCHEME;
            info!(event = "receiver_scheme_defaulted", scheme = %scheme);
            scheme
        }
    };

    let port = match parts.port {
        Some(port) => port,
        None => {
            let port = PublisherDefaults::RECEIVER_PORT;
            info!(event = "receiver_port_defaulted", port);
            port
        }
    };

    EndpointDescriptor::new(scheme, host, port).map_err(|_| invalid())
}

/// Resolves the authentication URL, deriving it from `receiver` when absent.
///
/// A scheme other than `https` is kept as given and reported with a warning;
/// the server decides whether it can be used.
pub fn resolve_authentication(
    raw: Option<&str>,
    receiver: &EndpointDescriptor,
) -> Result<EndpointDescriptor, PublisherError> {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        let derived = EndpointDescriptor {
            scheme: PublisherDefaults::AUTHENTICATION_SCHEME,
            host: receiver.host.clone(),
            port: PublisherDefaults::AUTHENTICATION_PORT,
        };
        info!(event = "authentication_url_derived", endpoint = %derived);
        return Ok(derived);
    };

    let invalid = || {
        PublisherError::Configuration(format!(
            "invalid authentication URL '{raw}', expected https://host[:port]"
        ))
    };

    let parts = split_endpoint(raw).ok_or_else(invalid)?;

    let port = match parts.port {
        Some(port) => port,
        None => {
            let port = PublisherDefaults::AUTHENTICATION_PORT;
            info!(event = "authentication_port_defaulted", port);
            port
        }
    };

    let scheme = match parts.scheme {
        Some(Scheme::Https) => Scheme::Https,
        Some(other) => {
            warn!(
                event = "auth_scheme_not_https",
                scheme = %other,
                "authentication endpoint is not using https"
            );
            other
        }
        None => {
            info!(event = "authentication_scheme_defaulted", scheme = "https");
            PublisherDefaults::AUTHENTICATION_SCHEME
        }
    };

    EndpointDescriptor::new(scheme, parts.host, port).map_err(|_| invalid())
}

#[derive(Debug, PartialEq, Eq)]
struct EndpointParts {
    scheme: Option<Scheme>,
    host: String,
    port: Option<u16>,
}

/// Splits an endpoint string into scheme, host, and port.
///
/// Without a `scheme://` prefix the input must be an IP literal, any host
/// followed by an explicit `:port`, or a bare `localhost`.
fn split_endpoint(raw: &str) -> Option<EndpointParts> {
    let raw = raw.trim();

    let Some((scheme, rest)) = raw.split_once("://") else {
        return split_bare_host(raw);
    };

    let scheme = Scheme::parse(scheme)?;
    let (host, port) = split_authority(rest)?;

    Some(EndpointParts {
        scheme: Some(scheme),
        host,
        port,
    })
}

fn split_authority(authority: &str) -> Option<(String, Option<u16>)> {
    let url = Url::parse(&format!("{PARSE_SCHEME}://{authority}")).ok()?;
    let host = match url.host()? {
        Host::Domain(domain) => domain.to_string(),
        Host::Ipv4(addr) => addr.to_string(),
        Host::Ipv6(addr) => addr.to_string(),
    };
    if host.is_empty() {
        return None;
    }
    Some((host, url.port()))
}

fn split_bare_host(raw: &str) -> Option<EndpointParts> {
    if let Ok(ip) = raw.parse::<IpAddr>() {
        return Some(EndpointParts {
            scheme: None,
            host: ip.to_string(),
            port: None,
        });
    }

    if let Ok(addr) = raw.parse::<SocketAddr>() {
        return Some(EndpointParts {
            scheme: None,
            host: addr.ip().to_string(),
            port: Some(addr.port()),
        });
    }

    if let Some((host, port)) = raw.rsplit_once(':') {
        let port = port.parse::<u16>().ok()?;
        let (parsed, None) = split_authority(host)? else {
            return None;
        };
        // Anything the authority parse dropped (path, userinfo) is not a host.
        if !parsed.eq_ignore_ascii_case(host) {
            return None;
        }
        return Some(EndpointParts {
            scheme: None,
            host: parsed,
            port: Some(port),
        });
    }

    raw.eq_ignore_ascii_case(LOCALHOST).then(|| EndpointParts {
        scheme: None,
        host: raw.to_string(),
        port: None,
    })
}
