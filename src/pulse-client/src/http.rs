//! HTTP client factory for the completion endpoint.
//!
//! Every client carries the same User-Agent, `tcp_nodelay`, a connect timeout
//! and a total request timeout. The total timeout covers reading the body, so
//! it also bounds a stalled stream.

use std::time::Duration;

use reqwest::Client;
use tracing::warn;

use crate::error::{ClientError, Result};

/// User-Agent string for all HTTP requests
pub const USER_AGENT: &str = concat!("pulse/", env!("CARGO_PKG_VERSION"));

/// Default timeout for establishing a connection (30 seconds)
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for a whole request/response cycle (60 seconds)
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Certificate validation for the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TrustPolicy {
    /// Standard certificate validation.
    #[default]
    Verify,
    /// Accept any server certificate.
    ///
    /// Development-only escape hatch for self-signed proxies. Never use it
    /// against a production endpoint.
    AcceptInvalidCertificates,
}

impl TrustPolicy {
    pub fn from_accept_invalid(accept_invalid: bool) -> Self {
        if accept_invalid {
            TrustPolicy::AcceptInvalidCertificates
        } else {
            TrustPolicy::Verify
        }
    }
}

/// Timeouts and trust settings for a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub trust: TrustPolicy,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            trust: TrustPolicy::Verify,
        }
    }
}

/// Creates an HTTP client builder with standard configuration.
fn create_client_builder(settings: &HttpSettings) -> reqwest::ClientBuilder {
    let builder = Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(settings.connect_timeout)
        .timeout(settings.request_timeout)
        .tcp_nodelay(true);

    match settings.trust {
        TrustPolicy::Verify => builder,
        TrustPolicy::AcceptInvalidCertificates => {
            warn!("TLS certificate validation is DISABLED for this session (development only)");
            builder.danger_accept_invalid_certs(true)
        }
    }
}

/// Creates an HTTP client with the given settings.
pub fn create_client(settings: &HttpSettings) -> Result<Client> {
    create_client_builder(settings)
        .build()
        .map_err(|e| ClientError::Build(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_client_with_defaults_succeeds() {
        assert!(create_client(&HttpSettings::default()).is_ok());
    }

    #[test]
    fn test_create_client_accepting_invalid_certs_succeeds() {
        let settings = HttpSettings {
            trust: TrustPolicy::AcceptInvalidCertificates,
            ..HttpSettings::default()
        };
        assert!(create_client(&settings).is_ok());
    }

    #[test]
    fn test_trust_policy_defaults_to_verify() {
        assert_eq!(TrustPolicy::default(), TrustPolicy::Verify);
        assert_eq!(TrustPolicy::from_accept_invalid(false), TrustPolicy::Verify);
        assert_eq!(
            TrustPolicy::from_accept_invalid(true),
            TrustPolicy::AcceptInvalidCertificates
        );
    }

    #[test]
    fn test_user_agent_constant_is_set() {
        assert!(USER_AGENT.starts_with("pulse/"));
    }
}
