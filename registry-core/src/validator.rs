//! Validates a candidate proxy: is the port open, and does it actually
//! forward an HTTPS request to a reference URL. Stateless and idempotent —
//! running it twice against the same host:port does the same two probes
//! again, no caching.

use std::time::Duration;

use reqwest::Proxy;
use tokio::net::TcpStream;
use tokio::time::timeout;

const CONNECT_TIMEOUT: Duration = Duration::from_millis(1_000);
const CHECK_TIMEOUT: Duration = Duration::from_millis(3_000);

/// Injectable so tests can substitute a deterministic stand-in instead of
/// hitting real sockets — see DESIGN NOTES on monkey-patching in the
/// source's test suite.
#[async_trait::async_trait]
pub trait Validator: Send + Sync {
    async fn check(&self, host: &str, port: u16) -> bool;
}

/// The real validator: TCP connect, then an HTTPS-over-HTTP-proxy GET to
/// `try_url` through `host:port` as the `https` proxy.
pub struct HttpValidator {
    pub try_url: String,
}

impl HttpValidator {
    pub fn new(try_url: impl Into<String>) -> Self {
        Self { try_url: try_url.into() }
    }

    async fn check_open_port(&self, host: &str, port: u16) -> bool {
        matches!(timeout(CONNECT_TIMEOUT, TcpStream::connect((host, port))).await, Ok(Ok(_)))
    }

    async fn try_proxy(&self, host: &str, port: u16) -> bool {
        let proxy_url = format!("http://{host}:{port}");
        let client = match Proxy::https(&proxy_url).and_then(|proxy| {
            reqwest::Client::builder().proxy(proxy).timeout(CHECK_TIMEOUT).build()
        }) {
            Ok(client) => client,
            Err(_) => return false,
        };

        match client.get(&self.try_url).send().await {
            Ok(resp) => resp.status() == reqwest::StatusCode::OK,
            Err(_) => false,
        }
    }
}

#[async_trait::async_trait]
impl Validator for HttpValidator {
    /// `check_open_port() AND try_proxy()`, short-circuiting — a closed
    /// port skips the HTTP round trip entirely.
    async fn check(&self, host: &str, port: u16) -> bool {
        self.check_open_port(host, port).await && self.try_proxy(host, port).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysTrue;
    #[async_trait::async_trait]
    impl Validator for AlwaysTrue {
        async fn check(&self, _host: &str, _port: u16) -> bool {
            true
        }
    }

    struct EndsIn5;
    #[async_trait::async_trait]
    impl Validator for EndsIn5 {
        async fn check(&self, host: &str, _port: u16) -> bool {
            host.ends_with('5')
        }
    }

    #[tokio::test]
    async fn validator_trait_is_object_safe_and_injectable() {
        let v: Box<dyn Validator> = Box::new(AlwaysTrue);
        assert!(v.check("10.0.0.1", 8080).await);

        let v: Box<dyn Validator> = Box::new(EndsIn5);
        assert!(v.check("10.0.0.5", 8080).await);
        assert!(!v.check("10.0.0.6", 8080).await);
    }

    #[tokio::test]
    async fn unreachable_host_fails_without_panicking() {
        let validator = HttpValidator::new("http://example.invalid/");
        // TEST-NET-1 (RFC 5737): reserved for documentation, never routable.
        let ok = validator.check("192.0.2.1", 8080).await;
        assert!(!ok);
    }
}
