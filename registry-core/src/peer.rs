//! The peer-sync HTTP client: pulls a remote instance's `/nodes` and
//! `/list` endpoints. Every non-200 response, and every connection or
//! decode failure, is treated as a uniform "this peer is unreachable"
//! signal — `None` — never an error the caller has to match on.

use serde::Deserialize;

use crate::error::Result;

#[derive(Debug, Clone, Deserialize)]
pub struct PeerNode {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PeerProxy {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
struct ListResult<T> {
    result: Vec<T>,
}

/// Talks to one peer at a time; `self_url`, if known, is announced to the
/// peer via `POST /nodes` so it learns about us too.
pub struct PeerClient {
    http: reqwest::Client,
    self_url: Option<String>,
}

impl PeerClient {
    pub fn new(http: reqwest::Client, self_url: Option<String>) -> Self {
        Self { http, self_url }
    }

    /// `GET {node_url}nodes`, or `POST {node_url}nodes` with `url=<self>`
    /// if we know our own URL — that's how a peer learns about us in the
    /// same round trip instead of waiting for it to poll us back.
    /// Returns `None` on any non-200 response or transport failure.
    pub async fn fetch_nodes(&self, node_url: &str) -> Option<Vec<PeerNode>> {
        let endpoint = format!("{node_url}nodes");
        let response = match &self.self_url {
            Some(self_url) => {
                self.http.post(&endpoint).form(&[("url", self_url.as_str())]).send().await
            }
            None => self.http.get(&endpoint).send().await,
        };

        let response = response.ok()?;
        if !response.status().is_success() {
            return None;
        }
        let body: ListResult<PeerNode> = response.json().await.ok()?;
        Some(body.result)
    }

    /// `GET {node_url}list` — the peer's active proxies. `None` on any
    /// non-200 response or transport failure.
    pub async fn fetch_list(&self, node_url: &str) -> Option<Vec<PeerProxy>> {
        let endpoint = format!("{node_url}list");
        let response = self.http.get(&endpoint).send().await.ok()?;
        if !response.status().is_success() {
            return None;
        }
        let body: ListResult<PeerProxy> = response.json().await.ok()?;
        Some(body.result)
    }
}

/// Ensures a peer URL ends with a slash, matching the data model's
/// "mandatory trailing slash" invariant on `Node.url`.
pub fn normalize_node_url(url: &str) -> Result<String> {
    if url.is_empty() {
        return Err(crate::error::RegistryError::InvalidUrl(url.to_string()));
    }
    if url.ends_with('/') {
        Ok(url.to_string())
    } else {
        Ok(format!("{url}/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_adds_a_trailing_slash_when_missing() {
        assert_eq!(normalize_node_url("http://peer.example").unwrap(), "http://peer.example/");
        assert_eq!(normalize_node_url("http://peer.example/").unwrap(), "http://peer.example/");
    }

    #[test]
    fn normalize_rejects_empty_url() {
        assert!(normalize_node_url("").is_err());
    }

    #[tokio::test]
    async fn unreachable_peer_yields_none_not_an_error() {
        let client = PeerClient::new(reqwest::Client::new(), None);
        assert!(client.fetch_nodes("http://127.0.0.1:1/").await.is_none());
        assert!(client.fetch_list("http://127.0.0.1:1/").await.is_none());
    }
}
