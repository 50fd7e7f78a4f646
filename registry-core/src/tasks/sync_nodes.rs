use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tracing::{info, warn};

use crate::peer::PeerClient;
use crate::scheduler::PeriodicTask;
use crate::store::{Node, ProxyStore};
use crate::tasks::inactive_backoff_due;

const NODE_STALE_AFTER: Duration = Duration::hours(1);

/// Periodic task (60s cadence). Two phases per spec §4.10, run
/// independently over the same selected nodes — neither phase's outcome
/// gates the other, since a peer can implement one endpoint without the
/// other:
///
/// 1. **Node sync.** Poll due nodes (active nodes stale >1h, inactive
///    nodes under the same backoff as inactive proxies, `last_check_at`
///    null counting as due). A peer that answers gets `set_active` and
///    any unknown peer URLs it reports get inserted; a peer that doesn't
///    answer gets `set_inactive`.
/// 2. **Proxy sync.** For every selected node, fetch its `/list` and
///    merge unseen proxies in as active; geo fields are filled by the
///    store at insertion, same as local discovery.
pub struct SyncNodesTask {
    store: ProxyStore,
    client: PeerClient,
}

impl SyncNodesTask {
    pub fn new(store: ProxyStore, client: PeerClient) -> Self {
        Self { store, client }
    }

    fn node_due(node: &Node, now: chrono::DateTime<Utc>) -> bool {
        if node.is_active {
            match node.last_check_at {
                Some(last_check_at) => now.signed_duration_since(last_check_at) > NODE_STALE_AFTER,
                None => true,
            }
        } else {
            match (node.last_check_at, node.inactive_since) {
                (Some(last_check_at), Some(inactive_since)) => inactive_backoff_due(now, last_check_at, inactive_since),
                // never checked: due immediately.
                _ => true,
            }
        }
    }

    /// Phase 1 (node sync) and phase 2 (proxy sync) run independently over
    /// the same selected node, exactly as the original's `_sync_nodes`
    /// then `_sync_proxies` over one selection — a peer that doesn't
    /// answer `/nodes` still gets its `/list` fetched, since the two
    /// endpoints can come from heterogeneous peer implementations.
    async fn sync_one_node(&self, node: &Node) {
        self.sync_node_entry(node).await;
        self.sync_proxies_from(node).await;
    }

    async fn sync_node_entry(&self, node: &Node) {
        match self.client.fetch_nodes(&node.url).await {
            Some(peers) => {
                if let Err(err) = self.store.set_node_active(&node.url).await {
                    warn!(url = %node.url, %err, "failed to mark node active");
                }
                for peer in peers {
                    let Ok(normalized) = crate::peer::normalize_node_url(&peer.url) else { continue };
                    match self.store.node_exists(&normalized).await {
                        Ok(false) => {
                            if let Err(err) = self.store.create_node(&normalized).await {
                                warn!(url = %normalized, %err, "failed to record peer-announced node");
                            }
                        }
                        Ok(true) => {}
                        Err(err) => warn!(url = %normalized, %err, "failed to check node existence"),
                    }
                }
            }
            None => {
                if let Err(err) = self.store.set_node_inactive(&node.url).await {
                    warn!(url = %node.url, %err, "failed to mark node inactive");
                }
            }
        }
    }

    async fn sync_proxies_from(&self, node: &Node) {
        let Some(proxies) = self.client.fetch_list(&node.url).await else { return };
        for peer_proxy in proxies {
            let port = i64::from(peer_proxy.port);
            match self.store.proxy_exists(&peer_proxy.host, port).await {
                Ok(false) => {
                    if let Err(err) = self.store.create_proxy(&peer_proxy.host, port).await {
                        warn!(host = %peer_proxy.host, port, %err, "failed to merge peer proxy");
                    } else {
                        info!(host = %peer_proxy.host, port, peer = %node.url, "merged proxy from peer");
                    }
                }
                Ok(true) => {}
                Err(err) => warn!(host = %peer_proxy.host, port, %err, "failed to check proxy existence"),
            }
        }
    }
}

#[async_trait]
impl PeriodicTask for SyncNodesTask {
    fn name(&self) -> &str {
        "sync_nodes"
    }

    fn timeout(&self) -> StdDuration {
        StdDuration::from_secs(60)
    }

    async fn handle(&self) {
        let now = Utc::now();
        let mut due = Vec::new();
        match self.store.list_active_nodes().await {
            Ok(nodes) => due.extend(nodes.into_iter().filter(|n| Self::node_due(n, now))),
            Err(err) => warn!(%err, "failed to list active nodes"),
        }
        match self.store.list_inactive_nodes().await {
            Ok(nodes) => due.extend(nodes.into_iter().filter(|n| Self::node_due(n, now))),
            Err(err) => warn!(%err, "failed to list inactive nodes"),
        }

        for node in due {
            self.sync_one_node(&node).await;
        }
    }
}
