use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::warn;

use crate::pool::WorkerPool;
use crate::scheduler::PeriodicTask;
use crate::store::{Proxy, ProxyStore};
use crate::tasks::inactive_backoff_due;
use crate::validator::Validator;

/// Periodic task (60s cadence): rechecks inactive proxies under
/// exponential backoff — due again once as long has passed since the
/// last check as had passed between going inactive and that check.
/// Success promotes back to active and clears `inactive_since`; failure
/// leaves it inactive. `last_check_at` is touched either way.
pub struct UpdateInactiveProxyTask {
    store: ProxyStore,
    validator: Arc<dyn Validator>,
    pool: WorkerPool,
}

impl UpdateInactiveProxyTask {
    pub fn new(store: ProxyStore, validator: Arc<dyn Validator>, pool_workers: usize) -> Self {
        Self { store, validator, pool: WorkerPool::new(pool_workers) }
    }
}

#[async_trait]
impl PeriodicTask for UpdateInactiveProxyTask {
    fn name(&self) -> &str {
        "update_inactive_proxy"
    }

    fn timeout(&self) -> StdDuration {
        StdDuration::from_secs(60)
    }

    async fn handle(&self) {
        let inactive = match self.store.list_inactive_proxies().await {
            Ok(proxies) => proxies,
            Err(err) => {
                warn!(%err, "failed to list inactive proxies");
                return;
            }
        };

        let now = Utc::now();
        let due: Vec<Proxy> = inactive
            .into_iter()
            .filter(|p| {
                let Some(inactive_since) = p.inactive_since else { return false };
                inactive_backoff_due(now, p.last_check_at, inactive_since)
            })
            .collect();
        if due.is_empty() {
            return;
        }

        let validator = self.validator.clone();
        let outcomes = self
            .pool
            .map(due, move |proxy| {
                let validator = validator.clone();
                async move {
                    let ok = validator.check(&proxy.host, proxy.port as u16).await;
                    (proxy, ok)
                }
            })
            .await;

        for outcome in outcomes.into_iter().flatten() {
            let (proxy, ok) = outcome;
            if ok {
                if let Err(err) = self.store.set_proxy_active(&proxy.host, proxy.port).await {
                    warn!(host = %proxy.host, port = proxy.port, %err, "failed to promote proxy back to active");
                }
                let _ = self.store.score_up_proxy(&proxy.host, proxy.port).await;
            } else {
                let _ = self.store.score_down_proxy(&proxy.host, proxy.port).await;
                let _ = self.store.touch_proxy_checked_at(&proxy.host, proxy.port).await;
            }
        }
    }
}
