use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::discovery::ProxySearcher;
use crate::scheduler::Task;
use crate::store::ProxyStore;

/// One-shot task (runs forever via the discovery stream): consumes
/// [`ProxySearcher::search`] and inserts every survivor the store doesn't
/// already know about as active.
pub struct ProxySearchTask {
    searcher: Arc<ProxySearcher>,
    store: ProxyStore,
}

impl ProxySearchTask {
    pub fn new(searcher: Arc<ProxySearcher>, store: ProxyStore) -> Self {
        Self { searcher, store }
    }
}

#[async_trait]
impl Task for ProxySearchTask {
    fn name(&self) -> &str {
        "proxy_search"
    }

    async fn run(&self) {
        let mut stream = self.searcher.search(None);
        while let Some(candidate) = stream.recv().await {
            let port = i64::from(candidate.port);
            match self.store.proxy_exists(&candidate.host, port).await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(err) => {
                    debug!(host = %candidate.host, port, %err, "skipping candidate: store lookup failed");
                    continue;
                }
            }

            match self.store.create_proxy(&candidate.host, port).await {
                Ok(_) => info!(host = %candidate.host, port, "discovered new active proxy"),
                Err(err) => debug!(host = %candidate.host, port, %err, "failed to record discovered proxy"),
            }
        }
    }
}
