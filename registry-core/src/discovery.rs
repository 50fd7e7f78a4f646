//! Random-IPv4 discovery: many workers generate candidate `host:port`
//! pairs, skip blacklisted ones, validate the rest, and push survivors
//! onto a shared channel that `search` drains.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::Rng;
use tokio::sync::mpsc;

use crate::net::NetBlacklist;
use crate::validator::Validator;

/// Candidate ports the discovery engine probes, matching the source's
/// fixed small set rather than scanning the whole port space.
const CANDIDATE_PORTS: [u16; 2] = [8080, 3128];

/// A discovered, validated candidate — not yet in the store.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredProxy {
    pub host: String,
    pub port: u16,
}

/// Bounds how many validated-but-not-yet-consumed candidates can queue up;
/// the source channel is unbounded, but an implementation should cap
/// memory rather than let workers race arbitrarily far ahead of the
/// consumer.
const CHANNEL_CAPACITY: usize = 1_024;

/// Drives `n_workers` concurrent generate-validate loops and streams
/// survivors out through an mpsc channel.
pub struct ProxySearcher {
    n_workers: usize,
    blacklist: Option<Arc<NetBlacklist>>,
    validator: Arc<dyn Validator>,
}

impl ProxySearcher {
    pub fn new(n_workers: usize, blacklist: Option<Arc<NetBlacklist>>, validator: Arc<dyn Validator>) -> Self {
        Self { n_workers: n_workers.max(1), blacklist, validator }
    }

    /// Streams discovered proxies into a channel. If `count` is `Some`,
    /// the stream stops once that many have been produced; `None` runs
    /// until the caller drops the receiver. Returns the receiving half;
    /// the worker tasks are detached and exit once the stop signal fires
    /// (bounded `count`) or the channel closes (unbounded, receiver
    /// dropped).
    pub fn search(&self, count: Option<usize>) -> mpsc::Receiver<DiscoveredProxy> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let stop = Arc::new(AtomicBool::new(false));
        let produced = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        for _ in 0..self.n_workers {
            let tx = tx.clone();
            let stop = stop.clone();
            let produced = produced.clone();
            let blacklist = self.blacklist.clone();
            let validator = self.validator.clone();

            tokio::spawn(async move {
                loop {
                    if stop.load(Ordering::Relaxed) {
                        return;
                    }
                    let (host, port) = random_candidate();
                    if let Some(blacklist) = &blacklist {
                        if blacklist.contains(&host).unwrap_or(false) {
                            continue;
                        }
                    }
                    if !validator.check(&host, port).await {
                        continue;
                    }

                    if let Some(limit) = count {
                        if produced.fetch_add(1, Ordering::SeqCst) >= limit {
                            stop.store(true, Ordering::Relaxed);
                            return;
                        }
                    }

                    if tx.send(DiscoveredProxy { host, port }).await.is_err() {
                        // Consumer dropped the receiver; nothing left to do.
                        return;
                    }

                    if stop.load(Ordering::Relaxed) {
                        return;
                    }
                }
            });
        }

        rx
    }
}

fn random_candidate() -> (String, u16) {
    let mut rng = rand::thread_rng();
    let host = format!(
        "{}.{}.{}.{}",
        rng.gen_range(0..=255),
        rng.gen_range(0..=255),
        rng.gen_range(0..=255),
        rng.gen_range(0..=255),
    );
    let port = CANDIDATE_PORTS[rng.gen_range(0..CANDIDATE_PORTS.len())];
    (host, port)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct EndsIn5;
    #[async_trait]
    impl Validator for EndsIn5 {
        async fn check(&self, host: &str, _port: u16) -> bool {
            host.ends_with('5')
        }
    }

    #[tokio::test]
    async fn search_with_a_bounded_count_yields_only_matching_candidates() {
        let searcher = ProxySearcher::new(8, None, Arc::new(EndsIn5));
        let mut rx = searcher.search(Some(3));

        let mut found = Vec::new();
        while let Some(proxy) = rx.recv().await {
            found.push(proxy);
            if found.len() == 3 {
                break;
            }
        }

        assert_eq!(found.len(), 3);
        for proxy in &found {
            assert!(proxy.host.ends_with('5'));
            assert!(CANDIDATE_PORTS.contains(&proxy.port));
        }
    }

    #[tokio::test]
    async fn blacklisted_candidates_are_never_emitted() {
        struct AlwaysTrue;
        #[async_trait]
        impl Validator for AlwaysTrue {
            async fn check(&self, _host: &str, _port: u16) -> bool {
                true
            }
        }

        let mut blacklist = NetBlacklist::new();
        blacklist.add("0.0.0.0/1").unwrap(); // everything with a leading 0 bit: 0.0.0.0-127.255.255.255
        let searcher = ProxySearcher::new(4, Some(Arc::new(blacklist)), Arc::new(AlwaysTrue));
        let mut rx = searcher.search(Some(5));

        let mut seen = 0;
        while let Some(proxy) = rx.recv().await {
            let octet: u8 = proxy.host.split('.').next().unwrap().parse().unwrap();
            assert!(octet >= 128);
            seen += 1;
            if seen == 5 {
                break;
            }
        }
    }
}
