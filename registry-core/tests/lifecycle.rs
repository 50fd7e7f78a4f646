//! Cross-module coverage for the discover -> ingest -> query pipeline:
//! `discovery::ProxySearcher` feeding `tasks::ProxySearchTask`, landing in
//! `store::ProxyStore` with geo fields filled from `geoip`, and finally
//! read back out through `query::filter_proxies`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use registry_core::discovery::ProxySearcher;
use registry_core::geoip::{prepare_geoip_db, GeoIpStore};
use registry_core::net::NetBlacklist;
use registry_core::query::{filter_proxies, QueryFilter};
use registry_core::scheduler::Task;
use registry_core::store::ProxyStore;
use registry_core::tasks::ProxySearchTask;
use registry_core::validator::Validator;

struct EndsIn5;
#[async_trait]
impl Validator for EndsIn5 {
    async fn check(&self, host: &str, _port: u16) -> bool {
        host.ends_with('5')
    }
}

async fn fixture_store() -> (tempfile::TempDir, ProxyStore) {
    let dir = tempfile::tempdir().unwrap();
    let geoip_path = dir.path().join("geoip.db");
    let csv = "ip_from,ip_to,continent,country,region,city,latitude,longitude\n\
               0.0.0.0,255.255.255.255,NA,US,California,Mountain View,37.0,-122.0\n";
    prepare_geoip_db(csv.as_bytes(), &geoip_path).unwrap();
    let geoip = Arc::new(GeoIpStore::open(&geoip_path).unwrap());
    let store = ProxyStore::open(dir.path().join("proxy.db"), geoip).await.unwrap();
    (dir, store)
}

#[tokio::test]
async fn discovered_candidates_land_in_the_store_with_geo_fields_and_are_queryable() {
    let (_dir, store) = fixture_store().await;

    let searcher = Arc::new(ProxySearcher::new(4, None::<Arc<NetBlacklist>>, Arc::new(EndsIn5)));
    let task = ProxySearchTask::new(searcher, store.clone());
    let handle = tokio::spawn(async move { task.run().await });

    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if store.list_active_proxies().await.unwrap().len() >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("at least two proxies should have been discovered within the timeout");
    handle.abort();

    let active = store.list_active_proxies().await.unwrap();
    assert!(active.iter().all(|p| p.host.ends_with('5')));
    assert!(active.iter().all(|p| p.country == "US" && p.city == "Mountain View"));

    let records = filter_proxies(&active, &QueryFilter { country: Some("us".to_string()), ..Default::default() });
    assert_eq!(records.len(), active.len());

    let none_match = filter_proxies(&active, &QueryFilter { country: Some("fr".to_string()), ..Default::default() });
    assert!(none_match.is_empty());
}

#[tokio::test]
async fn a_blacklisted_candidate_range_never_reaches_the_store() {
    let (_dir, store) = fixture_store().await;

    // Blacklist everything ending in 5 except nothing — instead blacklist
    // the whole address space so the searcher can never pass a candidate
    // through, proving the blacklist check runs before the validator ever
    // sees a candidate that would otherwise always be accepted.
    struct AlwaysTrue;
    #[async_trait]
    impl Validator for AlwaysTrue {
        async fn check(&self, _host: &str, _port: u16) -> bool {
            true
        }
    }

    let mut blacklist = NetBlacklist::new();
    blacklist.add("0.0.0.0/0").unwrap();
    let searcher = Arc::new(ProxySearcher::new(4, Some(Arc::new(blacklist)), Arc::new(AlwaysTrue)));
    let task = ProxySearchTask::new(searcher, store.clone());
    let handle = tokio::spawn(async move { task.run().await });

    tokio::time::sleep(Duration::from_millis(200)).await;
    handle.abort();

    assert!(store.list_active_proxies().await.unwrap().is_empty());
}
