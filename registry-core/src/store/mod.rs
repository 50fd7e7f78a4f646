//! The persistent store: two tables, `proxy` and `node`, mirroring the
//! data model in spec. Schema creation is an idempotent
//! `CREATE TABLE IF NOT EXISTS` run at store-open time — there is no
//! migration framework in scope here, just the tables existing.

mod model;

pub use model::{score_down, score_up, Node, Proxy, SCORE_ALPHA};

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::error::Result;
use crate::geoip::GeoIpStore;

/// Owns the SQLite connection pool and the GeoIP handle consulted on every
/// proxy insertion. A single `sqlx::Pool` is already safe to share and
/// clone across tasks, so there's no per-thread session cache here — the
/// teacher's "per-thread session" concern is replaced by the pool itself
/// (see DESIGN.md).
#[derive(Clone)]
pub struct ProxyStore {
    pool: SqlitePool,
    geoip: Arc<GeoIpStore>,
}

impl ProxyStore {
    /// Opens (creating if absent) the SQLite file at `path` and ensures
    /// both tables exist.
    pub async fn open<P: AsRef<Path>>(path: P, geoip: Arc<GeoIpStore>) -> Result<Self> {
        let options = SqliteConnectOptions::new().filename(path.as_ref()).create_if_missing(true);
        let pool = SqlitePoolOptions::new().max_connections(16).connect_with(options).await?;
        let store = Self { pool, geoip };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS proxy (
                host TEXT NOT NULL,
                port INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                last_check_at TEXT NOT NULL,
                inactive_since TEXT,
                is_active INTEGER NOT NULL,
                country TEXT NOT NULL,
                region TEXT NOT NULL,
                city TEXT NOT NULL,
                score REAL NOT NULL,
                PRIMARY KEY (host, port)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS node (
                url TEXT NOT NULL PRIMARY KEY,
                created_at TEXT NOT NULL,
                last_check_at TEXT,
                inactive_since TEXT,
                is_active INTEGER NOT NULL DEFAULT 0
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // -- Proxy operations ------------------------------------------------

    pub async fn get_proxy(&self, host: &str, port: i64) -> Result<Option<Proxy>> {
        let row = sqlx::query_as::<_, Proxy>("SELECT * FROM proxy WHERE host = ? AND port = ?")
            .bind(host)
            .bind(port)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn proxy_exists(&self, host: &str, port: i64) -> Result<bool> {
        Ok(self.get_proxy(host, port).await?.is_some())
    }

    pub async fn list_active_proxies(&self) -> Result<Vec<Proxy>> {
        let rows = sqlx::query_as::<_, Proxy>("SELECT * FROM proxy WHERE is_active = 1")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn list_inactive_proxies(&self) -> Result<Vec<Proxy>> {
        let rows = sqlx::query_as::<_, Proxy>("SELECT * FROM proxy WHERE is_active = 0")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Inserts a brand-new proxy as active, filling geo fields from the
    /// GeoIP store. Callers are expected to have checked
    /// [`ProxyStore::proxy_exists`] first — the uniqueness constraint on
    /// `(host, port)` is the backstop, not the primary check.
    pub async fn create_proxy(&self, host: &str, port: i64) -> Result<Proxy> {
        let now = Utc::now();
        let geo = self.geoip.get_info(host)?;
        let (country, region, city) = match geo {
            Some(info) => (info.country, info.region, info.city),
            None => (String::new(), String::new(), String::new()),
        };

        let proxy = Proxy {
            host: host.to_string(),
            port,
            created_at: now,
            last_check_at: now,
            inactive_since: None,
            is_active: true,
            country,
            region,
            city,
            score: 0.0,
        };

        sqlx::query(
            "INSERT INTO proxy (host, port, created_at, last_check_at, inactive_since, is_active, country, region, city, score)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&proxy.host)
        .bind(proxy.port)
        .bind(proxy.created_at)
        .bind(proxy.last_check_at)
        .bind(proxy.inactive_since)
        .bind(proxy.is_active)
        .bind(&proxy.country)
        .bind(&proxy.region)
        .bind(&proxy.city)
        .bind(proxy.score)
        .execute(&self.pool)
        .await?;

        Ok(proxy)
    }

    pub async fn set_proxy_active(&self, host: &str, port: i64) -> Result<()> {
        let now = Utc::now();
        sqlx::query(
            "UPDATE proxy SET is_active = 1, last_check_at = ?, inactive_since = NULL WHERE host = ? AND port = ?",
        )
        .bind(now)
        .bind(host)
        .bind(port)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Sets a proxy inactive. `inactive_since` is only written the first
    /// time: the `WHERE inactive_since IS NULL` clause preserves the
    /// original transition time across repeated failures.
    pub async fn set_proxy_inactive(&self, host: &str, port: i64) -> Result<()> {
        let now = Utc::now();
        sqlx::query(
            "UPDATE proxy SET is_active = 0, last_check_at = ?,
                inactive_since = CASE WHEN inactive_since IS NULL THEN ? ELSE inactive_since END
             WHERE host = ? AND port = ?",
        )
        .bind(now)
        .bind(now)
        .bind(host)
        .bind(port)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn touch_proxy_checked_at(&self, host: &str, port: i64) -> Result<()> {
        sqlx::query("UPDATE proxy SET last_check_at = ? WHERE host = ? AND port = ?")
            .bind(Utc::now())
            .bind(host)
            .bind(port)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn score_up_proxy(&self, host: &str, port: i64) -> Result<()> {
        let Some(proxy) = self.get_proxy(host, port).await? else { return Ok(()) };
        let next = score_up(proxy.score);
        sqlx::query("UPDATE proxy SET score = ? WHERE host = ? AND port = ?")
            .bind(next)
            .bind(host)
            .bind(port)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn score_down_proxy(&self, host: &str, port: i64) -> Result<()> {
        let Some(proxy) = self.get_proxy(host, port).await? else { return Ok(()) };
        let next = score_down(proxy.score);
        sqlx::query("UPDATE proxy SET score = ? WHERE host = ? AND port = ?")
            .bind(next)
            .bind(host)
            .bind(port)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // -- Node operations ---------------------------------------------------

    pub async fn get_node(&self, url: &str) -> Result<Option<Node>> {
        let row = sqlx::query_as::<_, Node>("SELECT * FROM node WHERE url = ?")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn node_exists(&self, url: &str) -> Result<bool> {
        Ok(self.get_node(url).await?.is_some())
    }

    pub async fn list_active_nodes(&self) -> Result<Vec<Node>> {
        let rows = sqlx::query_as::<_, Node>("SELECT * FROM node WHERE is_active = 1")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn list_inactive_nodes(&self) -> Result<Vec<Node>> {
        let rows = sqlx::query_as::<_, Node>("SELECT * FROM node WHERE is_active = 0")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Inserts a node, seeded or discovered via peer-sync. Nodes are never
    /// deleted; default state is inactive until the first successful sync.
    pub async fn create_node(&self, url: &str) -> Result<Node> {
        let now = Utc::now();
        let node = Node { url: url.to_string(), created_at: now, last_check_at: None, inactive_since: None, is_active: false };

        sqlx::query(
            "INSERT INTO node (url, created_at, last_check_at, inactive_since, is_active)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&node.url)
        .bind(node.created_at)
        .bind(node.last_check_at)
        .bind(node.inactive_since)
        .bind(node.is_active)
        .execute(&self.pool)
        .await?;

        Ok(node)
    }

    pub async fn set_node_active(&self, url: &str) -> Result<()> {
        sqlx::query("UPDATE node SET is_active = 1, last_check_at = ?, inactive_since = NULL WHERE url = ?")
            .bind(Utc::now())
            .bind(url)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_node_inactive(&self, url: &str) -> Result<()> {
        let now = Utc::now();
        sqlx::query(
            "UPDATE node SET is_active = 0, last_check_at = ?,
                inactive_since = CASE WHEN inactive_since IS NULL THEN ? ELSE inactive_since END
             WHERE url = ?",
        )
        .bind(now)
        .bind(now)
        .bind(url)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geoip::prepare_geoip_db;

    async fn fixture_store() -> (tempfile::TempDir, ProxyStore) {
        let dir = tempfile::tempdir().unwrap();
        let geoip_path = dir.path().join("geoip.db");
        let csv = "ip_from,ip_to,continent,country,region,city,latitude,longitude\n\
                    1.0.0.0,255.255.255.255,NA,US,California,Mountain View,37.0,-122.0\n";
        prepare_geoip_db(csv.as_bytes(), &geoip_path).unwrap();
        let geoip = Arc::new(GeoIpStore::open(&geoip_path).unwrap());
        let db_path = dir.path().join("proxy.db");
        let store = ProxyStore::open(&db_path, geoip).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn create_then_get_round_trips_with_geo_fields() {
        let (_dir, store) = fixture_store().await;
        assert!(!store.proxy_exists("8.8.8.8", 8080).await.unwrap());

        let created = store.create_proxy("8.8.8.8", 8080).await.unwrap();
        assert!(created.is_active);
        assert_eq!(created.country, "US");
        assert_eq!(created.score, 0.0);

        let fetched = store.get_proxy("8.8.8.8", 8080).await.unwrap().unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn set_inactive_preserves_the_original_transition_time() {
        let (_dir, store) = fixture_store().await;
        store.create_proxy("8.8.8.8", 8080).await.unwrap();

        store.set_proxy_inactive("8.8.8.8", 8080).await.unwrap();
        let first = store.get_proxy("8.8.8.8", 8080).await.unwrap().unwrap();
        let first_inactive_since = first.inactive_since.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store.set_proxy_inactive("8.8.8.8", 8080).await.unwrap();
        let second = store.get_proxy("8.8.8.8", 8080).await.unwrap().unwrap();

        assert_eq!(second.inactive_since.unwrap(), first_inactive_since);
        assert!(!second.is_active);
    }

    #[tokio::test]
    async fn set_active_clears_inactive_since() {
        let (_dir, store) = fixture_store().await;
        store.create_proxy("8.8.8.8", 8080).await.unwrap();
        store.set_proxy_inactive("8.8.8.8", 8080).await.unwrap();

        store.set_proxy_active("8.8.8.8", 8080).await.unwrap();
        let proxy = store.get_proxy("8.8.8.8", 8080).await.unwrap().unwrap();
        assert!(proxy.is_active);
        assert!(proxy.inactive_since.is_none());
    }

    #[tokio::test]
    async fn score_up_and_down_stay_in_bounds_and_match_the_closed_form() {
        let (_dir, store) = fixture_store().await;
        store.create_proxy("8.8.8.8", 8080).await.unwrap();

        for _ in 0..3 {
            store.score_up_proxy("8.8.8.8", 8080).await.unwrap();
        }
        let proxy = store.get_proxy("8.8.8.8", 8080).await.unwrap().unwrap();
        assert!((proxy.score - 0.578125).abs() < 1e-9);

        store.score_down_proxy("8.8.8.8", 8080).await.unwrap();
        let proxy = store.get_proxy("8.8.8.8", 8080).await.unwrap().unwrap();
        assert!((proxy.score - 0.4335938).abs() < 1e-6);
    }

    #[tokio::test]
    async fn list_active_and_inactive_partition_correctly() {
        let (_dir, store) = fixture_store().await;
        store.create_proxy("8.8.8.8", 8080).await.unwrap();
        store.create_proxy("8.8.4.4", 3128).await.unwrap();
        store.set_proxy_inactive("8.8.4.4", 3128).await.unwrap();

        assert_eq!(store.list_active_proxies().await.unwrap().len(), 1);
        assert_eq!(store.list_inactive_proxies().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn nodes_default_to_inactive_and_are_never_deleted_by_this_api() {
        let (_dir, store) = fixture_store().await;
        let node = store.create_node("http://peer.example/").await.unwrap();
        assert!(!node.is_active);
        assert!(store.node_exists("http://peer.example/").await.unwrap());

        store.set_node_active("http://peer.example/").await.unwrap();
        assert_eq!(store.list_active_nodes().await.unwrap().len(), 1);
    }
}
