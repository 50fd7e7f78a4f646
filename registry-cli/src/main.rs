#![forbid(unsafe_code)]

//! The `registryd` binary: a thin CLI and process wrapper over
//! `registry-core`. Subcommands cover the one-off maintenance jobs
//! (`prepare-geoip-db`, `add-nodes`), running a single lifecycle task by
//! hand (`run-task`), and starting the full daemon (`serve`) — the
//! scheduler and the HTTP query API sharing one process.

mod http;

use std::io::Read as _;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use registry_core::config::Settings;
use registry_core::discovery::ProxySearcher;
use registry_core::error::{RegistryError, Result};
use registry_core::geoip::{self, GeoIpStore};
use registry_core::net::NetBlacklist;
use registry_core::peer::PeerClient;
use registry_core::scheduler::Scheduler;
use registry_core::store::ProxyStore;
use registry_core::tasks::{ProxySearchTask, SyncNodesTask, UpdateActiveProxyTask, UpdateInactiveProxyTask};
use registry_core::telemetry::init_tracing;
use registry_core::validator::HttpValidator;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(author, version, about = "Self-replenishing registry of open HTTP proxies")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Builds the GeoIP binary store, either from a downloaded CSV or one
    /// piped in on stdin.
    PrepareGeoipDb {
        /// Where to write the binary store. Defaults to `GEOIP_DB_PATH`.
        #[arg(long)]
        path: Option<PathBuf>,
        /// CSV source to download. If omitted, the CSV is read from stdin.
        #[arg(long)]
        url: Option<String>,
    },
    /// Seeds peer nodes from a file of one URL per line.
    AddNodes {
        /// Defaults to `NODES_INIT_PATH`.
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Runs a single lifecycle task in this process until it exits (a
    /// one-shot task returns when its loop ends; a periodic task runs
    /// `handle`/`sleep` forever).
    RunTask {
        #[arg(long, value_enum)]
        task: TaskName,
    },
    /// Starts the periodic-task scheduler and the HTTP query API together.
    Serve {
        #[arg(long, default_value = "0.0.0.0:8000")]
        listen: std::net::SocketAddr,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum TaskName {
    ProxySearch,
    UpdateActiveProxy,
    UpdateInactiveProxy,
    SyncNodes,
}

#[tokio::main]
async fn main() {
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("configuration error: {err}");
            std::process::exit(1);
        }
    };
    init_tracing(&settings.log_level);

    let cli = Cli::parse();
    let result = match cli.command {
        Command::PrepareGeoipDb { path, url } => prepare_geoip_db(&settings, path, url).await,
        Command::AddNodes { path } => add_nodes(&settings, path).await,
        Command::RunTask { task } => run_task(&settings, task).await,
        Command::Serve { listen } => serve(settings, listen).await,
    };

    if let Err(err) = result {
        error!(%err, "command failed");
        std::process::exit(1);
    }
}

async fn prepare_geoip_db(settings: &Settings, path: Option<PathBuf>, url: Option<String>) -> Result<()> {
    let out_path = path.unwrap_or_else(|| settings.geoip_db_path.clone());
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let written = match url.or_else(|| settings.geoip_db_download_url.clone()) {
        Some(url) => {
            info!(%url, "downloading geoip csv source");
            let bytes = reqwest::get(&url).await?.bytes().await?;
            geoip::prepare_geoip_db(bytes.as_ref(), &out_path)?
        }
        None => {
            info!("reading geoip csv source from stdin");
            let mut buf = Vec::new();
            std::io::stdin().read_to_end(&mut buf)?;
            geoip::prepare_geoip_db(buf.as_slice(), &out_path)?
        }
    };

    info!(blocks = written, path = %out_path.display(), "geoip store built");
    Ok(())
}

async fn add_nodes(settings: &Settings, path: Option<PathBuf>) -> Result<()> {
    let path = path
        .or_else(|| settings.nodes_init_path.clone())
        .ok_or_else(|| RegistryError::Config("add-nodes requires --path or NODES_INIT_PATH".to_string()))?;

    let geoip = open_geoip(settings)?;
    let store = ProxyStore::open(&settings.proxy_db_path, geoip).await?;

    let text = std::fs::read_to_string(&path)?;
    let mut added = 0;
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let url = registry_core::peer::normalize_node_url(line)?;
        if !store.node_exists(&url).await? {
            store.create_node(&url).await?;
            added += 1;
        }
    }
    info!(added, path = %path.display(), "seeded peer nodes");
    Ok(())
}

async fn run_task(settings: &Settings, task: TaskName) -> Result<()> {
    let geoip = open_geoip(settings)?;
    let store = ProxyStore::open(&settings.proxy_db_path, geoip).await?;
    let validator: Arc<dyn registry_core::validator::Validator> = Arc::new(HttpValidator::new(settings.try_url.clone()));

    match task {
        TaskName::ProxySearch => {
            use registry_core::scheduler::Task;
            let blacklist = open_blacklist(settings)?;
            let searcher = Arc::new(ProxySearcher::new(settings.proxy_search_threads, blacklist, validator));
            ProxySearchTask::new(searcher, store).run().await;
        }
        TaskName::UpdateActiveProxy => {
            use registry_core::scheduler::PeriodicTask;
            UpdateActiveProxyTask::new(store, validator, settings.proxy_search_threads).handle().await;
        }
        TaskName::UpdateInactiveProxy => {
            use registry_core::scheduler::PeriodicTask;
            UpdateInactiveProxyTask::new(store, validator, settings.proxy_search_threads).handle().await;
        }
        TaskName::SyncNodes => {
            use registry_core::scheduler::PeriodicTask;
            let client = PeerClient::new(reqwest::Client::new(), settings.instance_url.clone());
            SyncNodesTask::new(store, client).handle().await;
        }
    }
    Ok(())
}

async fn serve(settings: Settings, listen: std::net::SocketAddr) -> Result<()> {
    let geoip = open_geoip(&settings)?;
    let store = ProxyStore::open(&settings.proxy_db_path, geoip).await?;
    let validator: Arc<dyn registry_core::validator::Validator> = Arc::new(HttpValidator::new(settings.try_url.clone()));
    let blacklist = open_blacklist(&settings)?;

    let mut scheduler = Scheduler::new();
    let searcher = Arc::new(ProxySearcher::new(settings.proxy_search_threads, blacklist, validator.clone()));
    scheduler.register(Arc::new(ProxySearchTask::new(searcher, store.clone())));
    scheduler.register_periodic(Arc::new(UpdateActiveProxyTask::new(
        store.clone(),
        validator.clone(),
        settings.proxy_search_threads,
    )));
    scheduler.register_periodic(Arc::new(UpdateInactiveProxyTask::new(
        store.clone(),
        validator,
        settings.proxy_search_threads,
    )));
    let peer_client = PeerClient::new(reqwest::Client::new(), settings.instance_url.clone());
    scheduler.register_periodic(Arc::new(SyncNodesTask::new(store.clone(), peer_client)));

    let state = Arc::new(http::AppState {
        store,
        try_url: settings.try_url.clone(),
        instance_url: settings.instance_url.clone(),
        version: env!("CARGO_PKG_VERSION"),
    });

    let scheduler_handle = tokio::spawn(scheduler.run());
    let http_result = http::serve(listen, state).await;

    scheduler_handle.abort();
    http_result
}

fn open_geoip(settings: &Settings) -> Result<Arc<GeoIpStore>> {
    let store = GeoIpStore::open(&settings.geoip_db_path)?;
    geoip::init_global(&settings.geoip_db_path)?;
    Ok(Arc::new(store))
}

fn open_blacklist(settings: &Settings) -> Result<Option<Arc<NetBlacklist>>> {
    match &settings.net_blacklist_path {
        Some(path) => {
            let blacklist = NetBlacklist::from_file(path)?;
            info!(entries = blacklist.len(), path = %path.display(), "loaded network blacklist");
            Ok(Some(Arc::new(blacklist)))
        }
        None => {
            warn!("no NET_BLACKLIST configured; discovery will probe every address");
            Ok(None)
        }
    }
}
