//! The HTTP query API (spec §6) and the peer-sync endpoints it serves to
//! other instances. A thin adapter over the core engines in
//! `registry-core`, wired up with `hyper` + `hyper-util` the way the
//! teacher's `proxy::server` runs its own accept loop.

use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use registry_core::error::Result;
use registry_core::query::{filter_proxies, format_json, format_plain, Format, QueryFilter};
use registry_core::store::ProxyStore;
use registry_core::validator::{HttpValidator, Validator};
use tokio::net::TcpListener;
use tracing::{info, warn};

pub type Body = Full<Bytes>;

pub struct AppState {
    pub store: ProxyStore,
    pub try_url: String,
    pub instance_url: Option<String>,
    pub version: &'static str,
}

pub async fn serve(addr: std::net::SocketAddr, state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "http api listening");

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(err) => {
                warn!(%err, "failed to accept http connection");
                continue;
            }
        };
        let io = TokioIo::new(stream);
        let state = state.clone();

        tokio::spawn(async move {
            let service = hyper::service::service_fn(move |req| {
                let state = state.clone();
                async move { Ok::<_, Infallible>(route(req, state).await) }
            });
            if let Err(err) = ConnBuilder::new(TokioExecutor::new()).serve_connection(io, service).await {
                warn!(%peer, %err, "http connection closed with error");
            }
        });
    }
}

async fn route(req: Request<Incoming>, state: Arc<AppState>) -> Response<Body> {
    let path = req.uri().path().to_string();
    let method = req.method().clone();

    match (&method, path.as_str()) {
        (&Method::GET, "/") => redirect("/api/v1/list"),
        (&Method::GET, "/list") => list_proxies(&req, &state).await,
        (&Method::GET, "/version") => json_ok(serde_json::json!({ "version": state.version })),
        (&Method::GET, "/licenses") => json_ok(licenses()),
        (&Method::GET, "/nodes") => list_nodes(&state).await,
        (&Method::POST, "/nodes") => register_node(req, &state).await,
        (&Method::GET, p) if p.starts_with("/check/") => check_proxy(p, &state).await,
        (&Method::GET, p) if p.starts_with("/geo/") => geo_lookup(p, &state).await,
        _ => not_found(),
    }
}

fn redirect(location: &str) -> Response<Body> {
    Response::builder()
        .status(StatusCode::FOUND)
        .header(hyper::header::LOCATION, location)
        .body(Body::new(Bytes::new()))
        .expect("static redirect response is well-formed")
}

fn json_ok(value: serde_json::Value) -> Response<Body> {
    let bytes = Bytes::from(value.to_string());
    Response::builder()
        .status(StatusCode::OK)
        .header(hyper::header::CONTENT_TYPE, "application/json")
        .body(Body::new(bytes))
        .expect("json response is well-formed")
}

fn plain_ok(text: String) -> Response<Body> {
    Response::builder()
        .status(StatusCode::OK)
        .header(hyper::header::CONTENT_TYPE, "text/plain")
        .body(Body::new(Bytes::from(text)))
        .expect("plain response is well-formed")
}

fn not_found() -> Response<Body> {
    Response::builder().status(StatusCode::NOT_FOUND).body(Body::new(Bytes::new())).expect("static 404 is well-formed")
}

fn bad_request(message: &str) -> Response<Body> {
    Response::builder()
        .status(StatusCode::BAD_REQUEST)
        .body(Body::new(Bytes::from(message.to_string())))
        .expect("static 400 is well-formed")
}

fn query_params(req: &Request<Incoming>) -> std::collections::HashMap<String, String> {
    req.uri()
        .query()
        .map(|q| {
            url_decode_form(q).into_iter().collect()
        })
        .unwrap_or_default()
}

/// Minimal `application/x-www-form-urlencoded` parser shared by query
/// strings and the `/nodes` POST body — good enough for the flat
/// `key=value&...` shape this API actually receives.
fn url_decode_form(input: &str) -> Vec<(String, String)> {
    input
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next().unwrap_or_default();
            let value = parts.next().unwrap_or_default();
            (percent_decode(key), percent_decode(value))
        })
        .collect()
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => {
                if let Ok(byte) = u8::from_str_radix(&s[i + 1..i + 3], 16) {
                    out.push(byte);
                    i += 3;
                } else {
                    out.push(bytes[i]);
                    i += 1;
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

async fn list_proxies(req: &Request<Incoming>, state: &AppState) -> Response<Body> {
    let params = query_params(req);
    let filter = QueryFilter {
        count: params.get("count").and_then(|v| v.parse().ok()),
        country: params.get("country").map(|v| v.to_uppercase()),
        region: params.get("region").cloned(),
        city: params.get("city").cloned(),
        min_score: params.get("score").and_then(|v| v.parse().ok()),
        ordered: params.get("ordered").map(|v| v == "true" || v == "1").unwrap_or(false),
    };
    let format = match params.get("format").map(String::as_str) {
        Some("plain") => Format::Plain,
        _ => Format::Json,
    };

    let proxies = match state.store.list_active_proxies().await {
        Ok(proxies) => proxies,
        Err(err) => {
            warn!(%err, "failed to list active proxies");
            return bad_request("store unavailable");
        }
    };
    let records = filter_proxies(&proxies, &filter);

    match format {
        Format::Json => json_ok(format_json(&records)),
        Format::Plain => plain_ok(format_plain(&records)),
    }
}

async fn check_proxy(path: &str, state: &AppState) -> Response<Body> {
    let Some(addr) = path.strip_prefix("/check/") else { return not_found() };
    let Some((host, port_text)) = addr.split_once(':') else {
        return bad_request("expected /check/{host}:{port}");
    };
    let Ok(port) = port_text.parse::<u16>() else {
        return bad_request("port must be a number between 1 and 65535");
    };

    let validator = HttpValidator::new(state.try_url.clone());
    let ok = validator.check(host, port).await;
    json_ok(serde_json::json!({ "host": host, "port": port, "result": ok }))
}

async fn geo_lookup(path: &str, _state: &AppState) -> Response<Body> {
    let Some(host) = path.strip_prefix("/geo/") else { return not_found() };
    let store = match registry_core::geoip::global() {
        Ok(store) => store,
        Err(_) => return bad_request("geoip store not initialized"),
    };
    match store.get_info(host) {
        Ok(Some(info)) => json_ok(serde_json::json!({
            "host": host,
            "geo": { "country": info.country, "region": info.region, "city": info.city },
        })),
        Ok(None) => json_ok(serde_json::json!({ "host": host, "geo": null })),
        Err(_) => bad_request("invalid host"),
    }
}

async fn list_nodes(state: &AppState) -> Response<Body> {
    let nodes = match state.store.list_active_nodes().await {
        Ok(nodes) => nodes,
        Err(err) => {
            warn!(%err, "failed to list active nodes");
            return bad_request("store unavailable");
        }
    };
    let result: Vec<_> = nodes.into_iter().map(|n| serde_json::json!({ "url": n.url })).collect();
    json_ok(serde_json::json!({ "result": result }))
}

async fn register_node(req: Request<Incoming>, state: &AppState) -> Response<Body> {
    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(_) => return bad_request("failed to read request body"),
    };
    let text = String::from_utf8_lossy(&body);
    let params: std::collections::HashMap<_, _> = url_decode_form(&text).into_iter().collect();
    let Some(url) = params.get("url") else { return bad_request("missing 'url' form field") };

    let Ok(normalized) = registry_core::peer::normalize_node_url(url) else {
        return bad_request("invalid node url");
    };
    match state.store.node_exists(&normalized).await {
        Ok(true) => {}
        Ok(false) => {
            if let Err(err) = state.store.create_node(&normalized).await {
                warn!(%err, "failed to record self-announced node");
                return bad_request("failed to record node");
            }
        }
        Err(err) => {
            warn!(%err, "failed to check node existence");
            return bad_request("store unavailable");
        }
    }
    json_ok(serde_json::json!({ "url": normalized }))
}

fn licenses() -> serde_json::Value {
    serde_json::json!({
        "project": "registry-cli",
        "license": "MIT OR Apache-2.0",
    })
}
