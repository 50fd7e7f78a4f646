//! The read-only query surface over active proxies: filter, optionally
//! sort by score, truncate, and format as either `host:port` lines or
//! JSON records.

use serde::Serialize;

use crate::store::Proxy;

#[derive(Debug, Default, Clone)]
pub struct QueryFilter {
    pub count: Option<usize>,
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub min_score: Option<f64>,
    pub ordered: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Plain,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ProxyRecord {
    pub host: String,
    pub port: i64,
    pub country: String,
    pub region: String,
    pub city: String,
    pub score: f64,
}

impl From<&Proxy> for ProxyRecord {
    fn from(proxy: &Proxy) -> Self {
        Self {
            host: proxy.host.clone(),
            port: proxy.port,
            country: proxy.country.clone(),
            region: proxy.region.clone(),
            city: proxy.city.clone(),
            score: proxy.score,
        }
    }
}

/// Applies `filter` to `proxies` (assumed already restricted to active
/// ones by the caller). Filter predicates may run in any order; `country`
/// is matched case-insensitively against the upper-cased stored value;
/// `ordered` sorts by score descending before `count` truncates.
pub fn filter_proxies(proxies: &[Proxy], filter: &QueryFilter) -> Vec<ProxyRecord> {
    let mut matched: Vec<&Proxy> = proxies
        .iter()
        .filter(|p| {
            filter.country.as_deref().is_none_or(|c| p.country.eq_ignore_ascii_case(c))
                && filter.region.as_deref().is_none_or(|r| p.region.eq_ignore_ascii_case(r))
                && filter.city.as_deref().is_none_or(|c| p.city.eq_ignore_ascii_case(c))
                && filter.min_score.is_none_or(|min| p.score >= min)
        })
        .collect();

    if filter.ordered {
        matched.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    }

    if let Some(count) = filter.count {
        matched.truncate(count);
    }

    matched.into_iter().map(ProxyRecord::from).collect()
}

pub fn format_json(records: &[ProxyRecord]) -> serde_json::Value {
    serde_json::json!({ "result": records })
}

pub fn format_plain(records: &[ProxyRecord]) -> String {
    records.iter().map(|r| format!("{}:{}", r.host, r.port)).collect::<Vec<_>>().join("\n")
}
