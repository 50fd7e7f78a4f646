use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// An entry in the proxy registry. Identity is `(host, port)`.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Proxy {
    pub host: String,
    pub port: i64,
    pub created_at: DateTime<Utc>,
    pub last_check_at: DateTime<Utc>,
    pub inactive_since: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub country: String,
    pub region: String,
    pub city: String,
    pub score: f64,
}

impl Proxy {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// A peer instance of this service. Identity is `url`.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Node {
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub last_check_at: Option<DateTime<Utc>>,
    pub inactive_since: Option<DateTime<Utc>>,
    pub is_active: bool,
}

/// `score_up`/`score_down` move the EWMA by this factor each call — a
/// successful check moves a quarter of the way to 1, a failed one a
/// quarter of the way to 0.
pub const SCORE_ALPHA: f64 = 0.25;

/// `score <- score*(1-alpha) + alpha`, the EWMA step toward 1.
pub fn score_up(score: f64) -> f64 {
    score * (1.0 - SCORE_ALPHA) + SCORE_ALPHA
}

/// `score <- score*(1-alpha)`, the EWMA step toward 0.
pub fn score_down(score: f64) -> f64 {
    score * (1.0 - SCORE_ALPHA)
}
