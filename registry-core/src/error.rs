use thiserror::Error;

/// Errors that can occur anywhere in the registry core.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("the GeoIP store at '{0}' was not initialized before use")]
    GeoIpNotInitialized(String),

    #[error("invalid CIDR '{0}'")]
    InvalidCidr(String),

    #[error("invalid IPv4 address '{0}'")]
    InvalidIp(String),

    #[error("invalid URL '{0}'")]
    InvalidUrl(String),

    #[error("blacklist file '{path}' line {line}: {message}")]
    BlacklistParse { path: String, line: usize, message: String },

    #[error("encoded string is longer than the {limit}-byte field")]
    EncodingTooLong { limit: usize },
}

pub type Result<T> = std::result::Result<T, RegistryError>;
