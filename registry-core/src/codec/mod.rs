//! Fixed-width byte codecs shared by the GeoIP store and the net blacklist.
//!
//! Every codec here is a total function over well-formed input and a
//! `RegistryError` over malformed input: no panics, no silent truncation.

mod float;
mod ip;
mod text;

pub use float::{float_from_bytes, float_to_bytes};
pub use ip::{int_to_ip, ip_from_bytes, ip_to_bytes, ip_to_int};
pub use text::{str_from_bytes, str_to_bytes};
