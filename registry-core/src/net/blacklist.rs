use std::fs;
use std::path::Path;

use crate::codec::ip_to_int;
use crate::error::{RegistryError, Result};
use crate::net::Net;
use crate::search::binary_search;

/// An ordered, presumed-disjoint set of [`Net`] ranges. Membership is
/// answered in `O(log n)` by finding the first net whose `int_to` is at
/// least the query IP and checking only that one net — correct as long as
/// the ranges really are disjoint, which the caller (`add`/`from_file`) is
/// responsible for maintaining.
#[derive(Debug, Default, Clone)]
pub struct NetBlacklist {
    nets: Vec<Net>,
}

impl NetBlacklist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `cidr` and inserts it, keeping the internal list sorted by
    /// `int_from`.
    pub fn add(&mut self, cidr: &str) -> Result<()> {
        let net = Net::from_cidr(cidr)?;
        let idx = binary_search(&self.nets, net.int_from, |n| n.int_from);
        self.nets.insert(idx, net);
        Ok(())
    }

    /// Whether `ip` falls inside any stored net.
    pub fn contains(&self, ip: &str) -> Result<bool> {
        let ip_int = ip_to_int(ip)?;
        let idx = binary_search(&self.nets, ip_int, |n| n.int_to);
        Ok(self.nets.get(idx).is_some_and(|net| net.contains(ip_int)))
    }

    /// Total number of addresses covered across all stored nets.
    pub fn len(&self) -> u64 {
        self.nets.iter().map(Net::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.nets.is_empty()
    }

    /// Builds a blacklist from a file with one CIDR per line (blank lines
    /// ignored). A malformed line fails with the offending line number
    /// rather than silently skipping it.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let mut blacklist = Self::new();
        for (idx, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            blacklist.add(line).map_err(|e| RegistryError::BlacklistParse {
                path: path.display().to_string(),
                line: idx + 1,
                message: e.to_string(),
            })?;
        }
        Ok(blacklist)
    }
}
