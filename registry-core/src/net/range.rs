use std::str::FromStr;

use ipnet::Ipv4Net;

use crate::error::{RegistryError, Result};

/// A closed interval `[int_from, int_to]` of 32-bit IPv4 addresses, derived
/// from a CIDR by masking the base address to the prefix length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Net {
    pub int_from: u32,
    pub int_to: u32,
}

impl Net {
    /// Parses a CIDR such as `"192.168.0.1/24"` into its address range.
    pub fn from_cidr(cidr: &str) -> Result<Self> {
        let cidr = cidr.trim();
        let net = Ipv4Net::from_str(cidr).map_err(|_| RegistryError::InvalidCidr(cidr.to_string()))?;
        Ok(Self { int_from: u32::from(net.network()), int_to: u32::from(net.broadcast()) })
    }

    /// Number of addresses covered by this range.
    pub fn len(&self) -> u64 {
        u64::from(self.int_to) - u64::from(self.int_from) + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Whether `ip` (as a network-order integer) falls within this range.
    pub fn contains(&self, ip: u32) -> bool {
        ip >= self.int_from && ip <= self.int_to
    }
}
