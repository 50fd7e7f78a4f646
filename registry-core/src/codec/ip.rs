use crate::error::{RegistryError, Result};

/// Encodes a dotted-quad IPv4 address as 4 octets, in textual order.
pub fn ip_to_bytes(ip: &str) -> Result<[u8; 4]> {
    let mut out = [0u8; 4];
    let mut parts = ip.split('.');
    for slot in out.iter_mut() {
        let part = parts.next().ok_or_else(|| RegistryError::InvalidIp(ip.to_string()))?;
        *slot = part.parse::<u8>().map_err(|_| RegistryError::InvalidIp(ip.to_string()))?;
    }
    if parts.next().is_some() {
        return Err(RegistryError::InvalidIp(ip.to_string()));
    }
    Ok(out)
}

/// Decodes 4 octets back to dotted-quad text.
pub fn ip_from_bytes(bytes: &[u8; 4]) -> String {
    bytes.iter().map(u8::to_string).collect::<Vec<_>>().join(".")
}

/// Encodes a dotted-quad IPv4 address as a big-endian 32-bit integer:
/// `a*2^24 + b*2^16 + c*2^8 + d`.
pub fn ip_to_int(ip: &str) -> Result<u32> {
    let bytes = ip_to_bytes(ip)?;
    Ok(u32::from_be_bytes(bytes))
}

/// Decodes a network-order integer back to dotted-quad text.
pub fn int_to_ip(value: u32) -> String {
    ip_from_bytes(&value.to_be_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_valid_addresses() {
        for ip in ["0.0.0.0", "255.255.255.255", "192.168.0.1", "8.8.8.8"] {
            let bytes = ip_to_bytes(ip).unwrap();
            assert_eq!(ip_from_bytes(&bytes), ip);
        }
    }

    #[test]
    fn ip_to_int_matches_known_value() {
        assert_eq!(ip_to_int("192.168.0.1").unwrap(), 3232235521);
        assert_eq!(int_to_ip(3232235521), "192.168.0.1");
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(ip_to_bytes("1.2.3").is_err());
        assert!(ip_to_bytes("1.2.3.4.5").is_err());
        assert!(ip_to_bytes("1.2.3.256").is_err());
        assert!(ip_to_bytes("not.an.ip.addr").is_err());
    }
}
