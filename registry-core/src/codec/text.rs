use crate::error::{RegistryError, Result};

/// Right-pads `s` with NUL bytes to exactly `limit` bytes.
///
/// Fails with [`RegistryError::EncodingTooLong`] rather than truncating —
/// silently dropping characters from a country/region/city name would
/// corrupt the GeoIP table in a way binary search can't detect later.
pub fn str_to_bytes(s: &str, limit: usize) -> Result<Vec<u8>> {
    let bytes = s.as_bytes();
    if bytes.len() > limit {
        return Err(RegistryError::EncodingTooLong { limit });
    }
    let mut out = vec![0u8; limit];
    out[..bytes.len()].copy_from_slice(bytes);
    Ok(out)
}

/// Decodes a NUL-padded field, stopping at the first NUL byte.
pub fn str_from_bytes(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_within_limit() {
        let packed = str_to_bytes("US", 2).unwrap();
        assert_eq!(str_from_bytes(&packed), "US");

        let packed = str_to_bytes("California", 40).unwrap();
        assert_eq!(packed.len(), 40);
        assert_eq!(str_from_bytes(&packed), "California");
    }

    #[test]
    fn empty_string_round_trips() {
        let packed = str_to_bytes("", 10).unwrap();
        assert_eq!(packed, vec![0u8; 10]);
        assert_eq!(str_from_bytes(&packed), "");
    }

    #[test]
    fn overflow_is_rejected() {
        let err = str_to_bytes("too long for the field", 4).unwrap_err();
        assert!(matches!(err, RegistryError::EncodingTooLong { limit: 4 }));
    }
}
