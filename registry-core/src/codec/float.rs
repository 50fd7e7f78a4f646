/// Packs an `f64` as 8 bytes in host (native) endianness, matching the
/// on-disk GeoIP block layout.
pub fn float_to_bytes(value: f64) -> [u8; 8] {
    value.to_ne_bytes()
}

/// Unpacks 8 bytes in host endianness back to an `f64`.
pub fn float_from_bytes(bytes: &[u8; 8]) -> f64 {
    f64::from_ne_bytes(*bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_finite_values() {
        for value in [0.0, -0.0, 1.0, -1.0, 48.8566, -122.4194, f64::MIN, f64::MAX] {
            let packed = float_to_bytes(value);
            assert_eq!(float_from_bytes(&packed).to_bits(), value.to_bits());
        }
    }
}
