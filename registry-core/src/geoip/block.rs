use crate::codec::{float_from_bytes, float_to_bytes, ip_from_bytes, ip_to_bytes, str_from_bytes, str_to_bytes};
use crate::error::Result;

/// On-disk row: 148 bytes, see the offset table in the data model.
pub const BLOCK_SIZE: usize = 148;

const CONTINENT_LEN: usize = 2;
const COUNTRY_LEN: usize = 2;
const REGION_LEN: usize = 40;
const CITY_LEN: usize = 80;

/// A single GeoIP range with its location fields, decoded from (or destined
/// for) a 148-byte block.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoBlock {
    pub ip_from: String,
    pub ip_to: String,
    pub continent: String,
    pub country: String,
    pub region: String,
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoBlock {
    /// Serializes this block into its fixed-width on-disk form.
    pub fn encode(&self) -> Result<[u8; BLOCK_SIZE]> {
        let mut buf = [0u8; BLOCK_SIZE];
        buf[0..4].copy_from_slice(&ip_to_bytes(&self.ip_from)?);
        buf[4..8].copy_from_slice(&ip_to_bytes(&self.ip_to)?);
        buf[8..10].copy_from_slice(&str_to_bytes(&self.continent, CONTINENT_LEN)?);
        buf[10..12].copy_from_slice(&str_to_bytes(&self.country, COUNTRY_LEN)?);
        buf[12..52].copy_from_slice(&str_to_bytes(&self.region, REGION_LEN)?);
        buf[52..132].copy_from_slice(&str_to_bytes(&self.city, CITY_LEN)?);
        buf[132..140].copy_from_slice(&float_to_bytes(self.latitude));
        buf[140..148].copy_from_slice(&float_to_bytes(self.longitude));
        Ok(buf)
    }

    /// Parses a 148-byte block back into its fields.
    pub fn decode(bytes: &[u8]) -> Self {
        debug_assert_eq!(bytes.len(), BLOCK_SIZE);
        let ip_from = ip_from_bytes(&[bytes[0], bytes[1], bytes[2], bytes[3]]);
        let ip_to = ip_from_bytes(&[bytes[4], bytes[5], bytes[6], bytes[7]]);
        let continent = str_from_bytes(&bytes[8..10]);
        let country = str_from_bytes(&bytes[10..12]);
        let region = str_from_bytes(&bytes[12..52]);
        let city = str_from_bytes(&bytes[52..132]);
        let latitude = float_from_bytes(&bytes[132..140].try_into().expect("8-byte slice"));
        let longitude = float_from_bytes(&bytes[140..148].try_into().expect("8-byte slice"));
        Self { ip_from, ip_to, continent, country, region, city, latitude, longitude }
    }

    /// The `ip_to` field as a big-endian-comparable integer, used as the
    /// binary search key.
    pub fn ip_to_int(bytes: &[u8]) -> u32 {
        u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_encode_decode() {
        let block = GeoBlock {
            ip_from: "1.0.0.0".into(),
            ip_to: "1.0.0.255".into(),
            continent: "AS".into(),
            country: "CN".into(),
            region: "Fujian".into(),
            city: "Fuzhou".into(),
            latitude: 26.0614,
            longitude: 119.3061,
        };
        let encoded = block.encode().unwrap();
        assert_eq!(encoded.len(), BLOCK_SIZE);
        assert_eq!(GeoBlock::decode(&encoded), block);
    }

    #[test]
    fn ip_to_int_matches_the_decoded_field() {
        let block = GeoBlock {
            ip_from: "10.0.0.0".into(),
            ip_to: "10.0.0.255".into(),
            continent: "NA".into(),
            country: "US".into(),
            region: String::new(),
            city: String::new(),
            latitude: 0.0,
            longitude: 0.0,
        };
        let encoded = block.encode().unwrap();
        assert_eq!(GeoBlock::ip_to_int(&encoded), crate::codec::ip_to_int("10.0.0.255").unwrap());
    }
}
