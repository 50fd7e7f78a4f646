use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use regex::Regex;

use crate::error::Result;
use crate::geoip::block::GeoBlock;

/// Matches the dotted-quad shape of an IPv4 address in the CSV `ip_from`
/// column. Rows that don't match (IPv6 ranges, mostly) are silently
/// skipped, matching the upstream builder's behavior.
fn ipv4_shape() -> Regex {
    Regex::new(r"^\d{0,3}(\.\d{0,3}){3}$").expect("static regex is valid")
}

/// Builds the on-disk GeoIP table from a CSV source with columns
/// `ip_from, ip_to, continent, country, region, city, latitude, longitude`.
///
/// The real source this targets (db-ip city-lite) is headerless, so every
/// row is read as data — the `ip_from` regex is the only skip mechanism,
/// matching the original builder. A stray header line is simply a row
/// whose `ip_from` doesn't look like an IPv4 address, and falls out the
/// same way.
///
/// Rows are written in input order — the builder trusts the source is
/// already sorted ascending by `ip_to` and does not re-sort. A row whose
/// `region`/`city` is too long to fit its fixed field fails the whole
/// build rather than silently truncating it.
pub fn prepare_geoip_db<R: std::io::Read, P: AsRef<Path>>(csv_source: R, out_path: P) -> Result<usize> {
    let shape = ipv4_shape();
    let mut reader = csv::ReaderBuilder::new().has_headers(false).from_reader(csv_source);
    let file = File::create(out_path)?;
    let mut writer = BufWriter::new(file);

    let mut written = 0usize;
    for record in reader.records() {
        let record = record?;
        let ip_from = record.get(0).unwrap_or_default();
        if !shape.is_match(ip_from) {
            continue;
        }
        let block = GeoBlock {
            ip_from: ip_from.to_string(),
            ip_to: record.get(1).unwrap_or_default().to_string(),
            continent: record.get(2).unwrap_or_default().to_string(),
            country: record.get(3).unwrap_or_default().to_string(),
            region: record.get(4).unwrap_or_default().to_string(),
            city: record.get(5).unwrap_or_default().to_string(),
            latitude: record.get(6).unwrap_or_default().parse().unwrap_or(0.0),
            longitude: record.get(7).unwrap_or_default().parse().unwrap_or(0.0),
        };
        let encoded = block.encode()?;
        writer.write_all(&encoded)?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}
