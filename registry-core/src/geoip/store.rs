use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use memmap2::{Mmap, MmapOptions};

use crate::codec::{ip_to_bytes, str_from_bytes};
use crate::error::{RegistryError, Result};
use crate::geoip::block::{GeoBlock, BLOCK_SIZE};
use crate::search::binary_search_by_len;

/// The three fields a query actually needs — the rest of the block
/// (continent, lat/lon) isn't surfaced by `get_info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoInfo {
    pub country: String,
    pub region: String,
    pub city: String,
}

/// A memory-mapped, binary-searchable GeoIP table.
///
/// The file is opened and mapped once; lookups are byte-slice reads over
/// the mapping, which needs no `seek`/`read` serialization across threads
/// the way a plain file handle would — every reader gets its own view of
/// the same pages.
pub struct GeoIpStore {
    map: Mmap,
    block_count: usize,
}

impl GeoIpStore {
    /// Opens and maps the GeoIP file at `path`. The file size must be a
    /// multiple of [`BLOCK_SIZE`]; this is not re-validated on every query.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        // SAFETY: mapping a file we just opened read-only; the file is not
        // expected to be truncated or rewritten while the store is live.
        let map = unsafe { MmapOptions::new().map(&file)? };
        let block_count = map.len() / BLOCK_SIZE;
        Ok(Self { map, block_count })
    }

    pub fn block_count(&self) -> usize {
        self.block_count
    }

    fn block_bytes(&self, index: usize) -> &[u8] {
        let start = index * BLOCK_SIZE;
        &self.map[start..start + BLOCK_SIZE]
    }

    /// Looks up the geo fields for `ip`. Returns `None` if `ip` falls
    /// outside every range in the table (it sorts past the last block and
    /// the table is empty, or the query is unreachable by any block).
    pub fn get_info(&self, ip: &str) -> Result<Option<GeoInfo>> {
        if self.block_count == 0 {
            return Ok(None);
        }
        let ip_bytes = ip_to_bytes(ip)?;
        let idx = binary_search_by_len(self.block_count, ip_bytes, |i| {
            let bytes = self.block_bytes(i);
            [bytes[4], bytes[5], bytes[6], bytes[7]]
        });
        // If the query sorts past every ip_to, fall back to the last block
        // rather than reporting unknown — matches the source behavior when
        // the table is non-empty.
        let idx = if idx >= self.block_count { self.block_count - 1 } else { idx };
        let bytes = self.block_bytes(idx);
        Ok(Some(GeoInfo {
            country: str_from_bytes(&bytes[10..12]),
            region: str_from_bytes(&bytes[12..52]),
            city: str_from_bytes(&bytes[52..132]),
        }))
    }

    /// Decodes the full block at `index`, mostly useful for tests and
    /// tooling rather than the hot query path.
    pub fn block_at(&self, index: usize) -> Option<GeoBlock> {
        if index >= self.block_count {
            return None;
        }
        Some(GeoBlock::decode(self.block_bytes(index)))
    }
}

static GLOBAL: OnceLock<GeoIpStore> = OnceLock::new();

/// Initializes the process-wide GeoIP store from `path`. Safe to call from
/// multiple threads; only the first call's path takes effect, matching the
/// source's lazy-singleton semantics. Returns an error if opening the file
/// fails; a later `global()` call will then report it as uninitialized.
pub fn init_global<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref().to_path_buf();
    let store = GeoIpStore::open(&path)?;
    // `set` fails if another thread won the race; that's fine, both opened
    // the same file and either copy is equally valid to have installed.
    let _ = GLOBAL.set(store);
    Ok(())
}

/// Returns the process-wide GeoIP store, if [`init_global`] has run.
pub fn global() -> Result<&'static GeoIpStore> {
    GLOBAL.get().ok_or_else(|| RegistryError::GeoIpNotInitialized(unresolved_path()))
}

fn unresolved_path() -> String {
    PathBuf::from("<uninitialized>").display().to_string()
}
