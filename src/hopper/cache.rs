//! Two-tier string cache.
//!
//! Enumerating strings is the slowest call the host offers, so results are
//! kept per segment in memory and mirrored to a JSON file next to the
//! document's database (`<database>.mcpcache`):
//!
//! ```json
//! {
//!   "strings_cache_v1": {
//!     "__TEXT_1040f0000": [[4373446656, "Hello World"]]
//!   }
//! }
//! ```
//!
//! Entries are all-or-nothing: a key maps to every string of its segment in
//! host order. Disk failures never surface; a missing or unreadable file is
//! treated as an empty disk tier.

use crate::error::ToolError;
use crate::hopper::host::{Address, StringRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const CACHE_SUFFIX: &str = ".mcpcache";

type Entries = BTreeMap<String, Vec<StringRecord>>;

#[derive(Serialize, Deserialize)]
struct CacheFile {
    strings_cache_v1: Entries,
}

#[derive(Serialize)]
struct CacheFileRef<'a> {
    strings_cache_v1: &'a Entries,
}

/// A segment as far as the cache is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedSegment {
    /// Host segment index; opaque to the cache.
    pub index: usize,
    pub name: String,
    pub start: Address,
    pub string_count: usize,
}

impl CachedSegment {
    pub fn cache_key(&self) -> String {
        cache_key(&self.name, self.start)
    }
}

pub fn cache_key(name: &str, start: Address) -> String {
    format!("{name}_{start:x}")
}

/// Where the strings of one document come from.
pub trait StringSource {
    /// Database path of the document, `None` while unsaved.
    fn database_path(&self) -> Option<PathBuf>;
    fn segments(&self) -> Vec<CachedSegment>;
    fn enumerate(&self, segment: &CachedSegment) -> Result<Vec<StringRecord>, ToolError>;
}

pub fn cache_file_path(database: &Path) -> PathBuf {
    let mut raw = OsString::from(database.as_os_str());
    raw.push(CACHE_SUFFIX);
    PathBuf::from(raw)
}

fn load_disk(database: Option<&Path>) -> Entries {
    let Some(database) = database else {
        return Entries::new();
    };
    let path = cache_file_path(database);
    let text = match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "No string cache on disk");
            return Entries::new();
        }
    };
    match serde_json::from_str::<CacheFile>(&text) {
        Ok(file) => file.strings_cache_v1,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring unreadable string cache");
            Entries::new()
        }
    }
}

fn store_disk(database: Option<&Path>, entries: &Entries) -> bool {
    let Some(database) = database else {
        debug!("Document has no database path, string cache not persisted");
        return false;
    };
    let path = cache_file_path(database);
    let text = match serde_json::to_string_pretty(&CacheFileRef {
        strings_cache_v1: entries,
    }) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "Failed to encode string cache");
            return false;
        }
    };
    match std::fs::write(&path, text) {
        Ok(()) => {
            debug!(path = %path.display(), segments = entries.len(), "Wrote string cache");
            true
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to write string cache");
            false
        }
    }
}

/// Memory tier of the cache plus the rules for consulting the disk tier.
#[derive(Debug, Default)]
pub struct StringCache {
    memory: Entries,
}

impl StringCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Strings of `segment`, served from memory, then disk, then the host.
    ///
    /// The disk tier is bulk-loaded only while memory is empty. A full miss
    /// enumerates the segment and rewrites the whole memory tier to disk.
    pub fn get<S: StringSource + ?Sized>(
        &mut self,
        source: &S,
        segment: &CachedSegment,
    ) -> Result<&[StringRecord], ToolError> {
        let key = segment.cache_key();
        if !self.memory.contains_key(&key) {
            let database = source.database_path();
            if self.memory.is_empty() {
                self.memory.extend(load_disk(database.as_deref()));
            }
            if !self.memory.contains_key(&key) {
                let records = source.enumerate(segment)?;
                debug!(key = %key, count = records.len(), "String cache miss");
                self.memory.insert(key.clone(), records);
                store_disk(database.as_deref(), &self.memory);
            }
        }
        Ok(self.memory.get(&key).map(Vec::as_slice).unwrap_or_default())
    }

    /// Drop the memory tier. The disk tier is left alone.
    pub fn clear(&mut self) {
        self.memory.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.memory.is_empty()
    }

    /// Enumerate every segment that has strings, bypassing both tiers, and
    /// overwrite the disk tier with the result.
    ///
    /// Returns whether the cache file was written.
    pub fn warm<S: StringSource + ?Sized>(&self, source: &S) -> Result<bool, ToolError> {
        let mut fresh = Entries::new();
        for segment in source.segments().iter().filter(|s| s.string_count > 0) {
            fresh.insert(segment.cache_key(), source.enumerate(segment)?);
        }
        Ok(store_disk(source.database_path().as_deref(), &fresh))
    }

    /// Whether the disk tier holds an entry for every segment with strings.
    pub fn is_fully_cached<S: StringSource + ?Sized>(&self, source: &S) -> bool {
        let disk = load_disk(source.database_path().as_deref());
        source
            .segments()
            .iter()
            .filter(|s| s.string_count > 0)
            .all(|s| disk.contains_key(&s.cache_key()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct FakeSource {
        database: Option<PathBuf>,
        segments: Vec<(CachedSegment, Vec<StringRecord>)>,
        calls: Cell<usize>,
    }

    impl FakeSource {
        fn new(database: Option<PathBuf>) -> Self {
            let text = CachedSegment {
                index: 0,
                name: "__TEXT".to_string(),
                start: 0x1040f0000,
                string_count: 2,
            };
            let data = CachedSegment {
                index: 1,
                name: "__DATA_CONST".to_string(),
                start: 0x104cd0000,
                string_count: 1,
            };
            let empty = CachedSegment {
                index: 2,
                name: "__DATA".to_string(),
                start: 0x104d28000,
                string_count: 0,
            };
            Self {
                database,
                segments: vec![
                    (
                        text,
                        vec![
                            StringRecord::new(0x104ad8020, "zzz"),
                            StringRecord::new(0x104ad8000, "Hello World"),
                        ],
                    ),
                    (data, vec![StringRecord::new(0x104cd0100, "SignalServiceKit")]),
                    (empty, Vec::new()),
                ],
                calls: Cell::new(0),
            }
        }

        fn segment(&self, index: usize) -> CachedSegment {
            self.segments[index].0.clone()
        }
    }

    impl StringSource for FakeSource {
        fn database_path(&self) -> Option<PathBuf> {
            self.database.clone()
        }

        fn segments(&self) -> Vec<CachedSegment> {
            self.segments.iter().map(|(s, _)| s.clone()).collect()
        }

        fn enumerate(&self, segment: &CachedSegment) -> Result<Vec<StringRecord>, ToolError> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.segments[segment.index].1.clone())
        }
    }

    fn database(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join("Signal.hop")
    }

    #[test]
    fn test_cache_key_format() {
        assert_eq!(cache_key("__TEXT", 0x1040f0000), "__TEXT_1040f0000");
        assert_eq!(
            cache_file_path(Path::new("/tmp/a.hop")),
            PathBuf::from("/tmp/a.hop.mcpcache")
        );
    }

    #[test]
    fn test_get_cold_then_warm_memory() {
        let dir = tempfile::tempdir().unwrap();
        let source = FakeSource::new(Some(database(&dir)));
        let mut cache = StringCache::new();
        let text = source.segment(0);

        let first = cache.get(&source, &text).unwrap().to_vec();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].text, "zzz");
        assert_eq!(
            first
                .iter()
                .filter(|r| r.address == 0x104ad8000 && r.text == "Hello World")
                .count(),
            1
        );
        let second = cache.get(&source, &text).unwrap().to_vec();
        assert_eq!(first, second);
        assert_eq!(source.calls.get(), 1);
        assert!(cache_file_path(&database(&dir)).exists());
    }

    #[test]
    fn test_clear_then_get_reads_disk() {
        let dir = tempfile::tempdir().unwrap();
        let source = FakeSource::new(Some(database(&dir)));
        let mut cache = StringCache::new();
        assert!(cache.warm(&source).unwrap());
        assert_eq!(source.calls.get(), 2);

        cache.clear();
        let text = cache.get(&source, &source.segment(0)).unwrap().to_vec();
        assert_eq!(text, source.segments[0].1);
        let data = cache.get(&source, &source.segment(1)).unwrap().to_vec();
        assert_eq!(data, source.segments[1].1);
        assert_eq!(source.calls.get(), 2);
    }

    #[test]
    fn test_disk_file_shape() {
        let dir = tempfile::tempdir().unwrap();
        let source = FakeSource::new(Some(database(&dir)));
        StringCache::new().warm(&source).unwrap();

        let text = std::fs::read_to_string(cache_file_path(&database(&dir))).unwrap();
        assert!(text.starts_with("{\n  \"strings_cache_v1\": {"));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        let entry = &value["strings_cache_v1"]["__TEXT_1040f0000"];
        assert_eq!(entry[1][0], 0x104ad8000u64);
        assert_eq!(entry[1][1], "Hello World");
        assert!(value["strings_cache_v1"].get("__DATA_104d28000").is_none());
    }

    #[test]
    fn test_is_fully_cached_tracks_disk() {
        let dir = tempfile::tempdir().unwrap();
        let source = FakeSource::new(Some(database(&dir)));
        let cache = StringCache::new();
        assert!(!cache.is_fully_cached(&source));
        cache.warm(&source).unwrap();
        assert!(cache.is_fully_cached(&source));
        std::fs::remove_file(cache_file_path(&database(&dir))).unwrap();
        assert!(!cache.is_fully_cached(&source));
    }

    #[test]
    fn test_partial_disk_is_not_fully_cached() {
        let dir = tempfile::tempdir().unwrap();
        let source = FakeSource::new(Some(database(&dir)));
        let mut cache = StringCache::new();
        cache.get(&source, &source.segment(0)).unwrap();
        assert!(!cache.is_fully_cached(&source));
    }

    #[test]
    fn test_malformed_disk_falls_through() {
        let dir = tempfile::tempdir().unwrap();
        let source = FakeSource::new(Some(database(&dir)));
        std::fs::write(cache_file_path(&database(&dir)), "{\"strings_cache_v1\": [").unwrap();

        let mut cache = StringCache::new();
        let records = cache.get(&source, &source.segment(0)).unwrap().to_vec();
        assert_eq!(records.len(), 2);
        assert_eq!(source.calls.get(), 1);
    }

    #[test]
    fn test_missing_schema_key_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let source = FakeSource::new(Some(database(&dir)));
        std::fs::write(
            cache_file_path(&database(&dir)),
            r#"{"strings_cache_v0": {"__TEXT_1040f0000": [[1, "stale"]]}}"#,
        )
        .unwrap();

        let mut cache = StringCache::new();
        let records = cache.get(&source, &source.segment(0)).unwrap().to_vec();
        assert_eq!(records[1].text, "Hello World");
        assert_eq!(source.calls.get(), 1);
    }

    #[test]
    fn test_unwritable_disk_keeps_memory_tier() {
        let dir = tempfile::tempdir().unwrap();
        let source = FakeSource::new(Some(dir.path().join("missing").join("Signal.hop")));
        let mut cache = StringCache::new();

        let records = cache.get(&source, &source.segment(0)).unwrap().to_vec();
        assert_eq!(records.len(), 2);
        cache.get(&source, &source.segment(0)).unwrap();
        assert_eq!(source.calls.get(), 1);
        assert!(!cache_file_path(&source.database_path().unwrap()).exists());

        assert!(!cache.warm(&source).unwrap());
        assert!(!cache.is_fully_cached(&source));
    }

    #[test]
    fn test_no_database_path_stays_in_memory() {
        let source = FakeSource::new(None);
        let mut cache = StringCache::new();
        assert!(!cache.warm(&source).unwrap());
        cache.get(&source, &source.segment(0)).unwrap();
        cache.get(&source, &source.segment(0)).unwrap();
        assert_eq!(source.calls.get(), 3);
        assert!(!cache.is_fully_cached(&source));
    }
}
