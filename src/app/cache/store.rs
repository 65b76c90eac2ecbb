//! Cache store implementation
//!
//! A reader-writer lock guards the in-memory index; reads hand out copies of
//! entries, writes mutate the index only after the corresponding filesystem
//! step has succeeded. The running byte total is maintained incrementally on
//! every mutation and recomputed by a full scan.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::constants::cache::ALLOWED_EXTENSIONS;
use crate::errors::{CacheError, CacheResult};

use super::super::models::{CacheEntry, VideoId};

/// On-disk store and in-memory index of cached videos
#[derive(Debug)]
pub struct CacheStore {
    /// Cache directory (sole owner; flat layout)
    cache_dir: PathBuf,
    /// Byte budget; 0 disables eviction
    max_bytes: u64,
    /// Index guarded by a single reader-writer lock
    inner: RwLock<Index>,
}

/// Index state behind the lock
#[derive(Debug, Default)]
struct Index {
    entries: HashMap<VideoId, CacheEntry>,
    total_bytes: u64,
}

impl CacheStore {
    /// Create a store rooted at `cache_dir`, creating the directory if needed
    pub async fn new(cache_dir: impl Into<PathBuf>, max_bytes: u64) -> CacheResult<Self> {
        let cache_dir = cache_dir.into();

        fs::create_dir_all(&cache_dir)
            .await
            .map_err(|_| CacheError::DirectoryNotAccessible {
                path: cache_dir.clone(),
            })?;

        Ok(Self {
            cache_dir,
            max_bytes,
            inner: RwLock::new(Index::default()),
        })
    }

    /// Cache directory path
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Enumerate the cache directory and rebuild the index
    ///
    /// Only regular files named `<id>.<ext>` with an allowed extension and a
    /// well-formed identifier are indexed; everything else is ignored. Both
    /// `last_access` and `created` start at the file's mtime. Returns the
    /// number of indexed entries.
    pub async fn scan(&self) -> CacheResult<usize> {
        let mut dir = fs::read_dir(&self.cache_dir).await?;
        let mut fresh = Index::default();

        while let Some(dirent) = dir.next_entry().await? {
            let file_type = match dirent.file_type().await {
                Ok(t) => t,
                Err(_) => continue,
            };
            if !file_type.is_file() {
                continue;
            }

            let file_name = dirent.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            let Some(id) = parse_entry_file_name(name) else {
                continue;
            };

            let metadata = match dirent.metadata().await {
                Ok(m) => m,
                Err(_) => continue,
            };
            let mtime = system_time_to_utc(metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH));

            fresh.total_bytes += metadata.len();
            fresh.entries.insert(
                id.clone(),
                CacheEntry {
                    id,
                    file_name: name.to_string(),
                    size: metadata.len(),
                    last_access: mtime,
                    created: mtime,
                },
            );
        }

        let count = fresh.entries.len();
        let mut index = self.inner.write().await;
        *index = fresh;
        self.evict_to_budget(&mut index, None).await;
        drop(index);

        info!(
            "Cache scan complete: {} entries in {}",
            count,
            self.cache_dir.display()
        );
        Ok(count)
    }

    /// Attach an already-present file to the index
    ///
    /// Called after a successful download. Reads size and mtime with one
    /// stat; `last_access` is set to now. Registering an identifier that is
    /// already indexed replaces the old entry and removes its file when the
    /// path differs. May trigger eviction, which never removes the entry
    /// being registered.
    pub async fn register(&self, id: VideoId, file_name: &str) -> CacheResult<()> {
        let path = self.cache_dir.join(file_name);
        let metadata = fs::metadata(&path).await?;
        let mtime = system_time_to_utc(metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH));

        let mut index = self.inner.write().await;

        if let Some(old) = index.entries.remove(&id) {
            index.total_bytes = index.total_bytes.saturating_sub(old.size);
            if old.file_name != file_name {
                let old_path = self.cache_dir.join(&old.file_name);
                if let Err(e) = fs::remove_file(&old_path).await {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        warn!("Failed to remove replaced file {}: {}", old_path.display(), e);
                    }
                }
            }
        }

        index.total_bytes += metadata.len();
        index.entries.insert(
            id.clone(),
            CacheEntry {
                id: id.clone(),
                file_name: file_name.to_string(),
                size: metadata.len(),
                last_access: Utc::now(),
                created: mtime,
            },
        );

        debug!("Registered cache entry {} ({} bytes)", id, metadata.len());
        self.evict_to_budget(&mut index, Some(&id)).await;
        Ok(())
    }

    /// Look up an entry by identifier, returning a copy
    pub async fn lookup(&self, id: &VideoId) -> Option<CacheEntry> {
        let index = self.inner.read().await;
        index.entries.get(id).cloned()
    }

    /// Absolute path of an entry's file, if indexed
    pub async fn file_path(&self, id: &VideoId) -> Option<PathBuf> {
        let index = self.inner.read().await;
        index
            .entries
            .get(id)
            .map(|e| self.cache_dir.join(&e.file_name))
    }

    /// Refresh an entry's last-access time
    ///
    /// Also updates the file's timestamps on disk so a later scan preserves
    /// the access order; that part is best-effort and failures are ignored.
    pub async fn touch(&self, id: &VideoId) -> CacheResult<()> {
        let mut index = self.inner.write().await;
        let entry = index
            .entries
            .get_mut(id)
            .ok_or_else(|| CacheError::EntryNotFound { id: id.to_string() })?;

        entry.last_access = Utc::now();
        let path = self.cache_dir.join(&entry.file_name);
        drop(index);

        if let Ok(file) = std::fs::OpenOptions::new().write(true).open(&path) {
            let _ = file.set_modified(SystemTime::now());
        }

        Ok(())
    }

    /// Remove an entry and its file
    ///
    /// A missing file counts as success; a missing index entry does not.
    pub async fn delete(&self, id: &VideoId) -> CacheResult<()> {
        let mut index = self.inner.write().await;
        let entry = index
            .entries
            .get(id)
            .ok_or_else(|| CacheError::EntryNotFound { id: id.to_string() })?
            .clone();

        let path = self.cache_dir.join(&entry.file_name);
        if let Err(e) = fs::remove_file(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                return Err(e.into());
            }
        }

        index.entries.remove(id);
        index.total_bytes = index.total_bytes.saturating_sub(entry.size);
        debug!("Deleted cache entry {}", id);
        Ok(())
    }

    /// Remove every entry and its file
    pub async fn clear(&self) -> CacheResult<()> {
        let mut index = self.inner.write().await;

        for entry in index.entries.values() {
            let path = self.cache_dir.join(&entry.file_name);
            if let Err(e) = fs::remove_file(&path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to remove {}: {}", path.display(), e);
                }
            }
        }

        let count = index.entries.len();
        index.entries.clear();
        index.total_bytes = 0;
        info!("Cleared cache ({} entries removed)", count);
        Ok(())
    }

    /// Total size of all indexed files in bytes
    pub async fn total_bytes(&self) -> u64 {
        self.inner.read().await.total_bytes
    }

    /// Number of indexed entries
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    /// Whether the index is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }

    /// All entries sorted by last access, most recent first
    pub async fn list(&self) -> Vec<CacheEntry> {
        let index = self.inner.read().await;
        let mut entries: Vec<CacheEntry> = index.entries.values().cloned().collect();
        entries.sort_by(|a, b| {
            b.last_access
                .cmp(&a.last_access)
                .then_with(|| a.id.cmp(&b.id))
        });
        entries
    }

    /// Evict least-recently-accessed entries until the total fits the budget
    ///
    /// Ties in `last_access` break on lexical identifier order. The entry
    /// named by `keep` is exempt, so a single entry larger than the whole
    /// budget stays admitted. Must be called with the write lock held.
    async fn evict_to_budget(&self, index: &mut Index, keep: Option<&VideoId>) {
        if self.max_bytes == 0 {
            return;
        }

        while index.total_bytes > self.max_bytes {
            let victim = index
                .entries
                .values()
                .filter(|e| keep != Some(&e.id))
                .min_by(|a, b| {
                    a.last_access
                        .cmp(&b.last_access)
                        .then_with(|| a.id.cmp(&b.id))
                })
                .map(|e| e.id.clone());

            let Some(victim) = victim else {
                break;
            };

            let Some(entry) = index.entries.remove(&victim) else {
                break;
            };
            let path = self.cache_dir.join(&entry.file_name);
            if let Err(e) = fs::remove_file(&path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to evict {}: {}", path.display(), e);
                }
            }

            index.total_bytes = index.total_bytes.saturating_sub(entry.size);
            info!(
                "Evicted {} ({} bytes, total now {})",
                entry.id, entry.size, index.total_bytes
            );
        }
    }
}

/// Parse a directory entry name into a video identifier
///
/// Accepts only `<id>.<ext>` where the extension is allowed and the stem is
/// a well-formed identifier.
fn parse_entry_file_name(name: &str) -> Option<VideoId> {
    let (stem, ext) = name.rsplit_once('.')?;
    if !ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) {
        return None;
    }
    VideoId::new(stem)
}

fn system_time_to_utc(t: SystemTime) -> DateTime<Utc> {
    t.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn id(s: &str) -> VideoId {
        VideoId::new(s).unwrap()
    }

    async fn write_file(dir: &Path, name: &str, len: usize) {
        fs::write(dir.join(name), vec![0u8; len]).await.unwrap();
    }

    async fn store_with_budget(dir: &Path, max_bytes: u64) -> CacheStore {
        CacheStore::new(dir, max_bytes).await.unwrap()
    }

    #[tokio::test]
    async fn test_scan_indexes_allowed_extensions_only() {
        let temp = TempDir::new().unwrap();
        write_file(temp.path(), "abc123.mp4", 10).await;
        write_file(temp.path(), "def456.webm", 20).await;
        write_file(temp.path(), "notes.txt", 5).await;
        write_file(temp.path(), "youtube_cookies.txt", 5).await;
        write_file(temp.path(), "clip.mkv", 5).await;

        let store = store_with_budget(temp.path(), 0).await;
        let count = store.scan().await.unwrap();

        assert_eq!(count, 2);
        assert_eq!(store.total_bytes().await, 30);
        assert!(store.lookup(&id("abc123")).await.is_some());
        assert!(store.lookup(&id("def456")).await.is_some());
    }

    #[tokio::test]
    async fn test_scan_rejects_malformed_identifiers() {
        let temp = TempDir::new().unwrap();
        let ok = "a".repeat(64);
        let too_long = "a".repeat(65);
        write_file(temp.path(), &format!("{ok}.mp4"), 1).await;
        write_file(temp.path(), &format!("{too_long}.mp4"), 1).await;
        write_file(temp.path(), "bad id.mp4", 1).await;

        let store = store_with_budget(temp.path(), 0).await;
        let count = store.scan().await.unwrap();

        assert_eq!(count, 1);
        assert!(store.lookup(&id(&ok)).await.is_some());
    }

    #[tokio::test]
    async fn test_register_and_lookup() {
        let temp = TempDir::new().unwrap();
        write_file(temp.path(), "abc123.mp4", 100).await;

        let store = store_with_budget(temp.path(), 0).await;
        store.register(id("abc123"), "abc123.mp4").await.unwrap();

        let entry = store.lookup(&id("abc123")).await.unwrap();
        assert_eq!(entry.file_name, "abc123.mp4");
        assert_eq!(entry.size, 100);
        assert_eq!(store.total_bytes().await, 100);

        let path = store.file_path(&id("abc123")).await.unwrap();
        assert_eq!(path, temp.path().join("abc123.mp4"));
    }

    #[tokio::test]
    async fn test_register_missing_file_fails_without_index_change() {
        let temp = TempDir::new().unwrap();
        let store = store_with_budget(temp.path(), 0).await;

        let result = store.register(id("ghost"), "ghost.mp4").await;
        assert!(result.is_err());
        assert!(store.lookup(&id("ghost")).await.is_none());
        assert_eq!(store.total_bytes().await, 0);
    }

    #[tokio::test]
    async fn test_register_replaces_existing_entry() {
        let temp = TempDir::new().unwrap();
        write_file(temp.path(), "abc123.mp4", 100).await;

        let store = store_with_budget(temp.path(), 0).await;
        store.register(id("abc123"), "abc123.mp4").await.unwrap();

        // Re-download produced a webm this time
        write_file(temp.path(), "abc123.webm", 40).await;
        store.register(id("abc123"), "abc123.webm").await.unwrap();

        let entry = store.lookup(&id("abc123")).await.unwrap();
        assert_eq!(entry.file_name, "abc123.webm");
        assert_eq!(store.total_bytes().await, 40);
        // Old file is gone
        assert!(!temp.path().join("abc123.mp4").exists());
    }

    #[tokio::test]
    async fn test_delete_removes_entry_and_file() {
        let temp = TempDir::new().unwrap();
        write_file(temp.path(), "abc123.mp4", 100).await;

        let store = store_with_budget(temp.path(), 0).await;
        store.register(id("abc123"), "abc123.mp4").await.unwrap();

        store.delete(&id("abc123")).await.unwrap();
        assert!(store.lookup(&id("abc123")).await.is_none());
        assert_eq!(store.total_bytes().await, 0);
        assert!(!temp.path().join("abc123.mp4").exists());
    }

    #[tokio::test]
    async fn test_delete_unknown_entry_fails() {
        let temp = TempDir::new().unwrap();
        let store = store_with_budget(temp.path(), 0).await;

        let result = store.delete(&id("nothere")).await;
        assert!(matches!(result, Err(CacheError::EntryNotFound { .. })));
    }

    #[tokio::test]
    async fn test_delete_tolerates_missing_file() {
        let temp = TempDir::new().unwrap();
        write_file(temp.path(), "abc123.mp4", 100).await;

        let store = store_with_budget(temp.path(), 0).await;
        store.register(id("abc123"), "abc123.mp4").await.unwrap();

        // Someone removed the file behind our back
        std::fs::remove_file(temp.path().join("abc123.mp4")).unwrap();

        store.delete(&id("abc123")).await.unwrap();
        assert!(store.lookup(&id("abc123")).await.is_none());
    }

    #[tokio::test]
    async fn test_clear() {
        let temp = TempDir::new().unwrap();
        write_file(temp.path(), "one.mp4", 10).await;
        write_file(temp.path(), "two.webm", 20).await;

        let store = store_with_budget(temp.path(), 0).await;
        store.scan().await.unwrap();

        store.clear().await.unwrap();
        assert!(store.is_empty().await);
        assert_eq!(store.total_bytes().await, 0);
        assert!(!temp.path().join("one.mp4").exists());
        assert!(!temp.path().join("two.webm").exists());
    }

    #[tokio::test]
    async fn test_touch_updates_access_order() {
        let temp = TempDir::new().unwrap();
        write_file(temp.path(), "one.mp4", 10).await;
        write_file(temp.path(), "two.mp4", 10).await;

        let store = store_with_budget(temp.path(), 0).await;
        store.register(id("one"), "one.mp4").await.unwrap();
        store.register(id("two"), "two.mp4").await.unwrap();

        store.touch(&id("one")).await.unwrap();

        let listed = store.list().await;
        assert_eq!(listed[0].id.as_str(), "one");
    }

    #[tokio::test]
    async fn test_touch_unknown_entry_fails() {
        let temp = TempDir::new().unwrap();
        let store = store_with_budget(temp.path(), 0).await;
        assert!(store.touch(&id("nothere")).await.is_err());
    }

    #[tokio::test]
    async fn test_lru_eviction_order() {
        let temp = TempDir::new().unwrap();
        write_file(temp.path(), "A.mp4", 1000).await;
        write_file(temp.path(), "B.mp4", 1000).await;
        write_file(temp.path(), "C.mp4", 1000).await;

        let store = store_with_budget(temp.path(), 2000).await;
        // Register in order A, B, C with strictly increasing last_access
        store.register(id("A"), "A.mp4").await.unwrap();
        store.register(id("B"), "B.mp4").await.unwrap();
        store.register(id("C"), "C.mp4").await.unwrap();

        // Only A, the oldest, was evicted
        assert_eq!(store.total_bytes().await, 2000);
        assert!(store.lookup(&id("A")).await.is_none());
        assert!(store.lookup(&id("B")).await.is_some());
        assert!(store.lookup(&id("C")).await.is_some());
        assert!(!temp.path().join("A.mp4").exists());
    }

    #[tokio::test]
    async fn test_zero_budget_disables_eviction() {
        let temp = TempDir::new().unwrap();
        write_file(temp.path(), "one.mp4", 1_000_000).await;
        write_file(temp.path(), "two.mp4", 1_000_000).await;

        let store = store_with_budget(temp.path(), 0).await;
        store.register(id("one"), "one.mp4").await.unwrap();
        store.register(id("two"), "two.mp4").await.unwrap();

        assert_eq!(store.len().await, 2);
        assert_eq!(store.total_bytes().await, 2_000_000);
    }

    #[tokio::test]
    async fn test_oversized_entry_is_admitted() {
        let temp = TempDir::new().unwrap();
        write_file(temp.path(), "small.mp4", 100).await;
        write_file(temp.path(), "huge.mp4", 5000).await;

        let store = store_with_budget(temp.path(), 1000).await;
        store.register(id("small"), "small.mp4").await.unwrap();
        store.register(id("huge"), "huge.mp4").await.unwrap();

        // The older entry was evicted, but the oversized newcomer stays even
        // though the budget is exceeded.
        assert!(store.lookup(&id("small")).await.is_none());
        assert!(store.lookup(&id("huge")).await.is_some());
        assert_eq!(store.total_bytes().await, 5000);
    }

    #[tokio::test]
    async fn test_scan_matches_register_history() {
        let temp = TempDir::new().unwrap();
        write_file(temp.path(), "one.mp4", 10).await;
        write_file(temp.path(), "two.webm", 20).await;
        write_file(temp.path(), "three.mp4", 30).await;

        let store = store_with_budget(temp.path(), 0).await;
        store.register(id("one"), "one.mp4").await.unwrap();
        store.register(id("two"), "two.webm").await.unwrap();
        store.register(id("three"), "three.mp4").await.unwrap();
        store.delete(&id("two")).await.unwrap();

        // A fresh scan over the directory reproduces the same identifiers
        // and sizes.
        let rescanned = store_with_budget(temp.path(), 0).await;
        rescanned.scan().await.unwrap();

        assert_eq!(rescanned.len().await, 2);
        assert_eq!(rescanned.lookup(&id("one")).await.unwrap().size, 10);
        assert_eq!(rescanned.lookup(&id("three")).await.unwrap().size, 30);
        assert!(rescanned.lookup(&id("two")).await.is_none());
    }

    #[test]
    fn test_parse_entry_file_name() {
        assert!(parse_entry_file_name("abc123.mp4").is_some());
        assert!(parse_entry_file_name("abc123.WEBM").is_some());
        assert!(parse_entry_file_name("abc123.mkv").is_none());
        assert!(parse_entry_file_name("abc123").is_none());
        assert!(parse_entry_file_name(".mp4").is_none());
        assert!(parse_entry_file_name("with.dot.mp4").is_none());
    }
}
