//! Process-wide, content-addressed artifact cache (spec §3, §5).
//!
//! Artifacts are immutable once written, so the on-disk layout uses a
//! two-character fan-out directory keyed by the cache key's hash, written
//! to a temp file and renamed into place so a reader never observes a
//! partially-written entry. Readers never block; writers serialize per key
//! with an in-process `Mutex<HashSet<String>>` "compile in flight" guard
//! layered on top of the same single-writer-per-path rename discipline, to
//! also cover concurrent in-process compiles of the same unit.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use mlpy_types::Artifact;

pub struct ArtifactCache {
    dir: PathBuf,
    in_flight: Mutex<HashSet<String>>,
}

impl ArtifactCache {
    #[must_use]
    pub fn new(dir: PathBuf) -> Self {
        Self { dir, in_flight: Mutex::new(HashSet::new()) }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let fanout = &key[..key.len().min(2)];
        self.dir.join(fanout).join(format!("{key}.json"))
    }

    /// Non-blocking read of a previously cached artifact. Absence, a
    /// missing cache directory, or a corrupt entry are all treated as a
    /// cache miss rather than an error: the coordinator simply recompiles.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Artifact> {
        let path = self.entry_path(key);
        let content = fs::read(path).ok()?;
        serde_json::from_slice(&content).ok()
    }

    /// Atomically publish `artifact` under `key`: write to a sibling temp
    /// file, then rename into place, so a concurrent reader either sees no
    /// file or a complete one (spec §5 "copy-on-write", "artifacts are
    /// immutable once cached").
    pub fn put(&self, key: &str, artifact: &Artifact) -> std::io::Result<()> {
        let path = self.entry_path(key);
        let parent = path.parent().expect("entry path always has a fan-out parent");
        fs::create_dir_all(parent)?;
        let content = serde_json::to_vec(artifact).expect("Artifact always serializes");
        let temp_path = temp_sibling(&path);
        fs::write(&temp_path, &content)?;
        fs::rename(&temp_path, &path)?;
        Ok(())
    }

    /// Claim the single-writer slot for `key`. Returns `true` the first
    /// time a given key is claimed; subsequent callers for the same key
    /// (concurrent compiles of the same content) get `false` and should
    /// wait for the winner's result instead of duplicating the work.
    #[must_use]
    pub fn claim_writer(&self, key: &str) -> bool {
        self.in_flight.lock().expect("cache lock poisoned").insert(key.to_string())
    }

    pub fn release_writer(&self, key: &str) {
        self.in_flight.lock().expect("cache lock poisoned").remove(key);
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("entry");
    path.with_file_name(format!(".{file_name}.tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlpy_types::ContentHash;

    fn sample_artifact() -> Artifact {
        Artifact {
            unit_hash: ContentHash::of(b"x = 1;"),
            target_source: Some("x = 1\n".to_string()),
            source_map: None,
            required_capabilities: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    #[test]
    fn round_trips_through_the_disk_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(dir.path().to_path_buf());
        let artifact = sample_artifact();
        cache.put("abc123", &artifact).unwrap();
        let loaded = cache.get("abc123").expect("just-written entry should be readable");
        assert_eq!(loaded.target_source, artifact.target_source);
    }

    #[test]
    fn missing_entries_are_a_miss_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(dir.path().to_path_buf());
        assert!(cache.get("nonexistent").is_none());
    }

    #[test]
    fn only_the_first_claimant_per_key_wins() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(dir.path().to_path_buf());
        assert!(cache.claim_writer("k"));
        assert!(!cache.claim_writer("k"));
        cache.release_writer("k");
        assert!(cache.claim_writer("k"));
    }
}
