//! Lazy-loaded, bounded-memory store of parsed ASTs and source bytes (§4.C).
//!
//! Built on the `lru` crate the way the teacher's `FunctionSummaryCache`
//! (`taint_analysis/domain/function_summary.rs`) wraps `lru::LruCache`
//! instead of hand-rolling a recency list, guarded by `parking_lot::Mutex`
//! the way the teacher's `file_watcher` module guards its shared state.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use tree_sitter::{Parser, Tree};

use crate::errors::{Result, TraceError};
use crate::features::source_keywords::Language;

/// One cached file: its parsed tree, its raw bytes, and a rough AST-size
/// estimate (content length × multiplier, per §4.C).
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub path: String,
    pub tree: Arc<Tree>,
    pub bytes: Arc<Vec<u8>>,
    pub memory_estimate: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

struct Inner {
    entries: LruCache<String, CacheEntry>,
    max_memory_bytes: usize,
    memory_multiplier: usize,
    current_memory: usize,
    stats: CacheStats,
}

pub struct FileCache {
    inner: Mutex<Inner>,
}

fn parse(language: Language, bytes: &[u8]) -> Result<Tree> {
    let mut parser = Parser::new();
    let ts_language = match language {
        Language::Php => tree_sitter_php::language_php(),
        Language::TypeScript => tree_sitter_typescript::language_typescript(),
    };
    parser.set_language(&ts_language).expect("grammar must load");
    parser
        .parse(bytes, None)
        .ok_or_else(|| TraceError::Parse("tree-sitter produced no tree".to_string()))
}

fn language_for(path: &str) -> Option<Language> {
    let ext = path.rsplit('.').next()?;
    Language::from_extension(ext)
}

impl FileCache {
    pub fn new(max_entries: usize, max_memory_bytes: usize, memory_multiplier: usize) -> Self {
        let cap = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(cap),
                max_memory_bytes,
                memory_multiplier,
                current_memory: 0,
                stats: CacheStats::default(),
            }),
        }
    }

    /// Reads, parses, and caches `path`, or returns the already-cached entry
    /// moved to the front of the recency list. A read/parse failure returns
    /// `FileLoad` without storing an entry.
    pub fn get(&self, path: &str) -> Result<CacheEntry> {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.entries.get(path).cloned() {
            inner.stats.hits += 1;
            return Ok(entry);
        }
        inner.stats.misses += 1;
        drop(inner);

        let bytes = std::fs::read(path).map_err(|e| TraceError::FileLoad {
            path: path.to_string(),
            source: e,
        })?;
        let language = language_for(path).unwrap_or(Language::Php);
        let tree = parse(language, &bytes)?;

        let mut inner = self.inner.lock();
        let memory_estimate = bytes.len() * inner.memory_multiplier;
        let entry = CacheEntry {
            path: path.to_string(),
            tree: Arc::new(tree),
            bytes: Arc::new(bytes),
            memory_estimate,
        };
        inner.current_memory += memory_estimate;
        if let Some((_, evicted)) = inner.entries.push(path.to_string(), entry.clone()) {
            inner.current_memory = inner.current_memory.saturating_sub(evicted.memory_estimate);
        }
        while inner.current_memory > inner.max_memory_bytes && inner.entries.len() > 1 {
            if let Some((_, evicted)) = inner.entries.pop_lru() {
                inner.current_memory = inner.current_memory.saturating_sub(evicted.memory_estimate);
            } else {
                break;
            }
        }
        Ok(entry)
    }

    pub fn has(&self, path: &str) -> bool {
        self.inner.lock().entries.contains(path)
    }

    pub fn remove(&self, path: &str) {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.entries.pop(path) {
            inner.current_memory = inner.current_memory.saturating_sub(entry.memory_estimate);
        }
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.current_memory = 0;
    }

    pub fn size(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn memory_usage(&self) -> usize {
        self.inner.lock().current_memory
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats
    }

    /// Paths currently resident, most-recently-used first. Used by the
    /// engine's "current file, then all cached files" search order (§4.E.10).
    pub fn cached_paths(&self) -> Vec<String> {
        self.inner.lock().entries.iter().map(|(k, _)| k.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_php(name: &str, body: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join("taintgraph_cache_tests");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn get_caches_and_reports_hit() {
        let path = temp_php("a.php", "<?php echo 1;\n");
        let cache = FileCache::new(30, 64 * 1024 * 1024, 7);
        cache.get(path.to_str().unwrap()).unwrap();
        cache.get(path.to_str().unwrap()).unwrap();
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn missing_file_surfaces_file_load_error() {
        let cache = FileCache::new(30, 64 * 1024 * 1024, 7);
        let err = cache.get("/nonexistent/path/does_not_exist.php").unwrap_err();
        assert!(matches!(err, TraceError::FileLoad { .. }));
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn entry_count_never_exceeds_cap() {
        let cache = FileCache::new(2, 64 * 1024 * 1024, 7);
        let p1 = temp_php("cap1.php", "<?php echo 1;\n");
        let p2 = temp_php("cap2.php", "<?php echo 2;\n");
        let p3 = temp_php("cap3.php", "<?php echo 3;\n");
        cache.get(p1.to_str().unwrap()).unwrap();
        cache.get(p2.to_str().unwrap()).unwrap();
        cache.get(p3.to_str().unwrap()).unwrap();
        assert!(cache.size() <= 2);
    }

    #[test]
    fn recently_used_entry_survives_eviction() {
        let cache = FileCache::new(2, 64 * 1024 * 1024, 7);
        let p1 = temp_php("lru1.php", "<?php echo 1;\n");
        let p2 = temp_php("lru2.php", "<?php echo 2;\n");
        let p3 = temp_php("lru3.php", "<?php echo 3;\n");
        cache.get(p1.to_str().unwrap()).unwrap();
        cache.get(p2.to_str().unwrap()).unwrap();
        // touch p1 again so p2 becomes the least-recently-used entry
        cache.get(p1.to_str().unwrap()).unwrap();
        cache.get(p3.to_str().unwrap()).unwrap();
        assert!(cache.has(p1.to_str().unwrap()));
        assert!(!cache.has(p2.to_str().unwrap()));
    }
}
