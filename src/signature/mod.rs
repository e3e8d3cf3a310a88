//! Per-model signature cache.
//!
//! Providers that emit "thinking" or tool-call signatures require the last
//! one to be echoed back when a conversation continues. The proxy is
//! stateless per request, so [`SignatureCache`] remembers the most recent
//! [`SIGNATURE_HISTORY_CAPACITY`] `(signature, content)` pairs per base
//! model on disk.
//!
//! # Storage
//!
//! One pretty-printed JSON document per base model:
//!
//! ```json
//! { "model": "gemini-3-pro-image", "signatures": [{"signature": "...", "content": "..."}], "lastModified": 1700000000000 }
//! ```
//!
//! There is no in-memory index; every call re-reads the model's file. A
//! corrupt file only affects its own model.
//!
//! # Base model names
//!
//! Resolution variants (`-1K`, `-2K`, `-4K`) share one history, so
//! `gemini-3-pro-image-4K` and `gemini-3-pro-image` are the same key.

mod policy;

pub use policy::{SignatureOptions, SignaturePolicy, should_cache};

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::family::is_image_model;
use crate::{store, telemetry};

/// Maximum entries kept per base model.
pub const SIGNATURE_HISTORY_CAPACITY: usize = 3;

/// Content stored/returned in place of reasoning text when retention is off.
pub const CONTENT_PLACEHOLDER: &str = " ";

/// Trailing resolution tokens stripped to form the base model name (lowercase).
const RESOLUTION_SUFFIXES: &[&str] = &["-1k", "-2k", "-4k"];

/// One continuity pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureEntry {
    pub signature: String,
    pub content: String,
}

impl SignatureEntry {
    pub fn new(signature: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            signature: signature.into(),
            content: content.into(),
        }
    }

    fn gated(mut self, policy: &SignaturePolicy) -> Self {
        if !policy.retain_reasoning_content {
            self.content = CONTENT_PLACEHOLDER.to_string();
        }
        self
    }
}

/// On-disk shape of one model's history.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignatureDocument {
    model: String,
    signatures: Vec<SignatureEntry>,
    last_modified: u64,
}

/// Strip a trailing resolution suffix from a model id.
///
/// ```rust
/// # use muninn::signature::base_model_name;
/// assert_eq!(base_model_name("gemini-3-pro-image-4K"), "gemini-3-pro-image");
/// assert_eq!(base_model_name("gemini-3-pro-image-2k"), "gemini-3-pro-image");
/// assert_eq!(base_model_name("claude-sonnet-4"), "claude-sonnet-4");
/// ```
pub fn base_model_name(model: &str) -> &str {
    let lower = model.to_ascii_lowercase();
    for suffix in RESOLUTION_SUFFIXES {
        if lower.ends_with(suffix) {
            return &model[..model.len() - suffix.len()];
        }
    }
    model
}

/// Map a base model name onto a safe file name.
fn file_name_for(base_model: &str) -> String {
    let sanitized: String = base_model
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{sanitized}.json")
}

/// Whether `path` holds a signature history document.
fn is_history_file(path: &Path) -> bool {
    match std::fs::read_to_string(path) {
        Ok(text) => serde_json::from_str::<SignatureDocument>(&text).is_ok(),
        Err(_) => false,
    }
}

/// Bounded, file-backed history of continuity signatures per base model.
///
/// Thread-safe: read-modify-write cycles are serialised by an internal
/// lock. Not safe across processes writing the same directory.
pub struct SignatureCache {
    dir: PathBuf,
    clock: Arc<dyn Clock>,
    write_lock: Mutex<()>,
}

impl SignatureCache {
    /// Create a cache storing its files under `dir` (created on first write).
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_clock(dir, Arc::new(SystemClock))
    }

    /// Create a cache using a custom clock for `lastModified` stamps.
    pub fn with_clock(dir: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        let dir = dir.into();
        store::ensure_dir(&dir);
        Self {
            dir,
            clock,
            write_lock: Mutex::new(()),
        }
    }

    /// Directory holding the per-model files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Record a signature produced for `model`.
    ///
    /// No-op when `model` or `signature` is empty, or when the policy in
    /// `opts` says this request's signatures are not cached. A signature
    /// equal to the current tail is not appended again. The oldest entry
    /// is evicted once the history exceeds [`SIGNATURE_HISTORY_CAPACITY`].
    pub fn set_signature(
        &self,
        model: &str,
        signature: &str,
        content: &str,
        opts: &SignatureOptions,
    ) {
        if model.is_empty() || signature.is_empty() {
            return;
        }
        if !should_cache(opts.has_tools, is_image_model(model), &opts.policy) {
            return;
        }

        let base = base_model_name(model);
        if base.is_empty() {
            return;
        }
        let entry = SignatureEntry::new(signature, content).gated(&opts.policy);

        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut history = self.load_history(base);

        if history.last().is_some_and(|tail| tail.signature == entry.signature) {
            debug!(model = base, "signature unchanged, not appending");
            return;
        }

        history.push(entry);
        if history.len() > SIGNATURE_HISTORY_CAPACITY {
            let excess = history.len() - SIGNATURE_HISTORY_CAPACITY;
            history.drain(..excess);
        }

        let doc = SignatureDocument {
            model: base.to_string(),
            signatures: history,
            last_modified: self.clock.now_ms(),
        };
        let path = self.path_for(base);
        match store::write_json_atomic(&path, &doc) {
            Ok(()) => {
                metrics::counter!(telemetry::SIGNATURE_WRITES_TOTAL).increment(1);
                debug!(model = base, entries = doc.signatures.len(), "signature cached");
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to persist signature history");
            }
        }
    }

    /// Most recent entry for the base form of `model`.
    ///
    /// The content is replaced by [`CONTENT_PLACEHOLDER`] when the policy
    /// in `opts` does not retain reasoning content, regardless of what was
    /// stored.
    pub fn get_signature(&self, model: &str, opts: &SignatureOptions) -> Option<SignatureEntry> {
        let base = base_model_name(model);
        if base.is_empty() {
            return None;
        }

        let latest = self.load_history(base).pop();
        match latest {
            Some(entry) => {
                metrics::counter!(telemetry::SIGNATURE_HITS_TOTAL).increment(1);
                Some(entry.gated(&opts.policy))
            }
            None => {
                metrics::counter!(telemetry::SIGNATURE_MISSES_TOTAL).increment(1);
                None
            }
        }
    }

    /// Stored history for the base form of `model`, oldest first, exactly
    /// as persisted.
    pub fn history(&self, model: &str) -> Vec<SignatureEntry> {
        let base = base_model_name(model);
        if base.is_empty() {
            return Vec::new();
        }
        self.load_history(base)
    }

    /// Delete every per-model history file. Returns how many were removed.
    ///
    /// Only files that parse as a signature history are touched, so other
    /// documents sharing the directory survive.
    pub fn clear_all(&self) -> usize {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return 0,
            Err(e) => {
                warn!(path = %self.dir.display(), error = %e, "failed to list signature cache");
                return 0;
            }
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if !entry.file_name().to_string_lossy().ends_with(".json") || !is_history_file(&path) {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to remove signature history");
                }
            }
        }

        info!(removed, path = %self.dir.display(), "signature cache cleared");
        removed
    }

    fn path_for(&self, base_model: &str) -> PathBuf {
        self.dir.join(file_name_for(base_model))
    }

    /// Read one model's history. Missing or malformed files read as empty.
    fn load_history(&self, base_model: &str) -> Vec<SignatureEntry> {
        let path = self.path_for(base_model);
        let text = match store::read_text(&path) {
            Ok(Some(text)) => text,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read signature history");
                return Vec::new();
            }
        };
        match serde_json::from_str::<SignatureDocument>(&text) {
            Ok(doc) => doc.signatures,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupt signature history");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_all() -> SignatureOptions {
        SignatureOptions::new(
            SignaturePolicy::new()
                .cache_all(true)
                .retain_reasoning_content(true),
        )
    }

    fn signatures(history: &[SignatureEntry]) -> Vec<&str> {
        history.iter().map(|e| e.signature.as_str()).collect()
    }

    #[test]
    fn base_model_strips_one_suffix_only() {
        assert_eq!(base_model_name("model-4K-4K"), "model-4K");
        assert_eq!(base_model_name("model-8K"), "model-8K");
        assert_eq!(base_model_name("-1K"), "");
    }

    #[test]
    fn file_name_is_sanitized() {
        assert_eq!(file_name_for("models/gemini:pro"), "models_gemini_pro.json");
        assert_eq!(file_name_for("claude-3.5_x"), "claude-3.5_x.json");
    }

    #[test]
    fn capacity_evicts_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SignatureCache::new(dir.path());
        for sig in ["s1", "s2", "s3", "s4"] {
            cache.set_signature("m", sig, "c", &cache_all());
        }
        assert_eq!(signatures(&cache.history("m")), vec!["s2", "s3", "s4"]);
    }

    #[test]
    fn consecutive_duplicate_is_collapsed() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SignatureCache::new(dir.path());
        cache.set_signature("m", "s1", "c", &cache_all());
        cache.set_signature("m", "s2", "c", &cache_all());
        cache.set_signature("m", "s2", "other", &cache_all());
        assert_eq!(signatures(&cache.history("m")), vec!["s1", "s2"]);
        // first write's content kept
        assert_eq!(cache.history("m")[1].content, "c");
    }

    #[test]
    fn non_consecutive_duplicate_is_appended() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SignatureCache::new(dir.path());
        for sig in ["s1", "s2", "s1"] {
            cache.set_signature("m", sig, "c", &cache_all());
        }
        assert_eq!(signatures(&cache.history("m")), vec!["s1", "s2", "s1"]);
    }

    #[test]
    fn empty_arguments_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SignatureCache::new(dir.path());
        cache.set_signature("", "s1", "c", &cache_all());
        cache.set_signature("m", "", "c", &cache_all());
        assert!(cache.history("m").is_empty());
        assert!(cache.get_signature("", &cache_all()).is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn corrupt_file_reads_as_empty_and_is_repaired() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SignatureCache::new(dir.path());
        std::fs::write(dir.path().join("m.json"), "{\"signatures\": 5}").unwrap();

        assert!(cache.get_signature("m", &cache_all()).is_none());
        cache.set_signature("m", "s1", "c", &cache_all());
        assert_eq!(signatures(&cache.history("m")), vec!["s1"]);
    }

    #[test]
    fn clear_all_on_missing_dir_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SignatureCache::new(dir.path().join("sigs"));
        std::fs::remove_dir_all(dir.path().join("sigs")).unwrap();
        assert_eq!(cache.clear_all(), 0);
    }
}
