//! Persistent credential repository.
//!
//! [`CredentialRepository`] owns the credential document on disk:
//!
//! ```json
//! { "salt": "<64 hex chars>", "tokens": [ { "refresh_token": "...", "projectId": "...", ... } ] }
//! ```
//!
//! # Salt
//!
//! The salt is generated once per installation and never rotated. It lets
//! callers derive stable, non-reversible public identifiers from raw
//! secrets ([`CredentialRepository::public_id`]).
//!
//! # Legacy documents
//!
//! Older installations stored a bare array of records. Such a file is
//! upgraded in place to `{ salt, tokens }` the first time it is read.
//!
//! # Failure semantics
//!
//! Reads and merges never fail: I/O errors and malformed files are logged
//! and read as an empty set. [`write_all`](CredentialRepository::write_all)
//! is the one operation that returns an error, since a lost write is
//! data loss.

mod record;

pub use record::{CredentialDocument, CredentialRecord, TRANSIENT_FIELDS};

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use moka::sync::Cache;
use rand::RngCore;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::{Result, store, telemetry};
use record::{LoadedDocument, parse_document};

/// Default time `read_all` may serve the cached set.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5);

/// Bytes of randomness in a freshly generated salt (hex-encoded on disk).
const SALT_BYTES: usize = 32;

/// Hex characters kept from the digest in [`CredentialRepository::public_id`].
const PUBLIC_ID_LEN: usize = 16;

/// Borrowed form of [`CredentialDocument`] for writing without cloning.
#[derive(Serialize)]
struct DocumentRef<'a> {
    salt: &'a str,
    tokens: &'a [CredentialRecord],
}

/// File-backed store of upstream credential records.
///
/// Thread-safe. Document rewrites are serialised by an internal lock;
/// bulk reads are served from a TTL-bounded cache that every successful
/// write replaces. A read that raced a write never repopulates the cache
/// with what it loaded.
pub struct CredentialRepository {
    path: PathBuf,
    salt: Mutex<Option<String>>,
    doc_lock: Mutex<()>,
    cache: Option<Cache<(), Arc<Vec<CredentialRecord>>>>,
    /// Bumped under `doc_lock` by every write that replaces the cache.
    generation: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl CredentialRepository {
    /// Open (lazily) the credential document at `path` with the default cache TTL.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_cache_ttl(path, DEFAULT_CACHE_TTL)
    }

    /// Open with a custom cache TTL. A zero TTL disables caching.
    pub fn with_cache_ttl(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self::with_clock(path, ttl, Arc::new(SystemClock))
    }

    pub(crate) fn with_clock(path: impl Into<PathBuf>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        let path = path.into();
        if let Some(parent) = path.parent() {
            store::ensure_dir(parent);
        }
        let cache = (!ttl.is_zero()).then(|| Cache::builder().max_capacity(1).time_to_live(ttl).build());
        Self {
            path,
            salt: Mutex::new(None),
            doc_lock: Mutex::new(()),
            cache,
            generation: AtomicU64::new(0),
            clock,
        }
    }

    /// Path of the credential document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The installation salt.
    ///
    /// Generated and persisted when the document is missing, legacy-shaped
    /// or has no salt. Cached for the process lifetime once it is known to
    /// be on disk.
    pub fn salt(&self) -> String {
        let mut cached = self.salt.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(salt) = cached.as_ref() {
            return salt.clone();
        }

        let _doc = self.doc_lock.lock().unwrap_or_else(|e| e.into_inner());
        let (salt, persisted) = self.ensure_salt_on_disk();
        if persisted {
            *cached = Some(salt.clone());
        }
        salt
    }

    /// Stable public identifier for a secret: hex SHA-256 of `salt || secret`,
    /// truncated to 16 characters.
    pub fn public_id(&self, secret: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.salt().as_bytes());
        hasher.update(secret.as_bytes());
        let mut id = hex::encode(hasher.finalize());
        id.truncate(PUBLIC_ID_LEN);
        id
    }

    /// All credential records.
    ///
    /// Served from the in-memory cache while it is fresh. Missing or
    /// malformed documents read as an empty set (logged).
    pub fn read_all(&self) -> Vec<CredentialRecord> {
        if let Some(records) = self.cache.as_ref().and_then(|c| c.get(&())) {
            metrics::counter!(telemetry::CREDENTIAL_CACHE_HITS_TOTAL).increment(1);
            return records.as_ref().clone();
        }
        metrics::counter!(telemetry::CREDENTIAL_CACHE_MISSES_TOTAL).increment(1);

        let seen = self.generation.load(Ordering::SeqCst);
        let records = match self.load_document() {
            Some(LoadedDocument::Legacy(tokens)) => {
                self.upgrade_legacy();
                tokens
            }
            Some(doc) => doc.tokens(),
            None => Vec::new(),
        };
        self.cache_if_current(seen, records.clone());
        records
    }

    /// Replace the whole credential set on disk.
    ///
    /// The write is atomic (tmp + rename) and refreshes the cache, so a
    /// following `read_all` on this process observes it.
    pub fn write_all(&self, records: &[CredentialRecord]) -> Result<()> {
        let salt = self.salt();
        let _doc = self.doc_lock.lock().unwrap_or_else(|e| e.into_inner());
        store::write_json_atomic(
            &self.path,
            &DocumentRef {
                salt: &salt,
                tokens: records,
            },
        )?;
        self.replace_cache(records.to_vec());
        debug!(count = records.len(), "credential document written");
        Ok(())
    }

    /// Merge in-memory credential state back into the on-disk set.
    ///
    /// For each record of `active` (or only `single`, when given) the
    /// on-disk record with the same `refresh_token` has the active record's
    /// fields shallow-merged over it, except [`TRANSIENT_FIELDS`]. On-disk
    /// records without an active counterpart are left untouched, so
    /// accounts the caller does not track survive the merge. Failures are
    /// logged, not returned.
    pub fn merge_active_tokens(&self, active: &[CredentialRecord], single: Option<&CredentialRecord>) {
        let salt = self.salt();
        let _doc = self.doc_lock.lock().unwrap_or_else(|e| e.into_inner());

        let Some(doc) = self.load_document() else {
            warn!(path = %self.path.display(), "credential document unreadable, merge skipped");
            return;
        };
        let mut records = doc.tokens();

        let updates: Vec<&CredentialRecord> = match single {
            Some(record) => vec![record],
            None => active.iter().collect(),
        };

        let mut merged = 0usize;
        for update in updates {
            if update.refresh_token.is_empty() {
                continue;
            }
            let Some(target) = records
                .iter_mut()
                .find(|r| r.refresh_token == update.refresh_token)
            else {
                continue;
            };
            match target.overlay(update) {
                Ok(()) => merged += 1,
                Err(e) => warn!(error = %e, "failed to merge credential record"),
            }
        }

        if merged == 0 {
            debug!("no active credentials matched the on-disk set");
            return;
        }

        match store::write_json_atomic(
            &self.path,
            &DocumentRef {
                salt: &salt,
                tokens: &records,
            },
        ) {
            Ok(()) => {
                debug!(merged, total = records.len(), "active credentials merged");
                self.replace_cache(records);
            }
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to persist merged credentials"),
        }
    }

    /// Drop the cached set so the next `read_all` goes to disk.
    pub fn invalidate_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.invalidate(&());
        }
    }

    /// Install records just written. Caller holds `doc_lock`.
    fn replace_cache(&self, records: Vec<CredentialRecord>) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(cache) = &self.cache {
            cache.insert((), Arc::new(records));
        }
    }

    /// Install records loaded by a reader, unless a write has completed
    /// since generation `seen` was observed.
    fn cache_if_current(&self, seen: u64, records: Vec<CredentialRecord>) {
        let Some(cache) = &self.cache else {
            return;
        };
        let _doc = self.doc_lock.lock().unwrap_or_else(|e| e.into_inner());
        if self.generation.load(Ordering::SeqCst) == seen {
            cache.insert((), Arc::new(records));
        } else {
            debug!("credential document changed during read, not caching");
        }
    }

    /// Load and normalise the document.
    ///
    /// `None` means the file exists but could not be read or parsed; the
    /// failure has been logged.
    fn load_document(&self) -> Option<LoadedDocument> {
        let text = match store::read_text(&self.path) {
            Ok(Some(text)) => text,
            Ok(None) => return Some(LoadedDocument::Missing),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read credential document");
                return None;
            }
        };
        match parse_document(&text) {
            Ok(doc) => Some(doc),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "corrupt credential document");
                None
            }
        }
    }

    /// Make sure the on-disk document carries a salt. Caller holds `doc_lock`.
    ///
    /// Returns the salt and whether it is persisted.
    fn ensure_salt_on_disk(&self) -> (String, bool) {
        let tokens = match self.load_document() {
            Some(LoadedDocument::Current {
                salt: Some(salt), ..
            }) => return (salt, true),
            Some(LoadedDocument::Current { tokens, .. }) => tokens,
            Some(LoadedDocument::Legacy(tokens)) => {
                info!(
                    path = %self.path.display(),
                    count = tokens.len(),
                    "migrating legacy credential document"
                );
                tokens
            }
            Some(LoadedDocument::Missing) => Vec::new(),
            None => {
                // Unreadable or corrupt: keep the bytes, start fresh.
                if self.path.exists() {
                    if let Some(moved) = store::quarantine(&self.path, self.clock.now_ms()) {
                        warn!(moved_to = %moved.display(), "corrupt credential document quarantined");
                    }
                }
                Vec::new()
            }
        };

        let salt = generate_salt();
        match store::write_json_atomic(
            &self.path,
            &DocumentRef {
                salt: &salt,
                tokens: &tokens,
            },
        ) {
            Ok(()) => {
                info!(path = %self.path.display(), "generated installation salt");
                (salt, true)
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to persist installation salt");
                (salt, false)
            }
        }
    }

    /// Rewrite a legacy bare-array file in the current shape.
    fn upgrade_legacy(&self) {
        let salt = self.salt();
        let _doc = self.doc_lock.lock().unwrap_or_else(|e| e.into_inner());
        // `salt()` may already have migrated it.
        if let Some(LoadedDocument::Legacy(tokens)) = self.load_document() {
            info!(path = %self.path.display(), count = tokens.len(), "migrating legacy credential document");
            if let Err(e) = store::write_json_atomic(
                &self.path,
                &DocumentRef {
                    salt: &salt,
                    tokens: &tokens,
                },
            ) {
                warn!(path = %self.path.display(), error = %e, "failed to migrate legacy credential document");
            }
        }
    }
}

fn generate_salt() -> String {
    let mut bytes = [0u8; SALT_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo(dir: &tempfile::TempDir) -> CredentialRepository {
        CredentialRepository::new(dir.path().join("accounts.json"))
    }

    #[test]
    fn salt_is_generated_once() {
        let dir = tempfile::tempdir().unwrap();
        let first = repo(&dir).salt();
        assert_eq!(first.len(), SALT_BYTES * 2);

        // New instance, same file → same salt
        let second = repo(&dir).salt();
        assert_eq!(first, second);
    }

    #[test]
    fn salt_added_to_saltless_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accounts.json");
        std::fs::write(&path, r#"{"tokens": [{"refresh_token": "a"}]}"#).unwrap();

        let repo = CredentialRepository::new(&path);
        let salt = repo.salt();

        let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["salt"], salt.as_str());
        assert_eq!(raw["tokens"][0]["refresh_token"], "a");
    }

    #[test]
    fn corrupt_document_is_quarantined_on_salt_generation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accounts.json");
        std::fs::write(&path, "{{{ not json").unwrap();

        let repo = CredentialRepository::new(&path);
        assert!(repo.read_all().is_empty());
        let _ = repo.salt();

        let quarantined = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .any(|e| e.file_name().to_string_lossy().starts_with("accounts.json.corrupt-"));
        assert!(quarantined);
        assert!(parse_document(&std::fs::read_to_string(&path).unwrap()).is_ok());
    }

    #[test]
    fn public_id_is_stable_and_salted() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        let a = repo(&dir_a);
        let b = repo(&dir_b);

        assert_eq!(a.public_id("secret"), a.public_id("secret"));
        assert_eq!(a.public_id("secret").len(), PUBLIC_ID_LEN);
        assert_ne!(a.public_id("secret"), a.public_id("other"));
        assert_ne!(a.public_id("secret"), b.public_id("secret"));
    }

    #[test]
    fn zero_ttl_disables_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accounts.json");
        let repo = CredentialRepository::with_cache_ttl(&path, Duration::ZERO);
        repo.write_all(&[CredentialRecord::new("a")]).unwrap();

        // External edit is visible immediately without a cache.
        let salt = repo.salt();
        std::fs::write(
            &path,
            format!(r#"{{"salt": "{salt}", "tokens": [{{"refresh_token": "b"}}]}}"#),
        )
        .unwrap();
        assert_eq!(repo.read_all()[0].refresh_token, "b");
    }

    #[test]
    fn read_that_raced_a_write_does_not_overwrite_the_cache() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repo(&dir);
        repo.write_all(&[CredentialRecord::new("old")]).unwrap();
        repo.invalidate_cache();

        // A reader observes the generation and loads the old document...
        let seen = repo.generation.load(Ordering::SeqCst);
        let loaded = repo.read_all();
        assert_eq!(loaded[0].refresh_token, "old");

        // ...a write completes before it gets to cache what it loaded.
        repo.write_all(&[CredentialRecord::new("new")]).unwrap();
        repo.cache_if_current(seen, loaded);

        assert_eq!(repo.read_all()[0].refresh_token, "new");
    }

    #[test]
    fn merge_skips_unreadable_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accounts.json");
        let repo = CredentialRepository::new(&path);
        let _ = repo.salt();
        std::fs::write(&path, "garbage").unwrap();

        repo.merge_active_tokens(&[CredentialRecord::new("a")], None);
        // left as-is for an operator to inspect
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "garbage");
    }
}
