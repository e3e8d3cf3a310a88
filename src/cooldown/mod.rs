//! Per-credential, per-family cooldown registry.
//!
//! When an upstream reports quota exhaustion, the routing layer records a
//! deadline for that credential and the request's [`ModelFamily`]. Until
//! the deadline passes, [`CooldownRegistry::is_available`] answers `false`
//! for any model in that family; other families are unaffected.
//!
//! # State machine
//!
//! Each `(credential, family)` pair is either *available* (no entry) or
//! *cooling* until a deadline. `set_cooldown` always overwrites the
//! deadline, even with an earlier one. An entry whose deadline has passed
//! is treated exactly like a missing one; checks that observe it remove it
//! and persist, and the constructor sweeps all of them once at startup.
//!
//! # Persistence
//!
//! The in-memory map is the source of truth; the file is write-through:
//!
//! ```json
//! { "meta": { "version": 1 }, "cooldowns": { "<credential>": { "claude": { "until": 1700000000000 } } } }
//! ```
//!
//! Only live entries are written, and credentials with none are omitted.

mod document;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::clock::{Clock, SystemClock, format_local};
use crate::family::ModelFamily;
use crate::{store, telemetry};
use document::{CooldownDocument, CooldownMap, parse_document};

/// A live cooldown, as reported by [`CooldownRegistry::list_all`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CooldownStatus {
    /// Deadline, epoch milliseconds.
    pub until: u64,
    /// Deadline rendered in local time.
    pub until_formatted: String,
}

/// Snapshot of all live cooldowns: credential id → family → status.
pub type CooldownSnapshot = BTreeMap<String, BTreeMap<ModelFamily, CooldownStatus>>;

/// Tracks which credentials are cooling down for which model families.
///
/// Thread-safe; every transition happens under one internal lock, and the
/// file is rewritten while that lock is held.
pub struct CooldownRegistry {
    path: PathBuf,
    state: Mutex<CooldownMap>,
    clock: Arc<dyn Clock>,
}

impl CooldownRegistry {
    /// Load the registry from `path`, creating the file if absent and
    /// releasing every cooldown that already expired.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_clock(path, Arc::new(SystemClock))
    }

    /// Like [`new`](Self::new) with a custom clock.
    pub fn with_clock(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        let path = path.into();
        let map = load(&path);
        let registry = Self {
            path,
            state: Mutex::new(map),
            clock,
        };
        registry.sweep_expired();
        registry
    }

    /// Path of the cooldown document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Put `credential_id` on cooldown for `model`'s family until `until_ms`.
    ///
    /// Overwrites any existing deadline for that family, including a later
    /// one. No-op when `credential_id` is empty or `until_ms` is absent or
    /// zero.
    pub fn set_cooldown(&self, credential_id: &str, model: &str, until_ms: Option<u64>) {
        let Some(until) = until_ms.filter(|u| *u > 0) else {
            return;
        };
        if credential_id.is_empty() {
            return;
        }

        let family = ModelFamily::classify(model);
        let mut state = self.lock();
        state
            .entry(credential_id.to_string())
            .or_default()
            .insert(family, until);
        self.persist(&state);
        drop(state);

        metrics::counter!(telemetry::COOLDOWNS_SET_TOTAL, "family" => family.as_str()).increment(1);
        info!(
            credential = credential_id,
            model,
            %family,
            until,
            until_local = %format_local(until),
            "credential cooling down"
        );
    }

    /// Put `credential_id` on cooldown for `model`'s family for `duration`
    /// from now.
    pub fn set_cooldown_for(&self, credential_id: &str, model: &str, duration: Duration) {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        let until = self.clock.now_ms().saturating_add(millis);
        self.set_cooldown(credential_id, model, Some(until));
    }

    /// Whether `credential_id` may serve `model` right now.
    ///
    /// An expired entry observed here is released and persisted.
    pub fn is_available(&self, credential_id: &str, model: &str) -> bool {
        self.cooldown_until(credential_id, model).is_none()
    }

    /// Deadline of the live cooldown for `model`'s family, if any.
    ///
    /// Same expiry handling as [`is_available`](Self::is_available).
    pub fn cooldown_until(&self, credential_id: &str, model: &str) -> Option<u64> {
        if credential_id.is_empty() {
            return None;
        }

        let family = ModelFamily::classify(model);
        let now = self.clock.now_ms();
        let mut state = self.lock();
        let until = *state.get(credential_id)?.get(&family)?;
        if until > now {
            return Some(until);
        }

        remove_entry(&mut state, credential_id, family);
        self.persist(&state);
        drop(state);

        metrics::counter!(telemetry::COOLDOWNS_EXPIRED_TOTAL, "family" => family.as_str())
            .increment(1);
        info!(credential = credential_id, %family, "cooldown expired");
        None
    }

    /// Release `credential_id`'s cooldown for `model`'s family.
    pub fn clear_cooldown(&self, credential_id: &str, model: &str) {
        if credential_id.is_empty() {
            return;
        }

        let family = ModelFamily::classify(model);
        let mut state = self.lock();
        if !remove_entry(&mut state, credential_id, family) {
            return;
        }
        self.persist(&state);
        drop(state);

        metrics::counter!(telemetry::COOLDOWNS_CLEARED_TOTAL, "family" => family.as_str())
            .increment(1);
        info!(credential = credential_id, %family, "cooldown cleared");
    }

    /// Release every cooldown held by `credential_id`.
    pub fn clear_all_cooldowns(&self, credential_id: &str) {
        if credential_id.is_empty() {
            return;
        }

        let mut state = self.lock();
        let Some(families) = state.remove(credential_id) else {
            return;
        };
        self.persist(&state);
        drop(state);

        for family in families.keys() {
            metrics::counter!(telemetry::COOLDOWNS_CLEARED_TOTAL, "family" => family.as_str())
                .increment(1);
        }
        info!(credential = credential_id, families = families.len(), "all cooldowns cleared");
    }

    /// Snapshot of every live cooldown, for status displays.
    ///
    /// Expired entries are left out but not removed.
    pub fn list_all(&self) -> CooldownSnapshot {
        let now = self.clock.now_ms();
        let state = self.lock();
        state
            .iter()
            .filter_map(|(id, families)| {
                let live: BTreeMap<ModelFamily, CooldownStatus> = families
                    .iter()
                    .filter(|(_, until)| **until > now)
                    .map(|(family, until)| {
                        (
                            *family,
                            CooldownStatus {
                                until: *until,
                                until_formatted: format_local(*until),
                            },
                        )
                    })
                    .collect();
                (!live.is_empty()).then(|| (id.clone(), live))
            })
            .collect()
    }

    /// Release every expired entry; persist once if anything changed.
    fn sweep_expired(&self) {
        let now = self.clock.now_ms();
        let mut state = self.lock();
        let mut released = 0usize;

        state.retain(|id, families| {
            families.retain(|family, until| {
                let live = *until > now;
                if !live {
                    released += 1;
                    metrics::counter!(telemetry::COOLDOWNS_EXPIRED_TOTAL, "family" => family.as_str())
                        .increment(1);
                    info!(credential = %id, %family, "cooldown expired while offline");
                }
                live
            });
            !families.is_empty()
        });

        if released > 0 {
            self.persist(&state);
        }
    }

    fn lock(&self) -> MutexGuard<'_, CooldownMap> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Write the live part of `state`. Caller holds the state lock.
    fn persist(&self, state: &CooldownMap) {
        let doc = CooldownDocument::from_map(state, self.clock.now_ms());
        if let Err(e) = store::write_json_atomic(&self.path, &doc) {
            warn!(path = %self.path.display(), error = %e, "failed to persist cooldowns");
        }
    }
}

/// Remove one `(credential, family)` entry, dropping the credential when it
/// has none left. Returns whether anything was removed.
fn remove_entry(state: &mut CooldownMap, credential_id: &str, family: ModelFamily) -> bool {
    let Some(families) = state.get_mut(credential_id) else {
        return false;
    };
    let removed = families.remove(&family).is_some();
    if families.is_empty() {
        state.remove(credential_id);
    }
    removed
}

/// Read the persisted map. A missing file is created empty; unreadable or
/// malformed files read as empty and are repaired by the next write.
fn load(path: &Path) -> CooldownMap {
    match store::read_text(path) {
        Ok(Some(text)) => match parse_document(&text) {
            Ok(map) => map,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupt cooldown document, starting empty");
                CooldownMap::new()
            }
        },
        Ok(None) => {
            if let Err(e) = store::write_json_atomic(path, &CooldownDocument::empty()) {
                warn!(path = %path.display(), error = %e, "failed to create cooldown document");
            }
            CooldownMap::new()
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read cooldown document, starting empty");
            CooldownMap::new()
        }
    }
}
