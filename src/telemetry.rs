//! Telemetry metric name constants.
//!
//! Centralised metric names for muninn state transitions. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `muninn_`. Counters end in `_total`.
//!
//! # Common labels
//!
//! - `family`: model family, one of "claude", "gemini", "gemini-image", "other"

/// Cooldowns recorded via `set_cooldown`.
///
/// Labels: `family`.
pub const COOLDOWNS_SET_TOTAL: &str = "muninn_cooldowns_set_total";

/// Cooldown entries observed as expired and released (lazily or at startup).
///
/// Labels: `family`.
pub const COOLDOWNS_EXPIRED_TOTAL: &str = "muninn_cooldowns_expired_total";

/// Cooldown entries released manually via `clear_cooldown` / `clear_all_cooldowns`.
///
/// Labels: `family`.
pub const COOLDOWNS_CLEARED_TOTAL: &str = "muninn_cooldowns_cleared_total";

/// Signature lookups that found an entry.
pub const SIGNATURE_HITS_TOTAL: &str = "muninn_signature_hits_total";

/// Signature lookups that found nothing.
pub const SIGNATURE_MISSES_TOTAL: &str = "muninn_signature_misses_total";

/// Signatures appended to a model history.
pub const SIGNATURE_WRITES_TOTAL: &str = "muninn_signature_writes_total";

/// Credential reads served from the in-memory cache.
pub const CREDENTIAL_CACHE_HITS_TOTAL: &str = "muninn_credential_cache_hits_total";

/// Credential reads that went to disk.
pub const CREDENTIAL_CACHE_MISSES_TOTAL: &str = "muninn_credential_cache_misses_total";
