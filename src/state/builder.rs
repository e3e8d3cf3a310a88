//! Builder for configuring state layer instances

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::StateLayer;
use crate::clock::{Clock, SystemClock};
use crate::config::{Config, StorageConfig};
use crate::{
    CooldownRegistry, CredentialRepository, MuninnError, Result, SignatureCache, SignaturePolicy,
};

/// Main entry point for creating state layer instances.
pub struct Muninn;

impl Muninn {
    /// Create a new builder for configuring the state layer.
    pub fn builder() -> MuninnBuilder {
        MuninnBuilder::new()
    }
}

/// Builder for configuring state layer instances.
///
/// ```rust,no_run
/// # use muninn::{Muninn, SignaturePolicy};
/// # use std::time::Duration;
/// let state = Muninn::builder()
///     .data_dir("/var/lib/proxy")
///     .credential_cache_ttl(Duration::from_secs(10))
///     .signature_policy(SignaturePolicy::new().cache_tool_signatures(true))
///     .build()?;
/// # Ok::<(), muninn::MuninnError>(())
/// ```
pub struct MuninnBuilder {
    storage: StorageConfig,
    credential_cache_ttl: Duration,
    signature_policy: SignaturePolicy,
    clock: Arc<dyn Clock>,
}

impl MuninnBuilder {
    pub fn new() -> Self {
        let config = Config::default();
        Self {
            storage: config.storage,
            credential_cache_ttl: config.credentials.cache_ttl(),
            signature_policy: config.signatures,
            clock: Arc::new(SystemClock),
        }
    }

    /// Take storage, cache TTL and signature policy from `config`.
    pub fn config(mut self, config: &Config) -> Self {
        self.storage = config.storage.clone();
        self.credential_cache_ttl = config.credentials.cache_ttl();
        self.signature_policy = config.signatures;
        self
    }

    /// Root directory for all state files; file names keep their defaults
    /// unless set through [`config`](Self::config).
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage.data_dir = dir.into();
        self
    }

    /// How long credential reads may be served from memory. Zero disables caching.
    pub fn credential_cache_ttl(mut self, ttl: Duration) -> Self {
        self.credential_cache_ttl = ttl;
        self
    }

    pub fn signature_policy(mut self, policy: SignaturePolicy) -> Self {
        self.signature_policy = policy;
        self
    }

    /// Clock used for cooldown deadlines and signature timestamps.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Create the data directory and open every component.
    ///
    /// Fails if the storage layout is invalid or the data directory cannot
    /// be created.
    pub fn build(self) -> Result<StateLayer> {
        self.storage.validate()?;
        let data_dir = self.storage.data_dir.clone();
        std::fs::create_dir_all(&data_dir).map_err(|e| MuninnError::io(&data_dir, e))?;

        let credentials = CredentialRepository::with_clock(
            self.storage.credentials_path(),
            self.credential_cache_ttl,
            Arc::clone(&self.clock),
        );
        let cooldowns =
            CooldownRegistry::with_clock(self.storage.cooldowns_path(), Arc::clone(&self.clock));
        let signatures =
            SignatureCache::with_clock(self.storage.signatures_path(), Arc::clone(&self.clock));

        Ok(StateLayer::new(
            data_dir,
            credentials,
            cooldowns,
            signatures,
            self.signature_policy,
        ))
    }
}

impl Default for MuninnBuilder {
    fn default() -> Self {
        Self::new()
    }
}
