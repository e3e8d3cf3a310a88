//! StateLayer - the three state components built from one configuration

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;
use crate::{
    CooldownRegistry, CredentialRepository, Result, SignatureCache, SignatureOptions,
    SignaturePolicy,
};

/// The credential repository, cooldown registry and signature cache of
/// one installation.
///
/// The components are independent; this type only owns them so the
/// routing layer can share one handle. Cloning is cheap.
#[derive(Clone)]
pub struct StateLayer {
    data_dir: PathBuf,
    credentials: Arc<CredentialRepository>,
    cooldowns: Arc<CooldownRegistry>,
    signatures: Arc<SignatureCache>,
    signature_policy: SignaturePolicy,
}

impl StateLayer {
    pub(crate) fn new(
        data_dir: PathBuf,
        credentials: CredentialRepository,
        cooldowns: CooldownRegistry,
        signatures: SignatureCache,
        signature_policy: SignaturePolicy,
    ) -> Self {
        Self {
            data_dir,
            credentials: Arc::new(credentials),
            cooldowns: Arc::new(cooldowns),
            signatures: Arc::new(signatures),
            signature_policy,
        }
    }

    /// Build the layer described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        crate::Muninn::builder().config(config).build()
    }

    /// Root directory of the persisted state.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn credentials(&self) -> &Arc<CredentialRepository> {
        &self.credentials
    }

    pub fn cooldowns(&self) -> &Arc<CooldownRegistry> {
        &self.cooldowns
    }

    pub fn signatures(&self) -> &Arc<SignatureCache> {
        &self.signatures
    }

    /// Signature policy configured for this installation.
    pub fn signature_policy(&self) -> SignaturePolicy {
        self.signature_policy
    }

    /// Per-call signature options under the configured policy.
    pub fn signature_options(&self, has_tools: bool) -> SignatureOptions {
        SignatureOptions::new(self.signature_policy).has_tools(has_tools)
    }
}
