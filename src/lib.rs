//! Muninn - credential pool and continuity state for multi-account LLM proxies
//!
//! A reverse proxy that spreads traffic over many OAuth-authenticated
//! upstream accounts needs to remember a few facts between requests.
//! This crate keeps them, persisted as small JSON documents:
//!
//! - [`CredentialRepository`]: the account records themselves, plus an
//!   installation salt for deriving public identifiers.
//! - [`CooldownRegistry`]: which account is out of quota for which
//!   [`ModelFamily`], and until when.
//! - [`SignatureCache`]: the last few reasoning/tool-call signatures per
//!   model, so a conversation can continue across stateless requests.
//!
//! The three components never call each other; the routing layer decides
//! what to ask when. [`StateLayer`] just builds all three from one
//! [`Config`].
//!
//! # Example
//!
//! ```rust,no_run
//! use muninn::{Muninn, SignaturePolicy};
//!
//! fn main() -> muninn::Result<()> {
//!     let state = Muninn::builder()
//!         .data_dir("/var/lib/proxy")
//!         .signature_policy(SignaturePolicy::new().cache_tool_signatures(true))
//!         .build()?;
//!
//!     let account = "acct-1";
//!     if state.cooldowns().is_available(account, "claude-sonnet-4") {
//!         // ... forward the request; on quota exhaustion:
//!         state
//!             .cooldowns()
//!             .set_cooldown_for(account, "claude-sonnet-4", std::time::Duration::from_secs(3600));
//!     }
//!
//!     let opts = state.signature_options(true);
//!     state.signatures().set_signature("claude-sonnet-4", "sig-abc", "thinking...", &opts);
//!     let latest = state.signatures().get_signature("claude-sonnet-4", &opts);
//!     assert_eq!(latest.map(|e| e.signature), Some("sig-abc".to_string()));
//!     Ok(())
//! }
//! ```

pub mod clock;
pub mod config;
pub mod cooldown;
pub mod credentials;
pub mod error;
pub mod family;
pub mod signature;
pub mod state;
mod store;
pub mod telemetry;
mod version;

// Re-export main types at crate root
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use cooldown::{CooldownRegistry, CooldownSnapshot, CooldownStatus};
pub use credentials::{CredentialDocument, CredentialRecord, CredentialRepository};
pub use error::{MuninnError, Result};
pub use family::{ModelFamily, is_image_model};
pub use signature::{
    SignatureCache, SignatureEntry, SignatureOptions, SignaturePolicy, base_model_name,
    should_cache,
};
pub use state::{Muninn, MuninnBuilder, StateLayer};
pub use version::{PKG_VERSION, git_dirty, version_string};
