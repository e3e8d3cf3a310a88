//! Signature caching policy.

use serde::{Deserialize, Serialize};

/// Which continuity signatures are worth remembering.
///
/// All flags default to off, i.e. nothing is cached until the operator
/// opts in.
///
/// ```rust
/// # use muninn::SignaturePolicy;
/// let policy = SignaturePolicy::new()
///     .cache_tool_signatures(true)
///     .retain_reasoning_content(true);
/// assert!(!policy.cache_all);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignaturePolicy {
    /// Cache every signature regardless of request shape.
    pub cache_all: bool,
    /// Cache signatures of requests that declared tools.
    pub cache_tool_signatures: bool,
    /// Cache signatures produced by image models.
    pub cache_image_signatures: bool,
    /// Keep the reasoning text next to the signature. When off, a
    /// single-space placeholder is stored and returned instead.
    pub retain_reasoning_content: bool,
}

impl SignaturePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache_all(mut self, enabled: bool) -> Self {
        self.cache_all = enabled;
        self
    }

    pub fn cache_tool_signatures(mut self, enabled: bool) -> Self {
        self.cache_tool_signatures = enabled;
        self
    }

    pub fn cache_image_signatures(mut self, enabled: bool) -> Self {
        self.cache_image_signatures = enabled;
        self
    }

    pub fn retain_reasoning_content(mut self, enabled: bool) -> Self {
        self.retain_reasoning_content = enabled;
        self
    }
}

/// Per-call options for [`SignatureCache`](super::SignatureCache) operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignatureOptions {
    /// Policy in effect for this call.
    pub policy: SignaturePolicy,
    /// Whether the request that produced the signature used tools.
    pub has_tools: bool,
}

impl SignatureOptions {
    pub fn new(policy: SignaturePolicy) -> Self {
        Self {
            policy,
            has_tools: false,
        }
    }

    pub fn has_tools(mut self, has_tools: bool) -> Self {
        self.has_tools = has_tools;
        self
    }
}

impl From<SignaturePolicy> for SignatureOptions {
    fn from(policy: SignaturePolicy) -> Self {
        Self::new(policy)
    }
}

/// Decide whether a signature should be cached.
///
/// True if the policy caches everything, or tool signatures are enabled and
/// the request used tools, or image signatures are enabled and the model is
/// an image model.
pub fn should_cache(has_tools: bool, is_image_model: bool, policy: &SignaturePolicy) -> bool {
    policy.cache_all
        || (policy.cache_tool_signatures && has_tools)
        || (policy.cache_image_signatures && is_image_model)
}
