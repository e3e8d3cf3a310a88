//! Model-family classification.
//!
//! Cooldowns are scoped per provider product line rather than per model,
//! so a credential that exhausted its Claude quota can still serve Gemini.
//! Classification is a case-insensitive substring match evaluated in a
//! fixed priority order:
//!
//! 1. contains `claude` → [`ModelFamily::Claude`]
//! 2. contains [`IMAGE_VARIANT_MARKER`] → [`ModelFamily::GeminiImage`]
//! 3. contains `gemini` → [`ModelFamily::Gemini`]
//! 4. anything else → [`ModelFamily::Other`]
//!
//! The image marker is itself a superstring of `gemini`, so step 2 must run
//! before step 3.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Model id substring identifying the image-generation Gemini variant.
pub const IMAGE_VARIANT_MARKER: &str = "gemini-3-pro-image";

/// Coarse provider product line used to scope cooldowns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelFamily {
    Claude,
    Gemini,
    /// Written as `gemini-image`; the bare marker is accepted on read.
    #[serde(alias = "gemini-3-pro-image")]
    GeminiImage,
    Other,
}

impl ModelFamily {
    /// All families, in classification priority order.
    pub const ALL: [ModelFamily; 4] = [
        ModelFamily::Claude,
        ModelFamily::GeminiImage,
        ModelFamily::Gemini,
        ModelFamily::Other,
    ];

    /// Classify a raw model identifier.
    ///
    /// ```rust
    /// # use muninn::ModelFamily;
    /// assert_eq!(ModelFamily::classify("claude-3-opus"), ModelFamily::Claude);
    /// assert_eq!(ModelFamily::classify("gemini-3-pro-image-4K"), ModelFamily::GeminiImage);
    /// assert_eq!(ModelFamily::classify("Gemini-2.5-Pro"), ModelFamily::Gemini);
    /// assert_eq!(ModelFamily::classify("gpt-4o"), ModelFamily::Other);
    /// ```
    pub fn classify(model: &str) -> Self {
        let lower = model.to_lowercase();
        if lower.contains("claude") {
            ModelFamily::Claude
        } else if lower.contains(IMAGE_VARIANT_MARKER) {
            ModelFamily::GeminiImage
        } else if lower.contains("gemini") {
            ModelFamily::Gemini
        } else {
            ModelFamily::Other
        }
    }

    /// Stable key used in persisted documents and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFamily::Claude => "claude",
            ModelFamily::Gemini => "gemini",
            ModelFamily::GeminiImage => "gemini-image",
            ModelFamily::Other => "other",
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == IMAGE_VARIANT_MARKER {
            return Ok(ModelFamily::GeminiImage);
        }
        ModelFamily::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| format!("unknown model family '{s}'"))
    }
}

/// Whether a model id names an image-generation model.
///
/// Heuristic: the id contains `image`, case-insensitively. Broader than
/// [`IMAGE_VARIANT_MARKER`], which only selects the cooldown family.
pub fn is_image_model(model: &str) -> bool {
    model.to_lowercase().contains("image")
}
