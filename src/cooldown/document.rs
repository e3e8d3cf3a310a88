//! On-disk cooldown document and its load-time normalisation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::family::ModelFamily;
use crate::{MuninnError, Result};

/// Current cooldown document format version.
pub(crate) const DOCUMENT_VERSION: u32 = 1;

/// In-memory cooldown state: credential id → family → deadline (epoch ms).
pub(crate) type CooldownMap = BTreeMap<String, BTreeMap<ModelFamily, u64>>;

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct CooldownDocument {
    #[serde(default)]
    pub meta: DocumentMeta,
    #[serde(default)]
    pub cooldowns: BTreeMap<String, BTreeMap<String, Option<CooldownEntry>>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct DocumentMeta {
    pub version: u32,
}

impl Default for DocumentMeta {
    fn default() -> Self {
        Self {
            version: DOCUMENT_VERSION,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub(crate) struct CooldownEntry {
    pub until: u64,
}

impl CooldownDocument {
    pub(crate) fn empty() -> Self {
        Self {
            meta: DocumentMeta::default(),
            cooldowns: BTreeMap::new(),
        }
    }

    /// Snapshot `map`, keeping only deadlines after `now_ms` and only
    /// credentials that still have one.
    pub(crate) fn from_map(map: &CooldownMap, now_ms: u64) -> Self {
        let cooldowns = map
            .iter()
            .filter_map(|(id, families)| {
                let live: BTreeMap<String, Option<CooldownEntry>> = families
                    .iter()
                    .filter(|(_, until)| **until > now_ms)
                    .map(|(family, until)| {
                        (family.as_str().to_string(), Some(CooldownEntry { until: *until }))
                    })
                    .collect();
                (!live.is_empty()).then(|| (id.clone(), live))
            })
            .collect();
        Self {
            meta: DocumentMeta::default(),
            cooldowns,
        }
    }
}

/// Parse the persisted text into the in-memory map.
///
/// `null` entries and unknown family keys are dropped. A document from a
/// newer format version is rejected.
pub(crate) fn parse_document(text: &str) -> Result<CooldownMap> {
    let doc: CooldownDocument = serde_json::from_str(text).map_err(|e| MuninnError::Malformed {
        document: "cooldown document",
        reason: e.to_string(),
    })?;
    if doc.meta.version > DOCUMENT_VERSION {
        return Err(MuninnError::UnsupportedVersion {
            document: "cooldown document",
            found: doc.meta.version,
            max: DOCUMENT_VERSION,
        });
    }

    let mut map = CooldownMap::new();
    for (id, families) in doc.cooldowns {
        let mut parsed = BTreeMap::new();
        for (key, entry) in families {
            let Some(entry) = entry else { continue };
            match key.parse::<ModelFamily>() {
                Ok(family) => {
                    parsed.insert(family, entry.until);
                }
                Err(e) => warn!(credential = %id, error = %e, "dropping cooldown for unknown family"),
            }
        }
        if !parsed.is_empty() {
            map.insert(id, parsed);
        }
    }
    Ok(map)
}
