//! Credential record and document types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{MuninnError, Result};

/// Keys that live only for a session and are never merged back to disk.
pub const TRANSIENT_FIELDS: &[&str] = &["sessionId"];

/// One upstream account's auth material.
///
/// Known fields are typed; anything else the OAuth flow or admin layer
/// stores is kept in [`extra`](Self::extra) and round-trips untouched.
/// `refresh_token` is the identity key used by
/// [`merge_active_tokens`](super::CredentialRepository::merge_active_tokens).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Access-token lifetime in seconds, as reported by the token endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    /// When `access_token` was obtained, epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    #[serde(
        default,
        rename = "projectId",
        skip_serializing_if = "Option::is_none"
    )]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Deactivated accounts stay in the document with `enable = false`.
    #[serde(default = "default_enable")]
    pub enable: bool,
    /// Session-scoped; see [`TRANSIENT_FIELDS`].
    #[serde(
        default,
        rename = "sessionId",
        skip_serializing_if = "Option::is_none"
    )]
    pub session_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_enable() -> bool {
    true
}

impl CredentialRecord {
    /// A minimal enabled record identified by `refresh_token`.
    pub fn new(refresh_token: impl Into<String>) -> Self {
        Self {
            refresh_token: refresh_token.into(),
            access_token: None,
            expires_in: None,
            timestamp: None,
            project_id: None,
            email: None,
            enable: true,
            session_id: None,
            extra: Map::new(),
        }
    }

    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_access_token(mut self, access_token: impl Into<String>) -> Self {
        self.access_token = Some(access_token.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Shallow-merge `patch`'s serialised fields over this record.
    ///
    /// Every top-level key present in `patch` replaces the same key here;
    /// keys absent from `patch` are kept. Transient keys are skipped.
    pub(crate) fn overlay(&mut self, patch: &CredentialRecord) -> Result<()> {
        let mut merged = into_object(serde_json::to_value(&*self)?)?;
        let mut fields = into_object(serde_json::to_value(patch)?)?;
        for key in TRANSIENT_FIELDS {
            fields.remove(*key);
        }
        merged.extend(fields);
        *self = serde_json::from_value(Value::Object(merged))?;
        Ok(())
    }
}

fn into_object(value: Value) -> Result<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(MuninnError::Malformed {
            document: "credential record",
            reason: format!("expected object, got {other}"),
        }),
    }
}

/// The persisted credential document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialDocument {
    pub salt: String,
    pub tokens: Vec<CredentialRecord>,
}

/// What a credential file turned out to contain.
#[derive(Debug)]
pub(crate) enum LoadedDocument {
    /// No file yet.
    Missing,
    /// `{ salt, tokens }`; `salt` is `None` when absent or empty.
    Current {
        salt: Option<String>,
        tokens: Vec<CredentialRecord>,
    },
    /// Pre-salt bare array of records.
    Legacy(Vec<CredentialRecord>),
}

impl LoadedDocument {
    pub(crate) fn tokens(self) -> Vec<CredentialRecord> {
        match self {
            LoadedDocument::Missing => Vec::new(),
            LoadedDocument::Current { tokens, .. } | LoadedDocument::Legacy(tokens) => tokens,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDocument {
    Current {
        #[serde(default)]
        salt: Option<String>,
        #[serde(default)]
        tokens: Vec<CredentialRecord>,
    },
    Legacy(Vec<CredentialRecord>),
}

/// Normalise a credential file's text into a [`LoadedDocument`].
///
/// Accepts both the current `{ salt, tokens }` shape and the legacy bare
/// array. Anything else is malformed.
pub(crate) fn parse_document(text: &str) -> Result<LoadedDocument> {
    let raw: RawDocument = serde_json::from_str(text).map_err(|e| MuninnError::Malformed {
        document: "credential document",
        reason: e.to_string(),
    })?;
    Ok(match raw {
        RawDocument::Current { salt, tokens } => LoadedDocument::Current {
            salt: salt.filter(|s| !s.is_empty()),
            tokens,
        },
        RawDocument::Legacy(tokens) => LoadedDocument::Legacy(tokens),
    })
}
