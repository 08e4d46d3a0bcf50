//! Credential gate run before every tool call.
//!
//! The key comes from startup configuration or, failing that, from the
//! request's `_meta.auth` map. It is only checked for presence: nothing
//! downstream consumes it, and it is never logged.

use serde_json::{Map, Value};

use crate::core::error::ToolError;

/// Key looked up in per-request auth metadata.
pub const AUTH_KEY: &str = "PERPLEXITY_API_KEY";

/// Where a resolved credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Config,
    Request,
}

/// A resolved API key. `Debug` never prints the value.
pub struct Credential {
    value: String,
    pub source: CredentialSource,
}

impl Credential {
    #[allow(dead_code)] // presence-checked only, no tool sends it anywhere yet
    pub fn expose(&self) -> &str {
        &self.value
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("value", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

/// Resolve the credential, config first.
///
/// # Arguments
/// * `configured` - Key from startup configuration, if any
/// * `auth` - The request's `_meta.auth` object, if any
pub fn resolve(configured: Option<&str>, auth: Option<&Map<String, Value>>) -> Result<Credential, ToolError> {
    if let Some(key) = configured.filter(|k| !k.is_empty()) {
        return Ok(Credential {
            value: key.to_string(),
            source: CredentialSource::Config,
        });
    }

    auth.and_then(|auth| auth.get(AUTH_KEY))
        .and_then(Value::as_str)
        .filter(|k| !k.is_empty())
        .map(|key| Credential {
            value: key.to_string(),
            source: CredentialSource::Request,
        })
        .ok_or(ToolError::MissingCredential)
}
