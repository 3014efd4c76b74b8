//! Continuation tokens.
//!
//! A token is the base64 (standard alphabet, padded) encoding of a small JSON
//! document naming the stream (by its catalog name, however the request
//! referred to it), the canonical interval and where the previous
//! page stopped. Callers treat it as opaque.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::{ArchivedMediaError, Result};
use crate::models::SortKey;
use crate::selector::CanonicalInterval;

pub(crate) const MAX_TOKEN_LEN: usize = 4096;
const TOKEN_VERSION: u8 = 1;

static TOKEN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9+/]+={0,2}$").expect("valid token regex"));

/// Where the next page starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum Position {
    /// Immediately after the fragment with this key.
    #[serde(rename = "after")]
    After(SortKey),
    /// At this sample index of an image sampling plan.
    #[serde(rename = "sample")]
    Sample(u64),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct TokenState {
    #[serde(rename = "v")]
    pub version: u8,
    #[serde(rename = "s")]
    pub stream_name: String,
    #[serde(rename = "i")]
    pub interval: CanonicalInterval,
    #[serde(rename = "p")]
    pub position: Position,
}

impl TokenState {
    pub fn new(stream_name: &str, interval: CanonicalInterval, position: Position) -> Self {
        Self {
            version: TOKEN_VERSION,
            stream_name: stream_name.to_string(),
            interval,
            position,
        }
    }

    pub fn encode(&self) -> Result<String> {
        let json = serde_json::to_vec(self)
            .map_err(|e| ArchivedMediaError::invalid_argument(format!("encoding NextToken: {e}")))?;
        let token = STANDARD.encode(json);
        if token.len() > MAX_TOKEN_LEN {
            return Err(ArchivedMediaError::invalid_argument(format!(
                "NextToken would exceed {MAX_TOKEN_LEN} characters"
            )));
        }
        Ok(token)
    }

    pub fn decode(token: &str) -> Result<Self> {
        if token.is_empty() || token.len() > MAX_TOKEN_LEN || !TOKEN_PATTERN.is_match(token) {
            return Err(invalid_token("malformed"));
        }
        let json = STANDARD.decode(token).map_err(|_| invalid_token("not base64"))?;
        let state: TokenState =
            serde_json::from_slice(&json).map_err(|_| invalid_token("unreadable"))?;
        if state.version != TOKEN_VERSION {
            return Err(invalid_token("unsupported version"));
        }
        Ok(state)
    }

    /// Reject a token issued for another stream. `stream_name` is the
    /// resolved catalog name, so a token survives switching between name and
    /// ARN references.
    pub fn check_stream(&self, stream_name: &str) -> Result<()> {
        if self.stream_name != stream_name {
            return Err(ArchivedMediaError::invalid_argument(format!(
                "NextToken was issued for stream {}, not {stream_name}",
                self.stream_name
            )));
        }
        Ok(())
    }
}

fn invalid_token(reason: &str) -> ArchivedMediaError {
    ArchivedMediaError::invalid_argument(format!("invalid NextToken: {reason}"))
}
