//! Inline `data:` URI handling for buffer payloads.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::error::{AssetError, Result};

/// A parsed `data:<mime>[;base64],<payload>` URI.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct DataUri<'a> {
    pub mime: &'a str,
    pub base64: bool,
    pub payload: &'a str,
}

impl<'a> DataUri<'a> {
    /// Returns `None` if `uri` is not a data URI at all.
    pub fn parse(uri: &'a str) -> Option<Self> {
        let rest = uri.strip_prefix("data:")?;
        let comma = rest.find(',')?;
        let (head, payload) = (&rest[..comma], &rest[comma + 1..]);
        let mut parts = head.split(';');
        let mime = parts.next().unwrap_or("");
        let base64 = parts.any(|p| p == "base64");
        Some(DataUri {
            mime,
            base64,
            payload,
        })
    }

    /// Decode the payload to raw bytes. Non-base64 payloads are taken
    /// byte-for-byte.
    pub fn decode(&self) -> Result<Vec<u8>> {
        if self.base64 {
            STANDARD
                .decode(self.payload)
                .map_err(|e| AssetError::invalid(format!("malformed base64 payload: {e}")))
        } else {
            Ok(self.payload.as_bytes().to_vec())
        }
    }
}
