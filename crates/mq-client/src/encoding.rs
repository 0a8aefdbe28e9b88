//! Message encoding selection and payload conversion.
//!
//! The configured encoding name is mapped onto one of three strategies:
//!
//! - `UTF8` → [`MessageEncoding::Utf8`]
//! - `UTF16` or `UNICODE` → [`MessageEncoding::Utf16`] (little-endian)
//! - anything else → [`MessageEncoding::Other`], which passes bytes through
//!   without transcoding
//!
//! Unknown names never fail; they select `Other`.

use crate::error::EncodingError;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Byte-order mark written ahead of UTF-8 payloads
pub const UTF8_LEAD_BYTES: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// Byte-order mark written ahead of UTF-16 (little-endian) payloads
pub const UTF16_LEAD_BYTES: [u8; 2] = [0xFF, 0xFE];

/// Text encoding applied to message content on the wire
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageEncoding {
    Utf8,
    Utf16,
    #[default]
    Other,
}

impl MessageEncoding {
    /// Select the encoding for a configured name.
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace.
    pub fn from_config(name: &str) -> Self {
        match name.trim().to_ascii_uppercase().as_str() {
            "UTF8" => Self::Utf8,
            "UTF16" | "UNICODE" => Self::Utf16,
            _ => Self::Other,
        }
    }

    /// Lead bytes identifying this encoding, if it has any
    pub fn lead_bytes(&self) -> &'static [u8] {
        match self {
            Self::Utf8 => &UTF8_LEAD_BYTES,
            Self::Utf16 => &UTF16_LEAD_BYTES,
            Self::Other => &[],
        }
    }

    /// Convert message content into a wire payload
    pub fn encode(&self, content: &str, use_lead_bytes: bool) -> Bytes {
        let lead = if use_lead_bytes { self.lead_bytes() } else { &[] };

        match self {
            Self::Utf8 | Self::Other => {
                let mut payload = Vec::with_capacity(lead.len() + content.len());
                payload.extend_from_slice(lead);
                payload.extend_from_slice(content.as_bytes());
                Bytes::from(payload)
            }
            Self::Utf16 => {
                let mut payload = Vec::with_capacity(lead.len() + content.len() * 2);
                payload.extend_from_slice(lead);
                for unit in content.encode_utf16() {
                    payload.extend_from_slice(&unit.to_le_bytes());
                }
                Bytes::from(payload)
            }
        }
    }

    /// Convert a wire payload back into message content.
    ///
    /// Matching lead bytes are stripped when `use_lead_bytes` is set and the
    /// payload starts with them.
    pub fn decode(&self, payload: &[u8], use_lead_bytes: bool) -> Result<String, EncodingError> {
        let body = if use_lead_bytes {
            payload
                .strip_prefix(self.lead_bytes())
                .unwrap_or(payload)
        } else {
            payload
        };

        match self {
            Self::Utf8 => String::from_utf8(body.to_vec()).map_err(|e| EncodingError::InvalidUtf8 {
                message: e.to_string(),
            }),
            Self::Utf16 => {
                if body.len() % 2 != 0 {
                    return Err(EncodingError::InvalidUtf16 {
                        message: format!("odd payload length {}", body.len()),
                    });
                }
                let units: Vec<u16> = body
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                String::from_utf16(&units).map_err(|e| EncodingError::InvalidUtf16 {
                    message: e.to_string(),
                })
            }
            Self::Other => Ok(String::from_utf8_lossy(body).into_owned()),
        }
    }
}

impl fmt::Display for MessageEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Utf8 => write!(f, "UTF8"),
            Self::Utf16 => write!(f, "UTF16"),
            Self::Other => write!(f, "OTHER"),
        }
    }
}

impl FromStr for MessageEncoding {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_config(s))
    }
}

#[cfg(test)]
#[path = "encoding_tests.rs"]
mod tests;
