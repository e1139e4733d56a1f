//! Binary array encodings
//!
//! Homogeneous numeric arrays can be written as a literal list, as the hex
//! string of their raw little-endian bytes, or as the hex string of the
//! DEFLATE-compressed raw bytes. Both binary forms use the `Hex("...")`
//! token; the destination's encoding mode says how to interpret it.

use flate2::write::DeflateEncoder;
use flate2::Compression;
use scenecast_core::{ExportError, ExportResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::str::FromStr;

/// How large numeric arrays are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingMode {
    /// Comma-separated literal list
    Literal,
    /// Hex string of the raw bytes
    #[default]
    Hex,
    /// Hex string of the DEFLATE-compressed raw bytes
    Deflate,
}

impl EncodingMode {
    /// Whether arrays are written in a binary (hex) form
    pub fn is_binary(&self) -> bool {
        !matches!(self, EncodingMode::Literal)
    }

    /// Configuration name of the mode
    pub fn as_str(&self) -> &'static str {
        match self {
            EncodingMode::Literal => "literal",
            EncodingMode::Hex => "hex",
            EncodingMode::Deflate => "deflate",
        }
    }
}

impl fmt::Display for EncodingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EncodingMode {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "literal" => Ok(EncodingMode::Literal),
            "hex" => Ok(EncodingMode::Hex),
            "deflate" => Ok(EncodingMode::Deflate),
            other => Err(ExportError::config(format!(
                "Invalid encoding '{}'. Expected \"literal\", \"hex\" or \"deflate\".",
                other
            ))),
        }
    }
}

/// DEFLATE-compress `raw`
pub fn deflate(raw: &[u8]) -> ExportResult<Vec<u8>> {
    let mut encoder =
        DeflateEncoder::new(Vec::with_capacity(raw.len() / 2), Compression::default());
    encoder.write_all(raw)?;
    Ok(encoder.finish()?)
}

/// Render raw array bytes as a `Hex("...")` token in the given binary mode
pub fn hex_token(raw: &[u8], mode: EncodingMode) -> ExportResult<String> {
    let payload = match mode {
        EncodingMode::Deflate => hex::encode_upper(deflate(raw)?),
        EncodingMode::Hex => hex::encode_upper(raw),
        EncodingMode::Literal => {
            return Err(ExportError::encode("literal mode has no binary form"));
        }
    };
    let mut token = String::with_capacity(payload.len() + 7);
    token.push_str("Hex(\"");
    token.push_str(&payload);
    token.push_str("\")");
    Ok(token)
}
