//! CLI command implementations.
//!
//! Every command writes to a caller-supplied writer so it can be tested
//! against an in-memory store.

pub mod inspect;
pub mod point;
pub mod scan;

use locket_db::{to_hex, DbError};
use serde::Serialize;
use std::io;
use thiserror::Error;

/// Errors reported by the CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Store operation failed.
    #[error(transparent)]
    Db(#[from] DbError),

    /// Writing output failed.
    #[error("output error: {0}")]
    Io(#[from] io::Error),

    /// JSON encoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The engine stopped a scan before it reached the end of the range.
    #[error("scan stopped early: {0}")]
    ScanFailed(String),

    /// An argument given with `--hex` is not valid hex.
    #[error("invalid hex in {0:?}")]
    InvalidHex(String),
}

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    /// Human-readable lines.
    Text,
    /// One JSON document.
    Json,
}

/// How keys and values are read from arguments and shown in output.
#[derive(Debug, Clone, Copy)]
pub struct Codec {
    /// Treat arguments and output as hex instead of UTF-8 text.
    pub hex: bool,
}

impl Codec {
    /// Converts an argument into bytes.
    pub fn decode(&self, arg: &str) -> CliResult<Vec<u8>> {
        if self.hex {
            parse_hex(arg).ok_or_else(|| CliError::InvalidHex(arg.to_string()))
        } else {
            Ok(arg.as_bytes().to_vec())
        }
    }

    /// Renders bytes for output.
    pub fn encode(&self, bytes: &[u8]) -> String {
        if self.hex {
            to_hex(bytes)
        } else {
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

/// A key/value pair as printed by `get` and `scan`.
#[derive(Debug, Serialize)]
pub struct PairOutput {
    /// Rendered key.
    pub key: String,
    /// Rendered value, absent if the key does not exist.
    pub value: Option<String>,
}

fn parse_hex(s: &str) -> Option<Vec<u8>> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex("00ff7A"), Some(vec![0x00, 0xFF, 0x7A]));
        assert_eq!(parse_hex("0x01"), Some(vec![0x01]));
        assert_eq!(parse_hex(""), Some(Vec::new()));
        assert_eq!(parse_hex("abc"), None);
        assert_eq!(parse_hex("zz"), None);
    }

    #[test]
    fn test_codec_text_and_hex() {
        let text = Codec { hex: false };
        let hex = Codec { hex: true };
        assert_eq!(text.decode("ab").unwrap(), b"ab");
        assert_eq!(hex.decode("6162").unwrap(), b"ab");
        assert!(matches!(hex.decode("6"), Err(CliError::InvalidHex(_))));
        assert_eq!(text.encode(b"ab"), "ab");
        assert_eq!(hex.encode(b"ab"), "6162");
    }
}
