//! `get`, `set` and `delete`.

use super::{Codec, CliResult, Format, PairOutput};
use locket_db::{require_value, Db};
use std::io::Write;
use tracing::info;

/// Runs the get command.
pub fn get(db: &dyn Db, codec: Codec, key: &str, format: Format, out: &mut dyn Write) -> CliResult<()> {
    let raw_key = codec.decode(key)?;
    let value = db.get(&raw_key)?;
    let result = PairOutput {
        key: codec.encode(&raw_key),
        value: value.as_deref().map(|v| codec.encode(v)),
    };

    match format {
        Format::Json => writeln!(out, "{}", serde_json::to_string_pretty(&result)?)?,
        Format::Text => match &result.value {
            Some(value) => writeln!(out, "{value}")?,
            None => writeln!(out, "(not found)")?,
        },
    }
    Ok(())
}

/// Runs the set command.
///
/// A missing value fails with `ValueNil`; use an empty string to store an
/// empty value.
pub fn set(db: &dyn Db, codec: Codec, key: &str, value: Option<&str>, sync: bool) -> CliResult<()> {
    let raw_key = codec.decode(key)?;
    let raw_value = value.map(|v| codec.decode(v)).transpose()?;
    let raw_value = require_value(raw_value.as_deref())?;
    if sync {
        db.set_sync(&raw_key, raw_value)?;
    } else {
        db.set(&raw_key, raw_value)?;
    }
    info!(key = %codec.encode(&raw_key), bytes = raw_value.len(), sync, "value stored");
    Ok(())
}

/// Runs the delete command.
pub fn delete(db: &dyn Db, codec: Codec, key: &str, sync: bool) -> CliResult<()> {
    let raw_key = codec.decode(key)?;
    if sync {
        db.delete_sync(&raw_key)?;
    } else {
        db.delete(&raw_key)?;
    }
    info!(key = %codec.encode(&raw_key), sync, "key deleted");
    Ok(())
}
