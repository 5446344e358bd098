//! `stats`, `dump` and `engines`.

use super::{CliResult, Format};
use locket_db::{Db, Registry};
use std::io::Write;

/// Runs the stats command.
pub fn stats(db: &dyn Db, format: Format, out: &mut dyn Write) -> CliResult<()> {
    let stats = db.stats();
    match format {
        Format::Json => writeln!(out, "{}", serde_json::to_string_pretty(&stats)?)?,
        Format::Text => {
            let width = stats.keys().map(String::len).max().unwrap_or(0);
            for (key, value) in &stats {
                writeln!(out, "{key:<width$}  {value}")?;
            }
        }
    }
    Ok(())
}

/// Runs the dump command, writing every pair as hex.
pub fn dump(db: &dyn Db, out: &mut dyn Write) -> CliResult<()> {
    db.print(out)?;
    Ok(())
}

/// Lists the engines in `registry`.
pub fn engines(registry: &Registry, format: Format, out: &mut dyn Write) -> CliResult<()> {
    let ids: Vec<&str> = registry.engines().iter().map(|e| e.as_str()).collect();
    match format {
        Format::Json => writeln!(out, "{}", serde_json::to_string(&ids)?)?,
        Format::Text => {
            for id in ids {
                writeln!(out, "{id}")?;
            }
        }
    }
    Ok(())
}
