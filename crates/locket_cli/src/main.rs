//! Locket CLI
//!
//! Command-line access to any store registered with `locket_db`.
//!
//! # Commands
//!
//! - `get` / `set` / `delete` - Point operations
//! - `scan` - List pairs in a key range
//! - `stats` - Display engine statistics
//! - `dump` - Print every pair as hex
//! - `engines` - List the compiled-in engines

mod commands;

use clap::{Parser, Subcommand};
use commands::scan::ScanOptions;
use commands::{Codec, Format};
use locket_db::{open_db, Db, Engine, PrefixDb};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Locket key-value store tools.
#[derive(Parser)]
#[command(name = "locket")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Engine to open (memdb, redb, sled)
    #[arg(global = true, short, long, default_value = "redb")]
    engine: Engine,

    /// Logical store name
    #[arg(global = true, short, long, default_value = "locket")]
    name: String,

    /// Directory holding the store
    #[arg(global = true, short, long, default_value = ".")]
    dir: PathBuf,

    /// Restrict every command to keys under this prefix
    #[arg(global = true, short, long)]
    prefix: Option<String>,

    /// Read keys, values and the prefix as hex, and print them as hex
    #[arg(global = true, long)]
    hex: bool,

    /// Output format
    #[arg(global = true, short, long, value_enum, default_value = "text")]
    format: Format,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read one key
    Get {
        /// Key to read
        key: String,
    },

    /// Write one key
    Set {
        /// Key to write
        key: String,

        /// Value to store
        value: Option<String>,

        /// Wait for the write to be durable
        #[arg(long)]
        sync: bool,
    },

    /// Delete one key
    Delete {
        /// Key to delete
        key: String,

        /// Wait for the delete to be durable
        #[arg(long)]
        sync: bool,
    },

    /// List pairs in [start, end)
    Scan {
        /// Inclusive lower bound
        #[arg(long)]
        start: Option<String>,

        /// Exclusive upper bound
        #[arg(long)]
        end: Option<String>,

        /// Iterate from the highest key down
        #[arg(short, long)]
        reverse: bool,

        /// Maximum number of pairs to print
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Display engine statistics
    Stats,

    /// Print every pair as hex
    Dump,

    /// List the compiled-in engines
    Engines,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if let Commands::Engines = cli.command {
        commands::inspect::engines(locket_db::registry(), cli.format, &mut out)?;
        return Ok(());
    }

    let codec = Codec { hex: cli.hex };
    let db = open(&cli, codec)?;
    let result = run(&cli, codec, &*db, &mut out);
    out.flush()?;
    db.close()?;
    result?;

    Ok(())
}

fn open(cli: &Cli, codec: Codec) -> Result<Arc<dyn Db>, Box<dyn std::error::Error>> {
    debug!(engine = %cli.engine, name = %cli.name, dir = %cli.dir.display(), "opening store");
    let db: Arc<dyn Db> = Arc::from(open_db(cli.engine, &cli.name, &cli.dir)?);
    match &cli.prefix {
        Some(prefix) => {
            let prefix = codec.decode(prefix)?;
            Ok(Arc::new(PrefixDb::new(db, prefix)))
        }
        None => Ok(db),
    }
}

fn run(cli: &Cli, codec: Codec, db: &dyn Db, out: &mut dyn Write) -> commands::CliResult<()> {
    match &cli.command {
        Commands::Get { key } => commands::point::get(db, codec, key, cli.format, out),
        Commands::Set { key, value, sync } => {
            commands::point::set(db, codec, key, value.as_deref(), *sync)
        }
        Commands::Delete { key, sync } => commands::point::delete(db, codec, key, *sync),
        Commands::Scan {
            start,
            end,
            reverse,
            limit,
        } => {
            let options = ScanOptions {
                start: start.as_deref(),
                end: end.as_deref(),
                reverse: *reverse,
                limit: *limit,
            };
            commands::scan::run(db, codec, &options, cli.format, out)
        }
        Commands::Stats => commands::inspect::stats(db, cli.format, out),
        Commands::Dump => commands::inspect::dump(db, out),
        Commands::Engines => commands::inspect::engines(locket_db::registry(), cli.format, out),
    }
}
