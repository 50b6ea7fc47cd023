//! JsonStore CLI
//!
//! Command-line interface for reading and writing a JsonStore file.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use jsonstore::{Config, SerializeOptions, Store, StoreGuard, Value};
use tracing_subscriber::{fmt, EnvFilter};

/// JsonStore CLI
#[derive(Parser, Debug)]
#[command(name = "jsonstore-cli")]
#[command(about = "Read and write entries of a JSON-backed key-value store")]
#[command(version)]
struct Args {
    /// Backing store file
    #[arg(short, long, default_value = "./store.json")]
    file: PathBuf,

    /// Pretty-print with this many spaces of indentation
    #[arg(short, long)]
    indent: Option<usize>,

    /// Emit object keys in sorted order
    #[arg(long)]
    sort_keys: bool,

    /// Escape non-ASCII characters
    #[arg(long)]
    ensure_ascii: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set (parsed as JSON, otherwise stored as a string)
        value: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// List all entries
    List,

    /// Add to an integer counter, starting from zero
    Incr {
        /// The counter key
        key: String,

        /// Amount to add
        #[arg(long, default_value = "1")]
        by: i64,
    },

    /// Rewrite the store file
    Sync {
        /// Write even if nothing changed
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,jsonstore=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> jsonstore::Result<()> {
    let mut options = SerializeOptions::new()
        .sort_keys(args.sort_keys)
        .ensure_ascii(args.ensure_ascii);
    options.indent = args.indent;

    let config = Config::builder().path(&args.file).options(options).build()?;
    tracing::debug!("Store file: {}", config.path.display());

    let mut store = StoreGuard::open(config)?;

    match args.command {
        Commands::Get { key } => println!("{}", store.get(&key)?),
        Commands::Set { key, value } => {
            store.set(key, parse_value(&value))?;
        }
        Commands::Del { key } => {
            store.delete(&key)?;
        }
        Commands::List => print_entries(&store),
        Commands::Incr { key, by } => {
            let current: i64 = store.get_as_or(&key, 0)?;
            store.set(key, current + by)?;
            println!("{}", current + by);
        }
        Commands::Sync { force } => {
            let options = store.options().clone();
            let wrote = store.sync_with(&options, force)?;
            println!("{}", if wrote { "written" } else { "unchanged" });
        }
    }

    store.close()?;
    Ok(())
}

/// JSON if it parses, a plain string otherwise
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn print_entries(store: &Store) {
    for (key, value) in store {
        println!("{}\t{}", key, value);
    }
}
