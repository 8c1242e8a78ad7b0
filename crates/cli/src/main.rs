//! # CLI - proglog record store shell
//!
//! A REPL-style command-line interface over a single record store file.
//! Reads commands from stdin, executes them against the store, and prints
//! results to stdout. Works interactively or with commands piped via stdin.
//!
//! ## Commands
//!
//! ```text
//! APPEND text   Append `text` as a record, prints its position and size
//! READ pos      Print the record starting at byte position `pos`
//! SIZE          Print the store size (position of the next append)
//! STATS         Print store debug info
//! EXIT / QUIT   Flush, close the store, and shut down
//! ```
//!
//! ## Configuration
//!
//! ```text
//! PROGLOG_STORE_PATH   store file path            (default: "store.log")
//! PROGLOG_BUFFER_KB    write buffer size in KiB   (default: 8)
//! RUST_LOG             tracing filter on stderr   (default: "warn")
//! ```
//!
//! ## Example
//!
//! ```text
//! $ cargo run -p cli
//! proglog started (store=store.log, size=0, buffer=8KiB)
//! > APPEND hello
//! OK pos=0 bytes=13
//! > READ 0
//! hello
//! > EXIT
//! bye
//! ```

mod shell;

use anyhow::{Context, Result};
use config::StoreConfig;
use std::io;
use store::Store;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    init_tracing();

    let cfg = StoreConfig::from_env()?;
    let store = Store::open_with_capacity(&cfg.path, cfg.buffer_capacity)
        .with_context(|| format!("opening store at {}", cfg.path.display()))?;
    tracing::info!(path = %cfg.path.display(), "store opened");

    println!(
        "proglog started (store={}, size={}, buffer={}KiB)",
        cfg.path.display(),
        store.size()?,
        cfg.buffer_capacity / 1024
    );
    println!("Commands: APPEND text | READ pos | SIZE | STATS | EXIT");

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    shell::run(&store, stdin.lock(), &mut stdout)
}
