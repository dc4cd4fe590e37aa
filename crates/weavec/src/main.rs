//! The weave derivation checker.
//!
//! Provides the `weavec` command:
//!
//! - `weavec check <path>` - Run every `derive` in a schema and report failures
//!
//! `<path>` is a `.weave` file, a `weave.toml` manifest, or a directory
//! containing one.
//!
//! Options:
//! - `--explain` - Print the resolution trace of each successful derive
//! - `--json` - Output diagnostics as JSON (one object per line)
//! - `--no-color` - Disable colorized output
//! - `-v` / `-q` - More or less logging on stderr

mod check;
mod manifest;

use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Parser, Subcommand};

use crate::check::CheckFlags;

#[derive(Parser)]
#[command(name = "weavec", version, about = "The weave derivation checker")]
struct Cli {
    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Silence all logging
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every derive declared in a schema
    Check {
        /// A .weave file, a weave.toml manifest, or a directory containing weave.toml
        path: PathBuf,

        /// Print how each successful derive was resolved
        #[arg(long)]
        explain: bool,

        /// Output diagnostics as JSON (one object per line) instead of human-readable format
        #[arg(long)]
        json: bool,

        /// Disable colorized output
        #[arg(long = "no-color")]
        no_color: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Check {
            path,
            explain,
            json,
            no_color,
        } => {
            let flags = CheckFlags {
                explain,
                json,
                no_color,
            };
            match check::check(&path, flags) {
                Ok(true) => {}
                Ok(false) => process::exit(1),
                Err(e) => {
                    if json {
                        let msg = serde_json::json!({
                            "code": "C0001",
                            "severity": "error",
                            "message": e.to_string(),
                            "file": path.display().to_string(),
                            "spans": [],
                            "path": [],
                        });
                        eprintln!("{}", msg);
                    } else {
                        eprintln!("error: {}", e);
                    }
                    process::exit(1);
                }
            }
        }
    }
}

/// Unresolved leaves are also logged at `warn`; by default only the rendered
/// diagnostics are shown, unless `RUST_LOG` says otherwise.
fn setup_logging(verbose: u8, quiet: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if quiet {
        EnvFilter::new("off")
    } else {
        match verbose {
            0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error")),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let formatter = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    // Only fails if a subscriber is already installed.
    let _ = tracing_subscriber::registry()
        .with(formatter)
        .with(filter)
        .try_init();
}
