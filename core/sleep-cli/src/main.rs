//! sleep-tracker: command-line front end for the sleep tracker.
//!
//! Each invocation opens the night store, performs one action through a
//! `SleepTracker`, and prints whatever the tracker asks to be shown.
//!
//! ## Subcommands
//!
//! - `start` / `stop`: begin or end tonight's night
//! - `rate`: record a quality score for a stopped night
//! - `list`, `status`, `show`: inspect stored nights
//! - `clear`: delete every night

mod commands;
mod logging;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sleep-tracker")]
#[command(about = "Track your nights and rate how you slept")]
#[command(version)]
struct Cli {
    /// Night database to use instead of the configured one
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Config file to load instead of ~/.sleep-tracker/config.toml
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start tracking tonight's sleep
    Start,

    /// Stop tracking and ask for a rating
    Stop,

    /// Rate a stopped night
    Rate {
        #[arg(value_name = "ID")]
        night_id: i64,

        /// 0 (very bad) to 5 (excellent)
        #[arg(value_name = "QUALITY")]
        quality: i32,
    },

    /// Delete all recorded nights
    Clear,

    /// List nights, most recent first
    List {
        #[arg(long)]
        json: bool,
    },

    /// Show tracker state and the sleep summary
    Status {
        #[arg(long)]
        json: bool,
    },

    /// Show a single night
    Show {
        #[arg(value_name = "ID")]
        night_id: i64,
    },
}

fn main() {
    logging::init();
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            tracing::error!(error = %err, "Failed to start async runtime");
            std::process::exit(1);
        }
    };

    if let Err(err) = runtime.block_on(commands::run(cli)) {
        tracing::error!(error = %err, "sleep-tracker failed");
        std::process::exit(1);
    }
}
