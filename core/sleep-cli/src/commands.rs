use sleep_core::{
    load_config, EnglishFormatter, NightFormatter, NightListAdapter, NightRow, SleepNight,
    SleepStore, SleepTracker, SqliteStore, StoreError, TrackerConfig, TrackerError,
    TrackerOptions,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{Cli, Commands};

const CLEARED_MESSAGE: &str = "All your data is gone forever.";

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] sleep_core::ConfigError),

    #[error("Failed to encode output: {0}")]
    Output(#[from] serde_json::Error),

    #[error("Night not found: {0}")]
    NightNotFound(i64),
}

pub async fn run(cli: Cli) -> Result<(), CliError> {
    let config = match load_config(cli.config) {
        Ok(config) => config,
        Err(err) => {
            warn!(error = %err, "Failed to load config; using defaults");
            TrackerConfig::default()
        }
    };
    let db_path = match cli.db {
        Some(path) => path,
        None => config.resolve_database_path()?,
    };

    let mut tracker = open_tracker(db_path, &config).await?;
    let result = dispatch(&mut tracker, cli.command).await;
    report_failure(&mut tracker);
    tracker.close();
    result
}

async fn open_tracker(db_path: PathBuf, config: &TrackerConfig) -> Result<SleepTracker, CliError> {
    let store = SqliteStore::open(db_path)?;
    debug!(path = %store.path().display(), "Night store ready");
    let store: Arc<dyn SleepStore> = Arc::new(store);
    Ok(SleepTracker::open(store, TrackerOptions::from(config)).await?)
}

async fn dispatch(tracker: &mut SleepTracker, command: Commands) -> Result<(), CliError> {
    let formatter = EnglishFormatter::new();

    match command {
        Commands::Start => {
            tracker.start().await?;
            if let Some(night) = tracker.tonight() {
                println!(
                    "Tracking night {} since {}",
                    night.night_id,
                    formatter.timestamp_text(night.start_time_milli)
                );
            }
        }
        Commands::Stop => {
            tracker.stop().await?;
            match tracker.take_quality_navigation() {
                Some(night) => println!("{}", rating_prompt(&night, &formatter)),
                None => println!("No night is being tracked."),
            }
        }
        Commands::Rate { night_id, quality } => {
            let night = tracker.set_sleep_quality(night_id, quality).await?;
            tracker.refresh_tonight().await?;
            println!(
                "Night {} rated: {}",
                night.night_id,
                formatter.quality_label(night.sleep_quality)
            );
        }
        Commands::Clear => {
            tracker.clear().await?;
            if tracker.take_snackbar() {
                println!("{}", CLEARED_MESSAGE);
            }
        }
        Commands::List { json } => {
            let mut adapter = NightListAdapter::new(formatter);
            adapter.submit(tracker.nights());
            let rows = adapter.rows();
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                print!("{}", render_rows(&rows));
            }
        }
        Commands::Status { json } => {
            let view = tracker.view();
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                println!("{}", render_buttons(&view));
                print!("{}", view.summary);
            }
        }
        Commands::Show { night_id } => {
            tracker.on_night_clicked(night_id);
            if let Some(night_id) = tracker.take_detail_navigation() {
                let night = tracker
                    .night(night_id)
                    .await?
                    .ok_or(CliError::NightNotFound(night_id))?;
                print!("{}", render_detail(&night, &formatter));
            }
        }
    }

    Ok(())
}

fn report_failure(tracker: &mut SleepTracker) {
    if let Some(failure) = tracker.take_failure() {
        warn!(
            action = ?failure.action,
            error = %failure.error,
            "Operation failed; it is safe to retry"
        );
    }
}

fn rating_prompt(night: &SleepNight, formatter: &dyn NightFormatter) -> String {
    format!(
        "Stopped night {} ({}).\nRate it with: sleep-tracker rate {} <0-5>",
        night.night_id,
        formatter.duration_text(night.start_time_milli, night.end_time_milli),
        night.night_id
    )
}

fn render_rows(rows: &[NightRow]) -> String {
    if rows.is_empty() {
        return "No nights recorded.\n".to_string();
    }

    let mut out = String::new();
    for row in rows {
        out.push_str(&format!(
            "{:>5}  {:<16} {:<28} {}\n",
            row.night_id,
            row.icon.asset_name(),
            row.length_text,
            row.quality_text
        ));
    }
    out
}

fn render_buttons(view: &sleep_core::TrackerView) -> String {
    let mut buttons = Vec::new();
    if view.start_visible {
        buttons.push("start");
    }
    if view.stop_visible {
        buttons.push("stop");
    }
    if view.clear_visible {
        buttons.push("clear");
    }
    format!("Available: {}", buttons.join(", "))
}

fn render_detail(night: &SleepNight, formatter: &dyn NightFormatter) -> String {
    let row = sleep_core::bind_night(night, formatter);
    let mut out = format!(
        "Night {}\nStart:\t{}\n",
        night.night_id,
        formatter.timestamp_text(night.start_time_milli)
    );
    if night.is_in_progress() {
        out.push_str("Still tracking\n");
    } else {
        out.push_str(&format!(
            "End:\t{}\n",
            formatter.timestamp_text(night.end_time_milli)
        ));
    }
    out.push_str(&format!("Length:\t{}\n", row.length_text));
    out.push_str(&format!(
        "Quality:\t{} ({})\n",
        row.quality_text,
        row.icon.asset_name()
    ));
    out
}
