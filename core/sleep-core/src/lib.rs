//! # sleep-core
//!
//! Core library for the sleep tracker, shared by every presentation layer
//! (the bundled CLI today).
//!
//! ## Design Principles
//!
//! - **Single owner**: One [`SleepTracker`] per tracking context. Mutating
//!   operations take `&mut self`; there is no process-wide state.
//! - **Blocking store, async workflow**: The store is a plain synchronous trait.
//!   The tracker runs every store call on tokio's blocking pool and awaits it.
//! - **Observable state**: Tonight's night and the night list are published on
//!   watch channels; one-shot events go through an explicit [`Outbox`].
//! - **Failures are surfaced**: Store errors leave state untouched, are logged,
//!   and are posted to the outbox as well as returned.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sleep_core::{SleepTracker, SqliteStore, TrackerOptions};
//! use std::sync::Arc;
//!
//! let store = Arc::new(SqliteStore::open(path)?);
//! let mut tracker = SleepTracker::open(store, TrackerOptions::default()).await?;
//! tracker.start().await?;
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod format;
pub mod model;
pub mod presenter;
pub mod store;
pub mod tracker;

pub use clock::{Clock, SystemClock};
pub use config::{load_config, OpenNightPolicy, TrackerConfig};
pub use error::{ConfigError, StoreError, TrackerError};
pub use format::{format_nights, EnglishFormatter, NightFormatter};
pub use model::{SleepNight, UNRATED_QUALITY};
pub use presenter::{bind_night, NightListAdapter, NightRow, QualityIcon};
pub use store::{SleepStore, SqliteStore};
pub use tracker::{
    FailedOperation, Outbox, SleepTracker, TrackerAction, TrackerOptions, TrackerView,
};
