//! Record store gateway for sleep nights.
//!
//! The tracker only talks to the [`SleepStore`] trait. Calls are blocking; the
//! tracker moves them onto tokio's blocking pool. Implementations are expected
//! to serialize their own writes.

mod sqlite;

pub use sqlite::SqliteStore;

use tokio::sync::watch;

use crate::error::StoreError;
use crate::model::SleepNight;

pub trait SleepStore: Send + Sync {
    /// Adds one night and returns the id the store assigned to it.
    fn insert(&self, night: &SleepNight) -> Result<i64, StoreError>;

    fn get(&self, night_id: i64) -> Result<Option<SleepNight>, StoreError>;

    /// The most recently created night, completed or not.
    fn get_most_recent(&self) -> Result<Option<SleepNight>, StoreError>;

    /// Overwrites the stored night with the same id.
    fn update(&self, night: &SleepNight) -> Result<(), StoreError>;

    fn clear_all(&self) -> Result<(), StoreError>;

    /// Every night, most recent first.
    fn all_nights(&self) -> Result<Vec<SleepNight>, StoreError>;

    /// Live view of [`SleepStore::all_nights`], republished after each write.
    fn observe_all(&self) -> watch::Receiver<Vec<SleepNight>>;
}
