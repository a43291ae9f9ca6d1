//! The sleep tracker workflow: start, stop and clear nights, and publish the
//! resulting state to a presentation layer.
//!
//! ## State
//!
//! - **tonight**: the night currently being tracked, if any. Published on a
//!   watch channel.
//! - **nights**: the store's live night list, most recent first.
//! - **outbox**: one-shot events (navigation requests, the clear confirmation,
//!   failures). Each is delivered once: `take_*` returns it and resets it.
//!
//! ## Execution
//!
//! Store calls run on tokio's blocking pool. Each operation awaits its store
//! call and only then mutates state, and every mutating operation takes
//! `&mut self`, so state changes are strictly sequential. Closing or dropping
//! the tracker cancels its token: pending and later operations return
//! [`TrackerError::Cancelled`] without touching state.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::{OpenNightPolicy, TrackerConfig};
use crate::error::{Result, StoreError, TrackerError};
use crate::format::{format_nights, EnglishFormatter, NightFormatter};
use crate::model::{is_valid_quality, SleepNight};
use crate::store::SleepStore;

/// Operations that can fail and be reported through the outbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerAction {
    Start,
    Stop,
    Clear,
    RefreshTonight,
    RateNight,
    LoadNight,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedOperation {
    pub action: TrackerAction,
    pub error: TrackerError,
}

/// Pending one-shot events for the presentation layer.
#[derive(Debug, Default)]
pub struct Outbox {
    quality_navigation: Option<SleepNight>,
    detail_navigation: Option<i64>,
    snackbar: bool,
    failure: Option<FailedOperation>,
}

impl Outbox {
    /// The night that was just stopped and should be rated.
    pub fn pending_quality_navigation(&self) -> Option<&SleepNight> {
        self.quality_navigation.as_ref()
    }

    pub fn pending_detail_navigation(&self) -> Option<i64> {
        self.detail_navigation
    }

    pub fn pending_snackbar(&self) -> bool {
        self.snackbar
    }

    pub fn pending_failure(&self) -> Option<&FailedOperation> {
        self.failure.as_ref()
    }

    pub fn take_quality_navigation(&mut self) -> Option<SleepNight> {
        self.quality_navigation.take()
    }

    pub fn take_detail_navigation(&mut self) -> Option<i64> {
        self.detail_navigation.take()
    }

    pub fn take_snackbar(&mut self) -> bool {
        std::mem::take(&mut self.snackbar)
    }

    pub fn take_failure(&mut self) -> Option<FailedOperation> {
        self.failure.take()
    }

    pub fn is_empty(&self) -> bool {
        self.quality_navigation.is_none()
            && self.detail_navigation.is_none()
            && !self.snackbar
            && self.failure.is_none()
    }
}

/// Snapshot of everything a tracker screen renders besides the list rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackerView {
    pub start_visible: bool,
    pub stop_visible: bool,
    pub clear_visible: bool,
    pub summary: String,
}

#[derive(Clone)]
pub struct TrackerOptions {
    pub open_night_policy: OpenNightPolicy,
    pub clock: Arc<dyn Clock>,
    pub formatter: Arc<dyn NightFormatter>,
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self {
            open_night_policy: OpenNightPolicy::default(),
            clock: Arc::new(SystemClock),
            formatter: Arc::new(EnglishFormatter::new()),
        }
    }
}

impl From<&TrackerConfig> for TrackerOptions {
    fn from(config: &TrackerConfig) -> Self {
        Self {
            open_night_policy: config.open_night_policy,
            ..Self::default()
        }
    }
}

pub struct SleepTracker {
    store: Arc<dyn SleepStore>,
    options: TrackerOptions,
    tonight: watch::Sender<Option<SleepNight>>,
    nights: watch::Receiver<Vec<SleepNight>>,
    outbox: Outbox,
    cancel: CancellationToken,
}

impl SleepTracker {
    /// Creates a tracker over `store` and loads tonight's open night, if any.
    pub async fn open(store: Arc<dyn SleepStore>, options: TrackerOptions) -> Result<Self> {
        let nights = store.observe_all();
        let (tonight, _) = watch::channel(None);
        let mut tracker = Self {
            store,
            options,
            tonight,
            nights,
            outbox: Outbox::default(),
            cancel: CancellationToken::new(),
        };
        tracker.refresh_tonight().await?;
        Ok(tracker)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Observable state
    // ─────────────────────────────────────────────────────────────────────

    pub fn tonight(&self) -> Option<SleepNight> {
        self.tonight.borrow().clone()
    }

    pub fn nights(&self) -> Vec<SleepNight> {
        self.nights.borrow().clone()
    }

    pub fn subscribe_tonight(&self) -> watch::Receiver<Option<SleepNight>> {
        self.tonight.subscribe()
    }

    pub fn subscribe_nights(&self) -> watch::Receiver<Vec<SleepNight>> {
        self.nights.clone()
    }

    pub fn start_visible(&self) -> bool {
        self.tonight.borrow().is_none()
    }

    pub fn stop_visible(&self) -> bool {
        self.tonight.borrow().is_some()
    }

    pub fn clear_visible(&self) -> bool {
        !self.nights.borrow().is_empty()
    }

    pub fn summary(&self) -> String {
        format_nights(&self.nights.borrow(), self.options.formatter.as_ref())
    }

    pub fn view(&self) -> TrackerView {
        TrackerView {
            start_visible: self.start_visible(),
            stop_visible: self.stop_visible(),
            clear_visible: self.clear_visible(),
            summary: self.summary(),
        }
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    pub fn take_quality_navigation(&mut self) -> Option<SleepNight> {
        self.outbox.take_quality_navigation()
    }

    pub fn take_detail_navigation(&mut self) -> Option<i64> {
        self.outbox.take_detail_navigation()
    }

    pub fn take_snackbar(&mut self) -> bool {
        self.outbox.take_snackbar()
    }

    pub fn take_failure(&mut self) -> Option<FailedOperation> {
        self.outbox.take_failure()
    }

    // ─────────────────────────────────────────────────────────────────────
    // User actions
    // ─────────────────────────────────────────────────────────────────────

    /// Begins tracking a new night.
    pub async fn start(&mut self) -> Result<()> {
        let open_night = self.tonight.borrow().as_ref().map(|night| night.night_id);
        if let Some(night_id) = open_night {
            return match self.options.open_night_policy {
                OpenNightPolicy::Reject => {
                    warn!(night_id, "Start requested while a night is open");
                    Err(TrackerError::AlreadyTracking { night_id })
                }
                OpenNightPolicy::Ignore => {
                    debug!(night_id, "Start ignored, night already open");
                    Ok(())
                }
            };
        }

        let night = SleepNight::starting_at(self.options.clock.now_milli());
        let result = self
            .run_store(move |store| {
                store.insert(&night)?;
                read_open_night(store)
            })
            .await;
        let tonight = result.map_err(|err| self.surface(TrackerAction::Start, err))?;

        info!(
            night_id = ?tonight.as_ref().map(|night| night.night_id),
            "Started tracking night"
        );
        self.tonight.send_replace(tonight);
        Ok(())
    }

    /// Ends tonight's night and asks for it to be rated.
    ///
    /// Does nothing when no night is open. `tonight` keeps its value; the
    /// caller refreshes it once rating is done.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(mut night) = self.tonight() else {
            debug!("Stop requested with no open night");
            return Ok(());
        };

        // A completed night must have end != start, even within the same millisecond.
        night.end_time_milli = self
            .options
            .clock
            .now_milli()
            .max(night.start_time_milli.saturating_add(1));

        let update = night.clone();
        let result = self.run_store(move |store| store.update(&update)).await;
        result.map_err(|err| self.surface(TrackerAction::Stop, err))?;

        info!(
            night_id = night.night_id,
            duration_milli = night.duration_milli(),
            "Stopped tracking night"
        );
        self.outbox.quality_navigation = Some(night);
        Ok(())
    }

    /// Deletes every night.
    pub async fn clear(&mut self) -> Result<()> {
        let result = self.run_store(|store| store.clear_all()).await;
        result.map_err(|err| self.surface(TrackerAction::Clear, err))?;

        info!("Cleared all nights");
        self.tonight.send_replace(None);
        self.outbox.snackbar = true;
        Ok(())
    }

    pub fn on_night_clicked(&mut self, night_id: i64) {
        debug!(night_id, "Night selected");
        self.outbox.detail_navigation = Some(night_id);
    }

    /// Re-reads the open night from the store.
    pub async fn refresh_tonight(&mut self) -> Result<()> {
        let result = self.run_store(read_open_night).await;
        let tonight = result.map_err(|err| self.surface(TrackerAction::RefreshTonight, err))?;

        self.tonight.send_replace(tonight);
        Ok(())
    }

    /// Stores a quality rating for a completed night and returns the updated
    /// night. Open nights cannot be rated.
    pub async fn set_sleep_quality(&mut self, night_id: i64, quality: i32) -> Result<SleepNight> {
        if !is_valid_quality(quality) {
            return Err(TrackerError::InvalidQuality(quality));
        }

        let result = self
            .run_store(move |store| {
                let Some(mut night) = store.get(night_id)? else {
                    return Ok(Err(TrackerError::NightNotFound(night_id)));
                };
                if night.is_in_progress() {
                    return Ok(Err(TrackerError::NightInProgress(night_id)));
                }
                night.sleep_quality = quality;
                store.update(&night)?;
                Ok(Ok(night))
            })
            .await;
        let rated = result.map_err(|err| self.surface(TrackerAction::RateNight, err))?;

        let night = rated?;
        info!(night_id, quality, "Rated night");
        Ok(night)
    }

    pub async fn night(&mut self, night_id: i64) -> Result<Option<SleepNight>> {
        let result = self.run_store(move |store| store.get(night_id)).await;
        result.map_err(|err| self.surface(TrackerAction::LoadNight, err))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Lifetime
    // ─────────────────────────────────────────────────────────────────────

    /// Cancels all store work belonging to this tracker.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token cancelled when this tracker closes, for tying other work to it.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    async fn run_store<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn SleepStore) -> std::result::Result<T, StoreError> + Send + 'static,
    {
        if self.cancel.is_cancelled() {
            return Err(TrackerError::Cancelled);
        }

        let store = Arc::clone(&self.store);
        let task = tokio::task::spawn_blocking(move || op(store.as_ref()));

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(TrackerError::Cancelled),
            joined = task => match joined {
                Ok(result) => result.map_err(TrackerError::from),
                Err(err) => Err(TrackerError::Task(err.to_string())),
            },
        }
    }

    /// Logs a failed store operation and posts it to the outbox.
    fn surface(&mut self, action: TrackerAction, error: TrackerError) -> TrackerError {
        match &error {
            TrackerError::Store(_) | TrackerError::Task(_) => {
                warn!(action = ?action, error = %error, "Tracker operation failed");
                self.outbox.failure = Some(FailedOperation {
                    action,
                    error: error.clone(),
                });
            }
            _ => {
                debug!(action = ?action, error = %error, "Tracker operation aborted");
            }
        }
        error
    }
}

impl Drop for SleepTracker {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// The most recent night if it is still open; a completed one counts as none.
fn read_open_night(store: &dyn SleepStore) -> std::result::Result<Option<SleepNight>, StoreError> {
    Ok(store
        .get_most_recent()?
        .filter(|night| night.is_in_progress()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::testing::ManualClock;
    use crate::store::SqliteStore;
    use chrono::FixedOffset;
    use std::sync::atomic::{AtomicBool, Ordering};

    const T0: i64 = 1_704_067_200_000;

    /// Wraps a real store and fails writes on demand.
    struct FlakyStore {
        inner: SqliteStore,
        fail_writes: AtomicBool,
    }

    impl FlakyStore {
        fn fail(&self, on: bool) {
            self.fail_writes.store(on, Ordering::SeqCst);
        }

        fn failing(&self) -> bool {
            self.fail_writes.load(Ordering::SeqCst)
        }
    }

    impl SleepStore for FlakyStore {
        fn insert(&self, night: &SleepNight) -> std::result::Result<i64, StoreError> {
            if self.failing() {
                return Err(StoreError::InsertFailed("disk full".to_string()));
            }
            self.inner.insert(night)
        }

        fn get(&self, night_id: i64) -> std::result::Result<Option<SleepNight>, StoreError> {
            self.inner.get(night_id)
        }

        fn get_most_recent(&self) -> std::result::Result<Option<SleepNight>, StoreError> {
            self.inner.get_most_recent()
        }

        fn update(&self, night: &SleepNight) -> std::result::Result<(), StoreError> {
            if self.failing() {
                return Err(StoreError::UpdateFailed("disk full".to_string()));
            }
            self.inner.update(night)
        }

        fn clear_all(&self) -> std::result::Result<(), StoreError> {
            if self.failing() {
                return Err(StoreError::ClearFailed("disk full".to_string()));
            }
            self.inner.clear_all()
        }

        fn all_nights(&self) -> std::result::Result<Vec<SleepNight>, StoreError> {
            self.inner.all_nights()
        }

        fn observe_all(&self) -> watch::Receiver<Vec<SleepNight>> {
            self.inner.observe_all()
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        store: Arc<FlakyStore>,
        clock: ManualClock,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().expect("temp dir");
            let inner = SqliteStore::open(dir.path().join("sleep.db")).expect("store init");
            Self {
                _dir: dir,
                store: Arc::new(FlakyStore {
                    inner,
                    fail_writes: AtomicBool::new(false),
                }),
                clock: ManualClock::at(T0),
            }
        }

        fn options(&self, policy: OpenNightPolicy) -> TrackerOptions {
            TrackerOptions {
                open_night_policy: policy,
                clock: Arc::new(self.clock.clone()),
                formatter: Arc::new(EnglishFormatter::with_offset(
                    FixedOffset::east_opt(0).expect("offset"),
                )),
            }
        }

        async fn tracker(&self) -> SleepTracker {
            self.tracker_with(OpenNightPolicy::Reject).await
        }

        async fn tracker_with(&self, policy: OpenNightPolicy) -> SleepTracker {
            let store: Arc<dyn SleepStore> = self.store.clone();
            SleepTracker::open(store, self.options(policy))
                .await
                .expect("tracker open")
        }

        fn row_count(&self) -> usize {
            self.store.all_nights().expect("list").len()
        }
    }

    #[tokio::test]
    async fn fresh_tracker_shows_only_start() {
        let fixture = Fixture::new();
        let tracker = fixture.tracker().await;

        assert!(tracker.tonight().is_none());
        let view = tracker.view();
        assert!(view.start_visible);
        assert!(!view.stop_visible);
        assert!(!view.clear_visible);
        assert!(tracker.outbox().is_empty());
    }

    #[tokio::test]
    async fn start_opens_a_night_in_progress() {
        let fixture = Fixture::new();
        let mut tracker = fixture.tracker().await;

        tracker.start().await.expect("start");

        let tonight = tracker.tonight().expect("tonight");
        assert!(tonight.is_in_progress());
        assert!(tonight.night_id > 0);
        assert_eq!(tonight.start_time_milli, T0);
        assert!(!tracker.start_visible());
        assert!(tracker.stop_visible());
        assert!(tracker.clear_visible());
        assert_eq!(fixture.row_count(), 1);
    }

    #[tokio::test]
    async fn start_publishes_to_subscribers() {
        let fixture = Fixture::new();
        let mut tracker = fixture.tracker().await;
        let mut tonight_rx = tracker.subscribe_tonight();
        let nights_rx = tracker.subscribe_nights();

        tracker.start().await.expect("start");

        assert!(tonight_rx.has_changed().expect("sender alive"));
        assert!(tonight_rx.borrow_and_update().is_some());
        assert_eq!(nights_rx.borrow().len(), 1);
    }

    #[tokio::test]
    async fn start_while_open_is_rejected_by_default() {
        let fixture = Fixture::new();
        let mut tracker = fixture.tracker().await;
        tracker.start().await.expect("start");
        let night_id = tracker.tonight().expect("tonight").night_id;

        let err = tracker.start().await.expect_err("second start");

        assert_eq!(err, TrackerError::AlreadyTracking { night_id });
        assert_eq!(fixture.row_count(), 1);
        assert!(tracker.outbox().pending_failure().is_none());
    }

    #[tokio::test]
    async fn start_while_open_can_be_ignored() {
        let fixture = Fixture::new();
        let mut tracker = fixture.tracker_with(OpenNightPolicy::Ignore).await;
        tracker.start().await.expect("start");
        let first = tracker.tonight().expect("tonight");

        tracker.start().await.expect("ignored start");

        assert_eq!(tracker.tonight(), Some(first));
        assert_eq!(fixture.row_count(), 1);
    }

    #[tokio::test]
    async fn stop_completes_night_and_requests_rating() {
        let fixture = Fixture::new();
        let mut tracker = fixture.tracker().await;
        tracker.start().await.expect("start");
        fixture.clock.advance(8 * 60 * 60 * 1000);

        tracker.stop().await.expect("stop");

        let stopped = tracker
            .outbox()
            .pending_quality_navigation()
            .cloned()
            .expect("rating request");
        assert_eq!(stopped.end_time_milli, T0 + 8 * 60 * 60 * 1000);
        assert!(stopped.end_time_milli > stopped.start_time_milli);

        let stored = fixture
            .store
            .get_most_recent()
            .expect("read")
            .expect("night");
        assert!(!stored.is_in_progress());
        assert_eq!(stored, stopped);

        assert!(tracker.stop_visible());
    }

    #[tokio::test]
    async fn stop_within_same_millisecond_still_completes() {
        let fixture = Fixture::new();
        let mut tracker = fixture.tracker().await;
        tracker.start().await.expect("start");

        tracker.stop().await.expect("stop");

        let stopped = tracker.take_quality_navigation().expect("rating request");
        assert_eq!(stopped.end_time_milli, stopped.start_time_milli + 1);
        assert!(!stopped.is_in_progress());
    }

    #[tokio::test]
    async fn stop_without_tonight_does_nothing() {
        let fixture = Fixture::new();
        let mut tracker = fixture.tracker().await;
        fixture.store.fail(true);

        tracker.stop().await.expect("stop is a no-op");

        assert!(tracker.outbox().is_empty());
        assert_eq!(fixture.row_count(), 0);
    }

    #[tokio::test]
    async fn refresh_after_stop_clears_tonight() {
        let fixture = Fixture::new();
        let mut tracker = fixture.tracker().await;
        tracker.start().await.expect("start");
        fixture.clock.advance(1_000);
        tracker.stop().await.expect("stop");

        tracker.refresh_tonight().await.expect("refresh");

        assert!(tracker.tonight().is_none());
        assert!(tracker.start_visible());
        assert!(!tracker.stop_visible());
    }

    #[tokio::test]
    async fn clear_empties_store_and_pulses_snackbar_once() {
        let fixture = Fixture::new();
        let mut tracker = fixture.tracker().await;
        tracker.start().await.expect("start");

        tracker.clear().await.expect("clear");

        assert!(tracker.nights().is_empty());
        assert!(tracker.tonight().is_none());
        assert!(!tracker.clear_visible());
        assert!(tracker.outbox().pending_snackbar());
        assert!(tracker.outbox().pending_snackbar());

        assert!(tracker.take_snackbar());
        assert!(!tracker.take_snackbar());
        assert!(!tracker.outbox().pending_snackbar());
    }

    #[tokio::test]
    async fn night_click_is_delivered_once() {
        let fixture = Fixture::new();
        let mut tracker = fixture.tracker().await;

        tracker.on_night_clicked(42);

        assert_eq!(tracker.outbox().pending_detail_navigation(), Some(42));
        assert_eq!(tracker.take_detail_navigation(), Some(42));
        assert_eq!(tracker.outbox().pending_detail_navigation(), None);
        assert_eq!(tracker.take_detail_navigation(), None);
    }

    #[tokio::test]
    async fn quality_navigation_is_delivered_once() {
        let fixture = Fixture::new();
        let mut tracker = fixture.tracker().await;
        tracker.start().await.expect("start");
        tracker.stop().await.expect("stop");

        assert!(tracker.take_quality_navigation().is_some());
        assert!(tracker.outbox().pending_quality_navigation().is_none());
        assert!(tracker.take_quality_navigation().is_none());
    }

    #[tokio::test]
    async fn open_resumes_an_unfinished_night() {
        let fixture = Fixture::new();
        {
            let mut first = fixture.tracker().await;
            first.start().await.expect("start");
        }

        let resumed = fixture.tracker().await;

        assert!(resumed.tonight().expect("tonight").is_in_progress());
        assert!(resumed.stop_visible());
    }

    #[tokio::test]
    async fn open_ignores_a_completed_latest_night() {
        let fixture = Fixture::new();
        let mut night = SleepNight::starting_at(T0);
        night.end_time_milli = T0 + 1_000;
        fixture.store.insert(&night).expect("insert");

        let tracker = fixture.tracker().await;

        assert!(tracker.tonight().is_none());
        assert!(tracker.clear_visible());
    }

    #[tokio::test]
    async fn failed_start_leaves_state_and_reports() {
        let fixture = Fixture::new();
        let mut tracker = fixture.tracker().await;
        fixture.store.fail(true);

        let err = tracker.start().await.expect_err("start should fail");

        assert!(matches!(err, TrackerError::Store(StoreError::InsertFailed(_))));
        assert!(tracker.tonight().is_none());
        let failure = tracker.take_failure().expect("failure event");
        assert_eq!(failure.action, TrackerAction::Start);
        assert_eq!(failure.error, err);
        assert!(tracker.take_failure().is_none());
    }

    #[tokio::test]
    async fn failed_stop_does_not_request_rating() {
        let fixture = Fixture::new();
        let mut tracker = fixture.tracker().await;
        tracker.start().await.expect("start");
        fixture.store.fail(true);

        tracker.stop().await.expect_err("stop should fail");

        assert!(tracker.outbox().pending_quality_navigation().is_none());
        assert_eq!(
            tracker.outbox().pending_failure().map(|f| f.action),
            Some(TrackerAction::Stop)
        );
        let stored = fixture.store.get_most_recent().expect("read").expect("night");
        assert!(stored.is_in_progress());
    }

    #[tokio::test]
    async fn failed_clear_keeps_tonight_and_skips_snackbar() {
        let fixture = Fixture::new();
        let mut tracker = fixture.tracker().await;
        tracker.start().await.expect("start");
        fixture.store.fail(true);

        tracker.clear().await.expect_err("clear should fail");

        assert!(tracker.tonight().is_some());
        assert!(!tracker.outbox().pending_snackbar());
        assert_eq!(fixture.row_count(), 1);
    }

    #[tokio::test]
    async fn rating_updates_the_night() {
        let fixture = Fixture::new();
        let mut tracker = fixture.tracker().await;
        tracker.start().await.expect("start");
        fixture.clock.advance(60_000);
        tracker.stop().await.expect("stop");
        let stopped = tracker.take_quality_navigation().expect("rating request");

        let rated = tracker
            .set_sleep_quality(stopped.night_id, 4)
            .await
            .expect("rate");

        assert_eq!(rated.sleep_quality, 4);
        let loaded = tracker
            .night(stopped.night_id)
            .await
            .expect("load")
            .expect("night");
        assert_eq!(loaded, rated);
        assert!(tracker.summary().contains("Quality:\tPretty good"));
    }

    #[tokio::test]
    async fn rating_rejects_out_of_range_and_unknown_nights() {
        let fixture = Fixture::new();
        let mut tracker = fixture.tracker().await;

        assert_eq!(
            tracker.set_sleep_quality(1, 6).await,
            Err(TrackerError::InvalidQuality(6))
        );
        assert_eq!(
            tracker.set_sleep_quality(99, 3).await,
            Err(TrackerError::NightNotFound(99))
        );
        assert!(tracker.outbox().pending_failure().is_none());
    }

    #[tokio::test]
    async fn rating_rejects_a_night_still_in_progress() {
        let fixture = Fixture::new();
        let mut tracker = fixture.tracker().await;
        tracker.start().await.expect("start");
        let night_id = tracker.tonight().expect("tonight").night_id;

        assert_eq!(
            tracker.set_sleep_quality(night_id, 3).await,
            Err(TrackerError::NightInProgress(night_id))
        );

        let stored = fixture.store.get(night_id).expect("read").expect("night");
        assert!(stored.is_in_progress());
        assert!(!stored.is_rated());
        assert!(tracker.outbox().pending_failure().is_none());
    }

    #[tokio::test]
    async fn stop_at_largest_timestamp_does_not_overflow() {
        let fixture = Fixture::new();
        fixture
            .store
            .insert(&SleepNight::starting_at(i64::MAX))
            .expect("insert");
        let mut tracker = fixture.tracker().await;
        assert!(tracker.tonight().is_some());

        tracker.stop().await.expect("stop");

        let stopped = tracker.take_quality_navigation().expect("rating request");
        assert_eq!(stopped.end_time_milli, i64::MAX);
    }

    #[tokio::test]
    async fn closed_tracker_does_not_touch_the_store() {
        let fixture = Fixture::new();
        let mut tracker = fixture.tracker().await;

        tracker.close();

        assert!(tracker.is_closed());
        assert_eq!(tracker.start().await, Err(TrackerError::Cancelled));
        assert_eq!(tracker.clear().await, Err(TrackerError::Cancelled));
        assert_eq!(fixture.row_count(), 0);
        assert!(tracker.outbox().is_empty());
    }

    /// Store whose `insert` parks until released, announcing when it starts.
    struct GatedStore {
        inner: SqliteStore,
        entered: std::sync::Mutex<Option<tokio::sync::oneshot::Sender<()>>>,
        release: std::sync::Mutex<std::sync::mpsc::Receiver<()>>,
    }

    impl SleepStore for GatedStore {
        fn insert(&self, night: &SleepNight) -> std::result::Result<i64, StoreError> {
            if let Some(entered) = self.entered.lock().expect("entered lock").take() {
                let _ = entered.send(());
            }
            let _ = self.release.lock().expect("release lock").recv();
            self.inner.insert(night)
        }

        fn get(&self, night_id: i64) -> std::result::Result<Option<SleepNight>, StoreError> {
            self.inner.get(night_id)
        }

        fn get_most_recent(&self) -> std::result::Result<Option<SleepNight>, StoreError> {
            self.inner.get_most_recent()
        }

        fn update(&self, night: &SleepNight) -> std::result::Result<(), StoreError> {
            self.inner.update(night)
        }

        fn clear_all(&self) -> std::result::Result<(), StoreError> {
            self.inner.clear_all()
        }

        fn all_nights(&self) -> std::result::Result<Vec<SleepNight>, StoreError> {
            self.inner.all_nights()
        }

        fn observe_all(&self) -> watch::Receiver<Vec<SleepNight>> {
            self.inner.observe_all()
        }
    }

    #[tokio::test]
    async fn cancel_during_store_call_abandons_the_operation() {
        let dir = tempfile::tempdir().expect("temp dir");
        let (entered_tx, entered_rx) = tokio::sync::oneshot::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel();
        let gated = Arc::new(GatedStore {
            inner: SqliteStore::open(dir.path().join("sleep.db")).expect("store init"),
            entered: std::sync::Mutex::new(Some(entered_tx)),
            release: std::sync::Mutex::new(release_rx),
        });
        let store: Arc<dyn SleepStore> = gated.clone();
        let mut tracker = SleepTracker::open(store, TrackerOptions::default())
            .await
            .expect("tracker open");
        let token = tracker.cancellation_token();

        let cancel_once_inserting = async {
            entered_rx.await.expect("insert started");
            token.cancel();
        };
        let (result, ()) = tokio::join!(tracker.start(), cancel_once_inserting);
        release_tx.send(()).expect("release insert");

        assert_eq!(result, Err(TrackerError::Cancelled));
        assert!(tracker.tonight().is_none());
        assert!(tracker.start_visible());
        assert!(tracker.outbox().is_empty());

        // The abandoned insert still lands once released.
        let mut landed = false;
        for _ in 0..200 {
            if gated.inner.all_nights().expect("list").len() == 1 {
                landed = true;
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        assert!(landed);
        assert!(tracker.tonight().is_none());
    }

    #[tokio::test]
    async fn dropping_tracker_cancels_its_token() {
        let fixture = Fixture::new();
        let tracker = fixture.tracker().await;
        let token = tracker.cancellation_token();

        drop(tracker);

        assert!(token.is_cancelled());
    }
}
