//! Display text for nights: durations, quality labels, and the history summary.
//!
//! Presentation layers localize by supplying their own [`NightFormatter`];
//! [`EnglishFormatter`] is the built-in one.

use chrono::{DateTime, FixedOffset, Local, TimeZone, Utc};

use crate::model::SleepNight;

const ONE_MINUTE_MILLI: i64 = 60 * 1000;
const ONE_HOUR_MILLI: i64 = 60 * ONE_MINUTE_MILLI;

const QUALITY_LABELS: [&str; 6] = [
    "Very bad",
    "Poor",
    "So-so",
    "OK",
    "Pretty good",
    "Excellent",
];
const UNRATED_LABEL: &str = "--";

pub trait NightFormatter: Send + Sync {
    /// Length of a night, e.g. "7 hours on Monday".
    fn duration_text(&self, start_milli: i64, end_milli: i64) -> String;

    /// Human label for a quality score; unrated scores get a placeholder.
    fn quality_label(&self, quality: i32) -> String;

    /// Full date and time of a timestamp.
    fn timestamp_text(&self, milli: i64) -> String;
}

/// English text, rendered in the local time zone unless pinned to an offset.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnglishFormatter {
    offset: Option<FixedOffset>,
}

impl EnglishFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Renders weekdays and timestamps at a fixed UTC offset.
    pub fn with_offset(offset: FixedOffset) -> Self {
        Self {
            offset: Some(offset),
        }
    }

    fn render(&self, milli: i64, pattern: &str) -> String {
        let utc = match Utc.timestamp_millis_opt(milli).single() {
            Some(utc) => utc,
            None => return UNRATED_LABEL.to_string(),
        };
        match self.offset {
            Some(offset) => render_in(utc, &offset, pattern),
            None => render_in(utc, &Local, pattern),
        }
    }
}

fn render_in<Tz: TimeZone>(utc: DateTime<Utc>, tz: &Tz, pattern: &str) -> String
where
    Tz::Offset: std::fmt::Display,
{
    utc.with_timezone(tz).format(pattern).to_string()
}

impl NightFormatter for EnglishFormatter {
    fn duration_text(&self, start_milli: i64, end_milli: i64) -> String {
        let duration = end_milli.saturating_sub(start_milli);
        let weekday = self.render(start_milli, "%A");

        if duration < ONE_MINUTE_MILLI {
            format!("{} seconds on {}", duration / 1000, weekday)
        } else if duration < ONE_HOUR_MILLI {
            format!("{} minutes on {}", duration / ONE_MINUTE_MILLI, weekday)
        } else {
            format!("{} hours on {}", duration / ONE_HOUR_MILLI, weekday)
        }
    }

    fn quality_label(&self, quality: i32) -> String {
        usize::try_from(quality)
            .ok()
            .and_then(|index| QUALITY_LABELS.get(index))
            .copied()
            .unwrap_or(UNRATED_LABEL)
            .to_string()
    }

    fn timestamp_text(&self, milli: i64) -> String {
        self.render(milli, "%A %b-%d-%Y Time: %H:%M")
    }
}

/// Renders the whole night history as a multi-line summary.
///
/// Nights still in progress only show their start.
pub fn format_nights(nights: &[SleepNight], formatter: &dyn NightFormatter) -> String {
    let mut out = String::from("Here is your sleep data\n");

    for night in nights {
        out.push('\n');
        out.push_str(&format!(
            "Start:\t{}\n",
            formatter.timestamp_text(night.start_time_milli)
        ));
        if night.is_in_progress() {
            continue;
        }

        let total_secs = night.duration_milli() / 1000;
        out.push_str(&format!(
            "End:\t{}\n",
            formatter.timestamp_text(night.end_time_milli)
        ));
        out.push_str(&format!(
            "Quality:\t{}\n",
            formatter.quality_label(night.sleep_quality)
        ));
        out.push_str(&format!(
            "Hours:Minutes:Seconds\t{}:{:02}:{:02}\n",
            total_secs / 3600,
            (total_secs / 60) % 60,
            total_secs % 60
        ));
    }

    out
}
