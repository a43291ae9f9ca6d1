//! Row presentation for the night list.

use serde::Serialize;

use crate::format::NightFormatter;
use crate::model::SleepNight;

/// Icon shown next to a night, chosen by its quality score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityIcon {
    Sleep0,
    Sleep1,
    Sleep2,
    Sleep3,
    Sleep4,
    Sleep5,
    /// Night in progress or not yet rated.
    Active,
}

impl QualityIcon {
    pub const ALL: [QualityIcon; 7] = [
        QualityIcon::Sleep0,
        QualityIcon::Sleep1,
        QualityIcon::Sleep2,
        QualityIcon::Sleep3,
        QualityIcon::Sleep4,
        QualityIcon::Sleep5,
        QualityIcon::Active,
    ];

    pub fn from_quality(quality: i32) -> Self {
        match quality {
            0 => QualityIcon::Sleep0,
            1 => QualityIcon::Sleep1,
            2 => QualityIcon::Sleep2,
            3 => QualityIcon::Sleep3,
            4 => QualityIcon::Sleep4,
            5 => QualityIcon::Sleep5,
            _ => QualityIcon::Active,
        }
    }

    pub fn asset_name(self) -> &'static str {
        match self {
            QualityIcon::Sleep0 => "ic_sleep_0",
            QualityIcon::Sleep1 => "ic_sleep_1",
            QualityIcon::Sleep2 => "ic_sleep_2",
            QualityIcon::Sleep3 => "ic_sleep_3",
            QualityIcon::Sleep4 => "ic_sleep_4",
            QualityIcon::Sleep5 => "ic_sleep_5",
            QualityIcon::Active => "ic_sleep_active",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NightRow {
    pub night_id: i64,
    pub length_text: String,
    pub quality_text: String,
    pub icon: QualityIcon,
}

pub fn bind_night(night: &SleepNight, formatter: &dyn NightFormatter) -> NightRow {
    NightRow {
        night_id: night.night_id,
        length_text: formatter.duration_text(night.start_time_milli, night.end_time_milli),
        quality_text: formatter.quality_label(night.sleep_quality),
        icon: QualityIcon::from_quality(night.sleep_quality),
    }
}

/// Holds the nights currently shown by a list and binds them into rows on demand.
///
/// `revision` increments on every [`NightListAdapter::submit`] so a renderer can
/// tell when to redraw.
pub struct NightListAdapter<F: NightFormatter> {
    formatter: F,
    data: Vec<SleepNight>,
    revision: u64,
}

impl<F: NightFormatter> NightListAdapter<F> {
    pub fn new(formatter: F) -> Self {
        Self {
            formatter,
            data: Vec::new(),
            revision: 0,
        }
    }

    pub fn submit(&mut self, nights: Vec<SleepNight>) {
        self.data = nights;
        self.revision += 1;
    }

    pub fn item_count(&self) -> usize {
        self.data.len()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn bind(&self, position: usize) -> Option<NightRow> {
        self.data
            .get(position)
            .map(|night| bind_night(night, &self.formatter))
    }

    pub fn rows(&self) -> Vec<NightRow> {
        self.data
            .iter()
            .map(|night| bind_night(night, &self.formatter))
            .collect()
    }
}
