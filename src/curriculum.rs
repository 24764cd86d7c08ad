//! Curriculum schedule
//!
//! Maps a zero-based day index onto zones. Every input index is clamped into
//! the curriculum before use, so no caller can produce an out-of-range day
//! or zone.

use std::ops::Range;

use crate::config::CurriculumConfig;

const ZONE_NAMES: [&str; 5] = ["Foundation", "Cloud Realm", "Island", "Space", "Future City"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Curriculum {
    total_days: usize,
    days_per_zone: usize,
}

impl Default for Curriculum {
    fn default() -> Self {
        Self::new(20, 4)
    }
}

impl From<&CurriculumConfig> for Curriculum {
    fn from(config: &CurriculumConfig) -> Self {
        Self::new(config.total_days, config.days_per_zone)
    }
}

impl Curriculum {
    pub fn new(total_days: usize, days_per_zone: usize) -> Self {
        Self {
            total_days: total_days.max(1),
            days_per_zone: days_per_zone.max(1),
        }
    }

    pub fn total_days(&self) -> usize {
        self.total_days
    }

    pub fn days_per_zone(&self) -> usize {
        self.days_per_zone
    }

    /// A trailing partial block still counts as a zone
    pub fn total_zones(&self) -> usize {
        self.total_days.div_ceil(self.days_per_zone)
    }

    pub fn clamp_day_index(&self, day_index: i64) -> usize {
        day_index.clamp(0, self.total_days as i64 - 1) as usize
    }

    pub fn clamp_zone_index(&self, zone_index: i64) -> usize {
        zone_index.clamp(0, self.total_zones() as i64 - 1) as usize
    }

    pub fn zone_index(&self, day_index: i64) -> usize {
        self.clamp_day_index(day_index) / self.days_per_zone
    }

    /// 1-based position of the day inside its zone
    pub fn day_number_in_zone(&self, day_index: i64) -> usize {
        self.clamp_day_index(day_index) % self.days_per_zone + 1
    }

    /// 1-based day number across the whole curriculum
    pub fn global_day_number(&self, day_index: i64) -> usize {
        self.clamp_day_index(day_index) + 1
    }

    /// Day indices belonging to a zone
    pub fn zone_day_range(&self, zone_index: i64) -> Range<usize> {
        let zone = self.clamp_zone_index(zone_index);
        let start = zone * self.days_per_zone;
        let end = (start + self.days_per_zone).min(self.total_days);
        start..end
    }

    pub fn zone_title(&self, zone_index: i64) -> String {
        let zone = self.clamp_zone_index(zone_index);
        match ZONE_NAMES.get(zone) {
            Some(name) => format!("Zone {}: {}", zone + 1, name),
            None => format!("Zone {}", zone + 1),
        }
    }
}
