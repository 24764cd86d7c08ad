//! Adventure progression
//!
//! Per-day task flags and per-zone unlock flags, kept in the local key-value
//! table. Every day or zone index is clamped into the curriculum before it
//! becomes a key.
//!
//! Unlocking is never derived from completion: a finished zone stays locked
//! for its successor until [`AdventureProgress::unlock_zone`] is called after
//! a zone review.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::curriculum::Curriculum;
use crate::error::{EngineError, EngineResult};
use crate::storage::Store;

pub const TASKS_PER_DAY: usize = 4;

pub type DayTasks = [bool; TASKS_PER_DAY];

/// Which day task a session kind completes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayTask {
    NewWords = 0,
    Review = 1,
    Cloze = 2,
    MultipleChoice = 3,
}

impl DayTask {
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            DayTask::NewWords => "learn new words",
            DayTask::Review => "review",
            DayTask::Cloze => "fill in the blank",
            DayTask::MultipleChoice => "reading questions",
        }
    }

    pub const ALL: [DayTask; TASKS_PER_DAY] = [
        DayTask::NewWords,
        DayTask::Review,
        DayTask::Cloze,
        DayTask::MultipleChoice,
    ];
}

fn day_key(day_index: usize) -> String {
    format!("adventure.day.{}", day_index)
}

fn zone_key(zone_index: usize) -> String {
    format!("adventure.zone_unlocked.{}", zone_index)
}

fn parse_day_tasks(day: usize, raw: Option<&str>) -> DayTasks {
    let mut tasks = [false; TASKS_PER_DAY];
    let Some(raw) = raw else {
        return tasks;
    };

    match serde_json::from_str::<Vec<bool>>(raw) {
        Ok(flags) => {
            for (slot, flag) in tasks.iter_mut().zip(flags) {
                *slot = flag;
            }
        }
        Err(e) => warn!("Ignoring corrupt task flags for day {}: {}", day, e),
    }
    tasks
}

/// Summary of one zone for display
#[derive(Debug, Clone, Serialize)]
pub struct ZoneStatus {
    pub zone_index: usize,
    pub title: String,
    pub unlocked: bool,
    pub completed: bool,
    pub days: Vec<DayStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DayStatus {
    pub day_index: usize,
    pub tasks: DayTasks,
}

#[derive(Clone)]
pub struct AdventureProgress {
    store: Store,
    curriculum: Curriculum,
    unlock_all: bool,
}

impl AdventureProgress {
    pub fn new(store: Store, curriculum: Curriculum, unlock_all: bool) -> Self {
        Self {
            store,
            curriculum,
            unlock_all,
        }
    }

    /// Task flags for a day; a day never written reads as all false
    pub fn load_day_tasks(&self, day_index: i64) -> EngineResult<DayTasks> {
        let day = self.curriculum.clamp_day_index(day_index);
        let raw = self.store.get_setting(&day_key(day))?;
        Ok(parse_day_tasks(day, raw.as_deref()))
    }

    /// Set one task flag; repeating the call is a no-op.
    ///
    /// The read and the write share one transaction, so marks for different
    /// tasks of the same day never overwrite each other.
    pub fn mark_day_task_completed(&self, day_index: i64, task_index: usize) -> EngineResult<()> {
        if task_index >= TASKS_PER_DAY {
            return Err(EngineError::InvalidArgument(format!(
                "task index {} out of range 0..{}",
                task_index, TASKS_PER_DAY
            )));
        }

        let day = self.curriculum.clamp_day_index(day_index);
        let mut changed = false;
        self.store.update_setting(&day_key(day), |raw| {
            let mut tasks = parse_day_tasks(day, raw);
            if tasks[task_index] {
                return Ok(None);
            }
            tasks[task_index] = true;
            changed = true;
            Ok(Some(serde_json::to_string(&tasks)?))
        })?;

        if changed {
            info!("Day {} task {} complete", day + 1, task_index + 1);
        } else {
            debug!("Day {} task {} already complete", day, task_index);
        }
        Ok(())
    }

    pub fn is_day_completed(&self, day_index: i64) -> EngineResult<bool> {
        Ok(self.load_day_tasks(day_index)?.iter().all(|done| *done))
    }

    /// True when every day in the zone's range has all tasks done
    pub fn is_zone_completed(&self, zone_index: i64) -> EngineResult<bool> {
        for day in self.curriculum.zone_day_range(zone_index) {
            if !self.is_day_completed(day as i64)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// First day that is not complete, or the last day when all are
    pub fn first_incomplete_day_index(&self) -> EngineResult<usize> {
        for day in 0..self.curriculum.total_days() {
            if !self.is_day_completed(day as i64)? {
                return Ok(day);
            }
        }
        Ok(self.curriculum.total_days() - 1)
    }

    pub fn first_incomplete_zone_index(&self) -> EngineResult<usize> {
        Ok(self.curriculum.zone_index(self.first_incomplete_day_index()? as i64))
    }

    pub fn is_zone_unlocked(&self, zone_index: i64) -> EngineResult<bool> {
        let zone = self.curriculum.clamp_zone_index(zone_index);
        if zone == 0 || self.unlock_all {
            return Ok(true);
        }
        Ok(self.store.get_setting(&zone_key(zone))?.as_deref() == Some("true"))
    }

    pub fn unlock_zone(&self, zone_index: i64) -> EngineResult<()> {
        let zone = self.curriculum.clamp_zone_index(zone_index);
        self.store.set_setting(&zone_key(zone), "true")?;
        info!("Unlocked {}", self.curriculum.zone_title(zone as i64));
        Ok(())
    }

    /// Full map of zones and days
    pub fn zone_statuses(&self) -> EngineResult<Vec<ZoneStatus>> {
        (0..self.curriculum.total_zones())
            .map(|zone| {
                let days = self
                    .curriculum
                    .zone_day_range(zone as i64)
                    .map(|day| {
                        Ok(DayStatus {
                            day_index: day,
                            tasks: self.load_day_tasks(day as i64)?,
                        })
                    })
                    .collect::<EngineResult<Vec<_>>>()?;
                Ok(ZoneStatus {
                    zone_index: zone,
                    title: self.curriculum.zone_title(zone as i64),
                    unlocked: self.is_zone_unlocked(zone as i64)?,
                    completed: self.is_zone_completed(zone as i64)?,
                    days,
                })
            })
            .collect()
    }
}
