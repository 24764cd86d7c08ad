//! Learner identity and calendar
//!
//! Learner id, device id, and the learning-start anchor are created lazily on
//! first use and never change afterwards. `LearnerClock` fixes which calendar
//! "today" and "yesterday" are read in.

use chrono::{DateTime, FixedOffset, Local, NaiveDate, Offset, Utc};
use tracing::info;
use uuid::Uuid;

use crate::config::ClockConfig;
use crate::curriculum::Curriculum;
use crate::error::{EngineError, EngineResult};
use crate::storage::Store;

const USER_ID_KEY: &str = "local.user_id";
const DEVICE_ID_KEY: &str = "local.device_id";
pub(crate) const LEARNING_START_KEY: &str = "local.learning_start_date";

/// The learner's calendar: the host time zone or a fixed UTC offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LearnerClock {
    Local,
    Fixed(FixedOffset),
}

impl LearnerClock {
    pub fn from_config(config: &ClockConfig) -> EngineResult<Self> {
        match config.utc_offset_minutes {
            None => Ok(LearnerClock::Local),
            Some(minutes) => FixedOffset::east_opt(minutes * 60)
                .map(LearnerClock::Fixed)
                .ok_or_else(|| EngineError::Config(format!("invalid utc offset: {} minutes", minutes))),
        }
    }

    pub fn utc() -> Self {
        LearnerClock::Fixed(Utc.fix())
    }

    pub fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    /// Calendar date of an instant in the learner's time zone
    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        match self {
            LearnerClock::Local => at.with_timezone(&Local).date_naive(),
            LearnerClock::Fixed(offset) => at.with_timezone(offset).date_naive(),
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.local_date(self.now())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub learner_id: String,
    pub device_id: String,
    pub learning_start: NaiveDate,
}

impl Identity {
    /// Load identity from the store, creating any missing piece
    pub fn load(store: &Store, clock: &LearnerClock) -> EngineResult<Self> {
        let learner_id = store.get_or_init_setting(USER_ID_KEY, || Uuid::new_v4().to_string())?;
        let device_id = store.get_or_init_setting(DEVICE_ID_KEY, || Uuid::new_v4().to_string())?;
        let start = store.get_or_init_setting(LEARNING_START_KEY, || {
            clock.today().format("%Y-%m-%d").to_string()
        })?;
        let learning_start = NaiveDate::parse_from_str(&start, "%Y-%m-%d").map_err(|e| {
            EngineError::Initialization(format!("corrupt learning start date '{}': {}", start, e))
        })?;

        store.ensure_user_exists(&learner_id)?;
        info!("Learner {} on device {}", learner_id, device_id);

        Ok(Self {
            learner_id,
            device_id,
            learning_start,
        })
    }

    /// Calendar days between the anchor and `today` (negative before the anchor)
    pub fn days_since_start(&self, today: NaiveDate) -> i64 {
        (today - self.learning_start).num_days()
    }

    pub fn day_index_for(&self, curriculum: &Curriculum, today: NaiveDate) -> usize {
        curriculum.clamp_day_index(self.days_since_start(today))
    }

    /// Queue start position for today's new words: the clamped day's block
    pub fn daily_start_index(&self, curriculum: &Curriculum, words_per_day: usize, today: NaiveDate) -> usize {
        self.day_index_for(curriculum, today) * words_per_day.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_identity_is_created_once() {
        let store = Store::in_memory().unwrap();
        let clock = LearnerClock::utc();
        let first = Identity::load(&store, &clock).unwrap();
        let second = Identity::load(&store, &clock).unwrap();

        assert_eq!(first, second);
        assert_ne!(first.learner_id, first.device_id);
        assert_eq!(first.learning_start, clock.today());
    }

    #[test]
    fn test_stored_anchor_is_respected() {
        let store = Store::in_memory().unwrap();
        store.set_setting(LEARNING_START_KEY, "2026-01-01").unwrap();
        let identity = Identity::load(&store, &LearnerClock::utc()).unwrap();
        assert_eq!(identity.learning_start, date(2026, 1, 1));
    }

    #[test]
    fn test_corrupt_anchor_is_initialization_failure() {
        let store = Store::in_memory().unwrap();
        store.set_setting(LEARNING_START_KEY, "yesterday-ish").unwrap();
        assert!(matches!(
            Identity::load(&store, &LearnerClock::utc()),
            Err(EngineError::Initialization(_))
        ));
    }

    #[test]
    fn test_day_index_and_start_index() {
        let identity = Identity {
            learner_id: "l".to_string(),
            device_id: "d".to_string(),
            learning_start: date(2026, 1, 1),
        };
        let curriculum = Curriculum::default();

        assert_eq!(identity.day_index_for(&curriculum, date(2026, 1, 1)), 0);
        assert_eq!(identity.day_index_for(&curriculum, date(2026, 1, 6)), 5);
        assert_eq!(identity.day_index_for(&curriculum, date(2026, 3, 1)), 19);
        assert_eq!(identity.day_index_for(&curriculum, date(2025, 12, 25)), 0);

        assert_eq!(identity.daily_start_index(&curriculum, 20, date(2026, 1, 3)), 40);
        assert_eq!(identity.daily_start_index(&curriculum, 0, date(2026, 1, 3)), 2);
        assert_eq!(identity.daily_start_index(&curriculum, 20, date(2025, 12, 30)), 0);
        // Past the last day the start stays on the final day's block
        assert_eq!(identity.daily_start_index(&curriculum, 3, date(2026, 1, 31)), 57);
        assert_eq!(identity.daily_start_index(&curriculum, 3, date(2027, 1, 1)), 57);
    }

    #[test]
    fn test_fixed_offset_moves_the_calendar_day() {
        let at = Utc.with_ymd_and_hms(2026, 4, 10, 23, 30, 0).unwrap();
        let utc = LearnerClock::utc();
        let tokyo = LearnerClock::from_config(&ClockConfig {
            utc_offset_minutes: Some(9 * 60),
        })
        .unwrap();
        assert_eq!(utc.local_date(at), date(2026, 4, 10));
        assert_eq!(tokyo.local_date(at), date(2026, 4, 11));
    }
}
