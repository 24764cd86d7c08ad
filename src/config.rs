//! Learner-side configuration loaded from `config.toml`
//!
//! Every key is optional; a missing file or section falls back to defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};

/// Config file name inside the data directory
pub const CONFIG_FILE: &str = "config.toml";

pub const DEFAULT_CONFIG: &str = r#"# Vocab engine configuration

[content]
# Word list selected by name, falls back to the first list by id
default_list_name = "sat_core_1"

[session]
# Words introduced per curriculum day
new_words_per_day = 20
# Items in a plain review session
review_batch = 10
# Upper bound for a zone review pass
zone_review_limit = 200
# Wrong choices offered next to the target word
distractor_count = 3
cloze_rounds = 20
mcq_rounds = 20
mcq_fetch_per_word = 2
questions_verified_only = true
xp_per_correct = 10

[analysis]
# A word is weak with at least this many attempts...
weak_min_attempts = 3
# ...and a correct rate strictly below this value
weak_max_correct_rate = 0.7

[curriculum]
total_days = 20
days_per_zone = 4
unlock_all_zones = false

[clock]
# Fix the learner's calendar to a UTC offset; host time zone when unset
# utc_offset_minutes = 0

[matching]
# "whole-word" or "exact"
answer_policy = "whole-word"
"#;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub content: ContentConfig,
    pub session: SessionConfig,
    pub analysis: AnalysisConfig,
    pub curriculum: CurriculumConfig,
    pub clock: ClockConfig,
    pub matching: MatchingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    pub default_list_name: String,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            default_list_name: "sat_core_1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub new_words_per_day: usize,
    pub review_batch: usize,
    pub zone_review_limit: usize,
    pub distractor_count: usize,
    pub cloze_rounds: usize,
    pub mcq_rounds: usize,
    pub mcq_fetch_per_word: usize,
    pub questions_verified_only: bool,
    pub xp_per_correct: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            new_words_per_day: 20,
            review_batch: 10,
            zone_review_limit: 200,
            distractor_count: 3,
            cloze_rounds: 20,
            mcq_rounds: 20,
            mcq_fetch_per_word: 2,
            questions_verified_only: true,
            xp_per_correct: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub weak_min_attempts: i64,
    pub weak_max_correct_rate: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            weak_min_attempts: 3,
            weak_max_correct_rate: 0.7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CurriculumConfig {
    pub total_days: usize,
    pub days_per_zone: usize,
    pub unlock_all_zones: bool,
}

impl Default for CurriculumConfig {
    fn default() -> Self {
        Self {
            total_days: 20,
            days_per_zone: 4,
            unlock_all_zones: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    pub utc_offset_minutes: Option<i32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnswerPolicy {
    #[default]
    WholeWord,
    Exact,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub answer_policy: AnswerPolicy,
}

impl Config {
    /// Load configuration, returning defaults when the file does not exist
    pub fn load(config_path: &Path) -> EngineResult<Self> {
        if !config_path.exists() {
            debug!("No config at {:?}, using defaults", config_path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path)
            .map_err(|e| EngineError::Initialization(format!("cannot read {:?}: {}", config_path, e)))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| EngineError::Initialization(format!("invalid {:?}: {}", config_path, e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Write the commented default file unless one already exists
    pub fn write_default(config_path: &Path) -> EngineResult<bool> {
        if config_path.exists() {
            return Ok(false);
        }
        std::fs::write(config_path, DEFAULT_CONFIG)
            .map_err(|e| EngineError::Initialization(format!("cannot write {:?}: {}", config_path, e)))?;
        info!("Created default configuration at {:?}", config_path);
        Ok(true)
    }

    pub fn validate(&self) -> EngineResult<()> {
        let c = &self.curriculum;
        if c.total_days == 0 || c.days_per_zone == 0 {
            return Err(EngineError::Config(
                "curriculum.total_days and curriculum.days_per_zone must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.analysis.weak_max_correct_rate) {
            return Err(EngineError::Config(
                "analysis.weak_max_correct_rate must be within 0..=1".to_string(),
            ));
        }
        if let Some(offset) = self.clock.utc_offset_minutes {
            if offset.abs() >= 24 * 60 {
                return Err(EngineError::Config(format!(
                    "clock.utc_offset_minutes out of range: {}",
                    offset
                )));
            }
        }
        Ok(())
    }
}
