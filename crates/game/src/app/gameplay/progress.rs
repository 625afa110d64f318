use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use engine::write_text_atomic_with_retry;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use super::config::MASTER_EDITOR_BLOCKS;
use super::types::TICKS_PER_SECOND;

pub(crate) const PROGRESS_FILE_NAME: &str = "progress.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct SessionStats {
    pub(crate) games_played: u32,
    pub(crate) total_playtime_minutes: f64,
    pub(crate) best_worm_streak: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Achievements {
    pub(crate) first_victory: bool,
    pub(crate) level_2_unlocked: bool,
    pub(crate) master_editor: bool,
}

/// Cross-session record kept in `data/progress.json`. Unknown or missing
/// fields fall back to their defaults so older files keep loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Progress {
    pub(crate) total_worms_defeated: u32,
    pub(crate) current_level: u32,
    pub(crate) session_stats: SessionStats,
    pub(crate) achievements: Achievements,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            total_worms_defeated: 0,
            current_level: 1,
            session_stats: SessionStats::default(),
            achievements: Achievements::default(),
        }
    }
}

/// Summary of one finished level run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct LevelOutcome {
    pub(crate) level: u32,
    pub(crate) victory: bool,
    pub(crate) worms_defeated: u32,
    pub(crate) best_worm_streak: u32,
    pub(crate) ticks_played: u64,
    pub(crate) blocks_placed: u32,
}

impl Progress {
    pub(crate) fn record(&mut self, outcome: &LevelOutcome) {
        self.total_worms_defeated = self
            .total_worms_defeated
            .saturating_add(outcome.worms_defeated);
        self.session_stats.games_played = self.session_stats.games_played.saturating_add(1);
        self.session_stats.total_playtime_minutes +=
            outcome.ticks_played as f64 / (TICKS_PER_SECOND as f64 * 60.0);
        self.session_stats.best_worm_streak = self
            .session_stats
            .best_worm_streak
            .max(outcome.best_worm_streak);
        if outcome.victory {
            self.achievements.first_victory = true;
            if outcome.level == 1 {
                self.achievements.level_2_unlocked = true;
                self.current_level = self.current_level.max(2);
            }
        }
        self.current_level = self.current_level.max(outcome.level);
        if outcome.blocks_placed >= MASTER_EDITOR_BLOCKS {
            self.achievements.master_editor = true;
        }
    }
}

#[derive(Debug, Error)]
pub(crate) enum ProgressError {
    #[error("failed to read progress file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse progress file {path} at {json_path}: {source}")]
    Parse {
        path: PathBuf,
        json_path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize progress: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("failed to write progress file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct ProgressStore {
    path: PathBuf,
}

impl ProgressStore {
    pub(crate) fn in_data_dir(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(PROGRESS_FILE_NAME),
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn load(&self) -> Result<Progress, ProgressError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Ok(Progress::default())
            }
            Err(source) => {
                return Err(ProgressError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        let mut deserializer = serde_json::Deserializer::from_str(&raw);
        serde_path_to_error::deserialize(&mut deserializer).map_err(|error| ProgressError::Parse {
            path: self.path.clone(),
            json_path: error.path().to_string(),
            source: error.into_inner(),
        })
    }

    pub(crate) fn save(&self, progress: &Progress) -> Result<(), ProgressError> {
        let text = serde_json::to_string_pretty(progress).map_err(ProgressError::Serialize)?;
        write_text_atomic_with_retry(&self.path, &text).map_err(|source| ProgressError::Write {
            path: self.path.clone(),
            source,
        })
    }

    /// Load, fold in `outcome`, write back. Returns what was written.
    pub(crate) fn record(&self, outcome: &LevelOutcome) -> Result<Progress, ProgressError> {
        let mut progress = self.load()?;
        progress.record(outcome);
        self.save(&progress)?;
        info!(
            path = %self.path.display(),
            level = outcome.level,
            victory = outcome.victory,
            total_worms = progress.total_worms_defeated,
            "progress_saved"
        );
        Ok(progress)
    }
}
