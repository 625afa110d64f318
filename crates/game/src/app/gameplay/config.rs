use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use engine::{LoopConfig, Rect, SceneKey, Vec2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::boss::BossTuning;
use super::companion::CompanionTuning;
use super::hero::HeroDefaults;
use super::items::{DropTable, ItemKind, ItemPlan, PlannedItem, UpgradeDeltas};
use super::types::{ticks_from_secs, Tick};
use super::worm::WormTuning;

pub(crate) const SETTINGS_FILE_NAME: &str = "settings.json";
pub(crate) const MASTER_EDITOR_BLOCKS: u32 = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum VictoryRule {
    WormsDefeated(u32),
    BossDefeated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DefeatRule {
    /// The level is lost as soon as the player's hero goes down.
    ActiveHeroDown,
    /// Control passes to the standing hero; lost only when both are down.
    BothHeroesDown,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct WormSpawner {
    pub(crate) areas: Vec<Rect>,
    pub(crate) initial: usize,
    pub(crate) max_alive: usize,
    pub(crate) interval: Tick,
    pub(crate) attempts: u32,
}

/// Code-defined gameplay tuning for one level.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LevelConfig {
    pub(crate) level: u32,
    pub(crate) world_width: f32,
    pub(crate) world_height: f32,
    /// Per-tick camera blend; zero keeps the camera fixed.
    pub(crate) camera_alpha: f32,
    pub(crate) juan_spawn: Vec2,
    pub(crate) adan_spawn: Vec2,
    pub(crate) juan: HeroDefaults,
    pub(crate) adan: HeroDefaults,
    pub(crate) worm: WormTuning,
    pub(crate) spawner: Option<WormSpawner>,
    pub(crate) boss_spawn: Option<Vec2>,
    pub(crate) boss: BossTuning,
    pub(crate) drops: DropTable,
    pub(crate) upgrades: UpgradeDeltas,
    pub(crate) item_plan: Option<ItemPlan>,
    pub(crate) companion: CompanionTuning,
    pub(crate) shield_duration: Tick,
    pub(crate) shield_factor: f32,
    pub(crate) invulnerability: Tick,
    pub(crate) switch_cooldown: Tick,
    pub(crate) victory: VictoryRule,
    pub(crate) defeat: DefeatRule,
    /// How long the victory banner shows before advancing on its own.
    pub(crate) victory_banner: Tick,
    /// Whether winning moves on to the next level once the banner is done.
    pub(crate) advance_after_victory: bool,
    pub(crate) rng_seed: u64,
}

impl LevelConfig {
    pub(crate) fn level_one() -> Self {
        let area = |x: f32, y: f32| Rect::new(x, y, 400.0, 300.0);
        Self {
            level: 1,
            world_width: 2560.0,
            world_height: 1440.0,
            camera_alpha: 0.1,
            juan_spawn: Vec2::new(1200.0, 680.0),
            adan_spawn: Vec2::new(1100.0, 680.0),
            juan: HeroDefaults {
                max_health: 100,
                speed: 200.0,
                damage: 15,
            },
            adan: HeroDefaults {
                max_health: 120,
                speed: 180.0,
                damage: 40,
            },
            worm: WormTuning::default(),
            spawner: Some(WormSpawner {
                areas: vec![
                    area(200.0, 200.0),
                    area(1960.0, 200.0),
                    area(200.0, 940.0),
                    area(1960.0, 940.0),
                ],
                initial: 4,
                max_alive: 6,
                interval: ticks_from_secs(2.0),
                attempts: 20,
            }),
            boss_spawn: None,
            boss: BossTuning::default(),
            drops: DropTable {
                apple: 0.15,
                potion: 0.15,
            },
            upgrades: UpgradeDeltas {
                speed: 20.0,
                damage: 5,
                max_health: 20,
            },
            item_plan: None,
            companion: CompanionTuning::default(),
            shield_duration: ticks_from_secs(15.0),
            shield_factor: 0.5,
            invulnerability: ticks_from_secs(0.5),
            switch_cooldown: ticks_from_secs(1.0),
            victory: VictoryRule::WormsDefeated(15),
            defeat: DefeatRule::ActiveHeroDown,
            victory_banner: ticks_from_secs(3.0),
            advance_after_victory: true,
            rng_seed: 0x4A55_414E,
        }
    }

    pub(crate) fn level_two() -> Self {
        Self {
            level: 2,
            world_width: 1280.0,
            world_height: 720.0,
            camera_alpha: 0.0,
            juan_spawn: Vec2::new(300.0, 560.0),
            adan_spawn: Vec2::new(200.0, 560.0),
            juan: HeroDefaults {
                max_health: 130,
                speed: 210.0,
                damage: 15,
            },
            adan: HeroDefaults {
                max_health: 150,
                speed: 190.0,
                damage: 40,
            },
            worm: WormTuning {
                max_health: 50,
                damage: 12,
                ..WormTuning::default()
            },
            spawner: None,
            boss_spawn: Some(Vec2::new(960.0, 200.0)),
            drops: DropTable {
                apple: 0.25,
                potion: 0.25,
            },
            upgrades: UpgradeDeltas {
                speed: 25.0,
                damage: 8,
                max_health: 25,
            },
            item_plan: Some(ItemPlan {
                scheduled: vec![
                    PlannedItem {
                        kind: ItemKind::Potion,
                        position: Vec2::new(620.0, 560.0),
                        delay: ticks_from_secs(8.0),
                    },
                    PlannedItem {
                        kind: ItemKind::Apple,
                        position: Vec2::new(160.0, 240.0),
                        delay: ticks_from_secs(20.0),
                    },
                ],
                ..ItemPlan::default()
            }),
            victory: VictoryRule::BossDefeated,
            defeat: DefeatRule::BothHeroesDown,
            advance_after_victory: false,
            rng_seed: 0x4144_414E,
            ..Self::level_one()
        }
    }

    pub(crate) fn for_scene(key: SceneKey) -> Self {
        match key {
            SceneKey::LevelOne => Self::level_one(),
            SceneKey::LevelTwo => Self::level_two(),
        }
    }
}

#[derive(Debug, Error)]
pub(crate) enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse settings file {path} at {json_path}: {source}")]
    Parse {
        path: PathBuf,
        json_path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid setting '{field}' in {path}: {reason}")]
    Invalid {
        path: PathBuf,
        field: &'static str,
        reason: String,
    },
}

/// Optional `config/settings.json`. Every field has a default, so a partial
/// file only overrides what it names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct GameSettings {
    pub(crate) window_width: u32,
    pub(crate) window_height: u32,
    pub(crate) target_tps: u32,
    pub(crate) max_render_fps: Option<u32>,
    pub(crate) level_one_camera_alpha: f32,
    pub(crate) collision_data_dir: String,
}

impl Default for GameSettings {
    fn default() -> Self {
        let loop_defaults = LoopConfig::default();
        Self {
            window_width: loop_defaults.window_width,
            window_height: loop_defaults.window_height,
            target_tps: loop_defaults.target_tps,
            max_render_fps: loop_defaults.max_render_fps,
            level_one_camera_alpha: LevelConfig::level_one().camera_alpha,
            collision_data_dir: "data".to_string(),
        }
    }
}

impl GameSettings {
    /// A missing file is not an error: defaults apply.
    pub(crate) fn load(config_dir: &Path) -> Result<Self, SettingsError> {
        let path = config_dir.join(SETTINGS_FILE_NAME);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => return Err(SettingsError::Read { path, source }),
        };
        Self::parse(&raw, &path)
    }

    pub(crate) fn parse(raw: &str, path: &Path) -> Result<Self, SettingsError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        let settings: Self =
            serde_path_to_error::deserialize(&mut deserializer).map_err(|error| {
                SettingsError::Parse {
                    path: path.to_path_buf(),
                    json_path: error.path().to_string(),
                    source: error.into_inner(),
                }
            })?;
        settings.validate(path)?;
        Ok(settings)
    }

    fn validate(&self, path: &Path) -> Result<(), SettingsError> {
        let invalid = |field: &'static str, reason: String| SettingsError::Invalid {
            path: path.to_path_buf(),
            field,
            reason,
        };
        if self.window_width == 0 || self.window_height == 0 {
            let (width, height) = (self.window_width, self.window_height);
            return Err(invalid(
                "window_width",
                format!("window must be non-empty, got {width}x{height}"),
            ));
        }
        if self.target_tps == 0 {
            return Err(invalid("target_tps", "must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.level_one_camera_alpha) {
            return Err(invalid(
                "level_one_camera_alpha",
                format!("must be within 0..=1, got {}", self.level_one_camera_alpha),
            ));
        }
        if self.collision_data_dir.trim().is_empty() {
            return Err(invalid("collision_data_dir", "must not be empty".to_string()));
        }
        Ok(())
    }

    pub(crate) fn apply_to(&self, config: LoopConfig) -> LoopConfig {
        LoopConfig {
            window_width: self.window_width,
            window_height: self.window_height,
            target_tps: self.target_tps,
            max_render_fps: self.max_render_fps,
            ..config
        }
    }

    pub(crate) fn level_config(&self, key: SceneKey) -> LevelConfig {
        let mut config = LevelConfig::for_scene(key);
        if key == SceneKey::LevelOne {
            config.camera_alpha = self.level_one_camera_alpha;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_tables_differ_where_expected() {
        let one = LevelConfig::level_one();
        let two = LevelConfig::level_two();
        assert_eq!(one.victory, VictoryRule::WormsDefeated(15));
        assert_eq!(two.victory, VictoryRule::BossDefeated);
        assert_eq!(one.defeat, DefeatRule::ActiveHeroDown);
        assert_eq!(two.defeat, DefeatRule::BothHeroesDown);
        assert_eq!(two.camera_alpha, 0.0);
        assert!(two.drops.apple > one.drops.apple);
        assert_eq!(two.upgrades.damage, 8);
        assert_eq!(two.item_plan.as_ref().map(|plan| plan.cap), Some(10));
        assert_eq!(one.shield_duration, 900);
    }

    #[test]
    fn partial_settings_keep_defaults() {
        let settings =
            GameSettings::parse(r#"{ "window_width": 1600 }"#, Path::new("settings.json"))
                .expect("parse");
        assert_eq!(settings.window_width, 1600);
        assert_eq!(settings.window_height, 720);
        assert_eq!(settings.collision_data_dir, "data");
    }

    #[test]
    fn parse_error_names_the_json_path() {
        let error = GameSettings::parse(
            r#"{ "max_render_fps": "fast" }"#,
            Path::new("settings.json"),
        )
        .expect_err("type mismatch");
        match error {
            SettingsError::Parse { json_path, .. } => assert_eq!(json_path, "max_render_fps"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn out_of_range_alpha_is_rejected() {
        let error = GameSettings::parse(
            r#"{ "level_one_camera_alpha": 1.5 }"#,
            Path::new("settings.json"),
        )
        .expect_err("invalid");
        assert!(matches!(
            error,
            SettingsError::Invalid {
                field: "level_one_camera_alpha",
                ..
            }
        ));
    }

    #[test]
    fn missing_file_loads_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let settings = GameSettings::load(temp.path()).expect("defaults");
        assert_eq!(settings, GameSettings::default());
    }

    #[test]
    fn settings_override_loop_and_camera() {
        let settings = GameSettings {
            target_tps: 120,
            level_one_camera_alpha: 0.25,
            ..GameSettings::default()
        };
        let config = settings.apply_to(LoopConfig::default());
        assert_eq!(config.target_tps, 120);
        assert_eq!(settings.level_config(SceneKey::LevelOne).camera_alpha, 0.25);
        assert_eq!(settings.level_config(SceneKey::LevelTwo).camera_alpha, 0.0);
    }
}
