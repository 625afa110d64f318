mod attack;
mod boss;
mod collision;
mod companion;
pub(crate) mod config;
mod hero;
mod items;
mod kinematics;
mod level;
mod progress;
mod projectile;
mod scene_impl;
mod types;
mod worm;

use engine::{AppPaths, Scene, SceneKey};

use self::config::GameSettings;
use self::scene_impl::{LevelPaths, LevelScene};

/// Level 1 and Level 2, in that order, ready for the engine's scene machine.
pub(crate) fn build_scene_pair(
    paths: &AppPaths,
    settings: &GameSettings,
) -> (Box<dyn Scene>, Box<dyn Scene>) {
    let level_paths = LevelPaths {
        assets_dir: paths.assets_dir.clone(),
        blocks_dir: paths.root.join(&settings.collision_data_dir),
        data_dir: paths.data_dir.clone(),
    };
    let scene = |key: SceneKey| -> Box<dyn Scene> {
        Box::new(LevelScene::new(
            key,
            settings.level_config(key),
            level_paths.clone(),
        ))
    };
    (scene(SceneKey::LevelOne), scene(SceneKey::LevelTwo))
}
