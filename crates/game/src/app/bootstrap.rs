use engine::{resolve_app_paths, LoopConfig, Scene, StartupError};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::gameplay;
use super::gameplay::config::GameSettings;

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) level_one: Box<dyn Scene>,
    pub(crate) level_two: Box<dyn Scene>,
}

pub(crate) fn build_app() -> Result<AppWiring, StartupError> {
    init_tracing();
    info!(version = env!("CARGO_PKG_VERSION"), "=== Juan & Adán Startup ===");

    let paths = resolve_app_paths()?;
    let settings = match GameSettings::load(&paths.config_dir) {
        Ok(settings) => settings,
        Err(error) => {
            warn!(error = %error, "settings_invalid_using_defaults");
            GameSettings::default()
        }
    };
    info!(
        window_width = settings.window_width,
        window_height = settings.window_height,
        target_tps = settings.target_tps,
        collision_data_dir = %settings.collision_data_dir,
        "settings_loaded"
    );

    let (level_one, level_two) = gameplay::build_scene_pair(&paths, &settings);
    let config = settings.apply_to(LoopConfig {
        window_title: "Juan & Adán".to_string(),
        ..LoopConfig::default()
    });

    Ok(AppWiring {
        config,
        level_one,
        level_two,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}
