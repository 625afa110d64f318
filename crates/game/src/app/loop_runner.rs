use std::process::ExitCode;

use engine::{run_app, StartupError, TracingAudioSink};
use tracing::{error, info};

use super::bootstrap::AppWiring;

pub(crate) fn run(app: Result<AppWiring, StartupError>) -> ExitCode {
    let app = match app {
        Ok(app) => app,
        Err(err) => {
            error!(error = %err, "startup_failed");
            return ExitCode::FAILURE;
        }
    };

    let mut audio = TracingAudioSink::default();
    if let Err(err) = run_app(app.config, app.level_one, app.level_two, &mut audio) {
        error!(error = %err, "startup_failed");
        return ExitCode::FAILURE;
    }

    info!(cues_played = audio.played(), "shutdown");
    ExitCode::SUCCESS
}
