use std::env;

use notebook_stack::{
    app_state::AppState,
    config::{EnvFile, Overlay, ProcessEnv, Settings},
    probe,
    topology::ComposeFile,
    PreflightError,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const COMPOSE_FILE: &str = "docker/docker-compose.yaml";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cwd = env::current_dir()?;
    let env_file = EnvFile::locate(&cwd).map(EnvFile::read).transpose()?;

    let settings = match &env_file {
        Some(file) => Settings::from_source(&Overlay::new(ProcessEnv, file))?,
        None => Settings::load()?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(settings.log_level.tracing_directive())),
        )
        .init();

    if let Some(file) = &env_file {
        info!(path = %file.path().display(), "using env file");
    }
    info!(?settings, "settings loaded");

    let issues = settings.validate();
    for issue in &issues {
        error!(%issue, "invalid setting");
    }
    if !issues.is_empty() {
        return Err(PreflightError::Settings(issues.len()).into());
    }

    let compose_path = cwd.join(COMPOSE_FILE);
    if compose_path.is_file() {
        let problems = ComposeFile::from_path(&compose_path)?.verify();
        for problem in &problems {
            error!(%problem, path = %compose_path.display(), "topology problem");
        }
        if !problems.is_empty() {
            return Err(PreflightError::Contract(problems.len()).into());
        }
        info!(path = %compose_path.display(), "topology ok");
    } else {
        warn!(path = %compose_path.display(), "compose file not found, skipping topology check");
    }

    let state = AppState::new(settings)?;

    let models = probe::list_models(&state).await?;
    info!(
        base_url = %state.settings.openai_api_base,
        count = models.len(),
        "inference endpoint reachable"
    );
    for model in probe::missing_models(&state.settings, &models) {
        warn!(model, "configured model is not served by the inference endpoint");
    }

    probe::check_surreal(&state).await?;
    info!(address = %state.settings.surreal_address, "database reachable");

    Ok(())
}
