//! Reachability checks against the two external services. Nothing here runs
//! during settings loading; only the preflight binary calls these.

use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

use crate::{app_state::AppState, config::Settings, error::PreflightError};

#[derive(Debug, Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

pub async fn list_models(state: &AppState) -> Result<Vec<String>, PreflightError> {
    let client = state.settings.openai_client_config();
    let url = format!("{}/models", client.base_url.trim_end_matches('/'));

    let response = state
        .http
        .get(&url)
        .bearer_auth(&client.api_key)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(PreflightError::Upstream(format!("{url} returned {status}: {body}")));
    }

    let models: ModelList = response.json().await?;
    debug!(%url, count = models.data.len(), "listed models");
    Ok(models.data.into_iter().map(|m| m.id).collect())
}

pub fn missing_models<'a>(settings: &'a Settings, served: &[String]) -> Vec<&'a str> {
    let mut missing: Vec<&str> = Vec::new();
    for model in [
        settings.default_chat_model.as_str(),
        settings.default_transformation_model.as_str(),
        settings.default_embedding_model.as_str(),
    ] {
        if !served.iter().any(|id| id == model) && !missing.contains(&model) {
            missing.push(model);
        }
    }
    missing
}

/// SurrealDB serves `/health` over HTTP on the same port as its websocket
/// endpoint.
pub fn surreal_health_url(address: &str) -> Result<Url, PreflightError> {
    let mut url = Url::parse(address)
        .map_err(|e| PreflightError::Upstream(format!("invalid SURREAL_ADDRESS {address:?}: {e}")))?;

    let scheme = match url.scheme() {
        "ws" | "http" => "http",
        "wss" | "https" => "https",
        other => {
            return Err(PreflightError::Upstream(format!(
                "unsupported SURREAL_ADDRESS scheme {other:?}"
            )))
        }
    };

    url.set_scheme(scheme)
        .map_err(|()| PreflightError::Upstream(format!("cannot use {scheme} for {address:?}")))?;
    url.set_path("/health");
    url.set_query(None);
    Ok(url)
}

pub async fn check_surreal(state: &AppState) -> Result<(), PreflightError> {
    let url = surreal_health_url(&state.settings.surreal_address)?;
    let status = state.http.get(url.clone()).send().await?.status();

    if !status.is_success() {
        return Err(PreflightError::Upstream(format!("{url} returned {status}")));
    }

    debug!(%url, "database is healthy");
    Ok(())
}
