use std::{sync::Arc, time::Duration};

use reqwest::Client;

use crate::config::Settings;

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub http: Client,
}

impl AppState {
    pub fn new(settings: impl Into<Arc<Settings>>) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(PROBE_TIMEOUT).build()?;

        Ok(Self {
            settings: settings.into(),
            http,
        })
    }
}
