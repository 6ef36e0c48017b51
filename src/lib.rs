//! Settings and topology checks for running Open Notebook against a local
//! OpenAI-compatible inference server.

pub mod app_state;
pub mod cache;
pub mod config;
pub mod error;
pub mod probe;
pub mod topology;

pub use cache::{get_settings, reset_settings, SettingsCache};
pub use config::{ClientConfig, LogLevel, Settings};
pub use error::{ConfigError, PreflightError, TopologyError};
