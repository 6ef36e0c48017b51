use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be an integer between 1 and 65535, got {value:?}")]
    InvalidPort { var: &'static str, value: String },
    #[error(
        "LOG_LEVEL must be one of DEBUG, INFO, WARNING, ERROR, CRITICAL, got {value:?}"
    )]
    InvalidLogLevel { value: String },
    #[error("failed to read env file {}", .path.display())]
    EnvFile {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    #[error("failed to read compose file {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid compose file")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum PreflightError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error("http client error")]
    HttpClient(#[from] reqwest::Error),
    #[error("upstream error: {0}")]
    Upstream(String),
    #[error("{0} settings problem(s), see log")]
    Settings(usize),
    #[error("{0} topology problem(s), see log")]
    Contract(usize),
}
