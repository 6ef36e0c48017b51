//! Settings loaded from environment variables.
//!
//! The variable names are shared with `docker/docker-compose.yaml`, which injects
//! the same values into the notebook container. A variable that is unset or
//! empty falls back to its default; any other value is used as given.

use std::{
    collections::{BTreeMap, HashMap},
    env, fmt, io,
    path::{Path, PathBuf},
    str::FromStr,
};

use reqwest::Url;
use serde::Serialize;
use tracing::debug;

use crate::error::ConfigError;

pub const APP_PORT: &str = "APP_PORT";
pub const LOG_LEVEL: &str = "LOG_LEVEL";
pub const OPENAI_API_BASE: &str = "OPENAI_API_BASE";
pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const DEFAULT_CHAT_MODEL: &str = "DEFAULT_CHAT_MODEL";
pub const DEFAULT_TRANSFORMATION_MODEL: &str = "DEFAULT_TRANSFORMATION_MODEL";
pub const DEFAULT_EMBEDDING_MODEL: &str = "DEFAULT_EMBEDDING_MODEL";
pub const SURREAL_ADDRESS: &str = "SURREAL_ADDRESS";
pub const SURREAL_PORT: &str = "SURREAL_PORT";
pub const SURREAL_USER: &str = "SURREAL_USER";
pub const SURREAL_PASS: &str = "SURREAL_PASS";
pub const SURREAL_NAMESPACE: &str = "SURREAL_NAMESPACE";
pub const SURREAL_DATABASE: &str = "SURREAL_DATABASE";

/// Variables the notebook container must receive from the compose file.
pub const NOTEBOOK_ENV_VARS: [&str; 12] = [
    LOG_LEVEL,
    OPENAI_API_BASE,
    OPENAI_API_KEY,
    DEFAULT_CHAT_MODEL,
    DEFAULT_TRANSFORMATION_MODEL,
    DEFAULT_EMBEDDING_MODEL,
    SURREAL_ADDRESS,
    SURREAL_PORT,
    SURREAL_USER,
    SURREAL_PASS,
    SURREAL_NAMESPACE,
    SURREAL_DATABASE,
];

pub const DEFAULT_APP_PORT: u16 = 8501;
pub const DEFAULT_OPENAI_API_BASE: &str = "http://localhost:8000/v1";
pub const DEFAULT_OPENAI_API_KEY: &str = "dummy-key";
pub const DEFAULT_MODEL: &str = "gpt-oss-20b";
pub const DEFAULT_SURREAL_ADDRESS: &str = "ws://surreal-db:8000";
pub const DEFAULT_SURREAL_PORT: u16 = 8000;
pub const DEFAULT_SURREAL_USER: &str = "root";
pub const DEFAULT_SURREAL_PASS: &str = "root";
pub const DEFAULT_SURREAL_NAMESPACE: &str = "open_notebook";
pub const DEFAULT_SURREAL_DATABASE: &str = "open_notebook";

const REDACTED: &str = "***";

pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;
}

impl<T: EnvSource + ?Sized> EnvSource for &T {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }
}

/// The current process environment. Non-unicode values read as unset.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

/// Values parsed from a dotenv file. Reading one never touches the process
/// environment.
#[derive(Clone, Debug, Default)]
pub struct EnvFile {
    path: PathBuf,
    values: HashMap<String, String>,
}

impl EnvFile {
    pub const CANDIDATES: [&'static str; 2] = ["docker/.env", ".env"];

    /// A missing file reads as empty; a file that cannot be parsed is an error.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();

        let lines = match dotenvy::from_path_iter(&path) {
            Ok(lines) => lines,
            Err(dotenvy::Error::Io(err)) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "env file not found");
                return Ok(Self {
                    path,
                    values: HashMap::new(),
                });
            }
            Err(source) => return Err(ConfigError::EnvFile { path, source }),
        };

        let wrap = |source: dotenvy::Error| ConfigError::EnvFile {
            path: path.clone(),
            source,
        };

        let mut values = HashMap::new();
        for item in lines {
            let (key, value) = item.map_err(wrap)?;
            values.insert(key, value);
        }

        debug!(path = %path.display(), count = values.len(), "read env file");
        Ok(Self { path, values })
    }

    pub fn discover(start_dir: &Path) -> Option<PathBuf> {
        Self::CANDIDATES
            .iter()
            .map(|rel| start_dir.join(rel))
            .find(|path| path.is_file())
    }

    /// Searches `cwd`, then the package directory, so `cargo run` from a
    /// subdirectory still finds `docker/.env`.
    pub fn locate(cwd: &Path) -> Option<PathBuf> {
        Self::discover(cwd).or_else(|| Self::discover(Path::new(env!("CARGO_MANIFEST_DIR"))))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EnvSource for EnvFile {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// `primary` wins unless a key is unset or empty there.
#[derive(Clone, Debug)]
pub struct Overlay<P, F> {
    primary: P,
    fallback: F,
}

impl<P, F> Overlay<P, F> {
    pub fn new(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }
}

impl<P: EnvSource, F: EnvSource> EnvSource for Overlay<P, F> {
    fn get(&self, key: &str) -> Option<String> {
        self.primary
            .get(key)
            .filter(|value| !value.is_empty())
            .or_else(|| self.fallback.get(key))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        }
    }

    /// `tracing` has no level above error, so CRITICAL maps onto it.
    pub fn tracing_directive(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error | LogLevel::Critical => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARNING" => Ok(LogLevel::Warning),
            "ERROR" => Ok(LogLevel::Error),
            "CRITICAL" => Ok(LogLevel::Critical),
            _ => Err(ConfigError::InvalidLogLevel {
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Settings {
    pub app_port: u16,
    pub log_level: LogLevel,

    pub openai_api_base: String,
    pub openai_api_key: String,

    pub default_chat_model: String,
    pub default_transformation_model: String,
    pub default_embedding_model: String,

    pub surreal_address: String,
    pub surreal_port: u16,
    pub surreal_user: String,
    pub surreal_pass: String,
    pub surreal_namespace: String,
    pub surreal_database: String,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_source(&ProcessEnv)
    }

    pub fn from_source<S: EnvSource + ?Sized>(source: &S) -> Result<Self, ConfigError> {
        Ok(Self {
            app_port: parse_port(APP_PORT, lookup(source, APP_PORT), DEFAULT_APP_PORT)?,
            log_level: parse_log_level(lookup(source, LOG_LEVEL))?,
            openai_api_base: string_or(source, OPENAI_API_BASE, DEFAULT_OPENAI_API_BASE),
            openai_api_key: string_or(source, OPENAI_API_KEY, DEFAULT_OPENAI_API_KEY),
            default_chat_model: string_or(source, DEFAULT_CHAT_MODEL, DEFAULT_MODEL),
            default_transformation_model: string_or(
                source,
                DEFAULT_TRANSFORMATION_MODEL,
                DEFAULT_MODEL,
            ),
            default_embedding_model: string_or(source, DEFAULT_EMBEDDING_MODEL, DEFAULT_MODEL),
            surreal_address: string_or(source, SURREAL_ADDRESS, DEFAULT_SURREAL_ADDRESS),
            surreal_port: parse_port(
                SURREAL_PORT,
                lookup(source, SURREAL_PORT),
                DEFAULT_SURREAL_PORT,
            )?,
            surreal_user: string_or(source, SURREAL_USER, DEFAULT_SURREAL_USER),
            surreal_pass: string_or(source, SURREAL_PASS, DEFAULT_SURREAL_PASS),
            surreal_namespace: string_or(source, SURREAL_NAMESPACE, DEFAULT_SURREAL_NAMESPACE),
            surreal_database: string_or(source, SURREAL_DATABASE, DEFAULT_SURREAL_DATABASE),
        })
    }

    pub fn openai_client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.openai_api_base.clone(),
            api_key: self.openai_api_key.clone(),
        }
    }

    /// Checks that loading does not perform: required values present and
    /// URL-shaped values parseable with a usable scheme.
    pub fn validate(&self) -> Vec<SettingsIssue> {
        let mut issues = Vec::new();

        if self.openai_api_base.trim().is_empty() {
            issues.push(SettingsIssue::Missing(OPENAI_API_BASE));
        } else if !has_scheme(&self.openai_api_base, &["http", "https"]) {
            issues.push(SettingsIssue::BadUrl {
                var: OPENAI_API_BASE,
                expected: "http(s)",
                value: self.openai_api_base.clone(),
            });
        }

        if self.default_chat_model.trim().is_empty() {
            issues.push(SettingsIssue::Missing(DEFAULT_CHAT_MODEL));
        }

        if self.surreal_address.trim().is_empty() {
            issues.push(SettingsIssue::Missing(SURREAL_ADDRESS));
        } else if !has_scheme(&self.surreal_address, &["ws", "wss", "http", "https"]) {
            issues.push(SettingsIssue::BadUrl {
                var: SURREAL_ADDRESS,
                expected: "ws(s) or http(s)",
                value: self.surreal_address.clone(),
            });
        }

        issues
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_port: DEFAULT_APP_PORT,
            log_level: LogLevel::default(),
            openai_api_base: DEFAULT_OPENAI_API_BASE.to_string(),
            openai_api_key: DEFAULT_OPENAI_API_KEY.to_string(),
            default_chat_model: DEFAULT_MODEL.to_string(),
            default_transformation_model: DEFAULT_MODEL.to_string(),
            default_embedding_model: DEFAULT_MODEL.to_string(),
            surreal_address: DEFAULT_SURREAL_ADDRESS.to_string(),
            surreal_port: DEFAULT_SURREAL_PORT,
            surreal_user: DEFAULT_SURREAL_USER.to_string(),
            surreal_pass: DEFAULT_SURREAL_PASS.to_string(),
            surreal_namespace: DEFAULT_SURREAL_NAMESPACE.to_string(),
            surreal_database: DEFAULT_SURREAL_DATABASE.to_string(),
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("app_port", &self.app_port)
            .field("log_level", &self.log_level)
            .field("openai_api_base", &self.openai_api_base)
            .field("openai_api_key", &REDACTED)
            .field("default_chat_model", &self.default_chat_model)
            .field("default_transformation_model", &self.default_transformation_model)
            .field("default_embedding_model", &self.default_embedding_model)
            .field("surreal_address", &self.surreal_address)
            .field("surreal_port", &self.surreal_port)
            .field("surreal_user", &self.surreal_user)
            .field("surreal_pass", &REDACTED)
            .field("surreal_namespace", &self.surreal_namespace)
            .field("surreal_database", &self.surreal_database)
            .finish()
    }
}

/// Serializes to exactly `{"base_url": ..., "api_key": ...}`.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_key: String,
}

impl ClientConfig {
    pub fn to_map(&self) -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            ("base_url", self.base_url.clone()),
            ("api_key", self.api_key.clone()),
        ])
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &REDACTED)
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SettingsIssue {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("{var} is not a valid {expected} URL: {value:?}")]
    BadUrl {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

fn lookup<S: EnvSource + ?Sized>(source: &S, key: &str) -> Option<String> {
    source.get(key).filter(|value| !value.is_empty())
}

fn string_or<S: EnvSource + ?Sized>(source: &S, key: &str, default: &str) -> String {
    lookup(source, key).unwrap_or_else(|| {
        debug!(var = key, default, "variable unset, using default");
        default.to_string()
    })
}

fn parse_port(var: &'static str, raw: Option<String>, default: u16) -> Result<u16, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };

    match raw.trim().parse::<u16>() {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(ConfigError::InvalidPort { var, value: raw }),
    }
}

fn parse_log_level(raw: Option<String>) -> Result<LogLevel, ConfigError> {
    raw.map_or(Ok(LogLevel::default()), |value| value.parse())
}

fn has_scheme(value: &str, schemes: &[&str]) -> bool {
    Url::parse(value)
        .map(|url| schemes.contains(&url.scheme()) && url.has_host())
        .unwrap_or(false)
}
