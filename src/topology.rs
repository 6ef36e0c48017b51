//! Typed view of `docker/docker-compose.yaml` and the checks this repository
//! relies on: both services exist, the notebook container receives every
//! settings variable and publishes `APP_PORT`, and it waits for a healthy
//! database before starting.

use std::{collections::BTreeMap, fs, path::Path};

use serde::Deserialize;
use serde_yaml::Value;

use crate::{
    config::{APP_PORT, NOTEBOOK_ENV_VARS},
    error::TopologyError,
};

pub const NOTEBOOK_SERVICE: &str = "notebook-app";
pub const DATABASE_SERVICE: &str = "surreal-db";

const DEFAULT_CONDITION: &str = "service_started";
const HEALTHY_CONDITION: &str = "service_healthy";

#[derive(Debug, Default, Deserialize)]
pub struct ComposeFile {
    #[serde(default)]
    pub services: BTreeMap<String, Service>,
    #[serde(default)]
    pub networks: BTreeMap<String, Value>,
    #[serde(default)]
    pub volumes: BTreeMap<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Service {
    pub image: Option<String>,
    pub command: Option<Value>,
    #[serde(default)]
    pub ports: Vec<Value>,
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub depends_on: DependsOn,
    pub healthcheck: Option<Healthcheck>,
    #[serde(default)]
    pub volumes: Vec<Value>,
    #[serde(default)]
    pub networks: Value,
}

/// `environment:` in either `- KEY=value` or `KEY: value` form.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Environment {
    List(Vec<String>),
    Map(BTreeMap<String, Value>),
}

impl Default for Environment {
    fn default() -> Self {
        Environment::Map(BTreeMap::new())
    }
}

impl Environment {
    pub fn contains(&self, key: &str) -> bool {
        match self {
            Environment::List(entries) => entries
                .iter()
                .any(|entry| entry.split('=').next().map(str::trim) == Some(key)),
            Environment::Map(map) => map.contains_key(key),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum DependsOn {
    List(Vec<String>),
    Map(BTreeMap<String, Dependency>),
}

impl Default for DependsOn {
    fn default() -> Self {
        DependsOn::List(Vec::new())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Dependency {
    pub condition: Option<String>,
}

impl DependsOn {
    /// The start condition on `service`, or `None` when there is no dependency.
    pub fn condition(&self, service: &str) -> Option<&str> {
        match self {
            DependsOn::List(names) => names
                .iter()
                .any(|name| name == service)
                .then_some(DEFAULT_CONDITION),
            DependsOn::Map(map) => map
                .get(service)
                .map(|dep| dep.condition.as_deref().unwrap_or(DEFAULT_CONDITION)),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Healthcheck {
    #[serde(default)]
    pub test: Value,
    pub interval: Option<String>,
    pub timeout: Option<String>,
    pub retries: Option<u32>,
    pub start_period: Option<String>,
    #[serde(default)]
    pub disable: bool,
}

impl Healthcheck {
    pub fn is_active(&self) -> bool {
        if self.disable {
            return false;
        }
        match &self.test {
            Value::String(cmd) => !cmd.trim().is_empty(),
            Value::Sequence(parts) => {
                !parts.is_empty() && parts.first().and_then(Value::as_str) != Some("NONE")
            }
            _ => false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TopologyIssue {
    #[error("service {0} is not defined")]
    MissingService(&'static str),
    #[error("service {0} has no image")]
    MissingImage(&'static str),
    #[error("service {service} does not receive {var}")]
    MissingEnvironment {
        service: &'static str,
        var: &'static str,
    },
    #[error("service {0} does not publish APP_PORT")]
    PortNotPublished(&'static str),
    #[error("service {service} does not depend on {on}")]
    MissingDependency {
        service: &'static str,
        on: &'static str,
    },
    #[error(
        "service {service} starts on {on} with condition {condition}, expected service_healthy"
    )]
    DependencyNotHealthy {
        service: &'static str,
        on: &'static str,
        condition: String,
    },
    #[error("service {0} has no health check")]
    MissingHealthcheck(&'static str),
}

impl ComposeFile {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, TopologyError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| TopologyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, TopologyError> {
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn verify(&self) -> Vec<TopologyIssue> {
        let mut issues = Vec::new();

        match self.services.get(NOTEBOOK_SERVICE) {
            Some(app) => verify_notebook(app, &mut issues),
            None => issues.push(TopologyIssue::MissingService(NOTEBOOK_SERVICE)),
        }

        match self.services.get(DATABASE_SERVICE) {
            Some(db) => {
                if db.image.is_none() {
                    issues.push(TopologyIssue::MissingImage(DATABASE_SERVICE));
                }
                if !db.healthcheck.as_ref().is_some_and(Healthcheck::is_active) {
                    issues.push(TopologyIssue::MissingHealthcheck(DATABASE_SERVICE));
                }
            }
            None => issues.push(TopologyIssue::MissingService(DATABASE_SERVICE)),
        }

        issues
    }
}

fn verify_notebook(app: &Service, issues: &mut Vec<TopologyIssue>) {
    if app.image.is_none() {
        issues.push(TopologyIssue::MissingImage(NOTEBOOK_SERVICE));
    }

    for var in NOTEBOOK_ENV_VARS {
        if !app.environment.contains(var) {
            issues.push(TopologyIssue::MissingEnvironment {
                service: NOTEBOOK_SERVICE,
                var,
            });
        }
    }

    if !app.ports.iter().any(publishes_app_port) {
        issues.push(TopologyIssue::PortNotPublished(NOTEBOOK_SERVICE));
    }

    match app.depends_on.condition(DATABASE_SERVICE) {
        None => issues.push(TopologyIssue::MissingDependency {
            service: NOTEBOOK_SERVICE,
            on: DATABASE_SERVICE,
        }),
        Some(HEALTHY_CONDITION) => {}
        Some(other) => issues.push(TopologyIssue::DependencyNotHealthy {
            service: NOTEBOOK_SERVICE,
            on: DATABASE_SERVICE,
            condition: other.to_string(),
        }),
    }
}

/// Short (`"${APP_PORT:-8501}:8501"`) and long (`published: ${APP_PORT}`)
/// port syntax both count.
fn publishes_app_port(port: &Value) -> bool {
    match port {
        Value::String(spec) => spec.contains(APP_PORT),
        Value::Mapping(map) => map
            .get("published")
            .and_then(Value::as_str)
            .is_some_and(|published| published.contains(APP_PORT)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
services:
  notebook-app:
    image: lfnovo/open_notebook:v1-latest
    ports:
      - "${APP_PORT:-8501}:8502"
    environment:
      LOG_LEVEL: ${LOG_LEVEL:-INFO}
      OPENAI_API_BASE: ${OPENAI_API_BASE}
      OPENAI_API_KEY: ${OPENAI_API_KEY}
      DEFAULT_CHAT_MODEL: ${DEFAULT_CHAT_MODEL}
      DEFAULT_TRANSFORMATION_MODEL: ${DEFAULT_TRANSFORMATION_MODEL}
      DEFAULT_EMBEDDING_MODEL: ${DEFAULT_EMBEDDING_MODEL}
      SURREAL_ADDRESS: ${SURREAL_ADDRESS}
      SURREAL_PORT: ${SURREAL_PORT}
      SURREAL_USER: ${SURREAL_USER}
      SURREAL_PASS: ${SURREAL_PASS}
      SURREAL_NAMESPACE: ${SURREAL_NAMESPACE}
      SURREAL_DATABASE: ${SURREAL_DATABASE}
    depends_on:
      surreal-db:
        condition: service_healthy
  surreal-db:
    image: surrealdb/surrealdb:v2
    healthcheck:
      test: ["CMD", "/surreal", "is-ready"]
      retries: 5
networks:
  open-notebook-network:
volumes:
  surreal-data:
"#;

    #[test]
    fn valid_file_has_no_issues() {
        let compose = ComposeFile::from_yaml(VALID).unwrap();

        assert_eq!(compose.verify(), Vec::new());
        assert!(compose.networks.contains_key("open-notebook-network"));
        assert!(compose.volumes.contains_key("surreal-data"));
    }

    #[test]
    fn list_forms_are_understood() {
        let compose = ComposeFile::from_yaml(
            r#"
services:
  notebook-app:
    image: app
    ports: ["${APP_PORT}:8502"]
    environment:
      - OPENAI_API_BASE=${OPENAI_API_BASE}
      - OPENAI_API_KEY
    depends_on: [surreal-db]
"#,
        )
        .unwrap();

        let app = &compose.services[NOTEBOOK_SERVICE];
        assert!(app.environment.contains("OPENAI_API_BASE"));
        assert!(app.environment.contains("OPENAI_API_KEY"));
        assert!(!app.environment.contains("OPENAI"));
        assert_eq!(app.depends_on.condition(DATABASE_SERVICE), Some("service_started"));
    }

    #[test]
    fn plain_dependency_is_reported_as_not_healthy() {
        let raw = VALID.replace("condition: service_healthy", "condition: service_started");
        let issues = ComposeFile::from_yaml(&raw).unwrap().verify();

        assert!(issues.contains(&TopologyIssue::DependencyNotHealthy {
            service: NOTEBOOK_SERVICE,
            on: DATABASE_SERVICE,
            condition: "service_started".to_string(),
        }));
    }

    #[test]
    fn missing_env_var_is_reported() {
        let raw = VALID.replace("      SURREAL_PASS: ${SURREAL_PASS}\n", "");
        let issues = ComposeFile::from_yaml(&raw).unwrap().verify();

        assert_eq!(
            issues,
            vec![TopologyIssue::MissingEnvironment {
                service: NOTEBOOK_SERVICE,
                var: "SURREAL_PASS",
            }]
        );
    }

    #[test]
    fn hardcoded_port_is_reported() {
        let raw = VALID.replace("${APP_PORT:-8501}:8502", "8501:8502");
        let issues = ComposeFile::from_yaml(&raw).unwrap().verify();

        assert_eq!(issues, vec![TopologyIssue::PortNotPublished(NOTEBOOK_SERVICE)]);
    }

    #[test]
    fn missing_or_disabled_healthcheck_is_reported() {
        let disabled = VALID.replace("      retries: 5\n", "      disable: true\n");
        let issues = ComposeFile::from_yaml(&disabled).unwrap().verify();
        assert_eq!(issues, vec![TopologyIssue::MissingHealthcheck(DATABASE_SERVICE)]);

        let none = VALID.replace(r#"["CMD", "/surreal", "is-ready"]"#, r#"["NONE"]"#);
        let issues = ComposeFile::from_yaml(&none).unwrap().verify();
        assert_eq!(issues, vec![TopologyIssue::MissingHealthcheck(DATABASE_SERVICE)]);
    }

    #[test]
    fn missing_services_are_reported() {
        let issues = ComposeFile::from_yaml("services: {}").unwrap().verify();

        assert_eq!(
            issues,
            vec![
                TopologyIssue::MissingService(NOTEBOOK_SERVICE),
                TopologyIssue::MissingService(DATABASE_SERVICE),
            ]
        );
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let result = ComposeFile::from_yaml("services: [unclosed");
        assert!(matches!(result, Err(TopologyError::Yaml(_))));
    }

    #[test]
    fn long_port_syntax_counts() {
        let port: Value =
            serde_yaml::from_str(r#"{ target: 8502, published: "${APP_PORT}" }"#).unwrap();
        assert!(publishes_app_port(&port));
        assert!(!publishes_app_port(&Value::Number(8502.into())));
    }
}
