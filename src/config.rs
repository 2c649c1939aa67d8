//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_STORE_PATH: &str = "./data/wizard.json";
pub const DEFAULT_NAMESPACE: &str = "virumap-app-wizard";

/// Wizard host configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct WizardConfig {
    /// File backing the answer store.
    pub store_path: PathBuf,
    /// Prefix for every store key.
    pub namespace: String,
    /// Answers older than this are discarded on load.
    pub store_ttl: Option<Duration>,
    /// Directory for daily rolling log files (stderr when unset).
    pub log_dir: Option<PathBuf>,
    /// Route to open instead of the registry's entry step.
    pub start_route: Option<String>,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            namespace: DEFAULT_NAMESPACE.to_string(),
            store_ttl: None,
            log_dir: None,
            start_route: None,
        }
    }
}

impl WizardConfig {
    /// Load from `COUGH_SURVEY_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let store_ttl = match get("COUGH_SURVEY_STORE_TTL_SECS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "COUGH_SURVEY_STORE_TTL_SECS".to_string(),
                        message: format!("expected a positive number of seconds, got `{raw}`"),
                    });
                }
            },
            None => None,
        };

        let start_route = get("COUGH_SURVEY_START_ROUTE");
        if let Some(route) = &start_route
            && !route.starts_with('/')
        {
            return Err(ConfigError::InvalidValue {
                key: "COUGH_SURVEY_START_ROUTE".to_string(),
                message: format!("route must start with `/`, got `{route}`"),
            });
        }

        Ok(Self {
            store_path: get("COUGH_SURVEY_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.store_path),
            namespace: get("COUGH_SURVEY_NAMESPACE").unwrap_or(defaults.namespace),
            store_ttl,
            log_dir: get("COUGH_SURVEY_LOG_DIR").map(PathBuf::from),
            start_route,
        })
    }
}
