use crate::adapters::http::HttpRemoteSettings;
use crate::core::dispatcher::{DispatchSettings, FailurePolicy, DEFAULT_MAX_CONCURRENCY};
use crate::core::orchestrator::TransferSettings;
use crate::core::slot_manager::DEFAULT_SLOT_CAPACITY;
use crate::utils::error::{Result, TransferError};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_LANGUAGE: &str = "en";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub slots: SlotConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub base_url: Option<String>,
    pub session_token: Option<String>,
    pub language: Option<String>,
    pub request_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchConfig {
    pub max_concurrency: Option<usize>,
    pub unit_timeout_seconds: Option<u64>,
    pub failure_policy: Option<FailurePolicy>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlotConfig {
    pub capacity: Option<usize>,
}

impl TomlConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(TransferError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| TransferError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the environment value; unknown variables are
    /// left as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| TransferError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        if let Some(url) = &self.remote.base_url {
            validation::validate_url("remote.base_url", url)?;
        }
        if let Some(language) = &self.remote.language {
            validation::validate_non_empty_string("remote.language", language)?;
        }
        if let Some(concurrency) = self.dispatch.max_concurrency {
            validation::validate_positive_number("dispatch.max_concurrency", concurrency, 1)?;
        }
        if let Some(capacity) = self.slots.capacity {
            validation::validate_positive_number("slots.capacity", capacity, 2)?;
        }
        Ok(())
    }

    pub fn transfer_settings(&self) -> TransferSettings {
        TransferSettings {
            slot_capacity: self.slots.capacity.unwrap_or(DEFAULT_SLOT_CAPACITY),
            dispatch: DispatchSettings {
                max_concurrency: self
                    .dispatch
                    .max_concurrency
                    .unwrap_or(DEFAULT_MAX_CONCURRENCY),
                unit_timeout: self.dispatch.unit_timeout_seconds.map(Duration::from_secs),
                failure_policy: self.dispatch.failure_policy.unwrap_or_default(),
            },
        }
    }

    pub fn remote_settings(&self) -> Result<HttpRemoteSettings> {
        let base_url = validation::validate_required_field("remote.base_url", &self.remote.base_url)?;
        let session_token =
            validation::validate_required_field("remote.session_token", &self.remote.session_token)?;
        validation::validate_non_empty_string("remote.session_token", session_token)?;

        Ok(HttpRemoteSettings {
            base_url: base_url.clone(),
            session_token: session_token.clone(),
            language: self
                .remote
                .language
                .clone()
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            request_timeout: self.remote.request_timeout_seconds.map(Duration::from_secs),
        })
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
