use crate::config::toml_config::TomlConfig;
use crate::core::dispatcher::FailurePolicy;
use crate::domain::model::TransferRequest;
use crate::utils::error::Result;
use crate::utils::validation::Validate;
use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "slot-transfer")]
#[command(about = "Transfer a quantity to a community member in concurrent slot-sized batches")]
pub struct CliConfig {
    /// Shareable link of the beneficiary
    #[arg(long)]
    pub reference: String,

    /// Quantity moved by one unit transfer (slot size)
    #[arg(long)]
    pub count_per_batch: u32,

    /// Total quantity to transfer
    #[arg(long)]
    pub total_count: u32,

    /// Optional TOML configuration file; flags override its values
    #[arg(short, long)]
    pub config: Option<String>,

    #[arg(long)]
    pub base_url: Option<String>,

    #[arg(long, env = "SLOT_TRANSFER_SESSION", hide_env_values = true)]
    pub session_token: Option<String>,

    #[arg(long)]
    pub language: Option<String>,

    /// Upper bound on unit transfers in flight at once
    #[arg(long)]
    pub max_concurrency: Option<usize>,

    #[arg(long)]
    pub unit_timeout_secs: Option<u64>,

    /// Fail the run when units still fail after the retry pass
    #[arg(long)]
    pub strict: bool,

    /// Simulate the run against an in-memory community
    #[arg(long)]
    pub dry_run: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,
}

impl CliConfig {
    pub fn request(&self) -> TransferRequest {
        TransferRequest::new(
            self.reference.clone(),
            self.count_per_batch,
            self.total_count,
        )
    }

    /// Loads the configuration file, if any, and lays the flags over it.
    pub fn merged(&self) -> Result<TomlConfig> {
        let mut config = match &self.config {
            Some(path) => TomlConfig::from_file(path)?,
            None => TomlConfig::default(),
        };

        if let Some(url) = &self.base_url {
            config.remote.base_url = Some(url.clone());
        }
        if let Some(token) = &self.session_token {
            config.remote.session_token = Some(token.clone());
        }
        if let Some(language) = &self.language {
            config.remote.language = Some(language.clone());
        }
        if let Some(concurrency) = self.max_concurrency {
            config.dispatch.max_concurrency = Some(concurrency);
        }
        if let Some(timeout) = self.unit_timeout_secs {
            config.dispatch.unit_timeout_seconds = Some(timeout);
        }
        if self.strict {
            config.dispatch.failure_policy = Some(FailurePolicy::Strict);
        }

        config.validate()?;
        Ok(config)
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        self.request().validate()?;
        crate::utils::validation::validate_non_empty_string("reference", &self.reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_file() {
        let cli = CliConfig::parse_from([
            "slot-transfer",
            "--reference",
            "http://example.com/p/abc",
            "--count-per-batch",
            "20",
            "--total-count",
            "100",
            "--base-url",
            "https://service.example.com",
            "--session-token",
            "sid",
            "--max-concurrency",
            "3",
            "--strict",
        ]);

        assert!(cli.validate().is_ok());
        let config = cli.merged().unwrap();
        let settings = config.transfer_settings();
        assert_eq!(settings.dispatch.max_concurrency, 3);
        assert_eq!(settings.dispatch.failure_policy, FailurePolicy::Strict);
        assert_eq!(config.remote_settings().unwrap().session_token, "sid");
    }

    #[test]
    fn test_invalid_quantity_flags() {
        let cli = CliConfig::parse_from([
            "slot-transfer",
            "--reference",
            "x",
            "--count-per-batch",
            "10",
            "--total-count",
            "5",
        ]);
        assert!(cli.validate().is_err());
    }
}
