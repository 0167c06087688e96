use crate::error::{LedgerError, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_EXPORT_PATH: &str = "cleaned_generated_test_cases.xlsx";
pub const DEFAULT_GROQ_MODEL: &str = "openai/gpt-oss-120b";

/// Runtime settings for a ledger session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Workbook overwritten after every mutation.
    pub export_path: PathBuf,
    /// Optional CSV projection written next to the workbook.
    pub csv_path: Option<PathBuf>,
    /// Upper bound for a single generation-service call.
    pub generation_timeout_secs: u64,
    pub groq_api_key: Option<String>,
    pub groq_default_model: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            export_path: PathBuf::from(DEFAULT_EXPORT_PATH),
            csv_path: None,
            generation_timeout_secs: 60,
            groq_api_key: None,
            groq_default_model: DEFAULT_GROQ_MODEL.to_string(),
        }
    }
}

impl LedgerConfig {
    /// Reads a JSON config file; missing keys take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            LedgerError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: LedgerConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        debug!("Loaded ledger config from {}", path.display());
        Ok(config)
    }

    /// Defaults overridden by `GROQ_API_KEY`, `GROQ_DEFAULT_MODEL`,
    /// `LEDGER_EXPORT_PATH`, `LEDGER_CSV_PATH` and `LEDGER_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(key) = lookup("GROQ_API_KEY") {
            self.groq_api_key = Some(key);
        }
        if let Some(model) = lookup("GROQ_DEFAULT_MODEL") {
            self.groq_default_model = model;
        }
        if let Some(path) = lookup("LEDGER_EXPORT_PATH") {
            self.export_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("LEDGER_CSV_PATH") {
            self.csv_path = Some(PathBuf::from(path));
        }
        if let Some(secs) = lookup("LEDGER_TIMEOUT_SECS") {
            self.generation_timeout_secs = secs.trim().parse().map_err(|_| {
                LedgerError::Config(format!("LEDGER_TIMEOUT_SECS must be an integer, got '{}'", secs))
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.generation_timeout_secs == 0 {
            return Err(LedgerError::Config(
                "generation_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.export_path.as_os_str().is_empty() {
            return Err(LedgerError::Config("export_path must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }
}
