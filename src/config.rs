use pg_grab_shared::{DEFAULT_LOG_SCHEMA, DEFAULT_LOG_TABLE};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{GrabError, Result};
use crate::monitoring::LogLayout;

/// What happens to the user's statement when capturing it fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureErrorPolicy {
    /// Report the failure and let the statement finish without a log row.
    #[default]
    Skip,
    /// Fail the statement after the rest of the end chain has run.
    Abort,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrabConfig {
    pub schema: String,
    pub table: String,
    pub layout: LogLayout,
    pub on_error: CaptureErrorPolicy,
}

impl Default for GrabConfig {
    fn default() -> Self {
        Self {
            schema: DEFAULT_LOG_SCHEMA.to_string(),
            table: DEFAULT_LOG_TABLE.to_string(),
            layout: LogLayout::default(),
            on_error: CaptureErrorPolicy::default(),
        }
    }
}

impl GrabConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: GrabConfig = toml::from_str(content)
            .map_err(|e| GrabError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| GrabError::Config(format!("Failed to read config file: {}", e)))?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [("schema", &self.schema), ("table", &self.table)] {
            if value.trim().is_empty() {
                return Err(GrabError::Config(format!("{} name cannot be empty", field)));
            }
            if value.contains('"') {
                return Err(GrabError::Config(format!(
                    "{} name '{}' contains a double quote",
                    field, value
                )));
            }
        }
        Ok(())
    }
}
