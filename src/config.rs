// src/config.rs

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    constants::{
        DEFAULT_CMD, DEFAULT_COMMAND_TIMEOUT, DEFAULT_POWERSHELL, DEFAULT_SCRIPTS_DIR,
        MAX_COMMAND_TIMEOUT,
    },
    language::{DisplaySettings, Language},
};

/// Engine settings. Every field is optional in the JSON file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub powershell: String,
    pub cmd: String,
    /// Ceiling for a single non-elevated command, in seconds.
    pub command_timeout_secs: u64,
    pub scripts_dir: PathBuf,
    /// Where the pre-run `HKCU` export goes. No backup when unset.
    pub backup_dir: Option<PathBuf>,
    pub language: Language,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            powershell: DEFAULT_POWERSHELL.to_string(),
            cmd: DEFAULT_CMD.to_string(),
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT.as_secs(),
            scripts_dir: PathBuf::from(DEFAULT_SCRIPTS_DIR),
            backup_dir: None,
            language: Language::default(),
        }
    }
}

impl EngineConfig {
    /// Reads a JSON config file.
    ///
    /// # Returns
    ///
    /// - `Ok(EngineConfig)` with unspecified fields at their defaults.
    /// - `Err(anyhow::Error)` if the file cannot be read or is not valid JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        let config: Self = serde_json::from_str(contents.trim_start_matches('\u{feff}'))
            .with_context(|| format!("Failed to parse config file '{}'", path.display()))?;
        tracing::debug!("Loaded config from '{}': {:?}", path.display(), config);
        Ok(config)
    }

    /// Loads `path` when given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// The per-command ceiling, kept between one second and a day.
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(
            self.command_timeout_secs
                .clamp(1, MAX_COMMAND_TIMEOUT.as_secs()),
        )
    }

    pub fn display_settings(&self) -> DisplaySettings {
        DisplaySettings::new(self.language)
    }
}
