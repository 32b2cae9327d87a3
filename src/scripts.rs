// src/scripts.rs

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};

use crate::{
    config::EngineConfig,
    errors::CommandError,
    utils::powershell::{script_arguments, CommandResult, CommandRunner, Invocation},
};

/// Kinds of user-supplied script the engine knows how to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    PowerShell,
    Batch,
}

impl ScriptKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "ps1" => Some(ScriptKind::PowerShell),
            "cmd" => Some(ScriptKind::Batch),
            _ => None,
        }
    }
}

/// Lists `*.ps1` and `*.cmd` files in `dir`, sorted by path. Creates the
/// directory when it does not exist yet.
pub fn discover_scripts(dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create scripts directory '{}'", dir.display()))?;

    let mut scripts = Vec::new();
    for entry in fs::read_dir(dir)
        .with_context(|| format!("Failed to read scripts directory '{}'", dir.display()))?
    {
        let path = entry?.path();
        if path.is_file() && ScriptKind::from_path(&path).is_some() {
            scripts.push(path);
        }
    }
    scripts.sort();
    tracing::debug!("Found {} script(s) in '{}'", scripts.len(), dir.display());
    Ok(scripts)
}

/// Command line that runs a user script without elevation.
pub fn invocation_for(config: &EngineConfig, path: &Path) -> Invocation {
    match ScriptKind::from_path(path) {
        Some(ScriptKind::Batch) => Invocation::new(&config.cmd)
            .arg("/C")
            .arg(path.display().to_string()),
        // Anything that is not a batch file is handed to PowerShell.
        _ => Invocation::new(&config.powershell).args(script_arguments(path)),
    }
}

/// Runs a user-supplied script as-is: no elevation, no verification.
pub fn run_external_script(
    runner: &dyn CommandRunner,
    config: &EngineConfig,
    path: &Path,
) -> Result<CommandResult, CommandError> {
    let invocation = invocation_for(config, path).capture(true);
    tracing::info!("Running external script '{}'", path.display());
    runner.run(&invocation)
}
