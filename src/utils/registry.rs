// src/utils/registry.rs

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;

use super::powershell::{CommandRunner, Invocation};

/// Read access to system policy values.
pub trait PolicyStore: Send + Sync {
    /// Reads a DWORD value.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(u32))` if the value exists.
    /// - `Ok(None)` if the key or value doesn't exist.
    /// - `Err(anyhow::Error)` if the read fails for another reason.
    fn read_dword(&self, path: &str, value_name: &str) -> Result<Option<u32>>;
}

/// The live Windows registry.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRegistry;

impl PolicyStore for SystemRegistry {
    fn read_dword(&self, path: &str, value_name: &str) -> Result<Option<u32>> {
        read_registry_dword(path, value_name)
    }
}

/// Splits a full registry path into its hive name and subkey.
///
/// # Parameters
///
/// - `path`: The full registry path (e.g., "HKEY_LOCAL_MACHINE\\Software\\...").
pub fn split_registry_path(path: &str) -> Result<(&str, &str)> {
    match path.split_once('\\') {
        Some((hive, subkey)) if !hive.is_empty() && !subkey.is_empty() => {
            match hive.to_uppercase().as_str() {
                "HKEY_LOCAL_MACHINE" | "HKEY_CURRENT_USER" | "HKEY_CLASSES_ROOT"
                | "HKEY_USERS" | "HKEY_CURRENT_CONFIG" => Ok((hive, subkey)),
                other => anyhow::bail!("Unsupported registry hive: '{}'", other),
            }
        }
        _ => anyhow::bail!(
            "Invalid registry path: '{}'. Expected format 'HKEY_*\\Subkey\\...'",
            path
        ),
    }
}

#[cfg(windows)]
fn read_registry_dword(path: &str, value_name: &str) -> Result<Option<u32>> {
    use winreg::{
        enums::{
            RegType::REG_DWORD, HKEY_CLASSES_ROOT, HKEY_CURRENT_CONFIG, HKEY_CURRENT_USER,
            HKEY_LOCAL_MACHINE, HKEY_USERS, KEY_READ,
        },
        RegKey,
    };

    let (hive_name, subkey_path) = split_registry_path(path)
        .with_context(|| format!("Failed to parse registry path '{}'", path))?;
    let hive = match hive_name.to_uppercase().as_str() {
        "HKEY_LOCAL_MACHINE" => HKEY_LOCAL_MACHINE,
        "HKEY_CURRENT_USER" => HKEY_CURRENT_USER,
        "HKEY_CLASSES_ROOT" => HKEY_CLASSES_ROOT,
        "HKEY_USERS" => HKEY_USERS,
        _ => HKEY_CURRENT_CONFIG,
    };

    let subkey = match RegKey::predef(hive).open_subkey_with_flags(subkey_path, KEY_READ) {
        Ok(subkey) => subkey,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to open subkey '{}'", subkey_path))
        }
    };

    match subkey.get_raw_value(value_name) {
        Ok(value) => match value.vtype {
            REG_DWORD if value.bytes.len() >= 4 => Ok(Some(u32::from_le_bytes([
                value.bytes[0],
                value.bytes[1],
                value.bytes[2],
                value.bytes[3],
            ]))),
            ref other => anyhow::bail!(
                "Registry value '{}' is {:?}, expected REG_DWORD",
                value_name,
                other
            ),
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(anyhow::anyhow!(
            "Failed to read value '{}': {}",
            value_name,
            e
        )),
    }
}

#[cfg(not(windows))]
fn read_registry_dword(path: &str, _value_name: &str) -> Result<Option<u32>> {
    split_registry_path(path)
        .with_context(|| format!("Failed to parse registry path '{}'", path))?;
    Ok(None)
}

/// Exports `HKEY_CURRENT_USER` to a timestamped `.reg` file in `dir`.
///
/// # Returns
///
/// - `Ok(PathBuf)` with the path of the written file.
/// - `Err(anyhow::Error)` if the directory cannot be created or `reg export` fails.
pub fn export_current_user_hive(runner: &dyn CommandRunner, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create backup directory '{}'", dir.display()))?;

    let file = dir.join(format!("backup_{}.reg", Local::now().format("%Y%m%d_%H%M%S")));
    let invocation = Invocation::new("reg")
        .args(["export", "HKCU"])
        .arg(file.display().to_string())
        .arg("/y");

    let result = runner
        .run(&invocation)
        .context("Failed to run 'reg export'")?;
    if !result.success() {
        anyhow::bail!(
            "'reg export' exited with code {}: {}",
            result.exit_code,
            result.stderr.trim()
        );
    }

    tracing::info!("Registry backup written to '{}'", file.display());
    Ok(file)
}
