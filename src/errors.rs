// src/errors.rs

use std::{io, time::Duration};

use thiserror::Error;

use crate::language::{Language, Message};

/// Failures of the command runner itself, as opposed to a command that ran and failed.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Failed to start '{program}': {source}")]
    SpawnFailure {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("'{program}' did not finish within {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    #[error("Failed to wait for '{program}': {source}")]
    Wait {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write temporary script: {0}")]
    TempScript(#[source] io::Error),
}

#[derive(Error, Debug)]
pub enum TweakError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("Command exited with code {code}")]
    NonZeroExit { code: i32, stderr: String },

    #[error("Administrator permission denied by the user")]
    ElevationDenied,

    #[error("Elevation failed: {0}")]
    ElevationFailed(String),

    #[error("Could not determine the identifier of the duplicated power scheme")]
    SchemeGuidUnresolved,
}

impl TweakError {
    /// Renders the error as report lines in the active display language.
    pub fn report_lines(&self, language: Language) -> Vec<String> {
        match self {
            TweakError::Command(e) => vec![format!("⚠ {}", e)],
            TweakError::NonZeroExit { code, stderr } => {
                let mut lines = vec![Message::CommandFailed
                    .text(language)
                    .replace("{code}", &code.to_string())];
                if !stderr.trim().is_empty() {
                    lines.push(format!("⚠ {}", stderr.trim()));
                }
                lines
            }
            TweakError::ElevationDenied => vec![Message::ElevationDenied.text(language).to_string()],
            TweakError::ElevationFailed(reason) => vec![
                format!("⚠ {}", reason),
                Message::ElevationFailed.text(language).to_string(),
            ],
            TweakError::SchemeGuidUnresolved => {
                vec![Message::SchemeGuidUnresolved.text(language).to_string()]
            }
        }
    }
}

/// Verification output could not be interpreted.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unexpected JSON shape: expected {0}")]
    UnexpectedShape(&'static str),
}
