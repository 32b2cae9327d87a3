// src/cli.rs

use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};

use tweak_engine::{
    config::EngineConfig,
    language::{Language, Message},
    orchestrator::{Orchestrator, TweakOutcome},
    scripts::discover_scripts,
    utils::windows::PrivilegeBroker,
    worker::{spawn_run, RunEvent},
};

#[derive(Debug, Parser)]
#[command(
    name = "tweak_engine",
    version,
    about = "Applies Windows tweaks and verifies that they took effect"
)]
pub struct Cli {
    /// JSON config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Display language (en, pl, ru, de, es or the native name)
    #[arg(long, global = true)]
    pub language: Option<Language>,

    /// Log at DEBUG level
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List built-in tweaks and the scripts found in the scripts directory
    List {
        #[arg(long)]
        scripts_dir: Option<PathBuf>,
    },
    /// Apply tweak ids and/or run script paths, in the given order
    Run {
        /// Ids such as builtin:dns_cloudflare, or paths to .ps1/.cmd files
        items: Vec<String>,

        /// Append every script found in the scripts directory
        #[arg(long)]
        all_scripts: bool,

        #[arg(long)]
        scripts_dir: Option<PathBuf>,

        /// Export HKCU into this directory before the first item
        #[arg(long)]
        backup_dir: Option<PathBuf>,

        /// Treat the process as elevated without checking its token
        #[arg(long)]
        assume_elevated: bool,

        /// Ceiling for a single command, in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Report whether the process holds administrative rights
    CheckAdmin,
}

/// Prints `[HH:MM:SS] text`, one prefix per call.
fn log_line(text: &str) {
    println!("[{}] {}", Local::now().format("%H:%M:%S"), text);
}

fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = EngineConfig::load_or_default(cli.config.as_deref())?;
    if let Some(language) = cli.language {
        config.language = language;
    }
    Ok(config)
}

pub fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = load_config(&cli)?;

    match cli.command {
        Command::List { scripts_dir } => {
            if let Some(dir) = scripts_dir {
                config.scripts_dir = dir;
            }
            list(config)
        }
        Command::Run {
            items,
            all_scripts,
            scripts_dir,
            backup_dir,
            assume_elevated,
            timeout,
        } => {
            if let Some(dir) = scripts_dir {
                config.scripts_dir = dir;
            }
            if backup_dir.is_some() {
                config.backup_dir = backup_dir;
            }
            if let Some(secs) = timeout {
                config.command_timeout_secs = secs;
            }
            run_items(config, items, all_scripts, assume_elevated)
        }
        Command::CheckAdmin => {
            let orchestrator = Orchestrator::with_system(config);
            let elevated = orchestrator.privileges().is_privileged();
            println!("{}", if elevated { "elevated" } else { "not elevated" });
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn list(config: EngineConfig) -> Result<ExitCode> {
    let settings = config.display_settings();
    let scripts = discover_scripts(&config.scripts_dir)?;
    let orchestrator = Orchestrator::with_system(config);

    for (id, label) in orchestrator.list_tweaks(&settings) {
        println!("{}\t{}", id, label);
    }
    if scripts.is_empty() {
        println!("{}", Message::NoScripts.text(settings.language));
    }
    for script in scripts {
        println!("{}", script.display());
    }
    Ok(ExitCode::SUCCESS)
}

fn run_items(
    config: EngineConfig,
    mut items: Vec<String>,
    all_scripts: bool,
    assume_elevated: bool,
) -> Result<ExitCode> {
    if all_scripts {
        let scripts = discover_scripts(&config.scripts_dir).with_context(|| {
            format!("Failed to list scripts in '{}'", config.scripts_dir.display())
        })?;
        if scripts.is_empty() {
            log_line(Message::NoScripts.text(config.language));
        }
        items.extend(scripts.iter().map(|path| path.display().to_string()));
    }

    let orchestrator = Arc::new(Orchestrator::with_system(config));
    let elevated = assume_elevated || orchestrator.privileges().is_privileged();
    tracing::info!("Starting run, elevated: {}", elevated);

    let handle = spawn_run(orchestrator, items, elevated);
    let mut outcomes: Vec<TweakOutcome> = Vec::new();
    for event in handle.events.iter() {
        match event {
            RunEvent::Line(text) => log_line(&text),
            RunEvent::Phase(phase) => tracing::debug!("Phase: {:?}", phase),
            RunEvent::Finished(outcome) => tracing::debug!(
                "{} -> {}",
                outcome.id,
                if outcome.succeeded { "ok" } else { "failed" }
            ),
            RunEvent::Completed(done) => outcomes = done,
        }
    }
    handle.join();

    for outcome in &outcomes {
        println!(
            "{}\t{}",
            if outcome.succeeded { "OK" } else { "FAIL" },
            outcome.id
        );
    }

    Ok(if outcomes.iter().all(|o| o.succeeded) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_arguments_parse() {
        let cli = Cli::try_parse_from([
            "tweak_engine",
            "--language",
            "pl",
            "run",
            "builtin:dns_cloudflare",
            "scripts\\mine.ps1",
            "--timeout",
            "30",
        ])
        .unwrap();
        assert_eq!(cli.language, Some(Language::Polish));
        match cli.command {
            Command::Run { items, timeout, .. } => {
                assert_eq!(items.len(), 2);
                assert_eq!(timeout, Some(30));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
