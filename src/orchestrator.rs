// src/orchestrator.rs

use std::{
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use indexmap::IndexSet;

use crate::{
    config::EngineConfig,
    language::{DisplaySettings, Message},
    scripts::run_external_script,
    tweaks::{all_tweaks, TweakContext, TweakRegistry},
    utils::{
        powershell::{CommandRunner, ProcessRunner},
        registry::{export_current_user_hive, PolicyStore, SystemRegistry},
        windows::{PrivilegeBroker, SystemPrivilegeBroker},
    },
    verification::VerificationReport,
};

/// Where a run currently is. Indices refer to the deduplicated item list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Selecting,
    Applying(usize),
    Verified(usize),
    Done,
}

/// Result of one item of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TweakOutcome {
    pub id: String,
    pub succeeded: bool,
    pub report_lines: Vec<String>,
    /// `None` for pass-through scripts, which are never verified.
    pub verification: Option<VerificationReport>,
}

/// Receives progress from a run. Owned by the caller.
pub trait LogSink {
    /// One line, or several joined by newlines.
    fn line(&mut self, text: &str);

    fn phase(&mut self, _phase: RunPhase) {}

    fn finished(&mut self, _outcome: &TweakOutcome) {}
}

/// Collects everything in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub lines: Vec<String>,
    pub phases: Vec<RunPhase>,
}

impl LogSink for MemorySink {
    fn line(&mut self, text: &str) {
        self.lines.push(text.to_string());
    }

    fn phase(&mut self, phase: RunPhase) {
        self.phases.push(phase);
    }
}

/// Applies selected items one after another and reports each one.
pub struct Orchestrator {
    registry: TweakRegistry,
    runner: Arc<dyn CommandRunner>,
    privileges: Arc<dyn PrivilegeBroker>,
    policy: Arc<dyn PolicyStore>,
    config: EngineConfig,
    cancel: Arc<AtomicBool>,
}

impl Orchestrator {
    pub fn new(
        registry: TweakRegistry,
        runner: Arc<dyn CommandRunner>,
        privileges: Arc<dyn PrivilegeBroker>,
        policy: Arc<dyn PolicyStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            registry,
            runner,
            privileges,
            policy,
            config,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The built-in tweaks against the live system.
    pub fn with_system(config: EngineConfig) -> Self {
        let runner = Arc::new(ProcessRunner::new(config.command_timeout()));
        let privileges = Arc::new(SystemPrivilegeBroker::new(config.powershell.clone()));
        Self::new(
            all_tweaks(),
            runner,
            privileges,
            Arc::new(SystemRegistry),
            config,
        )
    }

    pub fn privileges(&self) -> &dyn PrivilegeBroker {
        self.privileges.as_ref()
    }

    /// Setting the flag skips every item that has not started yet.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// `(id, label)` for every registered tweak, in registration order.
    pub fn list_tweaks(&self, settings: &DisplaySettings) -> Vec<(String, String)> {
        self.registry
            .iter()
            .map(|tweak| (tweak.id.to_string(), tweak.label(settings).to_string()))
            .collect()
    }

    /// Runs `items` in order. Registered ids go through apply and verify,
    /// anything else is run as an external script. Duplicates run once.
    pub fn run_selected(
        &self,
        items: &[String],
        elevated_already: bool,
        sink: &mut dyn LogSink,
    ) -> Vec<TweakOutcome> {
        let settings = self.config.display_settings();
        let language = settings.language;
        sink.phase(RunPhase::Idle);

        sink.phase(RunPhase::Selecting);
        let selected: IndexSet<&str> = items
            .iter()
            .map(|item| item.trim())
            .filter(|item| !item.is_empty())
            .collect();
        tracing::info!(
            "Running {} item(s), elevated: {}",
            selected.len(),
            elevated_already
        );

        if !selected.is_empty() {
            self.backup(sink);
        }

        let ctx = TweakContext {
            runner: self.runner.clone(),
            privileges: self.privileges.clone(),
            policy: self.policy.clone(),
            settings,
            elevated: elevated_already,
            requires_admin: true,
            powershell: self.config.powershell.clone(),
        };

        let mut outcomes = Vec::with_capacity(selected.len());
        let mut cancelled = false;
        for (index, item) in selected.iter().enumerate() {
            if self.cancel.load(Ordering::SeqCst) {
                tracing::info!("Run cancelled before item {}.", index);
                sink.line(Message::RunCancelled.text(language));
                cancelled = true;
                break;
            }

            sink.phase(RunPhase::Applying(index));
            let outcome = match self.registry.get(item) {
                Some(tweak) => {
                    sink.line(tweak.progress_line(&settings));
                    tweak.run(&ctx)
                }
                None => {
                    sink.line(
                        &Message::RunningScript
                            .text(language)
                            .replace("{name}", &script_name(item)),
                    );
                    self.pass_through(item)
                }
            };

            if !outcome.report_lines.is_empty() {
                sink.line(&outcome.report_lines.join("\n"));
            }
            sink.phase(RunPhase::Verified(index));
            sink.finished(&outcome);
            outcomes.push(outcome);
        }

        if !cancelled && !outcomes.is_empty() && outcomes.iter().all(|o| o.succeeded) {
            sink.line(Message::AllApplied.text(language));
        }
        sink.phase(RunPhase::Done);
        outcomes
    }

    fn backup(&self, sink: &mut dyn LogSink) {
        let Some(dir) = &self.config.backup_dir else {
            return;
        };
        let language = self.config.language;
        sink.line(Message::BackupStarted.text(language));
        match export_current_user_hive(self.runner.as_ref(), dir) {
            Ok(path) => sink.line(
                &Message::BackupSaved
                    .text(language)
                    .replace("{path}", &path.display().to_string()),
            ),
            Err(e) => {
                tracing::error!("Registry backup failed: {:?}", e);
                sink.line(
                    &Message::BackupFailed
                        .text(language)
                        .replace("{reason}", &format!("{:#}", e)),
                );
            }
        }
    }

    fn pass_through(&self, item: &str) -> TweakOutcome {
        let (succeeded, report_lines) =
            match run_external_script(self.runner.as_ref(), &self.config, Path::new(item)) {
                Ok(result) => {
                    let mut lines = Vec::new();
                    if !result.stdout.trim().is_empty() {
                        lines.push(result.stdout.trim_end().to_string());
                    }
                    if !result.stderr.trim().is_empty() {
                        lines.push(format!("⚠ {}", result.stderr.trim()));
                    }
                    (result.success(), lines)
                }
                Err(e) => {
                    tracing::error!("External script '{}' failed: {}", item, e);
                    (false, vec![format!("⚠ {}", e)])
                }
            };

        TweakOutcome {
            id: item.to_string(),
            succeeded,
            report_lines,
            verification: None,
        }
    }
}

fn script_name(item: &str) -> String {
    Path::new(item)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| item.to_string())
}
