// src/tweaks/method.rs

use std::sync::Arc;

use super::TweakId;
use crate::{
    errors::TweakError,
    language::{DisplaySettings, Language},
    utils::{
        powershell::{run_script, CommandResult, CommandRunner},
        registry::PolicyStore,
        windows::{ElevationOutcome, PrivilegeBroker},
    },
    verification::VerificationReport,
};

/// Everything a tweak needs to touch the system. Built once per run.
#[derive(Clone)]
pub struct TweakContext {
    pub runner: Arc<dyn CommandRunner>,
    pub privileges: Arc<dyn PrivilegeBroker>,
    pub policy: Arc<dyn PolicyStore>,
    pub settings: DisplaySettings,
    /// Caller's claim that the process already holds administrative rights.
    pub elevated: bool,
    /// Whether the tweak being run needs administrative rights. Set from the
    /// descriptor by [`super::Tweak::run`].
    pub requires_admin: bool,
    /// Interpreter used for generated scripts, e.g. `powershell.exe`.
    pub powershell: String,
}

impl TweakContext {
    pub fn language(&self) -> Language {
        self.settings.language
    }

    /// Mutations skip the elevation prompt when rights are already held or
    /// not needed at all.
    pub fn runs_directly(&self) -> bool {
        self.elevated || !self.requires_admin
    }

    /// Runs a read-only query script without elevation.
    pub fn query(&self, script: &str) -> Result<CommandResult, TweakError> {
        Ok(run_script(self.runner.as_ref(), &self.powershell, script)?)
    }
}

/// Trait defining the behavior for all tweak methods.
pub trait TweakMethod: Send + Sync {
    /// Changes the system. Lines pushed to `log` end up in the tweak's report.
    ///
    /// # Returns
    ///
    /// - `Ok(())` if the mutation ran and exited cleanly.
    /// - `Err(TweakError)` if it could not run, was refused elevation or failed.
    fn apply(&self, id: TweakId, ctx: &TweakContext, log: &mut Vec<String>)
        -> Result<(), TweakError>;

    /// Re-reads system state without elevation. Never fails; an unreadable state
    /// is an unconfirmed report.
    fn verify(&self, id: TweakId, ctx: &TweakContext) -> VerificationReport;
}

/// Runs a mutation script directly when the process is already elevated or the
/// tweak needs no rights, and through an elevation prompt otherwise.
///
/// In the direct branch a non-empty stderr is only a warning; the exit code
/// alone decides failure.
pub fn execute_mutation(
    id: TweakId,
    ctx: &TweakContext,
    script: &str,
    log: &mut Vec<String>,
) -> Result<(), TweakError> {
    if ctx.runs_directly() {
        tracing::debug!("{:?} -> Running mutation script directly.", id);
        let result = run_script(ctx.runner.as_ref(), &ctx.powershell, script)?;
        let stderr = result.stderr.trim();
        if !result.success() {
            return Err(TweakError::NonZeroExit {
                code: result.exit_code,
                stderr: stderr.to_string(),
            });
        }
        if !stderr.is_empty() {
            tracing::warn!("{:?} -> Mutation script wrote to stderr: {}", id, stderr);
            log.push(format!("⚠ {}", stderr));
        }
        return Ok(());
    }

    tracing::debug!("{:?} -> Requesting elevation for mutation script.", id);
    match ctx.privileges.run_elevated(script) {
        ElevationOutcome::Granted { exit_code: 0 } => Ok(()),
        ElevationOutcome::Granted { exit_code } => Err(TweakError::NonZeroExit {
            code: exit_code,
            stderr: String::new(),
        }),
        ElevationOutcome::DeniedByUser => Err(TweakError::ElevationDenied),
        ElevationOutcome::Failed(reason) => Err(TweakError::ElevationFailed(reason)),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Fakes shared by the tweak, orchestrator and worker tests.

    use std::sync::Mutex;

    use super::*;
    use crate::{errors::CommandError, utils::powershell::Invocation};

    pub type Responder = dyn Fn(&Invocation, &str) -> CommandResult + Send + Sync;

    /// Answers every invocation through a closure that also sees the staged
    /// script body (empty for plain commands).
    pub struct FakeRunner {
        pub seen: Mutex<Vec<(Invocation, String)>>,
        respond: Box<Responder>,
    }

    impl FakeRunner {
        pub fn new<F>(respond: F) -> Self
        where
            F: Fn(&Invocation, &str) -> CommandResult + Send + Sync + 'static,
        {
            Self {
                seen: Mutex::new(Vec::new()),
                respond: Box::new(respond),
            }
        }

        pub fn scripts(&self) -> Vec<String> {
            self.seen
                .lock()
                .unwrap()
                .iter()
                .map(|(_, body)| body.clone())
                .collect()
        }
    }

    impl CommandRunner for FakeRunner {
        fn run(&self, invocation: &Invocation) -> Result<CommandResult, CommandError> {
            let body = match invocation.args.iter().position(|arg| arg == "-File") {
                Some(i) => invocation
                    .args
                    .get(i + 1)
                    .and_then(|path| std::fs::read_to_string(path).ok())
                    .unwrap_or_default(),
                None => String::new(),
            };
            let result = (self.respond)(invocation, &body);
            self.seen.lock().unwrap().push((invocation.clone(), body));
            Ok(result)
        }
    }

    pub fn output(exit_code: i32, stdout: &str, stderr: &str) -> CommandResult {
        CommandResult {
            exit_code,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }
    }

    pub type ElevatedEffect = dyn Fn(&str) + Send + Sync;

    /// Returns a fixed elevation outcome and records the scripts it was given.
    /// An optional effect stands in for what the elevated script does.
    pub struct FakeBroker {
        pub outcome: ElevationOutcome,
        pub scripts: Mutex<Vec<String>>,
        effect: Option<Box<ElevatedEffect>>,
    }

    impl FakeBroker {
        pub fn new(outcome: ElevationOutcome) -> Self {
            Self {
                outcome,
                scripts: Mutex::new(Vec::new()),
                effect: None,
            }
        }

        pub fn with_effect<F>(outcome: ElevationOutcome, effect: F) -> Self
        where
            F: Fn(&str) + Send + Sync + 'static,
        {
            Self {
                effect: Some(Box::new(effect)),
                ..Self::new(outcome)
            }
        }
    }

    impl PrivilegeBroker for FakeBroker {
        fn is_privileged(&self) -> bool {
            false
        }

        fn run_elevated(&self, script_body: &str) -> ElevationOutcome {
            self.scripts.lock().unwrap().push(script_body.to_string());
            if let Some(effect) = &self.effect {
                effect(script_body);
            }
            self.outcome.clone()
        }
    }

    pub struct NoPolicy;

    impl PolicyStore for NoPolicy {
        fn read_dword(&self, _path: &str, _value_name: &str) -> anyhow::Result<Option<u32>> {
            Ok(None)
        }
    }

    pub fn context(
        runner: Arc<dyn CommandRunner>,
        broker: Arc<dyn PrivilegeBroker>,
        elevated: bool,
    ) -> TweakContext {
        TweakContext {
            runner,
            privileges: broker,
            policy: Arc::new(NoPolicy),
            settings: DisplaySettings::default(),
            elevated,
            requires_admin: true,
            powershell: "powershell.exe".to_string(),
        }
    }
}
