// src/tweaks/mod.rs

pub mod dns;
pub mod method;
pub mod power_plan;

use std::sync::Arc;

use indexmap::IndexMap;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

pub use self::method::{execute_mutation, TweakContext, TweakMethod};
use self::{dns::CloudflareDns, power_plan::UltimatePerformancePlan};
use crate::{
    language::{DisplaySettings, Message},
    orchestrator::TweakOutcome,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumIter, EnumString)]
pub enum TweakId {
    #[strum(serialize = "builtin:dns_cloudflare")]
    DnsCloudflare,
    #[strum(serialize = "builtin:power_ultimate")]
    PowerUltimate,
}

/// Represents a single tweak that can be applied to the system.
#[derive(Clone)]
pub struct Tweak {
    /// Unique identifier for the tweak.
    pub id: TweakId,
    /// Whether the mutation needs administrative rights.
    pub requires_admin: bool,
    label: Message,
    progress: Message,
    pub method: Arc<dyn TweakMethod>,
}

impl std::fmt::Debug for Tweak {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tweak")
            .field("id", &self.id)
            .field("requires_admin", &self.requires_admin)
            .finish()
    }
}

impl Tweak {
    pub fn new(
        id: TweakId,
        label: Message,
        progress: Message,
        requires_admin: bool,
        method: Arc<dyn TweakMethod>,
    ) -> Self {
        Self {
            id,
            requires_admin,
            label,
            progress,
            method,
        }
    }

    pub fn label(&self, settings: &DisplaySettings) -> &'static str {
        self.label.text(settings.language)
    }

    /// The line announced before the tweak starts.
    pub fn progress_line(&self, settings: &DisplaySettings) -> &'static str {
        self.progress.text(settings.language)
    }

    /// Applies the tweak, then verifies it whether or not the apply succeeded.
    /// Success requires both.
    pub fn run(&self, ctx: &TweakContext) -> TweakOutcome {
        let ctx = &TweakContext {
            requires_admin: self.requires_admin,
            ..ctx.clone()
        };
        let language = ctx.language();
        let mut report_lines = Vec::new();

        if !ctx.runs_directly() {
            tracing::info!("{:?} -> Applying tweak through an elevation prompt.", self.id);
        } else {
            tracing::info!("{:?} -> Applying tweak.", self.id);
        }
        let applied = match self.method.apply(self.id, ctx, &mut report_lines) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(error = ?e, "{:?} -> Failed to apply tweak.", self.id);
                report_lines.extend(e.report_lines(language));
                false
            }
        };

        tracing::info!("{:?} -> Verifying tweak.", self.id);
        let verification = self.method.verify(self.id, ctx);
        report_lines.extend(verification.detail.iter().cloned());

        let succeeded = applied && verification.succeeded;
        if !succeeded {
            report_lines.push(Message::TweakWarnings.text(language).to_string());
        }
        tracing::info!(
            "{:?} -> Applied: {}, verified: {}.",
            self.id,
            applied,
            verification.succeeded
        );

        TweakOutcome {
            id: self.id.to_string(),
            succeeded,
            report_lines,
            verification: Some(verification),
        }
    }
}

/// Registered tweaks keyed by id, in registration order.
#[derive(Debug, Clone, Default)]
pub struct TweakRegistry {
    tweaks: IndexMap<TweakId, Tweak>,
}

impl TweakRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tweak: Tweak) {
        if self.tweaks.insert(tweak.id, tweak).is_some() {
            tracing::warn!("Tweak registered twice, keeping the latest descriptor.");
        }
    }

    /// Looks up a tweak by its string key, e.g. `builtin:dns_cloudflare`.
    pub fn get(&self, key: &str) -> Option<&Tweak> {
        let id = key.trim().parse::<TweakId>().ok()?;
        self.tweaks.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tweak> {
        self.tweaks.values()
    }

    pub fn len(&self) -> usize {
        self.tweaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tweaks.is_empty()
    }
}

/// Initializes all built-in tweaks.
pub fn all_tweaks() -> TweakRegistry {
    let mut registry = TweakRegistry::new();
    registry.register(Tweak::new(
        TweakId::DnsCloudflare,
        Message::DnsLabel,
        Message::DnsApplying,
        true,
        Arc::new(CloudflareDns),
    ));
    registry.register(Tweak::new(
        TweakId::PowerUltimate,
        Message::PowerLabel,
        Message::PowerApplying,
        true,
        Arc::new(UltimatePerformancePlan),
    ));
    registry
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;
    use crate::{
        errors::TweakError,
        language::Language,
        tweaks::method::testing::{context, FakeBroker, FakeRunner},
        utils::windows::ElevationOutcome,
        verification::VerificationReport,
    };

    #[test]
    fn test_ids_are_stable_strings() {
        assert_eq!(TweakId::DnsCloudflare.to_string(), "builtin:dns_cloudflare");
        assert_eq!(
            "builtin:power_ultimate".parse::<TweakId>().unwrap(),
            TweakId::PowerUltimate
        );
        assert!("scripts\\mine.ps1".parse::<TweakId>().is_err());
    }

    #[test]
    fn test_every_id_is_registered_in_order() {
        let registry = all_tweaks();
        let ids: Vec<TweakId> = registry.iter().map(|t| t.id).collect();
        assert_eq!(ids, TweakId::iter().collect::<Vec<_>>());
        assert!(registry.get("builtin:dns_cloudflare").is_some());
        assert!(registry.get("builtin:unknown").is_none());
    }

    #[test]
    fn test_labels_follow_language() {
        let registry = all_tweaks();
        let tweak = registry.get("builtin:power_ultimate").unwrap();
        assert_eq!(
            tweak.label(&DisplaySettings::new(Language::German)),
            "Energieplan: Ultimative Leistung (erstellen + aktivieren)"
        );
    }

    struct Scripted {
        apply_ok: bool,
        verify_ok: bool,
    }

    impl TweakMethod for Scripted {
        fn apply(
            &self,
            _id: TweakId,
            _ctx: &TweakContext,
            log: &mut Vec<String>,
        ) -> Result<(), TweakError> {
            log.push("applied".into());
            if self.apply_ok {
                Ok(())
            } else {
                Err(TweakError::ElevationDenied)
            }
        }

        fn verify(&self, _id: TweakId, _ctx: &TweakContext) -> VerificationReport {
            VerificationReport::new(self.verify_ok, vec!["state".into()])
        }
    }

    fn run(apply_ok: bool, verify_ok: bool) -> TweakOutcome {
        let tweak = Tweak::new(
            TweakId::DnsCloudflare,
            Message::DnsLabel,
            Message::DnsApplying,
            true,
            Arc::new(Scripted {
                apply_ok,
                verify_ok,
            }),
        );
        let ctx = context(
            Arc::new(FakeRunner::new(|_, _| Default::default())),
            Arc::new(FakeBroker::new(ElevationOutcome::DeniedByUser)),
            false,
        );
        tweak.run(&ctx)
    }

    #[test]
    fn test_success_requires_apply_and_verify() {
        assert!(run(true, true).succeeded);
        assert!(!run(true, false).succeeded);
        assert!(!run(false, true).succeeded);
    }

    struct Mutating;

    impl TweakMethod for Mutating {
        fn apply(
            &self,
            id: TweakId,
            ctx: &TweakContext,
            log: &mut Vec<String>,
        ) -> Result<(), TweakError> {
            execute_mutation(id, ctx, "Write-Output 1", log)
        }

        fn verify(&self, _id: TweakId, _ctx: &TweakContext) -> VerificationReport {
            VerificationReport::new(true, vec!["state".into()])
        }
    }

    #[test]
    fn test_descriptor_decides_whether_to_prompt() {
        let run_with_admin = |requires_admin: bool| {
            let broker = Arc::new(FakeBroker::new(ElevationOutcome::DeniedByUser));
            let runner = Arc::new(FakeRunner::new(|_, _| Default::default()));
            let ctx = context(runner.clone(), broker.clone(), false);
            let tweak = Tweak::new(
                TweakId::DnsCloudflare,
                Message::DnsLabel,
                Message::DnsApplying,
                requires_admin,
                Arc::new(Mutating),
            );
            let outcome = tweak.run(&ctx);
            let prompts = broker.scripts.lock().unwrap().len();
            (outcome.succeeded, prompts, runner.scripts().len())
        };

        assert_eq!(run_with_admin(true), (false, 1, 0));
        assert_eq!(run_with_admin(false), (true, 0, 1));
    }

    #[test]
    fn test_verify_runs_after_failed_apply() {
        let outcome = run(false, true);
        assert!(outcome.verification.is_some());
        assert!(outcome.report_lines.contains(&"state".to_string()));
        assert_eq!(
            outcome.report_lines.last().unwrap(),
            Message::TweakWarnings.text(Language::English)
        );
    }
}
