// src/tweaks/power_plan.rs

use uuid::Uuid;

use super::{execute_mutation, TweakContext, TweakId, TweakMethod};
use crate::{
    constants::ULTIMATE_PERFORMANCE_TEMPLATE_GUID,
    errors::TweakError,
    language::Message,
    utils::powershell::{CommandResult, Invocation, OutputEncoding},
    verification::{
        power::{label_alternation, resolve_scheme_guid, verify_active_scheme_output, GUID_REGEX},
        VerificationReport,
    },
};

const POWERCFG: &str = "powercfg";

/// `powercfg` prints localized scheme names in the OEM code page.
fn powercfg_invocation<'a>(args: impl IntoIterator<Item = &'a str>) -> Invocation {
    Invocation::new(POWERCFG)
        .args(args)
        .encoding(OutputEncoding::Oem)
}

/// Duplicates the hidden "Ultimate Performance" template and activates the copy.
#[derive(Debug, Clone, Copy, Default)]
pub struct UltimatePerformancePlan;

/// Rewrites non-ASCII characters as `\uXXXX` escapes so the pattern survives a
/// script file read with the ANSI code page.
fn ascii_regex(pattern: &str) -> String {
    let mut escaped = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        if c.is_ascii() {
            escaped.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                escaped.push_str(&format!("\\u{:04X}", unit));
            }
        }
    }
    escaped
}

/// Script run through the elevation prompt. It resolves the new GUID with the
/// same two strategies as [`resolve_scheme_guid`] and throws when both fail.
pub fn elevated_script() -> String {
    format!(
        r#"$ErrorActionPreference='Stop'
$template = '{template}'
$dupOut = & powercfg -duplicatescheme $template 2>$null
$guid = $dupOut | Select-String -Pattern '\b{guid}\b' -AllMatches |
  ForEach-Object {{ $_.Matches.Value }} |
  Where-Object {{ $_ -ne $template }} |
  Select-Object -Last 1

if (-not $guid) {{
  $list = & powercfg -list
  $m = $list | Select-String -Pattern '({guid}).*({labels})' | Select-Object -First 1
  if ($m) {{ $guid = $m.Matches[0].Groups[1].Value }}
}}

if (-not $guid) {{
  throw 'Could not determine duplicated plan GUID.'
}}

& powercfg -setactive $guid
exit $LASTEXITCODE
"#,
        template = ULTIMATE_PERFORMANCE_TEMPLATE_GUID,
        guid = GUID_REGEX,
        labels = ascii_regex(&label_alternation()),
    )
}

impl UltimatePerformancePlan {
    fn powercfg(
        &self,
        id: TweakId,
        ctx: &TweakContext,
        args: &[&str],
        log: &mut Vec<String>,
    ) -> Result<CommandResult, TweakError> {
        let invocation = powercfg_invocation(args.iter().copied());
        let result = ctx.runner.run(&invocation)?;
        let stderr = result.stderr.trim();
        if !result.success() {
            return Err(TweakError::NonZeroExit {
                code: result.exit_code,
                stderr: stderr.to_string(),
            });
        }
        if !stderr.is_empty() {
            tracing::warn!("{:?} -> powercfg wrote to stderr: {}", id, stderr);
            log.push(format!("⚠ {}", stderr));
        }
        Ok(result)
    }

    /// Runs the duplicate, resolve, activate sequence from this process.
    fn apply_directly(
        &self,
        id: TweakId,
        ctx: &TweakContext,
        log: &mut Vec<String>,
    ) -> Result<Uuid, TweakError> {
        let duplicate = self.powercfg(
            id,
            ctx,
            &["-duplicatescheme", ULTIMATE_PERFORMANCE_TEMPLATE_GUID],
            log,
        )?;

        let list_schemes = || match ctx.runner.run(&powercfg_invocation(["-list"])) {
            Ok(result) if result.success() => Some(result.stdout),
            Ok(result) => {
                tracing::warn!("{:?} -> powercfg -list exited with {}.", id, result.exit_code);
                None
            }
            Err(e) => {
                tracing::warn!("{:?} -> powercfg -list failed: {}", id, e);
                None
            }
        };

        let (guid, source) = resolve_scheme_guid(&duplicate.stdout, list_schemes)
            .ok_or(TweakError::SchemeGuidUnresolved)?;
        tracing::info!("{:?} -> Duplicated scheme {} (from {:?}).", id, guid, source);

        let guid_text = guid.hyphenated().to_string();
        self.powercfg(id, ctx, &["-setactive", &guid_text], log)?;
        Ok(guid)
    }
}

impl TweakMethod for UltimatePerformancePlan {
    fn apply(
        &self,
        id: TweakId,
        ctx: &TweakContext,
        log: &mut Vec<String>,
    ) -> Result<(), TweakError> {
        let result = if ctx.runs_directly() {
            self.apply_directly(id, ctx, log).map(|_| ())
        } else {
            execute_mutation(id, ctx, &elevated_script(), log)
        };

        if result.is_err() {
            log.push(Message::PowerFailed.text(ctx.language()).to_string());
        }
        result
    }

    fn verify(&self, id: TweakId, ctx: &TweakContext) -> VerificationReport {
        let language = ctx.language();
        match ctx.runner.run(&powercfg_invocation(["-getactivescheme"])) {
            Ok(result) => {
                let stderr = result.stderr.trim();
                if !stderr.is_empty() {
                    tracing::warn!("{:?} -> powercfg -getactivescheme: {}", id, stderr);
                }
                verify_active_scheme_output(&result.stdout, language)
            }
            Err(e) => {
                tracing::error!(error = ?e, "{:?} -> Could not query the active scheme.", id);
                VerificationReport::new(
                    false,
                    vec![
                        format!("⚠ {}", e),
                        Message::PowerUnverified.text(language).to_string(),
                    ],
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::{
        language::Language,
        tweaks::method::testing::{context, output, FakeBroker, FakeRunner},
        utils::windows::ElevationOutcome,
    };

    const NEW_GUID: &str = "3ff9831b-6f80-4830-8178-736cd4229e7b";

    /// A power subsystem that remembers the active scheme.
    struct FakePower {
        scheme_name: String,
        duplicate_stdout: String,
        list_stdout: Option<String>,
        active: Mutex<(String, String)>,
        list_calls: Mutex<usize>,
    }

    impl FakePower {
        fn new(duplicate_stdout: &str, list_stdout: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                scheme_name: "Ultimate Performance".to_string(),
                duplicate_stdout: duplicate_stdout.to_string(),
                list_stdout: list_stdout.map(str::to_string),
                active: Mutex::new((
                    "381b4222-f694-41f0-9685-ff5bb260df2e".to_string(),
                    "Balanced".to_string(),
                )),
                list_calls: Mutex::new(0),
            })
        }

        fn respond(&self, invocation: &Invocation) -> CommandResult {
            assert_eq!(invocation.program, POWERCFG);
            assert_eq!(invocation.encoding, OutputEncoding::Oem);
            match invocation.args[0].as_str() {
                "-duplicatescheme" => output(0, &self.duplicate_stdout, ""),
                "-list" => {
                    *self.list_calls.lock().unwrap() += 1;
                    match &self.list_stdout {
                        Some(list) => output(0, list, ""),
                        None => output(1, "", ""),
                    }
                }
                "-setactive" => {
                    *self.active.lock().unwrap() =
                        (invocation.args[1].clone(), self.scheme_name.clone());
                    output(0, "", "")
                }
                "-getactivescheme" => {
                    let (guid, name) = self.active.lock().unwrap().clone();
                    output(0, &format!("Power Scheme GUID: {}  ({})\r\n", guid, name), "")
                }
                other => panic!("unexpected powercfg argument {}", other),
            }
        }
    }

    fn power_context(power: Arc<FakePower>) -> TweakContext {
        let runner = FakeRunner::new(move |invocation, _| power.respond(invocation));
        context(
            Arc::new(runner),
            Arc::new(FakeBroker::new(ElevationOutcome::DeniedByUser)),
            true,
        )
    }

    #[test]
    fn test_localized_scheme_names_verify() {
        let cases = [
            (Language::Spanish, "Máximo rendimiento"),
            (Language::Polish, "Najwyższa wydajność"),
            (Language::Russian, "Максимальная производительность"),
        ];
        for (language, name) in cases {
            let mut power = FakePower::new("Esquema duplicado.", None);
            Arc::get_mut(&mut power).unwrap().scheme_name = name.to_string();
            Arc::get_mut(&mut power).unwrap().list_stdout = Some(format!(
                "Power Scheme GUID: {}  ({})\n",
                NEW_GUID, name
            ));
            let mut ctx = power_context(power.clone());
            ctx.settings = crate::language::DisplaySettings::new(language);

            let mut log = Vec::new();
            UltimatePerformancePlan
                .apply(TweakId::PowerUltimate, &ctx, &mut log)
                .unwrap();
            assert_eq!(power.active.lock().unwrap().0, NEW_GUID);
            assert!(
                UltimatePerformancePlan
                    .verify(TweakId::PowerUltimate, &ctx)
                    .succeeded,
                "{} should verify",
                name
            );
        }
    }

    #[test]
    fn test_admin_free_descriptor_runs_directly() {
        let power = FakePower::new(
            &format!("Power Scheme GUID: {}  (Ultimate Performance)", NEW_GUID),
            None,
        );
        let broker = Arc::new(FakeBroker::new(ElevationOutcome::DeniedByUser));
        let runner = {
            let power = power.clone();
            FakeRunner::new(move |invocation, _| power.respond(invocation))
        };
        let mut ctx = context(Arc::new(runner), broker.clone(), false);
        ctx.requires_admin = false;

        let mut log = Vec::new();
        UltimatePerformancePlan
            .apply(TweakId::PowerUltimate, &ctx, &mut log)
            .unwrap();
        assert_eq!(power.active.lock().unwrap().0, NEW_GUID);
        assert!(broker.scripts.lock().unwrap().is_empty());
    }

    #[test]
    fn test_direct_guid_is_activated() {
        let power = FakePower::new(
            &format!("Power Scheme GUID: {}  (Ultimate Performance)", NEW_GUID),
            None,
        );
        let ctx = power_context(power.clone());
        let mut log = Vec::new();

        UltimatePerformancePlan
            .apply(TweakId::PowerUltimate, &ctx, &mut log)
            .unwrap();
        assert_eq!(power.active.lock().unwrap().0, NEW_GUID);
        assert_eq!(*power.list_calls.lock().unwrap(), 0);
        assert!(UltimatePerformancePlan
            .verify(TweakId::PowerUltimate, &ctx)
            .succeeded);
    }

    #[test]
    fn test_label_fallback_is_activated() {
        let list = format!(
            "Power Scheme GUID: 381b4222-f694-41f0-9685-ff5bb260df2e  (Balanced) *\n\
             Power Scheme GUID: {}  (Najwyższa wydajność)\n",
            NEW_GUID
        );
        let power = FakePower::new("Zduplikowano schemat.", Some(&list));
        let ctx = power_context(power.clone());
        let mut log = Vec::new();

        UltimatePerformancePlan
            .apply(TweakId::PowerUltimate, &ctx, &mut log)
            .unwrap();
        assert_eq!(power.active.lock().unwrap().0, NEW_GUID);
        assert_eq!(*power.list_calls.lock().unwrap(), 1);
    }

    #[test]
    fn test_unresolved_guid_fails_explicitly() {
        let power = FakePower::new("", Some("Power Scheme GUID: 381b4222-f694-41f0-9685-ff5bb260df2e  (Balanced)"));
        let ctx = power_context(power.clone());
        let mut log = Vec::new();

        let result = UltimatePerformancePlan.apply(TweakId::PowerUltimate, &ctx, &mut log);
        assert!(matches!(result, Err(TweakError::SchemeGuidUnresolved)));
        assert_eq!(power.active.lock().unwrap().1, "Balanced");
        assert_eq!(log, vec![Message::PowerFailed.text(Language::English).to_string()]);
        assert!(!UltimatePerformancePlan
            .verify(TweakId::PowerUltimate, &ctx)
            .succeeded);
    }

    #[test]
    fn test_apply_twice_stays_verified() {
        let power = FakePower::new(
            &format!("Power Scheme GUID: {}  (Ultimate Performance)", NEW_GUID),
            None,
        );
        let ctx = power_context(power);
        for _ in 0..2 {
            let mut log = Vec::new();
            UltimatePerformancePlan
                .apply(TweakId::PowerUltimate, &ctx, &mut log)
                .unwrap();
            assert!(UltimatePerformancePlan
                .verify(TweakId::PowerUltimate, &ctx)
                .succeeded);
        }
    }

    #[test]
    fn test_unelevated_apply_uses_generated_script() {
        let broker = Arc::new(FakeBroker::new(ElevationOutcome::Granted { exit_code: 0 }));
        let ctx = context(
            Arc::new(FakeRunner::new(|_, _| panic!("must not run directly"))),
            broker.clone(),
            false,
        );
        let mut log = Vec::new();
        UltimatePerformancePlan
            .apply(TweakId::PowerUltimate, &ctx, &mut log)
            .unwrap();

        let scripts = broker.scripts.lock().unwrap();
        assert_eq!(scripts.len(), 1);
        assert!(scripts[0].contains(ULTIMATE_PERFORMANCE_TEMPLATE_GUID));
        assert!(scripts[0].contains("throw"));
        assert!(scripts[0].is_ascii());
    }

    #[test]
    fn test_ascii_regex_escapes_labels() {
        assert_eq!(ascii_regex("Máximo"), "M\\u00E1ximo");
        assert_eq!(ascii_regex("Ultimate"), "Ultimate");
    }
}
