// src/verification/power.rs

use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

use super::VerificationReport;
use crate::{
    constants::{ULTIMATE_PERFORMANCE_LABELS, ULTIMATE_PERFORMANCE_TEMPLATE_GUID},
    language::{Language, Message},
};

pub const GUID_REGEX: &str = r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}";

static GUID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"\b{}\b", GUID_REGEX)).expect("GUID pattern is valid"));

static LABELED_SCHEME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)({}).*({})", GUID_REGEX, label_alternation()))
        .expect("labeled scheme pattern is valid")
});

static ACTIVE_SCHEME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"({})\s*\((.*)\)", GUID_REGEX)).expect("active scheme pattern is valid")
});

/// `Ultimate|Najwyższa|...`, escaped for use inside a regular expression.
pub fn label_alternation() -> String {
    ULTIMATE_PERFORMANCE_LABELS
        .iter()
        .map(|label| regex::escape(label))
        .collect::<Vec<_>>()
        .join("|")
}

pub fn template_guid() -> Uuid {
    Uuid::parse_str(ULTIMATE_PERFORMANCE_TEMPLATE_GUID).unwrap_or_default()
}

/// Which strategy produced a scheme identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuidSource {
    DuplicateOutput,
    SchemeList,
}

/// Picks the new scheme's GUID from `powercfg -duplicatescheme` output: the last
/// GUID in the text that is not the template itself.
pub fn extract_scheme_guid(duplicate_output: &str) -> Option<Uuid> {
    let template = template_guid();
    GUID_PATTERN
        .find_iter(duplicate_output)
        .filter_map(|m| Uuid::parse_str(m.as_str()).ok())
        .filter(|guid| *guid != template)
        .last()
}

/// Finds the first `powercfg -list` line whose GUID is followed by a known
/// localized "Ultimate Performance" label.
pub fn find_scheme_by_label(list_output: &str) -> Option<Uuid> {
    list_output.lines().find_map(|line| {
        LABELED_SCHEME_PATTERN
            .captures(line)
            .and_then(|caps| Uuid::parse_str(&caps[1]).ok())
    })
}

/// Resolves the duplicated scheme's GUID, falling back to the scheme list only
/// when the direct extraction fails. `list_schemes` is not called otherwise.
pub fn resolve_scheme_guid<F>(duplicate_output: &str, list_schemes: F) -> Option<(Uuid, GuidSource)>
where
    F: FnOnce() -> Option<String>,
{
    if let Some(guid) = extract_scheme_guid(duplicate_output) {
        return Some((guid, GuidSource::DuplicateOutput));
    }
    tracing::debug!("No GUID in duplicate output, searching the scheme list by label.");
    list_schemes()
        .and_then(|list| find_scheme_by_label(&list))
        .map(|guid| (guid, GuidSource::SchemeList))
}

/// The scheme reported by `powercfg -getactivescheme`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveScheme {
    pub guid: Uuid,
    pub name: String,
}

impl ActiveScheme {
    pub fn is_ultimate_performance(&self) -> bool {
        if self.guid == template_guid() {
            return true;
        }
        let name = self.name.to_lowercase();
        ULTIMATE_PERFORMANCE_LABELS
            .iter()
            .any(|label| name.contains(&label.to_lowercase()))
    }
}

pub fn parse_active_scheme(output: &str) -> Option<ActiveScheme> {
    output.lines().find_map(|line| {
        let caps = ACTIVE_SCHEME_PATTERN.captures(line)?;
        Some(ActiveScheme {
            guid: Uuid::parse_str(&caps[1]).ok()?,
            name: caps[2].trim().to_string(),
        })
    })
}

/// Checks that an "Ultimate Performance" scheme is the active one.
pub fn verify_active_scheme_output(output: &str, language: Language) -> VerificationReport {
    match parse_active_scheme(output) {
        Some(active) => {
            let succeeded = active.is_ultimate_performance();
            tracing::debug!("Active power scheme {:?}, ultimate: {}", active, succeeded);
            VerificationReport::new(succeeded, vec![output.trim().to_string()])
        }
        None => {
            let mut detail = vec![Message::PowerUnverified.text(language).to_string()];
            if !output.trim().is_empty() {
                detail.push(output.trim().to_string());
            }
            VerificationReport::new(false, detail)
        }
    }
}
