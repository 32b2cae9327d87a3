// src/verification/mod.rs

//! Turns read-only state queries into pass/fail facts. Nothing in here runs a
//! process; callers hand in the captured text.

pub mod dns;
pub mod power;

/// Result of independently re-reading system state after a tweak.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    pub succeeded: bool,
    /// Always at least one line.
    pub detail: Vec<String>,
}

impl VerificationReport {
    pub fn new(succeeded: bool, mut detail: Vec<String>) -> Self {
        if detail.is_empty() {
            detail.push(if succeeded {
                "Verified.".to_string()
            } else {
                "Could not verify the new state.".to_string()
            });
        }
        Self { succeeded, detail }
    }

    pub fn text(&self) -> String {
        self.detail.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_never_empty() {
        assert_eq!(VerificationReport::new(false, vec![]).detail.len(), 1);
        assert_eq!(VerificationReport::new(true, vec![]).detail.len(), 1);
    }

    #[test]
    fn test_text_joins_lines() {
        let report = VerificationReport::new(true, vec!["a".into(), "b".into()]);
        assert_eq!(report.text(), "a\nb");
    }
}
