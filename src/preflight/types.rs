//! Preflight findings.
//!
//! Every finding names the pipeline [`Stage`] whose precondition it checks,
//! so the report can say where a real run would stop instead of just
//! counting failures.

use std::fmt::Write as _;

use crate::error::Stage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Ready,
    /// The stage runs, but with a reduced result.
    Degraded,
    /// The stage would abort the install.
    Blocked,
}

impl Verdict {
    fn label(&self) -> &'static str {
        match self {
            Verdict::Ready => "ok",
            Verdict::Degraded => "WARN",
            Verdict::Blocked => "FAIL",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Finding {
    pub stage: Stage,
    pub subject: String,
    pub verdict: Verdict,
    pub note: Option<String>,
}

impl Finding {
    fn new(stage: Stage, subject: impl Into<String>, verdict: Verdict) -> Self {
        Self {
            stage,
            subject: subject.into(),
            verdict,
            note: None,
        }
    }

    pub fn ready(stage: Stage, subject: impl Into<String>) -> Self {
        Self::new(stage, subject, Verdict::Ready)
    }

    pub fn degraded(stage: Stage, subject: impl Into<String>, note: impl Into<String>) -> Self {
        Self::new(stage, subject, Verdict::Degraded).noted(note)
    }

    pub fn blocked(stage: Stage, subject: impl Into<String>, note: impl Into<String>) -> Self {
        Self::new(stage, subject, Verdict::Blocked).noted(note)
    }

    pub fn noted(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Findings grouped in pipeline order.
#[derive(Debug)]
pub struct PreflightReport {
    findings: Vec<Finding>,
}

impl PreflightReport {
    pub fn new(mut findings: Vec<Finding>) -> Self {
        findings.sort_by_key(|f| f.stage);
        Self { findings }
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    fn count(&self, verdict: Verdict) -> usize {
        self.findings.iter().filter(|f| f.verdict == verdict).count()
    }

    pub fn blocked_count(&self) -> usize {
        self.count(Verdict::Blocked)
    }

    pub fn degraded_count(&self) -> usize {
        self.count(Verdict::Degraded)
    }

    pub fn is_ready(&self) -> bool {
        self.blocked_count() == 0
    }

    /// Earliest stage an install would abort in.
    pub fn first_blocked_stage(&self) -> Option<Stage> {
        self.findings
            .iter()
            .find(|f| f.verdict == Verdict::Blocked)
            .map(|f| f.stage)
    }

    pub fn render(&self) -> String {
        let mut out = String::from("=== Preflight by stage ===\n");
        let mut current = None;
        for finding in &self.findings {
            if current != Some(finding.stage) {
                current = Some(finding.stage);
                let _ = writeln!(out, "\n{}", finding.stage);
            }
            let _ = write!(out, "  {:<4}  {}", finding.verdict.label(), finding.subject);
            match &finding.note {
                Some(note) => {
                    let _ = writeln!(out, ": {note}");
                }
                None => out.push('\n'),
            }
        }

        out.push('\n');
        match self.first_blocked_stage() {
            Some(stage) => {
                let _ = writeln!(
                    out,
                    "An install would abort at {stage} ({} blocking, {} warnings)",
                    self.blocked_count(),
                    self.degraded_count()
                );
            }
            None => {
                let _ = writeln!(
                    out,
                    "Every stage's preconditions hold ({} warnings)",
                    self.degraded_count()
                );
            }
        }
        out
    }

    pub fn print(&self) {
        print!("{}", self.render());
    }
}
