/// Machine-readable and human-readable renderings of stage results.
///
/// Every stage has a status; a clean stage always says so explicitly.
use serde::Serialize;
use std::fmt::Write as _;

use crate::core::loader::{SchemaErrors, SchemaViolation, Validated};
use crate::core::scorer::{Classification, ScoreReport};
use crate::schema::issue::{AlignmentIssue, ReportStatus, Severity};

pub const CLEAN: &str = "no issues found";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Human,
    Json,
}

/// Issues from one alignment run, with counts and overall status.
#[derive(Debug, Clone, Serialize)]
pub struct IssueReport<'a> {
    pub status: ReportStatus,
    pub errors: usize,
    pub warnings: usize,
    pub issues: &'a [AlignmentIssue],
}

impl<'a> IssueReport<'a> {
    pub fn new(issues: &'a [AlignmentIssue]) -> Self {
        let errors = issues.iter().filter(|i| i.is_error()).count();
        Self {
            status: ReportStatus::from_severities(issues.iter().map(|i| i.severity)),
            errors,
            warnings: issues.len() - errors,
            issues,
        }
    }

    pub fn render(&self, format: Format) -> Result<String, serde_json::Error> {
        match format {
            Format::Json => serde_json::to_string_pretty(self),
            Format::Human => Ok(self.human()),
        }
    }

    fn human(&self) -> String {
        let mut out = String::from("Alignment Summary:\n");
        let _ = writeln!(out, "  Errors found: {}", self.errors);
        let _ = writeln!(out, "  Warnings found: {}", self.warnings);
        if self.issues.is_empty() {
            let _ = writeln!(out, "\n{CLEAN}");
            return out;
        }
        for (severity, heading, count) in [
            (Severity::Error, "ERRORS", self.errors),
            (Severity::Warning, "WARNINGS", self.warnings),
        ] {
            if count == 0 {
                continue;
            }
            let _ = writeln!(out, "\n{heading} ({count}):");
            for issue in self.issues.iter().filter(|i| i.severity == severity) {
                let _ = writeln!(out, "  - [{}] {}", issue.code, issue.message);
                let locations: Vec<String> = issue.locations.iter().map(ToString::to_string).collect();
                if !locations.is_empty() {
                    let _ = writeln!(out, "    at {}", locations.join(", "));
                }
                let _ = writeln!(out, "    hint: {}", issue.hint);
            }
        }
        out
    }
}

/// Outcome of validating one config.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaReport<'a> {
    pub document: &'a str,
    pub status: ReportStatus,
    pub violations: &'a [SchemaViolation],
}

impl<'a> SchemaReport<'a> {
    pub fn from_result(result: &'a Result<Validated, SchemaErrors>) -> Self {
        let (document, violations) = match result {
            Ok(validated) => (validated.document.as_str(), validated.warnings.as_slice()),
            Err(errors) => (errors.document.as_str(), errors.violations.as_slice()),
        };
        Self {
            document,
            status: ReportStatus::from_severities(violations.iter().map(|v| v.severity)),
            violations,
        }
    }

    pub fn render(&self, format: Format) -> Result<String, serde_json::Error> {
        match format {
            Format::Json => serde_json::to_string_pretty(self),
            Format::Human => Ok(self.human()),
        }
    }

    fn human(&self) -> String {
        let mut out = String::new();
        if self.violations.is_empty() {
            let _ = writeln!(out, "{}: {CLEAN}", self.document);
            return out;
        }
        for v in self.violations {
            let _ = writeln!(
                out,
                "{}: {} [{}] {}: {}",
                self.document, v.severity, v.code, v.path, v.message
            );
            let _ = writeln!(out, "    hint: {}", v.hint);
        }
        out
    }
}

/// Exit status for a score: approved is clean, conditional approval warns,
/// rejection is an error.
pub fn score_status(report: &ScoreReport) -> ReportStatus {
    match report.classification {
        Classification::Approved => ReportStatus::Clean,
        Classification::ConditionalApproval => ReportStatus::WarningsOnly,
        Classification::Rejected => ReportStatus::Errors,
    }
}

pub fn render_score(report: &ScoreReport, format: Format) -> Result<String, serde_json::Error> {
    match format {
        Format::Json => serde_json::to_string_pretty(report),
        Format::Human => Ok(human_score(report)),
    }
}

fn human_score(report: &ScoreReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Quality score for {} ({} rubric)", report.document, report.rubric);
    for dim in &report.dimensions {
        let _ = writeln!(out, "  {:<18} {:>2}/{}", dim.kind.label(), dim.score, dim.max_points);
    }
    let _ = writeln!(out, "  {:<18} {:>3}/100", "Total", report.total);
    let _ = writeln!(out, "Classification: {}", report.classification);

    let unmet: Vec<_> = report.unmet().collect();
    if unmet.is_empty() {
        let _ = writeln!(out, "{CLEAN}");
    } else {
        let _ = writeln!(out, "\nSuggestions:");
        for check in unmet {
            let _ = writeln!(
                out,
                "  - {} ({}/{}): {}",
                check.id,
                check.awarded,
                check.weight,
                check.suggestion.as_deref().unwrap_or(&check.description)
            );
        }
    }
    if !report.rationale.is_empty() {
        let _ = writeln!(out, "\nConditional approval rationale:");
        for line in &report.rationale {
            let _ = writeln!(out, "  - {line}");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::issue::{IssueCode, Location};

    #[test]
    fn clean_alignment_says_so() {
        let report = IssueReport::new(&[]);
        assert_eq!(report.status, ReportStatus::Clean);
        assert!(report.render(Format::Human).unwrap().contains(CLEAN));
    }

    #[test]
    fn issues_grouped_by_severity() {
        let issues = vec![
            AlignmentIssue::new(
                IssueCode::OrphanRequirement,
                Some(3),
                "orphaned requirement REQ-AUTH-007 referenced in roadmap phase 3, not found in spec",
                vec![Location::new("ROADMAP.md", Some(9))],
            ),
            AlignmentIssue::new(IssueCode::TerminologyDrift, Some(3), "drift", vec![]),
        ];
        let report = IssueReport::new(&issues);
        assert_eq!((report.errors, report.warnings), (1, 1));
        assert_eq!(report.status.exit_code(), 2);

        let text = report.render(Format::Human).unwrap();
        assert!(text.contains("ERRORS (1):"));
        assert!(text.contains("at ROADMAP.md:9"));
        assert!(text.contains("WARNINGS (1):"));
        assert!(!text.contains(CLEAN));
    }

    #[test]
    fn json_carries_stable_codes() {
        let issues = vec![AlignmentIssue::new(
            IssueCode::MissingReviewPlan,
            Some(1),
            "roadmap phase 1 has no review plan",
            vec![],
        )];
        let json = IssueReport::new(&issues).render(Format::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["status"], "errors");
        assert_eq!(value["issues"][0]["code"], "MISSING_REVIEW_PLAN");
        assert_eq!(value["issues"][0]["severity"], "ERROR");
    }
}
