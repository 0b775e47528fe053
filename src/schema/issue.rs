use serde::{Deserialize, Serialize};
use std::fmt;

/// How serious a finding is. `Error` blocks progression, `Warning` is
/// advisory. Ordered so that errors sort first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warning => "WARNING",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which family of cross-document check produced an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    Traceability,
    Pairing,
    Checkpoints,
    Numbering,
    Terminology,
    Parsing,
    Links,
}

/// Stable issue codes. The string form never changes once published;
/// CI gates and suppressions key on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCode {
    OrphanRequirement,
    UnplannedRequirement,
    DuplicateRequirement,
    MissingWorkPlan,
    MissingReviewPlan,
    DuplicatePlan,
    UnknownPhasePlan,
    CheckpointMissingFromReview,
    CheckpointMissingFromWork,
    DuplicateCheckpoint,
    SkippedCheckpoint,
    TerminologyDrift,
    UnparseableDocument,
    BrokenLink,
}

impl IssueCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OrphanRequirement => "ORPHAN_REQUIREMENT",
            Self::UnplannedRequirement => "UNPLANNED_REQUIREMENT",
            Self::DuplicateRequirement => "DUPLICATE_REQUIREMENT",
            Self::MissingWorkPlan => "MISSING_WORK_PLAN",
            Self::MissingReviewPlan => "MISSING_REVIEW_PLAN",
            Self::DuplicatePlan => "DUPLICATE_PLAN",
            Self::UnknownPhasePlan => "UNKNOWN_PHASE_PLAN",
            Self::CheckpointMissingFromReview => "CHECKPOINT_MISSING_FROM_REVIEW",
            Self::CheckpointMissingFromWork => "CHECKPOINT_MISSING_FROM_WORK",
            Self::DuplicateCheckpoint => "DUPLICATE_CHECKPOINT",
            Self::SkippedCheckpoint => "SKIPPED_CHECKPOINT",
            Self::TerminologyDrift => "TERMINOLOGY_DRIFT",
            Self::UnparseableDocument => "UNPARSEABLE_DOCUMENT",
            Self::BrokenLink => "BROKEN_LINK",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::DuplicateRequirement
            | Self::UnknownPhasePlan
            | Self::TerminologyDrift
            | Self::BrokenLink => Severity::Warning,
            _ => Severity::Error,
        }
    }

    pub fn category(&self) -> IssueCategory {
        match self {
            Self::OrphanRequirement | Self::UnplannedRequirement | Self::DuplicateRequirement => {
                IssueCategory::Traceability
            }
            Self::MissingWorkPlan
            | Self::MissingReviewPlan
            | Self::DuplicatePlan
            | Self::UnknownPhasePlan => IssueCategory::Pairing,
            Self::CheckpointMissingFromReview | Self::CheckpointMissingFromWork => {
                IssueCategory::Checkpoints
            }
            Self::DuplicateCheckpoint | Self::SkippedCheckpoint => IssueCategory::Numbering,
            Self::TerminologyDrift => IssueCategory::Terminology,
            Self::UnparseableDocument => IssueCategory::Parsing,
            Self::BrokenLink => IssueCategory::Links,
        }
    }

    /// Remediation hint shown next to every issue with this code.
    pub fn hint(&self) -> &'static str {
        match self {
            Self::OrphanRequirement => "define the requirement in the spec or remove the reference",
            Self::UnplannedRequirement => "schedule the requirement in a roadmap phase",
            Self::DuplicateRequirement => "keep a single definition per requirement ID",
            Self::MissingWorkPlan => "generate the work plan for this phase",
            Self::MissingReviewPlan => "generate the review plan for this phase",
            Self::DuplicatePlan => "keep exactly one plan of each kind per phase",
            Self::UnknownPhasePlan => "add the phase to the roadmap or delete the stale plan",
            Self::CheckpointMissingFromReview => {
                "add a matching checkpoint block to the review plan"
            }
            Self::CheckpointMissingFromWork => {
                "remove the review block or add the checkpoint to the work plan"
            }
            Self::DuplicateCheckpoint => "renumber checkpoints so each number appears once",
            Self::SkippedCheckpoint => "number checkpoints consecutively starting at 1",
            Self::TerminologyDrift => "use the roadmap's phase title in the plan header",
            Self::UnparseableDocument => "check the document headings follow the expected format",
            Self::BrokenLink => "fix the link target or add the heading it points to",
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A place in a document. Lines are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Location {
    pub document: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl Location {
    pub fn new(document: impl Into<String>, line: Option<usize>) -> Self {
        Self {
            document: document.into(),
            line,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}", self.document, line),
            None => f.write_str(&self.document),
        }
    }
}

/// One cross-document consistency finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignmentIssue {
    pub severity: Severity,
    pub code: IssueCode,
    pub category: IssueCategory,
    /// Phase the issue belongs to; `None` for project-wide findings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<u32>,
    pub message: String,
    pub hint: String,
    pub locations: Vec<Location>,
}

impl AlignmentIssue {
    /// Build an issue whose severity, category, and hint come from its code.
    pub fn new(
        code: IssueCode,
        phase: Option<u32>,
        message: impl Into<String>,
        locations: Vec<Location>,
    ) -> Self {
        Self {
            severity: code.severity(),
            code,
            category: code.category(),
            phase,
            message: message.into(),
            hint: code.hint().to_string(),
            locations,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Deterministic ordering key: phase, severity, location, code, message.
    pub(crate) fn sort_key(&self) -> (Option<u32>, Severity, Option<&Location>, IssueCode, &str) {
        (
            self.phase,
            self.severity,
            self.locations.first(),
            self.code,
            self.message.as_str(),
        )
    }
}

/// Overall status of a validation stage, mapped onto the CLI exit code
/// convention: 0 clean, 1 warnings only, 2 errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Clean,
    WarningsOnly,
    Errors,
}

impl ReportStatus {
    pub fn from_severities<I: IntoIterator<Item = Severity>>(severities: I) -> Self {
        let mut status = Self::Clean;
        for severity in severities {
            match severity {
                Severity::Error => return Self::Errors,
                Severity::Warning => status = Self::WarningsOnly,
            }
        }
        status
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Clean => 0,
            Self::WarningsOnly => 1,
            Self::Errors => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_carry_severity_and_category() {
        let issue = AlignmentIssue::new(
            IssueCode::OrphanRequirement,
            Some(3),
            "orphaned requirement",
            vec![Location::new("ROADMAP.md", Some(12))],
        );
        assert_eq!(issue.severity, Severity::Error);
        assert_eq!(issue.category, IssueCategory::Traceability);
        assert!(!issue.hint.is_empty());
        assert!(issue.is_error());
    }

    #[test]
    fn code_serializes_to_stable_string() {
        let json = serde_json::to_string(&IssueCode::CheckpointMissingFromReview).unwrap();
        assert_eq!(json, "\"CHECKPOINT_MISSING_FROM_REVIEW\"");
        assert_eq!(
            IssueCode::CheckpointMissingFromReview.as_str(),
            "CHECKPOINT_MISSING_FROM_REVIEW"
        );
    }

    #[test]
    fn errors_sort_before_warnings() {
        assert!(Severity::Error < Severity::Warning);
    }

    #[test]
    fn status_exit_codes() {
        assert_eq!(ReportStatus::from_severities([]).exit_code(), 0);
        assert_eq!(
            ReportStatus::from_severities([Severity::Warning]).exit_code(),
            1
        );
        assert_eq!(
            ReportStatus::from_severities([Severity::Warning, Severity::Error]).exit_code(),
            2
        );
    }

    #[test]
    fn location_display() {
        assert_eq!(Location::new("SPEC.md", Some(4)).to_string(), "SPEC.md:4");
        assert_eq!(Location::new("SPEC.md", None).to_string(), "SPEC.md");
    }
}
