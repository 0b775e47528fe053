/// Rubric scoring: a pure function from document text and rubric to report.
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

use crate::core::placeholder;
use crate::core::rubric::{Check, DimensionKind, Rubric, Rule, Thresholds};

pub use crate::core::rubric::ScoreComputationError;

static HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(#{1,6})\s+(.+?)\s*#*\s*$").expect("static heading pattern"));

static REQUIREMENT_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:REQ|FR|NFR)(?:-[A-Z0-9]+)*-\d+\b").expect("static requirement pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Approved,
    ConditionalApproval,
    Rejected,
}

impl Classification {
    pub fn from_total(total: u32, thresholds: Thresholds) -> Self {
        if total >= thresholds.approval {
            Self::Approved
        } else if total >= thresholds.conditional {
            Self::ConditionalApproval
        } else {
            Self::Rejected
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Approved => "Approved",
            Self::ConditionalApproval => "Conditional Approval",
            Self::Rejected => "Rejected",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub id: String,
    pub description: String,
    pub weight: u32,
    pub awarded: u32,
    pub passed: bool,
    /// Present only when the check was not fully met.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DimensionScore {
    pub kind: DimensionKind,
    pub score: u32,
    pub max_points: u32,
    pub checks: Vec<CheckResult>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreReport {
    pub document: String,
    pub rubric: String,
    pub dimensions: Vec<DimensionScore>,
    pub total: u32,
    pub classification: Classification,
    /// For conditional approval: the suggestion of every unmet check.
    pub rationale: Vec<String>,
}

impl ScoreReport {
    pub fn dimension(&self, kind: DimensionKind) -> Option<&DimensionScore> {
        self.dimensions.iter().find(|d| d.kind == kind)
    }

    pub fn unmet(&self) -> impl Iterator<Item = &CheckResult> {
        self.dimensions
            .iter()
            .flat_map(|d| d.checks.iter())
            .filter(|c| !c.passed)
    }
}

/// A markdown heading: depth, text, and 0-based line.
struct Heading<'a> {
    depth: usize,
    text: &'a str,
    line: usize,
}

/// The document split once, shared by every check.
struct Document<'a> {
    text: &'a str,
    lines: Vec<&'a str>,
    headings: Vec<Heading<'a>>,
}

impl<'a> Document<'a> {
    fn new(text: &'a str) -> Self {
        let lines: Vec<&str> = text.lines().collect();
        let mut headings = Vec::new();
        let mut in_fence = false;
        for (line, raw) in lines.iter().enumerate() {
            if raw.trim_start().starts_with("```") {
                in_fence = !in_fence;
                continue;
            }
            if in_fence {
                continue;
            }
            if let Some(caps) = HEADING.captures(raw) {
                if let (Some(hashes), Some(title)) = (caps.get(1), caps.get(2)) {
                    headings.push(Heading {
                        depth: hashes.as_str().len(),
                        text: title.as_str(),
                        line,
                    });
                }
            }
        }
        Self {
            text,
            lines,
            headings,
        }
    }
}

/// Fraction of a check met, as `numerator / denominator`.
type Fraction = (u32, u32);

fn evaluate(rule: &Rule, doc: &Document<'_>) -> Fraction {
    match rule {
        Rule::Headings { required } => {
            let found = required
                .iter()
                .filter(|name| {
                    let name = name.to_lowercase();
                    doc.headings
                        .iter()
                        .any(|h| h.depth <= 3 && h.text.to_lowercase().starts_with(&name))
                })
                .count();
            (found as u32, required.len() as u32)
        }
        Rule::Count { pattern, target } => (hits(pattern.count(doc.text)).min(*target), *target),
        Rule::Absent { pattern, tolerance } => decay(hits(pattern.count(doc.text)), *tolerance),
        Rule::NoPlaceholders { tolerance } => decay(hits(placeholder::count(doc.text)), *tolerance),
        Rule::Present { pattern } => (u32::from(pattern.is_match(doc.text)), 1),
        Rule::MaxHeadingDepth { max_depth } => {
            let ok = doc.headings.iter().all(|h| h.depth <= usize::from(*max_depth));
            (u32::from(ok), 1)
        }
        Rule::SectionOrder { headings } => {
            let positions: Vec<usize> = headings
                .iter()
                .filter_map(|name| {
                    let name = name.to_lowercase();
                    doc.headings
                        .iter()
                        .position(|h| h.depth <= 2 && h.text.to_lowercase().contains(&name))
                })
                .collect();
            (longest_increasing_run(&positions) as u32, headings.len() as u32)
        }
        Rule::RequirementsHaveAcceptance => requirements_with_acceptance(doc),
    }
}

fn hits(count: usize) -> u32 {
    u32::try_from(count).unwrap_or(u32::MAX)
}

/// Full credit at zero hits, nothing at `tolerance + 1`.
fn decay(hits: u32, tolerance: u32) -> Fraction {
    let span = tolerance.saturating_add(1);
    (span.saturating_sub(hits), span)
}

/// Length of the longest strictly increasing subsequence.
fn longest_increasing_run(values: &[usize]) -> usize {
    let mut best = vec![1usize; values.len()];
    for i in 0..values.len() {
        for j in 0..i {
            if values[j] < values[i] {
                best[i] = best[i].max(best[j] + 1);
            }
        }
    }
    best.into_iter().max().unwrap_or(0)
}

fn requirements_with_acceptance(doc: &Document<'_>) -> Fraction {
    let mut total = 0;
    let mut covered = 0;
    for (idx, heading) in doc.headings.iter().enumerate() {
        if !REQUIREMENT_HEADING.is_match(heading.text) {
            continue;
        }
        total += 1;
        let end = doc.headings[idx + 1..]
            .iter()
            .find(|h| h.depth <= heading.depth)
            .map(|h| h.line)
            .unwrap_or(doc.lines.len());
        let body = &doc.lines[heading.line + 1..end];
        if body
            .iter()
            .any(|line| line.to_lowercase().contains("acceptance"))
        {
            covered += 1;
        }
    }
    if total == 0 {
        (0, 1)
    } else {
        (covered, total)
    }
}

fn score_check(check: &Check, doc: &Document<'_>) -> CheckResult {
    let (num, den) = evaluate(&check.rule, doc);
    let awarded = if den == 0 {
        0
    } else {
        let share = u64::from(check.weight) * u64::from(num.min(den)) / u64::from(den);
        u32::try_from(share).unwrap_or(check.weight)
    };
    let passed = awarded == check.weight;
    debug!(check = %check.id, awarded, weight = check.weight, "check scored");
    CheckResult {
        id: check.id.clone(),
        description: check.description.clone(),
        weight: check.weight,
        awarded,
        passed,
        suggestion: (!passed).then(|| check.suggestion.clone()),
    }
}

/// Score `text` against `rubric`. Same inputs, same report.
pub fn score(document: &str, text: &str, rubric: &Rubric) -> Result<ScoreReport, ScoreComputationError> {
    rubric.validate()?;
    let doc = Document::new(text);

    let mut dimensions = Vec::with_capacity(DimensionKind::ALL.len());
    for kind in DimensionKind::ALL {
        let Some(dimension) = rubric.dimension(kind) else {
            continue;
        };
        let checks: Vec<CheckResult> = dimension.checks.iter().map(|c| score_check(c, &doc)).collect();
        let score = checks
            .iter()
            .map(|c| c.awarded)
            .sum::<u32>()
            .min(dimension.max_points);
        dimensions.push(DimensionScore {
            kind,
            score,
            max_points: dimension.max_points,
            checks,
        });
    }

    let total = dimensions.iter().map(|d| d.score).sum::<u32>().min(100);
    let classification = Classification::from_total(total, rubric.thresholds);
    let rationale = match classification {
        Classification::ConditionalApproval => dimensions
            .iter()
            .flat_map(|d| d.checks.iter())
            .filter_map(|c| c.suggestion.as_ref().map(|s| format!("{}: {}", c.id, s)))
            .collect(),
        _ => Vec::new(),
    };

    info!(document, rubric = %rubric.name, total, classification = %classification, "document scored");
    Ok(ScoreReport {
        document: document.to_string(),
        rubric: rubric.name.clone(),
        dimensions,
        total,
        classification,
        rationale,
    })
}

/// Read a document from disk and score it.
pub fn score_file(path: &Path, rubric: &Rubric) -> Result<ScoreReport, ScoreComputationError> {
    let text = std::fs::read_to_string(path).map_err(|source| ScoreComputationError::Unreadable {
        path: path.display().to_string(),
        source,
    })?;
    score(&path.display().to_string(), &text, rubric)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rubric::Pattern;
    use rstest::rstest;

    #[rstest]
    #[case(100, Classification::Approved)]
    #[case(90, Classification::Approved)]
    #[case(89, Classification::ConditionalApproval)]
    #[case(80, Classification::ConditionalApproval)]
    #[case(79, Classification::Rejected)]
    #[case(0, Classification::Rejected)]
    fn classification_thresholds(#[case] total: u32, #[case] expected: Classification) {
        assert_eq!(Classification::from_total(total, Thresholds::default()), expected);
    }

    #[rstest]
    #[case(0, 2, (3, 3))]
    #[case(1, 2, (2, 3))]
    #[case(3, 2, (0, 3))]
    #[case(9, 2, (0, 3))]
    fn decay_is_linear_then_floored(#[case] hits: u32, #[case] tolerance: u32, #[case] expected: Fraction) {
        assert_eq!(decay(hits, tolerance), expected);
    }

    #[test]
    fn extreme_rule_values_do_not_overflow() {
        assert_eq!(decay(0, u32::MAX), (u32::MAX, u32::MAX));
        assert_eq!(decay(7, u32::MAX), (u32::MAX - 7, u32::MAX));

        let check = Check {
            id: "wide".to_string(),
            description: "many matches".to_string(),
            weight: u32::MAX,
            rule: Rule::Count {
                pattern: Pattern::new("x").unwrap(),
                target: 2,
            },
            suggestion: "more x".to_string(),
        };
        let full = score_check(&check, &Document::new("x x"));
        assert_eq!(full.awarded, u32::MAX);
        assert!(full.passed);
        let half = score_check(&check, &Document::new("x"));
        assert_eq!(half.awarded, u32::MAX / 2);
        assert_eq!(half.suggestion.as_deref(), Some("more x"));
    }

    #[test]
    fn count_rule_gives_linear_capped_credit() {
        let rule = Rule::Count {
            pattern: Pattern::new(r"^#### Task ").unwrap(),
            target: 3,
        };
        let one = Document::new("#### Task 1");
        let five = Document::new("#### Task 1\n#### Task 2\n#### Task 3\n#### Task 4\n#### Task 5");
        assert_eq!(evaluate(&rule, &one), (1, 3));
        assert_eq!(evaluate(&rule, &five), (3, 3));
    }

    #[test]
    fn headings_inside_code_fences_are_ignored() {
        let doc = Document::new("# Title\n```md\n###### not a heading\n```\n## Real");
        let depths: Vec<usize> = doc.headings.iter().map(|h| h.depth).collect();
        assert_eq!(depths, vec![1, 2]);
    }

    #[test]
    fn section_order_uses_longest_in_order_run() {
        let rule = Rule::SectionOrder {
            headings: vec!["a".into(), "b".into(), "c".into()],
        };
        assert_eq!(evaluate(&rule, &Document::new("# a\n# b\n# c")), (3, 3));
        assert_eq!(evaluate(&rule, &Document::new("# b\n# c\n# a")), (2, 3));
        assert_eq!(evaluate(&rule, &Document::new("# z")), (0, 3));
    }

    #[test]
    fn requirement_acceptance_coverage() {
        let text = "## Requirements\n### FR-001 Login\nAcceptance criteria: token issued\n### FR-002 Logout\nSession cleared\n## Risks\nacceptance risk";
        assert_eq!(requirements_with_acceptance(&Document::new(text)), (1, 2));
    }

    #[test]
    fn empty_document_scores_low_and_is_rejected() {
        let rubric = Rubric::work_plan().unwrap();
        let report = score("empty.md", "", &rubric).unwrap();
        assert_eq!(report.classification, Classification::Rejected);
        assert!(report.total < 80);
        assert!(report.rationale.is_empty());
        assert!(report.unmet().count() > 0);
    }

    #[test]
    fn unreadable_file_is_an_error() {
        let rubric = Rubric::work_plan().unwrap();
        let err = score_file(Path::new("does/not/exist.md"), &rubric).unwrap_err();
        assert!(matches!(err, ScoreComputationError::Unreadable { .. }));
    }
}
