/// Scoring rubrics: four 25-point dimensions of weighted, declarative checks.
///
/// A rubric is plain data loaded from RON and validated on load. Nothing
/// here is global; every scoring call receives the rubric it should use.
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::Path;
use thiserror::Error;

const WORK_PLAN_RUBRIC: &str = include_str!("../../rubrics/work_plan.ron");
const SPEC_RUBRIC: &str = include_str!("../../rubrics/spec.ron");

/// Points every dimension is worth.
pub const DIMENSION_POINTS: u32 = 25;

/// Largest `Count` target or `Absent`/`NoPlaceholders` tolerance a rubric may set.
pub const MAX_TARGET: u32 = 10_000;

#[derive(Debug, Error)]
pub enum ScoreComputationError {
    #[error("cannot read {path}: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed rubric: {0}")]
    MalformedRubric(String),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DimensionKind {
    Completeness,
    Clarity,
    Implementability,
    Testability,
}

impl DimensionKind {
    pub const ALL: [DimensionKind; 4] = [
        Self::Completeness,
        Self::Clarity,
        Self::Implementability,
        Self::Testability,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Completeness => "Completeness",
            Self::Clarity => "Clarity",
            Self::Implementability => "Implementability",
            Self::Testability => "Testability",
        }
    }
}

impl fmt::Display for DimensionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A multi-line regex, compiled when the rubric is deserialized.
#[derive(Debug, Clone)]
pub struct Pattern(Regex);

impl Pattern {
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        RegexBuilder::new(source).multi_line(true).build().map(Pattern)
    }

    pub fn count(&self, text: &str) -> usize {
        self.0.find_iter(text).count()
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.0.is_match(text)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl<'de> Deserialize<'de> for Pattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        Pattern::new(&source).map_err(serde::de::Error::custom)
    }
}

impl Serialize for Pattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// How a check decides what fraction of its weight to award.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Rule {
    /// Headings (depth 1-3) starting with each name, case-insensitive.
    /// Credit is the fraction found.
    Headings { required: Vec<String> },
    /// Linear credit up to `target` matches.
    Count { pattern: Pattern, target: u32 },
    /// Full credit at zero matches, falling linearly to nothing at
    /// `tolerance + 1` matches.
    Absent { pattern: Pattern, tolerance: u32 },
    /// Like `Absent`, for the shared placeholder markers.
    NoPlaceholders { tolerance: u32 },
    /// All or nothing.
    Present { pattern: Pattern },
    /// All or nothing: no heading deeper than `max_depth`.
    MaxHeadingDepth { max_depth: u8 },
    /// Top-level headings (depth 1-2) containing these words should appear
    /// in this order; credit is the longest in-order run over the list length.
    SectionOrder { headings: Vec<String> },
    /// Fraction of requirement headings whose section mentions acceptance.
    RequirementsHaveAcceptance,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Check {
    pub id: String,
    pub description: String,
    pub weight: u32,
    pub rule: Rule,
    /// Shown when the check is not fully met.
    pub suggestion: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dimension {
    pub kind: DimensionKind,
    #[serde(default = "default_points")]
    pub max_points: u32,
    pub checks: Vec<Check>,
}

fn default_points() -> u32 {
    DIMENSION_POINTS
}

/// Classification cut-offs on the 0-100 total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    pub approval: u32,
    pub conditional: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            approval: 90,
            conditional: 80,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rubric {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub thresholds: Thresholds,
    pub dimensions: Vec<Dimension>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Rubric {
    /// The built-in rubric for generated work and review plans.
    pub fn work_plan() -> Result<Rubric, ScoreComputationError> {
        Self::parse_ron(WORK_PLAN_RUBRIC)
    }

    /// The built-in rubric for hand-written specification documents.
    pub fn spec() -> Result<Rubric, ScoreComputationError> {
        Self::parse_ron(SPEC_RUBRIC)
    }

    pub fn load_from_ron(path: &Path) -> Result<Rubric, ScoreComputationError> {
        let contents =
            std::fs::read_to_string(path).map_err(|source| ScoreComputationError::Unreadable {
                path: path.display().to_string(),
                source,
            })?;
        Self::parse_ron(&contents)
    }

    /// Parse and validate. Bad regexes surface as RON errors.
    pub fn parse_ron(input: &str) -> Result<Rubric, ScoreComputationError> {
        let rubric: Rubric = ron::from_str(input)?;
        rubric.validate()?;
        Ok(rubric)
    }

    pub fn dimension(&self, kind: DimensionKind) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.kind == kind)
    }

    /// Structural rules every rubric obeys.
    pub fn validate(&self) -> Result<(), ScoreComputationError> {
        let malformed =
            |msg: String| -> Result<(), ScoreComputationError> { Err(ScoreComputationError::MalformedRubric(msg)) };

        if self.dimensions.len() != DimensionKind::ALL.len() {
            return malformed(format!(
                "expected {} dimensions, found {}",
                DimensionKind::ALL.len(),
                self.dimensions.len()
            ));
        }
        for kind in DimensionKind::ALL {
            let count = self.dimensions.iter().filter(|d| d.kind == kind).count();
            if count != 1 {
                return malformed(format!("dimension {kind} appears {count} times"));
            }
        }
        for dim in &self.dimensions {
            if dim.max_points != DIMENSION_POINTS {
                return malformed(format!(
                    "dimension {} is worth {} points, expected {DIMENSION_POINTS}",
                    dim.kind, dim.max_points
                ));
            }
            if let Some(check) = dim.checks.iter().find(|c| c.weight > dim.max_points) {
                return malformed(format!(
                    "check {} weighs {}, more than the {} points of {}",
                    check.id, check.weight, dim.max_points, dim.kind
                ));
            }
            let total: u64 = dim.checks.iter().map(|c| u64::from(c.weight)).sum();
            if total != u64::from(dim.max_points) {
                return malformed(format!(
                    "check weights in {} sum to {total}, expected {}",
                    dim.kind, dim.max_points
                ));
            }
            for check in &dim.checks {
                match check.rule {
                    Rule::Count { target: 0, .. } => {
                        return malformed(format!("check {} has a zero target", check.id));
                    }
                    Rule::Count { target: bound, .. }
                    | Rule::Absent { tolerance: bound, .. }
                    | Rule::NoPlaceholders { tolerance: bound }
                        if bound > MAX_TARGET =>
                    {
                        return malformed(format!(
                            "check {} sets {bound}, above the limit of {MAX_TARGET}",
                            check.id
                        ));
                    }
                    _ => {}
                }
                if let Rule::Headings { ref required } | Rule::SectionOrder { headings: ref required } =
                    check.rule
                {
                    if required.is_empty() {
                        return malformed(format!("check {} lists no headings", check.id));
                    }
                }
            }
        }
        let Thresholds {
            approval,
            conditional,
        } = self.thresholds;
        if !(conditional <= approval && approval <= 100) {
            return malformed(format!(
                "thresholds must satisfy 0 <= conditional ({conditional}) <= approval ({approval}) <= 100"
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_rubrics_are_valid() {
        let work = Rubric::work_plan().unwrap();
        assert_eq!(work.dimensions.len(), 4);
        assert_eq!(work.thresholds, Thresholds::default());
        let spec = Rubric::spec().unwrap();
        for kind in DimensionKind::ALL {
            assert!(spec.dimension(kind).is_some());
        }
    }

    fn minimal(weights: [u32; 4]) -> String {
        let dims: Vec<String> = DimensionKind::ALL
            .iter()
            .zip(weights)
            .map(|(kind, w)| {
                format!(
                    r#"(kind: {kind:?}, checks: [(id: "c", description: "d", weight: {w}, rule: Present(pattern: "x"), suggestion: "s")])"#
                )
            })
            .collect();
        format!(r#"(name: "t", dimensions: [{}])"#, dims.join(", "))
    }

    #[test]
    fn minimal_rubric_parses() {
        let rubric = Rubric::parse_ron(&minimal([25, 25, 25, 25])).unwrap();
        assert_eq!(rubric.version, "1.0");
    }

    #[test]
    fn weights_must_sum_to_dimension_points() {
        let err = Rubric::parse_ron(&minimal([25, 20, 25, 25])).unwrap_err();
        assert!(matches!(err, ScoreComputationError::MalformedRubric(m) if m.contains("Clarity")));
    }

    #[test]
    fn oversized_weights_are_rejected_before_summing() {
        let mut rubric = Rubric::parse_ron(&minimal([25, 25, 25, 25])).unwrap();
        let mut extra = rubric.dimensions[0].checks[0].clone();
        extra.id = "extra".to_string();
        extra.weight = 26;
        rubric.dimensions[0].checks[0].weight = u32::MAX;
        rubric.dimensions[0].checks.push(extra);

        let err = rubric.validate().unwrap_err();
        assert!(matches!(err, ScoreComputationError::MalformedRubric(m) if m.starts_with("check c weighs 4294967295")));
    }

    #[test]
    fn huge_targets_and_tolerances_are_rejected() {
        let base = minimal([25, 25, 25, 25]);
        for rule in [
            format!("Count(pattern: \"x\", target: {})", u32::MAX),
            format!("Absent(pattern: \"x\", tolerance: {})", MAX_TARGET + 1),
            format!("NoPlaceholders(tolerance: {})", u32::MAX),
        ] {
            let input = base.replacen(r#"Present(pattern: "x")"#, &rule, 1);
            let err = Rubric::parse_ron(&input).unwrap_err();
            assert!(
                matches!(err, ScoreComputationError::MalformedRubric(ref m) if m.contains("above the limit")),
                "{rule}: {err}"
            );
        }
        let at_limit = base.replacen(
            r#"Present(pattern: "x")"#,
            &format!("Count(pattern: \"x\", target: {MAX_TARGET})"),
            1,
        );
        assert!(Rubric::parse_ron(&at_limit).is_ok());
    }

    #[test]
    fn thresholds_must_be_ordered() {
        let mut rubric = Rubric::parse_ron(&minimal([25, 25, 25, 25])).unwrap();
        rubric.thresholds = Thresholds {
            approval: 70,
            conditional: 80,
        };
        assert!(rubric.validate().is_err());
    }

    #[test]
    fn duplicate_dimension_is_rejected() {
        let mut rubric = Rubric::parse_ron(&minimal([25, 25, 25, 25])).unwrap();
        rubric.dimensions[3].kind = DimensionKind::Clarity;
        assert!(rubric.validate().is_err());
    }

    #[test]
    fn invalid_regex_fails_to_load() {
        let input = minimal([25, 25, 25, 25]).replacen(r#"pattern: "x""#, r#"pattern: "(unclosed""#, 1);
        assert!(matches!(
            Rubric::parse_ron(&input),
            Err(ScoreComputationError::Ron(_))
        ));
    }

    #[test]
    fn patterns_are_multi_line() {
        let p = Pattern::new(r"^#### Task ").unwrap();
        assert_eq!(p.count("intro\n#### Task 1\ntext\n#### Task 2"), 2);
    }
}
