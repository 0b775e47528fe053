/// Cross-document alignment: spec → roadmap → phase plans.
///
/// Identifiers are extracted from each document's text, indexed, and
/// checked for orphans, plan pairing, checkpoint symmetry, numbering, and
/// terminology drift. Everything is rebuilt from the current text on every
/// run, and the issue list is always complete.
use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::core::links;
use crate::schema::issue::{AlignmentIssue, IssueCode, Location};

static REQUIREMENT_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:REQ|FR|NFR)(?:-[A-Z0-9]+)*-\d+\b").expect("static requirement pattern")
});

static REQUIREMENT_DEFINITION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^#{1,6}\s+((?:REQ|FR|NFR)(?:-[A-Z0-9]+)*-\d+)\b[\s:.\-]*(.*)$")
        .expect("static definition pattern")
});

static PHASE_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^#{1,3}\s+phase\s+(\d+)\b[\s:.\-]*(.*)$").expect("static phase pattern")
});

static PLAN_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^#\s+phase\s+(\d+)\b[\s:.\-]*(.*?)(?:\s+-\s+(?:work|review)\s+plan)?\s*$")
        .expect("static plan header pattern")
});

static CHECKPOINT_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^#{2,4}\s+checkpoint\s+(\d+)\b").expect("static checkpoint pattern")
});

#[derive(Debug, Error)]
pub enum AlignmentError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{document}: {reason}")]
    Unparseable { document: String, reason: String },
}

impl AlignmentError {
    fn into_issue(self, phase: Option<u32>) -> AlignmentIssue {
        let (document, message) = match self {
            AlignmentError::Unparseable {
                ref document,
                ref reason,
            } => (document.clone(), reason.clone()),
            AlignmentError::Io { ref path, .. } => (path.clone(), self.to_string()),
        };
        AlignmentIssue::new(
            IssueCode::UnparseableDocument,
            phase,
            message,
            vec![Location::new(document, None)],
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub path: String,
    pub text: String,
}

impl SourceDocument {
    pub fn new(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanKind {
    Work,
    Review,
}

impl PlanKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Work => "work",
            Self::Review => "review",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Work => "WORK_PLAN.md",
            Self::Review => "REVIEW_PLAN.md",
        }
    }
}

impl fmt::Display for PlanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanDocument {
    pub kind: PlanKind,
    pub source: SourceDocument,
}

/// The family of documents checked together.
#[derive(Debug, Clone, Default)]
pub struct DocumentSet {
    pub spec: Option<SourceDocument>,
    pub roadmap: Option<SourceDocument>,
    pub plans: Vec<PlanDocument>,
    /// Directory the documents were read from; link targets outside the
    /// set are looked up under it.
    pub root: Option<PathBuf>,
}

impl DocumentSet {
    pub fn new(spec: SourceDocument, roadmap: SourceDocument) -> Self {
        Self {
            spec: Some(spec),
            roadmap: Some(roadmap),
            plans: Vec::new(),
            root: None,
        }
    }

    /// Spec, roadmap, then plans in load order.
    pub fn documents(&self) -> impl Iterator<Item = &SourceDocument> {
        self.spec
            .iter()
            .chain(self.roadmap.iter())
            .chain(self.plans.iter().map(|p| &p.source))
    }

    pub fn with_plan(mut self, kind: PlanKind, plan: SourceDocument) -> Self {
        self.plans.push(PlanDocument { kind, source: plan });
        self
    }

    /// Read `SPEC.md`, `ROADMAP.md`, and `phase-*/{WORK,REVIEW}_PLAN.md`
    /// under `root`. Paths are recorded relative to `root`.
    pub fn from_dir(root: &Path) -> Result<Self, AlignmentError> {
        let read = |relative: &str| -> Result<Option<SourceDocument>, AlignmentError> {
            let path = root.join(relative);
            if !path.exists() {
                return Ok(None);
            }
            std::fs::read_to_string(&path)
                .map(|text| Some(SourceDocument::new(relative, text)))
                .map_err(|source| AlignmentError::Io {
                    path: path.display().to_string(),
                    source,
                })
        };

        let mut set = DocumentSet {
            spec: read("SPEC.md")?,
            roadmap: read("ROADMAP.md")?,
            plans: Vec::new(),
            root: Some(root.to_path_buf()),
        };

        let entries = std::fs::read_dir(root).map_err(|source| AlignmentError::Io {
            path: root.display().to_string(),
            source,
        })?;
        let mut phase_dirs: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|e| e.path().is_dir())
            .filter_map(|e| e.file_name().to_str().map(str::to_string))
            .filter(|name| name.starts_with("phase-"))
            .collect();
        phase_dirs.sort();

        for dir in phase_dirs {
            for kind in [PlanKind::Work, PlanKind::Review] {
                if let Some(source) = read(&format!("{dir}/{}", kind.file_name()))? {
                    set.plans.push(PlanDocument { kind, source });
                }
            }
        }
        debug!(plans = set.plans.len(), "document set loaded");
        Ok(set)
    }
}

/// A requirement defined in the spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequirementNode {
    pub id: String,
    pub document: String,
    pub line: usize,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum NodeId {
    Requirement { id: String },
    Phase { number: u32 },
    Checkpoint { phase: u32, plan: PlanKind, number: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Requirement → phase whose work plan references it.
    SatisfiedBy,
    /// Requirement → roadmap phase that schedules it.
    PlannedIn,
    /// Work-plan checkpoint → review-plan checkpoint with the same number.
    ReviewedBy,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Edge {
    pub from: NodeId,
    pub kind: EdgeKind,
    pub to: NodeId,
}

/// Requirements, phases, and checkpoints with the edges between them.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TraceabilityGraph {
    pub requirements: Vec<RequirementNode>,
    pub nodes: Vec<NodeId>,
    pub edges: Vec<Edge>,
}

impl TraceabilityGraph {
    pub fn edges_from<'a>(&'a self, node: &'a NodeId) -> impl Iterator<Item = &'a Edge> {
        self.edges.iter().filter(move |e| &e.from == node)
    }

    fn finish(mut self) -> Self {
        let mut nodes: Vec<NodeId> = self
            .edges
            .iter()
            .flat_map(|e| [e.from.clone(), e.to.clone()])
            .chain(
                self.requirements
                    .iter()
                    .map(|r| NodeId::Requirement { id: r.id.clone() }),
            )
            .chain(self.nodes.drain(..))
            .collect();
        nodes.sort();
        nodes.dedup();
        self.nodes = nodes;
        self.edges.sort();
        self.edges.dedup();
        self
    }
}

/// Result of one alignment run.
#[derive(Debug, Clone, Serialize)]
pub struct AlignmentReport {
    pub issues: Vec<AlignmentIssue>,
    pub graph: TraceabilityGraph,
}

#[derive(Debug)]
struct SpecIndex {
    requirements: Vec<RequirementNode>,
    defined: FxHashSet<String>,
}

#[derive(Debug, Clone)]
struct RoadmapPhase {
    number: u32,
    title: String,
    line: usize,
    /// First reference of each ID within the phase, in order.
    references: Vec<(String, usize)>,
}

#[derive(Debug, Clone)]
struct ParsedPlan {
    kind: PlanKind,
    path: String,
    phase: u32,
    title: String,
    checkpoints: Vec<(u32, usize)>,
    references: Vec<(String, usize)>,
}

fn parse_spec(doc: &SourceDocument) -> Result<(SpecIndex, Vec<AlignmentIssue>), AlignmentError> {
    let mut requirements: Vec<RequirementNode> = Vec::new();
    let mut first_seen: FxHashMap<String, usize> = FxHashMap::default();
    let mut issues = Vec::new();

    for (idx, line) in doc.text.lines().enumerate() {
        let Some(caps) = REQUIREMENT_DEFINITION.captures(line) else {
            continue;
        };
        let id = caps[1].to_string();
        let line_no = idx + 1;
        if let Some(&first) = first_seen.get(&id) {
            issues.push(AlignmentIssue::new(
                IssueCode::DuplicateRequirement,
                None,
                format!("requirement {id} is defined more than once in spec"),
                vec![
                    Location::new(doc.path.clone(), Some(first)),
                    Location::new(doc.path.clone(), Some(line_no)),
                ],
            ));
            continue;
        }
        first_seen.insert(id.clone(), line_no);
        requirements.push(RequirementNode {
            id,
            document: doc.path.clone(),
            line: line_no,
            description: caps.get(2).map(|m| m.as_str().trim().to_string()).unwrap_or_default(),
        });
    }

    if requirements.is_empty() {
        return Err(AlignmentError::Unparseable {
            document: doc.path.clone(),
            reason: "no requirement definitions (REQ-/FR-/NFR- headings) found".to_string(),
        });
    }
    let defined = requirements.iter().map(|r| r.id.clone()).collect();
    Ok((
        SpecIndex {
            requirements,
            defined,
        },
        issues,
    ))
}

fn references(text: &str, offset: usize) -> Vec<(String, usize)> {
    let mut seen = FxHashSet::default();
    let mut out = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        for m in REQUIREMENT_ID.find_iter(line) {
            if seen.insert(m.as_str().to_string()) {
                out.push((m.as_str().to_string(), offset + idx + 1));
            }
        }
    }
    out
}

fn parse_roadmap(doc: &SourceDocument) -> Result<Vec<RoadmapPhase>, AlignmentError> {
    let lines: Vec<&str> = doc.text.lines().collect();
    let starts: Vec<(usize, u32, String)> = lines
        .iter()
        .enumerate()
        .filter_map(|(idx, line)| {
            let caps = PHASE_HEADING.captures(line)?;
            let number = caps[1].parse().ok()?;
            Some((idx, number, caps[2].trim().to_string()))
        })
        .collect();

    if starts.is_empty() {
        return Err(AlignmentError::Unparseable {
            document: doc.path.clone(),
            reason: "no `Phase N` headings found".to_string(),
        });
    }

    let phases = starts
        .iter()
        .enumerate()
        .map(|(i, (start, number, title))| {
            let end = starts.get(i + 1).map(|s| s.0).unwrap_or(lines.len());
            let body = lines[*start..end].join("\n");
            RoadmapPhase {
                number: *number,
                title: title.clone(),
                line: start + 1,
                references: references(&body, *start),
            }
        })
        .collect();
    Ok(phases)
}

fn parse_plan(plan: &PlanDocument) -> Result<ParsedPlan, AlignmentError> {
    let doc = &plan.source;
    let header = doc
        .text
        .lines()
        .find_map(|line| PLAN_HEADER.captures(line))
        .ok_or_else(|| AlignmentError::Unparseable {
            document: doc.path.clone(),
            reason: "missing `# Phase N: Title` header".to_string(),
        })?;
    let phase = header[1].parse().map_err(|_| AlignmentError::Unparseable {
        document: doc.path.clone(),
        reason: format!("phase number `{}` out of range", &header[1]),
    })?;
    let title = header[2].trim().to_string();

    let checkpoints = doc
        .text
        .lines()
        .enumerate()
        .filter_map(|(idx, line)| {
            let caps = CHECKPOINT_HEADING.captures(line)?;
            Some((caps[1].parse().ok()?, idx + 1))
        })
        .collect();

    Ok(ParsedPlan {
        kind: plan.kind,
        path: doc.path.clone(),
        phase,
        title,
        checkpoints,
        references: references(&doc.text, 0),
    })
}

fn normalize(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Gaps in `1..=max` left by `numbers`, one range per gap. Work is
/// proportional to the count of distinct numbers, not their magnitude.
pub fn skipped_ranges(numbers: impl IntoIterator<Item = u32>) -> Vec<RangeInclusive<u32>> {
    let distinct: BTreeSet<u32> = numbers.into_iter().filter(|&n| n > 0).collect();
    let mut gaps = Vec::new();
    let mut next = 1u32;
    for n in distinct {
        if n > next {
            gaps.push(next..=n - 1);
        }
        next = n.saturating_add(1);
    }
    gaps
}

/// `checkpoint 4 is skipped` or `checkpoints 2..=9 are skipped`.
pub fn describe_skipped(gap: &RangeInclusive<u32>) -> String {
    if gap.start() == gap.end() {
        format!("checkpoint {} is skipped", gap.start())
    } else {
        format!("checkpoints {}..={} are skipped", gap.start(), gap.end())
    }
}

/// Duplicate and skipped checkpoint numbers within one plan.
fn numbering_issues(plan: &ParsedPlan) -> Vec<AlignmentIssue> {
    let mut issues = Vec::new();
    let mut by_number: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for &(number, line) in &plan.checkpoints {
        by_number.entry(number).or_default().push(line);
    }
    for (number, lines) in &by_number {
        if lines.len() > 1 {
            issues.push(AlignmentIssue::new(
                IssueCode::DuplicateCheckpoint,
                Some(plan.phase),
                format!(
                    "checkpoint {number} appears {} times in the {} plan for phase {}",
                    lines.len(),
                    plan.kind,
                    plan.phase
                ),
                lines
                    .iter()
                    .map(|&l| Location::new(plan.path.clone(), Some(l)))
                    .collect(),
            ));
        }
    }
    for gap in skipped_ranges(by_number.keys().copied()) {
        issues.push(AlignmentIssue::new(
            IssueCode::SkippedCheckpoint,
            Some(plan.phase),
            format!(
                "{} in the {} plan for phase {}",
                describe_skipped(&gap),
                plan.kind,
                plan.phase
            ),
            vec![Location::new(plan.path.clone(), None)],
        ));
    }
    issues
}

/// Every checkpoint occurrence in one plan without a counterpart in the other.
fn symmetry_issues(work: &ParsedPlan, review: &ParsedPlan) -> Vec<AlignmentIssue> {
    let mut issues = Vec::new();
    let counts = |plan: &ParsedPlan| {
        let mut counts: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
        for &(n, line) in &plan.checkpoints {
            counts.entry(n).or_default().push(line);
        }
        counts
    };
    let work_counts = counts(work);
    let review_counts = counts(review);

    for (code, from, from_counts, other, other_counts) in [
        (IssueCode::CheckpointMissingFromReview, work, &work_counts, review, &review_counts),
        (IssueCode::CheckpointMissingFromWork, review, &review_counts, work, &work_counts),
    ] {
        for (number, lines) in from_counts {
            let matched = other_counts.get(number).map(Vec::len).unwrap_or(0);
            for &line in lines.iter().skip(matched) {
                issues.push(AlignmentIssue::new(
                    code,
                    Some(from.phase),
                    format!(
                        "checkpoint {number} in the {} plan for phase {} has no counterpart in the {} plan",
                        from.kind, from.phase, other.kind
                    ),
                    vec![
                        Location::new(from.path.clone(), Some(line)),
                        Location::new(other.path.clone(), None),
                    ],
                ));
            }
        }
    }
    issues
}

/// Pairing, symmetry, numbering, and terminology checks for one phase.
fn phase_issues(
    phase: u32,
    roadmap: Option<&RoadmapPhase>,
    roadmap_path: &str,
    plans: &[&ParsedPlan],
) -> Vec<AlignmentIssue> {
    let mut issues = Vec::new();
    let work: Vec<&ParsedPlan> = plans.iter().copied().filter(|p| p.kind == PlanKind::Work).collect();
    let review: Vec<&ParsedPlan> = plans.iter().copied().filter(|p| p.kind == PlanKind::Review).collect();

    match roadmap {
        None => {
            for plan in plans {
                issues.push(AlignmentIssue::new(
                    IssueCode::UnknownPhasePlan,
                    Some(phase),
                    format!("{} plan for phase {phase} has no roadmap phase", plan.kind),
                    vec![Location::new(plan.path.clone(), Some(1))],
                ));
            }
        }
        Some(entry) => {
            let here = Location::new(roadmap_path.to_string(), Some(entry.line));
            for (kind, found, missing_code) in [
                (PlanKind::Work, &work, IssueCode::MissingWorkPlan),
                (PlanKind::Review, &review, IssueCode::MissingReviewPlan),
            ] {
                match found.len() {
                    0 => issues.push(AlignmentIssue::new(
                        missing_code,
                        Some(phase),
                        format!("roadmap phase {phase} has no {kind} plan"),
                        vec![here.clone()],
                    )),
                    1 => {}
                    n => issues.push(AlignmentIssue::new(
                        IssueCode::DuplicatePlan,
                        Some(phase),
                        format!("roadmap phase {phase} has {n} {kind} plans"),
                        found
                            .iter()
                            .map(|p| Location::new(p.path.clone(), Some(1)))
                            .collect(),
                    )),
                }
            }
            for plan in plans {
                if normalize(&plan.title) != normalize(&entry.title) {
                    issues.push(AlignmentIssue::new(
                        IssueCode::TerminologyDrift,
                        Some(phase),
                        format!(
                            "{} plan calls phase {phase} \"{}\", roadmap calls it \"{}\"",
                            plan.kind, plan.title, entry.title
                        ),
                        vec![Location::new(plan.path.clone(), Some(1)), here.clone()],
                    ));
                }
            }
        }
    }

    for plan in plans {
        issues.extend(numbering_issues(plan));
    }
    if let ([work], [review]) = (work.as_slice(), review.as_slice()) {
        issues.extend(symmetry_issues(work, review));
    }
    issues
}

/// Run every alignment check and build the traceability graph.
pub fn check(documents: &DocumentSet) -> AlignmentReport {
    let mut issues: Vec<AlignmentIssue> = Vec::new();
    let mut graph = TraceabilityGraph::default();

    let spec = match documents.spec.as_ref().map(parse_spec) {
        Some(Ok((index, duplicates))) => {
            issues.extend(duplicates);
            Some(index)
        }
        Some(Err(e)) => {
            issues.push(e.into_issue(None));
            None
        }
        None => {
            issues.push(missing_document("SPEC.md"));
            None
        }
    };

    let roadmap_path = documents
        .roadmap
        .as_ref()
        .map(|d| d.path.clone())
        .unwrap_or_else(|| "ROADMAP.md".to_string());
    let roadmap = match documents.roadmap.as_ref().map(parse_roadmap) {
        Some(Ok(phases)) => Some(phases),
        Some(Err(e)) => {
            issues.push(e.into_issue(None));
            None
        }
        None => {
            issues.push(missing_document("ROADMAP.md"));
            None
        }
    };

    let mut plans: Vec<ParsedPlan> = Vec::new();
    for plan in &documents.plans {
        match parse_plan(plan) {
            Ok(parsed) => plans.push(parsed),
            Err(e) => issues.push(e.into_issue(None)),
        }
    }

    if let Some(ref spec) = spec {
        graph.requirements = spec.requirements.clone();
    }

    // Orphans and unplanned requirements.
    if let (Some(spec), Some(phases)) = (&spec, &roadmap) {
        let mut planned: FxHashSet<&str> = FxHashSet::default();
        for phase in phases {
            for (id, line) in &phase.references {
                if spec.defined.contains(id) {
                    planned.insert(id.as_str());
                    graph.edges.push(Edge {
                        from: NodeId::Requirement { id: id.clone() },
                        kind: EdgeKind::PlannedIn,
                        to: NodeId::Phase {
                            number: phase.number,
                        },
                    });
                } else {
                    issues.push(AlignmentIssue::new(
                        IssueCode::OrphanRequirement,
                        Some(phase.number),
                        format!(
                            "orphaned requirement {id} referenced in roadmap phase {}, not found in spec",
                            phase.number
                        ),
                        vec![Location::new(roadmap_path.clone(), Some(*line))],
                    ));
                }
            }
        }
        for req in &spec.requirements {
            if !planned.contains(req.id.as_str()) {
                issues.push(AlignmentIssue::new(
                    IssueCode::UnplannedRequirement,
                    None,
                    format!("requirement {} is defined in spec but planned in no roadmap phase", req.id),
                    vec![Location::new(req.document.clone(), Some(req.line))],
                ));
            }
        }
    }
    if let Some(ref spec) = spec {
        for plan in &plans {
            for (id, line) in &plan.references {
                if spec.defined.contains(id) {
                    if plan.kind == PlanKind::Work {
                        graph.edges.push(Edge {
                            from: NodeId::Requirement { id: id.clone() },
                            kind: EdgeKind::SatisfiedBy,
                            to: NodeId::Phase { number: plan.phase },
                        });
                    }
                } else {
                    issues.push(AlignmentIssue::new(
                        IssueCode::OrphanRequirement,
                        Some(plan.phase),
                        format!(
                            "orphaned requirement {id} referenced in {} plan for phase {}, not found in spec",
                            plan.kind, plan.phase
                        ),
                        vec![Location::new(plan.path.clone(), Some(*line))],
                    ));
                }
            }
        }
    }

    // Per-phase checks are independent of each other.
    let mut by_phase: BTreeMap<u32, Vec<&ParsedPlan>> = BTreeMap::new();
    if let Some(ref phases) = roadmap {
        for phase in phases {
            by_phase.entry(phase.number).or_default();
            graph.nodes.push(NodeId::Phase {
                number: phase.number,
            });
        }
    }
    for plan in &plans {
        by_phase.entry(plan.phase).or_default().push(plan);
    }
    let roadmap_index: FxHashMap<u32, &RoadmapPhase> = roadmap
        .iter()
        .flatten()
        .map(|p| (p.number, p))
        .collect();
    let roadmap_known = roadmap.is_some();
    let phase_results: Vec<Vec<AlignmentIssue>> = by_phase
        .par_iter()
        .map(|(&phase, plans)| {
            let entry = roadmap_index.get(&phase).copied();
            if entry.is_none() && roadmap_known {
                phase_issues(phase, None, &roadmap_path, plans)
            } else if entry.is_none() {
                // Without a roadmap, only the plans themselves can be checked.
                phase_issues_without_roadmap(plans)
            } else {
                phase_issues(phase, entry, &roadmap_path, plans)
            }
        })
        .collect();
    issues.extend(phase_results.into_iter().flatten());

    for plan in &plans {
        for &(number, _) in &plan.checkpoints {
            let node = NodeId::Checkpoint {
                phase: plan.phase,
                plan: plan.kind,
                number,
            };
            if plan.kind == PlanKind::Work
                && plans.iter().any(|p| {
                    p.kind == PlanKind::Review
                        && p.phase == plan.phase
                        && p.checkpoints.iter().any(|&(n, _)| n == number)
                })
            {
                graph.edges.push(Edge {
                    from: node.clone(),
                    kind: EdgeKind::ReviewedBy,
                    to: NodeId::Checkpoint {
                        phase: plan.phase,
                        plan: PlanKind::Review,
                        number,
                    },
                });
            }
            graph.nodes.push(node);
        }
    }

    issues.extend(links::link_issues(documents));

    issues.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    issues.dedup();
    let errors = issues.iter().filter(|i| i.is_error()).count();
    info!(
        issues = issues.len(),
        errors,
        warnings = issues.len() - errors,
        "alignment checked"
    );
    AlignmentReport {
        issues,
        graph: graph.finish(),
    }
}

/// The issue list for a document set.
pub fn validate_alignment(documents: &DocumentSet) -> Vec<AlignmentIssue> {
    check(documents).issues
}

fn phase_issues_without_roadmap(plans: &[&ParsedPlan]) -> Vec<AlignmentIssue> {
    let mut issues: Vec<AlignmentIssue> = plans.iter().flat_map(|p| numbering_issues(p)).collect();
    let work: Vec<&&ParsedPlan> = plans.iter().filter(|p| p.kind == PlanKind::Work).collect();
    let review: Vec<&&ParsedPlan> = plans.iter().filter(|p| p.kind == PlanKind::Review).collect();
    if let ([work], [review]) = (work.as_slice(), review.as_slice()) {
        issues.extend(symmetry_issues(work, review));
    }
    issues
}

fn missing_document(name: &str) -> AlignmentIssue {
    AlignmentError::Unparseable {
        document: name.to_string(),
        reason: "document is missing".to_string(),
    }
    .into_issue(None)
}
