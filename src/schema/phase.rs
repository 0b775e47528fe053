use serde::{Deserialize, Serialize};

/// A phase configuration document: the complete content of one phase's
/// plans. Renderers only format what is here; they never invent content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseConfig {
    /// Schema version the author wrote against, e.g. `"1.0"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
    pub phase: PhaseInfo,
    pub prerequisites: Prerequisites,
    pub resources: Resources,
    pub work_breakdown: Vec<WorkSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overview: Option<Overview>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_commands: Option<BuildCommands>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_process: Option<ReviewProcess>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub methodology: Option<Methodology>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_criteria: Option<DoneCriteria>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub troubleshooting: Option<Troubleshooting>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_requirements: Option<SecurityRequirements>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learning_path: Option<LearningPath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_phase: Option<NextPhase>,
    /// Only source of a date in rendered output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_on: Option<String>,
}

impl PhaseConfig {
    pub fn phase_number(&self) -> u32 {
        self.phase.number
    }

    /// Checkpoints in work-breakdown order.
    pub fn checkpoints(&self) -> impl Iterator<Item = &Checkpoint> {
        self.work_breakdown
            .iter()
            .filter_map(|section| section.checkpoint.as_ref())
    }

    /// Total number of tasks across all work sections.
    pub fn task_count(&self) -> usize {
        self.work_breakdown.iter().map(|s| s.tasks.len()).sum()
    }
}

/// Phase metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseInfo {
    pub number: u32,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative_overview: Option<String>,
    #[serde(default)]
    pub critical_requirements: Vec<String>,
    /// Requirement IDs (e.g. `FR-001`) this phase delivers.
    #[serde(default)]
    pub requirements: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prerequisites {
    pub intro_narrative: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_phases: Option<CompletedPhases>,
    #[serde(default)]
    pub knowledge_areas: Vec<KnowledgeArea>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedPhases {
    pub required: String,
    pub descriptions: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeArea {
    pub area: String,
    pub description: String,
    pub importance: Importance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Importance {
    Essential,
    Recommended,
    Optional,
}

impl Importance {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Essential => "Essential",
            Self::Recommended => "Recommended",
            Self::Optional => "Optional",
        }
    }
}

/// References to files, specifications, guides, and commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resources {
    pub intro_narrative: String,
    #[serde(default)]
    pub example_files: Vec<ExampleFile>,
    #[serde(default)]
    pub specifications: Vec<SpecificationRef>,
    #[serde(default)]
    pub junior_dev_guides: Vec<GuideRef>,
    #[serde(default)]
    pub quick_links: Vec<QuickLink>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExampleFile {
    pub name: String,
    pub path: String,
    pub description: String,
    pub purpose: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecificationRef {
    pub name: String,
    pub path: String,
    pub description: String,
    #[serde(default)]
    pub key_sections: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuideRef {
    pub name: String,
    pub path: String,
    pub description: String,
    pub when_to_read: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuickLink {
    pub name: String,
    pub command: String,
    pub purpose: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Overview {
    pub narrative: String,
    pub checkpoint_summary: String,
    pub time_estimate: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildCommands {
    pub intro_narrative: String,
    pub tool: String,
    pub commands: Vec<BuildCommand>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildCommand {
    pub command: String,
    pub description: String,
    pub when_to_use: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewProcess {
    pub importance_narrative: String,
    pub checkpoint_procedure: CheckpointProcedure,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointProcedure {
    pub stop_instructions: String,
    pub review_preparation: Vec<String>,
    pub wait_instructions: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Methodology {
    pub approach: String,
    pub importance_narrative: String,
    pub rules: Vec<MethodologyRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodologyRule {
    pub step: String,
    pub description: String,
    pub rationale: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoneCriteria {
    pub intro_narrative: String,
    pub checklist: Vec<DoneCriterion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoneCriterion {
    pub criterion: String,
    pub verification_method: String,
}

/// One numbered block of the work breakdown: context, tasks, and an
/// optional closing checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkSection {
    pub section_number: String,
    pub title: String,
    pub work_unit_context: WorkUnitContext,
    pub tasks: Vec<Task>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<Checkpoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkUnitContext {
    pub complexity: Complexity,
    pub complexity_reason: String,
    pub scope: Scope,
    #[serde(default)]
    pub key_components: Vec<KeyComponent>,
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub algorithms: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl Complexity {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scope {
    pub estimated_lines: String,
    pub file_count: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyComponent {
    pub name: String,
    pub estimated_lines: String,
    pub purpose: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub number: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub tips: Vec<Tip>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tdd_instructions: Option<String>,
    #[serde(default)]
    pub code_examples: Vec<CodeExample>,
    #[serde(default)]
    pub special_considerations: Vec<String>,
    /// Requirement IDs this task implements.
    #[serde(default)]
    pub requirements: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tip {
    #[serde(rename = "type")]
    pub kind: TipKind,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_link: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TipKind {
    JuniorDev,
    Warning,
    Security,
    Performance,
}

impl TipKind {
    /// Label used in rendered tips, e.g. "Junior Dev Tip".
    pub fn label(&self) -> &'static str {
        match self {
            Self::JuniorDev => "Junior Dev",
            Self::Warning => "Warning",
            Self::Security => "Security",
            Self::Performance => "Performance",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeExample {
    pub purpose: String,
    pub language: String,
    pub code: String,
    pub explanation: String,
}

/// A stop point inside a work plan. The paired review plan renders a
/// review block for every checkpoint with the same number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub number: u32,
    pub title: String,
    pub deliverables: Vec<String>,
    pub verification_steps: Vec<String>,
    #[serde(default)]
    pub common_issues: Vec<CommonIssue>,
    /// What the reviewer looks at. Required by the review plan renderer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_focus: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommonIssue {
    pub issue: String,
    pub solution: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Troubleshooting {
    pub intro_narrative: String,
    pub common_issues: Vec<IssueCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation_path: Option<EscalationPath>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueCategory {
    pub category: String,
    pub issues: Vec<Symptom>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symptom {
    pub symptom: String,
    pub cause: String,
    pub solution: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationPath {
    pub when_stuck: String,
    pub documentation_requirements: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityRequirements {
    pub importance_narrative: String,
    pub categories: Vec<SecurityCategory>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityCategory {
    pub name: String,
    pub requirements: Vec<SecurityRequirement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation_guidance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub testing_approach: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityRequirement {
    #[serde(rename = "type")]
    pub level: RequirementLevel,
    pub requirement: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

/// RFC 2119 keyword attached to a security requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequirementLevel {
    Must,
    Should,
    May,
}

impl RequirementLevel {
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Must => "MUST",
            Self::Should => "SHOULD",
            Self::May => "MAY",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningPath {
    pub target_audience: String,
    pub intro_narrative: String,
    pub progression: Vec<LearningStep>,
    #[serde(default)]
    pub key_warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningStep {
    pub step: u32,
    pub focus: String,
    pub resources: Vec<String>,
    pub estimated_time: String,
    pub practical_exercise: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextPhase {
    pub number: u32,
    pub title: String,
    pub preview_narrative: String,
    #[serde(default)]
    pub key_features: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tip_kind_uses_snake_case() {
        let tip: Tip = serde_json::from_str(
            r#"{"type": "junior_dev", "content": "Start with the parser."}"#,
        )
        .unwrap();
        assert_eq!(tip.kind, TipKind::JuniorDev);
        assert_eq!(tip.kind.label(), "Junior Dev");
        assert!(tip.resource_link.is_none());
    }

    #[test]
    fn requirement_level_uses_keywords() {
        let req: SecurityRequirement = serde_json::from_str(
            r#"{"type": "MUST", "requirement": "Validate all inputs"}"#,
        )
        .unwrap();
        assert_eq!(req.level, RequirementLevel::Must);
        assert_eq!(req.level.keyword(), "MUST");
    }

    #[test]
    fn checkpoint_review_focus_is_optional() {
        let cp: Checkpoint = serde_json::from_str(
            r#"{"number": 1, "title": "Parser", "deliverables": [], "verification_steps": []}"#,
        )
        .unwrap();
        assert_eq!(cp.number, 1);
        assert!(cp.review_focus.is_none());
        assert!(cp.common_issues.is_empty());
    }

    #[test]
    fn complexity_labels() {
        assert_eq!(Complexity::Low.label(), "Low");
        assert_eq!(Complexity::High.label(), "High");
        assert_eq!(Importance::Essential.label(), "Essential");
    }
}
