/// Alignment integration tests: generated plans checked against a spec and roadmap on disk.
use narrative_docs::core::alignment::{self, DocumentSet, EdgeKind, NodeId};
use narrative_docs::core::lifecycle::{check_alignment, ProjectRun, ProjectState};
use narrative_docs::core::settings::Settings;
use narrative_docs::schema::issue::{IssueCode, Severity};
use pretty_assertions::assert_eq;
use std::path::Path;

const SPEC: &str = "\
# Authentication Service Spec

## Functional Requirements

### REQ-AUTH-001: Password login
Users log in with email and password.
Acceptance: valid credentials return a session within 200 ms.

### REQ-AUTH-002: Session expiry
Sessions expire after 30 minutes of inactivity.
";

fn roadmap(phase_three_refs: &str) -> String {
    format!(
        "# Roadmap\n\n## Phase 3: Authentication\n\nDelivers {phase_three_refs}.\n"
    )
}

/// Generate phase 3 plans from the fixture and lay out a project directory.
fn project_dir(spec: &str, roadmap: &str) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("SPEC.md"), spec).unwrap();
    std::fs::write(dir.path().join("ROADMAP.md"), roadmap).unwrap();
    std::fs::create_dir(dir.path().join("phase-3")).unwrap();
    // The fixture's resources link to this example file.
    std::fs::create_dir_all(dir.path().join("examples/auth")).unwrap();
    std::fs::write(dir.path().join("examples/auth/login.rs"), "fn login() {}\n").unwrap();

    let run = ProjectRun::from_settings(&Settings::default()).unwrap();
    let phase = run
        .run_phase(Path::new("tests/fixtures/scenario_a.json"))
        .unwrap();
    phase.write_to(dir.path()).unwrap();
    dir
}

#[test]
fn generated_plans_align_with_spec_and_roadmap() {
    let dir = project_dir(SPEC, &roadmap("REQ-AUTH-001 and REQ-AUTH-002"));
    let documents = DocumentSet::from_dir(dir.path()).unwrap();
    assert_eq!(documents.plans.len(), 2);

    let (state, report) = check_alignment(ProjectState::Approved, &documents).unwrap();
    assert_eq!(report.issues, vec![]);
    assert_eq!(state, ProjectState::Aligned);

    let requirement = NodeId::Requirement {
        id: "REQ-AUTH-001".to_string(),
    };
    let kinds: Vec<EdgeKind> = report.graph.edges_from(&requirement).map(|e| e.kind).collect();
    assert!(kinds.contains(&EdgeKind::PlannedIn));
    assert!(kinds.contains(&EdgeKind::SatisfiedBy));
    let reviewed = report
        .graph
        .edges
        .iter()
        .filter(|e| e.kind == EdgeKind::ReviewedBy)
        .count();
    assert_eq!(reviewed, 2);
}

#[test]
fn undefined_roadmap_requirement_is_one_orphan_error() {
    let dir = project_dir(
        SPEC,
        &roadmap("REQ-AUTH-001, REQ-AUTH-002, and REQ-AUTH-007"),
    );
    let issues = alignment::validate_alignment(&DocumentSet::from_dir(dir.path()).unwrap());

    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].severity, Severity::Error);
    assert_eq!(issues[0].code, IssueCode::OrphanRequirement);
    assert_eq!(
        issues[0].message,
        "orphaned requirement REQ-AUTH-007 referenced in roadmap phase 3, not found in spec"
    );
    assert_eq!(issues[0].locations[0].document, "ROADMAP.md");
}

#[test]
fn spec_requirement_missing_from_roadmap_is_one_error() {
    let spec = format!("{SPEC}\n### REQ-AUTH-003: Lockout\nLock after 5 failed attempts.\n");
    let dir = project_dir(&spec, &roadmap("REQ-AUTH-001 and REQ-AUTH-002"));
    let issues = alignment::validate_alignment(&DocumentSet::from_dir(dir.path()).unwrap());

    let errors: Vec<_> = issues.iter().filter(|i| i.is_error()).collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, IssueCode::UnplannedRequirement);
    assert!(errors[0].message.contains("REQ-AUTH-003"));
}

#[test]
fn hand_edited_review_plan_loses_a_checkpoint() {
    let dir = project_dir(SPEC, &roadmap("REQ-AUTH-001 and REQ-AUTH-002"));
    let review_path = dir.path().join("phase-3/REVIEW_PLAN.md");
    let review = std::fs::read_to_string(&review_path).unwrap();
    let cut = review.find("### CHECKPOINT 2").unwrap();
    std::fs::write(&review_path, &review[..cut]).unwrap();

    let documents = DocumentSet::from_dir(dir.path()).unwrap();
    let (state, report) = check_alignment(ProjectState::ConditionalApproval, &documents).unwrap();
    assert_eq!(state, ProjectState::MisalignedPendingFix);
    assert_eq!(report.issues.len(), 1);
    assert_eq!(report.issues[0].code, IssueCode::CheckpointMissingFromReview);
    assert!(report.issues[0].message.starts_with("checkpoint 2 "));

    assert_eq!(state.revise().unwrap(), ProjectState::Draft);
}

#[test]
fn roadmap_phase_without_plans_is_reported() {
    let dir = project_dir(
        SPEC,
        "# Roadmap\n\n## Phase 2: Storage\n\nREQ-AUTH-001\n\n## Phase 3: Authentication\n\nREQ-AUTH-002\n",
    );
    let issues = alignment::validate_alignment(&DocumentSet::from_dir(dir.path()).unwrap());
    let codes: Vec<IssueCode> = issues.iter().map(|i| i.code).collect();
    assert_eq!(
        codes,
        vec![IssueCode::MissingWorkPlan, IssueCode::MissingReviewPlan]
    );
    assert!(issues.iter().all(|i| i.phase == Some(2)));
}

#[test]
fn dangling_links_are_warnings() {
    let roadmap = format!(
        "{}\nDetails in [the spec](SPEC.md#req-auth-002-session-expiry), \
         [lockout](SPEC.md#req-auth-003-lockout) and [design](docs/design.md).\n",
        roadmap("REQ-AUTH-001 and REQ-AUTH-002")
    );
    let dir = project_dir(SPEC, &roadmap);
    std::fs::remove_file(dir.path().join("examples/auth/login.rs")).unwrap();

    let documents = DocumentSet::from_dir(dir.path()).unwrap();
    let (state, report) = check_alignment(ProjectState::Approved, &documents).unwrap();
    assert_eq!(state, ProjectState::Aligned);

    let mut messages: Vec<(&str, &str)> = report
        .issues
        .iter()
        .map(|i| {
            assert_eq!(i.code, IssueCode::BrokenLink);
            assert_eq!(i.severity, Severity::Warning);
            (i.locations[0].document.as_str(), i.message.as_str())
        })
        .collect();
    messages.sort();
    assert_eq!(
        messages,
        vec![
            ("ROADMAP.md", "anchor '#req-auth-003-lockout' not found in SPEC.md (linked from ROADMAP.md)"),
            ("ROADMAP.md", "broken link 'docs/design.md' in ROADMAP.md: file not found"),
            ("phase-3/WORK_PLAN.md", "broken link 'examples/auth/login.rs' in phase-3/WORK_PLAN.md: file not found"),
        ]
    );
}

#[test]
fn repeated_runs_give_identical_reports() {
    let dir = project_dir(SPEC, &roadmap("REQ-AUTH-001, REQ-AUTH-009"));
    let documents = DocumentSet::from_dir(dir.path()).unwrap();
    let first = alignment::validate_alignment(&documents);
    let second = alignment::validate_alignment(&DocumentSet::from_dir(dir.path()).unwrap());
    assert!(!first.is_empty());
    assert_eq!(first, second);
}
