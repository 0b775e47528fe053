/// Project lifecycle: the state machine a phase moves through and the
/// orchestration that drives validate → generate → score.
use rayon::prelude::*;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::core::alignment::{self, AlignmentReport, DocumentSet};
use crate::core::doc_types::{ReviewPlan, WorkPlan};
use crate::core::loader::{ConfigLoader, LoaderError, SchemaErrors, Validated};
use crate::core::pipeline::{GenerationError, NarrativeGenerator, RenderedDocument};
use crate::core::rubric::Rubric;
use crate::core::scorer::{self, Classification, ScoreComputationError, ScoreReport};
use crate::core::settings::Settings;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("invalid state transition from {from} to {to}")]
    InvalidTransition {
        from: ProjectState,
        to: ProjectState,
    },
    #[error(transparent)]
    Loader(#[from] LoaderError),
    #[error(transparent)]
    Schema(#[from] SchemaErrors),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Score(#[from] ScoreComputationError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectState {
    Draft,
    Validated,
    Generated,
    Scored,
    Approved,
    ConditionalApproval,
    Rejected,
    AlignmentChecked,
    Aligned,
    MisalignedPendingFix,
}

impl ProjectState {
    /// Valid next states from the current state.
    #[must_use]
    pub const fn allowed_next_states(self) -> &'static [Self] {
        match self {
            Self::Draft => &[Self::Validated],
            Self::Validated => &[Self::Generated],
            Self::Generated => &[Self::Scored],
            Self::Scored => &[Self::Approved, Self::ConditionalApproval, Self::Rejected],
            Self::Approved | Self::ConditionalApproval => &[Self::AlignmentChecked],
            Self::AlignmentChecked => &[Self::Aligned, Self::MisalignedPendingFix],
            Self::Rejected | Self::MisalignedPendingFix => &[Self::Draft],
            Self::Aligned => &[],
        }
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.allowed_next_states().contains(&next)
    }

    pub fn advance(self, next: Self) -> Result<Self, LifecycleError> {
        if self.can_transition_to(next) {
            debug!(from = %self, to = %next, "state transition");
            Ok(next)
        } else {
            Err(LifecycleError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    /// Back to `Draft` after manual edits. Only rejected or misaligned
    /// projects are revised; nothing retries on its own.
    pub fn revise(self) -> Result<Self, LifecycleError> {
        match self {
            Self::Rejected | Self::MisalignedPendingFix => self.advance(Self::Draft),
            other => Err(LifecycleError::InvalidTransition {
                from: other,
                to: Self::Draft,
            }),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Validated => "validated",
            Self::Generated => "generated",
            Self::Scored => "scored",
            Self::Approved => "approved",
            Self::ConditionalApproval => "conditional_approval",
            Self::Rejected => "rejected",
            Self::AlignmentChecked => "alignment_checked",
            Self::Aligned => "aligned",
            Self::MisalignedPendingFix => "misaligned_pending_fix",
        }
    }
}

impl fmt::Display for ProjectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Classification> for ProjectState {
    fn from(classification: Classification) -> Self {
        match classification {
            Classification::Approved => Self::Approved,
            Classification::ConditionalApproval => Self::ConditionalApproval,
            Classification::Rejected => Self::Rejected,
        }
    }
}

/// Everything one phase produced on its way through the pipeline.
#[derive(Debug)]
pub struct PhaseRun {
    pub state: ProjectState,
    pub validated: Validated,
    pub work_plan: RenderedDocument,
    pub review_plan: RenderedDocument,
    /// Score of the work plan.
    pub score: ScoreReport,
}

impl PhaseRun {
    pub fn phase(&self) -> u32 {
        self.work_plan.phase
    }

    pub fn documents(&self) -> [&RenderedDocument; 2] {
        [&self.work_plan, &self.review_plan]
    }

    /// Write both plans under `root`, work plan first. Each file is
    /// written atomically; a failure stops before the next file.
    pub fn write_to(&self, root: &Path) -> Result<Vec<PathBuf>, GenerationError> {
        self.documents()
            .into_iter()
            .map(|doc| doc.write_to(root))
            .collect()
    }
}

/// Drives validate → generate → score with one loader, one generator per
/// plan kind, and one rubric.
pub struct ProjectRun {
    loader: ConfigLoader,
    work: NarrativeGenerator,
    review: NarrativeGenerator,
    rubric: Rubric,
}

impl ProjectRun {
    pub fn new(
        loader: ConfigLoader,
        work: NarrativeGenerator,
        review: NarrativeGenerator,
        rubric: Rubric,
    ) -> Self {
        Self {
            loader,
            work,
            review,
            rubric,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, LifecycleError> {
        let loader = ConfigLoader::new()?.mode(settings.run_mode);
        let mut work = NarrativeGenerator::builder(WorkPlan);
        let mut review = NarrativeGenerator::builder(ReviewPlan);
        if let Some(dir) = &settings.templates_dir {
            work = work.templates_dir(dir);
            review = review.templates_dir(dir);
        }
        Ok(Self::new(
            loader,
            work.build()?,
            review.build()?,
            settings.rubric()?,
        ))
    }

    pub fn rubric(&self) -> &Rubric {
        &self.rubric
    }

    pub fn loader(&self) -> &ConfigLoader {
        &self.loader
    }

    /// Run one config file through the pipeline.
    pub fn run_phase(&self, path: &Path) -> Result<PhaseRun, LifecycleError> {
        let validated = self.loader.load_file(path)?;
        self.run_validated(validated)
    }

    /// Run an already-parsed JSON config.
    pub fn run_value(&self, document: &str, instance: &Value) -> Result<PhaseRun, LifecycleError> {
        let validated = self.loader.validate(document, instance)?;
        self.run_validated(validated)
    }

    fn run_validated(&self, validated: Validated) -> Result<PhaseRun, LifecycleError> {
        let mut state = ProjectState::Draft.advance(ProjectState::Validated)?;

        let work_plan = self.work.generate(&validated.config)?;
        let review_plan = self.review.generate(&validated.config)?;
        state = state.advance(ProjectState::Generated)?;

        let score = scorer::score(
            &work_plan.relative_path.display().to_string(),
            &work_plan.text,
            &self.rubric,
        )?;
        state = state
            .advance(ProjectState::Scored)?
            .advance(score.classification.into())?;
        info!(
            phase = work_plan.phase,
            total = score.total,
            state = %state,
            "phase run complete"
        );

        Ok(PhaseRun {
            state,
            validated,
            work_plan,
            review_plan,
            score,
        })
    }

    /// Run independent phase configs in parallel. Successful runs come
    /// back ordered by phase number, then failed configs ordered by path;
    /// a failure in one never affects the others.
    pub fn run_phases(&self, paths: &[PathBuf]) -> Vec<(PathBuf, Result<PhaseRun, LifecycleError>)> {
        let mut results: Vec<_> = paths
            .par_iter()
            .map(|path| (path.clone(), self.run_phase(path)))
            .collect();
        results.sort_by(|(a_path, a), (b_path, b)| {
            let key = |r: &Result<PhaseRun, LifecycleError>| match r {
                Ok(run) => (0, run.phase()),
                Err(_) => (1, 0),
            };
            key(a).cmp(&key(b)).then_with(|| a_path.cmp(b_path))
        });
        results
    }
}

/// Check a document set once the project has been approved.
pub fn check_alignment(
    state: ProjectState,
    documents: &DocumentSet,
) -> Result<(ProjectState, AlignmentReport), LifecycleError> {
    let checked = state.advance(ProjectState::AlignmentChecked)?;
    let report = alignment::check(documents);
    let next = if report.issues.iter().any(|i| i.is_error()) {
        ProjectState::MisalignedPendingFix
    } else {
        ProjectState::Aligned
    };
    Ok((checked.advance(next)?, report))
}
