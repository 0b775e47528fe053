//! Narrative Docs: deterministic phase-plan generation and document QA.
//!
//! Validates phase configs against a published schema, renders them into
//! work and review plans through a hook pipeline, scores documents against
//! weighted rubrics, and checks a spec, roadmap, and plan family for
//! cross-document alignment.

pub mod core;
pub mod schema;

pub use crate::core::alignment::{validate_alignment, DocumentSet};
pub use crate::core::loader::ConfigLoader;
pub use crate::core::pipeline::NarrativeGenerator;
pub use crate::core::rubric::Rubric;
pub use crate::core::scorer::score;
