/// The narrative generator: validated config → ordered sections → document.
///
/// A document type declares its section layout and implements whichever
/// hooks it needs. The generator walks the layout, decides presence for
/// optional sections, dispatches hooks, and guards the output against
/// unresolved placeholders. Adding a document type never touches this file.
use rayon::prelude::*;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::placeholder;
use crate::core::template::{TemplateError, TemplateSet};
use crate::schema::phase::{Checkpoint, PhaseConfig, Task, WorkSection};

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("hook `{hook}` requires missing field `{key}`")]
    MissingField { hook: Hook, key: String },
    #[error("hook `{hook}` produced unresolved placeholder `{marker}`")]
    UnresolvedPlaceholder { hook: Hook, marker: String },
    #[error("hook `{hook}` uses unknown template `{name}`")]
    MissingTemplate { hook: Hook, name: String },
    #[error("template error: {0}")]
    Template(#[from] TemplateError),
    #[error("cannot build render scope: {0}")]
    Scope(#[from] serde_json::Error),
    #[error("output directory does not exist: {0}")]
    MissingDirectory(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Named extension points, in pipeline vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Hook {
    Header,
    Prerequisites,
    Resources,
    Overview,
    BuildCommands,
    ReviewProcess,
    Methodology,
    DoneCriteria,
    WorkBreakdown,
    Troubleshooting,
    Security,
    LearningPath,
    NextPhase,
    Footer,
}

impl Hook {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Header => "header",
            Self::Prerequisites => "prerequisites",
            Self::Resources => "resources",
            Self::Overview => "overview",
            Self::BuildCommands => "build_commands",
            Self::ReviewProcess => "review_process",
            Self::Methodology => "methodology",
            Self::DoneCriteria => "done_criteria",
            Self::WorkBreakdown => "work_breakdown",
            Self::Troubleshooting => "troubleshooting",
            Self::Security => "security",
            Self::LearningPath => "learning_path",
            Self::NextPhase => "next_phase",
            Self::Footer => "footer",
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One slot in a document layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionDescriptor {
    /// Always rendered.
    Required(Hook),
    /// Rendered only when the config carries `key`.
    Optional { hook: Hook, key: &'static str },
}

impl SectionDescriptor {
    pub fn hook(&self) -> Hook {
        match *self {
            Self::Required(hook) | Self::Optional { hook, .. } => hook,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    Required,
    Optional { present: bool },
}

/// A rendered content block. Absent optional sections have empty text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub hook: Hook,
    pub presence: Presence,
    pub text: String,
}

pub type HookResult = Result<Option<String>, GenerationError>;

/// What a hook sees: the typed config, its JSON scope, and the templates
/// of the document type being rendered.
pub struct HookContext<'a> {
    pub config: &'a PhaseConfig,
    scope: &'a Value,
    templates: &'a TemplateSet,
    hook: Hook,
}

impl<'a> HookContext<'a> {
    pub fn hook(&self) -> Hook {
        self.hook
    }

    /// Render the named template against the config.
    pub fn text(&self, name: &str) -> Result<String, GenerationError> {
        self.text_with(name, &Value::Null)
    }

    /// Render the named template with `local` bindings layered over the config.
    pub fn text_with(&self, name: &str, local: &Value) -> Result<String, GenerationError> {
        let template = self.templates.get(name).map_err(|_| GenerationError::MissingTemplate {
            hook: self.hook,
            name: name.to_string(),
        })?;
        template
            .render_layered(&[local, self.scope])
            .map_err(|e| match e {
                TemplateError::Unresolved(key) => GenerationError::MissingField {
                    hook: self.hook,
                    key,
                },
                other => GenerationError::Template(other),
            })
    }

    /// Unwrap a field this hook cannot render without.
    pub fn require<'b, T>(&self, value: Option<&'b T>, key: &str) -> Result<&'b T, GenerationError> {
        value.ok_or_else(|| GenerationError::MissingField {
            hook: self.hook,
            key: key.to_string(),
        })
    }
}

/// A document type: a layout plus any subset of hooks. Unimplemented hooks
/// render nothing.
pub trait DocumentType: Send + Sync {
    /// Stable name, also the stem of the template file that overrides defaults.
    fn name(&self) -> &'static str;

    /// File name inside `phase-N/`.
    fn file_name(&self) -> &'static str;

    fn layout(&self) -> Vec<SectionDescriptor>;

    fn default_templates(&self) -> Result<TemplateSet, TemplateError>;

    fn header(&self, _cx: &HookContext<'_>) -> HookResult {
        Ok(None)
    }
    fn prerequisites(&self, _cx: &HookContext<'_>) -> HookResult {
        Ok(None)
    }
    fn resources(&self, _cx: &HookContext<'_>) -> HookResult {
        Ok(None)
    }
    fn overview(&self, _cx: &HookContext<'_>) -> HookResult {
        Ok(None)
    }
    fn build_commands(&self, _cx: &HookContext<'_>) -> HookResult {
        Ok(None)
    }
    fn review_process(&self, _cx: &HookContext<'_>) -> HookResult {
        Ok(None)
    }
    fn methodology(&self, _cx: &HookContext<'_>) -> HookResult {
        Ok(None)
    }
    fn done_criteria(&self, _cx: &HookContext<'_>) -> HookResult {
        Ok(None)
    }
    /// Heading of the work breakdown; sections, tasks, and checkpoints
    /// follow through their own hooks.
    fn work_breakdown(&self, _cx: &HookContext<'_>) -> HookResult {
        Ok(None)
    }
    fn work_section(&self, _cx: &HookContext<'_>, _section: &WorkSection) -> HookResult {
        Ok(None)
    }
    fn task(&self, _cx: &HookContext<'_>, _section: &WorkSection, _task: &Task) -> HookResult {
        Ok(None)
    }
    fn checkpoint(
        &self,
        _cx: &HookContext<'_>,
        _section: &WorkSection,
        _checkpoint: &Checkpoint,
    ) -> HookResult {
        Ok(None)
    }
    fn troubleshooting(&self, _cx: &HookContext<'_>) -> HookResult {
        Ok(None)
    }
    fn security(&self, _cx: &HookContext<'_>) -> HookResult {
        Ok(None)
    }
    fn learning_path(&self, _cx: &HookContext<'_>) -> HookResult {
        Ok(None)
    }
    fn next_phase(&self, _cx: &HookContext<'_>) -> HookResult {
        Ok(None)
    }
    fn footer(&self, _cx: &HookContext<'_>) -> HookResult {
        Ok(None)
    }
}

/// A fully rendered document, held in memory until written.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedDocument {
    pub phase: u32,
    pub doc_type: &'static str,
    /// `phase-N/<FILE>.md`, relative to the output root.
    pub relative_path: PathBuf,
    pub sections: Vec<Section>,
    pub text: String,
}

impl RenderedDocument {
    /// Write the document under `root`. The target directory must already
    /// exist; the file appears whole or not at all.
    pub fn write_to(&self, root: &Path) -> Result<PathBuf, GenerationError> {
        let target = root.join(&self.relative_path);
        let dir = target
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| root.to_path_buf());
        if !dir.is_dir() {
            return Err(GenerationError::MissingDirectory(dir));
        }
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(self.text.as_bytes())?;
        tmp.flush()?;
        tmp.persist(&target).map_err(|e| e.error)?;
        info!(path = %target.display(), bytes = self.text.len(), "document written");
        Ok(target)
    }
}

/// Outcome of one phase in a batch; failures never affect siblings.
#[derive(Debug)]
pub struct BatchOutcome {
    pub phase: u32,
    pub result: Result<RenderedDocument, GenerationError>,
}

/// Renders configs with one document type. Built via
/// `NarrativeGenerator::builder(doc_type)`.
pub struct NarrativeGenerator {
    doc_type: Box<dyn DocumentType>,
    templates: TemplateSet,
}

pub struct NarrativeGeneratorBuilder {
    doc_type: Box<dyn DocumentType>,
    templates_dir: Option<PathBuf>,
    /// Directly provided overrides (for testing without files).
    templates: Option<TemplateSet>,
}

impl NarrativeGenerator {
    pub fn builder(doc_type: impl DocumentType + 'static) -> NarrativeGeneratorBuilder {
        NarrativeGeneratorBuilder {
            doc_type: Box::new(doc_type),
            templates_dir: None,
            templates: None,
        }
    }

    pub fn doc_type(&self) -> &dyn DocumentType {
        self.doc_type.as_ref()
    }

    /// Render one config. Nothing touches the file system.
    pub fn generate(&self, config: &PhaseConfig) -> Result<RenderedDocument, GenerationError> {
        let doc = self.doc_type.as_ref();
        let scope = render_scope(config)?;
        let mut sections = Vec::new();

        for descriptor in doc.layout() {
            let hook = descriptor.hook();
            let presence = match descriptor {
                SectionDescriptor::Required(_) => Presence::Required,
                SectionDescriptor::Optional { key, .. } => Presence::Optional {
                    present: scope.get(key).is_some_and(|v| !v.is_null()),
                },
            };
            if presence == (Presence::Optional { present: false }) {
                debug!(hook = %hook, "optional section absent");
                sections.push(Section {
                    hook,
                    presence,
                    text: String::new(),
                });
                continue;
            }

            let cx = HookContext {
                config,
                scope: &scope,
                templates: &self.templates,
                hook,
            };
            let text = dispatch(doc, &cx)?.unwrap_or_default();
            if let Some((line, marker)) = placeholder::find_marker(&text) {
                warn!(hook = %hook, line, marker = %marker, "placeholder in rendered output");
                return Err(GenerationError::UnresolvedPlaceholder { hook, marker });
            }
            debug!(hook = %hook, bytes = text.len(), "section rendered");
            sections.push(Section {
                hook,
                presence,
                text,
            });
        }

        let mut text = sections
            .iter()
            .map(|s| s.text.as_str())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");
        text.push('\n');

        let phase = config.phase_number();
        info!(phase, doc_type = doc.name(), sections = sections.len(), "document rendered");
        Ok(RenderedDocument {
            phase,
            doc_type: doc.name(),
            relative_path: PathBuf::from(format!("phase-{phase}")).join(doc.file_name()),
            sections,
            text,
        })
    }

    /// Render independent phases in parallel; outcomes are sorted by phase.
    pub fn generate_batch(&self, configs: &[PhaseConfig]) -> Vec<BatchOutcome> {
        let mut outcomes: Vec<BatchOutcome> = configs
            .par_iter()
            .map(|config| BatchOutcome {
                phase: config.phase_number(),
                result: self.generate(config),
            })
            .collect();
        outcomes.sort_by_key(|o| o.phase);
        outcomes
    }
}

impl NarrativeGeneratorBuilder {
    /// Directory holding `<doc type name>.ron` template overrides.
    pub fn templates_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.templates_dir = Some(path.into());
        self
    }

    /// Provide template overrides directly (for testing without files).
    pub fn with_templates(mut self, templates: TemplateSet) -> Self {
        self.templates = Some(templates);
        self
    }

    pub fn build(self) -> Result<NarrativeGenerator, GenerationError> {
        let mut templates = self.doc_type.default_templates()?;

        if let Some(ref dir) = self.templates_dir {
            let path = dir.join(format!("{}.ron", self.doc_type.name()));
            if path.exists() {
                debug!(path = %path.display(), "loading template overrides");
                templates.merge(TemplateSet::load_from_ron(&path)?);
            }
        }
        if let Some(overrides) = self.templates {
            templates.merge(overrides);
        }

        Ok(NarrativeGenerator {
            doc_type: self.doc_type,
            templates,
        })
    }
}

/// The config as JSON plus values derived from it, so templates can say
/// `{derived.checkpoint_count}`.
fn render_scope(config: &PhaseConfig) -> Result<Value, GenerationError> {
    let mut scope = serde_json::to_value(config)?;
    if let Value::Object(ref mut map) = scope {
        map.insert(
            "derived".to_string(),
            serde_json::json!({
                "checkpoint_count": config.checkpoints().count(),
                "task_count": config.task_count(),
                "section_count": config.work_breakdown.len(),
            }),
        );
    }
    Ok(scope)
}

fn dispatch(doc: &dyn DocumentType, cx: &HookContext<'_>) -> HookResult {
    match cx.hook {
        Hook::Header => doc.header(cx),
        Hook::Prerequisites => doc.prerequisites(cx),
        Hook::Resources => doc.resources(cx),
        Hook::Overview => doc.overview(cx),
        Hook::BuildCommands => doc.build_commands(cx),
        Hook::ReviewProcess => doc.review_process(cx),
        Hook::Methodology => doc.methodology(cx),
        Hook::DoneCriteria => doc.done_criteria(cx),
        Hook::WorkBreakdown => {
            let mut parts: Vec<String> = doc.work_breakdown(cx)?.into_iter().collect();
            for section in &cx.config.work_breakdown {
                parts.extend(doc.work_section(cx, section)?);
                for task in &section.tasks {
                    parts.extend(doc.task(cx, section, task)?);
                }
                if let Some(ref checkpoint) = section.checkpoint {
                    parts.extend(doc.checkpoint(cx, section, checkpoint)?);
                }
            }
            Ok((!parts.is_empty()).then(|| parts.join("\n\n")))
        }
        Hook::Troubleshooting => doc.troubleshooting(cx),
        Hook::Security => doc.security(cx),
        Hook::LearningPath => doc.learning_path(cx),
        Hook::NextPhase => doc.next_phase(cx),
        Hook::Footer => doc.footer(cx),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Only implements the header and footer; everything else is a no-op.
    struct Stub;

    impl DocumentType for Stub {
        fn name(&self) -> &'static str {
            "stub"
        }
        fn file_name(&self) -> &'static str {
            "STUB.md"
        }
        fn layout(&self) -> Vec<SectionDescriptor> {
            vec![
                SectionDescriptor::Required(Hook::Header),
                SectionDescriptor::Optional {
                    hook: Hook::Overview,
                    key: "overview",
                },
                SectionDescriptor::Required(Hook::Prerequisites),
                SectionDescriptor::Required(Hook::Footer),
            ]
        }
        fn default_templates(&self) -> Result<TemplateSet, TemplateError> {
            TemplateSet::parse_ron(r##"{ "header": "# Phase {phase.number}: {phase.title}", "footer": "-- {derived.task_count} task(s)" }"##)
        }
        fn header(&self, cx: &HookContext<'_>) -> HookResult {
            cx.text("header").map(Some)
        }
        fn overview(&self, cx: &HookContext<'_>) -> HookResult {
            let overview = cx.require(cx.config.overview.as_ref(), "overview")?;
            Ok(Some(overview.narrative.clone()))
        }
        fn footer(&self, cx: &HookContext<'_>) -> HookResult {
            cx.text("footer").map(Some)
        }
    }

    fn config() -> PhaseConfig {
        serde_json::from_value(json!({
            "phase": {"number": 2, "title": "Storage"},
            "prerequisites": {"intro_narrative": "Before starting:"},
            "resources": {"intro_narrative": "Resources:"},
            "work_breakdown": [{
                "section_number": "2.1",
                "title": "Tables",
                "work_unit_context": {
                    "complexity": "Medium",
                    "complexity_reason": "Schema design",
                    "scope": {"estimated_lines": "~200 lines", "file_count": "3 files"}
                },
                "tasks": [{"number": "1", "title": "Create", "description": "Create tables."}]
            }]
        }))
        .unwrap()
    }

    #[test]
    fn layout_drives_sections_and_presence() {
        let generator = NarrativeGenerator::builder(Stub).build().unwrap();
        let doc = generator.generate(&config()).unwrap();
        let hooks: Vec<Hook> = doc.sections.iter().map(|s| s.hook).collect();
        assert_eq!(
            hooks,
            vec![Hook::Header, Hook::Overview, Hook::Prerequisites, Hook::Footer]
        );
        assert_eq!(doc.sections[1].presence, Presence::Optional { present: false });
        // no-op hook yields an empty required section
        assert_eq!(doc.sections[2].text, "");
        assert_eq!(doc.text, "# Phase 2: Storage\n\n-- 1 task(s)\n");
        assert_eq!(doc.relative_path, PathBuf::from("phase-2/STUB.md"));
    }

    #[test]
    fn unresolved_template_field_names_hook_and_key() {
        let overrides = TemplateSet::parse_ron(r##"{ "header": "# {phase.focus}" }"##).unwrap();
        let generator = NarrativeGenerator::builder(Stub)
            .with_templates(overrides)
            .build()
            .unwrap();
        let err = generator.generate(&config()).unwrap_err();
        assert!(matches!(
            err,
            GenerationError::MissingField { hook: Hook::Header, ref key } if key == "phase.focus"
        ));
    }

    #[test]
    fn placeholder_in_output_fails_the_render() {
        let mut config = config();
        config.phase.title = "Storage TBD".to_string();
        let generator = NarrativeGenerator::builder(Stub).build().unwrap();
        let err = generator.generate(&config).unwrap_err();
        assert!(matches!(
            err,
            GenerationError::UnresolvedPlaceholder { hook: Hook::Header, ref marker } if marker == "TBD"
        ));
    }

    #[test]
    fn batch_is_sorted_and_isolates_failures() {
        let generator = NarrativeGenerator::builder(Stub).build().unwrap();
        let mut bad = config();
        bad.phase.number = 1;
        bad.phase.title = "FIXME".to_string();
        let mut later = config();
        later.phase.number = 5;
        let outcomes = generator.generate_batch(&[later, config(), bad]);
        let phases: Vec<u32> = outcomes.iter().map(|o| o.phase).collect();
        assert_eq!(phases, vec![1, 2, 5]);
        assert!(outcomes[0].result.is_err());
        assert!(outcomes[1].result.is_ok());
        assert!(outcomes[2].result.is_ok());
    }

    #[test]
    fn write_requires_existing_directory() {
        let root = tempfile::tempdir().unwrap();
        let generator = NarrativeGenerator::builder(Stub).build().unwrap();
        let doc = generator.generate(&config()).unwrap();

        let err = doc.write_to(root.path()).unwrap_err();
        assert!(matches!(err, GenerationError::MissingDirectory(_)));
        assert!(!root.path().join("phase-2").exists());

        std::fs::create_dir(root.path().join("phase-2")).unwrap();
        let path = doc.write_to(root.path()).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), doc.text);
        let leftovers = std::fs::read_dir(root.path().join("phase-2")).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}
