/// Built-in document types: the phase work plan and its paired review plan.
///
/// Both render from the same validated config, so the checkpoint numbers in
/// a phase's two plans always agree.
use serde_json::json;
use std::path::Path;

use crate::core::pipeline::{DocumentType, GenerationError, Hook, HookContext, HookResult, SectionDescriptor};
use crate::core::template::{TemplateError, TemplateSet};
use crate::schema::phase::{Checkpoint, PhaseConfig, Task, TipKind, WorkSection};

const WORK_PLAN_TEMPLATES: &str = include_str!("../../templates/work_plan.ron");
const REVIEW_PLAN_TEMPLATES: &str = include_str!("../../templates/review_plan.ron");

/// Accumulates blocks of lines; blocks are separated by one blank line.
#[derive(Default)]
struct Blocks {
    blocks: Vec<Vec<String>>,
}

impl Blocks {
    fn block(&mut self) -> &mut Vec<String> {
        self.blocks.push(Vec::new());
        self.last()
    }

    fn last(&mut self) -> &mut Vec<String> {
        if self.blocks.is_empty() {
            self.blocks.push(Vec::new());
        }
        let idx = self.blocks.len() - 1;
        &mut self.blocks[idx]
    }

    fn line(&mut self, line: impl Into<String>) {
        self.block().push(line.into());
    }

    fn finish(self) -> HookResult {
        let text = self
            .blocks
            .into_iter()
            .filter(|b| !b.is_empty())
            .map(|b| b.join("\n"))
            .collect::<Vec<_>>()
            .join("\n\n");
        Ok((!text.is_empty()).then_some(text))
    }
}

fn tip_icon(kind: TipKind) -> &'static str {
    match kind {
        TipKind::JuniorDev => "💡",
        TipKind::Warning => "⚠️",
        TipKind::Security => "🔒",
        TipKind::Performance => "⚡",
    }
}

fn requirements_line(cx: &HookContext<'_>, ids: &[String]) -> Result<Option<String>, GenerationError> {
    if ids.is_empty() {
        return Ok(None);
    }
    Ok(Some(format!("{}{}", cx.text("requirements_covered")?, ids.join(", "))))
}

fn footer(cx: &HookContext<'_>) -> HookResult {
    let mut out = Blocks::default();
    out.line("---");
    let name = if cx.config.generated_on.is_some() {
        "footer_dated"
    } else {
        "footer"
    };
    out.line(cx.text(name)?);
    out.finish()
}

/// Every requirement ID the phase touches, phase-level first, in first-seen order.
fn phase_requirements(config: &PhaseConfig) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    let all = config
        .phase
        .requirements
        .iter()
        .chain(config.work_breakdown.iter().flat_map(|s| s.tasks.iter().flat_map(|t| t.requirements.iter())));
    for id in all {
        if !ids.contains(id) {
            ids.push(id.clone());
        }
    }
    ids
}

/// `WORK_PLAN.md`: the implementer's narrative plan.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkPlan;

impl DocumentType for WorkPlan {
    fn name(&self) -> &'static str {
        "work_plan"
    }

    fn file_name(&self) -> &'static str {
        "WORK_PLAN.md"
    }

    fn layout(&self) -> Vec<SectionDescriptor> {
        use SectionDescriptor::{Optional, Required};
        vec![
            Required(Hook::Header),
            Required(Hook::Prerequisites),
            Required(Hook::Resources),
            Optional { hook: Hook::Overview, key: "overview" },
            Optional { hook: Hook::BuildCommands, key: "build_commands" },
            Optional { hook: Hook::ReviewProcess, key: "review_process" },
            Optional { hook: Hook::Methodology, key: "methodology" },
            Optional { hook: Hook::DoneCriteria, key: "done_criteria" },
            Required(Hook::WorkBreakdown),
            Optional { hook: Hook::Troubleshooting, key: "troubleshooting" },
            Optional { hook: Hook::Security, key: "security_requirements" },
            Optional { hook: Hook::LearningPath, key: "learning_path" },
            Optional { hook: Hook::NextPhase, key: "next_phase" },
            Required(Hook::Footer),
        ]
    }

    fn default_templates(&self) -> Result<TemplateSet, TemplateError> {
        TemplateSet::parse_ron(WORK_PLAN_TEMPLATES)
    }

    fn header(&self, cx: &HookContext<'_>) -> HookResult {
        let phase = &cx.config.phase;
        let mut out = Blocks::default();
        out.line(cx.text("header")?);
        if phase.focus.is_some() {
            out.line(cx.text("focus")?);
        }
        if let Some(ref narrative) = phase.narrative_overview {
            out.line(narrative.clone());
        }
        if let Some(line) = requirements_line(cx, &phase.requirements)? {
            out.line(line);
        }
        if !phase.critical_requirements.is_empty() {
            let block = out.block();
            block.push(cx.text("critical_requirements")?);
            block.extend(phase.critical_requirements.iter().map(|r| format!("- {r}")));
        }
        out.finish()
    }

    fn prerequisites(&self, cx: &HookContext<'_>) -> HookResult {
        let prereq = &cx.config.prerequisites;
        let mut out = Blocks::default();
        out.line(cx.text("prerequisites")?);
        let block = out.block();
        block.push(prereq.intro_narrative.clone());
        if prereq.completed_phases.is_some() {
            block.push(cx.text("completed_phases")?);
        }
        if !prereq.knowledge_areas.is_empty() {
            block.push(cx.text("required_knowledge")?);
            for area in &prereq.knowledge_areas {
                block.push(format!(
                    "  - **{}**: {} (*{}*)",
                    area.area,
                    area.description,
                    area.importance.label()
                ));
            }
        }
        out.finish()
    }

    fn resources(&self, cx: &HookContext<'_>) -> HookResult {
        let resources = &cx.config.resources;
        let mut out = Blocks::default();
        out.line(cx.text("resources")?);
        out.line(resources.intro_narrative.clone());

        if let Some(first) = resources.example_files.first() {
            let dir = Path::new(&first.path)
                .parent()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            let block = out.block();
            block.push(cx.text("example_files")?);
            if !dir.is_empty() {
                block.push(cx.text_with("example_files_location", &json!({ "dir": dir }))?);
            }
            for example in &resources.example_files {
                block.push(format!(
                    "- **[{}]({})** - {} - {}",
                    example.name, example.path, example.description, example.purpose
                ));
            }
        }

        if !resources.specifications.is_empty() {
            let block = out.block();
            block.push(cx.text("specifications")?);
            block.push(cx.text("specifications_intro")?);
            for spec in &resources.specifications {
                block.push(format!("- **[{}]({})** - {}", spec.name, spec.path, spec.description));
                if !spec.key_sections.is_empty() {
                    block.push(format!("  - Key sections: {}", spec.key_sections.join(", ")));
                }
            }
        }

        if !resources.junior_dev_guides.is_empty() {
            let block = out.block();
            block.push(cx.text("guides")?);
            block.push(cx.text("guides_intro")?);
            for guide in &resources.junior_dev_guides {
                block.push(format!("- **[{}]({})** - {}", guide.name, guide.path, guide.description));
                block.push(format!("  - *When to read*: {}", guide.when_to_read));
            }
        }

        if !resources.quick_links.is_empty() {
            let block = out.block();
            block.push(cx.text("quick_links")?);
            for link in &resources.quick_links {
                block.push(format!("- **{}**: `{}` - {}", link.name, link.command, link.purpose));
            }
        }
        out.finish()
    }

    fn overview(&self, cx: &HookContext<'_>) -> HookResult {
        let overview = cx.require(cx.config.overview.as_ref(), "overview")?;
        let mut out = Blocks::default();
        out.line(cx.text("overview")?);
        out.line(overview.narrative.clone());
        out.line(cx.text("checkpoint_strategy")?);
        out.line(cx.text("time_estimate")?);
        out.finish()
    }

    fn build_commands(&self, cx: &HookContext<'_>) -> HookResult {
        let build = cx.require(cx.config.build_commands.as_ref(), "build_commands")?;
        let mut out = Blocks::default();
        out.line(cx.text("build_commands")?);
        let block = out.block();
        block.push(build.intro_narrative.clone());
        for cmd in &build.commands {
            block.push(format!(
                "- `{} {}` - {} ({})",
                build.tool, cmd.command, cmd.description, cmd.when_to_use
            ));
        }
        out.finish()
    }

    fn review_process(&self, cx: &HookContext<'_>) -> HookResult {
        let review = cx.require(cx.config.review_process.as_ref(), "review_process")?;
        let procedure = &review.checkpoint_procedure;
        let mut out = Blocks::default();
        out.line(cx.text("review_process")?);
        out.line(format!("**{}**", review.importance_narrative));
        let block = out.block();
        block.push(cx.text("review_intro")?);
        block.push(format!("1. **{}**", procedure.stop_instructions));
        block.push(cx.text("request_review")?);
        block.extend(procedure.review_preparation.iter().map(|s| format!("   - {s}")));
        block.push(format!("3. **{}**", procedure.wait_instructions));
        out.finish()
    }

    fn methodology(&self, cx: &HookContext<'_>) -> HookResult {
        let methodology = cx.require(cx.config.methodology.as_ref(), "methodology")?;
        let mut out = Blocks::default();
        out.line(cx.text("methodology")?);
        out.line(cx.text("methodology_importance")?);
        let block = out.block();
        for (i, rule) in methodology.rules.iter().enumerate() {
            block.push(format!("{}. **{}** - {}", i + 1, rule.step, rule.description));
            block.push(format!("   - *{}*", rule.rationale));
        }
        out.finish()
    }

    fn done_criteria(&self, cx: &HookContext<'_>) -> HookResult {
        let done = cx.require(cx.config.done_criteria.as_ref(), "done_criteria")?;
        let mut out = Blocks::default();
        out.line(cx.text("done_criteria")?);
        let block = out.block();
        block.push(done.intro_narrative.clone());
        for criterion in &done.checklist {
            block.push(format!("- [ ] {}", criterion.criterion));
            block.push(format!("  - *Verification*: {}", criterion.verification_method));
        }
        out.finish()
    }

    fn work_breakdown(&self, cx: &HookContext<'_>) -> HookResult {
        cx.text("work_breakdown").map(Some)
    }

    fn work_section(&self, cx: &HookContext<'_>, section: &WorkSection) -> HookResult {
        let context = &section.work_unit_context;
        let mut out = Blocks::default();
        out.line(cx.text_with(
            "work_section",
            &json!({
                "section_number": section.section_number,
                "title": section.title,
                "estimated_lines": context.scope.estimated_lines,
                "file_count": context.scope.file_count,
            }),
        )?);

        let block = out.block();
        block.push(cx.text("work_unit_context")?);
        block.push(format!(
            "- **Complexity**: {} - {}",
            context.complexity.label(),
            context.complexity_reason
        ));
        block.push(format!(
            "- **Scope**: {} across {}",
            context.scope.estimated_lines, context.scope.file_count
        ));
        if !context.key_components.is_empty() {
            block.push("- **Key Components**:".to_string());
            for component in &context.key_components {
                block.push(format!(
                    "  - {} ({}) - {}",
                    component.name, component.estimated_lines, component.purpose
                ));
            }
        }
        if !context.patterns.is_empty() {
            block.push(format!("- **Patterns**: {}", context.patterns.join(", ")));
        }
        if !context.algorithms.is_empty() {
            block.push(format!("- **Required Algorithms**: {}", context.algorithms.join(", ")));
        }
        out.finish()
    }

    fn task(&self, cx: &HookContext<'_>, _section: &WorkSection, task: &Task) -> HookResult {
        let mut out = Blocks::default();
        out.line(cx.text_with("task", &json!({ "number": task.number, "title": task.title }))?);

        for tip in &task.tips {
            let block = out.block();
            block.push(format!(
                "{} **{} Tip**: {}",
                tip_icon(tip.kind),
                tip.kind.label(),
                tip.content
            ));
            if let Some(ref link) = tip.resource_link {
                block.push(format!("   See: [{link}]({link})"));
            }
        }

        out.line(task.description.clone());
        if !task.requirements.is_empty() {
            out.line(format!("*Satisfies*: {}", task.requirements.join(", ")));
        }

        if let Some(ref tdd) = task.tdd_instructions {
            out.line(format!("{}{}", cx.text("tdd")?, tdd));
        }

        for example in &task.code_examples {
            let block = out.block();
            block.push(format!("**{}:**", example.purpose));
            block.push(format!("```{}", example.language));
            block.push(example.code.clone());
            block.push("```".to_string());
            out.line(format!("*{}*", example.explanation));
        }

        if !task.special_considerations.is_empty() {
            let block = out.block();
            block.push(cx.text("special_considerations")?);
            block.extend(task.special_considerations.iter().map(|c| format!("- {c}")));
        }
        out.finish()
    }

    fn checkpoint(
        &self,
        cx: &HookContext<'_>,
        _section: &WorkSection,
        checkpoint: &Checkpoint,
    ) -> HookResult {
        let mut out = Blocks::default();
        out.line("---");
        out.line(cx.text_with(
            "checkpoint",
            &json!({ "number": checkpoint.number, "title": checkpoint.title }),
        )?);

        let block = out.block();
        block.push(cx.text("deliverables")?);
        block.extend(checkpoint.deliverables.iter().map(|d| format!("- {d}")));

        let block = out.block();
        block.push(cx.text("verification_steps")?);
        for (i, step) in checkpoint.verification_steps.iter().enumerate() {
            block.push(format!("{}. {}", i + 1, step));
        }

        if !checkpoint.common_issues.is_empty() {
            let block = out.block();
            block.push(cx.text("common_issues")?);
            for issue in &checkpoint.common_issues {
                block.push(format!("- **Issue**: {}", issue.issue));
                block.push(format!("  **Solution**: {}", issue.solution));
            }
        }

        out.line(cx.text("stop")?);
        out.line("---");
        out.finish()
    }

    fn troubleshooting(&self, cx: &HookContext<'_>) -> HookResult {
        let trouble = cx.require(cx.config.troubleshooting.as_ref(), "troubleshooting")?;
        let mut out = Blocks::default();
        out.line(cx.text("troubleshooting")?);
        out.line(trouble.intro_narrative.clone());
        for category in &trouble.common_issues {
            let block = out.block();
            block.push(format!("### {}", category.category));
            for issue in &category.issues {
                block.push(format!("- **Symptom**: {}", issue.symptom));
                block.push(format!("  - **Cause**: {}", issue.cause));
                block.push(format!("  - **Solution**: {}", issue.solution));
            }
        }
        if let Some(ref escalation) = trouble.escalation_path {
            let block = out.block();
            block.push(cx.text("escalation")?);
            block.push(escalation.when_stuck.clone());
            block.push(cx.text("documentation_requirements")?);
            block.extend(escalation.documentation_requirements.iter().map(|r| format!("- {r}")));
        }
        out.finish()
    }

    fn security(&self, cx: &HookContext<'_>) -> HookResult {
        let security = cx.require(cx.config.security_requirements.as_ref(), "security_requirements")?;
        let mut out = Blocks::default();
        out.line(cx.text("security")?);
        out.line(format!("**{}**", security.importance_narrative));
        for category in &security.categories {
            let block = out.block();
            block.push(format!("### {}", category.name));
            for req in &category.requirements {
                block.push(format!("- **{}**: {}", req.level.keyword(), req.requirement));
                if let Some(ref rationale) = req.rationale {
                    block.push(format!("  - *Rationale*: {rationale}"));
                }
            }
            if category.implementation_guidance.is_some() || category.testing_approach.is_some() {
                let block = out.block();
                if let Some(ref guidance) = category.implementation_guidance {
                    block.push(format!("**Implementation**: {guidance}"));
                }
                if let Some(ref testing) = category.testing_approach {
                    block.push(format!("**Testing**: {testing}"));
                }
            }
        }
        out.finish()
    }

    fn learning_path(&self, cx: &HookContext<'_>) -> HookResult {
        let learning = cx.require(cx.config.learning_path.as_ref(), "learning_path")?;
        let mut out = Blocks::default();
        out.line(cx.text("learning_path")?);
        out.line(cx.text("target_audience")?);
        out.line(learning.intro_narrative.clone());
        for step in &learning.progression {
            let block = out.block();
            block.push(format!("### Step {}: {}", step.step, step.focus));
            block.push(format!("- **Resources**: {}", step.resources.join(", ")));
            block.push(format!("- **Time**: {}", step.estimated_time));
            block.push(format!("- **Practice**: {}", step.practical_exercise));
        }
        if !learning.key_warnings.is_empty() {
            let block = out.block();
            block.push(cx.text("key_warnings")?);
            block.extend(learning.key_warnings.iter().map(|w| format!("- ⚠️ {w}")));
        }
        out.finish()
    }

    fn next_phase(&self, cx: &HookContext<'_>) -> HookResult {
        let next = cx.require(cx.config.next_phase.as_ref(), "next_phase")?;
        let mut out = Blocks::default();
        out.line(cx.text("next_phase")?);
        out.line(cx.text("next_phase_title")?);
        out.line(next.preview_narrative.clone());
        if !next.key_features.is_empty() {
            let block = out.block();
            block.push(cx.text("key_features")?);
            block.extend(next.key_features.iter().map(|f| format!("- {f}")));
        }
        out.finish()
    }

    fn footer(&self, cx: &HookContext<'_>) -> HookResult {
        footer(cx)
    }
}

/// `REVIEW_PLAN.md`: the reviewer's checklist, one block per checkpoint.
/// Every checkpoint must carry `review_focus`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReviewPlan;

impl DocumentType for ReviewPlan {
    fn name(&self) -> &'static str {
        "review_plan"
    }

    fn file_name(&self) -> &'static str {
        "REVIEW_PLAN.md"
    }

    fn layout(&self) -> Vec<SectionDescriptor> {
        use SectionDescriptor::{Optional, Required};
        vec![
            Required(Hook::Header),
            Optional { hook: Hook::Overview, key: "overview" },
            Optional { hook: Hook::ReviewProcess, key: "review_process" },
            Required(Hook::WorkBreakdown),
            Optional { hook: Hook::DoneCriteria, key: "done_criteria" },
            Optional { hook: Hook::Security, key: "security_requirements" },
            Required(Hook::Footer),
        ]
    }

    fn default_templates(&self) -> Result<TemplateSet, TemplateError> {
        TemplateSet::parse_ron(REVIEW_PLAN_TEMPLATES)
    }

    fn header(&self, cx: &HookContext<'_>) -> HookResult {
        let mut out = Blocks::default();
        out.line(cx.text("header")?);
        out.line(cx.text("purpose")?);
        if let Some(line) = requirements_line(cx, &phase_requirements(cx.config))? {
            out.line(line);
        }
        out.finish()
    }

    fn overview(&self, cx: &HookContext<'_>) -> HookResult {
        let overview = cx.require(cx.config.overview.as_ref(), "overview")?;
        let mut out = Blocks::default();
        out.line(cx.text("overview")?);
        out.line(overview.checkpoint_summary.clone());
        out.line(cx.text("time_estimate")?);
        out.finish()
    }

    fn review_process(&self, cx: &HookContext<'_>) -> HookResult {
        let review = cx.require(cx.config.review_process.as_ref(), "review_process")?;
        let procedure = &review.checkpoint_procedure;
        let mut out = Blocks::default();
        out.line(cx.text("review_process")?);
        out.line(review.importance_narrative.clone());
        let block = out.block();
        block.push(cx.text("review_preparation")?);
        block.extend(procedure.review_preparation.iter().map(|s| format!("- {s}")));
        out.finish()
    }

    fn work_breakdown(&self, cx: &HookContext<'_>) -> HookResult {
        cx.text("work_breakdown").map(Some)
    }

    fn checkpoint(
        &self,
        cx: &HookContext<'_>,
        section: &WorkSection,
        checkpoint: &Checkpoint,
    ) -> HookResult {
        let focus = cx.require(
            checkpoint.review_focus.as_ref(),
            &format!("checkpoint {}.review_focus", checkpoint.number),
        )?;
        let mut out = Blocks::default();
        out.line(cx.text_with(
            "checkpoint",
            &json!({ "number": checkpoint.number, "title": checkpoint.title }),
        )?);
        out.line(cx.text_with(
            "checkpoint_scope",
            &json!({ "section_number": section.section_number, "title": section.title }),
        )?);

        let block = out.block();
        block.push(cx.text("review_focus")?);
        block.extend(focus.iter().map(|f| format!("- {f}")));

        let block = out.block();
        block.push(cx.text("deliverables")?);
        block.extend(checkpoint.deliverables.iter().map(|d| format!("- [ ] {d}")));

        let block = out.block();
        block.push(cx.text("verification_steps")?);
        for (i, step) in checkpoint.verification_steps.iter().enumerate() {
            block.push(format!("{}. {}", i + 1, step));
        }

        if !checkpoint.common_issues.is_empty() {
            let block = out.block();
            block.push(cx.text("known_issues")?);
            block.extend(checkpoint.common_issues.iter().map(|i| format!("- {}", i.issue)));
        }

        let block = out.block();
        block.push(cx.text("decision")?);
        block.push("- [ ] Approved".to_string());
        block.push("- [ ] Changes requested".to_string());
        out.finish()
    }

    fn done_criteria(&self, cx: &HookContext<'_>) -> HookResult {
        let done = cx.require(cx.config.done_criteria.as_ref(), "done_criteria")?;
        let mut out = Blocks::default();
        out.line(cx.text("done_criteria")?);
        let block = out.block();
        for criterion in &done.checklist {
            block.push(format!("- [ ] {}", criterion.criterion));
            block.push(format!("  - *Verification*: {}", criterion.verification_method));
        }
        out.finish()
    }

    fn security(&self, cx: &HookContext<'_>) -> HookResult {
        let security = cx.require(cx.config.security_requirements.as_ref(), "security_requirements")?;
        let mut out = Blocks::default();
        out.line(cx.text("security")?);
        let block = out.block();
        for category in &security.categories {
            for req in &category.requirements {
                block.push(format!(
                    "- [ ] **{}** ({}): {}",
                    req.level.keyword(),
                    category.name,
                    req.requirement
                ));
            }
        }
        out.finish()
    }

    fn footer(&self, cx: &HookContext<'_>) -> HookResult {
        footer(cx)
    }
}
