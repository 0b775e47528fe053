/// Config loading and schema validation.
///
/// Parses a phase configuration (JSON), checks it against the published
/// JSON Schema, and either returns the typed document or the complete list
/// of violations found in one pass.
use jsonschema::error::ValidationErrorKind;
use jsonschema::Validator;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::alignment::{describe_skipped, skipped_ranges};
use crate::schema::issue::Severity;
use crate::schema::phase::PhaseConfig;

/// The published schema, version 1.0.
pub const PHASE_CONFIG_SCHEMA: &str = include_str!("../../schema/phase_config.schema.json");

/// How validation reacts to the first blocking violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Collect everything before returning.
    #[default]
    Batch,
    /// Return as soon as one error-severity violation is known.
    FailFast,
}

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("schema is not valid JSON: {0}")]
    SchemaJson(#[from] serde_json::Error),
    #[error("schema does not compile: {0}")]
    InvalidSchema(String),
}

/// Stable codes for schema violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationCode {
    SchemaUnreadable,
    SchemaParse,
    SchemaVersion,
    SchemaMissingKey,
    SchemaWrongKind,
    SchemaInvalidEnum,
    SchemaConstraint,
    SchemaUnknownKey,
    SchemaNumbering,
}

impl ViolationCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SchemaUnreadable => "SCHEMA_UNREADABLE",
            Self::SchemaParse => "SCHEMA_PARSE",
            Self::SchemaVersion => "SCHEMA_VERSION",
            Self::SchemaMissingKey => "SCHEMA_MISSING_KEY",
            Self::SchemaWrongKind => "SCHEMA_WRONG_KIND",
            Self::SchemaInvalidEnum => "SCHEMA_INVALID_ENUM",
            Self::SchemaConstraint => "SCHEMA_CONSTRAINT",
            Self::SchemaUnknownKey => "SCHEMA_UNKNOWN_KEY",
            Self::SchemaNumbering => "SCHEMA_NUMBERING",
        }
    }

    fn hint(&self) -> &'static str {
        match self {
            Self::SchemaUnreadable => "check the path and file permissions",
            Self::SchemaParse => "fix the JSON syntax",
            Self::SchemaVersion => "migrate the config to the supported schema version",
            Self::SchemaMissingKey => "add the missing key",
            Self::SchemaWrongKind => "change the value to the expected type",
            Self::SchemaInvalidEnum => "use one of the allowed values",
            Self::SchemaConstraint => "adjust the value to satisfy the schema constraint",
            Self::SchemaUnknownKey => "remove the key or check its spelling",
            Self::SchemaNumbering => "number tasks uniquely and checkpoints consecutively from 1",
        }
    }

    fn severity(&self) -> Severity {
        match self {
            Self::SchemaUnknownKey => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for ViolationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One problem with a config document. `path` uses dotted keys with
/// bracketed indices, e.g. `work_breakdown[0].tasks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaViolation {
    pub code: ViolationCode,
    pub severity: Severity,
    pub path: String,
    pub message: String,
    pub hint: String,
}

impl SchemaViolation {
    fn new(code: ViolationCode, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: code.severity(),
            path: path.into(),
            message: message.into(),
            hint: code.hint().to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Validation failed: the complete violation list (errors and any warnings
/// found before stopping).
#[derive(Debug, Clone, Error)]
#[error("{document}: {} schema violation(s)", .violations.iter().filter(|v| v.is_error()).count())]
pub struct SchemaErrors {
    pub document: String,
    pub violations: Vec<SchemaViolation>,
}

impl SchemaErrors {
    /// True if some violation points exactly at `path`.
    pub fn mentions(&self, path: &str) -> bool {
        self.violations.iter().any(|v| v.path == path)
    }

    pub fn errors(&self) -> impl Iterator<Item = &SchemaViolation> {
        self.violations.iter().filter(|v| v.is_error())
    }
}

/// A config that passed validation, with its non-blocking warnings.
#[derive(Debug, Clone)]
pub struct Validated {
    pub document: String,
    pub config: PhaseConfig,
    pub warnings: Vec<SchemaViolation>,
}

/// Validates phase configs against a compiled schema.
pub struct ConfigLoader {
    schema: Value,
    validator: Validator,
    schema_major: Option<u32>,
    mode: RunMode,
}

impl ConfigLoader {
    /// Loader for the published schema.
    pub fn new() -> Result<Self, LoaderError> {
        let schema: Value = serde_json::from_str(PHASE_CONFIG_SCHEMA)?;
        Self::with_schema(schema)
    }

    /// Loader for a caller-supplied schema (e.g. a newer version).
    pub fn with_schema(schema: Value) -> Result<Self, LoaderError> {
        let validator = jsonschema::validator_for(&schema)
            .map_err(|e| LoaderError::InvalidSchema(e.to_string()))?;
        let schema_major = schema
            .get("version")
            .and_then(Value::as_str)
            .and_then(major_version);
        Ok(Self {
            schema,
            validator,
            schema_major,
            mode: RunMode::Batch,
        })
    }

    pub fn mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    /// Read and validate one config file.
    pub fn load_file(&self, path: &Path) -> Result<Validated, SchemaErrors> {
        let document = path.display().to_string();
        match std::fs::read_to_string(path) {
            Ok(text) => self.validate_str(&document, &text),
            Err(e) => Err(SchemaErrors {
                document,
                violations: vec![SchemaViolation::new(
                    ViolationCode::SchemaUnreadable,
                    "",
                    format!("cannot read config: {e}"),
                )],
            }),
        }
    }

    /// Parse JSON text and validate it.
    pub fn validate_str(&self, document: &str, text: &str) -> Result<Validated, SchemaErrors> {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => self.validate(document, &value),
            Err(e) => Err(SchemaErrors {
                document: document.to_string(),
                violations: vec![SchemaViolation::new(
                    ViolationCode::SchemaParse,
                    "",
                    format!("invalid JSON at line {} column {}: {e}", e.line(), e.column()),
                )],
            }),
        }
    }

    /// Validate an already-parsed config value.
    pub fn validate(&self, document: &str, instance: &Value) -> Result<Validated, SchemaErrors> {
        let mut found = Collector::new(self.mode);

        self.check_version(instance, &mut found);
        if !found.stopped() {
            for error in self.validator.iter_errors(instance) {
                found.push(map_validation_error(&error));
                if found.stopped() {
                    break;
                }
            }
        }
        if !found.stopped() {
            collect_unknown_keys(&self.schema, instance, "", &mut found);
        }

        let config = if found.has_errors() {
            None
        } else {
            match serde_json::from_value::<PhaseConfig>(instance.clone()) {
                Ok(config) => Some(config),
                Err(e) => {
                    found.push(SchemaViolation::new(
                        ViolationCode::SchemaWrongKind,
                        "",
                        format!("config does not match the document model: {e}"),
                    ));
                    None
                }
            }
        };

        if let Some(ref config) = config {
            check_numbering(config, &mut found);
        }

        match config {
            Some(config) if !found.has_errors() => {
                for w in &found.violations {
                    warn!(document, path = %w.path, "{}", w.message);
                }
                info!(document, warnings = found.violations.len(), "config validated");
                Ok(Validated {
                    document: document.to_string(),
                    config,
                    warnings: found.violations,
                })
            }
            _ => {
                info!(document, violations = found.violations.len(), "config rejected");
                Err(SchemaErrors {
                    document: document.to_string(),
                    violations: found.violations,
                })
            }
        }
    }

    fn check_version(&self, instance: &Value, found: &mut Collector) {
        let (Some(expected), Some(declared)) = (
            self.schema_major,
            instance.get("schema_version").and_then(Value::as_str),
        ) else {
            return;
        };
        if let Some(major) = major_version(declared) {
            if major != expected {
                found.push(SchemaViolation::new(
                    ViolationCode::SchemaVersion,
                    "schema_version",
                    format!("config targets schema {declared}, loader supports {expected}.x"),
                ));
            }
        }
    }
}

struct Collector {
    mode: RunMode,
    violations: Vec<SchemaViolation>,
}

impl Collector {
    fn new(mode: RunMode) -> Self {
        Self {
            mode,
            violations: Vec::new(),
        }
    }

    fn push(&mut self, violation: SchemaViolation) {
        debug!(code = %violation.code, path = %violation.path, "schema violation");
        self.violations.push(violation);
    }

    fn has_errors(&self) -> bool {
        self.violations.iter().any(SchemaViolation::is_error)
    }

    fn stopped(&self) -> bool {
        self.mode == RunMode::FailFast && self.has_errors()
    }
}

fn major_version(version: &str) -> Option<u32> {
    version.split('.').next()?.parse().ok()
}

/// Turn a JSON pointer (`/work_breakdown/0/tasks`) into `work_breakdown[0].tasks`.
fn pointer_to_path(pointer: &str) -> String {
    let mut path = String::new();
    for token in pointer.split('/').filter(|t| !t.is_empty()) {
        let token = token.replace("~1", "/").replace("~0", "~");
        if token.chars().all(|c| c.is_ascii_digit()) {
            path.push('[');
            path.push_str(&token);
            path.push(']');
        } else {
            if !path.is_empty() {
                path.push('.');
            }
            path.push_str(&token);
        }
    }
    path
}

fn join_path(base: &str, key: &str) -> String {
    if base.is_empty() {
        key.to_string()
    } else {
        format!("{base}.{key}")
    }
}

fn map_validation_error(error: &jsonschema::ValidationError<'_>) -> SchemaViolation {
    let path = pointer_to_path(&error.instance_path.to_string());
    match &error.kind {
        ValidationErrorKind::Required { property } => {
            let key = property
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| property.to_string());
            let full = join_path(&path, &key);
            SchemaViolation::new(
                ViolationCode::SchemaMissingKey,
                full.clone(),
                format!("missing required key `{full}`"),
            )
        }
        ValidationErrorKind::Type { .. } => SchemaViolation::new(
            ViolationCode::SchemaWrongKind,
            path.clone(),
            format!("wrong value kind at `{path}`: {error}"),
        ),
        ValidationErrorKind::Enum { options } => SchemaViolation::new(
            ViolationCode::SchemaInvalidEnum,
            path.clone(),
            format!("invalid value {} at `{path}`, expected one of {options}", error.instance),
        ),
        _ => SchemaViolation::new(
            ViolationCode::SchemaConstraint,
            path.clone(),
            format!("constraint failed at `{path}`: {error}"),
        ),
    }
}

/// Walk the instance alongside the schema and warn about keys the schema
/// does not declare.
fn collect_unknown_keys(schema: &Value, instance: &Value, path: &str, found: &mut Collector) {
    match instance {
        Value::Object(map) => {
            let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
                return;
            };
            for (key, value) in map {
                let child = join_path(path, key);
                match properties.get(key) {
                    Some(sub) => collect_unknown_keys(sub, value, &child, found),
                    None => found.push(SchemaViolation::new(
                        ViolationCode::SchemaUnknownKey,
                        child.clone(),
                        format!("unknown key `{child}` ignored"),
                    )),
                }
            }
        }
        Value::Array(items) => {
            let Some(item_schema) = schema.get("items") else {
                return;
            };
            for (i, item) in items.iter().enumerate() {
                collect_unknown_keys(item_schema, item, &format!("{path}[{i}]"), found);
            }
        }
        _ => {}
    }
}

/// Numbering rules the schema cannot express: task numbers unique within
/// the phase, checkpoints numbered 1..=n without gaps or repeats.
fn check_numbering(config: &PhaseConfig, found: &mut Collector) {
    let mut seen_tasks = FxHashSet::default();
    for (s, section) in config.work_breakdown.iter().enumerate() {
        for (t, task) in section.tasks.iter().enumerate() {
            if !seen_tasks.insert(task.number.as_str()) {
                found.push(SchemaViolation::new(
                    ViolationCode::SchemaNumbering,
                    format!("work_breakdown[{s}].tasks[{t}].number"),
                    format!("duplicate task number {}", task.number),
                ));
            }
        }
    }

    let numbers: Vec<(usize, u32)> = config
        .work_breakdown
        .iter()
        .enumerate()
        .filter_map(|(s, section)| section.checkpoint.as_ref().map(|c| (s, c.number)))
        .collect();
    let mut seen = FxHashSet::default();
    for &(s, number) in &numbers {
        if !seen.insert(number) {
            found.push(SchemaViolation::new(
                ViolationCode::SchemaNumbering,
                format!("work_breakdown[{s}].checkpoint.number"),
                format!("duplicate checkpoint number {number}"),
            ));
        }
    }
    for gap in skipped_ranges(numbers.iter().map(|&(_, n)| n)) {
        found.push(SchemaViolation::new(
            ViolationCode::SchemaNumbering,
            "work_breakdown",
            describe_skipped(&gap),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn minimal() -> Value {
        json!({
            "phase": {"number": 1, "title": "Foundations"},
            "prerequisites": {"intro_narrative": "Before starting:"},
            "resources": {"intro_narrative": "Resources:"},
            "work_breakdown": [{
                "section_number": "1.1",
                "title": "Setup",
                "work_unit_context": {
                    "complexity": "Low",
                    "complexity_reason": "Scaffolding only",
                    "scope": {"estimated_lines": "~100 lines", "file_count": "2 files"}
                },
                "tasks": [{"number": "1", "title": "Init", "description": "Create the crate."}],
                "checkpoint": {
                    "number": 1,
                    "title": "Setup done",
                    "deliverables": ["crate"],
                    "verification_steps": ["build"]
                }
            }]
        })
    }

    fn loader() -> ConfigLoader {
        ConfigLoader::new().unwrap()
    }

    #[test]
    fn minimal_config_validates() {
        let validated = loader().validate("t.json", &minimal()).unwrap();
        assert_eq!(validated.config.phase.number, 1);
        assert!(validated.warnings.is_empty());
    }

    #[test]
    fn missing_required_key_is_named() {
        let mut config = minimal();
        config.as_object_mut().unwrap().remove("work_breakdown");
        let err = loader().validate("t.json", &config).unwrap_err();
        assert!(err.mentions("work_breakdown"));
        assert_eq!(err.violations[0].code, ViolationCode::SchemaMissingKey);
    }

    #[test]
    fn collects_all_violations_in_batch_mode() {
        let mut config = minimal();
        let obj = config.as_object_mut().unwrap();
        obj.remove("prerequisites");
        obj.remove("resources");
        obj["phase"]["number"] = json!("one");
        let err = loader().validate("t.json", &config).unwrap_err();
        assert!(err.mentions("prerequisites"));
        assert!(err.mentions("resources"));
        assert!(err
            .violations
            .iter()
            .any(|v| v.code == ViolationCode::SchemaWrongKind && v.path == "phase.number"));
    }

    #[test]
    fn fail_fast_stops_at_first_error() {
        let mut config = minimal();
        let obj = config.as_object_mut().unwrap();
        obj.remove("prerequisites");
        obj.remove("resources");
        let err = loader()
            .mode(RunMode::FailFast)
            .validate("t.json", &config)
            .unwrap_err();
        assert_eq!(err.errors().count(), 1);
    }

    #[test]
    fn invalid_enum_value_is_reported() {
        let mut config = minimal();
        config["work_breakdown"][0]["work_unit_context"]["complexity"] = json!("Extreme");
        let err = loader().validate("t.json", &config).unwrap_err();
        let v = err
            .violations
            .iter()
            .find(|v| v.code == ViolationCode::SchemaInvalidEnum)
            .unwrap();
        assert_eq!(v.path, "work_breakdown[0].work_unit_context.complexity");
    }

    #[test]
    fn unknown_keys_are_warnings() {
        let mut config = minimal();
        config["phase"]["owner"] = json!("platform team");
        config["extra_section"] = json!({});
        let validated = loader().validate("t.json", &config).unwrap();
        let mut paths: Vec<&str> = validated.warnings.iter().map(|w| w.path.as_str()).collect();
        paths.sort_unstable();
        assert_eq!(paths, vec!["extra_section", "phase.owner"]);
        assert!(validated
            .warnings
            .iter()
            .all(|w| w.severity == Severity::Warning));
    }

    #[test]
    fn version_mismatch_is_an_error() {
        let mut config = minimal();
        config["schema_version"] = json!("2.0");
        let err = loader().validate("t.json", &config).unwrap_err();
        assert!(err.mentions("schema_version"));
    }

    #[test]
    fn skipped_checkpoint_number_is_rejected() {
        let mut config = minimal();
        config["work_breakdown"][0]["checkpoint"]["number"] = json!(2);
        let err = loader().validate("t.json", &config).unwrap_err();
        assert!(err
            .violations
            .iter()
            .any(|v| v.code == ViolationCode::SchemaNumbering && v.message.contains("checkpoint 1")));
    }

    #[test]
    fn checkpoint_number_has_an_upper_bound() {
        let mut config = minimal();
        config["work_breakdown"][0]["checkpoint"]["number"] = json!(2_000_000);
        let err = loader().validate("t.json", &config).unwrap_err();
        assert_eq!(err.violations.len(), 1);
        assert_eq!(err.violations[0].code, ViolationCode::SchemaConstraint);
        assert_eq!(err.violations[0].path, "work_breakdown[0].checkpoint.number");
    }

    #[test]
    fn large_checkpoint_gap_is_one_violation() {
        let mut config: PhaseConfig = serde_json::from_value(minimal()).unwrap();
        config.work_breakdown[0]
            .checkpoint
            .as_mut()
            .unwrap()
            .number = 2_000_000;
        let mut found = Collector::new(RunMode::Batch);
        check_numbering(&config, &mut found);
        assert_eq!(found.violations.len(), 1);
        assert_eq!(found.violations[0].message, "checkpoints 1..=1999999 are skipped");
    }

    #[test]
    fn invalid_json_is_a_parse_violation() {
        let err = loader().validate_str("t.json", "{ not json").unwrap_err();
        assert_eq!(err.violations[0].code, ViolationCode::SchemaParse);
    }

    #[test]
    fn pointer_conversion() {
        assert_eq!(pointer_to_path("/work_breakdown/0/tasks"), "work_breakdown[0].tasks");
        assert_eq!(pointer_to_path(""), "");
    }
}
