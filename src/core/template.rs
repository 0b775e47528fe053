/// Field templates: parsing, loading, and rendering against a JSON scope.
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template parse error: {0}")]
    Parse(String),
    #[error("unresolved field `{0}`")]
    Unresolved(String),
    #[error("unknown template `{0}`")]
    UnknownTemplate(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// A segment of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemplateSegment {
    /// Literal text, emitted as-is.
    Literal(String),
    /// Dotted path into the scope: `{phase.title}`, `{task.tips.0.content}`.
    Field(String),
}

/// A parsed template, a sequence of segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub segments: Vec<TemplateSegment>,
}

impl Template {
    /// Parse a template string.
    ///
    /// Syntax:
    /// - `{a.b.c}` → `Field`
    /// - `{{` / `}}` → literal `{` / `}`
    /// - Everything else → `Literal`
    pub fn parse(input: &str) -> Result<Template, TemplateError> {
        let mut segments = Vec::new();
        let mut literal_buf = String::new();
        let chars: Vec<char> = input.chars().collect();
        let len = chars.len();
        let mut i = 0;

        while i < len {
            match chars[i] {
                '{' if i + 1 < len && chars[i + 1] == '{' => {
                    literal_buf.push('{');
                    i += 2;
                }
                '{' => {
                    if !literal_buf.is_empty() {
                        segments.push(TemplateSegment::Literal(std::mem::take(&mut literal_buf)));
                    }
                    let start = i + 1;
                    let mut end = start;
                    while end < len && chars[end] != '}' {
                        if chars[end] == '{' {
                            return Err(TemplateError::Parse(
                                "nested braces are not allowed".to_string(),
                            ));
                        }
                        end += 1;
                    }
                    if end == len {
                        return Err(TemplateError::Parse("unclosed brace".to_string()));
                    }
                    let content: String = chars[start..end].iter().collect();
                    segments.push(Self::parse_field(content.trim())?);
                    i = end + 1;
                }
                '}' if i + 1 < len && chars[i + 1] == '}' => {
                    literal_buf.push('}');
                    i += 2;
                }
                '}' => {
                    return Err(TemplateError::Parse(
                        "unmatched closing brace".to_string(),
                    ));
                }
                c => {
                    literal_buf.push(c);
                    i += 1;
                }
            }
        }

        if !literal_buf.is_empty() {
            segments.push(TemplateSegment::Literal(literal_buf));
        }

        Ok(Template { segments })
    }

    fn parse_field(content: &str) -> Result<TemplateSegment, TemplateError> {
        if content.is_empty() {
            return Err(TemplateError::Parse("empty braces".to_string()));
        }
        if content.split('.').any(str::is_empty) {
            return Err(TemplateError::Parse(format!(
                "invalid field path '{content}'"
            )));
        }
        Ok(TemplateSegment::Field(content.to_string()))
    }

    /// Field paths referenced by this template, in order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            TemplateSegment::Field(path) => Some(path.as_str()),
            TemplateSegment::Literal(_) => None,
        })
    }

    /// Render against `scope`. Every field must resolve to a scalar.
    pub fn render(&self, scope: &Value) -> Result<String, TemplateError> {
        self.render_layered(&[scope])
    }

    /// Render against a stack of scopes; each field resolves in the first
    /// scope that has it.
    pub fn render_layered(&self, scopes: &[&Value]) -> Result<String, TemplateError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                TemplateSegment::Literal(text) => out.push_str(text),
                TemplateSegment::Field(path) => {
                    let value = scopes
                        .iter()
                        .find_map(|scope| resolve(scope, path))
                        .ok_or_else(|| TemplateError::Unresolved(path.clone()))?;
                    out.push_str(&value);
                }
            }
        }
        Ok(out)
    }
}

/// Look up a dotted path and format the scalar found there. Missing keys,
/// `null`, and containers all count as unresolved.
pub fn resolve(scope: &Value, path: &str) -> Option<String> {
    let mut current = scope;
    for key in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(key),
            Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }?;
    }
    match current {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Named templates for one document type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateSet {
    pub templates: FxHashMap<String, Template>,
}

impl TemplateSet {
    /// Load a template set from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<TemplateSet, TemplateError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse a RON map of `name: "template text"`.
    pub fn parse_ron(input: &str) -> Result<TemplateSet, TemplateError> {
        let raw: FxHashMap<String, String> = ron::from_str(input)?;
        let mut templates = FxHashMap::default();
        for (name, text) in raw {
            let template = Template::parse(&text)
                .map_err(|e| TemplateError::Parse(format!("{name}: {e}")))?;
            templates.insert(name, template);
        }
        Ok(TemplateSet { templates })
    }

    /// Merge another set into this one; entries in `other` win.
    pub fn merge(&mut self, other: TemplateSet) {
        self.templates.extend(other.templates);
    }

    pub fn get(&self, name: &str) -> Result<&Template, TemplateError> {
        self.templates
            .get(name)
            .ok_or_else(|| TemplateError::UnknownTemplate(name.to_string()))
    }

    pub fn render(&self, name: &str, scope: &Value) -> Result<String, TemplateError> {
        self.get(name)?.render(scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_literal_only() {
        let t = Template::parse("## Overview").unwrap();
        assert_eq!(
            t.segments,
            vec![TemplateSegment::Literal("## Overview".to_string())]
        );
    }

    #[test]
    fn parse_field() {
        let t = Template::parse("# Phase {phase.number}: {phase.title} - Work Plan").unwrap();
        assert_eq!(t.segments.len(), 5);
        assert_eq!(t.segments[1], TemplateSegment::Field("phase.number".to_string()));
        assert_eq!(t.fields().collect::<Vec<_>>(), vec!["phase.number", "phase.title"]);
    }

    #[test]
    fn parse_escaped_braces() {
        let t = Template::parse("Use {{braces}} here.").unwrap();
        assert_eq!(
            t.segments,
            vec![TemplateSegment::Literal("Use {braces} here.".to_string())]
        );
    }

    #[test]
    fn parse_errors() {
        assert!(Template::parse("Bad {} here").is_err());
        assert!(Template::parse("Bad {outer{inner}} here").is_err());
        assert!(Template::parse("Bad {unclosed here").is_err());
        assert!(Template::parse("Bad } here").is_err());
        assert!(Template::parse("Bad {a..b} here").is_err());
    }

    #[test]
    fn render_resolves_nested_paths() {
        let scope = json!({"phase": {"number": 3, "title": "Auth"}, "items": ["x", "y"]});
        let t = Template::parse("Phase {phase.number} ({phase.title}) {items.1}").unwrap();
        assert_eq!(t.render(&scope).unwrap(), "Phase 3 (Auth) y");
    }

    #[test]
    fn render_reports_missing_field() {
        let scope = json!({"phase": {"number": 3, "focus": null}});
        let t = Template::parse("{phase.title}").unwrap();
        assert!(matches!(t.render(&scope), Err(TemplateError::Unresolved(p)) if p == "phase.title"));
        let t = Template::parse("{phase.focus}").unwrap();
        assert!(t.render(&scope).is_err());
        let t = Template::parse("{phase}").unwrap();
        assert!(t.render(&scope).is_err());
    }

    #[test]
    fn layered_scopes_prefer_the_first_match() {
        let root = json!({"phase": {"number": 3}, "title": "root"});
        let local = json!({"title": "local"});
        let t = Template::parse("{title} in phase {phase.number}").unwrap();
        assert_eq!(t.render_layered(&[&local, &root]).unwrap(), "local in phase 3");
    }

    #[test]
    fn parse_set_from_ron() {
        let set = TemplateSet::parse_ron(r###"{ "header": "# Phase {phase.number}", "overview": "## Overview" }"###)
            .unwrap();
        assert_eq!(set.templates.len(), 2);
        assert_eq!(
            set.render("header", &json!({"phase": {"number": 1}})).unwrap(),
            "# Phase 1"
        );
        assert!(matches!(set.get("footer"), Err(TemplateError::UnknownTemplate(_))));
    }

    #[test]
    fn bad_template_in_set_names_entry() {
        let err = TemplateSet::parse_ron(r#"{ "broken": "{oops" }"#).unwrap_err();
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn merge_precedence() {
        let mut base = TemplateSet::parse_ron(r#"{ "shared": "base", "base_only": "kept" }"#).unwrap();
        let other = TemplateSet::parse_ron(r#"{ "shared": "override" }"#).unwrap();
        base.merge(other);
        assert_eq!(base.render("shared", &Value::Null).unwrap(), "override");
        assert_eq!(base.render("base_only", &Value::Null).unwrap(), "kept");
    }
}
