/// Relative markdown links between documents of one family.
///
/// Inline links `[text](target)` and reference definitions `[id]: target`
/// are resolved against the document set. Anchors must match a heading
/// slug in the target. External links are never followed.
use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};
use std::path::{Component, Path};
use tracing::debug;

use crate::core::alignment::{DocumentSet, SourceDocument};
use crate::schema::issue::{AlignmentIssue, IssueCode, Location};

static INLINE_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"!?\[[^\]\n]*\]\(\s*<?([^)\s>]+)>?(?:\s+"[^"]*")?\s*\)"#)
        .expect("static inline link pattern")
});

static REFERENCE_DEFINITION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s{0,3}\[[^\]]+\]:\s*<?(\S+?)>?(?:\s+.*)?$").expect("static reference pattern")
});

static HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#{1,6}\s+(.+?)\s*#*\s*$").expect("static heading pattern"));

const EXTERNAL_SCHEMES: &[&str] = &["http://", "https://", "mailto:", "ftp://"];

/// GitHub-style heading anchor: lowercase, punctuation dropped, spaces
/// become hyphens.
pub fn slug(heading: &str) -> String {
    heading
        .trim()
        .to_lowercase()
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('-'),
            c if c.is_alphanumeric() || c == '-' || c == '_' => Some(c),
            _ => None,
        })
        .collect()
}

/// Anchors defined by `text`, with `-1`, `-2` suffixes for repeats.
fn anchors(text: &str) -> FxHashSet<String> {
    let mut seen: FxHashMap<String, usize> = FxHashMap::default();
    let mut out = FxHashSet::default();
    for line in prose_lines(text).map(|(_, l)| l) {
        let Some(caps) = HEADING.captures(line) else {
            continue;
        };
        let base = slug(&caps[1]);
        let count = seen.entry(base.clone()).or_insert(0);
        if *count == 0 {
            out.insert(base);
        } else {
            out.insert(format!("{base}-{count}"));
        }
        *count += 1;
    }
    out
}

/// Lines outside fenced code blocks, 1-based.
fn prose_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    let mut fenced = false;
    text.lines().enumerate().filter_map(move |(idx, line)| {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            fenced = !fenced;
            return None;
        }
        (!fenced).then_some((idx + 1, line))
    })
}

/// Every link target in `text` with its line.
fn targets(text: &str) -> Vec<(usize, String)> {
    let mut found = Vec::new();
    for (line_no, line) in prose_lines(text) {
        if let Some(caps) = REFERENCE_DEFINITION.captures(line) {
            found.push((line_no, caps[1].to_string()));
            continue;
        }
        for caps in INLINE_LINK.captures_iter(line) {
            found.push((line_no, caps[1].to_string()));
        }
    }
    found
}

/// Join `target` onto the directory of `source` and fold `.`/`..`.
/// `None` when the result climbs above the set's root.
fn resolve(source: &str, target: &str) -> Option<String> {
    let base = Path::new(source).parent().unwrap_or_else(|| Path::new(""));
    let mut parts: Vec<String> = Vec::new();
    for component in base.join(target).components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(parts.join("/"))
}

fn broken(document: &SourceDocument, line: usize, message: String) -> AlignmentIssue {
    AlignmentIssue::new(
        IssueCode::BrokenLink,
        None,
        message,
        vec![Location::new(document.path.clone(), Some(line))],
    )
}

/// Broken relative links and anchors across the set. A target may be
/// relative to the linking document or to the set's root. Targets outside
/// the set are looked up on disk when the set has a root, and are not
/// checked otherwise.
pub fn link_issues(documents: &DocumentSet) -> Vec<AlignmentIssue> {
    let by_path: FxHashMap<&str, &SourceDocument> = documents
        .documents()
        .map(|d| (d.path.as_str(), d))
        .collect();
    let mut anchor_cache: FxHashMap<&str, FxHashSet<String>> = FxHashMap::default();
    let mut issues = Vec::new();

    for document in documents.documents() {
        for (line, target) in targets(&document.text) {
            if EXTERNAL_SCHEMES.iter().any(|s| target.starts_with(s)) {
                continue;
            }
            let (file, anchor) = match target.split_once('#') {
                Some((file, anchor)) => (file, Some(anchor)),
                None => (target.as_str(), None),
            };

            // Relative to the linking document first, then to the set's root.
            let candidates: Vec<String> = if file.is_empty() {
                vec![document.path.clone()]
            } else {
                [resolve(&document.path, file), resolve("", file)]
                    .into_iter()
                    .flatten()
                    .collect()
            };
            let in_set = candidates.iter().find_map(|p| by_path.get(p.as_str()).copied());

            let Some(linked) = in_set else {
                let Some(root) = &documents.root else {
                    continue;
                };
                let beside = Path::new(&document.path)
                    .parent()
                    .map(|dir| root.join(dir).join(file))
                    .unwrap_or_else(|| root.join(file));
                if !beside.exists() && !candidates.iter().any(|p| root.join(p).exists()) {
                    issues.push(broken(
                        document,
                        line,
                        format!("broken link '{target}' in {}: file not found", document.path),
                    ));
                }
                continue;
            };

            let Some(anchor) = anchor.filter(|a| !a.is_empty()) else {
                continue;
            };
            let known = anchor_cache
                .entry(linked.path.as_str())
                .or_insert_with(|| anchors(&linked.text));
            if !known.contains(&anchor.to_lowercase()) {
                issues.push(broken(
                    document,
                    line,
                    format!(
                        "anchor '#{anchor}' not found in {} (linked from {})",
                        linked.path, document.path
                    ),
                ));
            }
        }
    }
    debug!(issues = issues.len(), "link check complete");
    issues
}
