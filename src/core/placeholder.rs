/// Unresolved placeholder markers, shared by the generator guard and the
/// scorer's "no placeholders" check.
use once_cell::sync::Lazy;
use regex::Regex;

static BARE_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(TODO|TBD|FIXME|XXX)\b").expect("static marker pattern")
});

static BRACKETED_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[(?:PLACEHOLDER|TODO|TBD|INSERT)[^\]\n]*\]").expect("static marker pattern")
});

/// The first placeholder marker in `text` and its 1-based line.
pub fn find_marker(text: &str) -> Option<(usize, String)> {
    markers(text).into_iter().next()
}

/// Every placeholder marker in `text`, in document order, with 1-based
/// line numbers. Checkboxes (`- [ ]`) and markdown links never match.
pub fn markers(text: &str) -> Vec<(usize, String)> {
    let mut found = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let mut hits: Vec<(usize, &str)> = BRACKETED_MARKER
            .find_iter(line)
            .map(|m| (m.start(), m.as_str()))
            .collect();
        for m in BARE_MARKER.find_iter(line) {
            if !hits.iter().any(|&(start, s)| m.start() >= start && m.start() < start + s.len()) {
                hits.push((m.start(), m.as_str()));
            }
        }
        hits.sort_by_key(|&(start, _)| start);
        found.extend(hits.into_iter().map(|(_, s)| (idx + 1, s.to_string())));
    }
    found
}

pub fn count(text: &str) -> usize {
    markers(text).len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_bare_and_bracketed_markers() {
        let text = "intro\nFinish this TODO later\n- [PLACEHOLDER: owner]\n";
        assert_eq!(
            markers(text),
            vec![
                (2, "TODO".to_string()),
                (3, "[PLACEHOLDER: owner]".to_string())
            ]
        );
    }

    #[test]
    fn bracketed_todo_counts_once() {
        assert_eq!(count("see [TODO: write]"), 1);
    }

    #[test]
    fn checkboxes_and_links_are_not_markers() {
        let text = "- [ ] tests pass\n- [x] done\nSee [the guide](docs/guide.md).";
        assert!(find_marker(text).is_none());
    }

    #[test]
    fn words_containing_markers_do_not_match() {
        assert_eq!(count("TODOS and XXXL and methodTBD"), 0);
    }
}
