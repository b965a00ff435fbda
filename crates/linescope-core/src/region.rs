use std::ops::Range;

use regex::Regex;
use tracing::{debug, trace};

use crate::editor::{Action, Editor, Side};
use crate::EditError;

/// Resolved bounds of a scope against the current lines.
///
/// `None` means unbounded on that side: the start of the lines for `start`,
/// their end for `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Boundaries {
    pub start: Option<usize>,
    pub end: Option<usize>,
}

impl Boundaries {
    /// Concrete `[start, end)` range for a sequence of `len` lines.
    pub fn range(&self, len: usize) -> Range<usize> {
        self.start.unwrap_or(0)..self.end.unwrap_or(len)
    }
}

/// Boundary declaration of one node in the scope chain.
#[derive(Debug, Clone, Copy, Default)]
struct Scope<'a> {
    parent: Option<&'a Scope<'a>>,
    after: Option<&'a str>,
    before: Option<&'a str>,
}

impl<'a> Scope<'a> {
    fn child(parent: &'a Scope<'a>, side: Side, marker: &'a str) -> Self {
        match side {
            Side::After => Scope {
                parent: Some(parent),
                after: Some(marker),
                before: None,
            },
            Side::Before => Scope {
                parent: Some(parent),
                after: None,
                before: Some(marker),
            },
        }
    }

    fn resolve(&self, lines: &[String]) -> Result<Boundaries, EditError> {
        let inherited = match self.parent {
            Some(parent) => parent.resolve(lines)?,
            None => Boundaries::default(),
        };
        let window = inherited.range(lines.len());

        let start = match self.after {
            Some(marker) => Some(lookup(lines, marker, Side::After, &window)? + 1),
            None => inherited.start,
        };
        let end = match self.before {
            Some(marker) => Some(lookup(lines, marker, Side::Before, &window)?),
            None => inherited.end,
        };
        Ok(Boundaries { start, end })
    }
}

fn lookup(lines: &[String], marker: &str, side: Side, window: &Range<usize>) -> Result<usize, EditError> {
    lines[window.clone()]
        .iter()
        .position(|l| l == marker)
        .map(|offset| window.start + offset)
        .ok_or_else(|| EditError::MarkerNotFound {
            marker: marker.to_string(),
            side,
            window: window.clone(),
        })
}

/// Editor applying operations to a shared sequence of lines, restricted to the
/// region delimited by its chain of `before`/`after` markers.
///
/// Boundaries are resolved again for every operation, so an insertion made in
/// one scope is reflected by every scope resolved afterwards.
pub struct RegionEditor<'a> {
    lines: &'a mut Vec<String>,
    scope: Scope<'a>,
}

impl<'a> RegionEditor<'a> {
    /// Root editor over the whole of `lines`.
    pub fn new(lines: &'a mut Vec<String>) -> Self {
        Self {
            lines,
            scope: Scope::default(),
        }
    }

    pub fn lines(&self) -> &[String] {
        self.lines.as_slice()
    }

    /// Resolve this editor's marker chain against the current lines.
    pub fn boundaries(&self) -> Result<Boundaries, EditError> {
        self.scope.resolve(self.lines.as_slice())
    }

    /// The concrete index range this editor operates on.
    pub fn region(&self) -> Result<Range<usize>, EditError> {
        Ok(self.boundaries()?.range(self.lines.len()))
    }

    /// Like [`Editor::scope`], but hands the concrete child editor to `f`.
    pub fn scoped<R>(&mut self, side: Side, marker: &str, f: impl FnOnce(&mut RegionEditor<'_>) -> R) -> R {
        let mut child = RegionEditor {
            lines: &mut *self.lines,
            scope: Scope::child(&self.scope, side, marker),
        };
        f(&mut child)
    }
}

impl Editor for RegionEditor<'_> {
    fn scope(&mut self, side: Side, marker: &str, action: &mut Action<'_>) -> Result<(), EditError> {
        debug!(%side, marker, "entering scope");
        self.scoped(side, marker, |child| action(child))
    }

    fn replace(&mut self, replacement: &str) -> Result<(), EditError> {
        if self.lines.is_empty() {
            return Err(EditError::EmptyDocument);
        }
        let range = self.region()?;
        trace!(?range, replacement, "replace region");
        for line in &mut self.lines[range] {
            *line = replacement.to_string();
        }
        Ok(())
    }

    fn replace_line(&mut self, line: &str, replacement: &str) -> Result<(), EditError> {
        let range = self.region()?;
        trace!(?range, line, replacement, "replace matching lines");
        for current in &mut self.lines[range] {
            if current.as_str() == line {
                *current = replacement.to_string();
            }
        }
        Ok(())
    }

    fn replace_regex(&mut self, regex: &str, replacement: &str) -> Result<(), EditError> {
        let re = build_regex(regex)?;
        let template = replacement_template(&re, replacement)?;
        let range = self.region()?;
        trace!(?range, regex, replacement, "regex substitute");
        for line in &mut self.lines[range] {
            let new = re.replace_all(line.as_str(), template.as_str()).into_owned();
            *line = new;
        }
        Ok(())
    }

    fn insert(&mut self, lines: &[&str]) -> Result<(), EditError> {
        let at = self.boundaries()?.start.unwrap_or(0);
        trace!(at, count = lines.len(), "insert lines");
        self.lines
            .splice(at..at, lines.iter().map(|l| l.to_string()));
        Ok(())
    }
}

fn build_regex(pattern: &str) -> Result<Regex, EditError> {
    Regex::new(pattern).map_err(|source| EditError::InvalidRegex {
        pattern: pattern.to_string(),
        source,
    })
}

/// Rewrite a replacement into the `regex` crate's template syntax.
///
/// `$n` refers to group `n`, taking as many digits as still name an existing
/// group, so `$1px` is group 1 followed by `px`. `${name}` refers to a named
/// group and `\x` stands for a literal `x`.
fn replacement_template(re: &Regex, replacement: &str) -> Result<String, EditError> {
    let invalid = |reason: String| EditError::InvalidReplacement {
        replacement: replacement.to_string(),
        reason,
    };
    let groups = re.captures_len() - 1;
    let mut out = String::with_capacity(replacement.len() + 4);
    let mut chars = replacement.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('$') => out.push_str("$$"),
                Some(literal) => out.push(literal),
                None => return Err(invalid("trailing backslash".to_string())),
            },
            '$' => match chars.next() {
                Some('{') => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(ch) if ch.is_ascii_alphanumeric() => name.push(ch),
                            _ => return Err(invalid("unterminated group name".to_string())),
                        }
                    }
                    if !name.starts_with(|ch: char| ch.is_ascii_alphabetic()) {
                        return Err(invalid(format!("bad group name {name:?}")));
                    }
                    if !re.capture_names().flatten().any(|n| n == name) {
                        return Err(invalid(format!("no group named {name:?}")));
                    }
                    out.push_str(&format!("${{{name}}}"));
                }
                Some(first @ '0'..='9') => {
                    let mut group = first as usize - '0' as usize;
                    if group > groups {
                        return Err(invalid(format!("no group {group}")));
                    }
                    while let Some(digit) = chars.peek().and_then(|ch| ch.to_digit(10)) {
                        let extended = group * 10 + digit as usize;
                        if extended > groups {
                            break;
                        }
                        group = extended;
                        chars.next();
                    }
                    out.push_str(&format!("${{{group}}}"));
                }
                _ => return Err(invalid("illegal group reference".to_string())),
            },
            other => out.push(other),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn root_is_unbounded() {
        let mut buf = lines(&["a", "b"]);
        let editor = RegionEditor::new(&mut buf);
        assert_eq!(editor.boundaries().unwrap(), Boundaries::default());
        assert_eq!(editor.region().unwrap(), 0..2);
    }

    #[test]
    fn replace_between_nested_markers() {
        let mut buf = lines(&["A", "M1", "B", "M2", "C"]);
        let mut editor = RegionEditor::new(&mut buf);
        editor
            .after("M1", &mut |e| e.before("M2", &mut |e| e.replace("X")))
            .unwrap();
        assert_eq!(buf, lines(&["A", "M1", "X", "M2", "C"]));
    }

    #[test]
    fn nested_lookup_ignores_markers_outside_window() {
        // The first "END" sits before the "STAGE 2" marker and must not be picked up.
        let mut buf = lines(&["STAGE 1", "x", "END", "STAGE 2", "x", "END", "tail"]);
        let mut editor = RegionEditor::new(&mut buf);
        editor
            .after("STAGE 2", &mut |e| {
                e.before("END", &mut |e| e.replace_line("x", "y"))
            })
            .unwrap();
        assert_eq!(buf, lines(&["STAGE 1", "x", "END", "STAGE 2", "y", "END", "tail"]));
    }

    #[test]
    fn child_inherits_the_side_it_does_not_declare() {
        let buf = lines(&["a", "M", "b", "N", "c"]);
        let root = Scope::default();
        let after = Scope::child(&root, Side::After, "M");
        let between = Scope::child(&after, Side::Before, "N");
        assert_eq!(
            after.resolve(&buf).unwrap(),
            Boundaries { start: Some(2), end: None }
        );
        assert_eq!(
            between.resolve(&buf).unwrap(),
            Boundaries { start: Some(2), end: Some(3) }
        );
        assert_eq!(between.resolve(&buf).unwrap().range(buf.len()), 2..3);
    }

    #[test]
    fn scoped_exposes_child_region() {
        let mut buf = lines(&["a", "M", "b", "c", "N", "d"]);
        let mut editor = RegionEditor::new(&mut buf);
        let region = editor
            .scoped(Side::After, "M", |e| e.scoped(Side::Before, "N", |e| e.region()))
            .unwrap();
        assert_eq!(region, 2..4);
    }

    #[test]
    fn sibling_scopes_resolve_independently() {
        let mut buf = lines(&["a", "M1", "b", "c"]);
        let mut editor = RegionEditor::new(&mut buf);
        editor.after("M1", &mut |e| e.replace_line("b", "B")).unwrap();
        editor.after("M1", &mut |e| e.replace_line("c", "C")).unwrap();
        assert_eq!(buf, lines(&["a", "M1", "B", "C"]));
    }

    #[test]
    fn insert_shifts_later_resolution() {
        let mut buf = lines(&["a", "M1", "b", "M2", "c"]);
        let root = Scope::default();
        let before_m2 = Scope::child(&root, Side::Before, "M2");
        let stale = before_m2.resolve(&buf).unwrap();

        let mut editor = RegionEditor::new(&mut buf);
        editor
            .before("M2", &mut |e| e.after("M1", &mut |e| e.insert(&["x", "y"])))
            .unwrap();

        let fresh = before_m2.resolve(&buf).unwrap();
        assert_eq!(buf, lines(&["a", "M1", "x", "y", "b", "M2", "c"]));
        assert_eq!(stale.end, Some(3));
        assert_eq!(fresh.end, Some(5));
    }

    #[test]
    fn insert_ignores_end_bound() {
        let mut buf = lines(&["a", "M", "b"]);
        let mut editor = RegionEditor::new(&mut buf);
        editor.before("a", &mut |e| e.insert(&["top"])).unwrap();
        assert_eq!(buf, lines(&["top", "a", "M", "b"]));
    }

    #[test]
    fn insert_after_last_line_appends() {
        let mut buf = lines(&["a", "END"]);
        let mut editor = RegionEditor::new(&mut buf);
        editor.after("END", &mut |e| e.insert(&["x"])).unwrap();
        assert_eq!(buf, lines(&["a", "END", "x"]));
    }

    #[test]
    fn missing_marker_is_an_error() {
        let mut buf = lines(&["a", "b"]);
        let mut editor = RegionEditor::new(&mut buf);
        let err = editor.after("NOPE", &mut |e| e.replace("x")).unwrap_err();
        match err {
            EditError::MarkerNotFound { marker, side, window } => {
                assert_eq!(marker, "NOPE");
                assert_eq!(side, Side::After);
                assert_eq!(window, 0..2);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(buf, lines(&["a", "b"]));
    }

    #[test]
    fn marker_outside_parent_window_is_an_error() {
        let mut buf = lines(&["TOP", "M", "rest"]);
        let mut editor = RegionEditor::new(&mut buf);
        let err = editor
            .after("M", &mut |e| e.before("TOP", &mut |e| e.replace("x")))
            .unwrap_err();
        assert_eq!(err.marker(), Some("TOP"));
        assert!(err.to_string().contains("within lines 2..3"));
    }

    #[test]
    fn replace_on_empty_lines_fails() {
        let mut buf: Vec<String> = Vec::new();
        let mut editor = RegionEditor::new(&mut buf);
        assert!(matches!(editor.replace("x"), Err(EditError::EmptyDocument)));
    }

    #[test]
    fn replace_on_empty_region_is_noop() {
        let mut buf = lines(&["M", "N"]);
        let mut editor = RegionEditor::new(&mut buf);
        editor
            .after("M", &mut |e| e.before("N", &mut |e| e.replace("x")))
            .unwrap();
        assert_eq!(buf, lines(&["M", "N"]));
    }

    #[test]
    fn replace_line_without_match_is_noop() {
        let mut buf = lines(&["a", "b"]);
        RegionEditor::new(&mut buf).replace_line("c", "d").unwrap();
        assert_eq!(buf, lines(&["a", "b"]));
    }

    #[test]
    fn regex_replaces_all_matches_in_region() {
        let mut buf = lines(&["COPY a", "M", "COPY b c", "RUN x"]);
        let mut editor = RegionEditor::new(&mut buf);
        editor
            .after("M", &mut |e| e.replace_regex(r"(\w+) (\w)", "$2-$1"))
            .unwrap();
        assert_eq!(buf, lines(&["COPY a", "M", "b-COPY c", "x-RUN"]));
    }

    #[test]
    fn regex_non_match_leaves_line_unchanged() {
        let mut buf = lines(&["keep  this\t"]);
        RegionEditor::new(&mut buf).replace_regex("zzz", "y").unwrap();
        assert_eq!(buf, lines(&["keep  this\t"]));
    }

    #[test]
    fn group_reference_followed_by_word_characters() {
        let mut buf = lines(&["EXPOSE 8080"]);
        RegionEditor::new(&mut buf).replace_regex(r"(\d+)", "$1px").unwrap();
        assert_eq!(buf, lines(&["EXPOSE 8080px"]));
    }

    #[test]
    fn escaped_dollar_is_literal() {
        let mut buf = lines(&["price 5"]);
        RegionEditor::new(&mut buf).replace_regex(r"(\d)", r"\$$1").unwrap();
        assert_eq!(buf, lines(&["price $5"]));
    }

    #[test]
    fn group_number_stops_at_last_existing_group() {
        let mut buf = lines(&["ab"]);
        RegionEditor::new(&mut buf).replace_regex("(a)(b)", "$21${1}0").unwrap();
        assert_eq!(buf, lines(&["b1a0"]));
    }

    #[test]
    fn named_group_reference() {
        let mut buf = lines(&["FROM alpine:3"]);
        RegionEditor::new(&mut buf)
            .replace_regex(r"^FROM (?P<image>\w+):\d+$", "FROM ${image}:latest")
            .unwrap();
        assert_eq!(buf, lines(&["FROM alpine:latest"]));
    }

    #[test]
    fn reference_to_missing_group_is_an_error() {
        let mut buf = lines(&["a"]);
        let err = RegionEditor::new(&mut buf).replace_regex("(a)", "$2").unwrap_err();
        assert!(matches!(err, EditError::InvalidReplacement { ref replacement, .. } if replacement == "$2"));
        assert_eq!(buf, lines(&["a"]));
    }

    #[test]
    fn invalid_regex_fails_even_on_empty_region() {
        let mut buf = lines(&["M", "N"]);
        let mut editor = RegionEditor::new(&mut buf);
        let err = editor
            .after("M", &mut |e| e.before("N", &mut |e| e.replace_regex("(", "x")))
            .unwrap_err();
        assert!(matches!(err, EditError::InvalidRegex { ref pattern, .. } if pattern == "("));
    }
}
