use std::path::Path;
use std::str::FromStr;

use linescope_core::{EditError, Editor, Side, Tweak};
use thiserror::Error;

use crate::Error;

/// Parse failure, with the 1-based script line it occurred on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct ScriptError {
    pub line: usize,
    pub message: String,
}

impl ScriptError {
    fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// One statement of an edit script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// `after`/`before` block.
    Scope {
        side: Side,
        marker: String,
        body: Vec<Step>,
    },
    /// `fill`: replace every line of the region.
    Fill(String),
    /// `replace`: replace lines equal to `line`.
    Replace { line: String, replacement: String },
    /// `regex`: substitute every match in each line of the region.
    Regex { pattern: String, replacement: String },
    /// `insert`: insert lines at the start of the region.
    Insert(Vec<String>),
}

/// A parsed edit script.
///
/// ```text
/// after /FROM builder/ {
///     before |WORKDIR /home/app| {
///         replace /RUN old/RUN new/
///     }
///     insert
///     ENV A=1
///     .
/// }
/// regex /^EXPOSE (\d+)$/EXPOSE 9$1/
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    steps: Vec<Step>,
}

impl Script {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn parse(text: &str) -> Result<Self, ScriptError> {
        parse_script(text).map(Self::new)
    }

    /// Read and parse the script at `path`.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text).map_err(|source| Error::Script {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl FromStr for Script {
    type Err = ScriptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Tweak for Script {
    fn apply(&self, editor: &mut dyn Editor) -> Result<(), EditError> {
        run_steps(&self.steps, editor)
    }
}

fn run_steps(steps: &[Step], editor: &mut dyn Editor) -> Result<(), EditError> {
    for step in steps {
        match step {
            Step::Scope { side, marker, body } => {
                editor.scope(*side, marker, &mut |child| run_steps(body, child))?
            }
            Step::Fill(text) => editor.replace(text)?,
            Step::Replace { line, replacement } => editor.replace_line(line, replacement)?,
            Step::Regex {
                pattern,
                replacement,
            } => editor.replace_regex(pattern, replacement)?,
            Step::Insert(lines) => {
                let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
                editor.insert(&lines)?
            }
        }
    }
    Ok(())
}

struct Frame {
    opened_at: usize,
    side: Side,
    marker: String,
    body: Vec<Step>,
}

fn parse_script(text: &str) -> Result<Vec<Step>, ScriptError> {
    let mut lines = text
        .split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .enumerate()
        .map(|(i, l)| (i + 1, l));

    let mut root = Vec::new();
    let mut open: Vec<Frame> = Vec::new();

    while let Some((lineno, raw)) = lines.next() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line == "}" {
            let frame = open
                .pop()
                .ok_or_else(|| ScriptError::new(lineno, "unbalanced '}'"))?;
            let step = Step::Scope {
                side: frame.side,
                marker: frame.marker,
                body: frame.body,
            };
            push_step(&mut root, &mut open, step);
            continue;
        }

        let (keyword, rest) = split_keyword(line);
        let step = match keyword {
            "after" | "before" => {
                let side = if keyword == "after" { Side::After } else { Side::Before };
                let (mut fields, trailing) = parse_fields(lineno, rest, 1, true)?;
                if trailing.trim() != "{" {
                    return Err(ScriptError::new(
                        lineno,
                        format!("expected '{{' after {keyword} marker"),
                    ));
                }
                open.push(Frame {
                    opened_at: lineno,
                    side,
                    marker: fields.remove(0),
                    body: Vec::new(),
                });
                continue;
            }
            "fill" => {
                let mut fields = parse_terminal(lineno, rest, 1)?;
                Step::Fill(fields.remove(0))
            }
            "replace" => {
                let mut fields = parse_terminal(lineno, rest, 2)?;
                let replacement = fields.remove(1);
                Step::Replace {
                    line: fields.remove(0),
                    replacement,
                }
            }
            "regex" => {
                let mut fields = parse_terminal(lineno, rest, 2)?;
                let replacement = fields.remove(1);
                Step::Regex {
                    pattern: fields.remove(0),
                    replacement,
                }
            }
            "insert" => {
                if !rest.trim().is_empty() {
                    return Err(ScriptError::new(
                        lineno,
                        format!("unexpected trailing characters: {:?}", rest.trim()),
                    ));
                }
                let indent = &raw[..raw.len() - raw.trim_start().len()];
                Step::Insert(read_text_block(lineno, indent, &mut lines)?)
            }
            other => {
                return Err(ScriptError::new(lineno, format!("unknown statement: {other}")));
            }
        };
        push_step(&mut root, &mut open, step);
    }

    if let Some(frame) = open.last() {
        return Err(ScriptError::new(
            frame.opened_at,
            format!("unclosed {} block", frame.side),
        ));
    }
    Ok(root)
}

fn push_step(root: &mut Vec<Step>, open: &mut [Frame], step: Step) {
    match open.last_mut() {
        Some(frame) => frame.body.push(step),
        None => root.push(step),
    }
}

fn split_keyword(line: &str) -> (&str, &str) {
    let end = line
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(line.len());
    line.split_at(end)
}

fn parse_terminal(lineno: usize, rest: &str, count: usize) -> Result<Vec<String>, ScriptError> {
    let (fields, trailing) = parse_fields(lineno, rest, count, false)?;
    if !trailing.trim().is_empty() {
        return Err(ScriptError::new(
            lineno,
            format!("unexpected trailing characters: {:?}", trailing.trim()),
        ));
    }
    Ok(fields)
}

/// Parse `count` fields separated by the delimiter that opens `input`.
///
/// The closing delimiter of the last field may be omitted when that field is
/// not empty and `require_close` is false.
fn parse_fields(
    lineno: usize,
    input: &str,
    count: usize,
    require_close: bool,
) -> Result<(Vec<String>, &str), ScriptError> {
    let input = input.trim_start();
    let delim = input
        .chars()
        .next()
        .ok_or_else(|| ScriptError::new(lineno, "missing delimiter"))?;
    if delim.is_alphanumeric() || delim.is_whitespace() || delim == '\\' {
        return Err(ScriptError::new(lineno, format!("invalid delimiter: {delim:?}")));
    }

    let mut rest = &input[delim.len_utf8()..];
    let mut fields = Vec::with_capacity(count);
    for idx in 0..count {
        let last = idx + 1 == count;
        let (field, after, closed) = scan_to_delim(rest, delim);
        if !closed && (!last || require_close || field.is_empty()) {
            return Err(ScriptError::new(
                lineno,
                format!("expected {count} field(s) delimited by {delim:?}"),
            ));
        }
        fields.push(field);
        rest = after;
    }
    Ok((fields, rest))
}

/// Scan for the next unescaped `delim`, returning (content, rest_after_delim, found).
///
/// `\<delim>` yields the delimiter; any other backslash sequence is kept as is.
fn scan_to_delim(input: &str, delim: char) -> (String, &str, bool) {
    let mut out = String::new();
    let mut escaped = false;
    for (idx, ch) in input.char_indices() {
        if escaped {
            if ch != delim {
                out.push('\\');
            }
            out.push(ch);
            escaped = false;
            continue;
        }
        if ch == '\\' {
            escaped = true;
            continue;
        }
        if ch == delim {
            return (out, &input[idx + ch.len_utf8()..], true);
        }
        out.push(ch);
    }
    if escaped {
        out.push('\\');
    }
    (out, "", false)
}

/// Read text lines up to a lone `.`; `..` stands for a literal `.` line.
///
/// The indentation of the `insert` statement is stripped from each line.
fn read_text_block<'a>(
    opened_at: usize,
    indent: &str,
    it: &mut impl Iterator<Item = (usize, &'a str)>,
) -> Result<Vec<String>, ScriptError> {
    let mut out = Vec::new();
    loop {
        match it.next() {
            None => {
                return Err(ScriptError::new(
                    opened_at,
                    "unexpected end of script while reading insert text",
                ))
            }
            Some((_, line)) => {
                let line = line.strip_suffix('\r').unwrap_or(line);
                let line = line.strip_prefix(indent).unwrap_or(line);
                match line {
                    "." => break,
                    ".." => out.push(".".to_string()),
                    _ => out.push(line.to_string()),
                }
            }
        }
    }
    Ok(out)
}
