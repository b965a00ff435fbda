use std::fmt;

use crate::EditError;

/// Callback receiving the child editor of a scoping call.
pub type Action<'a> = dyn FnMut(&mut dyn Editor) -> Result<(), EditError> + 'a;

/// Which side of a marker line a scope keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// Lines strictly before the marker.
    Before,
    /// Lines strictly after the marker.
    After,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Before => f.write_str("before"),
            Side::After => f.write_str("after"),
        }
    }
}

/// API for simple, marker-scoped edition of line-based files such as Dockerfiles.
///
/// Implemented by [`RegionEditor`](crate::RegionEditor), which mutates lines, and
/// by [`FingerprintEditor`](crate::FingerprintEditor), which records the calls.
pub trait Editor {
    /// Narrows edition to one side of `marker` and runs `action` against the
    /// narrowed editor.
    fn scope(&mut self, side: Side, marker: &str, action: &mut Action<'_>) -> Result<(), EditError>;

    /// Replaces every line of the current region with `replacement`.
    fn replace(&mut self, replacement: &str) -> Result<(), EditError>;

    /// Replaces lines of the current region equal to `line` with `replacement`.
    fn replace_line(&mut self, line: &str, replacement: &str) -> Result<(), EditError>;

    /// Substitutes every match of `regex` in each line of the current region.
    ///
    /// `replacement` may reference capture groups as `$1` or `${name}`.
    fn replace_regex(&mut self, regex: &str, replacement: &str) -> Result<(), EditError>;

    /// Inserts `lines` at the lower bound of the current region.
    fn insert(&mut self, lines: &[&str]) -> Result<(), EditError>;

    /// Restricts edition to lines after the given marker line.
    fn after(&mut self, marker: &str, action: &mut Action<'_>) -> Result<(), EditError> {
        self.scope(Side::After, marker, action)
    }

    /// Restricts edition to lines before the given marker line.
    fn before(&mut self, marker: &str, action: &mut Action<'_>) -> Result<(), EditError> {
        self.scope(Side::Before, marker, action)
    }
}

/// One unit of edits applied to a root editor.
pub trait Tweak {
    fn apply(&self, editor: &mut dyn Editor) -> Result<(), EditError>;
}

impl<F> Tweak for F
where
    F: Fn(&mut dyn Editor) -> Result<(), EditError>,
{
    fn apply(&self, editor: &mut dyn Editor) -> Result<(), EditError> {
        self(editor)
    }
}
