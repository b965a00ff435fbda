//! linescope: scoped, marker-based line editor (core library)
//!
//! Edits are expressed against an [`Editor`]: `before`/`after` narrow the
//! editable region to one side of a marker line (nestable), and the terminal
//! operations replace, substitute or insert lines inside that region.
//!
//! Two backends implement the trait. [`RegionEditor`] mutates a sequence of
//! lines. [`FingerprintEditor`] records the calls as a [`Fingerprint`] that can
//! serve as a cache key for the edit script itself.

mod editor;
mod error;
mod fingerprint;
mod region;

pub use editor::{Action, Editor, Side, Tweak};
pub use error::EditError;
pub use fingerprint::{hash_tokens, Fingerprint, FingerprintEditor};
pub use region::{Boundaries, RegionEditor};

/// Token constants emitted by [`FingerprintEditor`].
pub mod tokens {
    pub use crate::fingerprint::{BEGIN, END, INSERT, REPLACE, REPLACE_LINE, REPLACE_REGEX};
}

/// Apply `tweaks`, in order, to a root editor over `lines`.
///
/// Stops at the first failing tweak; `lines` may then hold a partial edit and
/// should be discarded by the caller.
pub fn edit_lines(lines: &mut Vec<String>, tweaks: &[&dyn Tweak]) -> Result<(), EditError> {
    let mut editor = RegionEditor::new(lines);
    for tweak in tweaks {
        tweak.apply(&mut editor)?;
    }
    Ok(())
}

/// Record the fingerprint of `tweaks` without applying them to any content.
pub fn fingerprint_of(tweaks: &[&dyn Tweak]) -> Result<Fingerprint, EditError> {
    let mut fingerprint = Fingerprint::new();
    {
        let mut editor = fingerprint.editor();
        for tweak in tweaks {
            tweak.apply(&mut editor)?;
        }
    }
    Ok(fingerprint)
}

/// The standard Dockerfile transform rewriting every `COPY` instruction to
/// `COPY --link`. Lines already using `--link` are left as they are, and only
/// `COPY` at the start of a line is rewritten.
pub fn copy_link(editor: &mut dyn Editor) -> Result<(), EditError> {
    editor.replace_regex("^COPY (?:--link )?(.*)$", "COPY --link $1")
}
