//! linescope: scoped, marker-based line editor for generated build files
//!
//! This crate wraps the editing engine of `linescope-core` with a textual edit
//! script format, file application, configuration and cache stamps for the
//! `linescope` and `scopeview` CLIs.

pub mod config;
mod error;
pub mod files;
pub mod job;
mod script;
pub mod stamp;

#[cfg(feature = "pyo3")]
mod python;

pub use error::Error;
pub use linescope_core::{
    copy_link, edit_lines, fingerprint_of, Action, Boundaries, EditError, Editor, Fingerprint,
    FingerprintEditor, RegionEditor, Side, Tweak,
};
pub use script::{Script, ScriptError, Step};

/// Apply the edit script `script` to `text`, returning the edited lines.
pub fn edit_text(text: &str, script: &Script) -> Result<Vec<String>, EditError> {
    let mut lines = files::split_lines(text);
    edit_lines(&mut lines, &[script])?;
    Ok(lines)
}
