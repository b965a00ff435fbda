use std::ops::Range;

use thiserror::Error;

use crate::editor::Side;

/// Failure raised by an editing operation.
///
/// Every variant is fatal for the tweak that triggered it: the target content
/// no longer matches what the edit script expects.
#[derive(Debug, Error)]
pub enum EditError {
    /// A `before`/`after` marker has no matching line inside the window
    /// inherited from the enclosing scope.
    #[error("unable to find line {marker:?} ({side} marker) within lines {}..{}", window.start, window.end)]
    MarkerNotFound {
        marker: String,
        side: Side,
        window: Range<usize>,
    },

    #[error("no lines to replace")]
    EmptyDocument,

    #[error("invalid regex {pattern:?}: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid replacement {replacement:?}: {reason}")]
    InvalidReplacement { replacement: String, reason: String },
}

impl EditError {
    /// The marker involved in the failure, if any.
    pub fn marker(&self) -> Option<&str> {
        match self {
            EditError::MarkerNotFound { marker, .. } => Some(marker),
            _ => None,
        }
    }
}
