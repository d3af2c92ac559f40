use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of patching or restoring one artifact, or a whole installation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[must_use = "RewriteResult should be checked for success/failure"]
pub struct RewriteResult {
    pub success: bool,
    /// The marker already named the requested target; nothing was rewritten.
    pub already_patched: bool,
    /// Occurrences replaced in this pass.
    pub patch_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Problems that did not fail the run, such as an unpatchable server JAR.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl RewriteResult {
    pub fn patched(patch_count: usize) -> Self {
        Self {
            success: true,
            patch_count,
            ..Self::default()
        }
    }

    pub fn already_patched() -> Self {
        Self {
            success: true,
            already_patched: true,
            ..Self::default()
        }
    }

    pub fn failed(error: impl fmt::Display) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::default()
        }
    }

    pub fn warn(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

impl fmt::Display for RewriteResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.error, self.already_patched) {
            (Some(error), _) => write!(f, "Failed: {}", error),
            (None, true) => write!(f, "Already patched"),
            (None, false) => write!(f, "Patched {} occurrence(s)", self.patch_count),
        }
    }
}
