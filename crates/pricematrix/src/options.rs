//! Engine configuration

use pricematrix_core::MatrixLimits;
use serde::{Deserialize, Serialize};

/// Default number of undo steps kept per session
pub const DEFAULT_UNDO_LIMIT: usize = 100;

/// Options for a [`Session`](crate::Session)
///
/// Serializable so hosts can embed it in their own configuration files;
/// missing fields take their defaults.
///
/// ```rust
/// use pricematrix::{EngineOptions, MatrixLimits};
///
/// let options = EngineOptions::default()
///     .with_limits(MatrixLimits::new(200, 26))
///     .with_undo_limit(20);
/// assert_eq!(options.limits.max_cols, 26);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Bounds applied to every matrix of the session
    pub limits: MatrixLimits,
    /// Undo steps kept before the oldest are dropped
    pub undo_limit: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            limits: MatrixLimits::default(),
            undo_limit: DEFAULT_UNDO_LIMIT,
        }
    }
}

impl EngineOptions {
    pub fn with_limits(mut self, limits: MatrixLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_undo_limit(mut self, undo_limit: usize) -> Self {
        self.undo_limit = undo_limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let options = EngineOptions::default();
        assert_eq!(options.limits, MatrixLimits::new(5000, 500));
        assert_eq!(options.undo_limit, 100);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let options: EngineOptions =
            serde_json::from_str(r#"{"limits": {"max_rows": 10}}"#).unwrap();
        assert_eq!(options.limits, MatrixLimits::new(10, 500));
        assert_eq!(options.undo_limit, DEFAULT_UNDO_LIMIT);
    }
}
