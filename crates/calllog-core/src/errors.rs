//! Error types shared by the foundation crate.

use thiserror::Error;

/// Errors raised while parsing or validating core values.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A string did not name any variant of the expected enum.
    #[error("unknown {kind}: {value}")]
    UnknownVariant {
        /// Which enum was being parsed (e.g. `grouping mode`).
        kind: &'static str,
        /// The rejected input.
        value: String,
    },

    /// A field carried a value outside its domain.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        /// Field name.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Convenience type alias for core results.
pub type Result<T> = std::result::Result<T, CoreError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_variant_display() {
        let err = CoreError::UnknownVariant {
            kind: "grouping mode",
            value: "byColor".into(),
        };
        assert_eq!(err.to_string(), "unknown grouping mode: byColor");
    }

    #[test]
    fn invalid_value_display() {
        let err = CoreError::InvalidValue {
            field: "direction",
            reason: "expected 0 or 1, got 7".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid value for direction: expected 0 or 1, got 7"
        );
    }
}
