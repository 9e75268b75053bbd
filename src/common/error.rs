//! Error types for sketch operations

use std::fmt;

/// Errors that can occur during sketch operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SketchError {
    /// Invalid parameter provided to sketch constructor or operation
    InvalidParameter {
        /// Parameter name
        param: String,
        /// Invalid value provided
        value: String,
        /// Constraint that was violated
        constraint: String,
    },

    /// Observer called on a sketch that has never been inserted into
    EmptySketch,

    /// A requested quantile fraction was outside `[0, 1]`
    InvalidFraction {
        /// The offending fraction
        value: f64,
    },

    /// Attempted to merge sketches built with different parameters
    IncompatibleParameters {
        /// Reason for incompatibility
        reason: String,
    },
}

impl fmt::Display for SketchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SketchError::InvalidParameter {
                param,
                value,
                constraint,
            } => {
                write!(
                    f,
                    "Invalid parameter '{}': value '{}' {}",
                    param, value, constraint
                )
            }
            SketchError::EmptySketch => {
                write!(f, "operation requires at least one inserted value")
            }
            SketchError::InvalidFraction { value } => {
                write!(f, "quantile fraction {} is outside [0, 1]", value)
            }
            SketchError::IncompatibleParameters { reason } => {
                write!(f, "incompatible sketches: {}", reason)
            }
        }
    }
}

impl std::error::Error for SketchError {}

/// Result type alias for sketch operations
pub type Result<T> = std::result::Result<T, SketchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_mention_the_field() {
        let err = SketchError::InvalidFraction { value: 1.5 };
        assert!(err.to_string().contains("1.5"));

        let err = SketchError::IncompatibleParameters {
            reason: "k mismatch: 100 vs 200".to_string(),
        };
        assert!(err.to_string().contains("k mismatch"));
    }

    #[test]
    fn empty_sketch_is_equatable() {
        assert_eq!(SketchError::EmptySketch, SketchError::EmptySketch);
    }
}
