//! Errors produced while turning a raw label selector into a matcher.

use thiserror::Error;

/// A label selector that cannot be evaluated.
///
/// Selectors arrive from user-edited configuration, so every variant is a recoverable
/// data-quality condition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
	/// The key is not a qualified label name.
	#[error("invalid label key {key:?}: {reason}")]
	InvalidKey {
		/// Offending key.
		key: String,
		/// What rule the key breaks.
		reason: &'static str,
	},

	/// A value is not a valid label value.
	#[error("invalid label value {value:?} for key {key:?}: {reason}")]
	InvalidValue {
		/// Key the value belongs to.
		key: String,
		/// Offending value.
		value: String,
		/// What rule the value breaks.
		reason: &'static str,
	},

	/// The expression operator is not one of `In`, `NotIn`, `Exists`, `DoesNotExist`.
	#[error("{0:?} is not a valid label selector operator")]
	UnknownOperator(String),

	/// `In`/`NotIn` without any value.
	#[error("values for key {key:?} must be non-empty for operator {operator}")]
	MissingValues {
		/// Key of the expression.
		key: String,
		/// Operator that requires values.
		operator: &'static str,
	},

	/// `Exists`/`DoesNotExist` with values.
	#[error("values for key {key:?} must be empty for operator {operator}")]
	UnexpectedValues {
		/// Key of the expression.
		key: String,
		/// Operator that forbids values.
		operator: &'static str,
	},
}

/// Result type for selector parsing.
pub type Result<T> = std::result::Result<T, SelectorError>;
