//! Kubernetes label selectors.
//!
//! A [`LabelSelector`] as stored in configuration is only data: its keys and values may be
//! malformed and its operators misspelled. [`Selector::parse`] validates it with the same rules
//! the API server applies, after which [`Selector::matches`] can be evaluated against any label
//! set.
//!
//! ```
//! use std::collections::BTreeMap;
//!
//! use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
//! use nodeward_selector::Selector;
//!
//! let raw = LabelSelector {
//! 	match_labels: Some(BTreeMap::from([("host-name".to_string(), "node-1".to_string())])),
//! 	..Default::default()
//! };
//! let selector = Selector::parse(&raw).unwrap();
//!
//! let labels = BTreeMap::from([("host-name".to_string(), "node-1".to_string())]);
//! assert!(selector.matches(&labels));
//! assert_eq!(selector.to_string(), "host-name=node-1");
//! ```

mod error;
mod validate;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub use error::{Result, SelectorError};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;

/// Comparison applied by one [`Requirement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
	/// `key=value`, produced by `matchLabels`.
	Equals,
	/// `key in (a,b)`.
	In,
	/// `key notin (a,b)`. Satisfied when the key is absent.
	NotIn,
	/// `key`.
	Exists,
	/// `!key`.
	DoesNotExist,
}

impl Operator {
	/// Name as written in a `matchExpressions` entry.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Equals => "Equals",
			Self::In => "In",
			Self::NotIn => "NotIn",
			Self::Exists => "Exists",
			Self::DoesNotExist => "DoesNotExist",
		}
	}

	const fn takes_values(self) -> bool {
		matches!(self, Self::Equals | Self::In | Self::NotIn)
	}
}

impl FromStr for Operator {
	type Err = SelectorError;

	fn from_str(s: &str) -> Result<Self> {
		match s {
			"In" => Ok(Self::In),
			"NotIn" => Ok(Self::NotIn),
			"Exists" => Ok(Self::Exists),
			"DoesNotExist" => Ok(Self::DoesNotExist),
			other => Err(SelectorError::UnknownOperator(other.to_string())),
		}
	}
}

/// One validated `key operator values` term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
	key: String,
	operator: Operator,
	/// Sorted and deduplicated.
	values: Vec<String>,
}

impl Requirement {
	/// Validates and builds a requirement.
	pub fn new(key: impl Into<String>, operator: Operator, values: Vec<String>) -> Result<Self> {
		let key = key.into();
		validate::label_key(&key)?;

		if operator.takes_values() && values.is_empty() {
			return Err(SelectorError::MissingValues {
				key,
				operator: operator.as_str(),
			});
		}
		if !operator.takes_values() && !values.is_empty() {
			return Err(SelectorError::UnexpectedValues {
				key,
				operator: operator.as_str(),
			});
		}
		for value in &values {
			validate::label_value(&key, value)?;
		}

		let mut values = values;
		values.sort();
		values.dedup();
		Ok(Self { key, operator, values })
	}

	/// Label key this requirement inspects.
	pub fn key(&self) -> &str {
		&self.key
	}

	/// Comparison operator.
	pub const fn operator(&self) -> Operator {
		self.operator
	}

	/// Returns true when `labels` satisfies this requirement.
	pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
		let listed = |value: &String| self.values.binary_search(value).is_ok();
		match self.operator {
			Operator::Equals | Operator::In => labels.get(&self.key).is_some_and(listed),
			Operator::NotIn => labels.get(&self.key).is_none_or(|value| !listed(value)),
			Operator::Exists => labels.contains_key(&self.key),
			Operator::DoesNotExist => !labels.contains_key(&self.key),
		}
	}
}

impl fmt::Display for Requirement {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let operator = match self.operator {
			Operator::Equals => None,
			other => Some(other.as_str()),
		};
		write_term(f, &self.key, operator, &self.values)
	}
}

/// A parsed label selector: the conjunction of its requirements.
///
/// The empty selector matches every label set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
	requirements: Vec<Requirement>,
}

impl Selector {
	/// Selector matching everything.
	pub fn everything() -> Self {
		Self::default()
	}

	/// Validates `selector` and converts it into a matcher.
	///
	/// `matchLabels` entries become equality requirements; `matchExpressions` keep their
	/// operator. Requirements are kept sorted by key.
	pub fn parse(selector: &LabelSelector) -> Result<Self> {
		let mut requirements = Vec::new();

		for (key, value) in selector.match_labels.iter().flatten() {
			requirements.push(Requirement::new(key.as_str(), Operator::Equals, vec![value.clone()])?);
		}
		for expr in selector.match_expressions.iter().flatten() {
			let operator = expr.operator.parse::<Operator>()?;
			requirements.push(Requirement::new(expr.key.as_str(), operator, expr.values.clone().unwrap_or_default())?);
		}

		requirements.sort_by(|a, b| a.key.cmp(&b.key));
		Ok(Self { requirements })
	}

	/// Returns true when no requirement restricts the selection.
	pub fn is_everything(&self) -> bool {
		self.requirements.is_empty()
	}

	/// Requirements in key order.
	pub fn requirements(&self) -> &[Requirement] {
		&self.requirements
	}

	/// Returns true when `labels` satisfies every requirement.
	pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
		self.requirements.iter().all(|req| req.matches(labels))
	}
}

impl fmt::Display for Selector {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.requirements.is_empty() {
			return f.write_str(EVERYTHING);
		}
		for (idx, req) in self.requirements.iter().enumerate() {
			if idx > 0 {
				f.write_str(",")?;
			}
			write!(f, "{req}")?;
		}
		Ok(())
	}
}

const EVERYTHING: &str = "<everything>";

/// Renders a raw [`LabelSelector`] without validating it.
///
/// Used to name a selector in diagnostics, including selectors that fail to parse. Valid
/// selectors render the same text as their parsed [`Selector`].
pub fn describe(selector: &LabelSelector) -> Describe<'_> {
	Describe(selector)
}

/// Display adapter returned by [`describe`].
#[derive(Debug, Clone, Copy)]
pub struct Describe<'a>(&'a LabelSelector);

impl fmt::Display for Describe<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut terms: Vec<(&str, Option<&str>, Vec<String>)> = Vec::new();
		for (key, value) in self.0.match_labels.iter().flatten() {
			terms.push((key.as_str(), None, vec![value.clone()]));
		}
		for expr in self.0.match_expressions.iter().flatten() {
			let mut values = expr.values.clone().unwrap_or_default();
			values.sort();
			values.dedup();
			terms.push((expr.key.as_str(), Some(expr.operator.as_str()), values));
		}
		if terms.is_empty() {
			return f.write_str(EVERYTHING);
		}

		terms.sort_by(|a, b| a.0.cmp(b.0));
		for (idx, (key, operator, values)) in terms.iter().enumerate() {
			if idx > 0 {
				f.write_str(",")?;
			}
			write_term(f, key, *operator, values)?;
		}
		Ok(())
	}
}

/// `None` is a `matchLabels` equality; expression operators are rendered by name.
fn write_term(f: &mut fmt::Formatter<'_>, key: &str, operator: Option<&str>, values: &[String]) -> fmt::Result {
	match operator {
		None => write!(f, "{key}={}", values.first().map_or("", String::as_str)),
		Some("In") => write!(f, "{key} in ({})", values.join(",")),
		Some("NotIn") => write!(f, "{key} notin ({})", values.join(",")),
		Some("Exists") => f.write_str(key),
		Some("DoesNotExist") => write!(f, "!{key}"),
		Some(other) => write!(f, "{key} {other} ({})", values.join(",")),
	}
}
