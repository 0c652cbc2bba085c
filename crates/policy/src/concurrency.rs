//! Data-path concurrency resolution.
//!
//! The effective number for a node is chosen in tiers:
//!
//! 1. the caller's fallback, when no usable configuration exists or the cluster-wide number is
//!    not positive;
//! 2. the cluster-wide number, when no per-node rule applies;
//! 3. the smallest number among valid rules whose selector matches the node's labels.
//!
//! Every failure along the way degrades to the previous tier. The outcome of each step is kept
//! in a [`Resolution`] and rendered into log lines, so callers and tests can inspect the same
//! decisions operators read.

use std::collections::BTreeMap;
use std::fmt;
use std::num::NonZeroUsize;

use nodeward_selector::{Selector, SelectorError, describe};

use crate::config::RuledConfigs;
use crate::source::{ConfigSource, NodeLookup, SourceError};

/// How the resolver arrived at its number.
#[derive(Debug)]
pub enum ConcurrencyDecision {
	/// The configuration could not be fetched.
	ConfigUnavailable {
		/// Number returned.
		fallback: NonZeroUsize,
		/// Fetch failure.
		error: SourceError,
	},
	/// No configuration object, or no concurrency section in it.
	ConfigNotFound {
		/// Number returned.
		fallback: NonZeroUsize,
	},
	/// The cluster-wide number is not positive. Rules are not evaluated.
	InvalidGlobal {
		/// Configured value.
		global: i64,
		/// Number returned.
		fallback: NonZeroUsize,
	},
	/// No per-node rules are configured.
	Global {
		/// Number returned.
		global: NonZeroUsize,
	},
	/// The node object could not be fetched.
	NodeUnavailable {
		/// Name of this node.
		node: String,
		/// Number returned.
		global: NonZeroUsize,
		/// Lookup failure.
		error: SourceError,
	},
	/// Rules exist but none is valid and matching.
	PerNodeNotFound {
		/// Name of this node.
		node: String,
		/// Number returned.
		global: NonZeroUsize,
	},
	/// The smallest matching rule wins.
	PerNode {
		/// Name of this node.
		node: String,
		/// Number returned.
		number: NonZeroUsize,
		/// Cluster-wide number it overrides.
		global: NonZeroUsize,
	},
}

impl ConcurrencyDecision {
	/// The resolved concurrency.
	pub fn number(&self) -> NonZeroUsize {
		match self {
			Self::ConfigUnavailable { fallback, .. } | Self::ConfigNotFound { fallback } | Self::InvalidGlobal { fallback, .. } => *fallback,
			Self::Global { global } | Self::NodeUnavailable { global, .. } | Self::PerNodeNotFound { global, .. } => *global,
			Self::PerNode { number, .. } => *number,
		}
	}

	fn emit(&self) {
		match self {
			Self::ConfigUnavailable { error, .. } => tracing::error!(error = %error, "{}", self),
			Self::ConfigNotFound { .. } => tracing::info!("{}", self),
			Self::InvalidGlobal { .. } => tracing::warn!("{}", self),
			Self::Global { .. } => {}
			Self::NodeUnavailable { node, error, .. } => tracing::warn!(node = %node, error = %error, "{}", self),
			Self::PerNodeNotFound { node, .. } | Self::PerNode { node, .. } => tracing::info!(node = %node, "{}", self),
		}
	}
}

impl fmt::Display for ConcurrencyDecision {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::ConfigUnavailable { .. } => f.write_str("failed to get node agent configs"),
			Self::ConfigNotFound { fallback } => write!(f, "concurrency configs are not found, use the default number {fallback}"),
			Self::InvalidGlobal { global, fallback } => write!(f, "global number {global} is invalid, use the default value {fallback}"),
			Self::Global { global } => write!(f, "use the global number {global}"),
			Self::NodeUnavailable { node, global, .. } => write!(f, "failed to get node info for {node}, use the global number {global}"),
			Self::PerNodeNotFound { node, global } => write!(f, "per node number for node {node} is not found, use the global number {global}"),
			Self::PerNode { node, number, global } => write!(f, "use the per node number {number} over global number {global} for node {node}"),
		}
	}
}

/// Why a rule was dropped before matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleSkip {
	/// The selector does not parse.
	InvalidSelector {
		/// Rendered selector.
		selector: String,
		/// Parse failure.
		error: SelectorError,
	},
	/// The rule's number is not positive.
	InvalidNumber {
		/// Rendered selector.
		selector: String,
		/// Configured value.
		number: i64,
	},
}

impl RuleSkip {
	/// Rendered selector of the skipped rule.
	pub fn selector(&self) -> &str {
		match self {
			Self::InvalidSelector { selector, .. } | Self::InvalidNumber { selector, .. } => selector,
		}
	}
}

impl fmt::Display for RuleSkip {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::InvalidSelector { selector, .. } => write!(f, "failed to parse rule with label selector {selector}, skip it"),
			Self::InvalidNumber { selector, number } => write!(f, "rule with label selector {selector} is with an invalid number {number}, skip it"),
		}
	}
}

/// Result of evaluating one per-node rule against this node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOutcome {
	/// Dropped for a data-quality problem.
	Skipped(RuleSkip),
	/// Valid, but the selector does not match.
	Unmatched,
	/// Valid and matching.
	Candidate(NonZeroUsize),
}

impl RuleOutcome {
	/// Number offered by a matching rule.
	pub const fn candidate(&self) -> Option<NonZeroUsize> {
		match self {
			Self::Candidate(number) => Some(*number),
			_ => None,
		}
	}
}

/// Evaluates one rule against a node's labels.
///
/// Selector syntax and the number are validated before matching, so a broken rule is reported
/// on every node, not only on the nodes it would have selected.
pub fn evaluate_rule(rule: &RuledConfigs, labels: &BTreeMap<String, String>) -> RuleOutcome {
	let selector = match Selector::parse(&rule.node_selector) {
		Ok(selector) => selector,
		Err(error) => {
			return RuleOutcome::Skipped(RuleSkip::InvalidSelector {
				selector: describe(&rule.node_selector).to_string(),
				error,
			});
		}
	};
	let Some(number) = positive(rule.number) else {
		return RuleOutcome::Skipped(RuleSkip::InvalidNumber {
			selector: selector.to_string(),
			number: rule.number,
		});
	};
	if selector.matches(labels) { RuleOutcome::Candidate(number) } else { RuleOutcome::Unmatched }
}

/// Everything the resolver decided in one pass.
#[derive(Debug)]
pub struct Resolution {
	/// Final decision.
	pub decision: ConcurrencyDecision,
	/// Per-rule outcomes in configuration order. Empty when rules were not evaluated.
	pub rules: Vec<RuleOutcome>,
}

impl Resolution {
	fn decided(decision: ConcurrencyDecision) -> Self {
		Self { decision, rules: Vec::new() }
	}

	/// The resolved concurrency.
	pub fn number(&self) -> NonZeroUsize {
		self.decision.number()
	}

	/// Skipped rules, in configuration order.
	pub fn skipped(&self) -> impl Iterator<Item = &RuleSkip> {
		self.rules.iter().filter_map(|outcome| match outcome {
			RuleOutcome::Skipped(skip) => Some(skip),
			_ => None,
		})
	}

	/// Writes one log line per skipped rule, then one for the decision.
	pub fn emit(&self) {
		for skip in self.skipped() {
			match skip {
				RuleSkip::InvalidSelector { selector, error } => tracing::warn!(selector = %selector, error = %error, "{skip}"),
				RuleSkip::InvalidNumber { selector, number } => tracing::warn!(selector = %selector, number, "{skip}"),
			}
		}
		self.decision.emit();
	}
}

/// Resolves the data-path concurrency for one node.
#[derive(Debug, Clone)]
pub struct ConcurrencyResolver<C, N> {
	node_name: String,
	configs: C,
	nodes: N,
}

impl<C, N> ConcurrencyResolver<C, N>
where
	C: ConfigSource,
	N: NodeLookup,
{
	/// Creates a resolver for the node called `node_name`.
	pub fn new(node_name: impl Into<String>, configs: C, nodes: N) -> Self {
		Self {
			node_name: node_name.into(),
			configs,
			nodes,
		}
	}

	/// Name of the node being resolved.
	pub fn node_name(&self) -> &str {
		&self.node_name
	}

	/// Returns the effective concurrency, logging how it was chosen.
	///
	/// Never fails: every problem degrades to `fallback` or the cluster-wide number.
	pub async fn resolve(&self, fallback: NonZeroUsize) -> NonZeroUsize {
		let resolution = self.evaluate(fallback).await;
		resolution.emit();
		resolution.number()
	}

	/// Runs the resolution without logging.
	pub async fn evaluate(&self, fallback: NonZeroUsize) -> Resolution {
		let configs = match self.configs.node_agent_configs().await {
			Ok(configs) => configs,
			Err(error) => return Resolution::decided(ConcurrencyDecision::ConfigUnavailable { fallback, error }),
		};
		let Some(concurrency) = configs.and_then(|configs| configs.load_concurrency) else {
			return Resolution::decided(ConcurrencyDecision::ConfigNotFound { fallback });
		};
		let Some(global) = positive(concurrency.global_config) else {
			return Resolution::decided(ConcurrencyDecision::InvalidGlobal {
				global: concurrency.global_config,
				fallback,
			});
		};
		if concurrency.per_node_config.is_empty() {
			return Resolution::decided(ConcurrencyDecision::Global { global });
		}

		let node = match self.nodes.node(&self.node_name).await {
			Ok(node) => node,
			Err(error) => {
				return Resolution::decided(ConcurrencyDecision::NodeUnavailable {
					node: self.node_name.clone(),
					global,
					error,
				});
			}
		};
		let labels = node.metadata.labels.unwrap_or_default();

		let rules: Vec<_> = concurrency.per_node_config.iter().map(|rule| evaluate_rule(rule, &labels)).collect();
		let decision = match rules.iter().filter_map(RuleOutcome::candidate).min() {
			Some(number) => ConcurrencyDecision::PerNode {
				node: self.node_name.clone(),
				number,
				global,
			},
			None => ConcurrencyDecision::PerNodeNotFound {
				node: self.node_name.clone(),
				global,
			},
		};
		Resolution { decision, rules }
	}
}

fn positive(value: i64) -> Option<NonZeroUsize> {
	usize::try_from(value).ok().and_then(NonZeroUsize::new)
}
