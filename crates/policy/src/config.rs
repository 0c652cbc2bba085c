//! Node agent configuration document.
//!
//! The document lives in cluster state and is fetched by a [`ConfigSource`]. Only the
//! concurrency section is modeled; unknown keys are ignored.
//!
//! ```json
//! {
//!   "loadConcurrency": {
//!     "globalConfig": 2,
//!     "perNodeConfig": [
//!       { "nodeSelector": { "matchLabels": { "host-name": "node-1" } }, "number": 3 }
//!     ]
//!   }
//! }
//! ```
//!
//! [`ConfigSource`]: crate::ConfigSource

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Errors decoding a node agent configuration document.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// The document is not valid JSON for [`NodeAgentConfigs`].
	#[error("failed to decode node agent configs: {0}")]
	Json(#[from] serde_json::Error),

	/// The config map carries no data entry.
	#[error("data is not available in config map")]
	MissingData,

	/// The config map carries more than one data entry.
	#[error("more than one key is found in config map: {}", .keys.join(", "))]
	AmbiguousData {
		/// Keys found in the config map.
		keys: Vec<String>,
	},
}

/// Result type for configuration decoding.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Root of the node agent configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeAgentConfigs {
	/// Data-path concurrency settings. Absent means "use the caller's fallback".
	#[serde(default, alias = "dataPathConcurrency", skip_serializing_if = "Option::is_none")]
	pub load_concurrency: Option<LoadConcurrency>,
}

/// Cluster-wide and per-node concurrency numbers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadConcurrency {
	/// Number applied to every node without a matching rule. Valid iff positive; absent reads as 0.
	#[serde(default, deserialize_with = "null_as_default")]
	pub global_config: i64,
	/// Per-node rules, in document order.
	#[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
	pub per_node_config: Vec<RuledConfigs>,
}

/// One per-node rule: nodes matched by `node_selector` may run `number` operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuledConfigs {
	/// Selector over node labels. May be invalid; such rules are skipped.
	#[serde(default, deserialize_with = "null_as_default")]
	pub node_selector: LabelSelector,
	/// Concurrency for matched nodes. Valid iff positive.
	#[serde(default, deserialize_with = "null_as_default")]
	pub number: i64,
}

/// Reads an explicit `null` the same as a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
	D: Deserializer<'de>,
	T: Default + Deserialize<'de>,
{
	Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl NodeAgentConfigs {
	/// Decodes a JSON document.
	pub fn from_json(input: &str) -> Result<Self> {
		Ok(serde_json::from_str(input)?)
	}

	/// Decodes the `data` section of a config map, which must hold exactly one document.
	pub fn from_config_map_data(data: &BTreeMap<String, String>) -> Result<Self> {
		let mut entries = data.values();
		match (entries.next(), entries.next()) {
			(None, _) => Err(ConfigError::MissingData),
			(Some(document), None) => Self::from_json(document),
			(Some(_), Some(_)) => Err(ConfigError::AmbiguousData {
				keys: data.keys().cloned().collect(),
			}),
		}
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn decodes_full_document() {
		let configs = NodeAgentConfigs::from_json(
			r#"{
				"loadConcurrency": {
					"globalConfig": 2,
					"perNodeConfig": [
						{ "nodeSelector": { "matchLabels": { "host-name": "node-1" } }, "number": 3 },
						{ "nodeSelector": { "matchExpressions": [ { "key": "gpu", "operator": "Exists" } ] }, "number": 1 }
					]
				},
				"podResources": { "cpuRequest": "100m" }
			}"#,
		)
		.unwrap();

		let concurrency = configs.load_concurrency.unwrap();
		assert_eq!(concurrency.global_config, 2);
		assert_eq!(concurrency.per_node_config.len(), 2);
		assert_eq!(concurrency.per_node_config[0].number, 3);
		assert_eq!(
			concurrency.per_node_config[0].node_selector.match_labels,
			Some(BTreeMap::from([("host-name".to_string(), "node-1".to_string())]))
		);
		assert_eq!(concurrency.per_node_config[1].node_selector.match_expressions.as_ref().map(Vec::len), Some(1));
	}

	#[test]
	fn accepts_legacy_section_name() {
		let configs = NodeAgentConfigs::from_json(r#"{ "dataPathConcurrency": { "globalConfig": 4 } }"#).unwrap();
		assert_eq!(configs.load_concurrency.map(|c| c.global_config), Some(4));
	}

	#[test]
	fn missing_fields_read_as_defaults() {
		assert_eq!(NodeAgentConfigs::from_json("{}").unwrap(), NodeAgentConfigs::default());

		let configs = NodeAgentConfigs::from_json(r#"{ "loadConcurrency": {} }"#).unwrap();
		assert_eq!(configs.load_concurrency, Some(LoadConcurrency::default()));
	}

	#[test]
	fn null_fields_read_as_defaults() {
		let configs = NodeAgentConfigs::from_json(r#"{ "loadConcurrency": { "globalConfig": 2, "perNodeConfig": null } }"#).unwrap();
		assert_eq!(
			configs.load_concurrency,
			Some(LoadConcurrency {
				global_config: 2,
				per_node_config: Vec::new(),
			})
		);

		let configs = NodeAgentConfigs::from_json(r#"{ "loadConcurrency": { "globalConfig": null } }"#).unwrap();
		assert_eq!(configs.load_concurrency.map(|c| c.global_config), Some(0));

		let configs = NodeAgentConfigs::from_json(
			r#"{ "loadConcurrency": { "globalConfig": 2, "perNodeConfig": [ { "nodeSelector": null, "number": null } ] } }"#,
		)
		.unwrap();
		assert_eq!(configs.load_concurrency.unwrap().per_node_config, vec![RuledConfigs::default()]);

		let configs = NodeAgentConfigs::from_json(r#"{ "loadConcurrency": null }"#).unwrap();
		assert_eq!(configs, NodeAgentConfigs::default());
	}

	#[test]
	fn rejects_malformed_json() {
		let err = NodeAgentConfigs::from_json(r#"{ "loadConcurrency": { "globalConfig": "two" } }"#).unwrap_err();
		assert!(matches!(err, ConfigError::Json(_)));
	}

	#[test]
	fn config_map_needs_exactly_one_entry() {
		assert!(matches!(NodeAgentConfigs::from_config_map_data(&BTreeMap::new()), Err(ConfigError::MissingData)));

		let two = BTreeMap::from([("a".to_string(), "{}".to_string()), ("b".to_string(), "{}".to_string())]);
		let err = NodeAgentConfigs::from_config_map_data(&two).unwrap_err();
		assert_eq!(err.to_string(), "more than one key is found in config map: a, b");

		let one = BTreeMap::from([("node-agent-config".to_string(), r#"{ "loadConcurrency": { "globalConfig": 7 } }"#.to_string())]);
		let configs = NodeAgentConfigs::from_config_map_data(&one).unwrap();
		assert_eq!(configs.load_concurrency.map(|c| c.global_config), Some(7));
	}
}
