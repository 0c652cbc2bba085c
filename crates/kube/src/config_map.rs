use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::{Api, Client};
use nodeward_policy::{ConfigSource, NodeAgentConfigs, SourceError};

use crate::source_error;

/// [`ConfigSource`] reading one ConfigMap in the agent's namespace.
///
/// A missing ConfigMap means no configuration. A ConfigMap without exactly one data entry, or
/// with an undecodable document, is an error.
#[derive(Clone)]
pub struct ConfigMapSource {
	api: Api<ConfigMap>,
	name: String,
}

impl ConfigMapSource {
	pub fn new(client: Client, namespace: &str, name: impl Into<String>) -> Self {
		Self {
			api: Api::namespaced(client, namespace),
			name: name.into(),
		}
	}
}

#[async_trait]
impl ConfigSource for ConfigMapSource {
	async fn node_agent_configs(&self) -> Result<Option<NodeAgentConfigs>, SourceError> {
		let Some(config_map) = self.api.get_opt(&self.name).await.map_err(|e| source_error("ConfigMap", &self.name, e))? else {
			tracing::debug!(config_map = %self.name, "node agent config map does not exist");
			return Ok(None);
		};
		let data = config_map.data.unwrap_or_default();
		Ok(Some(NodeAgentConfigs::from_config_map_data(&data)?))
	}
}
