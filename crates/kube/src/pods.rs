use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::ListParams;
use kube::{Api, Client};
use nodeward_policy::{PodLister, SourceError};

/// Field selector restricting a pod list to one node.
pub fn node_field_selector(node_name: &str) -> String {
	format!("spec.nodeName={node_name}")
}

/// [`PodLister`] returning every pod scheduled on one node.
#[derive(Clone)]
pub struct KubePods {
	api: Api<Pod>,
	node_name: String,
}

impl KubePods {
	pub fn new(client: Client, node_name: impl Into<String>) -> Self {
		Self {
			api: Api::all(client),
			node_name: node_name.into(),
		}
	}
}

#[async_trait]
impl PodLister for KubePods {
	async fn pods(&self) -> Result<Vec<Pod>, SourceError> {
		let params = ListParams::default().fields(&node_field_selector(&self.node_name));
		let list = self.api.list(&params).await.map_err(SourceError::api)?;
		tracing::debug!(node = %self.node_name, pods = list.items.len(), "listed pods on node");
		Ok(list.items)
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn selects_pods_by_node_name() {
		assert_eq!(node_field_selector("node-agent-node"), "spec.nodeName=node-agent-node");
	}
}
