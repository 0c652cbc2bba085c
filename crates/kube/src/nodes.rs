use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node;
use kube::{Api, Client};
use nodeward_policy::{NodeLookup, SourceError};

use crate::source_error;

/// [`NodeLookup`] over the cluster's Node API.
#[derive(Clone)]
pub struct KubeNodes {
	api: Api<Node>,
}

impl KubeNodes {
	pub fn new(client: Client) -> Self {
		Self { api: Api::all(client) }
	}
}

#[async_trait]
impl NodeLookup for KubeNodes {
	async fn node(&self, name: &str) -> Result<Node, SourceError> {
		self.api.get(name).await.map_err(|e| source_error("Node", name, e))
	}
}
