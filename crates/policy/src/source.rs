//! Collaborators that feed cluster and host state into the policy checks.
//!
//! Implementations backed by the cluster API live in `nodeward-kube`; [`HostDirs`] reads the
//! local filesystem.

use std::io;
use std::path::Path;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, Pod};
use thiserror::Error;

use crate::config::{ConfigError, NodeAgentConfigs};

/// Failure of a collaborator to produce cluster state.
#[derive(Debug, Error)]
pub enum SourceError {
	/// The requested object does not exist.
	#[error("{kind} {name:?} not found")]
	NotFound {
		/// Object kind, e.g. `Node`.
		kind: &'static str,
		/// Object name.
		name: String,
	},

	/// The cluster API request failed.
	#[error("cluster api request failed: {0}")]
	Api(#[source] Box<dyn std::error::Error + Send + Sync>),

	/// The configuration object exists but cannot be decoded.
	#[error(transparent)]
	Config(#[from] ConfigError),
}

impl SourceError {
	/// Wraps a transport or API error.
	pub fn api(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
		Self::Api(error.into())
	}
}

/// Fetches the node agent configuration.
#[async_trait]
pub trait ConfigSource: Send + Sync {
	/// Returns `Ok(None)` when no configuration object exists.
	async fn node_agent_configs(&self) -> Result<Option<NodeAgentConfigs>, SourceError>;
}

/// Looks up Node objects by name.
#[async_trait]
pub trait NodeLookup: Send + Sync {
	/// Returns the node, or an error when it is missing or unreachable.
	async fn node(&self, name: &str) -> Result<Node, SourceError>;
}

/// Lists the pods the agent is responsible for.
///
/// Scoping to the current node is the implementation's job.
#[async_trait]
pub trait PodLister: Send + Sync {
	/// Returns every pod to check.
	async fn pods(&self) -> Result<Vec<Pod>, SourceError>;
}

/// Enumerates directory names directly under a root.
pub trait DirLister {
	/// Returns the names of the immediate child directories of `root`.
	fn list_dirs(&self, root: &Path) -> io::Result<Vec<String>>;
}

/// [`DirLister`] over the local filesystem.
///
/// Plain files and entries whose names are not UTF-8 are left out; symlinks are not followed.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostDirs;

impl DirLister for HostDirs {
	fn list_dirs(&self, root: &Path) -> io::Result<Vec<String>> {
		let mut names = Vec::new();
		for entry in std::fs::read_dir(root)? {
			let entry = entry?;
			if !entry.file_type()?.is_dir() {
				continue;
			}
			if let Ok(name) = entry.file_name().into_string() {
				names.push(name);
			}
		}
		Ok(names)
	}
}
