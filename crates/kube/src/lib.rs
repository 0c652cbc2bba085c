//! [`kube`] implementations of the `nodeward-policy` collaborators.
//!
//! * [`KubeNodes`]: Node lookup by name.
//! * [`KubePods`]: pods scheduled on one node, across all namespaces.
//! * [`ConfigMapSource`]: the node agent configuration document stored in a ConfigMap.

mod config_map;
mod nodes;
mod pods;

pub use config_map::ConfigMapSource;
pub use nodes::KubeNodes;
pub use pods::{KubePods, node_field_selector};
use nodeward_policy::SourceError;

/// Maps a client error to a [`SourceError`], turning 404 responses into `NotFound`.
pub(crate) fn source_error(kind: &'static str, name: &str, error: kube::Error) -> SourceError {
	match error {
		kube::Error::Api(response) if response.code == 404 => SourceError::NotFound {
			kind,
			name: name.to_string(),
		},
		other => SourceError::api(other),
	}
}
