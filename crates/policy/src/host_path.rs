//! Host pod volume directory validation.
//!
//! The node agent reaches pod volumes through the kubelet's pods directory mounted at
//! [`HOST_PODS_ROOT`]. Each pod's volumes live under a directory named after the pod's UID, or,
//! for static pods mirrored by the kubelet, after the value of [`MIRROR_POD_ANNOTATION`].

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use k8s_openapi::api::core::v1::Pod;
use thiserror::Error;

use crate::source::{DirLister, PodLister, SourceError};

/// Mount point of the kubelet pods directory inside the agent container.
pub const HOST_PODS_ROOT: &str = "/host_pods";

/// Annotation carrying the on-disk identity of a mirror pod.
pub const MIRROR_POD_ANNOTATION: &str = "kubernetes.io/config.mirror";

/// A pod whose volume directory is absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingPodVolume {
	/// `namespace/name` of the pod.
	pub pod: String,
	/// Directory name the pod was expected under.
	pub dir: String,
	/// Full expected path.
	pub path: PathBuf,
}

impl fmt::Display for MissingPodVolume {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} ({})", self.pod, self.path.display())
	}
}

/// Host pod volume validation failure.
#[derive(Debug, Error)]
pub enum HostPathError {
	/// The host-pods root could not be listed.
	#[error("could not read pod volumes host path {}: {source}", .path.display())]
	ReadDir {
		/// Root that was listed.
		path: PathBuf,
		/// Underlying I/O error.
		#[source]
		source: std::io::Error,
	},

	/// Pods could not be listed.
	#[error("failed to list pods: {0}")]
	ListPods(#[source] SourceError),

	/// At least one pod has no volume directory.
	#[error(
		"unexpected directory structure for host-pods volume, ensure that the host-pods volume corresponds to the pods subdirectory of the kubelet root directory; missing volumes for {} pod(s): {}",
		.0.len(),
		join_missing(.0)
	)]
	MissingVolumes(Vec<MissingPodVolume>),
}

impl HostPathError {
	/// Pods reported missing, empty for other failures.
	pub fn missing(&self) -> &[MissingPodVolume] {
		match self {
			Self::MissingVolumes(missing) => missing,
			_ => &[],
		}
	}
}

fn join_missing(missing: &[MissingPodVolume]) -> String {
	missing.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Directory name a pod's volumes are expected under.
///
/// The mirror annotation, when present, takes precedence over the UID. A pod with neither
/// yields the empty string, which never names a directory.
pub fn expected_volume_dir(pod: &Pod) -> &str {
	let mirror = pod.metadata.annotations.as_ref().and_then(|annotations| annotations.get(MIRROR_POD_ANNOTATION));
	mirror.or(pod.metadata.uid.as_ref()).map_or("", String::as_str)
}

fn pod_ref(pod: &Pod) -> String {
	format!(
		"{}/{}",
		pod.metadata.namespace.as_deref().unwrap_or_default(),
		pod.metadata.name.as_deref().unwrap_or_default()
	)
}

/// Checks that every listed pod has a volume directory on the host.
#[derive(Debug, Clone)]
pub struct HostPathValidator<P, D> {
	pods: P,
	dirs: D,
	root: PathBuf,
}

impl<P, D> HostPathValidator<P, D>
where
	P: PodLister,
	D: DirLister,
{
	/// Creates a validator over [`HOST_PODS_ROOT`].
	pub fn new(pods: P, dirs: D) -> Self {
		Self::with_root(pods, dirs, HOST_PODS_ROOT)
	}

	/// Creates a validator over a custom root.
	pub fn with_root(pods: P, dirs: D, root: impl Into<PathBuf>) -> Self {
		Self {
			pods,
			dirs,
			root: root.into(),
		}
	}

	/// Root the validator lists.
	pub fn root(&self) -> &Path {
		&self.root
	}

	/// Fails with every pod whose expected directory is absent.
	///
	/// Directories without a pod are ignored.
	pub async fn validate(&self) -> Result<(), HostPathError> {
		let dirs: HashSet<String> = self
			.dirs
			.list_dirs(&self.root)
			.map_err(|source| HostPathError::ReadDir {
				path: self.root.clone(),
				source,
			})?
			.into_iter()
			.collect();

		let pods = self.pods.pods().await.map_err(HostPathError::ListPods)?;

		let mut missing = Vec::new();
		for pod in &pods {
			let dir = expected_volume_dir(pod);
			if dirs.contains(dir) {
				continue;
			}
			let entry = MissingPodVolume {
				pod: pod_ref(pod),
				dir: dir.to_string(),
				path: self.root.join(dir),
			};
			tracing::warn!(pod = %entry.pod, path = %entry.path.display(), "could not find volumes for pod in host path");
			missing.push(entry);
		}

		if missing.is_empty() {
			tracing::debug!(pods = pods.len(), dirs = dirs.len(), "pod volumes host path is valid");
			Ok(())
		} else {
			Err(HostPathError::MissingVolumes(missing))
		}
	}
}

#[cfg(test)]
mod tests;
