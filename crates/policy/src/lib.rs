//! Node-local policy decisions for the backup node agent.
//!
//! Two independent checks run before the agent starts moving data:
//!
//! * [`ConcurrencyResolver`]: how many data-path operations this node may run at once, merged
//!   from a caller fallback, a cluster-wide number and per-node label rules.
//! * [`HostPathValidator`]: whether every pod the control plane places on this node has its
//!   volume directory under the host-pods mount.
//!
//! Cluster state reaches both through the collaborator traits in [`source`]; neither keeps state
//! between calls.

pub mod concurrency;
pub mod config;
pub mod host_path;
pub mod source;

pub use concurrency::{ConcurrencyDecision, ConcurrencyResolver, Resolution, RuleOutcome, RuleSkip, evaluate_rule};
pub use config::{ConfigError, LoadConcurrency, NodeAgentConfigs, RuledConfigs};
pub use host_path::{HOST_PODS_ROOT, HostPathError, HostPathValidator, MIRROR_POD_ANNOTATION, MissingPodVolume, expected_volume_dir};
pub use source::{ConfigSource, DirLister, HostDirs, NodeLookup, PodLister, SourceError};
