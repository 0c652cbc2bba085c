use std::collections::BTreeMap;
use std::io;

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use pretty_assertions::assert_eq;
use rstest::rstest;

use super::*;
use crate::source::HostDirs;

struct FakePods(Vec<Pod>);

#[async_trait]
impl PodLister for FakePods {
	async fn pods(&self) -> Result<Vec<Pod>, SourceError> {
		Ok(self.0.clone())
	}
}

struct FailingPods;

#[async_trait]
impl PodLister for FailingPods {
	async fn pods(&self) -> Result<Vec<Pod>, SourceError> {
		Err(SourceError::api("connection refused"))
	}
}

struct FakeDirs(&'static [&'static str]);

impl DirLister for FakeDirs {
	fn list_dirs(&self, root: &Path) -> io::Result<Vec<String>> {
		assert_eq!(root, Path::new(HOST_PODS_ROOT));
		Ok(self.0.iter().map(|dir| dir.to_string()).collect())
	}
}

struct UnreadableDirs;

impl DirLister for UnreadableDirs {
	fn list_dirs(&self, _root: &Path) -> io::Result<Vec<String>> {
		Err(io::Error::from(io::ErrorKind::PermissionDenied))
	}
}

fn pod(name: &str, namespace: &str, uid: &str) -> Pod {
	Pod {
		metadata: ObjectMeta {
			name: Some(name.to_string()),
			namespace: Some(namespace.to_string()),
			uid: Some(uid.to_string()),
			..Default::default()
		},
		..Default::default()
	}
}

fn mirror_pod(name: &str, namespace: &str, uid: &str, mirror: &str) -> Pod {
	let mut pod = pod(name, namespace, uid);
	pod.metadata.annotations = Some(BTreeMap::from([(MIRROR_POD_ANNOTATION.to_string(), mirror.to_string())]));
	pod
}

fn plain_pods() -> Vec<Pod> {
	vec![pod("foo", "bar", "foo"), pod("zoo", "raz", "zoo")]
}

fn with_mirror_pods() -> Vec<Pod> {
	vec![pod("foo", "bar", "foo"), mirror_pod("zoo", "raz", "zoo", "baz")]
}

async fn validate(pods: Vec<Pod>, dirs: &'static [&'static str]) -> Result<(), HostPathError> {
	HostPathValidator::new(FakePods(pods), FakeDirs(dirs)).validate().await
}

fn missing_dirs(err: &HostPathError) -> Vec<&str> {
	err.missing().iter().map(|m| m.dir.as_str()).collect()
}

#[test]
fn expected_dir_prefers_mirror_annotation() {
	assert_eq!(expected_volume_dir(&pod("foo", "bar", "foo-uid")), "foo-uid");
	assert_eq!(expected_volume_dir(&mirror_pod("zoo", "raz", "zoo-uid", "baz")), "baz");
	assert_eq!(expected_volume_dir(&Pod::default()), "");
}

#[rstest]
#[case::all_present(plain_pods(), &["foo", "zoo"])]
#[case::mirror_pod_present(with_mirror_pods(), &["foo", "baz"])]
#[case::extra_directories(plain_pods(), &["foo", "zoo", "stale-pod", "another"])]
#[case::no_pods(Vec::new(), &["unexpected-dir"])]
#[tokio::test]
async fn passes_when_every_pod_has_a_directory(#[case] pods: Vec<Pod>, #[case] dirs: &'static [&'static str]) {
	assert!(validate(pods, dirs).await.is_ok());
}

#[rstest]
#[case::all_missing(plain_pods(), &["unexpected-dir"], vec!["foo", "zoo"])]
#[case::some_missing(plain_pods(), &["foo"], vec!["zoo"])]
#[case::mirror_uid_is_not_enough(with_mirror_pods(), &["foo", "zoo"], vec!["baz"])]
#[case::mirror_and_plain_missing(with_mirror_pods(), &["unexpected-dir"], vec!["foo", "baz"])]
#[tokio::test]
async fn reports_every_missing_directory(#[case] pods: Vec<Pod>, #[case] dirs: &'static [&'static str], #[case] expected: Vec<&str>) {
	let err = validate(pods, dirs).await.unwrap_err();
	assert_eq!(missing_dirs(&err), expected);
}

#[tokio::test]
async fn error_names_pod_and_path() {
	let err = validate(with_mirror_pods(), &["foo", "zoo"]).await.unwrap_err();
	assert_eq!(
		err.missing(),
		&[MissingPodVolume {
			pod: "raz/zoo".to_string(),
			dir: "baz".to_string(),
			path: PathBuf::from("/host_pods/baz"),
		}]
	);
	let message = err.to_string();
	assert!(message.starts_with("unexpected directory structure for host-pods volume"));
	assert!(message.ends_with("missing volumes for 1 pod(s): raz/zoo (/host_pods/baz)"));
}

#[tokio::test]
async fn unreadable_root_is_an_error() {
	let err = HostPathValidator::new(FakePods(plain_pods()), UnreadableDirs).validate().await.unwrap_err();
	assert!(matches!(err, HostPathError::ReadDir { ref path, .. } if path == Path::new(HOST_PODS_ROOT)));
	assert!(err.missing().is_empty());
}

#[tokio::test]
async fn pod_listing_failure_is_an_error() {
	let err = HostPathValidator::new(FailingPods, FakeDirs(&["foo"])).validate().await.unwrap_err();
	assert!(matches!(err, HostPathError::ListPods(SourceError::Api(_))));
}

#[tokio::test]
async fn validates_against_a_real_directory() {
	let root = tempfile::tempdir().unwrap();
	std::fs::create_dir(root.path().join("foo")).unwrap();
	std::fs::create_dir(root.path().join("baz")).unwrap();
	std::fs::write(root.path().join("zoo"), b"not a directory").unwrap();

	let validator = HostPathValidator::with_root(FakePods(with_mirror_pods()), HostDirs, root.path());
	assert_eq!(validator.root(), root.path());
	assert!(validator.validate().await.is_ok());

	let validator = HostPathValidator::with_root(FakePods(plain_pods()), HostDirs, root.path());
	let err = validator.validate().await.unwrap_err();
	assert_eq!(missing_dirs(&err), vec!["zoo"]);
}
