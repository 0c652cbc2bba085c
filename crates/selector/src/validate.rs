use std::sync::LazyLock;

use regex::Regex;

use crate::{Result, SelectorError};

const NAME_MAX_LEN: usize = 63;
const PREFIX_MAX_LEN: usize = 253;

static NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([A-Za-z0-9][-A-Za-z0-9_.]*)?[A-Za-z0-9]$").expect("label name pattern compiles"));

static DNS1123_SUBDOMAIN: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$").expect("subdomain pattern compiles"));

/// Checks a label key: `[prefix/]name`, prefix a DNS-1123 subdomain.
pub(crate) fn label_key(key: &str) -> Result<()> {
	let invalid = |reason| SelectorError::InvalidKey { key: key.to_string(), reason };

	let name = match key.split_once('/') {
		Some((prefix, name)) => {
			if prefix.is_empty() {
				return Err(invalid("prefix part must be non-empty"));
			}
			if prefix.len() > PREFIX_MAX_LEN {
				return Err(invalid("prefix part must be no more than 253 characters"));
			}
			if !DNS1123_SUBDOMAIN.is_match(prefix) {
				return Err(invalid("prefix part must be a lowercase DNS-1123 subdomain"));
			}
			name
		}
		None => key,
	};

	if name.is_empty() {
		return Err(invalid("name part must be non-empty"));
	}
	if name.len() > NAME_MAX_LEN {
		return Err(invalid("name part must be no more than 63 characters"));
	}
	if !NAME.is_match(name) {
		return Err(invalid(
			"name part must consist of alphanumerics, '-', '_' or '.', and start and end with an alphanumeric",
		));
	}
	Ok(())
}

/// Checks a label value. The empty value is valid.
pub(crate) fn label_value(key: &str, value: &str) -> Result<()> {
	let invalid = |reason| SelectorError::InvalidValue {
		key: key.to_string(),
		value: value.to_string(),
		reason,
	};

	if value.is_empty() {
		return Ok(());
	}
	if value.len() > NAME_MAX_LEN {
		return Err(invalid("must be no more than 63 characters"));
	}
	if !NAME.is_match(value) {
		return Err(invalid("must consist of alphanumerics, '-', '_' or '.', and start and end with an alphanumeric"));
	}
	Ok(())
}
