//! data structures for deserializing incoming alerts
//!
//! Decoding is lenient in the same way the alertmanager webhook payload is: every
//! field may be missing or `null` and falls back to its empty value.
use chrono::{DateTime, FixedOffset};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// label or annotation set, iterated in payload order
pub type KeyValues = IndexMap<String, String>;

/// body of a webhook request could not be interpreted as [Data]
#[derive(Error, Debug)]
#[error("{0}")]
pub struct DecodeError(#[from] serde_json::Error);

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
/// data from prometheus received by the alertmanager webhook receiver
#[allow(clippy::missing_docs_in_private_items)]
pub struct Data {
	#[serde(default, deserialize_with = "null_as_default")]
	pub version: String,
	#[serde(default, deserialize_with = "null_as_default")]
	pub group_key: String,
	#[serde(default, deserialize_with = "null_as_default")]
	pub truncated_alerts: u64,

	#[serde(default, deserialize_with = "null_as_default")]
	pub receiver: String,
	#[serde(default, deserialize_with = "null_as_default")]
	pub status: String,
	#[serde(default, deserialize_with = "null_as_default")]
	pub alerts: Vec<Alert>,
	#[serde(default, deserialize_with = "null_as_default")]
	pub group_labels: KeyValues,
	#[serde(default, deserialize_with = "null_as_default")]
	pub common_labels: KeyValues,
	#[serde(default, deserialize_with = "null_as_default")]
	pub common_annotations: KeyValues,
	#[serde(rename = "externalURL", default, deserialize_with = "null_as_default")]
	pub external_url: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
/// a single alert of a webhook delivery
#[allow(clippy::missing_docs_in_private_items)]
pub struct Alert {
	#[serde(default, deserialize_with = "null_as_default")]
	pub status: String,
	#[serde(default, deserialize_with = "null_as_default")]
	pub labels: KeyValues,
	#[serde(default, deserialize_with = "null_as_default")]
	pub annotations: KeyValues,
	/// keeps the offset it was sent with
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub starts_at: Option<DateTime<FixedOffset>>,
	/// unset or the zero time while the alert is still firing
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub ends_at: Option<DateTime<FixedOffset>>,
	#[serde(rename = "generatorURL", default, deserialize_with = "null_as_default")]
	pub generator_url: String,
	#[serde(default, deserialize_with = "null_as_default")]
	pub fingerprint: String,
}

/// Parse a webhook request body
pub fn decode(body: &[u8]) -> Result<Data, DecodeError> {
	Ok(serde_json::from_slice(body)?)
}

/// treat an explicit `null` like a missing field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
	D: Deserializer<'de>,
	T: Default + Deserialize<'de>,
{
	Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
