//! Structured log records and their line encodings.

use std::fmt::Display;

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use indexmap::IndexMap;
use serde::Deserialize;

/// key of the field holding the point in time a record was written
pub const TIMESTAMP_KEY: &str = "timestamp";

/// what alertmanager sends as `endsAt` for alerts which are still firing
pub const ZERO_TIME: &str = "0001-01-01T00:00:00Z";

/// replacement for characters which aren't allowed in logfmt keys
const INVALID_KEY_CHAR: char = '\u{fffd}';

/// One flat set of key value pairs.
///
/// Inserting an existing key replaces its value but keeps its position, so the
/// layer order decides the value and the first layer decides the position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogRecord {
	fields: IndexMap<String, String>,
}

impl LogRecord {
	/// record containing only the [TIMESTAMP_KEY] field
	pub fn stamped(at: DateTime<Utc>) -> Self {
		let mut record = Self::default();
		record.insert(TIMESTAMP_KEY, format_time(&at));
		record
	}

	pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
		self.fields.insert(key.into(), value.into());
	}

	/// Layer `values` on top of the record, overwriting colliding keys
	pub fn layer<'a, I>(&mut self, values: I)
	where
		I: IntoIterator<Item = (&'a String, &'a String)>,
	{
		for (key, value) in values {
			self.fields.insert(key.clone(), value.clone());
		}
	}

	pub fn get(&self, key: &str) -> Option<&str> {
		self.fields.get(key).map(String::as_str)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
	}
}

/// RFC3339 keeping the offset of `time`, `Z` for UTC, trailing zeros of the
/// fractional seconds dropped
pub fn format_time<Tz>(time: &DateTime<Tz>) -> String
where
	Tz: TimeZone,
	Tz::Offset: Display,
{
	let text = time.to_rfc3339_opts(SecondsFormat::Nanos, true);
	let (seconds, rest) = match text.split_once('.') {
		Some(split) => split,
		None => return text,
	};
	let offset_at = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
	let (fraction, offset) = rest.split_at(offset_at);

	match fraction.trim_end_matches('0') {
		"" => format!("{}{}", seconds, offset),
		fraction => format!("{}.{}{}", seconds, fraction, offset),
	}
}

/// line encoding of records written to the output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordFormat {
	/// one json object per line
	Json,
	/// space separated `key=value` pairs
	Logfmt,
}

impl Default for RecordFormat {
	fn default() -> Self {
		Self::Json
	}
}

impl RecordFormat {
	/// Append `record` as a single newline terminated line to `buf`
	pub fn encode(self, record: &LogRecord, buf: &mut Vec<u8>) -> Result<(), serde_json::Error> {
		match self {
			Self::Json => serde_json::to_writer(&mut *buf, &record.fields)?,
			Self::Logfmt => encode_logfmt(record, buf),
		}
		buf.push(b'\n');
		Ok(())
	}
}

fn encode_logfmt(record: &LogRecord, buf: &mut Vec<u8>) {
	let mut line = String::new();
	for (i, (key, value)) in record.iter().enumerate() {
		if i > 0 {
			line.push(' ');
		}
		push_logfmt_key(&mut line, key);
		line.push('=');
		push_logfmt_value(&mut line, value);
	}
	buf.extend_from_slice(line.as_bytes());
}

fn needs_quoting(c: char) -> bool {
	c <= ' ' || c == '=' || c == '"' || c == char::REPLACEMENT_CHARACTER
}

fn push_logfmt_key(line: &mut String, key: &str) {
	if key.is_empty() {
		line.push(INVALID_KEY_CHAR);
		return;
	}
	line.extend(key.chars().map(|c| if needs_quoting(c) { INVALID_KEY_CHAR } else { c }));
}

/// empty values stay bare (`key=`), `null` is quoted so it stays a string
fn push_logfmt_value(line: &mut String, value: &str) {
	if value != "null" && !value.chars().any(needs_quoting) {
		line.push_str(value);
		return;
	}

	line.push('"');
	for c in value.chars() {
		match c {
			'\\' => line.push_str("\\\\"),
			'"' => line.push_str("\\\""),
			'\n' => line.push_str("\\n"),
			'\r' => line.push_str("\\r"),
			'\t' => line.push_str("\\t"),
			c if c < ' ' => line.push_str(&format!("\\u{:04x}", c as u32)),
			c => line.push(c),
		}
	}
	line.push('"');
}

#[cfg(test)]
mod tests {
	use chrono::FixedOffset;

	use super::*;
	use crate::alert::KeyValues;

	fn encoded(format: RecordFormat, record: &LogRecord) -> String {
		let mut buf = Vec::new();
		format.encode(record, &mut buf).unwrap();
		String::from_utf8(buf).unwrap()
	}

	#[test]
	fn later_layers_overwrite_in_place() {
		let first: KeyValues = [("a", "1"), ("b", "1")].into_iter().map(owned).collect();
		let second: KeyValues = [("b", "2"), ("c", "2")].into_iter().map(owned).collect();

		let mut record = LogRecord::default();
		record.layer(&first);
		record.layer(&second);

		assert_eq!(record.iter().collect::<Vec<_>>(), [("a", "1"), ("b", "2"), ("c", "2")]);
	}

	#[test]
	fn formats_timestamps_as_rfc3339() {
		let time = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 1).unwrap();
		assert_eq!(format_time(&time), "2000-01-01T00:00:01Z");

		let time = time + chrono::Duration::milliseconds(250);
		assert_eq!(format_time(&time), "2000-01-01T00:00:01.25Z");

		let time = time + chrono::Duration::nanoseconds(3);
		assert_eq!(format_time(&time), "2000-01-01T00:00:01.250000003Z");

		let zero = Utc.with_ymd_and_hms(1, 1, 1, 0, 0, 0).unwrap();
		assert_eq!(format_time(&zero), ZERO_TIME);
	}

	#[test]
	fn keeps_the_offset_of_timestamps() {
		let offset = FixedOffset::east_opt(2 * 3600).unwrap();
		let time = offset.with_ymd_and_hms(2022, 5, 1, 9, 0, 0).unwrap();
		assert_eq!(format_time(&time), "2022-05-01T09:00:00+02:00");

		let utc = FixedOffset::east_opt(0).unwrap().with_ymd_and_hms(2022, 5, 1, 9, 0, 0).unwrap();
		assert_eq!(format_time(&utc), "2022-05-01T09:00:00Z");
	}

	#[test]
	fn json_lines() {
		let mut record = LogRecord::stamped(Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap());
		record.insert("summary", "disk \"full\"");

		assert_eq!(
			encoded(RecordFormat::Json, &record),
			"{\"timestamp\":\"2000-01-01T00:00:00Z\",\"summary\":\"disk \\\"full\\\"\"}\n"
		);
	}

	#[test]
	fn logfmt_lines() {
		let mut record = LogRecord::default();
		record.insert("status", "firing");
		record.insert("summary", "disk full");
		record.insert("query", "up==0");
		record.insert("empty", "");
		record.insert("multi", "a\n\"b\"\\");

		assert_eq!(
			encoded(RecordFormat::Logfmt, &record),
			"status=firing summary=\"disk full\" query=\"up==0\" empty= multi=\"a\\n\\\"b\\\"\\\\\"\n"
		);
	}

	#[test]
	fn logfmt_replaces_invalid_key_characters() {
		let mut record = LogRecord::default();
		record.insert("my key", "1");
		record.insert("", "2");

		assert_eq!(encoded(RecordFormat::Logfmt, &record), "my\u{fffd}key=1 \u{fffd}=2\n");
	}

	#[test]
	fn logfmt_escapes_other_control_characters() {
		let mut record = LogRecord::default();
		record.insert("bell", "\u{7}");
		record.insert("del", "a\u{7f}b");

		assert_eq!(encoded(RecordFormat::Logfmt, &record), "bell=\"\\u0007\" del=a\u{7f}b\n");
	}

	#[test]
	fn logfmt_quotes_null() {
		let mut record = LogRecord::default();
		record.insert("value", "null");
		record.insert("nullable", "nullable");

		assert_eq!(encoded(RecordFormat::Logfmt, &record), "value=\"null\" nullable=nullable\n");
	}

	#[test]
	fn parses_format_names() {
		let format: RecordFormat = serde_json::from_str("\"logfmt\"").unwrap();
		assert_eq!(format, RecordFormat::Logfmt);
		assert_eq!(RecordFormat::default(), RecordFormat::Json);
	}

	fn owned((k, v): (&str, &str)) -> (String, String) {
		(k.to_owned(), v.to_owned())
	}
}
