//! Turns a webhook delivery into one log record per alert.
//!
//! Every record is built from layers of key value pairs, later layers overwrite
//! earlier ones:
//!
//! 1. `timestamp` of the record
//! 2. common annotations
//! 3. common labels
//! 4. group labels
//! 5. labels of the alert
//! 6. annotations of the alert
//! 7. `status`, `startsAt`, `endsAt`, `generatorURL`, `externalURL`, `receiver`

use chrono::{DateTime, FixedOffset};

use crate::{
	alert::{Alert, Data},
	record::{format_time, LogRecord, ZERO_TIME},
	sink::{EmitError, RecordSink},
};

/// Layers shared by every alert of a delivery
struct CommonScope<'a> {
	data: &'a Data,
}

impl<'a> CommonScope<'a> {
	fn new(data: &'a Data) -> Self {
		Self { data }
	}

	/// Build the record of `alert`, stamped with `sink`'s clock
	fn record(&self, alert: &Alert, sink: &dyn RecordSink) -> LogRecord {
		let data = self.data;

		let mut record = LogRecord::stamped(sink.now());
		record.layer(&data.common_annotations);
		record.layer(&data.common_labels);
		record.layer(&data.group_labels);

		record.layer(&alert.labels);
		record.layer(&alert.annotations);

		record.insert("status", alert.status.as_str());
		record.insert("startsAt", alert_time(alert.starts_at.as_ref()));
		record.insert("endsAt", alert_time(alert.ends_at.as_ref()));
		record.insert("generatorURL", alert.generator_url.as_str());
		record.insert("externalURL", data.external_url.as_str());
		record.insert("receiver", data.receiver.as_str());

		record
	}
}

/// alert times keep the offset they were sent with
fn alert_time(time: Option<&DateTime<FixedOffset>>) -> String {
	time.map_or_else(|| ZERO_TIME.to_owned(), format_time)
}

/// Write one record per alert of `data` into `sink`, in order.
///
/// Stops at the first record the sink rejects; alerts after it are dropped.
/// Returns the number of records written.
pub fn log_alerts(data: &Data, sink: &dyn RecordSink) -> Result<usize, EmitError> {
	let scope = CommonScope::new(data);

	for (written, alert) in data.alerts.iter().enumerate() {
		if let Err(err) = sink.write_record(&scope.record(alert, sink)) {
			tracing::debug!(written, total = data.alerts.len(), "log sink rejected alert: {}", err);
			return Err(err);
		}
	}

	Ok(data.alerts.len())
}
