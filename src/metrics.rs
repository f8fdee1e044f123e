//! prometheus meters for the webhook receiver

use prometheus::{opts, IntCounter, IntCounterVec, Registry};

/// what happened to a webhook request
#[derive(Debug, Clone, Copy)]
pub enum Outcome {
	/// every alert was written
	Accepted,
	/// the body couldn't be decoded
	BadRequest,
	/// the sink rejected a record
	EmitFailed,
}

impl Outcome {
	fn as_str(self) -> &'static str {
		match self {
			Self::Accepted => "accepted",
			Self::BadRequest => "bad_request",
			Self::EmitFailed => "emit_failed",
		}
	}
}

#[derive(Debug, Clone)]
/// counters of the alertmanager webhook receiver
///
/// Meters are created unregistered, [ReceiverMetrics::register] exposes them.
pub struct ReceiverMetrics {
	/// webhook requests by [Outcome]
	requests: IntCounterVec,
	/// alerts contained in successfully decoded requests
	received_alerts: IntCounter,
	/// records written to the sink
	emitted_records: IntCounter,
}

impl ReceiverMetrics {
	pub fn new() -> Result<Self, prometheus::Error> {
		let requests = IntCounterVec::new(
			opts!("requests_total", "webhook requests by outcome")
				.namespace("alertlog")
				.subsystem("alertmanager_webhook"),
			&["outcome"],
		)?;

		let received_alerts = IntCounter::with_opts(
			opts!("received_alerts_total", "total number of deserialized alerts")
				.namespace("alertlog")
				.subsystem("alertmanager_webhook"),
		)?;

		let emitted_records = IntCounter::with_opts(
			opts!("emitted_records_total", "total number of alert records written")
				.namespace("alertlog")
				.subsystem("alertmanager_webhook"),
		)?;

		Ok(Self { requests, received_alerts, emitted_records })
	}

	/// register all meters in `registry`
	pub fn register(&self, registry: &Registry) -> Result<(), prometheus::Error> {
		registry.register(Box::new(self.requests.clone()))?;
		registry.register(Box::new(self.received_alerts.clone()))?;
		registry.register(Box::new(self.emitted_records.clone()))?;
		Ok(())
	}

	pub fn record_request(&self, outcome: Outcome) {
		self.requests.with_label_values(&[outcome.as_str()]).inc();
	}

	pub fn record_received(&self, alerts: usize) {
		self.received_alerts.inc_by(alerts as u64);
	}

	pub fn record_emitted(&self, records: usize) {
		self.emitted_records.inc_by(records as u64);
	}

	#[cfg(test)]
	pub fn requests(&self, outcome: Outcome) -> u64 {
		self.requests.with_label_values(&[outcome.as_str()]).get()
	}

	#[cfg(test)]
	pub fn emitted(&self) -> u64 {
		self.emitted_records.get()
	}
}
