//! prometheus alertmanager receiver that writes alerts as structured log lines
//!
//! Every alert of a webhook delivery becomes one line on stdout, either json or
//! logfmt, carrying the common and group labels of the delivery together with
//! the alert's own labels and annotations.

use std::sync::Arc;

use anyhow::{Context, Result};
use settings::Settings;

use crate::{
	alertmanager_webhook_receiver::AlertReceiverSettings, metrics::ReceiverMetrics,
	sink::WriterSink,
};

mod alert;
mod alertmanager_webhook_receiver;
mod emitter;
mod log;
mod metrics;
mod record;
mod settings;
mod sink;
mod telemetry_endpoint;

/// exit the complete program if one thread panics
fn setup_panic_handler() {
	let default_panic = std::panic::take_hook();
	std::panic::set_hook(Box::new(move |info| {
		default_panic(info);
		std::process::exit(1);
	}));
}

/// the entry point of the program
#[tokio::main]
pub async fn main() -> Result<()> {
	setup_panic_handler();

	log::setup_logging().context("could not setup logging")?;

	let settings = Settings::global();

	let metrics = ReceiverMetrics::new().context("failed to construct metrics")?;
	metrics.register(prometheus::default_registry()).context("failed to register metrics")?;

	if let Some(telemetry) = settings.telemetry_endpoint.clone() {
		tokio::spawn(async move {
			if let Err(err) = telemetry_endpoint::run_telemetry_endpoint(telemetry).await {
				tracing::error!("{:#}", err);
			}
		});
	}

	let sink = Arc::new(WriterSink::stdout(settings.output.format));

	alertmanager_webhook_receiver::run_prometheus_receiver(
		AlertReceiverSettings::global(),
		sink,
		metrics,
	)
	.await
}
