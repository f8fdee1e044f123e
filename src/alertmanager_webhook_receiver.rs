//! http endpoint receiving alertmanager webhook deliveries
use std::{
	net::{IpAddr, SocketAddr},
	sync::Arc,
};

use anyhow::{anyhow, Context, Result};
use axum::{
	body::Bytes,
	extract::Extension,
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::post,
	Router,
};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::{
	alert, emitter,
	metrics::{Outcome, ReceiverMetrics},
	settings::Settings,
	sink::{EmitError, RecordSink},
};

/// what the receiver does after an alert record couldn't be written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmitFailurePolicy {
	/// stop accepting requests and terminate the process
	Exit,
	/// log the error and keep serving
	Continue,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AlertReceiverSettings {
	pub bind_address: IpAddr,
	pub port: u16,
	pub on_emit_failure: EmitFailurePolicy,
}

impl AlertReceiverSettings {
	pub fn global() -> &'static Self {
		&Settings::global().receiver
	}

	pub fn to_socket_addr(&self) -> SocketAddr {
		SocketAddr::new(self.bind_address, self.port)
	}
}

struct State {
	sink: Arc<dyn RecordSink>,
	metrics: ReceiverMetrics,
	on_emit_failure: EmitFailurePolicy,
	/// reason for stopping the receiver
	tx_shutdown: mpsc::Sender<String>,
}

impl State {
	fn emit_failed(&self, err: &EmitError) {
		self.metrics.record_request(Outcome::EmitFailed);

		match self.on_emit_failure {
			EmitFailurePolicy::Exit => {
				tracing::error!("failed to write alert records, shutting down: {}", err);
				// a shutdown is already pending if the channel is full
				let _ = self.tx_shutdown.try_send(err.to_string());
			}
			EmitFailurePolicy::Continue => {
				tracing::error!("failed to write alert records: {}", err);
			}
		}
	}
}

async fn prometheus_receiver(Extension(state): Extension<Arc<State>>, body: Bytes) -> Response {
	let data = match alert::decode(&body) {
		Ok(data) => data,
		Err(err) => {
			tracing::debug!("failed to deserialize alert: {}", err);
			state.metrics.record_request(Outcome::BadRequest);
			return (StatusCode::BAD_REQUEST, err.to_string()).into_response();
		}
	};

	tracing::debug!(
		group_key = data.group_key.as_str(),
		status = data.status.as_str(),
		alerts = data.alerts.len(),
		"received alerts"
	);
	state.metrics.record_received(data.alerts.len());

	// writes block on stdout, keep them off the runtime's worker threads
	let sink = state.sink.clone();
	let emitted = tokio::task::spawn_blocking(move || emitter::log_alerts(&data, sink.as_ref())).await;

	match emitted {
		Ok(Ok(written)) => {
			state.metrics.record_emitted(written);
			state.metrics.record_request(Outcome::Accepted);
			StatusCode::NO_CONTENT.into_response()
		}
		Ok(Err(err)) => {
			state.emit_failed(&err);
			(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
		}
		Err(err) => {
			tracing::error!("alert emitting task failed: {}", err);
			state.metrics.record_request(Outcome::EmitFailed);
			(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
		}
	}
}

/// every path is accepted, only POST is allowed
fn router(state: Arc<State>) -> Router {
	Router::new().fallback(post(prometheus_receiver)).layer(Extension(state))
}

/// Serve the webhook endpoint until it crashes or, with
/// [EmitFailurePolicy::Exit], until a record couldn't be written.
pub async fn run_prometheus_receiver(
	settings: &AlertReceiverSettings,
	sink: Arc<dyn RecordSink>,
	metrics: ReceiverMetrics,
) -> Result<()> {
	let (tx_shutdown, mut rx_shutdown) = mpsc::channel(1);
	let state =
		Arc::new(State { sink, metrics, on_emit_failure: settings.on_emit_failure, tx_shutdown });
	let addr = settings.to_socket_addr();

	tracing::info!("listening for alertmanager webhooks on {}", addr);

	let mut reason = None;
	axum::Server::try_bind(&addr)
		.with_context(|| format!("failed to bind {}", addr))?
		.serve(router(state).into_make_service())
		// in flight responses are still delivered
		.with_graceful_shutdown(async {
			reason = rx_shutdown.recv().await;
		})
		.await
		.context("alertmanager webhook receiver crashed")?;

	match reason {
		Some(reason) => Err(anyhow!("alert records can't be written: {}", reason)),
		None => Ok(()),
	}
}
