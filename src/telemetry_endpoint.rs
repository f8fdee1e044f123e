use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use anyhow::{Context, Result};
use axum::{
	http::{header::CONTENT_TYPE, StatusCode},
	response::{IntoResponse, Response},
	routing::get,
	Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryEndpointSettings {
	#[serde(default = "TelemetryEndpointSettings::default_bind_address")]
	pub bind_address: IpAddr,
	pub port: u16,
}

impl TelemetryEndpointSettings {
	fn default_bind_address() -> IpAddr {
		IpAddr::V4(Ipv4Addr::UNSPECIFIED)
	}

	pub fn to_socket_addr(&self) -> SocketAddr {
		SocketAddr::new(self.bind_address, self.port)
	}
}

async fn metrics_handler() -> Response {
	let mut buffer = vec![];
	let encoder = TextEncoder::new();
	let metric_families = prometheus::gather();

	if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
		tracing::error!("failed to encode metrics: {}", err);
		return (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response();
	}

	([(CONTENT_TYPE, encoder.format_type().to_owned())], buffer).into_response()
}

fn router() -> Router {
	Router::new().route("/metrics", get(metrics_handler))
}

pub async fn run_telemetry_endpoint(settings: TelemetryEndpointSettings) -> Result<()> {
	let addr = settings.to_socket_addr();
	tracing::info!("serving metrics on {}", addr);

	axum::Server::try_bind(&addr)
		.with_context(|| format!("failed to bind {}", addr))?
		.serve(router().into_make_service())
		.await
		.context("telemetry endpoint crashed")
}
