//! diagnostics of the receiver itself
//!
//! Alert records go to stdout through the [sink](crate::sink), everything
//! logged via [tracing] goes to stderr so the two never mix.
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing_subscriber::{
	filter::LevelFilter, fmt, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt,
	EnvFilter,
};

use crate::settings::Settings;

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
	pub level: String,
}

impl LogSettings {
	pub fn global() -> &'static Self {
		&Settings::global().log
	}
}

pub fn setup_logging() -> Result<()> {
	let level = tracing::Level::from_str(LogSettings::global().level.as_str())
		.context("invalid log level")?;

	let fmt_layer = fmt::layer().with_writer(std::io::stderr);

	let filter_layer = EnvFilter::default()
		.add_directive(LevelFilter::from_level(level).into())
		.add_directive("hyper=warn".parse()?);

	tracing_subscriber::registry().with(filter_layer).with(fmt_layer).init();

	Ok(())
}
