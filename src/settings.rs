use std::ffi::OsString;

use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use config::{Config, Environment, File, Map};
use once_cell::sync::OnceCell;
use serde::Deserialize;

use crate::{
	alertmanager_webhook_receiver::AlertReceiverSettings, log::LogSettings,
	record::RecordFormat, telemetry_endpoint::TelemetryEndpointSettings,
};

static SETTINGS: OnceCell<Settings> = OnceCell::new();

/// prefix of environment variables overriding config file values
const ENV_PREFIX: &str = "ALERTLOG";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
	pub receiver: AlertReceiverSettings,
	pub output: OutputSettings,
	pub log: LogSettings,
	pub telemetry_endpoint: Option<TelemetryEndpointSettings>,
}

/// where and how alert records are written
#[derive(Debug, Clone, Deserialize)]
pub struct OutputSettings {
	pub format: RecordFormat,
}

impl Settings {
	pub fn global() -> &'static Self {
		SETTINGS.get_or_init(|| {
			match Self::load(std::env::args_os(), None)
				.context("failed to load config and command line arguments")
			{
				Ok(settings) => settings,
				Err(err) => {
					// tracing wasn't setup yet
					panic!("{:#?}", err);
				}
			}
		})
	}

	fn command() -> Command<'static> {
		Command::new(clap::crate_name!())
			.version(clap::crate_version!())
			.about(clap::crate_description!())
			.args(&[
				Arg::new("config")
					.help("path of config file")
					.takes_value(true)
					.short('c')
					.long("config")
					.default_value("./alertlog.yaml"),
				Arg::new("bind-address")
					.help("address the webhook receiver listens on")
					.takes_value(true)
					.long("bind-address"),
				Arg::new("port")
					.help("port the webhook receiver listens on")
					.takes_value(true)
					.long("port"),
				Arg::new("format")
					.help("encoding of alert records written to stdout")
					.possible_values(["json", "logfmt"])
					.ignore_case(true)
					.takes_value(true)
					.long("format"),
				Arg::new("on-emit-failure")
					.help("what to do when an alert record can't be written")
					.possible_values(["exit", "continue"])
					.ignore_case(true)
					.takes_value(true)
					.long("on-emit-failure"),
				Arg::new("telemetry-port")
					.help("serve prometheus metrics on this port")
					.takes_value(true)
					.long("telemetry-port"),
				Arg::new("level")
					.help("log level")
					.possible_values(["Error", "Warn", "Info", "Debug", "Trace"])
					.ignore_case(true)
					.takes_value(true)
					.long("log"),
			])
	}

	/// Load defaults, the config file, the environment and `args`, each
	/// overriding the former. `env` replaces the process environment if given.
	fn load<I, T>(args: I, env: Option<Map<String, String>>) -> Result<Self>
	where
		I: IntoIterator<Item = T>,
		T: Into<OsString> + Clone,
	{
		let opts = Self::command().try_get_matches_from(args)?;
		let config_path = opts.value_of("config").unwrap_or_default();

		let conf = Config::builder()
			.set_default("receiver.bind_address", "0.0.0.0")?
			.set_default("receiver.port", 6725)?
			.set_default("receiver.on_emit_failure", "exit")?
			.set_default("output.format", "json")?
			.set_default("log.level", "info")?
			.add_source(File::with_name(config_path).required(false))
			.add_source(
				Environment::with_prefix(ENV_PREFIX)
					.prefix_separator("_")
					.separator("__")
					.try_parsing(true)
					.source(env),
			);

		let conf = Self::apply_arguments(conf, &opts)?.build().context("can't load config")?;

		conf.try_deserialize().context("can't load config")
	}

	/// command line arguments take precedence over everything else
	fn apply_arguments(
		conf: config::ConfigBuilder<config::builder::DefaultState>,
		opts: &ArgMatches,
	) -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
		let lowercase = |name: &str| opts.value_of(name).map(str::to_lowercase);

		let mut conf = conf
			.set_override_option("receiver.bind_address", opts.value_of("bind-address"))?
			.set_override_option("receiver.port", opts.value_of("port"))?
			.set_override_option("receiver.on_emit_failure", lowercase("on-emit-failure"))?
			.set_override_option("output.format", lowercase("format"))?
			.set_override_option("log.level", opts.value_of("level"))?;

		if let Some(port) = opts.value_of("telemetry-port") {
			conf = conf.set_override("telemetry_endpoint.port", port)?;
		}

		Ok(conf)
	}
}

#[cfg(test)]
mod tests {
	use std::{
		fs,
		net::{IpAddr, Ipv4Addr},
		path::PathBuf,
	};

	use super::*;
	use crate::alertmanager_webhook_receiver::EmitFailurePolicy;

	/// config file which doesn't exist, so only defaults and arguments apply
	const NO_CONFIG: [&str; 3] = ["alertlog", "-c", "/nonexistent/alertlog"];

	fn no_env() -> Option<Map<String, String>> {
		Some(Map::new())
	}

	fn env(vars: &[(&str, &str)]) -> Option<Map<String, String>> {
		Some(vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
	}

	/// writes `contents` into a config file unique to `name`
	fn config_file(name: &str, contents: &str) -> PathBuf {
		let path = std::env::temp_dir().join(format!("alertlog-{}-{}.yaml", name, std::process::id()));
		fs::write(&path, contents).unwrap();
		path
	}

	const CONFIG: &str = "
receiver:
  bind_address: 127.0.0.1
  port: 7000
  on_emit_failure: continue
output:
  format: logfmt
log:
  level: warn
telemetry_endpoint:
  port: 9725
";

	#[test]
	fn defaults() {
		let settings = Settings::load(NO_CONFIG, no_env()).unwrap();

		let receiver = &settings.receiver;
		assert_eq!(receiver.bind_address, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
		assert_eq!(receiver.port, 6725);
		assert_eq!(receiver.on_emit_failure, EmitFailurePolicy::Exit);
		assert_eq!(settings.output.format, RecordFormat::Json);
		assert_eq!(settings.log.level, "info");
		assert!(settings.telemetry_endpoint.is_none());
	}

	#[test]
	fn arguments_override_defaults() {
		let args = NO_CONFIG.into_iter().chain([
			"--bind-address",
			"127.0.0.1",
			"--port",
			"9000",
			"--format",
			"LOGFMT",
			"--on-emit-failure",
			"continue",
			"--telemetry-port",
			"9100",
			"--log",
			"Debug",
		]);
		let settings = Settings::load(args, no_env()).unwrap();

		let receiver = &settings.receiver;
		assert_eq!(receiver.to_socket_addr().to_string(), "127.0.0.1:9000");
		assert_eq!(receiver.on_emit_failure, EmitFailurePolicy::Continue);
		assert_eq!(settings.output.format, RecordFormat::Logfmt);
		assert_eq!(settings.log.level, "Debug");

		let telemetry = settings.telemetry_endpoint.unwrap();
		assert_eq!(telemetry.to_socket_addr().to_string(), "0.0.0.0:9100");
	}

	#[test]
	fn rejects_unknown_format() {
		let args = NO_CONFIG.into_iter().chain(["--format", "xml"]);
		assert!(Settings::load(args, no_env()).is_err());
	}

	#[test]
	fn reads_config_file() {
		let path = config_file("file", CONFIG);
		let settings = Settings::load(["alertlog", "-c", path.to_str().unwrap()], no_env()).unwrap();
		fs::remove_file(&path).unwrap();

		let receiver = &settings.receiver;
		assert_eq!(receiver.to_socket_addr().to_string(), "127.0.0.1:7000");
		assert_eq!(receiver.on_emit_failure, EmitFailurePolicy::Continue);
		assert_eq!(settings.output.format, RecordFormat::Logfmt);
		assert_eq!(settings.log.level, "warn");
		assert_eq!(settings.telemetry_endpoint.unwrap().to_socket_addr().to_string(), "0.0.0.0:9725");
	}

	#[test]
	fn environment_overrides_defaults() {
		let vars = env(&[
			("ALERTLOG_RECEIVER__PORT", "9001"),
			("ALERTLOG_RECEIVER__ON_EMIT_FAILURE", "continue"),
			("ALERTLOG_OUTPUT__FORMAT", "logfmt"),
			("OTHER_RECEIVER__PORT", "1"),
		]);
		let settings = Settings::load(NO_CONFIG, vars).unwrap();

		assert_eq!(settings.receiver.port, 9001);
		assert_eq!(settings.receiver.on_emit_failure, EmitFailurePolicy::Continue);
		assert_eq!(settings.output.format, RecordFormat::Logfmt);
	}

	#[test]
	fn layers_take_precedence_in_order() {
		let path = config_file("layers", CONFIG);
		let config = path.to_str().unwrap();

		let from_env = Settings::load(
			["alertlog", "-c", config],
			env(&[("ALERTLOG_RECEIVER__PORT", "8000")]),
		)
		.unwrap();
		let from_args = Settings::load(
			["alertlog", "-c", config, "--port", "9000"],
			env(&[("ALERTLOG_RECEIVER__PORT", "8000")]),
		)
		.unwrap();
		fs::remove_file(&path).unwrap();

		assert_eq!(from_env.receiver.port, 8000);
		assert_eq!(from_env.receiver.bind_address.to_string(), "127.0.0.1");
		assert_eq!(from_args.receiver.port, 9000);
	}
}
