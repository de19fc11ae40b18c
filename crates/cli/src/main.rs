use std::process::ExitCode;

use anyhow::anyhow;
use gigbook_core::config::{AppConfig, LoadOptions, LogFormat};
use tracing_subscriber::EnvFilter;

fn init_logging() -> anyhow::Result<()> {
    // An invalid config is reported by the command itself; logging falls back
    // to warnings. Logs go to stderr so stdout stays one JSON envelope.
    let (level, format) = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => (config.logging.level, config.logging.format),
        Err(_) => ("warn".to_string(), LogFormat::Compact),
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|error| anyhow!("could not install the log subscriber: {error}"))
}

fn main() -> ExitCode {
    if let Err(error) = init_logging() {
        eprintln!("{error:#}");
    }
    gigbook_cli::run()
}
