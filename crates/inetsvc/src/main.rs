//! Entry point for the inetsvc service binary.
//!
//! Installs, removes, debugs or runs the configured daemon as a service,
//! depending on the command line.

use anyhow::Context;
use clap::Parser;
use inetsvc::cli::Cli;
use inetsvc::config::Config;
use inetsvc::{app, logging, platform};
use inetsvc_lib::{RunMode, SERVICE_NAME};

fn main() {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("failed to load configuration");

    let event_log = if cli.run_mode() == RunMode::Supervised {
        let source = config
            .as_ref()
            .map_or(SERVICE_NAME, |cfg| cfg.service_name.as_str());
        platform::event_log(source)
    } else {
        None
    };
    logging::init(event_log);

    let code = match config {
        Ok(config) => app::run(&cli, &config),
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "Startup failed");
            1
        }
    };
    std::process::exit(code);
}
