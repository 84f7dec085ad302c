use clap::Parser;
use env_logger::Env;
use log::{error, info};
use miel_audit::configuration::{CliArgs, Config};
use miel_audit::controller::controller_handler::{Controller, InputSource};

// No tokio runtime here: the database output owns one and blocks on it.
fn main() {
    // https://docs.rs/env_logger/latest/env_logger/
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_target(false)
        .init();

    println!(
        "
==============================================================================
                 miel-audit v{}: honeypot session audit trail
==============================================================================
",
        env!("CARGO_PKG_VERSION")
    );

    info!("Importing configuration");

    let args = CliArgs::parse();

    let mut config = match Config::from_file(&args.config_file) {
        Ok(config) => config,
        Err(e) => {
            error!("Unable to import configuration from file: {}", e);
            std::process::exit(1);
        }
    };
    config.apply_args(&args);
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    info!("Configuration imported successfully");

    let controller = match Controller::new(&config) {
        Ok(controller) => controller,
        Err(e) => {
            error!("Unable to create a controller instance: {}, exiting...", e);
            std::process::exit(1);
        }
    };

    let sources: Vec<InputSource> = args.inputs.iter().map(|s| InputSource::parse(s)).collect();
    let result = controller.run(&sources);

    // outputs are flushed even when ingestion failed
    let shutdown = controller.shutdown();

    match result {
        Ok(stats) => info!(
            "Done: {} delivered, {} dropped, {} unparsable, {} output failure(s)",
            stats.delivered, stats.dropped, stats.unparsable, stats.sink_failures
        ),
        Err(e) => {
            error!("Error occured in the controller process: {}, exiting...", e);
            std::process::exit(1);
        }
    }
    if let Err(e) = shutdown {
        error!("Error during shutdown: {}", e);
        std::process::exit(1);
    }
}
