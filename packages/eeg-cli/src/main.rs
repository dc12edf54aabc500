use clap::Parser;
use eeg_rs::{CancellationToken, ProcessingConfig};

mod cli;
mod commands;
mod exit_codes;
mod output;

use cli::Cli;

fn load_config(path: Option<&str>) -> eeg_rs::Result<ProcessingConfig> {
    match path {
        Some(path) => ProcessingConfig::from_json_file(path),
        None => ProcessingConfig::from_env(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(exit_codes::INPUT_ERROR);
        }
    };

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupt received, cancelling");
            interrupt.cancel();
        }
    });

    let ctx = commands::Context { config, cancel };
    let command = cli.command;
    let exit_code = match tokio::task::spawn_blocking(move || commands::dispatch(command, &ctx)).await
    {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: command task failed: {}", e);
            exit_codes::EXECUTION_ERROR
        }
    };

    std::process::exit(exit_code);
}
