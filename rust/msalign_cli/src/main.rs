mod cli;
mod config;
mod errors;
mod processing;

use clap::Parser;
use tracing::info;
use tracing::subscriber::set_global_default;
use tracing_bunyan_formatter::{
    BunyanFormattingLayer,
    JsonStorageLayer,
};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::Registry;

use crate::cli::{
    AlignArgs,
    Args,
    Commands,
    WriteTemplateArgs,
};
use crate::config::Config;
use crate::errors::CliError;

// mimalloc avoids a very slow allocator on windows
#[cfg(target_os = "windows")]
use mimalloc::MiMalloc;

#[cfg(target_os = "windows")]
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn init_logging(json_logs: bool) -> Result<(), CliError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let res = if json_logs {
        let formatting_layer = BunyanFormattingLayer::new("msalign".into(), std::io::stdout);
        let subscriber = Registry::default()
            .with(env_filter)
            .with(JsonStorageLayer)
            .with(formatting_layer);
        set_global_default(subscriber)
    } else {
        let subscriber = Registry::default()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer());
        set_global_default(subscriber)
    };
    res.map_err(|e| CliError::Config {
        source: format!("Setting default subscriber failed: {}", e),
    })
}

fn main_align(args: AlignArgs) -> Result<(), CliError> {
    let config = Config::with_cli_args(&args)?;
    info!("Parsed configuration: {:#?}", config);
    processing::run_alignment(config)
}

fn main_write_template(args: WriteTemplateArgs) -> Result<(), CliError> {
    let template = Config::template();
    let out = serde_json::to_string_pretty(&template).map_err(|e| CliError::ParseError {
        msg: e.to_string(),
    })?;
    std::fs::create_dir_all(&args.output_path).map_err(|e| CliError::io(e, &args.output_path))?;
    let path = args.output_path.join("alignment_config.json");
    std::fs::write(&path, out).map_err(|e| CliError::io(e, &path))?;
    println!("use as `msalign align --config {}`", path.display());
    Ok(())
}

fn main() -> Result<(), CliError> {
    let args = Args::parse();
    init_logging(args.json_logs)?;

    match args.command {
        Some(Commands::Align(args)) => main_align(args)?,
        Some(Commands::WriteTemplate(args)) => main_write_template(args)?,
        None => {
            println!("No command provided");
        }
    }
    Ok(())
}
