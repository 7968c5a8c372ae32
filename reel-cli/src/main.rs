mod cli;
mod commands;
mod config;
mod output;

use std::process;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
#[cfg(feature = "colored-output")]
use colored::*;
use tracing::{Level, error};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::{
    cli::{Args, Commands},
    commands::{CommandExecutor, Overrides},
    config::AppConfig,
};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let output_format = args.command.output_format();

    if let Err(e) = run(args).await {
        if output_format.is_some_and(|format| format.is_json()) {
            let error_json = serde_json::json!({
                "status": "error",
                "message": format!("{e:#}"),
            });
            println!("{error_json}");
        } else {
            error!("Application error: {:#}", e);
            #[cfg(feature = "colored-output")]
            {
                eprintln!("{} {:#}", "Error:".red().bold(), e);
            }
            #[cfg(not(feature = "colored-output"))]
            {
                eprintln!("Error: {:#}", e);
            }
        }
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    init_logging(args.verbose, args.quiet);

    let config = AppConfig::load(args.config.as_deref())?;
    let overrides = Overrides {
        origin: args.origin,
        timeout: args.timeout.map(Duration::from_secs),
        retries: args.retries,
        no_cache: args.no_cache,
    };

    match args.command {
        Commands::Page {
            subject,
            page,
            resolve,
            concurrency,
            output,
        } => {
            CommandExecutor::new(config, overrides)
                .page(&subject, page, resolve, concurrency, output)
                .await?;
        }

        Commands::Resolve { url, output } => {
            CommandExecutor::new(config, overrides)
                .resolve(&url, output)
                .await?;
        }

        Commands::Unpack { file, output } => {
            CommandExecutor::new(config, overrides)
                .unpack(file.as_deref(), output)
                .await?;
        }

        Commands::Completions { shell } => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Args::command();
            let bin_name = cmd.get_name().to_string();
            generate(shell, &mut cmd, bin_name, &mut std::io::stdout());
        }

        Commands::Config { show, reset } => {
            if reset {
                let path = AppConfig::reset(args.config.as_deref())?;
                println!("✓ Configuration reset to defaults at {}", path.display());
            } else if show {
                println!("{}", config.show()?);
            } else {
                println!(
                    "Use --show to display current configuration or --reset to reset to defaults"
                );
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(verbose)
                .with_writer(std::io::stderr),
        )
        .init();
}
