use anyhow::Result;
use clap::{CommandFactory, Parser};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use voxcheck::app::{run_check_command, run_config_command, run_devices_command};
use voxcheck::cli::{Cli, Commands};
use voxcheck::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        None => {
            let config = load_config(cli.config.as_deref())?;
            run_check_command(
                config,
                cli.device,
                cli.duration,
                cli.wav,
                cli.json,
                cli.quiet,
            )
            .await?;
        }
        Some(Commands::Devices) => {
            run_devices_command()?;
        }
        Some(Commands::Config { action }) => {
            let config = load_config(cli.config.as_deref())?;
            run_config_command(&config, &action)?;
        }
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "voxcheck",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}

/// Map -v occurrences onto a default log filter; RUST_LOG always wins.
fn init_tracing(verbosity: u8) {
    let default_filter = match verbosity {
        0 => "voxcheck=warn",
        1 => "voxcheck=debug",
        _ => "voxcheck=trace",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config)
/// 2. Default config path (~/.config/voxcheck/config.toml)
/// 3. Built-in defaults with environment variable overrides
fn load_config(custom_path: Option<&std::path::Path>) -> Result<Config> {
    let config = Config::load_or_default(custom_path)?;
    Ok(config.with_env_overrides())
}
