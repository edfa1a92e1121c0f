//! Service Timer CLI - a countdown timer that keeps running in the background
//!
//! The daemon owns the countdown; every other subcommand talks to it over a
//! Unix socket:
//! - start / pause / stop the countdown
//! - plus / minus / hold to shift the total between 1 and 60 minutes
//! - status / watch to read it back

use std::io::Write;
use std::time::Duration;

use anyhow::Result;
use clap::{CommandFactory, Parser};

use service_timer::cli::{render_view, Cli, Commands, Display, IpcClient};
use service_timer::daemon::{self, default_socket_path, DaemonOptions};
use service_timer::store::default_state_path;
use service_timer::types::AdjustDirection;

/// Main entry point
#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    init_tracing(cli.verbose);

    // Execute command
    if let Err(e) = execute(cli).await {
        Display::show_error(&e.to_string());
        std::process::exit(1);
    }
}

/// Initializes the tracing subscriber for logging.
///
/// `RUST_LOG` wins; otherwise `warn`, or `info` with `--verbose`.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}

/// Executes the CLI command.
async fn execute(cli: Cli) -> Result<()> {
    if cli.verbose {
        tracing::info!("Verbose mode enabled");
    }

    let Some(command) = cli.command else {
        // No command provided, show help
        Cli::command().print_help()?;
        return Ok(());
    };

    match command {
        Commands::Start(args) => {
            let client = IpcClient::from_option(cli.socket)?;
            let response = client.start(&args).await?;
            Display::show_start_success(&response);
        }
        Commands::Pause => {
            let client = IpcClient::from_option(cli.socket)?;
            let response = client.pause().await?;
            Display::show_pause_success(&response);
        }
        Commands::Stop => {
            let client = IpcClient::from_option(cli.socket)?;
            let response = client.stop().await?;
            Display::show_stop_success(&response);
        }
        Commands::Plus(args) => {
            let client = IpcClient::from_option(cli.socket)?;
            let response = client.adjust(args.delta_ms(AdjustDirection::Plus)).await?;
            Display::show_adjust_result(&response);
        }
        Commands::Minus(args) => {
            let client = IpcClient::from_option(cli.socket)?;
            let response = client.adjust(args.delta_ms(AdjustDirection::Minus)).await?;
            Display::show_adjust_result(&response);
        }
        Commands::Hold(args) => {
            let client = IpcClient::from_option(cli.socket)?;
            client.adjust_repeat(args.direction, args.interval).await?;

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(args.duration)) => {}
                _ = tokio::signal::ctrl_c() => {}
            }

            let response = client.adjust_stop().await?;
            Display::show_adjust_result(&response);
        }
        Commands::Status => {
            let client = IpcClient::from_option(cli.socket)?;
            let response = client.status().await?;
            Display::show_status(&response);
        }
        Commands::Watch(args) => {
            let client = IpcClient::from_option(cli.socket)?;
            watch(&client, Duration::from_millis(args.interval)).await?;
        }
        Commands::Daemon(args) => {
            let socket_path = match cli.socket {
                Some(path) => path,
                None => default_socket_path()?,
            };
            let state_path = match args.state_file.clone() {
                Some(path) => path,
                None => default_state_path()?,
            };
            daemon::run(DaemonOptions {
                config: args.to_config(),
                socket_path,
                state_path,
            })
            .await?;
        }
        Commands::Completions { shell } => {
            generate_completions(shell);
        }
    }

    Ok(())
}

/// Redraws the timer line every `interval` until Ctrl-C.
async fn watch(client: &IpcClient, interval: Duration) -> Result<()> {
    let mut stdout = std::io::stdout();
    let mut ticker = tokio::time::interval(interval);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let line = render_view(&client.view().await);
                write!(stdout, "\r{}\x1b[K", line)?;
                stdout.flush()?;
            }
            _ = &mut ctrl_c => break,
        }
    }

    writeln!(stdout)?;
    Ok(())
}

/// Generates shell completion scripts.
fn generate_completions(shell: clap_complete::Shell) {
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, bin_name, &mut io::stdout());
}

// ============================================================================
// Tests
// ============================================================================
