//! Command definitions for the Service Timer CLI.
//!
//! Uses clap derive macro for argument parsing.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::types::{AdjustDirection, EngineConfig, MINUTE_MS};

// ============================================================================
// CLI Structure
// ============================================================================

/// Service Timer CLI - a countdown timer hosted by a background daemon
#[derive(Parser, Debug)]
#[command(
    name = "service-timer",
    version,
    about = "バックグラウンドで動作するカウントダウンタイマー",
    long_about = "デーモンがカウントダウンを保持し、CLIから開始・一時停止・停止・時間調整を行います。\n\
                  一時停止中の残り時間はデーモンを再起動しても復元されます。",
    propagate_version = true
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Unix socket of the daemon (default: ~/.service-timer/service-timer.sock)
    #[arg(long, global = true, value_name = "PATH")]
    pub socket: Option<PathBuf>,
}

// ============================================================================
// Subcommands
// ============================================================================

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start or resume the countdown
    Start(StartArgs),

    /// Pause the countdown
    Pause,

    /// Stop the countdown
    Stop,

    /// Add time to the timer
    Plus(AdjustArgs),

    /// Remove time from the timer
    Minus(AdjustArgs),

    /// Keep adjusting while "held", like a long-pressed button
    Hold(HoldArgs),

    /// Show current timer status
    Status,

    /// Continuously show the timer
    Watch(WatchArgs),

    /// Run as daemon (background service)
    Daemon(DaemonArgs),

    /// Generate shell completion scripts
    Completions {
        /// Shell type for completion script
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

// ============================================================================
// Command Arguments
// ============================================================================

/// Arguments for the start command
#[derive(Args, Debug, Clone, Default)]
pub struct StartArgs {
    /// Countdown tick in milliseconds (10-60000)
    #[arg(long, value_parser = clap::value_parser!(u64).range(10..=60_000))]
    pub tick: Option<u64>,

    /// Total minutes for a fresh run (1-60)
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..=60))]
    pub total: Option<u64>,
}

impl StartArgs {
    /// Total in milliseconds, if given.
    pub fn total_ms(&self) -> Option<u64> {
        self.total.map(|minutes| minutes * MINUTE_MS)
    }
}

/// Arguments for the plus and minus commands
#[derive(Args, Debug, Clone)]
pub struct AdjustArgs {
    /// Minutes to add or remove (1-59)
    #[arg(
        short,
        long,
        default_value = "1",
        value_parser = clap::value_parser!(u64).range(1..=59)
    )]
    pub minutes: u64,
}

impl AdjustArgs {
    /// Signed shift in milliseconds for `direction`.
    pub fn delta_ms(&self, direction: AdjustDirection) -> i64 {
        direction.delta(self.minutes * MINUTE_MS)
    }
}

/// Arguments for the hold command
#[derive(Args, Debug, Clone)]
pub struct HoldArgs {
    /// Direction of each adjustment
    #[arg(value_enum)]
    pub direction: AdjustDirection,

    /// Milliseconds between adjustments (10-10000, default: daemon setting)
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(10..=10_000))]
    pub interval: Option<u64>,

    /// How long to hold, in milliseconds (1-60000)
    #[arg(
        short,
        long,
        default_value = "1000",
        value_parser = clap::value_parser!(u64).range(1..=60_000)
    )]
    pub duration: u64,
}

/// Arguments for the watch command
#[derive(Args, Debug, Clone)]
pub struct WatchArgs {
    /// Refresh interval in milliseconds (50-10000)
    #[arg(
        short,
        long,
        default_value = "500",
        value_parser = clap::value_parser!(u64).range(50..=10_000)
    )]
    pub interval: u64,
}

/// Arguments for the daemon command
#[derive(Args, Debug, Clone)]
pub struct DaemonArgs {
    /// Countdown tick in milliseconds (10-60000)
    #[arg(
        long,
        default_value = "100",
        value_parser = clap::value_parser!(u64).range(10..=60_000)
    )]
    pub tick: u64,

    /// Minutes added or removed by one hold step (1-60)
    #[arg(
        long,
        default_value = "1",
        value_parser = clap::value_parser!(u64).range(1..=60)
    )]
    pub step: u64,

    /// Default milliseconds between hold steps (10-10000)
    #[arg(
        long,
        default_value = "100",
        value_parser = clap::value_parser!(u64).range(10..=10_000)
    )]
    pub repeat_interval: u64,

    /// File holding the paused timer (default: ~/.service-timer/state.json)
    #[arg(long, value_name = "PATH")]
    pub state_file: Option<PathBuf>,
}

impl DaemonArgs {
    /// Builds the engine configuration from the flags.
    pub fn to_config(&self) -> EngineConfig {
        EngineConfig::default()
            .with_tick_ms(self.tick)
            .with_adjust_step_ms(self.step * MINUTE_MS)
            .with_repeat_interval_ms(self.repeat_interval)
    }
}

// ============================================================================
// Tests
// ============================================================================
