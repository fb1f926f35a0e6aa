//! Door access simulator for the desktop.
//!
//! Runs the door controller on the host with the `embassy-time` std driver.
//! Two modes:
//!
//! - `demo` (default): a scripted walk-through of token issue, unlock,
//!   auto-relock, revocation and fault handling.
//! - `shell`: interactive commands read from stdin.
//!
//! ```bash
//! door-simulator                                   # demo with real timings
//! door-simulator --relock-ms 2000 shell            # faster relock
//! door-simulator -vv --actuation-ms 200 shell      # debug logs
//! ```

mod shell;
mod tasks;

use anyhow::Context;
use clap::{Parser, Subcommand};
use door_common::DoorConfig;
use door_common::config::{DEFAULT_ACTUATION_DELAY, DEFAULT_AUTO_RELOCK};
use door_controller::DoorControl;
use embassy_futures::select::{Either3, select3};
use log::info;

#[derive(Debug, Parser)]
#[command(name = "door-simulator", version, about)]
struct Args {
    /// Motor travel time for unlock and lock, in milliseconds
    #[arg(
        short = 'a',
        long = "actuation-ms",
        default_value_t = DEFAULT_ACTUATION_DELAY.as_millis(),
        value_parser = clap::value_parser!(u64).range(1..=10_000)
    )]
    actuation_ms: u64,

    /// Delay between reaching Unlocked and the automatic relock, in milliseconds
    #[arg(
        short = 'r',
        long = "relock-ms",
        default_value_t = DEFAULT_AUTO_RELOCK.as_millis(),
        value_parser = clap::value_parser!(u64).range(1..=3_600_000)
    )]
    relock_ms: u64,

    /// Increase verbosity (can be repeated: -v, -vv, -vvv)
    #[arg(short = 'v', action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum Mode {
    /// Scripted walk-through (default)
    Demo,
    /// Interactive command shell
    Shell,
}

fn init_logging(verbosity: u8) -> anyhow::Result<()> {
    // Operator output goes to stdout; diagnostics stay quiet unless asked for
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env = env_logger::Env::default().default_filter_or(level);
    env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init()
        .context("failed to install logger")
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose)?;

    let config = DoorConfig::from_millis(args.actuation_ms, args.relock_ms).context("invalid door timing")?;
    let mode = args.mode.unwrap_or(Mode::Demo);
    info!(
        "starting {mode:?} (actuation {} ms, auto-relock {} ms)",
        args.actuation_ms, args.relock_ms
    );

    let door = DoorControl::new(config);

    futures::executor::block_on(async {
        let app = async {
            match mode {
                Mode::Demo => tasks::run_demo(&door).await,
                Mode::Shell => shell::run(&door).await,
            }
        };

        match select3(door.run_auto_relock(), tasks::print_state_changes(&door), app).await {
            Either3::First(()) | Either3::Second(()) => unreachable!("background tasks never return"),
            Either3::Third(result) => result,
        }
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
