//! Interactive command shell.
//!
//! Stdin is read on a helper thread and forwarded over a channel, so the
//! auto-relock timer and the state printer keep running while the shell waits
//! for input.

use std::io::{self, BufRead, Write};
use std::thread;

use anyhow::Context;
use door_common::config::DEFAULT_TOKEN_LIFETIME;
use door_controller::DoorControl;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Duration, TICK_HZ};
use log::{debug, warn};

use crate::tasks::print_status;

/// Longest token lifetime `Duration::from_secs` can represent.
const MAX_LIFETIME_SECS: u64 = u64::MAX / TICK_HZ;

/// Lines read from stdin. `None` marks end of input.
static INPUT: Channel<CriticalSectionRawMutex, Option<String>, 4> = Channel::new();

const HELP: &str = "\
Commands:
  token [secs]   issue a token (default lifetime 60 s)
  tokens         list active tokens
  unlock [id]    unlock with a token (first active token if omitted)
  lock           lock the door
  override       manual override, unlock immediately
  fault          trigger a door fault
  reset          clear a fault
  revoke <id>    revoke a token
  status         door state and counters
  log            print the access log
  help           show this help
  quit           exit";

// =============================================================================
// Commands
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Token(Option<u64>),
    Tokens,
    Unlock(Option<String>),
    Lock,
    Override,
    Fault,
    Reset,
    Revoke(String),
    Status,
    Log,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unknown command `{0}`, type `help` for a list")]
    Unknown(String),
    #[error("`{0}` needs an argument")]
    MissingArgument(&'static str),
    #[error("`{0}` takes fewer arguments")]
    TooManyArguments(&'static str),
    #[error("invalid token lifetime `{0}`, expected whole seconds from 1 to {MAX_LIFETIME_SECS}")]
    InvalidLifetime(String),
}

impl Command {
    /// Parse one input line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, ParseError> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Ok(None);
        };
        let arg = words.next().map(str::to_owned);
        let arg_count = usize::from(arg.is_some()) + words.count();

        let command = match name.to_ascii_lowercase().as_str() {
            "token" => Self::Token(arg.map(parse_lifetime).transpose()?),
            "tokens" => Self::Tokens,
            "unlock" => Self::Unlock(arg),
            "lock" => Self::Lock,
            "override" => Self::Override,
            "fault" => Self::Fault,
            "reset" => Self::Reset,
            "revoke" => Self::Revoke(arg.ok_or(ParseError::MissingArgument("revoke"))?),
            "status" => Self::Status,
            "log" => Self::Log,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            _ => return Err(ParseError::Unknown(name.to_owned())),
        };

        if arg_count > command.max_args() {
            return Err(ParseError::TooManyArguments(command.name()));
        }
        Ok(Some(command))
    }

    const fn max_args(&self) -> usize {
        match self {
            Self::Token(_) | Self::Unlock(_) | Self::Revoke(_) => 1,
            _ => 0,
        }
    }

    const fn name(&self) -> &'static str {
        match self {
            Self::Token(_) => "token",
            Self::Tokens => "tokens",
            Self::Unlock(_) => "unlock",
            Self::Lock => "lock",
            Self::Override => "override",
            Self::Fault => "fault",
            Self::Reset => "reset",
            Self::Revoke(_) => "revoke",
            Self::Status => "status",
            Self::Log => "log",
            Self::Help => "help",
            Self::Quit => "quit",
        }
    }
}

fn parse_lifetime(arg: String) -> Result<u64, ParseError> {
    match arg.parse::<u64>() {
        Ok(secs) if (1..=MAX_LIFETIME_SECS).contains(&secs) => Ok(secs),
        _ => Err(ParseError::InvalidLifetime(arg)),
    }
}

// =============================================================================
// Shell Loop
// =============================================================================

/// Run the shell until `quit` or end of input.
pub async fn run(door: &DoorControl) -> anyhow::Result<()> {
    spawn_stdin_reader()?;
    println!("{HELP}");
    prompt();

    while let Some(line) = INPUT.receive().await {
        match Command::parse(&line) {
            Ok(None) => {}
            Ok(Some(Command::Quit)) => break,
            Ok(Some(command)) => execute(door, command).await,
            Err(err) => println!("{err}"),
        }
        prompt();
    }

    println!("Bye.");
    Ok(())
}

async fn execute(
    door: &DoorControl,
    command: Command,
) {
    debug!("shell command: {command:?}");
    match command {
        Command::Token(secs) => {
            let lifetime = secs.map_or(DEFAULT_TOKEN_LIFETIME, Duration::from_secs);
            let token = door.generate_token(lifetime);
            println!("Token Created: {} (valid {} s)", token.id, lifetime.as_secs());
        }
        Command::Tokens => {
            let active = door.active_tokens();
            if active.is_empty() {
                println!("No valid tokens");
            }
            for token in &active {
                println!(" - {token}");
            }
        }
        Command::Unlock(id) => {
            let id = match id {
                Some(id) => id,
                None => match door.active_tokens().first() {
                    Some(token) => token.id.as_str().to_owned(),
                    None => {
                        println!("No valid tokens");
                        return;
                    }
                },
            };
            let unlocked = door.unlock_door(&id).await;
            println!("Unlock Attempt Success: {unlocked}");
        }
        Command::Lock => println!("Lock Success: {}", door.lock_door().await),
        Command::Override => door.manual_override(),
        Command::Fault => door.trigger_fault(),
        Command::Reset => {
            if !door.reset_fault() {
                println!("Door is not faulted");
            }
        }
        Command::Revoke(id) => println!("Revoke Result: {}", door.revoke_token(&id)),
        Command::Status => {
            println!("State: {}", door.state());
            println!("Failed Attempts: {}", door.failed_attempts());
            println!("Active Tokens: {}", door.active_tokens().len());
        }
        Command::Log => print_status(door),
        Command::Help => println!("{HELP}"),
        Command::Quit => {}
    }
}

fn prompt() {
    print!("> ");
    let _ = io::stdout().flush();
}

/// Forward stdin lines to [`INPUT`] from a dedicated thread.
fn spawn_stdin_reader() -> anyhow::Result<()> {
    thread::Builder::new()
        .name("stdin".into())
        .spawn(|| {
            for line in io::stdin().lock().lines() {
                match line {
                    Ok(line) => futures::executor::block_on(INPUT.send(Some(line))),
                    Err(err) => {
                        warn!("stdin read failed: {err}");
                        break;
                    }
                }
            }
            futures::executor::block_on(INPUT.send(None));
        })
        .context("failed to spawn stdin reader")?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
