//! Background tasks and the scripted demo.

use door_common::config::DEFAULT_TOKEN_LIFETIME;
use door_controller::DoorControl;
use embassy_time::{Duration, Timer};
use log::warn;

/// Extra time allowed past the relock deadline before reading the state.
const RELOCK_MARGIN: Duration = Duration::from_millis(300);

/// Print every state change the door reports, as it happens. Never returns.
pub async fn print_state_changes(door: &DoorControl) {
    let Some(mut receiver) = door.state_receiver() else {
        warn!("no state receiver available, state changes will not be printed");
        return core::future::pending().await;
    };

    loop {
        let state = receiver.changed().await;
        println!("[EVENT] Door state changed → {state}");
    }
}

/// Scripted walk-through of the door's behavior.
pub async fn run_demo(door: &DoorControl) -> anyhow::Result<()> {
    let config = *door.config();
    println!("=== DOOR CONTROL SUBSYSTEM DEMO ===");

    println!("\nGenerating {}-second token...", DEFAULT_TOKEN_LIFETIME.as_secs());
    let token = door.generate_token(DEFAULT_TOKEN_LIFETIME);
    println!("Token Created: {}", token.id);

    println!("\nUnlocking door...");
    let unlocked = door.unlock_door(token.id.as_str()).await;
    println!("Unlock Success: {unlocked}");

    // Relock deadline plus the lock actuation itself
    let wait = config.auto_relock_after + config.actuation_delay + RELOCK_MARGIN;
    println!("\nWaiting {} ms to show auto-relock...", wait.as_millis());
    Timer::after(wait).await;
    println!("Door State After Auto-Relock: {}", door.state());

    println!("\nActive Tokens:");
    let active = door.active_tokens();
    if active.is_empty() {
        println!(" (none, the token was used)");
    }
    for t in &active {
        println!(" - {t}");
    }

    println!("\nRevoking token...");
    println!("Revoke Result: {}", door.revoke_token(token.id.as_str()));

    println!("\nAttempting unlock with revoked token...");
    let retry = door.unlock_door(token.id.as_str()).await;
    println!("Unlock Attempt Success: {retry}");
    println!("Failed Attempts Count: {}", door.failed_attempts());

    println!("\nTriggering fault state...");
    door.trigger_fault();
    // Let the state printer catch up before the log dump
    Timer::after_millis(10).await;
    println!("Current State: {}", door.state());

    println!("\n=== ACCESS LOGS ===");
    print_status(door);

    println!("\n=== END OF DEMO ===");
    Ok(())
}

/// Current state followed by the full audit log.
pub fn print_status(door: &DoorControl) {
    println!("[DoorControl] Current State: {}", door.state());
    for event in door.log() {
        println!("{event}");
    }
}
