//! # Commands Example
//!
//! Shows the command lifecycle: a gated `RelayCommand`, an
//! `AggregateCommand` over several children, and what happens when one child
//! fails.
//!
//! ## Run
//! ```bash
//! cargo run --example commands
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use conveyor::{AggregateCommand, Bus, Command, Error, EventKind, RelayCommand};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let bus = Bus::new(256);
    let mut rx = bus.subscribe();

    // A command whose precondition is re-checked at execution time.
    let armed = Arc::new(AtomicBool::new(false));
    let gate = armed.clone();
    let deploy = Arc::new(
        RelayCommand::new("deploy", bus.clone(), |_param| async move {
            println!("{:>6}deploying...", "");
            Ok(())
        })
        .with_can_execute(move |_param| gate.load(Ordering::SeqCst)),
    );

    println!("-- disarmed: the failure surfaces as a notification + Err");
    let err = deploy.clone().execute(None).await.expect_err("disarmed");
    println!("{:>6}got: {err}", "");

    armed.store(true, Ordering::SeqCst);
    deploy.notify_can_execute_changed();
    println!("-- armed: runs to completion");
    deploy.clone().execute(None).await?;

    // An aggregate: all children must succeed.
    println!("-- aggregate of three children, one of them failing");
    let children: Vec<Arc<dyn Command>> = vec![
        RelayCommand::arc("fetch", bus.clone(), |_param| async move { Ok(()) }),
        RelayCommand::arc("verify", bus.clone(), |_param| async move {
            Err(Error::invalid_operation("checksum mismatch"))
        }),
        RelayCommand::arc("install", bus.clone(), |_param| async move { Ok(()) }),
    ];
    let rollout = AggregateCommand::arc("rollout", bus.clone(), children);
    let err = rollout.execute(None).await.expect_err("child failed");
    println!("{:>6}aggregate failed: {err}", "");

    // Replay the notification stream.
    tokio::time::sleep(Duration::from_millis(20)).await;
    println!("-- notifications, in order:");
    while let Ok(ev) = rx.try_recv() {
        match ev.kind {
            EventKind::CommandExecuting
            | EventKind::CommandCompleted
            | EventKind::CommandFailed
            | EventKind::CanExecuteChanged => {
                println!(
                    "{:>6}{:?} command={:?} err={:?}",
                    "", ev.kind, ev.command, ev.error
                );
            }
            _ => {}
        }
    }
    Ok(())
}
