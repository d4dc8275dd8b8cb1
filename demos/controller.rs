//! # Controller Example
//!
//! Shows a `ProcessController` supervising two engines as one process:
//! - state triggers follow the ingest engine's lifecycle,
//! - a command trigger fires a summary command when the process stops,
//! - aggregate counters and health summarize both engines.
//!
//! ## Run
//! ```bash
//! cargo run --example controller --features "logging"
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use conveyor::{
    CommandTrigger, Config, DrainFn, EventKind, EventTrigger, LogWriter, Observe, ObserverSet,
    ProcessController, ProcessRole, QueueConsumer, RelayCommand, StateTrigger, TaskEngine,
    TaskResult, TaskWorker,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Phase {
    Pending,
    Ingesting,
    Idle,
}

/// Parses numeric records; odd values are empty, a zero fails.
struct Ingest;

#[async_trait]
impl TaskWorker for Ingest {
    type Directive = i64;
    type Output = i64;

    async fn consume(&self, record: i64) -> TaskResult<i64, i64> {
        match record {
            0 => TaskResult::error(record, "zero record"),
            r if r % 2 != 0 => TaskResult::empty(record),
            r => TaskResult::success(record, r / 2),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sink = DrainFn::arc(|mut consumer: QueueConsumer<TaskResult<i64, i64>>| async move {
        while consumer.consume_next().is_some() {}
        Ok(())
    });
    let engine = TaskEngine::new("ingest", Config::default(), Arc::new(Ingest), sink);

    let ctrl: Arc<ProcessController<Phase>> =
        ProcessController::new("import", Config::default(), Phase::Pending, Phase::Idle);

    // Transitions follow the engine lifecycle.
    ctrl.register_state_triggers(vec![
        StateTrigger::new(
            EventTrigger::on_source_kind("ingest-up", "ingest", EventKind::EngineStarted),
            Phase::Ingesting,
        ),
        StateTrigger::new(
            EventTrigger::on_source_kind("ingest-down", "ingest", EventKind::EngineStopped),
            Phase::Idle,
        ),
    ]);

    // Fire a summary command when the process reaches its stop.
    let summary = RelayCommand::arc("summarize", ctrl.bus().clone(), |_param| async move {
        println!("{:>6}summary command ran", "");
        Ok(())
    });
    ctrl.register_command_triggers(vec![CommandTrigger::new(
        EventTrigger::on_source_kind("summarize-on-stop", "ingest", EventKind::EngineStopped),
        summary,
    )]);

    // Same engine produces and consumes in this small process.
    ctrl.register_components(ProcessRole::Producer, vec![engine.clone()]);
    ctrl.register_components(ProcessRole::Consumer, vec![engine.clone()]);

    // Narrate the controller's own bus.
    let observers: Vec<Arc<dyn Observe>> = vec![Arc::new(LogWriter)];
    let set = Arc::new(ObserverSet::new(observers, ctrl.bus().clone()));
    let pump = set.attach(ctrl.bus());

    for record in [2, 7, 0, 16, 3, 42, 9, 8] {
        engine.queue_task(record).await?;
    }

    engine.wait_idle(Some(Duration::from_secs(5))).await;
    ctrl.wait_idle(Some(Duration::from_secs(5))).await;
    tokio::time::sleep(Duration::from_millis(50)).await; // let the narration flush

    println!(
        "process: state={:?} health={:?} total={} completed={} progress={:.0}% rate={:.1}/s",
        ctrl.current_state(),
        ctrl.health(),
        ctrl.total_tasks(),
        ctrl.completed_tasks(),
        ctrl.progress() * 100.0,
        ctrl.tasks_per_second(),
    );

    pump.cancel();
    Ok(())
}
