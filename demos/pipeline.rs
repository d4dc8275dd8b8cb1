//! # Pipeline Example
//!
//! Shows the core directive→result pipeline: a `TaskEngine` classifying
//! lines, a result drain printing what comes out, and a `LogWriter` observer
//! narrating every lifecycle event.
//!
//! ## Run
//! ```bash
//! cargo run --example pipeline --features "logging"
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use conveyor::{
    Config, DrainFn, LogWriter, Observe, ObserverSet, QueueConsumer, TaskEngine, TaskResult,
    TaskWorker,
};

/// Counts words per line; blank lines are empty results, lines containing
/// "corrupt" fail.
struct WordCounter;

#[async_trait]
impl TaskWorker for WordCounter {
    type Directive = String;
    type Output = usize;

    fn accepts(&self, line: &String) -> bool {
        line.len() < 1024
    }

    async fn consume(&self, line: String) -> TaskResult<String, usize> {
        if line.contains("corrupt") {
            return TaskResult::error(line, "corrupt input");
        }
        match line.split_whitespace().count() {
            0 => TaskResult::empty(line),
            n => TaskResult::success(line, n),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let results = DrainFn::arc(|mut consumer: QueueConsumer<TaskResult<String, usize>>| async move {
        while let Some(result) = consumer.consume_next() {
            println!("{:>6}result: {:?} words={:?}", "", result.state, result.value);
        }
        Ok(())
    });

    let cfg = Config {
        max_queue_length: 4, // small cap so backpressure is visible
        bus_capacity: 256,
    };
    let engine = TaskEngine::new("word-counter", cfg, Arc::new(WordCounter), results);

    // Narrate everything the engine publishes.
    let observers: Vec<Arc<dyn Observe>> = vec![Arc::new(LogWriter)];
    let set = Arc::new(ObserverSet::new(observers, engine.bus().clone()));
    let pump = set.attach(engine.bus());

    for line in [
        "the quick brown fox",
        "",
        "a corrupt record slipped in",
        "jumps over the lazy dog",
        "   ",
        "one",
    ] {
        engine.queue_task(line.to_string()).await?;
    }

    engine.wait_idle(Some(Duration::from_secs(5))).await;
    let snap = engine.counters();
    println!(
        "done: total={} ok={} empty={} failed={} progress={:.0}% rate={:.1}/s",
        snap.total,
        snap.successful,
        snap.empty,
        snap.failed,
        snap.progress * 100.0,
        snap.tasks_per_second,
    );

    pump.cancel();
    Ok(())
}
