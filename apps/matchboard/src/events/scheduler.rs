use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use super::producer::EventProducer;

/// Owner of a running producer loop.
pub struct ProducerHandle {
    shutdown: watch::Sender<bool>,
    trigger: Arc<Notify>,
    task: JoinHandle<()>,
}

impl ProducerHandle {
    /// Requests an extra cycle as soon as the current one (if any) finishes.
    pub fn trigger(&self) {
        self.trigger.notify_one();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops the loop and waits for an in-flight cycle to complete.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!("Event producer task ended abnormally: {e}");
        }
    }
}

/// Starts the polling loop. The first cycle runs immediately, then once per `period`.
pub fn spawn_producer(producer: Arc<EventProducer>, period: Duration) -> ProducerHandle {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let trigger = Arc::new(Notify::new());
    let trigger_rx = trigger.clone();

    let task = tokio::spawn(async move {
        info!("Event producer started (every {}s)", period.as_secs());
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    run_cycle_blocking(&producer).await;
                }
                _ = trigger_rx.notified() => {
                    run_cycle_blocking(&producer).await;
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Event producer stopped after {} cycles", producer.cycles());
    });

    ProducerHandle {
        shutdown: shutdown_tx,
        trigger,
        task,
    }
}

/// Cycles take a std mutex and write the log to disk, so they run off the async workers.
async fn run_cycle_blocking(producer: &Arc<EventProducer>) {
    let producer = producer.clone();
    match tokio::task::spawn_blocking(move || producer.run_cycle()).await {
        Ok(report) if report.persist_failures > 0 => {
            warn!("{} notifications not persisted this cycle", report.persist_failures);
        }
        Ok(_) => {}
        Err(e) => error!("Producer cycle panicked: {e}"),
    }
}
