//! Scheduler background loop.
//!
//! Spawns a tokio task that sweeps on a fixed interval and on every store
//! event until its cancellation token fires.

use super::Scheduler;
use crate::config::Config;
use crate::store::StoreEvent;
use chrono::Utc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Handle to a running scheduler loop.
#[derive(Debug)]
pub struct SchedulerHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Token that stops the loop when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Stop the loop and wait for it to exit. The periodic timer is gone
    /// once this returns.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.join.await {
            error!(error = %e, "scheduler task failed");
        }
    }
}

/// Timer whose first tick lands at `start`.
fn ticker(start: Instant, period: Duration) -> Interval {
    let mut interval = tokio::time::interval_at(start, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

impl Scheduler {
    /// Start the background loop.
    ///
    /// - `IndexReady` registers every document, then sweeps.
    /// - `Changed` re-parses that document, then sweeps.
    /// - `Removed` forgets that document, then sweeps.
    /// - The timer sweeps every `sweep_interval_minutes`.
    ///
    /// Events are handled on their own tasks so a slow read never holds up
    /// the timer or other documents. Editing the due key re-registers the
    /// whole vault; editing the interval restarts the timer.
    pub fn run(self, events: mpsc::Receiver<StoreEvent>, cancel: CancellationToken) -> SchedulerHandle {
        // Edits made after run() returns are seen by the loop.
        let mut config_rx = self.config.clone();
        let current = config_rx.borrow_and_update().clone();
        let join = tokio::spawn(self.run_loop(events, config_rx, current, cancel.clone()));
        SchedulerHandle { cancel, join }
    }

    async fn run_loop(
        self,
        mut events: mpsc::Receiver<StoreEvent>,
        mut config_rx: watch::Receiver<Config>,
        mut current: Config,
        cancel: CancellationToken,
    ) {
        let mut interval = ticker(Instant::now(), current.sweep_interval());
        let mut in_flight: JoinSet<()> = JoinSet::new();
        let mut events_open = true;
        let mut config_open = true;

        info!(
            interval_minutes = current.sweep_interval_minutes,
            due_key = %current.due_key,
            "scheduler started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,

                _ = interval.tick() => {
                    self.sweep(Utc::now()).await;
                }

                event = events.recv(), if events_open => match event {
                    Some(event) => {
                        debug!(?event, "store event");
                        let this = self.clone();
                        in_flight.spawn(async move {
                            this.handle_event(event).await;
                        });
                    }
                    None => {
                        debug!("store event stream closed; continuing on timer only");
                        events_open = false;
                    }
                },

                changed = config_rx.changed(), if config_open => match changed {
                    Ok(()) => {
                        let next = config_rx.borrow_and_update().clone();
                        if next.sweep_interval() != current.sweep_interval() {
                            info!(interval_minutes = next.sweep_interval_minutes, "sweep interval changed");
                            // A full new period elapses before the next sweep.
                            let period = next.sweep_interval();
                            interval = ticker(Instant::now() + period, period);
                        }
                        if next.due_key != current.due_key {
                            info!(due_key = %next.due_key, "due key changed; re-registering vault");
                            let this = self.clone();
                            in_flight.spawn(async move {
                                this.handle_event(StoreEvent::IndexReady).await;
                            });
                        }
                        current = next;
                    }
                    Err(_) => config_open = false,
                },

                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "event task failed");
                    }
                }
            }
        }

        in_flight.shutdown().await;
        info!("scheduler stopped");
    }
}
