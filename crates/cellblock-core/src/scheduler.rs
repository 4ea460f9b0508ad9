//! Periodic sweeps driving the world forward.
//!
//! Two independent loops run on the tokio runtime:
//!
//! - **Behavior**: every `behavior.interval_secs`, reassign roaming NPCs
//! - **Regeneration**: every `regeneration.interval_secs`, tick every entity
//!
//! Each loop has its own [`TaskControl`] for pause, resume, and stop. A
//! failed sweep is logged and the loop carries on with the next interval.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info};

use cellblock_store::EntityStore;

use crate::clock::Clock;
use crate::control::TaskControl;
use crate::engine::Engine;

/// Running sweep loops and their controls.
#[derive(Debug)]
pub struct Scheduler {
    behavior: Arc<TaskControl>,
    regeneration: Arc<TaskControl>,
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    /// Start both loops with the intervals from the engine's configuration.
    pub fn start<S, C>(engine: Arc<Engine<S, C>>) -> Self
    where
        S: EntityStore + 'static,
        C: Clock + 'static,
    {
        let config = engine.config();
        let behavior = Duration::from_secs(config.behavior.interval_secs);
        let regeneration = Duration::from_secs(config.regeneration.interval_secs);
        Self::start_with_periods(engine, behavior, regeneration)
    }

    /// Start both loops with explicit periods.
    pub fn start_with_periods<S, C>(
        engine: Arc<Engine<S, C>>,
        behavior_period: Duration,
        regeneration_period: Duration,
    ) -> Self
    where
        S: EntityStore + 'static,
        C: Clock + 'static,
    {
        let behavior = Arc::new(TaskControl::new());
        let regeneration = Arc::new(TaskControl::new());

        let behavior_engine = Arc::clone(&engine);
        let behavior_handle = tokio::spawn(run_loop(
            "behavior",
            behavior_period,
            Arc::clone(&behavior),
            move || {
                let engine = Arc::clone(&behavior_engine);
                async move {
                    let now = engine.clock().now();
                    if let Err(err) = engine.sweep_behaviors(now).await {
                        error!(error = %err, "Behavior sweep failed");
                    }
                }
            },
        ));

        let regeneration_engine = engine;
        let regeneration_handle = tokio::spawn(run_loop(
            "regeneration",
            regeneration_period,
            Arc::clone(&regeneration),
            move || {
                let engine = Arc::clone(&regeneration_engine);
                async move {
                    let now = engine.clock().now();
                    if let Err(err) = engine.tick_all(now).await {
                        error!(error = %err, "Regeneration sweep failed");
                    }
                }
            },
        ));

        Self {
            behavior,
            regeneration,
            handles: vec![behavior_handle, regeneration_handle],
        }
    }

    /// Control for the behavior loop.
    pub const fn behavior(&self) -> &Arc<TaskControl> {
        &self.behavior
    }

    /// Control for the regeneration loop.
    pub const fn regeneration(&self) -> &Arc<TaskControl> {
        &self.regeneration
    }

    /// Stop both loops and wait for their current sweeps to finish.
    pub async fn shutdown(self) {
        self.behavior.request_stop();
        self.regeneration.request_stop();
        for handle in self.handles {
            if let Err(err) = handle.await {
                error!(error = %err, "Sweep task ended abnormally");
            }
        }
        info!("Schedulers stopped");
    }
}

/// Run `sweep` every `period` until the control asks to stop.
async fn run_loop<F, Fut>(name: &'static str, period: Duration, control: Arc<TaskControl>, mut sweep: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    info!(
        task = name,
        period_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX),
        "Sweep loop starting"
    );

    loop {
        if control.is_paused() {
            info!(task = name, "Sweep loop paused, waiting for resume...");
            control.wait_if_paused().await;
            info!(task = name, "Sweep loop resumed");
        }
        if control.is_stop_requested() {
            break;
        }

        sweep().await;

        if !control.sleep_or_stop(period).await {
            break;
        }
    }

    info!(task = name, "Sweep loop stopped");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test]
    async fn loop_runs_until_stopped() {
        let control = Arc::new(TaskControl::new());
        let counter = Arc::new(AtomicU32::new(0));

        let sweeps = Arc::clone(&counter);
        let handle = tokio::spawn(run_loop(
            "test",
            Duration::from_millis(5),
            Arc::clone(&control),
            move || {
                let sweeps = Arc::clone(&sweeps);
                async move {
                    sweeps.fetch_add(1, Ordering::SeqCst);
                }
            },
        ));

        tokio::time::sleep(Duration::from_millis(60)).await;
        control.request_stop();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(counter.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn paused_loop_does_not_sweep() {
        let control = Arc::new(TaskControl::new());
        control.pause();
        let counter = Arc::new(AtomicU32::new(0));

        let sweeps = Arc::clone(&counter);
        let handle = tokio::spawn(run_loop(
            "test",
            Duration::from_millis(5),
            Arc::clone(&control),
            move || {
                let sweeps = Arc::clone(&sweeps);
                async move {
                    sweeps.fetch_add(1, Ordering::SeqCst);
                }
            },
        ));

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        control.resume();
        tokio::time::sleep(Duration::from_millis(40)).await;
        control.request_stop();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(counter.load(Ordering::SeqCst) >= 1);
    }
}
