//! Rest timer - cancellable countdown between sets

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tracing::debug;

/// Default length of one countdown step
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    Tick { remaining: u32 },
    Elapsed,
}

/// One countdown run. `fired` makes `Elapsed` exactly-once per run.
struct Run {
    handle: JoinHandle<()>,
    fired: Arc<AtomicBool>,
}

/// Single active countdown.
///
/// Events are tagged with the generation of the run that produced them;
/// anything left over from a stopped or replaced run is dropped on read.
/// `start` must be called inside a tokio runtime.
pub struct RestTimer {
    tick: Duration,
    generation: u64,
    tx: mpsc::UnboundedSender<(u64, TimerEvent)>,
    rx: mpsc::UnboundedReceiver<(u64, TimerEvent)>,
    run: Option<Run>,
}

impl RestTimer {
    pub fn new(tick: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tick,
            generation: 0,
            tx,
            rx,
            run: None,
        }
    }

    /// Count `seconds` steps down to zero, then fire `Elapsed`.
    /// Any previous countdown is stopped first.
    pub fn start(&mut self, seconds: u32) {
        self.stop();

        let generation = self.generation;
        let fired = Arc::new(AtomicBool::new(false));
        let task_fired = fired.clone();
        let tx = self.tx.clone();
        let tick = self.tick;

        debug!(seconds, "rest timer started");
        let handle = tokio::spawn(async move {
            let mut remaining = seconds;
            let mut ticker = interval_at(Instant::now() + tick, tick);
            while remaining > 0 {
                ticker.tick().await;
                remaining -= 1;
                if tx.send((generation, TimerEvent::Tick { remaining })).is_err() {
                    return;
                }
            }
            if !task_fired.swap(true, Ordering::SeqCst) {
                let _ = tx.send((generation, TimerEvent::Elapsed));
            }
        });

        self.run = Some(Run { handle, fired });
    }

    /// Fire `Elapsed` now and stop. Returns false if nothing was counting down.
    pub fn skip(&mut self) -> bool {
        let Some(run) = self.run.take() else {
            return false;
        };
        run.handle.abort();
        if run.fired.swap(true, Ordering::SeqCst) {
            // countdown got there first, its Elapsed is already queued
            return false;
        }
        debug!("rest timer skipped");
        let _ = self.tx.send((self.generation, TimerEvent::Elapsed));
        true
    }

    /// Cancel without firing and discard pending events. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if let Some(run) = self.run.take() {
            run.fired.store(true, Ordering::SeqCst);
            run.handle.abort();
            debug!("rest timer stopped");
        }
        self.generation += 1;
    }

    pub fn is_running(&self) -> bool {
        self.run
            .as_ref()
            .is_some_and(|run| !run.fired.load(Ordering::SeqCst))
    }

    /// Next pending event of the current run, without waiting
    pub fn try_next(&mut self) -> Option<TimerEvent> {
        while let Ok((generation, event)) = self.rx.try_recv() {
            if generation == self.generation {
                return Some(event);
            }
        }
        None
    }

    /// Wait for the next event of the current run.
    /// Pends forever when nothing is counting down.
    pub async fn next(&mut self) -> Option<TimerEvent> {
        loop {
            let (generation, event) = self.rx.recv().await?;
            if generation == self.generation {
                return Some(event);
            }
        }
    }
}

impl Drop for RestTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
