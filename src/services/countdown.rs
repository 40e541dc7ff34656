use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerState {
    Idle,
    Running,
    /// Ended before the limit because the attempt no longer needs a clock.
    Stopped,
    Expired,
}

/// State of one scheduled run. Every `start` allocates a new one, so a tick
/// from a cancelled run can only ever touch its own counters.
#[derive(Debug)]
struct RunState {
    limit: Duration,
    elapsed_ms: AtomicU64,
    expired: AtomicBool,
    stopped: AtomicBool,
}

impl RunState {
    fn remaining(&self) -> Duration {
        let elapsed = Duration::from_millis(self.elapsed_ms.load(Ordering::Acquire));
        self.limit.saturating_sub(elapsed)
    }
}

struct ActiveRun {
    state: Arc<RunState>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Countdown driven by a periodic tick. Expiry is reported through the
/// `on_expire` callback exactly once per `start`.
pub struct CountdownTimer {
    tick: Duration,
    run: Option<ActiveRun>,
}

impl CountdownTimer {
    pub fn new(tick: Duration) -> Self {
        Self {
            tick: tick.max(Duration::from_millis(1)),
            run: None,
        }
    }

    /// Restarts from zero elapsed. Any previous schedule is cancelled first.
    /// `None` leaves the timer idle and `on_expire` is dropped unused.
    ///
    /// `is_held` is consulted on every tick; held ticks do not count.
    pub fn start<H, E>(&mut self, limit: Option<Duration>, is_held: H, on_expire: E)
    where
        H: Fn() -> bool + Send + Sync + 'static,
        E: FnOnce() + Send + 'static,
    {
        self.cancel();

        let Some(limit) = limit.filter(|l| !l.is_zero()) else {
            tracing::debug!("no time limit, timer idle");
            return;
        };

        let state = Arc::new(RunState {
            limit,
            elapsed_ms: AtomicU64::new(0),
            expired: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        });
        let cancel = CancellationToken::new();
        let tick = self.tick;
        let tick_ms = u64::try_from(tick.as_millis()).unwrap_or(u64::MAX);

        let run_state = state.clone();
        let run_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + tick, tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut on_expire = Some(on_expire);

            loop {
                tokio::select! {
                    biased;
                    _ = run_cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                if is_held() {
                    continue;
                }
                let elapsed = run_state.elapsed_ms.fetch_add(tick_ms, Ordering::AcqRel) + tick_ms;
                if Duration::from_millis(elapsed) < run_state.limit {
                    continue;
                }
                if run_state
                    .expired
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    if let Some(callback) = on_expire.take() {
                        tracing::info!(limit_secs = run_state.limit.as_secs(), "countdown expired");
                        callback();
                    }
                }
                break;
            }
        });

        tracing::debug!(limit_secs = limit.as_secs(), "countdown started");
        self.run = Some(ActiveRun {
            state,
            cancel,
            handle,
        });
    }

    /// Ends the current run but keeps its counters, so `remaining` stays
    /// frozen at the moment of the stop. No-op once expired.
    pub fn stop(&mut self) {
        if let Some(run) = &self.run {
            if run.state.expired.load(Ordering::Acquire) {
                return;
            }
            run.state.stopped.store(true, Ordering::Release);
            run.cancel.cancel();
            run.handle.abort();
            tracing::debug!("countdown stopped");
        }
    }

    /// True when no task is scheduled for this timer anymore.
    pub fn is_finished(&self) -> bool {
        self.run
            .as_ref()
            .map(|run| run.handle.is_finished())
            .unwrap_or(true)
    }

    pub fn cancel(&mut self) {
        if let Some(run) = self.run.take() {
            run.cancel.cancel();
            run.handle.abort();
        }
    }

    pub fn state(&self) -> TimerState {
        match &self.run {
            None => TimerState::Idle,
            Some(run) if run.state.expired.load(Ordering::Acquire) => TimerState::Expired,
            Some(run) if run.state.stopped.load(Ordering::Acquire) => TimerState::Stopped,
            Some(_) => TimerState::Running,
        }
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.run.as_ref().map(|run| run.state.remaining())
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
