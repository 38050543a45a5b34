use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};

/// Ticks closer together than this are skipped (~60 per second).
pub const MIN_TICK: Duration = Duration::from_millis(16);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoScrollTick {
    /// Identifies the loop that produced the tick.
    pub token: u64,
    /// Pixels to scroll down.
    pub delta: u32,
}

type Emit = Arc<dyn Fn(AutoScrollTick) -> bool + Send + Sync>;

struct RunningLoop {
    token: u64,
    speed: u32,
    task: JoinHandle<()>,
}

impl Drop for RunningLoop {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Owns the frame loop behind auto-scroll. At most one loop runs; dropping
/// the driver, stopping it, or changing speed tears the loop down, and ticks
/// it already emitted stop being accepted.
pub struct AutoScrollDriver {
    frame_interval: Duration,
    emit: Emit,
    next_token: u64,
    running: Option<RunningLoop>,
}

impl AutoScrollDriver {
    /// `emit` delivers ticks to the view; returning false ends the loop.
    pub fn new<F>(frame_interval: Duration, emit: F) -> Self
    where
        F: Fn(AutoScrollTick) -> bool + Send + Sync + 'static,
    {
        Self {
            frame_interval: frame_interval.max(Duration::from_millis(1)),
            emit: Arc::new(emit),
            next_token: 0,
            running: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    pub fn speed(&self) -> Option<u32> {
        self.running.as_ref().map(|r| r.speed)
    }

    /// Starts the loop, replacing any running one. Needs a tokio runtime.
    pub fn start(&mut self, speed: u32) {
        self.stop();
        self.next_token += 1;
        let token = self.next_token;
        let emit = Arc::clone(&self.emit);
        let frame_interval = self.frame_interval;

        let task = tokio::spawn(async move {
            let mut frames = interval(frame_interval);
            frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut last_applied: Option<Instant> = None;
            loop {
                let now = frames.tick().await;
                let last = *last_applied.get_or_insert(now);
                if now.duration_since(last) < MIN_TICK {
                    continue;
                }
                if !emit(AutoScrollTick { token, delta: speed }) {
                    break;
                }
                last_applied = Some(now);
            }
        });

        log::debug!("Auto-scroll loop {} started at speed {}", token, speed);
        self.running = Some(RunningLoop { token, speed, task });
    }

    pub fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            log::debug!("Auto-scroll loop {} stopped", running.token);
        }
    }

    /// Restarts a running loop at the new rate. Does nothing when stopped.
    pub fn set_speed(&mut self, speed: u32) {
        if self.speed().is_some_and(|current| current != speed) {
            self.start(speed);
        }
    }

    /// Whether `tick` came from the loop that is running right now.
    pub fn accepts(&self, tick: &AutoScrollTick) -> bool {
        self.running.as_ref().is_some_and(|r| r.token == tick.token)
    }
}
