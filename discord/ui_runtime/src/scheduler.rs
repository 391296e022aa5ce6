use std::time::Duration;
use tokio::time::{Instant, sleep_until};

/// One-slot debounce buffer: a push overwrites whatever is queued and
/// restarts the quiet period, so only the latest value is ever taken.
#[derive(Debug)]
pub struct Debounce<T> {
    quiet: Duration,
    slot: Option<T>,
    deadline: Option<Instant>,
}

impl<T> Debounce<T> {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            slot: None,
            deadline: None,
        }
    }

    /// Queues `value`, returning the one it replaced.
    pub fn push(&mut self, value: T) -> Option<T> {
        self.deadline = Some(Instant::now() + self.quiet);
        self.slot.replace(value)
    }

    pub fn take(&mut self) -> Option<T> {
        self.deadline = None;
        self.slot.take()
    }

    /// When the queued value becomes due; `None` when nothing is queued.
    pub fn deadline(&self) -> Option<Instant> {
        self.slot.as_ref().and(self.deadline)
    }

    pub fn is_pending(&self) -> bool {
        self.slot.is_some()
    }

    pub fn clear(&mut self) {
        self.slot = None;
        self.deadline = None;
    }
}

/// Sleeps until `deadline`, or forever when there is none. Meant for arms
/// of a `select!` loop whose timer may be disarmed.
pub async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
