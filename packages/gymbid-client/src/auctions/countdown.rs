//! Time-remaining label for a displayed auction, re-evaluated every second.

use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Below this many seconds an auction is flagged as ending soon.
pub const ENDING_SOON_SECS: u64 = 3600;

pub trait Clock: Send + Sync + 'static {
    /// Current unix time in seconds.
    fn now_secs(&self) -> u64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountdownLabel {
    pub text: String,
    pub ending_soon: bool,
}

impl CountdownLabel {
    pub fn at(end_time: u64, now: u64) -> Self {
        let remaining = end_time.saturating_sub(now);
        if remaining == 0 {
            return Self {
                text: "Ended".into(),
                ending_soon: false,
            };
        }
        Self {
            text: format_remaining(remaining),
            ending_soon: remaining < ENDING_SOON_SECS,
        }
    }

    pub fn is_ended(&self) -> bool {
        self.text == "Ended"
    }
}

/// `"2d 3h 4m"`, `"3h 4m 5s"`, `"4m 5s"` or `"5s"`.
pub fn format_remaining(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

/// Handle to a running countdown. Dropping it stops the tick task.
pub struct Countdown {
    label: watch::Receiver<CountdownLabel>,
    cancel: CancellationToken,
}

impl Countdown {
    /// Spawn the tick task. Must be called inside a tokio runtime.
    pub fn start(end_time: u64, clock: Arc<dyn Clock>) -> Self {
        let (tx, label) = watch::channel(CountdownLabel::at(end_time, clock.now_secs()));
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(1));
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let next = CountdownLabel::at(end_time, clock.now_secs());
                        let ended = next.is_ended();
                        tx.send_if_modified(|current| {
                            if *current == next {
                                return false;
                            }
                            *current = next;
                            true
                        });
                        if ended {
                            break;
                        }
                    }
                }
            }
        });

        Self { label, cancel }
    }

    pub fn current(&self) -> CountdownLabel {
        self.label.borrow().clone()
    }

    /// Receiver that wakes on every label change and closes once the
    /// countdown ends or is cancelled.
    pub fn subscribe(&self) -> watch::Receiver<CountdownLabel> {
        self.label.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
