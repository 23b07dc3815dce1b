//! User-facing notification sink.
//!
//! Presentation lives outside this crate; pipelines only ever call
//! [`Notifier::notify`] with a message and a kind.

use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// A long-running step started (wallet prompt, confirmation wait).
    Loading,
    Success,
    Error,
    Info,
}

pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, kind: NoticeKind);
}

/// Routes notices to `tracing` for headless runs.
#[derive(Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, message: &str, kind: NoticeKind) {
        match kind {
            NoticeKind::Error => error!(notice = message, "User notice"),
            _ => info!(notice = message, kind = ?kind, "User notice"),
        }
    }
}
