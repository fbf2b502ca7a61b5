//! User notification abstractions

use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Warning,
    Error,
}

/// One-way, non-blocking channel to the user.
pub trait Notifier: Send + Sync {
    fn notify(&self, kind: NoticeKind, message: &str);
}

/// Routes notices into the tracing pipeline.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, kind: NoticeKind, message: &str) {
        match kind {
            NoticeKind::Success => info!(notice = "success", "{message}"),
            NoticeKind::Warning => warn!(notice = "warning", "{message}"),
            NoticeKind::Error => error!(notice = "error", "{message}"),
        }
    }
}
