//! Haptic and accessibility feedback sink
//!
//! Fire-and-forget. The authenticator reports each result here and never
//! waits on or retries a notification.

use tracing::debug;

use crate::types::AuthErrorKind;

/// Event reported after an operation resolves
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedbackEvent {
    Success,
    /// Counted failure
    Failure,
    /// Any other error kind
    Error(AuthErrorKind),
}

impl FeedbackEvent {
    /// Event for a result error kind
    pub fn for_error(kind: AuthErrorKind) -> Self {
        if kind.is_counted() {
            FeedbackEvent::Failure
        } else {
            FeedbackEvent::Error(kind)
        }
    }
}

/// Receiver of result notifications
pub trait FeedbackSink: Send + Sync {
    fn notify(&self, event: FeedbackEvent);
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopFeedback;

impl FeedbackSink for NoopFeedback {
    fn notify(&self, _event: FeedbackEvent) {}
}

/// Logs every event at debug level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingFeedback;

impl FeedbackSink for TracingFeedback {
    fn notify(&self, event: FeedbackEvent) {
        debug!(?event, "Biometric feedback");
    }
}
