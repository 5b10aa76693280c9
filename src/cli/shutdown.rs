//! Process shutdown: a cancellation token that remembers what fired it.

use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;

use crate::observability::StopReason;

/// Cancellation shared by the signal handler and long-running commands.
///
/// The first [`trigger`](Self::trigger) wins; later reasons are ignored.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
    reason: Arc<OnceLock<StopReason>>,
}

impl Shutdown {
    /// Creates an untriggered shutdown.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `reason` and cancels.
    pub fn trigger(&self, reason: StopReason) {
        let _ = self.reason.set(reason);
        self.token.cancel();
    }

    /// The underlying token, for tasks that only need to stop.
    #[must_use]
    pub const fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Waits for shutdown and returns why it happened.
    pub async fn wait(&self) -> StopReason {
        self.token.cancelled().await;
        self.reason()
    }

    /// Why shutdown happened. A bare token cancel reads as
    /// [`StopReason::Shutdown`].
    #[must_use]
    pub fn reason(&self) -> StopReason {
        self.reason.get().copied().unwrap_or(StopReason::Shutdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_reason_wins() {
        let shutdown = Shutdown::new();
        let waiter = shutdown.clone();
        shutdown.trigger(StopReason::Terminated);
        shutdown.trigger(StopReason::Interrupted);
        assert_eq!(waiter.wait().await, StopReason::Terminated);
    }

    #[test]
    fn plain_cancel_is_a_shutdown() {
        let shutdown = Shutdown::new();
        shutdown.token().cancel();
        assert!(shutdown.token().is_cancelled());
        assert_eq!(shutdown.reason(), StopReason::Shutdown);
    }
}
