//! Hook bus - pub/sub delivery of outbound hooks
//!
//! Built on tokio broadcast channels. Emission is fire-and-forget: no
//! subscriber means the hook is dropped, and a slow subscriber loses the
//! oldest hooks rather than blocking the core operation.

use tokio::sync::broadcast;
use tracing::debug;

use super::types::Hook;

/// Default channel capacity (hooks)
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1_024;

/// Central hook bus
///
/// Core operations emit; the notification collaborator and any observers
/// subscribe.
pub struct HookBus {
    tx: broadcast::Sender<Hook>,
}

impl HookBus {
    /// Create a new hook bus with the given capacity
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "HookBus::new: creating hook bus");
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Emit a hook to all subscribers
    ///
    /// Never fails and never blocks; delivery problems are logged only.
    pub fn emit(&self, hook: Hook) {
        debug!(hook_type = hook.hook_type(), "HookBus::emit");
        if let Err(e) = self.tx.send(hook) {
            // No subscribers - normal during tests and manual runs
            debug!(error = %e, "Hook dropped (no subscribers)");
        }
    }

    /// Subscribe to receive hooks emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<Hook> {
        debug!("HookBus::subscribe: new subscriber");
        self.tx.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for HookBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers_does_not_panic() {
        let bus = HookBus::new(16);
        bus.emit(Hook::ChoreOverdue {
            occurrence_id: "occ-1".to_string(),
            template_id: "t-1".to_string(),
        });
    }

    #[tokio::test]
    async fn test_emit_receive() {
        let bus = HookBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit(Hook::ChoreClaimed {
            occurrence_id: "occ-1".to_string(),
            template_id: "t-1".to_string(),
            person_id: "alice".to_string(),
        });

        let hook = rx.recv().await.unwrap();
        assert_eq!(hook.hook_type(), "ChoreClaimed");
    }

    #[tokio::test]
    async fn test_multiple_subscribers_all_receive() {
        let bus = HookBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.emit(Hook::WeeklyReset { persons: 4 });

        assert_eq!(rx1.recv().await.unwrap().hook_type(), "WeeklyReset");
        assert_eq!(rx2.recv().await.unwrap().hook_type(), "WeeklyReset");
    }
}
