//! View refresh bus — explicit cache invalidation for downstream views.
//!
//! Saving assignments (and completing an onboarding submit) must tell the
//! rendered views to refetch. Rather than a hidden framework side effect,
//! invalidation is an explicit message on a broadcast channel that
//! embedding UIs subscribe to.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

/// Default broadcast channel capacity.
const DEFAULT_CAPACITY: usize = 32;

/// A view whose cached rendering should be refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    /// The admin assignment editor.
    Admin,
    /// The user-facing onboarding form.
    Onboarding,
    /// The per-user data listing.
    Data,
}

impl std::fmt::Display for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::Onboarding => write!(f, "onboarding"),
            Self::Data => write!(f, "data"),
        }
    }
}

/// Fan-out channel for refresh signals.
#[derive(Clone)]
pub struct RefreshBus {
    tx: broadcast::Sender<View>,
}

impl RefreshBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(DEFAULT_CAPACITY);
        Self { tx }
    }

    /// Subscribe to refresh events.
    pub fn subscribe(&self) -> broadcast::Receiver<View> {
        self.tx.subscribe()
    }

    /// Publish a refresh signal. With no subscribers the event is dropped;
    /// a late subscriber fetches fresh state on its first read anyway.
    pub fn publish(&self, view: View) {
        debug!(view = %view, "Publishing view refresh");
        let _ = self.tx.send(view);
    }

    /// Signal every view that depends on the assignment set.
    pub fn publish_assignment_change(&self) {
        self.publish(View::Admin);
        self.publish(View::Onboarding);
        self.publish(View::Data);
    }
}

impl Default for RefreshBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_views() {
        let bus = RefreshBus::new();
        let mut rx = bus.subscribe();
        bus.publish(View::Data);
        assert_eq!(rx.recv().await.unwrap(), View::Data);
    }

    #[tokio::test]
    async fn assignment_change_touches_all_views() {
        let bus = RefreshBus::new();
        let mut rx = bus.subscribe();
        bus.publish_assignment_change();
        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(rx.recv().await.unwrap());
        }
        assert!(seen.contains(&View::Admin));
        assert!(seen.contains(&View::Onboarding));
        assert!(seen.contains(&View::Data));
    }

    #[test]
    fn publish_without_subscribers_is_ok() {
        let bus = RefreshBus::new();
        bus.publish(View::Onboarding);
    }
}
