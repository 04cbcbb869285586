//! Connectivity Monitor.
//!
//! Translates the host's reachability signal into [`ConnectivityState`] and
//! notifies subscribers exactly once per real transition. Reachability is
//! trusted from the platform; nothing here probes the network.

use harbor_engine::{ConnectivityState, Transition};
use std::sync::Arc;
use tokio::sync::watch;

/// Synchronous "is the network reachable right now" query, used at startup.
pub trait ReachabilitySignal: Send + Sync {
    fn is_reachable(&self) -> bool;
}

/// A signal with a fixed answer.
#[derive(Debug, Clone, Copy)]
pub struct StaticSignal(pub bool);

impl ReachabilitySignal for StaticSignal {
    fn is_reachable(&self) -> bool {
        self.0
    }
}

/// Process-wide connectivity state with change notifications.
///
/// Cheap to clone; clones share the same state. The host wires its
/// reachability events to [`ConnectivityMonitor::report`].
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    sender: Arc<watch::Sender<ConnectivityState>>,
}

impl ConnectivityMonitor {
    /// Create a monitor in a known state.
    pub fn new(initial: ConnectivityState) -> Self {
        let (sender, _) = watch::channel(initial);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Create a monitor whose initial state is read from `signal`.
    pub fn from_signal(signal: &dyn ReachabilitySignal) -> Self {
        Self::new(ConnectivityState::from_reachable(signal.is_reachable()))
    }

    /// Feed a reachability event from the host.
    ///
    /// Returns the transition, or `None` when the state did not change (in
    /// which case subscribers are not woken).
    pub fn report(&self, reachable: bool) -> Option<Transition> {
        let next = ConnectivityState::from_reachable(reachable);
        let mut transition = None;

        self.sender.send_if_modified(|state| {
            transition = state.transition_to(next);
            if transition.is_some() {
                *state = next;
            }
            transition.is_some()
        });

        if let Some(transition) = transition {
            tracing::info!(state = %next, ?transition, "Connectivity changed");
        }
        transition
    }

    /// Current state.
    pub fn state(&self) -> ConnectivityState {
        *self.sender.borrow()
    }

    pub fn is_online(&self) -> bool {
        self.state().is_online()
    }

    /// Receiver that wakes on every transition after this call.
    pub fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_from_signal() {
        assert!(ConnectivityMonitor::from_signal(&StaticSignal(true)).is_online());
        assert!(!ConnectivityMonitor::from_signal(&StaticSignal(false)).is_online());
    }

    #[test]
    fn report_returns_transitions_only() {
        let monitor = ConnectivityMonitor::new(ConnectivityState::Offline);

        assert_eq!(monitor.report(false), None);
        assert_eq!(monitor.report(true), Some(Transition::Restored));
        assert_eq!(monitor.report(true), None);
        assert_eq!(monitor.report(false), Some(Transition::Lost));
        assert_eq!(monitor.state(), ConnectivityState::Offline);
    }

    #[tokio::test]
    async fn subscribers_are_not_woken_by_duplicates() {
        let monitor = ConnectivityMonitor::new(ConnectivityState::Online);
        let mut rx = monitor.subscribe();

        monitor.report(true);
        assert!(!rx.has_changed().unwrap());

        monitor.report(false);
        assert!(rx.has_changed().unwrap());
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), ConnectivityState::Offline);
    }

    #[test]
    fn clones_share_state() {
        let monitor = ConnectivityMonitor::new(ConnectivityState::Offline);
        let clone = monitor.clone();
        clone.report(true);
        assert!(monitor.is_online());
    }
}
