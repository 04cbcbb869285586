//! Connectivity state machine.
//!
//! Two states, driven entirely by the host's reachability signal. The engine
//! only decides whether a reported signal is a real transition; watching the
//! platform and notifying subscribers is the runtime's job.

use serde::{Deserialize, Serialize};

/// Process-wide network reachability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityState {
    Online,
    Offline,
}

/// A real change between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    /// Offline -> Online; the trigger for an automatic drain
    Restored,
    /// Online -> Offline
    Lost,
}

impl ConnectivityState {
    /// Map a platform reachability flag to a state.
    pub fn from_reachable(reachable: bool) -> Self {
        if reachable {
            ConnectivityState::Online
        } else {
            ConnectivityState::Offline
        }
    }

    pub fn is_online(self) -> bool {
        self == ConnectivityState::Online
    }

    /// The transition from `self` to `next`, or `None` if nothing changed.
    pub fn transition_to(self, next: ConnectivityState) -> Option<Transition> {
        match (self, next) {
            (ConnectivityState::Offline, ConnectivityState::Online) => Some(Transition::Restored),
            (ConnectivityState::Online, ConnectivityState::Offline) => Some(Transition::Lost),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectivityState::Online => write!(f, "online"),
            ConnectivityState::Offline => write!(f, "offline"),
        }
    }
}
