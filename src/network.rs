//! Network connectivity tracking.
//!
//! Two states, online and offline, seeded from the host's connectivity flag
//! at construction. The host reports changes; the manager reacts to the
//! returned transition (event emission, sync on restore).

use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    CameOnline,
    WentOffline,
}

#[derive(Debug)]
pub struct NetworkMonitor {
    online: AtomicBool,
}

impl NetworkMonitor {
    pub fn new(initially_online: bool) -> Self {
        Self {
            online: AtomicBool::new(initially_online),
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Record the current connectivity; returns the transition if the state
    /// actually changed.
    pub fn set_online(&self, online: bool) -> Option<Transition> {
        let was = self.online.swap(online, Ordering::SeqCst);
        match (was, online) {
            (false, true) => Some(Transition::CameOnline),
            (true, false) => Some(Transition::WentOffline),
            _ => None,
        }
    }
}
