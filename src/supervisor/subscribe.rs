//! Completion listener registration.

use std::sync::{Arc, Weak};

use super::Shared;

pub(super) type Listener = Arc<dyn Fn(&str) + Send + Sync>;

/// Registration token returned by [`Supervisor::subscribe_on_completion`].
///
/// Dropping it deregisters the listener. Unsubscribing twice, or after the
/// supervisor itself is gone, does nothing.
///
/// [`Supervisor::subscribe_on_completion`]: super::Supervisor::subscribe_on_completion
#[must_use = "dropping a Subscription immediately removes the listener"]
pub struct Subscription {
    shared: Weak<Shared>,
    token: u64,
    detached: bool,
}

impl Subscription {
    pub(super) fn new(shared: &Arc<Shared>, token: u64) -> Self {
        Self {
            shared: Arc::downgrade(shared),
            token,
            detached: false,
        }
    }

    /// Remove the listener. Returns whether it was still registered.
    pub fn unsubscribe(&self) -> bool {
        let Some(shared) = self.shared.upgrade() else {
            return false;
        };
        shared.state.lock().listeners.remove(&self.token).is_some()
    }

    /// Keep the listener registered for the rest of the process lifetime.
    pub fn forget(mut self) {
        self.detached = true;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if !self.detached {
            self.unsubscribe();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("token", &self.token)
            .finish()
    }
}
