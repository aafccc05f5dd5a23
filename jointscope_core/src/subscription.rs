//! One-shot event subscriptions.
//!
//! A subscriber registers a callback that runs the next time the event
//! fires and is then dropped. Each registration returns a handle that can
//! cancel it before the event fires, so a subscriber can never outlive the
//! state it captured.

use tracing::debug;

/// Handle returned by `OneShotRegistry::register`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionHandle(u64);

type OneShot<T> = Box<dyn FnOnce(&mut T)>;

/// Pending one-shot callbacks over a target of type `T`.
pub struct OneShotRegistry<T> {
    next_handle: u64,
    pending: Vec<(SubscriptionHandle, OneShot<T>)>,
}

impl<T> Default for OneShotRegistry<T> {
    fn default() -> Self {
        Self {
            next_handle: 0,
            pending: Vec::new(),
        }
    }
}

impl<T> std::fmt::Debug for OneShotRegistry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OneShotRegistry")
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl<T> OneShotRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `callback` for the next `fire()`.
    pub fn register(&mut self, callback: impl FnOnce(&mut T) + 'static) -> SubscriptionHandle {
        let handle = SubscriptionHandle(self.next_handle);
        self.next_handle += 1;
        self.pending.push((handle, Box::new(callback)));
        handle
    }

    /// Drops a pending callback. Returns false if it already fired or was
    /// cancelled.
    pub fn cancel(&mut self, handle: SubscriptionHandle) -> bool {
        let before = self.pending.len();
        self.pending.retain(|(h, _)| *h != handle);
        before != self.pending.len()
    }

    /// Runs every pending callback once, in registration order, and clears
    /// them. Returns how many ran.
    pub fn fire(&mut self, target: &mut T) -> usize {
        let callbacks = std::mem::take(&mut self.pending);
        let count = callbacks.len();
        for (_, callback) in callbacks {
            callback(target);
        }
        if count > 0 {
            debug!("Fired {} one-shot subscriptions", count);
        }
        count
    }

    /// Number of callbacks waiting for the event.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_once() {
        let mut registry: OneShotRegistry<Vec<u32>> = OneShotRegistry::new();
        registry.register(|v| v.push(1));
        registry.register(|v| v.push(2));
        assert_eq!(registry.pending(), 2);

        let mut target = Vec::new();
        assert_eq!(registry.fire(&mut target), 2);
        assert_eq!(target, vec![1, 2]);

        // Already consumed
        assert_eq!(registry.fire(&mut target), 0);
        assert_eq!(target, vec![1, 2]);
    }

    #[test]
    fn test_cancel_before_fire() {
        let mut registry: OneShotRegistry<u32> = OneShotRegistry::new();
        let handle = registry.register(|n| *n += 10);
        registry.register(|n| *n += 1);
        assert!(registry.cancel(handle));
        assert!(!registry.cancel(handle));

        let mut n = 0;
        registry.fire(&mut n);
        assert_eq!(n, 1);
    }
}
