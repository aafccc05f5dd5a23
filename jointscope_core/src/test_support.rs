//! Manually advanced clock for unit tests.

use async_trait::async_trait;
use jointscope_env::ReplayContext;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A virtual clock that only moves when told to.
#[derive(Clone, Default)]
pub(crate) struct TestContext {
    now_ns: Arc<AtomicU64>,
}

impl TestContext {
    pub(crate) fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn advance(&self, by: Duration) {
        self.now_ns.fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }

    pub(crate) fn set(&self, at: Duration) {
        self.now_ns.store(at.as_nanos() as u64, Ordering::SeqCst);
    }
}

#[async_trait]
impl ReplayContext for TestContext {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.now_ns.load(Ordering::SeqCst))
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}
