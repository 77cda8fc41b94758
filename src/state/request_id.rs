use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of one inbound chat request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestId {
    pub seq: u64,
    pub uuid: uuid::Uuid,
}

/// Hands out process-unique request ids: a monotonic sequence number plus a
/// uuid derived from it and a per-process random seed.
pub(crate) struct RequestIdGenerator {
    seed: u128,
    counter: AtomicU64,
}

impl RequestIdGenerator {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self::with_seed((u128::from(fastrand::u64(..)) << 64) | u128::from(fastrand::u64(..)))
    }

    #[must_use]
    pub(crate) fn with_seed(seed: u128) -> Self {
        Self {
            seed,
            counter: AtomicU64::new(1),
        }
    }

    pub(crate) fn next(&self) -> RequestId {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        RequestId {
            seq,
            uuid: uuid::Uuid::from_u128(self.seed ^ u128::from(seq)),
        }
    }
}
