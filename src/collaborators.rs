//! The external collaborators this server validates against.
//!
//! The RPKI engine, the BGPsec signature verifier, and the ASPA trust
//! feed are all out of scope for this crate -- §6 of the design only
//! requires that the core depend on narrow, synchronous trait contracts
//! so that production code can wire in real engines while tests wire in
//! scriptable stand-ins. No async runtime is pulled in for this, in
//! keeping with the OS-thread concurrency model the dispatch pool uses.

use std::sync::Arc;

use crossbeam_queue::SegQueue;

use crate::aspa::AspaObject;
use crate::error::Failed;
use crate::ids::{AsNumber, UpdateId};
use crate::outcome::ValidationOutcome;
use crate::prefix::Prefix;
use crate::update_cache::UpdateData;

/// Route-origin validation.
pub trait RpkiValidator: Send + Sync {
    /// Validates `origin` as the origin of `prefix`.
    fn validate(&self, prefix: &Prefix, origin: AsNumber) -> Result<ValidationOutcome, Failed>;
}

/// BGPsec path-signature validation.
pub trait BgpsecValidator: Send + Sync {
    /// Validates the BGPsec signature attached to an announcement. The
    /// exact signature encoding is opaque to this crate; `update` only
    /// identifies which announcement the opaque blob (carried
    /// separately, on the `VERIFY_*_REQUEST` PDU) belongs to.
    fn validate_signature(&self, update: &UpdateData) -> Result<ValidationOutcome, Failed>;
}

/// The ASPA trust feed ingestor's view of the trust store: the only
/// component allowed to mutate it.
pub trait AspaFeed: Send + Sync {
    fn apply(&self, object: AspaObject);
    fn flush(&self);
}

/// A queue of `UpdateID`s whose RPKI validation outcome changed
/// out-of-band (e.g. a ROA was added or withdrawn), to be re-delivered to
/// subscribed clients.
///
/// Grounded in `payload::validation`'s use of `crossbeam_queue::SegQueue`
/// as a lock-free MPMC handoff between a producer thread and consumers
/// draining it on their own schedule.
#[derive(Clone, Default)]
pub struct RpkiChangeQueue {
    inner: Arc<SegQueue<UpdateId>>,
}

impl RpkiChangeQueue {
    pub fn new() -> Self {
        RpkiChangeQueue { inner: Arc::new(SegQueue::new()) }
    }

    pub fn push(&self, update_id: UpdateId) {
        self.inner.push(update_id);
    }

    pub fn pop(&self) -> Option<UpdateId> {
        self.inner.pop()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// A scriptable stand-in used by tests, returning a fixed outcome for
/// every call, and recording whether it was invoked at all.
#[cfg(test)]
pub mod test_doubles {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub struct FixedRpki {
        pub outcome: ValidationOutcome,
        pub calls: AtomicUsize,
    }

    impl FixedRpki {
        pub fn new(outcome: ValidationOutcome) -> Self {
            FixedRpki { outcome, calls: AtomicUsize::new(0) }
        }
    }

    impl RpkiValidator for FixedRpki {
        fn validate(&self, _prefix: &Prefix, _origin: AsNumber) -> Result<ValidationOutcome, Failed> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.outcome)
        }
    }

    pub struct FixedBgpsec {
        pub outcome: ValidationOutcome,
    }

    impl BgpsecValidator for FixedBgpsec {
        fn validate_signature(&self, _update: &UpdateData) -> Result<ValidationOutcome, Failed> {
            Ok(self.outcome)
        }
    }
}
