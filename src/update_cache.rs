//! The update cache: per-`UpdateID` canonical announcement data, its
//! current tri-axis validation result, and the set of clients subscribed
//! to hear about further changes.
//!
//! Grounded in the source implementation's update table, which keys on
//! the same (Prefix, Origin-AS, Path-ID) tuple and applies the identical
//! `DONOTUSE`-means-leave-alone merge rule on every `modify_result` call
//! (reused here as [`ValidationResult::apply`]).

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

use crate::error::InvariantViolation;
use crate::ids::{AsNumber, ClientId, PathId, UpdateId};
use crate::outcome::ValidationResult;
use crate::prefix::Prefix;
use crate::utils::sync::{Mutex, RwLock};

/// The canonical (Prefix, Origin-AS, Path-ID) tuple an `UpdateID` names.
/// Resubmitting the same `UpdateID` with a different tuple is an
/// invariant violation -- see [`UpdateCache::submit`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct UpdateData {
    pub prefix: Prefix,
    pub origin: AsNumber,
    pub path_id: PathId,
}

struct Entry {
    data: UpdateData,
    current: ValidationResult,
    default: ValidationResult,
    subscribers: HashSet<ClientId>,
    /// Set when the subscriber set becomes empty; the entry is eligible
    /// for removal by [`UpdateCache::purge_expired`] once this deadline
    /// passes.
    retention_deadline: Option<Instant>,
}

/// The update cache.
pub struct UpdateCache {
    entries: RwLock<HashMap<UpdateId, Entry>>,
    notifications: Mutex<VecDeque<UpdateId>>,
}

impl UpdateCache {
    pub fn new() -> Self {
        UpdateCache {
            entries: RwLock::new(HashMap::new()),
            notifications: Mutex::new(VecDeque::new()),
        }
    }

    /// Registers `client_id`'s interest in `update_id`.
    ///
    /// If the `UpdateID` is new, creates an entry whose current result is
    /// `default_result` layered over [`ValidationResult::UNDEFINED`] (so
    /// any axis `default_result` leaves as `DoNotUse` starts out
    /// `Undefined`). If the `UpdateID` already exists, `data` must match
    /// what it was created with -- a mismatch is an
    /// [`InvariantViolation::UpdateMismatch`], since two different
    /// announcements cannot share one `UpdateID`.
    ///
    /// Returns whether the entry already existed and its current result.
    pub fn submit(
        &self,
        update_id: UpdateId,
        data: UpdateData,
        client_id: ClientId,
        default_result: ValidationResult,
    ) -> Result<(bool, ValidationResult), InvariantViolation> {
        let mut entries = self.entries.write();
        match entries.get_mut(&update_id) {
            Some(entry) => {
                if entry.data != data {
                    return Err(InvariantViolation::UpdateMismatch { update_id: update_id.0 });
                }
                entry.subscribers.insert(client_id);
                entry.retention_deadline = None;
                Ok((true, entry.current))
            }
            None => {
                let (current, _) = ValidationResult::UNDEFINED.apply(default_result);
                let mut subscribers = HashSet::new();
                subscribers.insert(client_id);
                entries.insert(update_id, Entry {
                    data,
                    current,
                    default: default_result,
                    subscribers,
                    retention_deadline: None,
                });
                Ok((false, current))
            }
        }
    }

    /// Returns the current and default results and the path ID for
    /// `update_id`, or `None` if it is not known.
    pub fn get_result(
        &self,
        update_id: UpdateId,
    ) -> Option<(ValidationResult, ValidationResult, PathId)> {
        let entries = self.entries.read();
        entries.get(&update_id).map(|e| (e.current, e.default, e.data.path_id))
    }

    /// Merges `new_result` into the stored current result per
    /// [`ValidationResult::apply`]'s `DoNotUse`-means-leave-alone rule.
    /// Appends `update_id` to the notification queue if anything changed
    /// or `force_broadcast` is set. Returns `false` if `update_id` is not
    /// known.
    pub fn modify_result(
        &self,
        update_id: UpdateId,
        new_result: ValidationResult,
        force_broadcast: bool,
    ) -> bool {
        let mut entries = self.entries.write();
        let entry = match entries.get_mut(&update_id) {
            Some(entry) => entry,
            None => return false,
        };
        let (merged, changed) = entry.current.apply(new_result);
        entry.current = merged;
        if changed || force_broadcast {
            self.notifications.lock().push_back(update_id);
        }
        true
    }

    /// Removes `client_id` from `update_id`'s subscriber set. If the set
    /// becomes empty, arms the retention timer for `keep_window` seconds.
    /// Returns `false` if `update_id` is unknown or `client_id` was not
    /// subscribed.
    pub fn delete_subscription(
        &self,
        client_id: ClientId,
        update_id: UpdateId,
        keep_window: u16,
    ) -> bool {
        let mut entries = self.entries.write();
        let entry = match entries.get_mut(&update_id) {
            Some(entry) => entry,
            None => return false,
        };
        if !entry.subscribers.remove(&client_id) {
            return false;
        }
        if entry.subscribers.is_empty() {
            entry.retention_deadline =
                Some(Instant::now() + Duration::from_secs(keep_window.into()));
        }
        true
    }

    /// Returns the subscribed client set for `update_id`.
    pub fn get_clients(&self, update_id: UpdateId) -> Vec<ClientId> {
        let entries = self.entries.read();
        entries
            .get(&update_id)
            .map(|e| e.subscribers.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Returns the canonical (Prefix, Origin-AS, Path-ID) tuple for
    /// `update_id`, for re-validation.
    pub fn get_update_data(&self, update_id: UpdateId) -> Option<UpdateData> {
        self.entries.read().get(&update_id).map(|e| e.data)
    }

    /// Drains every `UpdateID` queued for notification since the last
    /// call. The notifier owns consuming this queue.
    pub fn drain_notifications(&self) -> Vec<UpdateId> {
        let mut queue = self.notifications.lock();
        queue.drain(..).collect()
    }

    /// Removes every entry whose retention deadline has passed. Intended
    /// to run periodically from a maintenance thread, not on the
    /// dispatch hot path.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| match entry.retention_deadline {
            Some(deadline) => deadline > now,
            None => true,
        });
        before - entries.len()
    }
}

impl Default for UpdateCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::outcome::ValidationOutcome;
    use std::net::Ipv4Addr;

    fn data(origin: u32) -> UpdateData {
        UpdateData {
            prefix: Prefix::v4(Ipv4Addr::new(10, 0, 0, 0), 24),
            origin: AsNumber(origin),
            path_id: PathId(42),
        }
    }

    #[test]
    fn submit_creates_entry_from_default_result() {
        let cache = UpdateCache::new();
        let default = ValidationResult::new(
            ValidationOutcome::Valid,
            ValidationOutcome::DoNotUse,
            ValidationOutcome::Undefined,
        );
        let (existed, current) = cache
            .submit(UpdateId(1), data(100), ClientId(1), default)
            .unwrap();
        assert!(!existed);
        assert_eq!(current.roa, ValidationOutcome::Valid);
        assert_eq!(current.bgpsec, ValidationOutcome::Undefined);
        assert_eq!(current.aspa, ValidationOutcome::Undefined);
    }

    #[test]
    fn resubmit_with_same_data_adds_subscriber() {
        let cache = UpdateCache::new();
        cache.submit(UpdateId(1), data(100), ClientId(1), ValidationResult::UNDEFINED).unwrap();
        let (existed, _) = cache
            .submit(UpdateId(1), data(100), ClientId(2), ValidationResult::UNDEFINED)
            .unwrap();
        assert!(existed);
        let clients = cache.get_clients(UpdateId(1));
        assert_eq!(clients.len(), 2);
    }

    #[test]
    fn resubmit_with_different_data_is_rejected() {
        let cache = UpdateCache::new();
        cache.submit(UpdateId(1), data(100), ClientId(1), ValidationResult::UNDEFINED).unwrap();
        let result = cache.submit(UpdateId(1), data(200), ClientId(2), ValidationResult::UNDEFINED);
        assert!(result.is_err());
    }

    #[test]
    fn modify_result_queues_notification_only_on_change() {
        let cache = UpdateCache::new();
        cache.submit(UpdateId(1), data(100), ClientId(1), ValidationResult::UNDEFINED).unwrap();

        let update = ValidationResult::new(
            ValidationOutcome::Valid,
            ValidationOutcome::DoNotUse,
            ValidationOutcome::DoNotUse,
        );
        assert!(cache.modify_result(UpdateId(1), update, false));
        assert_eq!(cache.drain_notifications(), vec![UpdateId(1)]);

        // re-applying the identical result changes nothing, no notification.
        assert!(cache.modify_result(UpdateId(1), update, false));
        assert!(cache.drain_notifications().is_empty());

        // force_broadcast queues a notification even without a change.
        assert!(cache.modify_result(UpdateId(1), update, true));
        assert_eq!(cache.drain_notifications(), vec![UpdateId(1)]);
    }

    #[test]
    fn modify_result_on_unknown_update_fails() {
        let cache = UpdateCache::new();
        assert!(!cache.modify_result(UpdateId(99), ValidationResult::UNDEFINED, true));
    }

    #[test]
    fn delete_subscription_arms_retention_when_last_client_leaves() {
        let cache = UpdateCache::new();
        cache.submit(UpdateId(1), data(100), ClientId(1), ValidationResult::UNDEFINED).unwrap();
        assert!(cache.delete_subscription(ClientId(1), UpdateId(1), 0));
        assert!(!cache.delete_subscription(ClientId(1), UpdateId(1), 0));
        // the zero-second keep-window should make the entry purgeable
        // essentially immediately.
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.get_update_data(UpdateId(1)).is_none());
    }

    #[test]
    fn resubscribing_cancels_pending_retention() {
        let cache = UpdateCache::new();
        cache.submit(UpdateId(1), data(100), ClientId(1), ValidationResult::UNDEFINED).unwrap();
        cache.delete_subscription(ClientId(1), UpdateId(1), 3600);
        cache.submit(UpdateId(1), data(100), ClientId(2), ValidationResult::UNDEFINED).unwrap();
        assert_eq!(cache.purge_expired(), 0);
    }
}
