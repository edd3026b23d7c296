//! Notification fan-out: turning update-cache changes into
//! `VERIFY_NOTIFICATION` PDUs delivered to subscribed, active clients.
//!
//! Grounded in spec §4.8: triggered by `modify_result` axis changes and
//! by trust-data change notifications (the latter arriving via
//! [`crate::collaborators::RpkiChangeQueue`]).

use log::warn;

use crate::client_map::ClientMap;
use crate::ids::UpdateId;
use crate::outcome::AxesMask;
use crate::protocol::Pdu;
use crate::update_cache::UpdateCache;

/// Anything a notification can be written to. A real transport wraps a
/// socket; tests wrap an in-memory buffer.
pub trait NotifySink: Clone + Send + Sync + 'static {
    fn send(&self, frame: &[u8]) -> bool;
}

/// A [`NotifySink`] with nowhere to send: every frame is dropped and
/// logged at debug level.
///
/// The socket layer that would back a real client handle is out of
/// scope for this crate. This stand-in lets [`crate::server::Server`]
/// be instantiated and driven end-to-end by the binary entry point
/// without one; a deployment providing an accept loop would plug in its
/// own socket-backed `NotifySink` in its place.
#[derive(Clone, Default)]
pub struct NullSink;

impl NotifySink for NullSink {
    fn send(&self, _frame: &[u8]) -> bool {
        log::debug!("dropping outbound frame: no transport is wired in");
        false
    }
}

/// Delivers queued update-cache notifications to their subscribers.
pub struct Notifier<'a, H: NotifySink> {
    update_cache: &'a UpdateCache,
    client_map: &'a ClientMap<H>,
}

impl<'a, H: NotifySink> Notifier<'a, H> {
    pub fn new(update_cache: &'a UpdateCache, client_map: &'a ClientMap<H>) -> Self {
        Notifier { update_cache, client_map }
    }

    /// Drains the update cache's notification queue and broadcasts one
    /// `VERIFY_NOTIFICATION` per queued `UpdateID` to every subscribed,
    /// active client. Returns the number of update IDs for which at
    /// least one client actually received the notification.
    pub fn drain_and_broadcast(&self) -> usize {
        let mut delivered = 0;
        for update_id in self.update_cache.drain_notifications() {
            if self.broadcast_one(update_id) {
                delivered += 1;
            }
        }
        delivered
    }

    /// Broadcasts the current result for a single `UpdateID`, regardless
    /// of whether it is already queued. Used by the trust-data change
    /// consumer, which learns about affected `UpdateID`s from a
    /// different source than the update cache's own queue.
    pub fn broadcast_one(&self, update_id: UpdateId) -> bool {
        let (current, _default, _path_id) = match self.update_cache.get_result(update_id) {
            Some(result) => result,
            None => return false,
        };
        let clients = self.update_cache.get_clients(update_id);
        if clients.is_empty() {
            return false;
        }
        let targets = self.client_map.broadcast_targets(&clients);
        if targets.is_empty() {
            return false;
        }

        let pdu = Pdu::VerifyNotification {
            axes: AxesMask { roa: true, bgpsec: true, aspa: true },
            roa: current.roa,
            bgpsec: current.bgpsec,
            aspa: current.aspa,
            update_id,
        };
        let frame = pdu.encode();

        let mut any_sent = false;
        for target in targets {
            if target.send(&frame) {
                any_sent = true;
            } else {
                warn!("failed to deliver notification for update {update_id} to a client");
            }
        }
        any_sent
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ids::{AsNumber, ClientId};
    use crate::outcome::{ValidationOutcome, ValidationResult};
    use crate::prefix::Prefix;
    use crate::update_cache::UpdateData;
    use std::net::Ipv4Addr;
    use std::sync::{Arc, Mutex};

    #[derive(Clone)]
    struct RecordingSink(Arc<Mutex<Vec<Vec<u8>>>>);

    impl NotifySink for RecordingSink {
        fn send(&self, frame: &[u8]) -> bool {
            self.0.lock().unwrap().push(frame.to_vec());
            true
        }
    }

    fn data() -> UpdateData {
        UpdateData {
            prefix: Prefix::v4(Ipv4Addr::new(10, 0, 0, 0), 8),
            origin: AsNumber(100),
            path_id: crate::ids::PathId(1),
        }
    }

    #[test]
    fn broadcast_reaches_every_subscribed_active_client() {
        let update_cache = UpdateCache::new();
        let client_map: ClientMap<RecordingSink> = ClientMap::new();

        let sink_a = RecordingSink(Arc::new(Mutex::new(Vec::new())));
        let sink_b = RecordingSink(Arc::new(Mutex::new(Vec::new())));
        client_map.add_mapping(crate::ids::ProxyId(1), ClientId(1), sink_a.clone());
        client_map.add_mapping(crate::ids::ProxyId(2), ClientId(2), sink_b.clone());

        update_cache.submit(UpdateId(1), data(), ClientId(1), ValidationResult::UNDEFINED).unwrap();
        update_cache.submit(UpdateId(1), data(), ClientId(2), ValidationResult::UNDEFINED).unwrap();

        let update = ValidationResult::new(
            ValidationOutcome::Valid,
            ValidationOutcome::DoNotUse,
            ValidationOutcome::DoNotUse,
        );
        update_cache.modify_result(UpdateId(1), update, false);

        let notifier = Notifier::new(&update_cache, &client_map);
        assert_eq!(notifier.drain_and_broadcast(), 1);
        assert_eq!(sink_a.0.lock().unwrap().len(), 1);
        assert_eq!(sink_b.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn inactive_clients_do_not_receive_notifications() {
        let update_cache = UpdateCache::new();
        let client_map: ClientMap<RecordingSink> = ClientMap::new();
        let sink = RecordingSink(Arc::new(Mutex::new(Vec::new())));
        client_map.add_mapping(crate::ids::ProxyId(1), ClientId(1), sink.clone());
        client_map.deactivate(ClientId(1), false, 900);

        update_cache.submit(UpdateId(1), data(), ClientId(1), ValidationResult::UNDEFINED).unwrap();
        update_cache.modify_result(
            UpdateId(1),
            ValidationResult::new(ValidationOutcome::Valid, ValidationOutcome::DoNotUse, ValidationOutcome::DoNotUse),
            false,
        );

        let notifier = Notifier::new(&update_cache, &client_map);
        assert_eq!(notifier.drain_and_broadcast(), 0);
        assert!(sink.0.lock().unwrap().is_empty());
    }
}
