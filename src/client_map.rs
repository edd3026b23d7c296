//! The client/proxy map: a fixed 1..=255 slot table from [`ClientId`] to
//! the proxy that occupies it.
//!
//! Grounded in the source implementation's client table, which reserves
//! ID zero as "no client"/"table full" and keeps crashed proxies' slots
//! reserved longer than cleanly disconnected ones so a reconnect can
//! resume the old subscriptions.

use std::time::{Duration, Instant};

use crate::ids::{ClientId, ProxyId};
use crate::utils::sync::RwLock;

/// An opaque handle to whatever transport a proxy is reachable over.
/// The socket/framing layer is out of scope here; the map only needs to
/// hold and hand back this handle.
pub trait ClientHandle: Clone + Send + Sync + 'static {}
impl<T: Clone + Send + Sync + 'static> ClientHandle for T {}

struct Slot<H> {
    proxy_id: ProxyId,
    handle: H,
    active: bool,
    /// Set on a clean deactivate; the slot is freed once this elapses.
    /// Left `None` on a crash (retained until explicitly released) and
    /// while the slot is active.
    release_deadline: Option<Instant>,
}

/// The client/proxy map.
pub struct ClientMap<H> {
    slots: RwLock<Vec<Option<Slot<H>>>>,
}

impl<H: ClientHandle> ClientMap<H> {
    pub fn new() -> Self {
        // index 0 is the ClientId::NONE sentinel and is never assigned.
        let mut slots = Vec::with_capacity(ClientId::MAX as usize + 1);
        slots.resize_with(ClientId::MAX as usize + 1, || None);
        ClientMap { slots: RwLock::new(slots) }
    }

    /// Finds the client ID currently mapped to `proxy_id`, or
    /// [`ClientId::NONE`] if no active slot carries it.
    pub fn find_client_id(&self, proxy_id: ProxyId) -> ClientId {
        let slots = self.slots.read();
        for (index, slot) in slots.iter().enumerate().skip(1) {
            if let Some(slot) = slot {
                if slot.active && slot.proxy_id == proxy_id {
                    return ClientId(index as u8);
                }
            }
        }
        ClientId::NONE
    }

    /// Allocates the first free slot in `1..=MAX`, or [`ClientId::NONE`]
    /// if the table is full.
    pub fn create_client_id(&self) -> ClientId {
        let slots = self.slots.read();
        for (index, slot) in slots.iter().enumerate().skip(1) {
            if slot.is_none() {
                return ClientId(index as u8);
            }
        }
        ClientId::NONE
    }

    /// Maps `proxy_id` to `client_id` with `handle`.
    ///
    /// Fails if the slot is already occupied by a different *active*
    /// proxy ID -- a crashed or disconnected slot pending cleanup is
    /// still overwritable by the same or a new proxy claiming the ID.
    pub fn add_mapping(&self, proxy_id: ProxyId, client_id: ClientId, handle: H) -> bool {
        if !client_id.is_some() {
            return false;
        }
        let mut slots = self.slots.write();
        let slot = &mut slots[client_id.0 as usize];
        if let Some(existing) = slot {
            if existing.active && existing.proxy_id != proxy_id {
                return false;
            }
        }
        *slot = Some(Slot { proxy_id, handle, active: true, release_deadline: None });
        true
    }

    /// Marks `client_id` inactive.
    ///
    /// A clean disconnect (`crashed = false`) arms the slot's release
    /// deadline `keep_window` seconds out; this implementation does not
    /// run a background sweep over slots itself -- the caller's
    /// maintenance loop is expected to call [`ClientMap::release_expired`]
    /// on a fixed interval. A crash (`crashed = true`) retains the
    /// mapping indefinitely, with no deadline armed, until the caller
    /// explicitly releases it, so a reconnecting proxy can resume its
    /// subscriptions.
    pub fn deactivate(&self, client_id: ClientId, crashed: bool, keep_window: u16) {
        let mut slots = self.slots.write();
        if let Some(Some(slot)) = slots.get_mut(client_id.0 as usize) {
            slot.active = false;
            slot.release_deadline = if crashed {
                None
            } else {
                Some(Instant::now() + Duration::from_secs(keep_window.into()))
            };
        }
    }

    /// Frees `client_id`'s slot outright, regardless of crash state.
    pub fn release(&self, client_id: ClientId) {
        if !client_id.is_some() {
            return;
        }
        self.slots.write()[client_id.0 as usize] = None;
    }

    /// Frees every inactive slot whose release deadline has passed,
    /// making it available to [`ClientMap::create_client_id`] again.
    /// Intended to run from the same maintenance loop that purges
    /// expired update-cache entries. Returns the number of slots freed.
    pub fn release_expired(&self) -> usize {
        let now = Instant::now();
        let mut slots = self.slots.write();
        let mut released = 0;
        for slot in slots.iter_mut().skip(1) {
            let expired = matches!(
                slot, Some(s) if !s.active && s.release_deadline.is_some_and(|d| d <= now)
            );
            if expired {
                *slot = None;
                released += 1;
            }
        }
        released
    }

    /// Returns the handle for `client_id` if its slot is active.
    pub fn handle_of(&self, client_id: ClientId) -> Option<H> {
        let slots = self.slots.read();
        slots.get(client_id.0 as usize)?.as_ref().and_then(|slot| {
            if slot.active { Some(slot.handle.clone()) } else { None }
        })
    }

    /// Filters `client_ids` down to the handles of those with an active
    /// slot -- the join the notifier needs between the update cache's
    /// subscriber set and this map's live sockets.
    pub fn broadcast_targets(&self, client_ids: &[ClientId]) -> Vec<H> {
        let slots = self.slots.read();
        client_ids
            .iter()
            .filter_map(|id| slots.get(id.0 as usize)?.as_ref())
            .filter(|slot| slot.active)
            .map(|slot| slot.handle.clone())
            .collect()
    }
}

impl<H: ClientHandle> Default for ClientMap<H> {
    fn default() -> Self {
        Self::new()
    }
}
