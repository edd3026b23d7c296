//! Opaque identifiers used throughout the server.
//!
//! None of these types carry any behaviour beyond equality, ordering, and
//! formatting. Keeping them as distinct types rather than raw `u32`/`u8`
//! catches the kind of bug where an `UpdateID` and a `PathId` end up
//! swapped at a call site.

use std::fmt;

//------------ UpdateId --------------------------------------------------------

/// A client-chosen, opaque identifier for a single announcement under
/// validation.
///
/// Unique within a client's lifetime; the server never inspects its bits,
/// only compares them.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct UpdateId(pub u32);

impl From<u32> for UpdateId {
    fn from(value: u32) -> Self {
        UpdateId(value)
    }
}

impl fmt::Display for UpdateId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

//------------ PathId -----------------------------------------------------------

/// A 32-bit content hash of an AS-path, used as the AS-path cache's key.
///
/// See [`crate::as_path::path_id`] for how it is computed. Collisions are
/// tolerated by design -- see the module documentation there.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct PathId(pub u32);

impl From<u32> for PathId {
    fn from(value: u32) -> Self {
        PathId(value)
    }
}

impl fmt::Display for PathId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

//------------ ClientId ---------------------------------------------------------

/// An internal client slot index, 1..=255. `0` is reserved to mean "no
/// client" -- [`crate::client_map::ClientMap::find_client_id`] and
/// [`crate::client_map::ClientMap::create_client_id`] return it as a
/// not-found/table-full sentinel, matching the source protocol's use of
/// ID zero as "unassigned."
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub u8);

impl ClientId {
    /// The sentinel used for "no client" / "table full".
    pub const NONE: ClientId = ClientId(0);

    /// Largest valid client ID. Slots are numbered `1..=MAX`.
    pub const MAX: u8 = 255;

    /// Whether this is a real, allocated client ID.
    pub fn is_some(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "client#{}", self.0)
    }
}

//------------ ProxyId -----------------------------------------------------------

/// The external, client-chosen identifier for a router-side proxy
/// process, carried in `HELLO`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ProxyId(pub u32);

impl From<u32> for ProxyId {
    fn from(value: u32) -> Self {
        ProxyId(value)
    }
}

impl fmt::Display for ProxyId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

//------------ AsNumber -----------------------------------------------------------

/// A 32-bit autonomous system number.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct AsNumber(pub u32);

impl From<u32> for AsNumber {
    fn from(value: u32) -> Self {
        AsNumber(value)
    }
}

impl fmt::Display for AsNumber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "AS{}", self.0)
    }
}
