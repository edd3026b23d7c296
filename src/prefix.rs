//! IP prefixes as carried in validation requests.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use crate::outcome::Afi;

//------------ Prefix -----------------------------------------------------------

/// An address-family-tagged IP prefix.
///
/// Maintains the invariant that bits beyond `prefix_len` are zero -- the
/// only two constructors, [`Prefix::v4`] and [`Prefix::v6`], mask the
/// address themselves rather than trusting the caller.
#[derive(Clone, Copy, Eq, PartialEq, Hash)]
pub enum Prefix {
    V4 { addr: Ipv4Addr, prefix_len: u8 },
    V6 { addr: Ipv6Addr, prefix_len: u8 },
}

impl Prefix {
    /// Creates an IPv4 prefix, masking off any bits beyond `prefix_len`.
    ///
    /// # Panics
    ///
    /// Panics if `prefix_len` is greater than 32. The wire decoder
    /// validates this before constructing a `Prefix`; anything reaching
    /// here with a bad length is an internal bug, not a protocol error.
    pub fn v4(addr: Ipv4Addr, prefix_len: u8) -> Self {
        assert!(prefix_len <= 32, "IPv4 prefix length out of range");
        let masked = mask_v4(addr, prefix_len);
        Prefix::V4 { addr: masked, prefix_len }
    }

    /// Creates an IPv6 prefix, masking off any bits beyond `prefix_len`.
    ///
    /// # Panics
    ///
    /// Panics if `prefix_len` is greater than 128; see [`Prefix::v4`].
    pub fn v6(addr: Ipv6Addr, prefix_len: u8) -> Self {
        assert!(prefix_len <= 128, "IPv6 prefix length out of range");
        let masked = mask_v6(addr, prefix_len);
        Prefix::V6 { addr: masked, prefix_len }
    }

    pub fn afi(&self) -> Afi {
        match self {
            Prefix::V4 { .. } => Afi::Ipv4,
            Prefix::V6 { .. } => Afi::Ipv6,
        }
    }

    pub fn prefix_len(&self) -> u8 {
        match self {
            Prefix::V4 { prefix_len, .. } => *prefix_len,
            Prefix::V6 { prefix_len, .. } => *prefix_len,
        }
    }
}

impl fmt::Debug for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Prefix::V4 { addr, prefix_len } => write!(f, "{addr}/{prefix_len}"),
            Prefix::V6 { addr, prefix_len } => write!(f, "{addr}/{prefix_len}"),
        }
    }
}

fn mask_v4(addr: Ipv4Addr, prefix_len: u8) -> Ipv4Addr {
    let bits = u32::from(addr);
    let mask: u32 = if prefix_len == 0 {
        0
    } else {
        u32::MAX << (32 - prefix_len as u32)
    };
    Ipv4Addr::from(bits & mask)
}

fn mask_v6(addr: Ipv6Addr, prefix_len: u8) -> Ipv6Addr {
    let bits = u128::from(addr);
    let mask: u128 = if prefix_len == 0 {
        0
    } else {
        u128::MAX << (128 - prefix_len as u32)
    };
    Ipv6Addr::from(bits & mask)
}
