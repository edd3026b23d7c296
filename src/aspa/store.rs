//! The ASPA trust store: a decimal-digit trie keyed by customer-AS.
//!
//! Grounded in the source implementation's `aspa_trie.c`: a trie with a
//! branching factor of 10, one level per decimal digit of the customer
//! AS number, with the ASPA object (if any) stored at the leaf reached
//! by walking all of its digits. An AS number fits in 32 bits, so its
//! decimal representation is at most 10 digits -- the trie therefore
//! never needs more than 10 levels.

use crate::aspa::AspaObject;
use crate::ids::AsNumber;
use crate::outcome::{Afi, ValidationOutcome};
use crate::utils::sync::RwLock;

/// Branching factor: one child per decimal digit.
const DIGITS: usize = 10;

/// Upper bound on trie depth: `u32::MAX` has 10 decimal digits.
const MAX_DEPTH: usize = 10;

#[derive(Default)]
struct TrieNode {
    children: [Option<Box<TrieNode>>; DIGITS],
    object: Option<AspaObject>,
}

impl TrieNode {
    fn new() -> Self {
        Self::default()
    }
}

//------------ AspaTrustStore ---------------------------------------------------

/// Customer-AS to provider-AS-set lookup, guarded by a single read-write
/// lock per §4.2: concurrent readers and one writer are permitted, and
/// the trie is only ever restructured under the write lock.
pub struct AspaTrustStore {
    root: RwLock<TrieNode>,
}

impl AspaTrustStore {
    /// Creates a new, empty trust store.
    pub fn initialize() -> Self {
        AspaTrustStore { root: RwLock::new(TrieNode::new()) }
    }

    /// Inserts (or replaces) the ASPA object for `customer`.
    ///
    /// Replacement is last-writer-wins: any object previously stored at
    /// this customer's leaf is dropped once the write lock is released,
    /// matching one trust-feed refresh cycle overwriting the last.
    pub fn insert(
        &self,
        customer: AsNumber,
        providers: Vec<AsNumber>,
        afi: Afi,
    ) {
        let object = AspaObject::new(customer, afi, providers);
        let digits = decimal_digits(customer);
        let mut root = self.root.write();
        let mut node = &mut *root;
        for digit in &digits {
            node = node.children[*digit as usize]
                .get_or_insert_with(|| Box::new(TrieNode::new()));
        }
        node.object = Some(object);
    }

    /// Looks up the ASPA object for `customer`, if any.
    pub fn lookup(&self, customer: AsNumber) -> Option<AspaObject> {
        let digits = decimal_digits(customer);
        let root = self.root.read();
        let mut node = &*root;
        for digit in &digits {
            match &node.children[*digit as usize] {
                Some(child) => node = child,
                None => return None,
            }
        }
        node.object.clone()
    }

    /// Validates a single (customer, provider) hop.
    ///
    /// Returns `Unknown` if no ASPA object exists for `customer`; `Valid`
    /// if `provider` is in the object's provider set and the address
    /// families match; `Invalid` otherwise.
    pub fn validate_hop(
        &self,
        customer: AsNumber,
        provider: AsNumber,
        afi: Afi,
    ) -> ValidationOutcome {
        match self.lookup(customer) {
            None => ValidationOutcome::Unknown,
            Some(object) => {
                if object.allows(provider, afi) {
                    ValidationOutcome::Valid
                } else {
                    ValidationOutcome::Invalid
                }
            }
        }
    }

    /// Removes the ASPA object for a single `customer`, if any, leaving
    /// every other customer's object untouched.
    ///
    /// Grounded in `deleteASPAObject`: the trust feed announces
    /// withdrawals per object, not as a full-table flush, so a later
    /// `validate_hop` for this customer falls back to `Unknown` exactly
    /// as if it had never been announced.
    pub fn remove(&self, customer: AsNumber) {
        let digits = decimal_digits(customer);
        let mut root = self.root.write();
        let mut node = &mut *root;
        for digit in &digits {
            match node.children[*digit as usize].as_deref_mut() {
                Some(child) => node = child,
                None => return,
            }
        }
        node.object = None;
    }

    /// Releases every node and object in the store.
    pub fn flush(&self) {
        let mut root = self.root.write();
        *root = TrieNode::new();
    }
}

impl Default for AspaTrustStore {
    fn default() -> Self {
        Self::initialize()
    }
}

/// Returns the decimal digits of `asn`, most significant first, as the
/// trie's path from the root. `0` is represented as a single `[0]`
/// digit rather than an empty path, so customer AS `0` still occupies
/// one level.
fn decimal_digits(asn: AsNumber) -> Vec<u8> {
    let mut value = asn.0;
    if value == 0 {
        return vec![0];
    }
    let mut digits = Vec::with_capacity(MAX_DEPTH);
    while value > 0 {
        digits.push((value % 10) as u8);
        value /= 10;
    }
    digits.reverse();
    digits
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trip_preserves_providers_and_afi() {
        let store = AspaTrustStore::initialize();
        store.insert(
            AsNumber(100), vec![AsNumber(300), AsNumber(200)], Afi::Ipv4,
        );
        let object = store.lookup(AsNumber(100)).unwrap();
        assert_eq!(object.providers(), &[AsNumber(200), AsNumber(300)]);
        assert_eq!(object.afi(), Afi::Ipv4);
    }

    #[test]
    fn insert_replaces_prior_object() {
        let store = AspaTrustStore::initialize();
        store.insert(AsNumber(100), vec![AsNumber(200)], Afi::Ipv4);
        store.insert(AsNumber(100), vec![AsNumber(300)], Afi::Ipv4);
        let object = store.lookup(AsNumber(100)).unwrap();
        assert_eq!(object.providers(), &[AsNumber(300)]);
    }

    #[test]
    fn lookup_of_unknown_customer_is_none() {
        let store = AspaTrustStore::initialize();
        assert!(store.lookup(AsNumber(999)).is_none());
    }

    #[test]
    fn validate_hop_covers_all_three_outcomes() {
        let store = AspaTrustStore::initialize();
        store.insert(AsNumber(100), vec![AsNumber(200)], Afi::Ipv4);

        assert_eq!(
            store.validate_hop(AsNumber(100), AsNumber(200), Afi::Ipv4),
            ValidationOutcome::Valid,
        );
        assert_eq!(
            store.validate_hop(AsNumber(100), AsNumber(999), Afi::Ipv4),
            ValidationOutcome::Invalid,
        );
        assert_eq!(
            store.validate_hop(AsNumber(100), AsNumber(200), Afi::Ipv6),
            ValidationOutcome::Invalid,
        );
        assert_eq!(
            store.validate_hop(AsNumber(404), AsNumber(200), Afi::Ipv4),
            ValidationOutcome::Unknown,
        );
    }

    #[test]
    fn remove_clears_one_customer_without_disturbing_others() {
        let store = AspaTrustStore::initialize();
        store.insert(AsNumber(100), vec![AsNumber(200), AsNumber(300)], Afi::Ipv4);
        store.insert(AsNumber(999), vec![AsNumber(1)], Afi::Ipv4);

        assert_eq!(
            store.validate_hop(AsNumber(100), AsNumber(999), Afi::Ipv4),
            ValidationOutcome::Invalid,
        );

        store.remove(AsNumber(100));

        assert_eq!(
            store.validate_hop(AsNumber(100), AsNumber(999), Afi::Ipv4),
            ValidationOutcome::Unknown,
        );
        assert!(store.lookup(AsNumber(999)).is_some());
    }

    #[test]
    fn remove_of_unknown_customer_is_a_no_op() {
        let store = AspaTrustStore::initialize();
        store.insert(AsNumber(100), vec![AsNumber(200)], Afi::Ipv4);
        store.remove(AsNumber(404));
        assert!(store.lookup(AsNumber(100)).is_some());
    }

    #[test]
    fn flush_removes_every_object() {
        let store = AspaTrustStore::initialize();
        store.insert(AsNumber(100), vec![AsNumber(200)], Afi::Ipv4);
        store.flush();
        assert!(store.lookup(AsNumber(100)).is_none());
    }

    #[test]
    fn zero_asn_and_multi_digit_asn_both_work() {
        let store = AspaTrustStore::initialize();
        store.insert(AsNumber(0), vec![AsNumber(1)], Afi::Ipv4);
        store.insert(AsNumber(4_294_967_295), vec![AsNumber(1)], Afi::Ipv4);
        assert!(store.lookup(AsNumber(0)).is_some());
        assert!(store.lookup(AsNumber(4_294_967_295)).is_some());
    }
}
