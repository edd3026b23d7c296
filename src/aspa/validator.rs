//! The path-walking ASPA validation algorithm.
//!
//! Grounded in `aspa_trie.c`'s `ASPA_DB_lookup` for the per-hop outcome
//! (re-used unchanged via [`crate::aspa::store::AspaTrustStore::validate_hop`])
//! and in the surrounding `aspa_validation` logic in the source
//! implementation for the upstream/downstream walk itself.

use crate::as_path::{AsPath, RelationshipDirection, SegmentKind};
use crate::aspa::store::AspaTrustStore;
use crate::outcome::{Afi, ValidationOutcome};

/// Walks `path` hop by hop against `store` and returns the overall ASPA
/// outcome.
///
/// A path whose segment kind is [`SegmentKind::Set`] has no defined
/// adjacency to walk at all and is `Unverifiable` outright -- this
/// implementation stores one segment kind per cached path (see
/// [`crate::as_path::AsPath`]), so the "both `UNKNOWN` and `UNVERIFIABLE`
/// observed along the same path" case the aggregation rule in the
/// source's documentation calls out cannot arise here: a path is either
/// entirely a `SET` (outcome `Unverifiable`) or entirely a `SEQUENCE`
/// (outcome decided by the walk below). A two-bit aggregation is still
/// provided in [`aggregate`] for callers that assemble contributions from
/// more than one call.
pub fn validate(
    path: &AsPath,
    afi: Afi,
    direction: RelationshipDirection,
    store: &AspaTrustStore,
) -> ValidationOutcome {
    if path.segment_kind() == SegmentKind::Set {
        return ValidationOutcome::Unverifiable;
    }

    let hops = path.origin_to_destination();
    if hops.len() < 2 {
        // A single-AS path (or an empty one) has no adjacency to check.
        return ValidationOutcome::Unknown;
    }

    let mut saw_unknown = false;
    let mut swapped = false;

    for window in hops.windows(2) {
        let (mut customer, mut provider) = (window[0], window[1]);
        if swapped {
            std::mem::swap(&mut customer, &mut provider);
        }
        match store.validate_hop(customer, provider, afi) {
            ValidationOutcome::Invalid => match direction {
                RelationshipDirection::Upstream => {
                    return ValidationOutcome::Invalid;
                }
                RelationshipDirection::Downstream => {
                    if swapped {
                        return ValidationOutcome::Invalid;
                    }
                    // Swap roles for this and every remaining pair; if the
                    // swapped check on this same hop is still invalid, it
                    // has recurred and the walk fails outright.
                    swapped = true;
                    match store.validate_hop(provider, customer, afi) {
                        ValidationOutcome::Invalid => {
                            return ValidationOutcome::Invalid;
                        }
                        ValidationOutcome::Unknown => saw_unknown = true,
                        ValidationOutcome::Valid => {}
                        other => unreachable!(
                            "validate_hop never returns {other:?}"
                        ),
                    }
                }
            },
            ValidationOutcome::Unknown => saw_unknown = true,
            ValidationOutcome::Valid => {}
            other => unreachable!(
                "validate_hop never returns {other:?}"
            ),
        }
    }

    if saw_unknown {
        ValidationOutcome::Unknown
    } else {
        ValidationOutcome::Valid
    }
}

/// Combines per-segment contributions into one overall outcome, per the
/// documented aggregation rule: all `Valid` wins outright; `Unknown` and
/// `Unverifiable` otherwise override `Valid`; both present together
/// resolve to `Unknown`, the more conservative of the two.
pub fn aggregate(contributions: &[ValidationOutcome]) -> ValidationOutcome {
    let mut saw_invalid = false;
    let mut saw_unknown = false;
    let mut saw_unverifiable = false;

    for outcome in contributions {
        match outcome {
            ValidationOutcome::Invalid => saw_invalid = true,
            ValidationOutcome::Unknown => saw_unknown = true,
            ValidationOutcome::Unverifiable => saw_unverifiable = true,
            ValidationOutcome::Valid => {}
            other => unreachable!(
                "aggregate() received an out-of-band outcome: {other:?}"
            ),
        }
    }

    if saw_invalid {
        ValidationOutcome::Invalid
    } else if saw_unknown && saw_unverifiable {
        ValidationOutcome::Unknown
    } else if saw_unverifiable {
        ValidationOutcome::Unverifiable
    } else if saw_unknown {
        ValidationOutcome::Unknown
    } else {
        ValidationOutcome::Valid
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ids::AsNumber;

    fn path(hops: &[u32], kind: SegmentKind) -> AsPath {
        AsPath::new(hops.iter().copied().map(AsNumber).collect(), kind)
    }

    #[test]
    fn upstream_valid_chain() {
        let store = AspaTrustStore::initialize();
        store.insert(AsNumber(100), vec![AsNumber(200)], Afi::Ipv4);
        store.insert(AsNumber(200), vec![AsNumber(400)], Afi::Ipv4);

        // wire order is destination-to-origin: 400, 200, 100
        let path = path(&[400, 200, 100], SegmentKind::Sequence);
        let outcome = validate(
            &path, Afi::Ipv4, RelationshipDirection::Upstream, &store,
        );
        assert_eq!(outcome, ValidationOutcome::Valid);
    }

    #[test]
    fn upstream_invalid_short_circuits() {
        let store = AspaTrustStore::initialize();
        store.insert(AsNumber(100), vec![AsNumber(200)], Afi::Ipv4);
        // AS200 has no ASPA object authorizing AS500 as its provider.
        store.insert(AsNumber(200), vec![AsNumber(999)], Afi::Ipv4);

        let path = path(&[500, 200, 100], SegmentKind::Sequence);
        let outcome = validate(
            &path, Afi::Ipv4, RelationshipDirection::Upstream, &store,
        );
        assert_eq!(outcome, ValidationOutcome::Invalid);
    }

    #[test]
    fn unknown_when_customer_has_no_aspa_object() {
        let store = AspaTrustStore::initialize();
        let path = path(&[400, 200, 100], SegmentKind::Sequence);
        let outcome = validate(
            &path, Afi::Ipv4, RelationshipDirection::Upstream, &store,
        );
        assert_eq!(outcome, ValidationOutcome::Unknown);
    }

    #[test]
    fn set_segment_is_unverifiable() {
        let store = AspaTrustStore::initialize();
        let path = path(&[400, 200, 100], SegmentKind::Set);
        let outcome = validate(
            &path, Afi::Ipv4, RelationshipDirection::Upstream, &store,
        );
        assert_eq!(outcome, ValidationOutcome::Unverifiable);
    }

    #[test]
    fn downstream_swaps_roles_once_after_first_invalid() {
        let store = AspaTrustStore::initialize();
        // AS100 authorizes AS200 as a provider (valid as (100, 200)).
        store.insert(AsNumber(100), vec![AsNumber(200)], Afi::Ipv4);
        // AS200 does NOT authorize AS300: the (200, 300) hop is invalid,
        // triggering the one-time role swap to (300, 200).
        store.insert(AsNumber(200), vec![AsNumber(999)], Afi::Ipv4);
        // AS300 authorizes AS200 as its provider, so the swapped check
        // (300, 200) is valid and the walk should not fail outright.
        store.insert(AsNumber(300), vec![AsNumber(200)], Afi::Ipv4);

        let path = path(&[300, 200, 100], SegmentKind::Sequence);
        let outcome = validate(
            &path, Afi::Ipv4, RelationshipDirection::Downstream, &store,
        );
        assert_eq!(outcome, ValidationOutcome::Valid);
    }

    #[test]
    fn downstream_invalid_recurrence_after_swap_fails() {
        let store = AspaTrustStore::initialize();
        store.insert(AsNumber(100), vec![AsNumber(200)], Afi::Ipv4);
        store.insert(AsNumber(200), vec![AsNumber(999)], Afi::Ipv4);
        store.insert(AsNumber(300), vec![AsNumber(999)], Afi::Ipv4);

        let path = path(&[300, 200, 100], SegmentKind::Sequence);
        let outcome = validate(
            &path, Afi::Ipv4, RelationshipDirection::Downstream, &store,
        );
        assert_eq!(outcome, ValidationOutcome::Invalid);
    }

    #[test]
    fn aggregate_prefers_invalid_over_everything() {
        let mix = [
            ValidationOutcome::Valid,
            ValidationOutcome::Unknown,
            ValidationOutcome::Invalid,
        ];
        assert_eq!(aggregate(&mix), ValidationOutcome::Invalid);
    }

    #[test]
    fn aggregate_resolves_unknown_and_unverifiable_to_unknown() {
        let mix = [ValidationOutcome::Unknown, ValidationOutcome::Unverifiable];
        assert_eq!(aggregate(&mix), ValidationOutcome::Unknown);
    }

    #[test]
    fn aggregate_all_valid_is_valid() {
        let mix = [ValidationOutcome::Valid, ValidationOutcome::Valid];
        assert_eq!(aggregate(&mix), ValidationOutcome::Valid);
    }
}
