//! Validation outcomes and the tri-axis result they combine into.

use std::fmt;

//------------ Afi --------------------------------------------------------------

/// The address family of a prefix or a path observation.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Afi {
    Ipv4,
    Ipv6,
}

//------------ ValidationOutcome -------------------------------------------------

/// The outcome of validating one announcement against one trust
/// dimension (ROA, BGPsec, or ASPA).
///
/// `DONOTUSE` is not a real outcome in the sense of carrying information
/// about the announcement; it's a sentinel that [`crate::update_cache`]
/// uses to mean "this axis was not recomputed, leave whatever is stored
/// alone."
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ValidationOutcome {
    /// The announcement is authorized along this axis.
    Valid,

    /// The announcement is not authorized along this axis.
    Invalid,

    /// Not yet computed.
    Undefined,

    /// Sentinel: do not overwrite the stored value for this axis.
    DoNotUse,

    /// No data exists to decide either way.
    Unknown,

    /// This axis cannot be decided by design (e.g. an `AS_SET` segment).
    Unverifiable,
}

impl ValidationOutcome {
    /// The wire encoding used in `VERIFY_NOTIFICATION` outcome octets.
    pub fn to_wire(self) -> u8 {
        match self {
            ValidationOutcome::Valid => 0,
            ValidationOutcome::Invalid => 1,
            ValidationOutcome::Undefined => 2,
            ValidationOutcome::DoNotUse => 3,
            ValidationOutcome::Unknown => 4,
            ValidationOutcome::Unverifiable => 5,
        }
    }

    /// Decodes the wire encoding used in `VERIFY_NOTIFICATION` outcome
    /// octets. Unknown octets decode as `Unknown` rather than failing --
    /// a notification we can't fully parse the nuance of is still better
    /// delivered than dropped.
    pub fn from_wire(value: u8) -> Self {
        match value {
            0 => ValidationOutcome::Valid,
            1 => ValidationOutcome::Invalid,
            2 => ValidationOutcome::Undefined,
            3 => ValidationOutcome::DoNotUse,
            5 => ValidationOutcome::Unverifiable,
            _ => ValidationOutcome::Unknown,
        }
    }
}

impl fmt::Display for ValidationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            ValidationOutcome::Valid => "valid",
            ValidationOutcome::Invalid => "invalid",
            ValidationOutcome::Undefined => "undefined",
            ValidationOutcome::DoNotUse => "do-not-use",
            ValidationOutcome::Unknown => "unknown",
            ValidationOutcome::Unverifiable => "unverifiable",
        })
    }
}

//------------ ValidationResult --------------------------------------------------

/// The tri-axis validation result for one announcement: ROA, BGPsec, and
/// ASPA outcomes, independently tracked.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ValidationResult {
    pub roa: ValidationOutcome,
    pub bgpsec: ValidationOutcome,
    pub aspa: ValidationOutcome,
}

impl ValidationResult {
    /// A result with all three axes `Undefined`.
    pub const UNDEFINED: ValidationResult = ValidationResult {
        roa: ValidationOutcome::Undefined,
        bgpsec: ValidationOutcome::Undefined,
        aspa: ValidationOutcome::Undefined,
    };

    /// A result with all three axes `DoNotUse`, meaning "change nothing."
    pub const DO_NOT_USE: ValidationResult = ValidationResult {
        roa: ValidationOutcome::DoNotUse,
        bgpsec: ValidationOutcome::DoNotUse,
        aspa: ValidationOutcome::DoNotUse,
    };

    pub fn new(
        roa: ValidationOutcome,
        bgpsec: ValidationOutcome,
        aspa: ValidationOutcome,
    ) -> Self {
        ValidationResult { roa, bgpsec, aspa }
    }

    /// Applies `update` on top of `self`, per the rule in
    /// [`crate::update_cache::UpdateCache::modify_result`]: an axis in
    /// `update` that is `DoNotUse` leaves the corresponding axis in
    /// `self` untouched; any other value overwrites it. Returns the new
    /// result and whether anything actually changed.
    pub fn apply(&self, update: ValidationResult) -> (ValidationResult, bool) {
        let mut changed = false;
        let mut merge = |current: ValidationOutcome, new: ValidationOutcome| {
            if new == ValidationOutcome::DoNotUse {
                current
            } else {
                if new != current {
                    changed = true;
                }
                new
            }
        };
        let result = ValidationResult {
            roa: merge(self.roa, update.roa),
            bgpsec: merge(self.bgpsec, update.bgpsec),
            aspa: merge(self.aspa, update.aspa),
        };
        (result, changed)
    }
}

//------------ RequestFlags -----------------------------------------------------

/// The three request bits carried on a `VERIFY_V4_REQUEST` /
/// `VERIFY_V6_REQUEST` PDU: which axes the client wants validated.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RequestFlags {
    pub roa: bool,
    pub bgpsec: bool,
    pub aspa: bool,
}

impl RequestFlags {
    pub fn from_bits(bits: u8) -> Self {
        RequestFlags {
            roa: bits & 0b001 != 0,
            bgpsec: bits & 0b010 != 0,
            aspa: bits & 0b100 != 0,
        }
    }

    pub fn to_bits(self) -> u8 {
        (self.roa as u8) | ((self.bgpsec as u8) << 1) | ((self.aspa as u8) << 2)
    }

    /// A request with none of the three bits set is a protocol error.
    pub fn is_empty(self) -> bool {
        !self.roa && !self.bgpsec && !self.aspa
    }
}

//------------ AxesMask ---------------------------------------------------------

/// Bitmask of which of the three axes a `VERIFY_NOTIFICATION` carries
/// fresh information for.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct AxesMask {
    pub roa: bool,
    pub bgpsec: bool,
    pub aspa: bool,
}

impl AxesMask {
    pub fn from_bits(bits: u8) -> Self {
        RequestFlags::from_bits(bits).into()
    }

    pub fn to_bits(self) -> u8 {
        RequestFlags { roa: self.roa, bgpsec: self.bgpsec, aspa: self.aspa }
            .to_bits()
    }
}

impl From<RequestFlags> for AxesMask {
    fn from(flags: RequestFlags) -> Self {
        AxesMask { roa: flags.roa, bgpsec: flags.bgpsec, aspa: flags.aspa }
    }
}
