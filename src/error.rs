//! Error types used across the server.
//!
//! There are two error types that are used widely within this crate.
//!
//! The most important is [`Failed`]. This error indicates that an
//! operation had to be abandoned for some reason and callers can assume
//! that all diagnostic information has been logged and they need not do
//! anything further: the request is simply dropped and the worker moves
//! on to the next item.
//!
//! Secondly, [`ExitError`] is used when the program should be terminated
//! during startup. It provides enough information to determine the exit
//! code of the process.

use std::fmt;
use log::error;

//------------ Failed --------------------------------------------------------

/// An operation has failed to complete.
///
/// This error type indicates that an operation has failed, diagnostic
/// information has already been logged, and the caller can't do anything
/// to recover beyond abandoning the current request. It carries no data
/// on purpose: by the time it is returned, everything worth saying has
/// already gone through the `log` facade.
#[derive(Clone, Copy, Debug)]
pub struct Failed;

//------------ ProtocolError --------------------------------------------------

/// A malformed or otherwise rejected client message.
///
/// These map directly onto the `ERROR` PDU's error codes (§6 of the
/// design) and are always reported back to the offending client before
/// the connection state is cleaned up.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProtocolError {
    /// The client's `HELLO` carried a protocol version we don't speak.
    WrongVersion,

    /// The proxy-ID in a `HELLO` is already mapped to an active client.
    DuplicateProxyId,

    /// The server has no room to accommodate this client.
    InternalError,

    /// The message could not be decoded, or its type tag is unknown.
    InvalidPacket,

    /// A `DELETE_UPDATE` named an `UpdateID` we don't know.
    UpdateNotFound,
}

impl ProtocolError {
    /// Returns the 16-bit wire error code for this error.
    pub fn code(self) -> u16 {
        match self {
            ProtocolError::WrongVersion => 0,
            ProtocolError::DuplicateProxyId => 1,
            ProtocolError::InternalError => 2,
            ProtocolError::InvalidPacket => 3,
            ProtocolError::UpdateNotFound => 4,
        }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            ProtocolError::WrongVersion => "wrong protocol version",
            ProtocolError::DuplicateProxyId => "duplicate proxy ID",
            ProtocolError::InternalError => "internal error",
            ProtocolError::InvalidPacket => "invalid packet",
            ProtocolError::UpdateNotFound => "update not found",
        })
    }
}

//------------ InvariantViolation ---------------------------------------------

/// An internal consistency error.
///
/// These indicate a bug somewhere -- either in a client that isn't
/// supposed to be able to trigger them, or in the server itself. They are
/// logged as system errors and the offending request is dropped; unlike
/// a [`ProtocolError`], there is no client to report them to because the
/// data that would identify that client is exactly what's inconsistent.
#[derive(Clone, Debug)]
pub enum InvariantViolation {
    /// A resubmission of an `UpdateID` carried a different tuple than the
    /// one already on file.
    UpdateMismatch { update_id: u32 },

    /// `modify_result` was called for an `UpdateID` that doesn't exist.
    ModifyAbsentUpdate { update_id: u32 },

    /// The path-ID hasher was given an empty AS sequence.
    EmptyAsPath,
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            InvariantViolation::UpdateMismatch { update_id } => {
                write!(
                    f,
                    "update {update_id:#010x} resubmitted with a \
                     different prefix/origin/path tuple"
                )
            }
            InvariantViolation::ModifyAbsentUpdate { update_id } => {
                write!(
                    f,
                    "modify_result called for unknown update \
                     {update_id:#010x}"
                )
            }
            InvariantViolation::EmptyAsPath => {
                f.write_str("path-ID requested for an empty AS path")
            }
        }
    }
}

impl InvariantViolation {
    /// Logs the violation as a system error.
    ///
    /// Workers call this instead of propagating the error: per the error
    /// handling policy, invariant violations are logged and the request
    /// is dropped, but the worker keeps running.
    pub fn log(&self) {
        error!("invariant violation: {self}");
    }
}

//------------ ExitError -----------------------------------------------------

/// An error happened that should lead to terminating the program.
#[derive(Clone, Copy, Debug)]
pub enum ExitError {
    /// Something has happened during startup.
    ///
    /// This should be exit status 1.
    Generic,

    /// A synchronisation primitive or thread could not be created.
    ///
    /// This should be exit status 2.
    Initialization,
}

impl From<Failed> for ExitError {
    fn from(_: Failed) -> ExitError {
        error!("Fatal error. Exiting.");
        ExitError::Generic
    }
}
