//! A route-origin, BGPsec, and ASPA validation server.
//!
//! Router-side proxies speak a small request/response protocol (see
//! [`protocol`]) to this server: they submit an announcement's prefix,
//! origin AS, and (for ASPA) AS-path, and ask which of three independent
//! trust dimensions to validate it against. The server answers once and
//! then keeps the client updated if a later change to the underlying
//! trust data flips the answer.
//!
//! The three axes are:
//!
//! - **ROA** -- is the origin AS authorized to originate this prefix,
//!   per the RPKI repository (see [`collaborators::RpkiValidator`],
//!   implemented outside this crate).
//! - **BGPsec** -- is the announcement's BGPsec path signature valid
//!   (see [`collaborators::BgpsecValidator`]).
//! - **ASPA** -- does every adjacent hop in the AS-path respect the
//!   provider authorizations published by each customer AS (see
//!   [`aspa`]).
//!
//! [`server::Server`] ties the shared caches ([`path_cache`],
//! [`update_cache`], [`client_map`]) together with a fixed pool of
//! dispatch worker threads ([`dispatch`]) draining a blocking command
//! queue ([`queue`]).

pub mod as_path;
pub mod aspa;
pub mod client_map;
pub mod collaborators;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod ids;
pub mod log;
pub mod notify;
pub mod operation;
pub mod outcome;
pub mod path_cache;
pub mod prefix;
pub mod protocol;
pub mod queue;
pub mod server;
pub mod update_cache;
pub mod utils;

pub use config::Config;
pub use error::ExitError;
pub use operation::Operation;
