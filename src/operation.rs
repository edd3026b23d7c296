//! What the executable can do.
//!
//! The socket layer that would turn accepted connections into
//! [`crate::dispatch::ProxyMessage`]s pushed onto the server's command
//! queue is out of scope for this crate (see [`crate::collaborators`]);
//! [`Operation::Run`] starts the server and its maintenance loop and then
//! blocks, exactly as a deployment wiring in a real listener would, so
//! that running the binary is a meaningful smoke test of everything that
//! is in scope.

use std::thread;

use clap::{crate_version, App, ArgMatches, SubCommand};
use log::info;

use crate::config::Config;
use crate::error::ExitError;
use crate::log::Logger;
use crate::notify::NullSink;
use crate::server::{Collaborators, Server, MAINTENANCE_INTERVAL};

//------------ Operation ------------------------------------------------------

/// The command the executable was invoked with.
pub enum Operation {
    /// Start the validation server and run until terminated.
    Run,

    /// Print the parsed configuration and exit, without starting anything.
    PrintConfig,
}

impl Operation {
    /// Adds the subcommands this crate understands to `app`.
    pub fn config_args<'a: 'b, 'b>(app: App<'a, 'b>) -> App<'a, 'b> {
        app
            .subcommand(SubCommand::with_name("run")
                .about("starts the validation server")
            )
            .subcommand(SubCommand::with_name("print-config")
                .about("prints the effective configuration and exits")
            )
    }

    /// Determines the operation from parsed arguments. Running with no
    /// subcommand at all defaults to `run`, matching the common case of
    /// a deployment that just invokes the binary with flags.
    pub fn from_arg_matches(matches: &ArgMatches) -> Self {
        match matches.subcommand_name() {
            Some("print-config") => Operation::PrintConfig,
            Some("run") | None => Operation::Run,
            Some(other) => panic!("unexpected subcommand '{other}'"),
        }
    }

    /// Runs this operation to completion.
    pub fn run(self, config: Config, collaborators: Collaborators) -> Result<(), ExitError> {
        match self {
            Operation::PrintConfig => {
                println!("{config:#?}");
                Ok(())
            }
            Operation::Run => Self::run_server(config, collaborators),
        }
    }

    fn run_server(config: Config, collaborators: Collaborators) -> Result<(), ExitError> {
        Logger::switch_logging(&config, true).map_err(|_| ExitError::Initialization)?;

        info!("Starting on {:?} with {} dispatch threads.", config.listen, config.dispatch_threads);
        let server = Server::<NullSink>::start(&config, collaborators);

        // The accept loop that would feed real proxy connections into
        // `server.command_queue()` lives outside this crate. What
        // remains in scope is the maintenance loop that keeps the
        // caches from growing unbounded.
        loop {
            thread::sleep(MAINTENANCE_INTERVAL);
            server.run_maintenance();
        }
    }
}

/// Builds the top-level clap app shared by [`crate::config::Config`] and
/// [`Operation`]'s argument definitions.
pub fn app<'a, 'b>() -> App<'a, 'b> {
    Operation::config_args(Config::config_args(
        App::new("srx-validatord")
            .version(crate_version!())
            .about("validates BGP route announcements against ROA, BGPsec, and ASPA trust data")
    ))
}
