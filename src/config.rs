//! Configuration.

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use std::{fs, process};
use clap::{App, Arg, ArgMatches};
use log::LevelFilter;
use serde::Deserialize;

//------------ Config ---------------------------------------------------------

/// The validation server's configuration.
///
/// A `Config` is assembled once at startup from command-line arguments and
/// an optional configuration file, then shared read-only via `Arc` for the
/// lifetime of the process -- nothing in here changes after
/// [`Config::from_arg_matches`] returns.
#[derive(Clone, Debug)]
pub struct Config {
    /// Addresses to accept proxy connections on.
    ///
    /// The socket layer itself is out of scope for this crate, but the
    /// address list is still part of the configuration surface a
    /// deployment needs to specify.
    pub listen: Vec<SocketAddr>,

    /// Number of threads in the command-dispatch pool.
    pub dispatch_threads: usize,

    /// Whether a successful handshake is followed by a `SYNC_REQUEST`.
    pub sync_on_connect: bool,

    /// Default keep-window, in seconds, used when a client doesn't supply
    /// one explicitly.
    pub default_keep_window: u16,

    /// The log level filter for setting up logging.
    pub log_level: LevelFilter,

    /// Where to send log output.
    pub log_target: LogTarget,
}

impl Config {
    /// Adds the command-line arguments understood by this crate to `app`.
    pub fn config_args<'a: 'b, 'b>(app: App<'a, 'b>) -> App<'a, 'b> {
        app
            .arg(Arg::with_name("config")
                 .short("c")
                 .long("config")
                 .value_name("FILE")
                 .help("read configuration from this TOML file")
                 .takes_value(true)
            )
            .arg(Arg::with_name("listen")
                 .short("l")
                 .long("listen")
                 .value_name("ADDR:PORT")
                 .help("listen addr:port for proxy connections")
                 .takes_value(true)
                 .multiple(true)
            )
            .arg(Arg::with_name("threads")
                 .short("t")
                 .long("threads")
                 .value_name("COUNT")
                 .help("size of the command-dispatch thread pool")
                 .takes_value(true)
            )
            .arg(Arg::with_name("sync_on_connect")
                 .long("sync-on-connect")
                 .help("send a SYNC_REQUEST right after a successful HELLO")
            )
            .arg(Arg::with_name("keep_window")
                 .long("keep-window")
                 .value_name("SECONDS")
                 .help("default subscription retention window")
                 .takes_value(true)
            )
            .arg(Arg::with_name("syslog")
                 .long("syslog")
                 .help("log to syslog instead of stderr")
            )
            .arg(Arg::with_name("logfile")
                 .long("logfile")
                 .value_name("FILE")
                 .help("log to this file instead of stderr")
                 .takes_value(true)
            )
            .arg(Arg::with_name("verbose")
                 .short("v")
                 .long("verbose")
                 .multiple(true)
                 .help("print more (and more) information")
            )
    }

    /// Assembles a `Config` from parsed command-line arguments.
    ///
    /// A `--config` file, if given, is read first; command-line flags then
    /// override whatever it set. Fatal configuration errors print a
    /// message and exit the process directly, since logging isn't set up
    /// yet at this point.
    pub fn from_arg_matches(matches: &ArgMatches) -> Self {
        let mut config = match matches.value_of("config") {
            Some(path) => ConfigFile::read(path),
            None => ConfigFile::default(),
        };

        if let Some(values) = matches.values_of("listen") {
            config.listen = Some(Self::parse_listen(values.collect()));
        }
        if let Some(value) = matches.value_of("threads") {
            config.dispatch_threads = Some(Self::parse_count(value));
        }
        if matches.is_present("sync_on_connect") {
            config.sync_on_connect = Some(true);
        }
        if let Some(value) = matches.value_of("keep_window") {
            config.default_keep_window = Some(Self::parse_keep_window(value));
        }
        if matches.is_present("syslog") {
            config.log_target = Some(RawLogTarget::Syslog);
        }
        if let Some(path) = matches.value_of("logfile") {
            config.log_target = Some(RawLogTarget::File(path.into()));
        }

        let log_level = match matches.occurrences_of("verbose") {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        Config {
            listen: config.listen.unwrap_or_else(Self::default_listen),
            dispatch_threads: config.dispatch_threads.unwrap_or_else(
                default_dispatch_threads
            ),
            sync_on_connect: config.sync_on_connect.unwrap_or(false),
            default_keep_window: config.default_keep_window.unwrap_or(900),
            log_level,
            log_target: config.log_target.map(RawLogTarget::into_target)
                .unwrap_or(LogTarget::Stderr),
        }
    }

    fn default_listen() -> Vec<SocketAddr> {
        "127.0.0.1:17900".to_socket_addrs()
            .expect("hardcoded default listen address is valid")
            .collect()
    }

    fn parse_listen(values: Vec<&str>) -> Vec<SocketAddr> {
        let mut listen = Vec::new();
        for val in values {
            match val.to_socket_addrs() {
                Ok(some) => listen.extend(some),
                Err(_) => {
                    println!("Invalid socket address '{val}'.\nAborting.");
                    process::exit(1);
                }
            }
        }
        listen
    }

    fn parse_count(value: &str) -> usize {
        match usize::from_str(value) {
            Ok(some) if some > 0 => some,
            _ => {
                println!(
                    "Invalid value '{value}' for thread count.\n\
                     Needs to be a positive integer. Aborting."
                );
                process::exit(1);
            }
        }
    }

    fn parse_keep_window(value: &str) -> u16 {
        match u16::from_str(value) {
            Ok(some) => some,
            Err(_) => {
                println!(
                    "Invalid value '{value}' for keep-window.\n\
                     Needs to fit in 16 bits. Aborting."
                );
                process::exit(1);
            }
        }
    }
}

/// Picks a default dispatch pool size: one thread per core, with a sane
/// floor.
fn default_dispatch_threads() -> usize {
    num_cpus::get().max(2)
}

//------------ ConfigFile ------------------------------------------------------

/// The subset of [`Config`] that can come from a TOML file.
///
/// Every field is optional: anything left unset falls through to the
/// command line, and then to the hardcoded default.
#[derive(Clone, Debug, Default, Deserialize)]
struct ConfigFile {
    listen: Option<Vec<SocketAddr>>,
    dispatch_threads: Option<usize>,
    sync_on_connect: Option<bool>,
    default_keep_window: Option<u16>,
    log_target: Option<RawLogTarget>,
}

impl ConfigFile {
    fn read(path: &str) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                println!(
                    "Failed to read config file '{path}': {err}.\nAborting."
                );
                process::exit(1);
            }
        };
        match toml::from_str(&content) {
            Ok(config) => config,
            Err(err) => {
                println!(
                    "Failed to parse config file '{path}': {err}.\nAborting."
                );
                process::exit(1);
            }
        }
    }
}

/// The config-file representation of [`LogTarget`].
///
/// Kept separate from `LogTarget` because `LogTarget::Stderr` has no
/// sensible TOML spelling as a default -- the file format only needs to
/// be able to ask for syslog or a specific file.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RawLogTarget {
    Syslog,
    File(PathBuf),
}

impl RawLogTarget {
    fn into_target(self) -> LogTarget {
        match self {
            RawLogTarget::Syslog => LogTarget::Syslog,
            RawLogTarget::File(path) => LogTarget::File(path),
        }
    }
}

//------------ LogTarget -------------------------------------------------------

/// Where the [`crate::log::Logger`] should send its output.
#[derive(Clone, Debug)]
pub enum LogTarget {
    /// Write to a log file.
    File(PathBuf),

    /// Write to the Unix syslog.
    ///
    /// Only available on Unix; selecting this on another platform is
    /// rejected at startup.
    Syslog,

    /// Write to standard error.
    Stderr,
}
