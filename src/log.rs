//! Logging.
//!
//! All diagnostic output from this crate goes through the `log` facade,
//! never directly to stderr (outside of the handful of pre-logging
//! startup failures in [`config`][crate::config] that can't possibly go
//! anywhere else yet). [`Logger::init`] installs a provisional logger
//! that writes to stderr; [`Logger::switch_logging`] replaces it with
//! one configured from the user's [`Config`] once that has been parsed.

use std::io::Write;
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::OnceLock;
use std::{fs, io, process};
use log::{error, LevelFilter};
use crate::config::{Config, LogTarget};
use crate::error::Failed;
use crate::utils::date::format_local_iso_date;
use crate::utils::sync::Mutex;

//------------ Logger ---------------------------------------------------------

/// Formats and writes log messages to their configured target.
pub struct Logger {
    /// Where to write messages to.
    target: Mutex<LogBackend>,

    /// The maximum log level.
    log_level: LevelFilter,
}

/// The actual target for logging.
enum LogBackend {
    #[cfg(unix)]
    Syslog(SyslogLogger),
    File {
        file: fs::File,
        path: PathBuf,
    },
    Stderr {
        stderr: io::Stderr,
        timestamp: bool,
    }
}

impl Logger {
    /// Initializes logging to a provisional stderr-only target.
    ///
    /// This must run before anything else that might log, which is why
    /// it sets a conservative `Warn` ceiling: we don't yet know what the
    /// user actually asked for.
    pub fn init() -> Result<(), Failed> {
        log::set_max_level(LevelFilter::Warn);
        if let Err(err) = log::set_logger(&GLOBAL_LOGGER) {
            eprintln!("Failed to initialize logger: {err}.\nAborting.");
            return Err(Failed)
        }
        Ok(())
    }

    /// Switches logging to the target described by `config`.
    pub fn switch_logging(config: &Config, daemon: bool) -> Result<(), Failed> {
        let logger = Logger::new(config, daemon)?;
        GLOBAL_LOGGER.switch(logger);
        log::set_max_level(config.log_level);
        Ok(())
    }

    fn new(config: &Config, daemon: bool) -> Result<Self, Failed> {
        let target = match config.log_target {
            LogTarget::Syslog => {
                #[cfg(unix)]
                { Self::new_syslog_target()? }
                #[cfg(not(unix))]
                {
                    error!("Syslog logging is only available on Unix.");
                    return Err(Failed)
                }
            }
            LogTarget::File(ref path) => {
                Self::new_file_target(path.clone())?
            }
            LogTarget::Stderr => {
                Self::new_stderr_target(daemon)
            }
        };
        Ok(Self { target: Mutex::new(target), log_level: config.log_level })
    }

    #[cfg(unix)]
    fn new_syslog_target() -> Result<LogBackend, Failed> {
        SyslogLogger::new().map(LogBackend::Syslog)
    }

    fn new_file_target(path: PathBuf) -> Result<LogBackend, Failed> {
        Ok(LogBackend::File {
            file: match Self::open_log_file(&path) {
                Ok(file) => file,
                Err(err) => {
                    error!(
                        "Failed to open log file '{}': {}",
                        path.display(), err
                    );
                    return Err(Failed)
                }
            },
            path
        })
    }

    fn open_log_file(path: &PathBuf) -> Result<fs::File, io::Error> {
        fs::OpenOptions::new().create(true).append(true).open(path)
    }

    fn new_stderr_target(timestamp: bool) -> LogBackend {
        LogBackend::Stderr { stderr: io::stderr(), timestamp }
    }

    /// Logs a message.
    ///
    /// This may exit the whole process if writing to the configured
    /// target itself fails -- a logging backend we can't write to leaves
    /// us unable to diagnose anything else that goes wrong.
    fn log(&self, record: &log::Record) {
        if self.should_ignore(record) {
            return;
        }
        if let Err(err) = self.try_log(record) {
            self.log_failure(err);
        }
    }

    fn try_log(&self, record: &log::Record) -> Result<(), io::Error> {
        match self.target.lock().deref_mut() {
            #[cfg(unix)]
            LogBackend::Syslog(ref mut logger) => logger.log(record),
            LogBackend::File { ref mut file, .. } => {
                writeln!(
                    file, "[{}] [{}] {}",
                    format_local_iso_date(chrono::Local::now()),
                    record.level(),
                    record.args()
                )
            }
            LogBackend::Stderr { ref mut stderr, timestamp } => {
                if *timestamp {
                    let _ = write!(
                        stderr, "[{}] ",
                        format_local_iso_date(chrono::Local::now()),
                    );
                }
                writeln!(stderr, "[{}] {}", record.level(), record.args())
            }
        }
    }

    fn log_failure(&self, err: io::Error) -> ! {
        match self.target.lock().deref() {
            #[cfg(unix)]
            LogBackend::Syslog(_) => {
                eprintln!("Logging to syslog failed: {err}. Exiting.");
            }
            LogBackend::File { ref path, .. } => {
                eprintln!(
                    "Logging to file {} failed: {}. Exiting.",
                    path.display(), err
                );
            }
            LogBackend::Stderr { .. } => {
                // We never fail when writing to stderr.
            }
        }
        process::exit(1)
    }

    fn flush(&self) {
        match self.target.lock().deref_mut() {
            #[cfg(unix)]
            LogBackend::Syslog(ref mut logger) => logger.flush(),
            LogBackend::File { ref mut file, .. } => {
                let _ = file.flush();
            }
            LogBackend::Stderr { ref mut stderr, .. } => {
                let _ = stderr.lock().flush();
            }
        }
    }

    /// Filters out noise we don't want to see below `Info`.
    fn should_ignore(&self, record: &log::Record) -> bool {
        self.log_level < record.level()
    }
}

//------------ SyslogLogger ----------------------------------------------------

/// A thin wrapper around [`syslog::Logger`].
///
/// This is essentially `syslog::BasicLogger`, except that one hides the
/// logger behind its own mutex -- which we already have one of -- and
/// swallows errors we'd rather see.
#[cfg(unix)]
struct SyslogLogger(
    syslog::Logger<syslog::LoggerBackend, syslog::Formatter3164>
);

#[cfg(unix)]
impl SyslogLogger {
    fn new() -> Result<Self, Failed> {
        let process = std::env::current_exe().ok().and_then(|path|
            path.file_name()
                .and_then(std::ffi::OsStr::to_str)
                .map(ToString::to_string)
        ).unwrap_or_else(|| String::from("srx-validatord"));
        let formatter = syslog::Formatter3164 {
            facility: syslog::Facility::LOG_DAEMON,
            hostname: None,
            process,
            pid: std::process::id(),
        };
        let logger = syslog::unix(formatter.clone()).or_else(|_| {
            syslog::tcp(formatter.clone(), ("127.0.0.1", 601))
        }).or_else(|_| {
            syslog::udp(formatter, ("127.0.0.1", 0), ("127.0.0.1", 514))
        });
        match logger {
            Ok(logger) => Ok(Self(logger)),
            Err(err) => {
                error!("Cannot connect to syslog: {err}");
                Err(Failed)
            }
        }
    }

    fn log(&mut self, record: &log::Record) -> Result<(), io::Error> {
        match record.level() {
            log::Level::Error => self.0.err(record.args()),
            log::Level::Warn => self.0.warning(record.args()),
            log::Level::Info => self.0.info(record.args()),
            log::Level::Debug => self.0.debug(record.args()),
            log::Level::Trace => self.0.debug(record.args()),
        }.map_err(|err| match err.0 {
            syslog::ErrorKind::Io(err) => err,
            other => io::Error::new(io::ErrorKind::Other, other.to_string()),
        })
    }

    fn flush(&mut self) {
        let _ = self.0.backend.flush();
    }
}

//------------ GlobalLogger ----------------------------------------------------

/// A value of this type can go into a static. Until a proper logger is
/// installed, it just writes all log output to stderr.
struct GlobalLogger {
    inner: OnceLock<Logger>,
}

static GLOBAL_LOGGER: GlobalLogger = GlobalLogger::new();

impl GlobalLogger {
    const fn new() -> Self {
        GlobalLogger { inner: OnceLock::new() }
    }

    fn switch(&self, logger: Logger) {
        if self.inner.set(logger).is_err() {
            panic!("Tried to switch logger more than once.")
        }
    }
}

impl log::Log for GlobalLogger {
    fn enabled(&self, _: &log::Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &log::Record<'_>) {
        match self.inner.get() {
            Some(logger) => logger.log(record),
            None => {
                let _ = writeln!(
                    io::stderr().lock(), "[{}] {}",
                    record.level(), record.args()
                );
            }
        }
    }

    fn flush(&self) {
        if let Some(logger) = self.inner.get() {
            logger.flush()
        }
    }
}
