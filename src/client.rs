//! Scan operations against a clamd daemon.
//!
//! This module is the crate's front door: it owns the daemon address and
//! timeout policy, opens one fresh connection per operation, and turns raw
//! verdict lines into typed outcomes.
//!
//! # Overview
//!
//! [`ClamdClient`] is a small value type holding configuration only; it
//! carries no sockets and no locks, so it can be cloned freely and shared
//! across threads. Every operation dials the daemon, runs exactly one
//! exchange, and drops the connection. The daemon ends its side of the
//! session after one command anyway, so there is nothing to pool.
//!
//! Scan operations never panic and never return `Err`: whatever happens on
//! the wire is folded into a [`ScanOutcome`] so batch callers can record
//! failures per target. The control operations (`ping`, `version`,
//! `reload`, `shutdown`) return typed errors instead, since their callers
//! want the distinction between transport and protocol failures.
//!
//! # Key Components
//!
//! - [`Scanner`]: the operation set, as a trait so callers can swap in a
//!   test double.
//! - [`ClamdClient`]: the TCP implementation of [`Scanner`].
//!
//! # Timeouts
//!
//! Three knobs bound every operation: a dial timeout for establishing the
//! connection, a command timeout covering a whole line exchange, and a
//! larger stream timeout covering a whole upload exchange. Timeouts are
//! absolute per exchange, not per read, so a daemon trickling one byte at
//! a time cannot hold an operation open indefinitely.
//!
//! # See Also
//!
//! - [`protocol`](crate::protocol): wire formats and the deadline-bounded
//!   connection.
//! - [`batch`](crate::batch): concurrent fan-out over many targets.
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use log::debug;

use crate::batch::{self, BatchResult, ScanTarget};
use crate::error::ClamdError;
use crate::outcome::ScanOutcome;
use crate::protocol::{self, Command, DaemonConnection};

/// Bound on establishing the TCP connection.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(10);
/// Bound on a whole line-command exchange.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);
/// Bound on a whole stream-upload exchange.
pub const DEFAULT_STREAM_TIMEOUT: Duration = Duration::from_secs(30);
/// Worker count used by [`Scanner::scan_all`] unless overridden.
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// The scan and control operations a daemon client offers.
///
/// [`ClamdClient`] is the TCP implementation; tests and embedders can
/// provide their own.
pub trait Scanner {
    /// Asks the daemon to scan a file it can read at `path`.
    ///
    /// The path is interpreted by the daemon, not this process, so it must
    /// be visible from the daemon's filesystem namespace.
    fn scan_file(&self, path: &Path) -> ScanOutcome;

    /// Uploads `source` to the daemon and scans the bytes in transit.
    ///
    /// Works for daemons on other hosts, since the daemon never touches
    /// this filesystem.
    fn scan_stream(&self, source: &mut dyn Read) -> ScanOutcome;

    /// Scans every target concurrently and returns one outcome per target
    /// identifier. The map is complete even when individual scans fail;
    /// targets sharing an identifier collapse to the outcome reported last.
    fn scan_all(&self, targets: Vec<ScanTarget>) -> BatchResult;

    /// Liveness check; errors unless the daemon answers `PONG`.
    fn ping(&self) -> Result<(), ClamdError>;

    /// The daemon's version banner, verbatim.
    fn version(&self) -> Result<String, ClamdError>;

    /// Asks the daemon to reload its signature database; errors unless the
    /// daemon acknowledges with `RELOADING`.
    fn reload(&self) -> Result<(), ClamdError>;

    /// Asks the daemon to stop. Fire-and-forget: success means the request
    /// was written, not that the daemon is down.
    fn shutdown(&self) -> Result<(), ClamdError>;
}

/// TCP client for a clamd daemon.
///
/// ```no_run
/// use std::path::Path;
///
/// use clamber::{ClamdClient, Scanner};
///
/// let client = ClamdClient::new("127.0.0.1:3310");
/// client.ping()?;
///
/// let outcome = client.scan_file(Path::new("/srv/files/report.pdf"));
/// println!("report.pdf: {outcome}");
/// # Ok::<(), clamber::ClamdError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ClamdClient {
    address: String,
    dial_timeout: Duration,
    command_timeout: Duration,
    stream_timeout: Duration,
    pub(crate) max_concurrency: usize,
}

impl ClamdClient {
    /// A client for the daemon at `address` (a `host:port` string), with
    /// default timeouts and concurrency.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            stream_timeout: DEFAULT_STREAM_TIMEOUT,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    pub fn with_dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn with_stream_timeout(mut self, timeout: Duration) -> Self {
        self.stream_timeout = timeout;
        self
    }

    /// Caps the worker count for [`Scanner::scan_all`]. Values below one
    /// are treated as one.
    pub fn with_max_concurrency(mut self, workers: usize) -> Self {
        self.max_concurrency = workers;
        self
    }

    fn connect(&self, exchange_timeout: Duration) -> Result<DaemonConnection, ClamdError> {
        Ok(DaemonConnection::open(
            &self.address,
            self.dial_timeout,
            exchange_timeout,
        )?)
    }

    /// One full line-command exchange on a fresh connection.
    fn exchange(&self, command: &Command) -> Result<String, ClamdError> {
        let mut conn = self.connect(self.command_timeout)?;
        protocol::roundtrip(&mut conn, command)
    }

    /// One full upload exchange on a fresh connection.
    fn stream_exchange(&self, source: &mut dyn Read) -> Result<String, ClamdError> {
        let mut conn = self.connect(self.stream_timeout)?;
        Ok(protocol::send_stream(&mut conn, source)?)
    }

    /// Runs whichever scan operation fits the target.
    pub(crate) fn scan_target(&self, target: ScanTarget) -> ScanOutcome {
        match target {
            ScanTarget::Path(path) => self.scan_file(&path),
            ScanTarget::Stream { mut source, .. } => self.scan_stream(&mut source),
        }
    }
}

impl Scanner for ClamdClient {
    fn scan_file(&self, path: &Path) -> ScanOutcome {
        debug!("scanning path {}", path.display());
        match self.exchange(&Command::Scan(path.to_path_buf())) {
            Ok(line) => ScanOutcome::parse(&line),
            Err(err) => ScanOutcome::from(err),
        }
    }

    fn scan_stream(&self, source: &mut dyn Read) -> ScanOutcome {
        match self.stream_exchange(source) {
            Ok(line) => ScanOutcome::parse(&line),
            Err(err) => ScanOutcome::from(err),
        }
    }

    fn scan_all(&self, targets: Vec<ScanTarget>) -> BatchResult {
        batch::scan_all(self, targets)
    }

    fn ping(&self) -> Result<(), ClamdError> {
        self.exchange(&Command::Ping).map(|_| ())
    }

    fn version(&self) -> Result<String, ClamdError> {
        self.exchange(&Command::Version)
    }

    fn reload(&self) -> Result<(), ClamdError> {
        self.exchange(&Command::Reload).map(|_| ())
    }

    fn shutdown(&self) -> Result<(), ClamdError> {
        let mut conn = self.connect(self.command_timeout)?;
        protocol::send_only(&mut conn, &Command::Shutdown)?;
        Ok(())
    }
}
