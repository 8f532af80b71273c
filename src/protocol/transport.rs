use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use log::debug;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to resolve daemon address '{address}': {source}")]
    Resolve { address: String, source: io::Error },

    #[error("failed to connect to daemon at {address}: {source}")]
    Dial { address: String, source: io::Error },

    #[error("failed to send to daemon: {source}")]
    Write { source: io::Error },

    #[error("failed to read daemon response: {source}")]
    Read { source: io::Error },

    #[error("failed to read scan payload: {source}")]
    Source { source: io::Error },

    #[error("daemon exchange exceeded its deadline")]
    DeadlineExceeded,
}

impl TransportError {
    /// Wraps an I/O error raised while writing, classifying socket timeouts
    /// as deadline expiry.
    pub(crate) fn write(source: io::Error) -> Self {
        if is_timeout_kind(&source) {
            TransportError::DeadlineExceeded
        } else {
            TransportError::Write { source }
        }
    }

    /// Wraps an I/O error raised while reading, classifying socket timeouts
    /// as deadline expiry.
    pub(crate) fn read(source: io::Error) -> Self {
        if is_timeout_kind(&source) {
            TransportError::DeadlineExceeded
        } else {
            TransportError::Read { source }
        }
    }

    /// Whether this error is the exchange deadline firing.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::DeadlineExceeded)
    }
}

fn is_timeout_kind(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}

/// A TCP connection to the daemon, scoped to exactly one protocol exchange.
///
/// The connection carries an absolute deadline fixed at `open` time. Every
/// read and write first re-arms the socket timeout with the remaining
/// budget, so a daemon that stalls (or trickles bytes to keep the socket
/// warm) cannot stretch the exchange past the deadline. The socket closes
/// when the value drops, on every exit path.
pub struct DaemonConnection {
    stream: TcpStream,
    deadline: Instant,
}

impl DaemonConnection {
    /// Dials `address` (a `host:port` string), bounding the dial by
    /// `dial_timeout` and the rest of the exchange by `exchange_timeout`.
    ///
    /// Every resolved candidate address is tried in order; the last dial
    /// error is reported if none succeeds.
    pub fn open(
        address: &str,
        dial_timeout: Duration,
        exchange_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let candidates = address
            .to_socket_addrs()
            .map_err(|source| TransportError::Resolve {
                address: address.to_string(),
                source,
            })?;

        let mut last_error: Option<io::Error> = None;
        for candidate in candidates {
            match TcpStream::connect_timeout(&candidate, dial_timeout) {
                Ok(stream) => {
                    debug!("connected to daemon at {candidate}");
                    return Ok(Self {
                        stream,
                        deadline: Instant::now() + exchange_timeout,
                    });
                }
                Err(e) => last_error = Some(e),
            }
        }

        let source = last_error.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                "address resolved to no candidates",
            )
        });
        Err(TransportError::Dial {
            address: address.to_string(),
            source,
        })
    }

    /// Time left before the exchange deadline, as an error once exhausted.
    fn budget(&self) -> io::Result<Duration> {
        match self.deadline.checked_duration_since(Instant::now()) {
            Some(left) if !left.is_zero() => Ok(left),
            _ => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "exchange deadline exceeded",
            )),
        }
    }
}

impl Read for DaemonConnection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let left = self.budget()?;
        self.stream.set_read_timeout(Some(left))?;
        self.stream.read(buf)
    }
}

impl Write for DaemonConnection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let left = self.budget()?;
        self.stream.set_write_timeout(Some(left))?;
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}
