use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::PathBuf;

use log::debug;
use thiserror::Error;

use super::transport::TransportError;
use crate::error::ClamdError;

/// The daemon answered, but not with the literal this command requires.
#[derive(Debug, Error)]
#[error("unexpected response to {command}: {response:?}")]
pub struct ProtocolError {
    pub command: &'static str,
    pub response: String,
}

/// A line-oriented daemon command.
///
/// Each variant renders to a single newline-terminated line on the wire;
/// the chunked stream upload is not a line command and has its own codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Liveness check; the daemon must answer exactly `PONG`.
    Ping,
    /// Free-text version banner, returned verbatim.
    Version,
    /// Asks the daemon to reload its signature database; acknowledged with
    /// `RELOADING` before the reload completes.
    Reload,
    /// Stops the daemon. Fire-and-forget: no response is read.
    Shutdown,
    /// Scans a file readable by the daemon at the given path.
    Scan(PathBuf),
}

impl Command {
    /// The newline-terminated wire form of this command.
    pub fn wire_line(&self) -> String {
        match self {
            Command::Ping => "PING\n".to_string(),
            Command::Version => "VERSION\n".to_string(),
            Command::Reload => "RELOAD\n".to_string(),
            Command::Shutdown => "SHUTDOWN\n".to_string(),
            Command::Scan(path) => format!("SCAN {}\n", path.display()),
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        match self {
            Command::Ping => "PING",
            Command::Version => "VERSION",
            Command::Reload => "RELOAD",
            Command::Shutdown => "SHUTDOWN",
            Command::Scan(_) => "SCAN",
        }
    }

    /// Literal reply this command demands, if it has one.
    fn expected_literal(&self) -> Option<&'static str> {
        match self {
            Command::Ping => Some("PONG"),
            Command::Reload => Some("RELOADING"),
            _ => None,
        }
    }
}

/// Writes `command` and reads its single-line response.
///
/// Commands with a fixed expected reply (`PING`, `RELOAD`) are validated
/// here; anything else is returned with the line terminator stripped.
pub(crate) fn roundtrip<T: Read + Write>(
    conn: &mut T,
    command: &Command,
) -> Result<String, ClamdError> {
    conn.write_all(command.wire_line().as_bytes())
        .map_err(TransportError::write)?;
    conn.flush().map_err(TransportError::write)?;

    let response = read_line(conn)?;
    debug!("{} answered {response:?}", command.name());

    if let Some(expected) = command.expected_literal() {
        if response != expected {
            return Err(ProtocolError {
                command: command.name(),
                response,
            }
            .into());
        }
    }

    Ok(response)
}

/// Writes `command` without reading anything back (`SHUTDOWN`).
pub(crate) fn send_only<T: Write>(
    conn: &mut T,
    command: &Command,
) -> Result<(), TransportError> {
    conn.write_all(command.wire_line().as_bytes())
        .map_err(TransportError::write)?;
    conn.flush().map_err(TransportError::write)
}

/// Reads one `\n`-terminated line. Connection close after at least one byte
/// also ends the line; close before any byte is a read failure, never an
/// empty success.
fn read_line<R: Read>(conn: &mut R) -> Result<String, TransportError> {
    let mut reader = BufReader::new(conn);
    let mut raw = Vec::new();
    let n = reader
        .read_until(b'\n', &mut raw)
        .map_err(TransportError::read)?;
    if n == 0 {
        return Err(TransportError::read(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "connection closed before a response line",
        )));
    }
    Ok(String::from_utf8_lossy(&raw).trim_end().to_string())
}
