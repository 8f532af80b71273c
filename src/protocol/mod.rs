//! Wire protocol spoken by the clamd scanning daemon.
//!
//! This module defines how commands and scan payloads are exchanged with a
//! running daemon over TCP, including the text command format, the chunked
//! stream upload, and the deadline-bounded connection both ride on. It
//! provides the low-level pieces the [`client`](crate::client) composes
//! into scan operations.
//!
//! # Overview
//!
//! The daemon speaks a line-oriented text protocol. A client connects,
//! writes one command, reads one response, and the session is over; there
//! is no multiplexing and no connection reuse. Every exchange in this crate
//! therefore runs on a fresh [`DaemonConnection`] that enforces an absolute
//! deadline across all reads and writes of the session.
//!
//! # Key Components
//!
//! - [`Command`]: the line-oriented commands (`PING`, `VERSION`, `RELOAD`,
//!   `SHUTDOWN`, `SCAN <path>`) and their wire rendering.
//! - [`DaemonConnection`]: a single-use TCP connection with dial and
//!   exchange deadlines applied.
//! - [`TransportError`] / [`ProtocolError`]: connection failures versus a
//!   live daemon answering outside its contract.
//!
//! # Wire Format
//!
//! Text commands are a single ASCII line terminated by `\n`; the response
//! is one line as well, except for `SHUTDOWN`, which has no response. The
//! stream upload instead opens with the literal `zINSTREAM\0` and then
//! sends length-prefixed chunks:
//!
//! - each chunk is a big-endian `u32` byte count followed by that many
//!   payload bytes,
//! - a zero length terminates the upload,
//! - the daemon answers with one verdict line terminated by `\0`.
//!
//! Scan verdict lines share one shape regardless of how the payload
//! reached the daemon: `<name>: OK` or `<name>: <threat> FOUND`. Parsing
//! them into typed outcomes lives in [`outcome`](crate::outcome), not here.
//!
//! # See Also
//!
//! - [`client`](crate::client): the per-exchange orchestration on top of
//!   this module.
mod command;
mod stream;
mod transport;

pub use command::{Command, ProtocolError};
pub use transport::{DaemonConnection, TransportError};

pub(crate) use command::{roundtrip, send_only};
pub(crate) use stream::send_stream;
