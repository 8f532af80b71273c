//! Chunked stream upload.
//!
//! `INSTREAM` ships payload bytes to the daemon inside the session instead
//! of naming a path, so the daemon never needs filesystem access to the
//! content. The upload is framed as:
//!
//! ```text
//! zINSTREAM\0                  upload marker, NUL included
//! [u32 BE length][bytes]       repeated, one frame per chunk
//! [u32 BE 0]                   terminator
//! ```
//!
//! The daemon replies with a single verdict line terminated by `\0`.

use std::io::{self, BufRead, BufReader, Read, Write};

use log::trace;

use super::transport::TransportError;

/// Literal that selects the length-prefixed upload session, NUL included.
pub(crate) const UPLOAD_MARKER: &[u8] = b"zINSTREAM\0";

/// Payload bytes per frame.
pub(crate) const CHUNK_SIZE: usize = 2048;

/// Uploads `source` frame by frame and reads the daemon's verdict line.
///
/// Failures while reading `source` are reported as
/// [`TransportError::Source`] so callers can tell a broken payload apart
/// from a broken daemon connection.
pub(crate) fn send_stream<T: Read + Write>(
    conn: &mut T,
    source: &mut dyn Read,
) -> Result<String, TransportError> {
    conn.write_all(UPLOAD_MARKER)
        .map_err(TransportError::write)?;

    let mut chunk = [0u8; CHUNK_SIZE];
    let mut uploaded = 0usize;
    loop {
        let n = match source.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(source) => return Err(TransportError::Source { source }),
        };
        conn.write_all(&(n as u32).to_be_bytes())
            .map_err(TransportError::write)?;
        conn.write_all(&chunk[..n])
            .map_err(TransportError::write)?;
        uploaded += n;
        trace!("uploaded {n} byte chunk, {uploaded} total");
    }

    conn.write_all(&0u32.to_be_bytes())
        .map_err(TransportError::write)?;
    conn.flush().map_err(TransportError::write)?;

    read_nul_terminated(conn)
}

/// Reads the daemon's reply up to its NUL terminator. Close before the
/// terminator still yields whatever arrived, as long as at least one byte
/// did; close before any byte is a read failure.
fn read_nul_terminated<R: Read>(conn: &mut R) -> Result<String, TransportError> {
    let mut reader = BufReader::new(conn);
    let mut raw = Vec::new();
    let n = reader.read_until(0, &mut raw).map_err(TransportError::read)?;
    if n == 0 {
        return Err(TransportError::read(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "connection closed before a scan response",
        )));
    }
    if raw.last() == Some(&0) {
        raw.pop();
    }
    Ok(String::from_utf8_lossy(&raw).trim().to_string())
}
