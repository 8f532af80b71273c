pub mod batch;
pub mod client;
pub mod error;
pub mod outcome;
pub mod protocol;

#[cfg(test)]
pub(crate) mod stubd;

pub use batch::{BatchResult, ScanTarget};
pub use client::{ClamdClient, Scanner};
pub use error::ClamdError;
pub use outcome::{ErrorKind, ScanOutcome};
pub use protocol::{ProtocolError, TransportError};
