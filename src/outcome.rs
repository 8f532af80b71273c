//! Scan verdict vocabulary.
//!
//! This module defines [`ScanOutcome`], the tri-state result of scanning a
//! single target, and the parser that produces it from a raw daemon response
//! line. Every scan, whether of a path or a stream, resolves to exactly one
//! outcome.
//!
//! # Overview
//!
//! The daemon reports scan results as a single text line of the form
//! `<subject>: <verdict>`, where the subject echoes the scanned path (or the
//! literal `stream` for chunked uploads) and the verdict is either the
//! literal `OK` or `<threat-name> FOUND`. [`ScanOutcome::parse`] turns that
//! line into a structured value:
//!
//! - `OK` becomes [`ScanOutcome::Clean`].
//! - `<threat-name> FOUND` becomes [`ScanOutcome::Infected`] carrying the
//!   threat name.
//! - Any other shape becomes [`ScanOutcome::Error`] with
//!   [`ErrorKind::MalformedResponse`]: the parser rejects what it cannot
//!   classify instead of guessing, so a surprising response can never be
//!   mistaken for a clean file.
//!
//! The subject is split off at the **last** colon in the line, so paths that
//! themselves contain colons parse correctly.
//!
//! Parsing is total: `parse` accepts any input string and never panics.
//! Failures of the exchange itself (connection refused, deadline exceeded,
//! unexpected protocol reply) fold into the `Error` variant through
//! `From<ClamdError>`, keyed by [`ErrorKind`] so callers can always tell an
//! infected file, a clean file, and a failed scan apart.
//!
//! # Example
//! ```rust
//! use clamber::ScanOutcome;
//!
//! let outcome = ScanOutcome::parse("/tmp/eicar.txt: Eicar-Test-Signature FOUND");
//! assert_eq!(
//!     outcome,
//!     ScanOutcome::Infected {
//!         threat: "Eicar-Test-Signature".to_string()
//!     }
//! );
//! ```
//!
//! # See Also
//! - [`client`](crate::client): the operations that produce outcomes.
//! - [`batch`](crate::batch): aggregation of outcomes across many targets.
use std::fmt;

use crate::error::ClamdError;

/// Classification of a failed scan exchange, carried inside
/// [`ScanOutcome::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The connection never established, or I/O on it failed or timed out.
    Transport,
    /// The daemon responded outside the expected shape for the command sent.
    Protocol,
    /// The scan response line could not be parsed as `OK` or `... FOUND`.
    MalformedResponse,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Transport => "transport",
            ErrorKind::Protocol => "protocol",
            ErrorKind::MalformedResponse => "malformed-response",
        };
        f.write_str(name)
    }
}

/// Result of scanning one target. Constructed exactly once per target and
/// immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The daemon found nothing.
    Clean,
    /// The daemon matched a signature; `threat` is its name.
    Infected { threat: String },
    /// The exchange failed or the response was unparseable. Never collapsed
    /// into [`ScanOutcome::Clean`].
    Error { kind: ErrorKind, message: String },
}

impl ScanOutcome {
    /// Parses a raw daemon response line into an outcome.
    ///
    /// Total over all inputs: unrecognized shapes yield
    /// [`ErrorKind::MalformedResponse`] carrying the raw line.
    pub fn parse(raw: &str) -> ScanOutcome {
        let line = raw.trim();
        let Some((_subject, verdict)) = line.rsplit_once(':') else {
            return ScanOutcome::malformed(raw);
        };

        let verdict = verdict.trim();
        if verdict == "OK" {
            return ScanOutcome::Clean;
        }

        // Strict two-field form: `<threat-name> FOUND`. A verdict that merely
        // ends in the letters FOUND (e.g. `NOTFOUND`) is rejected.
        if let Some(stripped) = verdict.strip_suffix("FOUND") {
            if stripped.ends_with(char::is_whitespace) {
                let threat = stripped.trim();
                if !threat.is_empty() {
                    return ScanOutcome::Infected {
                        threat: threat.to_string(),
                    };
                }
            }
        }

        ScanOutcome::malformed(raw)
    }

    /// Whether this outcome is [`ScanOutcome::Clean`].
    pub fn is_clean(&self) -> bool {
        matches!(self, ScanOutcome::Clean)
    }

    /// Whether this outcome is [`ScanOutcome::Infected`].
    pub fn is_infected(&self) -> bool {
        matches!(self, ScanOutcome::Infected { .. })
    }

    /// Whether this outcome is [`ScanOutcome::Error`].
    pub fn is_error(&self) -> bool {
        matches!(self, ScanOutcome::Error { .. })
    }

    fn malformed(raw: &str) -> ScanOutcome {
        ScanOutcome::Error {
            kind: ErrorKind::MalformedResponse,
            message: raw.to_string(),
        }
    }
}

impl From<ClamdError> for ScanOutcome {
    fn from(err: ClamdError) -> Self {
        let kind = match err {
            ClamdError::Transport(_) => ErrorKind::Transport,
            ClamdError::Protocol(_) => ErrorKind::Protocol,
        };
        ScanOutcome::Error {
            kind,
            message: err.to_string(),
        }
    }
}

impl fmt::Display for ScanOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanOutcome::Clean => f.write_str("clean"),
            ScanOutcome::Infected { threat } => write!(f, "infected: {threat}"),
            ScanOutcome::Error { kind, message } => write!(f, "error[{kind}]: {message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn infected(threat: &str) -> ScanOutcome {
        ScanOutcome::Infected {
            threat: threat.to_string(),
        }
    }

    #[test]
    fn parse_well_formed_lines() {
        let inputs = vec![
            ("/tmp/a.txt: OK", ScanOutcome::Clean),
            ("stream: OK", ScanOutcome::Clean),
            (
                "/tmp/b.exe: Win.Test.EICAR_HDB-1 FOUND",
                infected("Win.Test.EICAR_HDB-1"),
            ),
            (
                "stream: Eicar-Test-Signature FOUND",
                infected("Eicar-Test-Signature"),
            ),
        ];

        for (raw, expected) in inputs {
            assert_eq!(ScanOutcome::parse(raw), expected, "input: {raw:?}");
        }
    }

    #[test]
    fn parse_splits_on_last_colon() {
        assert_eq!(
            ScanOutcome::parse("/tmp/with:colon/file.txt: OK"),
            ScanOutcome::Clean
        );
        assert_eq!(
            ScanOutcome::parse(r"C:\Users\test.exe: Trojan.Agent-15 FOUND"),
            infected("Trojan.Agent-15")
        );
    }

    #[test]
    fn parse_tolerates_surrounding_whitespace() {
        assert_eq!(ScanOutcome::parse("  stream: OK \r\n"), ScanOutcome::Clean);
        assert_eq!(
            ScanOutcome::parse("x:  Foo.Bar FOUND  "),
            infected("Foo.Bar")
        );
    }

    #[test]
    fn parse_rejects_unrecognized_shapes() {
        let inputs = vec![
            "garbage",
            "",
            "/tmp/a.txt: MAYBE",
            "/x: lstat() failed: No such file or directory. ERROR",
            // FOUND must be its own trailing field, not a suffix of a word.
            "/tmp/a.txt: NOTFOUND",
            "/tmp/a.txt: FOUND",
        ];

        for raw in inputs {
            match ScanOutcome::parse(raw) {
                ScanOutcome::Error {
                    kind: ErrorKind::MalformedResponse,
                    message,
                } => assert_eq!(message, raw),
                other => panic!("expected malformed for {raw:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn parse_keeps_multiword_threat_names() {
        assert_eq!(
            ScanOutcome::parse("f: Heuristics.Encrypted Zip FOUND"),
            infected("Heuristics.Encrypted Zip")
        );
    }

    #[test]
    fn outcome_predicates() {
        assert!(ScanOutcome::Clean.is_clean());
        assert!(infected("X").is_infected());
        assert!(ScanOutcome::parse("?").is_error());
        assert!(!ScanOutcome::parse("?").is_clean());
    }
}
