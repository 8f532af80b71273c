//! Concurrent batch scanning.
//!
//! This module fans a set of scan targets out across a bounded worker pool
//! and collects one outcome per target into a single map. It is the engine
//! behind [`Scanner::scan_all`](crate::client::Scanner::scan_all).
//!
//! # Overview
//!
//! Each target is scanned on its own single-use daemon connection, so
//! targets never share a session and one misbehaving exchange cannot
//! corrupt another. Workers report outcomes over a channel to the caller's
//! thread, which is the only writer into the result map; the map needs no
//! locking.
//!
//! A batch always returns a complete map: a target whose scan failed is
//! present with an error outcome, and a target whose worker died before
//! reporting is backfilled rather than silently missing. Targets with the
//! same identifier collapse to a single entry, keeping the outcome
//! reported last.
//!
//! # Key Components
//!
//! - [`ScanTarget`]: one unit of work, either a daemon-visible path or a
//!   labelled byte stream.
//! - [`BatchResult`]: outcome per target identifier.
//!
//! # See Also
//!
//! - [`client`](crate::client): the per-target scan operations workers run.
use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::path::PathBuf;
use std::sync::mpsc;

use log::{debug, warn};

use crate::client::ClamdClient;
use crate::outcome::{ErrorKind, ScanOutcome};

mod thread;

use thread::ThreadPool;

/// One unit of work in a batch.
pub enum ScanTarget {
    /// A path the daemon reads directly (`SCAN`). The daemon must be able
    /// to see the path; it is not uploaded.
    Path(PathBuf),
    /// Bytes uploaded through the session (`INSTREAM`), keyed by a
    /// caller-chosen label.
    Stream {
        label: String,
        source: Box<dyn Read + Send>,
    },
}

impl ScanTarget {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    pub fn stream(label: impl Into<String>, source: impl Read + Send + 'static) -> Self {
        Self::Stream {
            label: label.into(),
            source: Box::new(source),
        }
    }

    /// The key this target's outcome is stored under in a [`BatchResult`].
    pub fn identifier(&self) -> String {
        match self {
            ScanTarget::Path(path) => path.display().to_string(),
            ScanTarget::Stream { label, .. } => label.clone(),
        }
    }
}

impl fmt::Debug for ScanTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanTarget::Path(path) => f.debug_tuple("Path").field(path).finish(),
            ScanTarget::Stream { label, .. } => f
                .debug_struct("Stream")
                .field("label", label)
                .finish_non_exhaustive(),
        }
    }
}

/// Outcome per target identifier.
pub type BatchResult = HashMap<String, ScanOutcome>;

/// Scans every target and returns the complete outcome map.
pub(crate) fn scan_all(client: &ClamdClient, targets: Vec<ScanTarget>) -> BatchResult {
    if targets.is_empty() {
        return BatchResult::new();
    }

    let identifiers: Vec<String> = targets.iter().map(ScanTarget::identifier).collect();
    let workers = client.max_concurrency.clamp(1, targets.len());
    debug!("scanning {} targets across {workers} workers", targets.len());

    let pool = ThreadPool::new(workers);
    let (tx, rx) = mpsc::channel();

    for target in targets {
        let tx = tx.clone();
        let client = client.clone();
        pool.execute(move || {
            let identifier = target.identifier();
            let outcome = client.scan_target(target);
            // The receiver outlives the pool, so this only fails if the
            // collecting thread itself is gone.
            let _ = tx.send((identifier, outcome));
        });
    }
    drop(tx);

    // Join the workers first: once the pool is gone every job has either
    // reported or been abandoned, and the drain below cannot block.
    drop(pool);

    let mut results = BatchResult::new();
    while let Ok((identifier, outcome)) = rx.recv() {
        match &outcome {
            ScanOutcome::Error { kind, message } => {
                warn!("scan of {identifier} failed: [{kind}] {message}");
            }
            _ => debug!("scan of {identifier} finished: {outcome}"),
        }
        results.insert(identifier, outcome);
    }

    // A worker that unwound took its job's outcome with it.
    for identifier in identifiers {
        results.entry(identifier).or_insert_with(|| ScanOutcome::Error {
            kind: ErrorKind::Transport,
            message: "scan worker exited before reporting an outcome".to_string(),
        });
    }

    results
}
