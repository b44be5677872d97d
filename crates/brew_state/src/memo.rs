//! Check-then-record helpers for memoized stage outputs.
//!
//! A stage that persists an expensive output keeps one [`CacheRecord`] per
//! descriptor: where the output was written and the fingerprint of the
//! inputs it came from. Before doing the work it calls [`lookup`]; after
//! writing the output it calls [`record`]. [`memoize`] does both and guards
//! the write against a concurrent stage recording first.

use std::path::PathBuf;

use brew_common::Fingerprint;
use serde::{Deserialize, Serialize};

use crate::error::StateError;
use crate::fingerprint::Freshness;
use crate::namespace::StageNamespace;
use crate::store::to_value;

/// Where a cached output lives and which inputs produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    /// Path of the persisted output.
    pub location: PathBuf,
    /// Fingerprint of the inputs at the time the output was written.
    pub fingerprint: Fingerprint,
}

/// Result of looking up a descriptor against the current fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// A record exists and its fingerprint matches.
    Hit(CacheRecord),
    /// A record exists but was produced from different inputs.
    Stale(CacheRecord),
    /// No usable record exists.
    Miss,
}

impl Lookup {
    /// Maps the lookup onto [`Freshness`].
    pub fn freshness(&self) -> Freshness {
        match self {
            Lookup::Hit(_) => Freshness::Fresh,
            Lookup::Stale(_) => Freshness::Stale,
            Lookup::Miss => Freshness::Missing,
        }
    }

    /// Returns the record if it can be reused.
    pub fn hit(&self) -> Option<&CacheRecord> {
        match self {
            Lookup::Hit(record) => Some(record),
            _ => None,
        }
    }
}

/// Looks up the record for `descriptor` and compares it with `current`.
///
/// Entries that do not decode as a [`CacheRecord`] count as a miss.
pub fn lookup(ns: &StageNamespace, descriptor: &str, current: Fingerprint) -> Lookup {
    let Some(value) = ns.get(descriptor) else {
        return Lookup::Miss;
    };
    match CacheRecord::deserialize(&value) {
        Ok(record) if record.fingerprint == current => Lookup::Hit(record),
        Ok(record) => Lookup::Stale(record),
        Err(e) => {
            tracing::warn!(
                key = %ns.qualify(descriptor),
                error = %e,
                "entry is not a cache record, treating as miss"
            );
            Lookup::Miss
        }
    }
}

/// Records `record` for `descriptor`, replacing any previous record.
pub fn record(
    ns: &StageNamespace,
    descriptor: &str,
    record: &CacheRecord,
) -> Result<(), StateError> {
    ns.put_as(descriptor, record)
}

/// Reuses the output recorded for `descriptor` or recomputes it.
///
/// `compute` runs only when the lookup is stale or missing and returns the
/// location it wrote. The new record then replaces whatever the entry holds,
/// in one atomic step, unless another stage has meanwhile recorded a record
/// for `current`; that record wins and is returned.
///
/// Returns the record in effect and the freshness found at lookup time.
pub fn memoize<F, E>(
    ns: &StageNamespace,
    descriptor: &str,
    current: Fingerprint,
    compute: F,
) -> Result<(CacheRecord, Freshness), E>
where
    F: FnOnce() -> Result<PathBuf, E>,
    E: From<StateError>,
{
    let found = lookup(ns, descriptor, current);
    let freshness = found.freshness();
    if let Lookup::Hit(record) = found {
        tracing::debug!(key = %ns.qualify(descriptor), "reusing cached output");
        return Ok((record, freshness));
    }

    tracing::debug!(key = %ns.qualify(descriptor), ?freshness, "recomputing output");
    let record = CacheRecord {
        location: compute()?,
        fingerprint: current,
    };
    let value = to_value(&record)?;

    let mut winner = None;
    ns.update(descriptor, |existing| {
        match existing.map(CacheRecord::deserialize) {
            Some(Ok(other)) if other.fingerprint == current => {
                winner = Some(other);
                existing.cloned()
            }
            _ => Some(value),
        }
    })?;

    match winner {
        Some(winner) => {
            tracing::debug!(
                key = %ns.qualify(descriptor),
                "concurrent stage recorded first, keeping its output"
            );
            Ok((winner, freshness))
        }
        None => Ok((record, freshness)),
    }
}
