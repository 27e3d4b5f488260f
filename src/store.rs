//! The resolver correlation store.
//!
//! The store keeps, per queried hostname, the list of resolvers that asked
//! for it together with the client subnet they forwarded. The DNS side
//! appends to it, the HTTP side reads from it and the [reaper] periodically
//! drops hostnames that have not been queried for a while.
//!
//! All state lives behind a single mutex. Nothing handed out by the store
//! refers back into it: lookups return a copy taken while the lock is held.
//!
//! [reaper]: crate::reaper

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, trace};

/// The maximum number of observations kept for a single hostname.
///
/// Hostnames are meant to be unique per client, so anything beyond a
/// handful of resolvers is somebody hammering the name. Further records
/// are dropped rather than pushing out the earlier ones.
pub const MAX_OBSERVATIONS: usize = 10;

//------------ Observation ---------------------------------------------------

/// A single sighting of a resolver querying a hostname.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Observation {
    /// The address of the resolver without a port.
    #[serde(rename = "Resolver")]
    pub resolver: String,

    /// The client subnet forwarded by the resolver, empty if none.
    #[serde(rename = "EDNS0Subnet", skip_serializing_if = "String::is_empty")]
    pub ecs: String,

    /// The query type, e.g. `"A"`. Only kept for display.
    #[serde(skip)]
    pub qtype: String,
}

impl Observation {
    pub fn new(
        resolver: impl Into<String>,
        ecs: impl Into<String>,
        qtype: impl Into<String>,
    ) -> Self {
        Observation {
            resolver: resolver.into(),
            ecs: ecs.into(),
            qtype: qtype.into(),
        }
    }
}

//------------ HostnameLog ---------------------------------------------------

#[derive(Debug)]
struct HostnameLog {
    last_update: Instant,
    observations: Vec<Observation>,
}

impl HostnameLog {
    fn new(now: Instant) -> Self {
        HostnameLog {
            last_update: now,
            observations: Vec::with_capacity(MAX_OBSERVATIONS),
        }
    }

    fn is_full(&self) -> bool {
        self.observations.len() >= MAX_OBSERVATIONS
    }
}

//------------ SweepStats ----------------------------------------------------

/// The outcome of a [`CorrelationStore::sweep`] pass.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SweepStats {
    /// The number of hostnames removed.
    pub removed: usize,

    /// The number of hostnames present before the pass.
    pub total: usize,
}

//------------ CorrelationStore ----------------------------------------------

/// Per hostname resolver history shared between the DNS and HTTP sides.
///
/// Hostnames are kept exactly as received from the DNS side, i.e., in
/// absolute form with a trailing dot and without case folding.
#[derive(Debug, Default)]
pub struct CorrelationStore {
    entries: Mutex<HashMap<String, HostnameLog>>,
}

impl CorrelationStore {
    /// Creates a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `resolver` queried `hostname`.
    ///
    /// Once a hostname has [`MAX_OBSERVATIONS`] entries, further calls for
    /// it are ignored. The resolver address is stored as given.
    pub fn record(
        &self,
        hostname: &str,
        resolver: &str,
        ecs: &str,
        qtype: &str,
    ) {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        let log = entries
            .entry(hostname.to_owned())
            .or_insert_with(|| HostnameLog::new(now));
        if log.is_full() {
            debug!(
                hostname,
                resolver, "Observation limit reached, dropping record"
            );
            return;
        }
        log.last_update = now;
        log.observations.push(Observation::new(resolver, ecs, qtype));
        trace!(hostname, count = log.observations.len(), "Recorded resolver");
    }

    /// Returns a copy of the observations recorded for `hostname`.
    ///
    /// Returns `None` if the hostname is unknown. Looking up a hostname
    /// never creates an entry for it.
    pub fn lookup(&self, hostname: &str) -> Option<Vec<Observation>> {
        self.entries
            .lock()
            .get(hostname)
            .map(|log| log.observations.clone())
    }

    /// Removes all hostnames last updated strictly before `cutoff`.
    pub fn sweep(&self, cutoff: Instant) -> SweepStats {
        let mut entries = self.entries.lock();
        let total = entries.len();
        entries.retain(|_, log| log.last_update >= cutoff);
        SweepStats {
            removed: total - entries.len(),
            total,
        }
    }

    /// Returns the number of hostnames currently known.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns whether no hostname is currently known.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    #[cfg(test)]
    fn last_update(&self, hostname: &str) -> Option<Instant> {
        self.entries.lock().get(hostname).map(|log| log.last_update)
    }
}

//============ Testing =======================================================
