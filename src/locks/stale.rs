//! Stale-holder detection and lock breaking.
//!
//! Runs only when an acquisition attempt finds the lock directory already
//! present. A same-host holder is judged by probing its pid; a remote holder
//! can only be judged by the age of its record. Breaking a stale lock clears
//! the directory but never acquires it: the caller's next atomic create is
//! still the only acquisition event.

use super::holder::{HolderRecord, holder_path};
use super::liveness::{Liveness, LivenessProbe};
use crate::events::{Event, EventAction, EventSink};
use serde_json::json;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Why a held lock was judged abandoned.
#[derive(Debug, Clone, PartialEq)]
pub enum StaleReason {
    /// Same host, and the recorded pid no longer exists.
    DeadProcess { pid: i64 },
    /// Different host, and the record is older than the stale timeout.
    Expired { age: Duration },
}

/// Verdict on a held lock.
#[derive(Debug, Clone, PartialEq)]
pub enum Staleness {
    /// No readable holder record; nothing can be concluded.
    Undetermined,
    /// The holder is (or may be) still active.
    Live,
    /// The holder is gone and the lock may be broken.
    Stale(StaleReason),
}

impl Staleness {
    pub fn is_stale(&self) -> bool {
        matches!(self, Staleness::Stale(_))
    }
}

impl std::fmt::Display for Staleness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Staleness::Undetermined => write!(f, "undetermined"),
            Staleness::Live => write!(f, "live"),
            Staleness::Stale(StaleReason::DeadProcess { pid }) => {
                write!(f, "stale (pid {} is not running)", pid)
            }
            Staleness::Stale(StaleReason::Expired { age }) => {
                write!(f, "stale (held for {:.0}s)", age.as_secs_f64())
            }
        }
    }
}

/// Everything needed to judge a holder from this process.
#[derive(Clone)]
pub struct StalePolicy {
    pub local_host: String,
    pub stale_timeout: Duration,
    pub probe: Arc<dyn LivenessProbe>,
}

impl std::fmt::Debug for StalePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StalePolicy")
            .field("local_host", &self.local_host)
            .field("stale_timeout", &self.stale_timeout)
            .finish_non_exhaustive()
    }
}

impl StalePolicy {
    /// Judge a holder record (or its absence).
    ///
    /// A same-host pid that exists but cannot be signalled is `Live`: it may
    /// belong to another user who happens to reuse the id.
    pub fn assess(&self, holder: Option<&HolderRecord>) -> Staleness {
        let Some(holder) = holder else {
            return Staleness::Undetermined;
        };

        if holder.is_local(&self.local_host) {
            return match self.probe.probe(holder.pid) {
                Liveness::Dead => Staleness::Stale(StaleReason::DeadProcess { pid: holder.pid }),
                Liveness::Alive | Liveness::Unknown => Staleness::Live,
            };
        }

        let age = holder.age();
        if age > self.stale_timeout {
            Staleness::Stale(StaleReason::Expired { age })
        } else {
            Staleness::Live
        }
    }

    /// Remove the lock at `lock_path` if its holder is provably stale.
    ///
    /// Returns true only when the lock directory was removed by this call.
    /// Any failure abandons the attempt; the caller's retry loop re-reads
    /// the holder from scratch.
    pub fn try_break(&self, lock_path: &Path, sink: &dyn EventSink) -> bool {
        let Some(holder) = HolderRecord::read_from(lock_path) else {
            return false;
        };

        let verdict = self.assess(Some(&holder));
        if !verdict.is_stale() {
            return false;
        }

        // Another breaker may have cleared it and a new holder moved in.
        match HolderRecord::read_from(lock_path) {
            Some(current) if current.same_holder(&holder) => {}
            _ => return false,
        }

        let _ = fs::remove_file(holder_path(lock_path));
        if let Err(e) = fs::remove_dir(lock_path) {
            tracing::debug!(
                lock = %lock_path.display(),
                error = %e,
                "abandoned stale lock break"
            );
            return false;
        }

        sink.record(
            &Event::new(EventAction::BrokeStale, lock_path.display().to_string()).with_details(
                json!({
                    "hostname": holder.hostname,
                    "pid": holder.pid,
                    "age": holder.age_string(),
                    "reason": verdict.to_string(),
                }),
            ),
        );
        true
    }
}
