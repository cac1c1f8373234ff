//! Caller-side liveness assessment.
//!
//! Reads the listener's status record without ever blocking on the listener
//! itself. Reachability needs both a `running` status and a fresh heartbeat:
//! a crashed listener leaves its last record behind, so the `status` field
//! alone would keep reporting `running` forever. Two degrade paths are kept
//! for older listeners: records without a heartbeat field fall back to the
//! status file's mtime, and an unreadable or absent record falls back to the
//! mere existence of the legacy sentinel file.

use std::fs;
use std::time::{Duration, SystemTime};

use deaddrop_config::Config;
use deaddrop_protocol::{DropPaths, ListenerStatus, StatusRecord, unix_seconds};

/// Outcome of a liveness assessment, with the evidence that produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum Reachability {
    /// Running status with a heartbeat inside the staleness threshold.
    FreshHeartbeat {
        /// Age of the heartbeat.
        age: Duration,
    },
    /// Running status without a heartbeat field; the status file's mtime is
    /// inside the staleness threshold.
    FreshStatusFile {
        /// Age of the status file.
        age: Duration,
    },
    /// No usable status record, but the legacy sentinel file exists.
    LegacySentinel,
    /// Running status whose heartbeat (or file mtime) is older than the
    /// staleness threshold.
    Stale {
        /// Age of the newest evidence found.
        age: Duration,
    },
    /// The listener reported itself stopped.
    ReportedStopped,
    /// No status record and no sentinel.
    NoEvidence,
}

impl Reachability {
    /// Whether the listener should be treated as reachable.
    #[must_use]
    pub fn is_reachable(&self) -> bool {
        matches!(
            self,
            Self::FreshHeartbeat { .. } | Self::FreshStatusFile { .. } | Self::LegacySentinel
        )
    }
}

/// Read-only monitor over the listener's status record.
#[derive(Debug, Clone)]
pub struct LivenessMonitor {
    paths: DropPaths,
    staleness_threshold: Duration,
}

impl LivenessMonitor {
    /// Builds a monitor for the configured drop directory.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            paths: DropPaths::new(config.drop_dir().as_std_path()),
            staleness_threshold: config.staleness_threshold(),
        }
    }

    /// Whether the listener should be treated as reachable right now.
    #[must_use]
    pub fn is_reachable(&self) -> bool {
        self.assess().is_reachable()
    }

    /// Assesses liveness and reports the evidence used.
    #[must_use]
    pub fn assess(&self) -> Reachability {
        let status_path = self.paths.status();
        let record = fs::read(&status_path)
            .ok()
            .and_then(|bytes| serde_json::from_slice::<StatusRecord>(&bytes).ok());
        let Some(record) = record else {
            if self.paths.legacy_sentinel().exists() {
                return Reachability::LegacySentinel;
            }
            return Reachability::NoEvidence;
        };

        if record.status != ListenerStatus::Running {
            return Reachability::ReportedStopped;
        }

        let now_unix = unix_seconds(SystemTime::now());
        if let Some(age_seconds) = record.heartbeat_age(now_unix) {
            // An absurd heartbeat value reads as infinitely stale.
            let age =
                Duration::try_from_secs_f64(age_seconds.max(0.0)).unwrap_or(Duration::MAX);
            if age <= self.staleness_threshold {
                return Reachability::FreshHeartbeat { age };
            }
            return Reachability::Stale { age };
        }

        // Record predates the heartbeat field; fall back to file age.
        let age = fs::metadata(&status_path)
            .and_then(|metadata| metadata.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .unwrap_or(Duration::MAX);
        if age <= self.staleness_threshold {
            return Reachability::FreshStatusFile { age };
        }
        Reachability::Stale { age }
    }
}
