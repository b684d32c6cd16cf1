//! Exclusive claim adjudication.

use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use tracing::debug;
use uuid::Uuid;

use sheetstream_config::ExclusiveConfig;

use crate::error::ExclusiveError;
use crate::marker::ExclusiveMarker;
use crate::timeout::TimeoutTable;

/// What a cell's current content means for a would-be claimant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimState {
    /// No marker present.
    Free,
    /// Marker written by this worker.
    Own,
    /// Another worker's marker that has outlived its timeout, or a marker
    /// without a structured timestamp.
    Stale { holder: Option<String> },
    /// Another worker's live marker.
    Held { holder: String, wait: Duration },
}

/// Creates markers and decides whether existing ones are stale.
#[derive(Debug, Clone)]
pub struct ExclusiveGuard {
    prefix: String,
    worker_id: String,
    offset: FixedOffset,
    timeouts: TimeoutTable,
}

impl ExclusiveGuard {
    pub fn new(config: &ExclusiveConfig) -> Result<Self, ExclusiveError> {
        let offset = config
            .utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .ok_or(ExclusiveError::InvalidOffset(config.utc_offset_hours))?;
        if config.prefix.is_empty() || config.prefix.contains('_') {
            return Err(ExclusiveError::InvalidToken(config.prefix.clone()));
        }
        let worker_id = match config.worker_id {
            Some(ref id) if id.is_empty() || id.contains('_') => {
                return Err(ExclusiveError::InvalidToken(id.clone()));
            }
            Some(ref id) => id.clone(),
            None => generate_worker_id(),
        };
        Ok(Self {
            prefix: config.prefix.clone(),
            worker_id,
            offset,
            timeouts: TimeoutTable::from_config(config),
        })
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Offset markers and log timestamps are rendered in.
    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn timeouts(&self) -> &TimeoutTable {
        &self.timeouts
    }

    /// Timeout class for a feature.
    pub fn timeout_for(&self, feature: Option<&str>) -> Duration {
        self.timeouts.lookup(feature)
    }

    /// Marker claiming a cell for `worker_id`, stamped now.
    pub fn create_marker(&self, worker_id: &str, feature: Option<&str>) -> String {
        self.create_marker_at(worker_id, feature, Utc::now())
    }

    pub fn create_marker_at(&self, worker_id: &str, feature: Option<&str>, now: DateTime<Utc>) -> String {
        ExclusiveMarker::new(&self.prefix, worker_id, feature, now, self.offset).encode()
    }

    /// Marker for this guard's own worker.
    pub fn claim_marker(&self, feature: Option<&str>) -> String {
        self.create_marker(&self.worker_id, feature)
    }

    pub fn parse(&self, text: &str) -> Option<ExclusiveMarker> {
        ExclusiveMarker::parse(text, self.offset).filter(|m| m.prefix == self.prefix)
    }

    /// Whether `text` is a structured marker carrying this guard's prefix.
    pub fn is_valid_marker(&self, text: &str) -> bool {
        self.parse(text).is_some()
    }

    /// Whether the marker has outlived its timeout.
    ///
    /// `feature` overrides the feature recorded in the marker. Text that does
    /// not parse as a structured marker is always timed out.
    pub fn is_timeout(&self, marker: &str, feature: Option<&str>) -> bool {
        self.is_timeout_at(marker, feature, Utc::now())
    }

    pub fn is_timeout_at(&self, marker: &str, feature: Option<&str>, now: DateTime<Utc>) -> bool {
        match self.parse(marker) {
            Some(parsed) => {
                let timeout = self.timeout_for(feature.or(parsed.feature.as_deref()));
                parsed.age(now) >= timeout
            }
            None => true,
        }
    }

    /// `max(0, timeout - age)`; zero for unparseable markers.
    pub fn recommended_wait_time(&self, marker: &str, feature: Option<&str>) -> Duration {
        self.recommended_wait_time_at(marker, feature, Utc::now())
    }

    pub fn recommended_wait_time_at(
        &self,
        marker: &str,
        feature: Option<&str>,
        now: DateTime<Utc>,
    ) -> Duration {
        match self.parse(marker) {
            Some(parsed) => {
                let timeout = self.timeout_for(feature.or(parsed.feature.as_deref()));
                timeout.saturating_sub(parsed.age(now))
            }
            None => Duration::ZERO,
        }
    }

    /// Classify a cell's content for a claim attempt.
    ///
    /// Only the first line is inspected; a marker may sit above log sections.
    pub fn evaluate(&self, cell: &str, now: DateTime<Utc>) -> ClaimState {
        let text = cell.trim().lines().next().unwrap_or_default().trim();
        if text.is_empty() || !text.starts_with(&self.prefix) {
            return ClaimState::Free;
        }
        let Some(parsed) = self.parse(text) else {
            debug!("Unstructured marker '{}' treated as stale", text);
            return ClaimState::Stale { holder: None };
        };
        if parsed.worker_id == self.worker_id {
            return ClaimState::Own;
        }
        let timeout = self.timeout_for(parsed.feature.as_deref());
        let age = parsed.age(now);
        if age >= timeout {
            ClaimState::Stale {
                holder: Some(parsed.worker_id),
            }
        } else {
            ClaimState::Held {
                holder: parsed.worker_id,
                wait: timeout - age,
            }
        }
    }
}

/// Short random worker id without the `_` separator.
fn generate_worker_id() -> String {
    let simple = Uuid::new_v4().simple().to_string();
    format!("w{}", &simple[..8])
}

#[cfg(test)]
#[path = "guard_tests.rs"]
mod tests;
