//! # Reminder De-duplication State
//!
//! Tracks which reminder kinds have already gone out for each event, keyed
//! by the event's last-seen content version, so a restart or a repeated
//! poll never re-sends a delivered reminder. The whole mapping is written
//! to a JSON snapshot on every mutation; the write is atomic
//! (temp-file-then-rename), so a crash mid-write leaves the previous valid
//! snapshot in place.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Per-event delivery record.
///
/// `sent` only ever holds kinds recorded under `last_updated`: a version
/// change empties the set and swaps the version in the same mutation, so
/// persisted state never mixes kinds from two versions of an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderRecord {
    /// Reminder kinds already delivered, sorted, duplicate-free.
    pub sent: Vec<String>,
    /// Version token the kinds above were delivered under.
    pub last_updated: String,
}

/// Durable mapping from event id to delivery record.
///
/// Not internally synchronized: mutations are expected from a single
/// non-reentrant poll loop. Callers that expose the store to concurrent
/// readers must wrap it in a lock of their own.
pub struct ReminderStateStore {
    path: PathBuf,
    state: BTreeMap<String, ReminderRecord>,
}

impl ReminderStateStore {
    /// Open the store at `path`, creating the parent directory if needed.
    ///
    /// A missing snapshot file is not an error (fresh store); a snapshot
    /// that does not match the expected shape is.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        let state = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Invalid reminder state snapshot {}", path.display()))?
        } else {
            BTreeMap::new()
        };

        Ok(Self { path, state })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True iff `kind` was recorded for `event_id` under exactly this
    /// version. A version mismatch means "not sent under this version".
    pub fn has_sent(&self, event_id: &str, kind: &str, last_updated: &str) -> bool {
        match self.state.get(event_id) {
            Some(record) if record.last_updated == last_updated => {
                record.sent.iter().any(|k| k == kind)
            }
            _ => false,
        }
    }

    /// Record `kind` as delivered for `event_id` under `last_updated` and
    /// persist synchronously.
    ///
    /// A version change resets the record's `sent` set before the new kind
    /// goes in; both land in the same persisted snapshot. The delivery is
    /// not considered recorded unless this returns Ok.
    pub fn mark_sent(&mut self, event_id: &str, kind: &str, last_updated: &str) -> Result<()> {
        let record = self
            .state
            .entry(event_id.to_string())
            .or_insert_with(|| ReminderRecord {
                sent: Vec::new(),
                last_updated: last_updated.to_string(),
            });

        if record.last_updated != last_updated {
            debug!("Event {event_id} changed; resetting sent reminders");
            record.sent.clear();
            record.last_updated = last_updated.to_string();
        }

        if !record.sent.iter().any(|k| k == kind) {
            record.sent.push(kind.to_string());
            record.sent.sort();
        }

        self.persist()
    }

    /// Drop the record for `event_id`. A missing record is a no-op, not an
    /// error, and does not touch the snapshot.
    pub fn clear_event(&mut self, event_id: &str) -> Result<()> {
        if self.state.remove(event_id).is_some() {
            debug!("Cleared reminder state for event {event_id}");
            self.persist()?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    fn persist(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.state)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}
