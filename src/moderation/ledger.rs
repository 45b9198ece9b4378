//! Warning ledger
//!
//! Append-mostly store of infractions, scoped per (subject, community).
//! Rows are never hard-deleted; removal flips `active` off, which keeps
//! the audit history reconstructible from the journal alone.

use std::{
    fmt::{Display, Formatter},
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::moderation::{ModerationError, ModerationResult};

/// One issued infraction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Warning {
    /// Ledger-assigned id, monotonic, never reused
    pub id: u64,
    /// The warned user
    pub subject_id: u64,
    /// The community (guild) the warning is scoped to
    pub community_id: u64,
    /// The moderator who issued it
    pub issuer_id: u64,
    pub reason: String,
    pub created_at: DateTime<Utc>,
    /// `true` on creation; removal and clear flip it off, never back
    pub active: bool,
}

impl Display for Warning {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!(
            "Warning #{} for user {} in community {} by {} ({}): {}",
            self.id,
            self.subject_id,
            self.community_id,
            self.issuer_id,
            if self.active { "active" } else { "removed" },
            self.reason
        ))
    }
}

/// Ledger of warnings with an optional YAML journal
///
/// Every mutating call flushes the journal before returning, so a call
/// that returned `Ok` is durable. Reads go straight to the map; a task
/// that just added a row always sees it in its own subsequent count.
#[derive(Clone)]
pub struct WarningLedger {
    records: Arc<DashMap<u64, Warning>>,
    next_id: Arc<AtomicU64>,
    journal: Option<PathBuf>,
    // Snapshot writes must not interleave
    write_gate: Arc<tokio::sync::Mutex<()>>,
}

impl WarningLedger {
    /// Create a ledger with no journal (tests, dry runs)
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            records: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(1)),
            journal: None,
            write_gate: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Open a ledger backed by a YAML journal, replaying any existing rows
    ///
    /// A missing journal file is an empty ledger, not an error. The id
    /// counter resumes past the highest replayed id so ids are never reused.
    pub async fn load(path: impl Into<PathBuf>) -> ModerationResult<Self> {
        let path = path.into();
        let ledger = Self {
            records: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(1)),
            journal: Some(path.clone()),
            write_gate: Arc::new(tokio::sync::Mutex::new(())),
        };

        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => {
                let rows: Vec<Warning> = serde_yaml::from_str(&contents)
                    .map_err(|e| ModerationError::Persistence(format!("bad journal: {e}")))?;
                let mut high = 0;
                for row in rows {
                    high = high.max(row.id);
                    ledger.records.insert(row.id, row);
                }
                ledger.next_id.store(high + 1, Ordering::SeqCst);
                info!(
                    rows = ledger.records.len(),
                    path = %path.display(),
                    "Warning journal replayed"
                );
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(ModerationError::Persistence(format!(
                    "cannot read journal {}: {e}",
                    path.display()
                )));
            }
        }

        Ok(ledger)
    }

    /// Record a new infraction and return the persisted row
    ///
    /// # Errors
    /// `Validation` when the reason is empty or whitespace; `Persistence`
    /// when the journal cannot be written, in which case no row exists.
    pub async fn add(
        &self,
        subject_id: u64,
        community_id: u64,
        issuer_id: u64,
        reason: impl Into<String>,
    ) -> ModerationResult<Warning> {
        let reason = reason.into();
        if reason.trim().is_empty() {
            return Err(ModerationError::Validation(
                "warning reason must not be empty".to_string(),
            ));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let warning = Warning {
            id,
            subject_id,
            community_id,
            issuer_id,
            reason,
            created_at: Utc::now(),
            active: true,
        };
        self.records.insert(id, warning.clone());

        if let Err(e) = self.persist().await {
            // An add that cannot be made durable produced nothing
            self.records.remove(&id);
            return Err(e);
        }

        info!(
            warning_id = id,
            subject_id, community_id, issuer_id, "Warning recorded"
        );
        Ok(warning)
    }

    /// Count of active warnings for a subject in a community
    #[must_use]
    pub fn active_count(&self, subject_id: u64, community_id: u64) -> u64 {
        self.records
            .iter()
            .filter(|entry| {
                let w = entry.value();
                w.active && w.subject_id == subject_id && w.community_id == community_id
            })
            .count() as u64
    }

    /// Active warnings for a subject in a community, newest first
    #[must_use]
    pub fn list_active(&self, subject_id: u64, community_id: u64) -> Vec<Warning> {
        let mut rows: Vec<Warning> = self
            .records
            .iter()
            .filter_map(|entry| {
                let w = entry.value();
                (w.active && w.subject_id == subject_id && w.community_id == community_id)
                    .then(|| w.clone())
            })
            .collect();
        rows.sort_by(|a, b| b.id.cmp(&a.id));
        rows
    }

    /// Look up a warning by id, active or not
    #[must_use]
    pub fn get(&self, id: u64) -> Option<Warning> {
        self.records.get(&id).map(|entry| entry.value().clone())
    }

    /// Deactivate one warning, returning its state BEFORE the call
    ///
    /// Deactivating an already-inactive warning is a no-op success; the
    /// caller distinguishes the cases by the returned row's `active` flag.
    ///
    /// # Errors
    /// `NotFound` when no warning has this id; `Persistence` when the
    /// journal write fails, in which case the row is left untouched.
    pub async fn deactivate(&self, id: u64) -> ModerationResult<Warning> {
        let prior = {
            let Some(mut entry) = self.records.get_mut(&id) else {
                return Err(ModerationError::NotFound(format!("warning {id}")));
            };
            let prior = entry.value().clone();
            if prior.active {
                entry.value_mut().active = false;
            }
            prior
        };

        if prior.active {
            if let Err(e) = self.persist().await {
                if let Some(mut entry) = self.records.get_mut(&id) {
                    entry.value_mut().active = true;
                }
                return Err(e);
            }
            info!(warning_id = id, "Warning deactivated");
        }
        Ok(prior)
    }

    /// Deactivate every active warning for a subject in a community
    ///
    /// Returns how many rows actually transitioned; rows that were already
    /// inactive are not counted.
    ///
    /// # Errors
    /// `Persistence` when the journal write fails; the flipped rows are
    /// restored so the call applies fully or not at all.
    pub async fn deactivate_all(
        &self,
        subject_id: u64,
        community_id: u64,
    ) -> ModerationResult<u64> {
        let mut flipped = Vec::new();
        for mut entry in self.records.iter_mut() {
            let w = entry.value_mut();
            if w.active && w.subject_id == subject_id && w.community_id == community_id {
                w.active = false;
                flipped.push(w.id);
            }
        }

        if flipped.is_empty() {
            return Ok(0);
        }

        if let Err(e) = self.persist().await {
            for id in &flipped {
                if let Some(mut entry) = self.records.get_mut(id) {
                    entry.value_mut().active = true;
                }
            }
            return Err(e);
        }

        info!(
            subject_id,
            community_id,
            cleared = flipped.len(),
            "Warnings cleared"
        );
        Ok(flipped.len() as u64)
    }

    /// Most recent active warnings across a whole community, newest first
    #[must_use]
    pub fn recent_active(&self, community_id: u64, limit: usize) -> Vec<Warning> {
        let mut rows: Vec<Warning> = self
            .records
            .iter()
            .filter_map(|entry| {
                let w = entry.value();
                (w.active && w.community_id == community_id).then(|| w.clone())
            })
            .collect();
        rows.sort_by(|a, b| b.id.cmp(&a.id));
        rows.truncate(limit);
        rows
    }

    /// Flush the full row set to the journal
    async fn persist(&self) -> ModerationResult<()> {
        let Some(path) = &self.journal else {
            return Ok(());
        };

        let _gate = self.write_gate.lock().await;

        let mut rows: Vec<Warning> = self
            .records
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        rows.sort_by_key(|w| w.id);

        let yaml = serde_yaml::to_string(&rows)
            .map_err(|e| ModerationError::Persistence(format!("serialize journal: {e}")))?;

        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                tokio::fs::create_dir_all(dir).await.map_err(|e| {
                    ModerationError::Persistence(format!("create {}: {e}", dir.display()))
                })?;
            }
        }
        tokio::fs::write(path, yaml)
            .await
            .map_err(|e| ModerationError::Persistence(format!("write {}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUBJECT: u64 = 12345;
    const COMMUNITY: u64 = 67890;
    const ISSUER: u64 = 11111;

    #[tokio::test]
    async fn test_add_then_count() {
        let ledger = WarningLedger::in_memory();
        let warning = ledger
            .add(SUBJECT, COMMUNITY, ISSUER, "spamming invites")
            .await
            .unwrap();

        assert!(warning.active);
        assert_eq!(warning.subject_id, SUBJECT);
        assert!(ledger.active_count(SUBJECT, COMMUNITY) >= 1);
        // Other scopes are untouched
        assert_eq!(ledger.active_count(SUBJECT, COMMUNITY + 1), 0);
        assert_eq!(ledger.active_count(SUBJECT + 1, COMMUNITY), 0);
    }

    #[tokio::test]
    async fn test_empty_reason_rejected() {
        let ledger = WarningLedger::in_memory();
        assert!(matches!(
            ledger.add(SUBJECT, COMMUNITY, ISSUER, "   ").await,
            Err(ModerationError::Validation(_))
        ));
        assert_eq!(ledger.active_count(SUBJECT, COMMUNITY), 0);
    }

    #[tokio::test]
    async fn test_ids_are_monotonic_and_never_reused() {
        let ledger = WarningLedger::in_memory();
        let a = ledger.add(SUBJECT, COMMUNITY, ISSUER, "one").await.unwrap();
        let b = ledger.add(SUBJECT, COMMUNITY, ISSUER, "two").await.unwrap();
        assert!(b.id > a.id);

        ledger.deactivate(a.id).await.unwrap();
        let c = ledger
            .add(SUBJECT, COMMUNITY, ISSUER, "three")
            .await
            .unwrap();
        assert!(c.id > b.id);
    }

    #[tokio::test]
    async fn test_deactivate_twice_reports_prior_state() {
        let ledger = WarningLedger::in_memory();
        let warning = ledger
            .add(SUBJECT, COMMUNITY, ISSUER, "flooding")
            .await
            .unwrap();

        let first = ledger.deactivate(warning.id).await.unwrap();
        assert!(first.active, "first removal sees the active prior state");

        let second = ledger.deactivate(warning.id).await.unwrap();
        assert!(!second.active, "second removal sees an inactive prior state");

        assert_eq!(ledger.active_count(SUBJECT, COMMUNITY), 0);
        // Row still exists for audit
        assert!(ledger.get(warning.id).is_some());
    }

    #[tokio::test]
    async fn test_deactivate_missing_is_not_found() {
        let ledger = WarningLedger::in_memory();
        assert!(matches!(
            ledger.deactivate(999).await,
            Err(ModerationError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_deactivate_all_counts_only_transitions() {
        let ledger = WarningLedger::in_memory();
        let first = ledger.add(SUBJECT, COMMUNITY, ISSUER, "one").await.unwrap();
        ledger.add(SUBJECT, COMMUNITY, ISSUER, "two").await.unwrap();
        ledger
            .add(SUBJECT, COMMUNITY, ISSUER, "three")
            .await
            .unwrap();
        // A different subject in the same community stays out of scope
        ledger
            .add(SUBJECT + 1, COMMUNITY, ISSUER, "unrelated")
            .await
            .unwrap();

        ledger.deactivate(first.id).await.unwrap();

        let cleared = ledger.deactivate_all(SUBJECT, COMMUNITY).await.unwrap();
        assert_eq!(cleared, 2);
        assert!(ledger.list_active(SUBJECT, COMMUNITY).is_empty());
        assert_eq!(ledger.active_count(SUBJECT + 1, COMMUNITY), 1);

        let again = ledger.deactivate_all(SUBJECT, COMMUNITY).await.unwrap();
        assert_eq!(again, 0);
    }

    #[tokio::test]
    async fn test_list_active_newest_first() {
        let ledger = WarningLedger::in_memory();
        let a = ledger.add(SUBJECT, COMMUNITY, ISSUER, "one").await.unwrap();
        let b = ledger.add(SUBJECT, COMMUNITY, ISSUER, "two").await.unwrap();
        let c = ledger
            .add(SUBJECT, COMMUNITY, ISSUER, "three")
            .await
            .unwrap();

        let rows = ledger.list_active(SUBJECT, COMMUNITY);
        assert_eq!(
            rows.iter().map(|w| w.id).collect::<Vec<_>>(),
            vec![c.id, b.id, a.id]
        );
    }

    #[tokio::test]
    async fn test_recent_active_is_community_wide_and_limited() {
        let ledger = WarningLedger::in_memory();
        for i in 0..5 {
            ledger
                .add(SUBJECT + i, COMMUNITY, ISSUER, format!("reason {i}"))
                .await
                .unwrap();
        }
        ledger
            .add(SUBJECT, COMMUNITY + 1, ISSUER, "other community")
            .await
            .unwrap();

        let rows = ledger.recent_active(COMMUNITY, 3);
        assert_eq!(rows.len(), 3);
        assert!(rows.windows(2).all(|pair| pair[0].id > pair[1].id));
        assert!(rows.iter().all(|w| w.community_id == COMMUNITY));
    }

    #[tokio::test]
    async fn test_journal_round_trip() {
        let path = std::env::temp_dir().join(format!(
            "liminal-warden-ledger-{}.yaml",
            std::process::id()
        ));
        let _ = tokio::fs::remove_file(&path).await;

        {
            let ledger = WarningLedger::load(&path).await.unwrap();
            let w = ledger
                .add(SUBJECT, COMMUNITY, ISSUER, "persisted")
                .await
                .unwrap();
            ledger.add(SUBJECT, COMMUNITY, ISSUER, "also").await.unwrap();
            ledger.deactivate(w.id).await.unwrap();
        }

        let reloaded = WarningLedger::load(&path).await.unwrap();
        assert_eq!(reloaded.active_count(SUBJECT, COMMUNITY), 1);
        assert!(!reloaded.get(1).unwrap().active);

        // The id counter resumes past replayed rows
        let next = reloaded
            .add(SUBJECT, COMMUNITY, ISSUER, "after reload")
            .await
            .unwrap();
        assert_eq!(next.id, 3);

        let _ = tokio::fs::remove_file(&path).await;
    }
}
