//! Upload Ledger
//!
//! Ordered bookkeeping of asset records. Committed records are kept in
//! completion order; every other record stays in submission order until it
//! commits or is removed. The ledger itself is synchronous and owned by the
//! coordinator, which serializes access behind a mutex.

use chrono::Utc;
use serde::Serialize;

use crate::types::{AssetId, AssetRecord, AssetStatus, FlowError, Result};

/// Completion reported by an upload task
#[derive(Debug, Clone)]
pub enum Completion {
    Committed { reference: String },
    Failed { error: String },
}

/// Read-only copy of the ledger
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSnapshot {
    /// Committed records in completion order
    pub committed: Vec<AssetRecord>,
    /// Pending, uploading and failed records in submission order
    pub outstanding: Vec<AssetRecord>,
}

impl LedgerSnapshot {
    pub fn in_flight(&self) -> usize {
        self.outstanding
            .iter()
            .filter(|r| r.status.is_in_flight())
            .count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &AssetRecord> {
        self.outstanding
            .iter()
            .filter(|r| r.status == AssetStatus::Failed)
    }

    pub fn is_quiescent(&self) -> bool {
        self.in_flight() == 0
    }

    /// Committed references in ledger order
    pub fn committed_refs(&self) -> Vec<String> {
        self.committed
            .iter()
            .filter_map(|r| r.committed_ref.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.committed.len() + self.outstanding.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default)]
pub struct Ledger {
    committed: Vec<AssetRecord>,
    outstanding: Vec<AssetRecord>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new pending record
    pub fn insert(&mut self, record: AssetRecord) {
        self.outstanding.push(record);
    }

    pub fn get(&self, id: &AssetId) -> Option<&AssetRecord> {
        self.outstanding
            .iter()
            .chain(self.committed.iter())
            .find(|r| &r.id == id)
    }

    /// Move a pending or failed record to `uploading`
    ///
    /// Returns the new attempt number, which the upload task must hand back
    /// with its completion.
    pub fn begin_upload(&mut self, id: &AssetId) -> Result<u32> {
        let record = self
            .outstanding
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| {
                if self.committed.iter().any(|r| &r.id == id) {
                    FlowError::InvalidTransition {
                        id: id.clone(),
                        from: AssetStatus::Committed,
                        to: AssetStatus::Uploading,
                    }
                } else {
                    FlowError::UnknownAsset(id.clone())
                }
            })?;

        transition(record, AssetStatus::Uploading)?;
        record.attempts += 1;
        record.error = None;
        Ok(record.attempts)
    }

    /// Apply an upload completion
    ///
    /// Completions for removed records, or from a superseded attempt, are
    /// stale and return `None` without touching the ledger.
    pub fn complete(
        &mut self,
        id: &AssetId,
        attempt: u32,
        completion: Completion,
    ) -> Option<AssetRecord> {
        let index = self.outstanding.iter().position(|r| {
            &r.id == id && r.attempts == attempt && r.status == AssetStatus::Uploading
        })?;

        match completion {
            Completion::Committed { reference } => {
                let mut record = self.outstanding.remove(index);
                record.status = AssetStatus::Committed;
                record.committed_ref = Some(reference);
                record.updated_at = Utc::now();
                self.committed.push(record.clone());
                Some(record)
            }
            Completion::Failed { error } => {
                let record = &mut self.outstanding[index];
                record.status = AssetStatus::Failed;
                record.error = Some(error);
                record.updated_at = Utc::now();
                Some(record.clone())
            }
        }
    }

    /// Drop a record in any state
    pub fn remove(&mut self, id: &AssetId) -> Option<AssetRecord> {
        if let Some(index) = self.outstanding.iter().position(|r| &r.id == id) {
            return Some(self.outstanding.remove(index));
        }
        let index = self.committed.iter().position(|r| &r.id == id)?;
        Some(self.committed.remove(index))
    }

    pub fn in_flight(&self) -> usize {
        self.outstanding
            .iter()
            .filter(|r| r.status.is_in_flight())
            .count()
    }

    pub fn counts(&self) -> (usize, usize) {
        let failed = self
            .outstanding
            .iter()
            .filter(|r| r.status == AssetStatus::Failed)
            .count();
        (self.committed.len(), failed)
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            committed: self.committed.clone(),
            outstanding: self.outstanding.clone(),
        }
    }
}

fn transition(record: &mut AssetRecord, next: AssetStatus) -> Result<()> {
    if !record.status.can_transition_to(next) {
        return Err(FlowError::InvalidTransition {
            id: record.id.clone(),
            from: record.status,
            to: next,
        });
    }
    record.status = next;
    record.updated_at = Utc::now();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger_with(n: usize) -> (Ledger, Vec<AssetId>) {
        let mut ledger = Ledger::new();
        let ids = (0..n)
            .map(|i| {
                let record = AssetRecord::new(format!("photo-{}.jpg", i));
                let id = record.id.clone();
                ledger.insert(record);
                id
            })
            .collect();
        (ledger, ids)
    }

    fn committed(reference: &str) -> Completion {
        Completion::Committed {
            reference: reference.to_string(),
        }
    }

    #[test]
    fn test_committed_in_completion_order() {
        let (mut ledger, ids) = ledger_with(3);
        let attempts: Vec<u32> = ids.iter().map(|id| ledger.begin_upload(id).unwrap()).collect();

        ledger.complete(&ids[2], attempts[2], committed("c")).unwrap();
        ledger.complete(&ids[0], attempts[0], committed("a")).unwrap();

        let snapshot = ledger.snapshot();
        assert_eq!(snapshot.committed_refs(), vec!["c", "a"]);
        assert_eq!(snapshot.in_flight(), 1);
        assert_eq!(snapshot.outstanding[0].id, ids[1]);
    }

    #[test]
    fn test_stale_attempt_is_discarded() {
        let (mut ledger, ids) = ledger_with(1);
        let first = ledger.begin_upload(&ids[0]).unwrap();
        ledger
            .complete(
                &ids[0],
                first,
                Completion::Failed {
                    error: "timeout".into(),
                },
            )
            .unwrap();

        let second = ledger.begin_upload(&ids[0]).unwrap();
        assert_eq!(second, 2);
        assert!(ledger.complete(&ids[0], first, committed("late")).is_none());
        assert_eq!(ledger.get(&ids[0]).unwrap().status, AssetStatus::Uploading);

        let record = ledger.complete(&ids[0], second, committed("ok")).unwrap();
        assert_eq!(record.committed_ref.as_deref(), Some("ok"));
    }

    #[test]
    fn test_completion_after_remove_is_discarded() {
        let (mut ledger, ids) = ledger_with(2);
        let attempt = ledger.begin_upload(&ids[0]).unwrap();
        ledger.remove(&ids[0]).unwrap();

        assert!(ledger.complete(&ids[0], attempt, committed("orphan")).is_none());
        assert!(ledger.snapshot().committed.is_empty());
    }

    #[test]
    fn test_committed_record_cannot_restart() {
        let (mut ledger, ids) = ledger_with(1);
        let attempt = ledger.begin_upload(&ids[0]).unwrap();
        ledger.complete(&ids[0], attempt, committed("a")).unwrap();

        assert!(matches!(
            ledger.begin_upload(&ids[0]),
            Err(FlowError::InvalidTransition {
                from: AssetStatus::Committed,
                ..
            })
        ));
        assert!(matches!(
            ledger.begin_upload(&AssetId::from("missing")),
            Err(FlowError::UnknownAsset(_))
        ));
    }

    #[test]
    fn test_uploading_record_cannot_restart() {
        let (mut ledger, ids) = ledger_with(1);
        ledger.begin_upload(&ids[0]).unwrap();
        assert!(matches!(
            ledger.begin_upload(&ids[0]),
            Err(FlowError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_counts() {
        let (mut ledger, ids) = ledger_with(3);
        let a = ledger.begin_upload(&ids[0]).unwrap();
        let b = ledger.begin_upload(&ids[1]).unwrap();
        ledger.complete(&ids[0], a, committed("a"));
        ledger.complete(
            &ids[1],
            b,
            Completion::Failed {
                error: "boom".into(),
            },
        );

        assert_eq!(ledger.counts(), (1, 1));
        assert_eq!(ledger.in_flight(), 1);
        assert!(!ledger.snapshot().is_quiescent());
    }
}
