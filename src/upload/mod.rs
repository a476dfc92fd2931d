//! Upload Coordinator
//!
//! Owns the upload ledger. A batch is validated up front, then every asset
//! is uploaded concurrently through the storage writer's durable path.
//! Completions are applied in whatever order they arrive.
//!
//! ## Guarantees
//!
//! - Once quiescent, every submitted record is either committed or failed
//! - Downstream consumers only see committed references, and never while an
//!   upload is still in flight
//! - A completion is applied only if its record still exists and it belongs
//!   to the record's latest attempt
//!
//! Observers read snapshots or subscribe to `LedgerEvent`s.

mod events;
mod ledger;

pub use events::{LedgerEvent, LedgerEvents};
pub use ledger::{Completion, Ledger, LedgerSnapshot};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use crate::auth::{Credential, require_credential};
use crate::constants::storage::UPLOAD_PREFIX;
use crate::storage::{StorageFallbackWriter, StoredRef, WriteMeta};
use crate::types::{AssetId, AssetRecord, AssetStatus, FlowError, RawAsset, Result};

struct State {
    ledger: Ledger,
    /// Payloads kept for retries until the record commits or is removed
    payloads: HashMap<AssetId, Arc<RawAsset>>,
}

struct Inner {
    state: Mutex<State>,
    writer: StorageFallbackWriter,
    events: LedgerEvents,
}

impl Inner {
    /// Acquire the state lock, recovering from poison
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Emit busy/quiescent transitions between two in-flight counts
    fn emit_transition(&self, state: &State, before: usize) {
        let after = state.ledger.in_flight();
        if before == 0 && after > 0 {
            self.events.emit(LedgerEvent::Busy { in_flight: after });
        } else if before > 0 && after == 0 {
            let (committed, failed) = state.ledger.counts();
            self.events.emit(LedgerEvent::Quiescent { committed, failed });
        }
    }

    async fn finish(&self, id: &AssetId, attempt: u32, outcome: Result<StoredRef>, credential: &Credential) {
        let completion = match &outcome {
            Ok(stored) => Completion::Committed {
                reference: stored.reference.clone(),
            },
            Err(e) => Completion::Failed {
                error: e.to_string(),
            },
        };

        let applied = {
            let mut state = self.lock();
            let before = state.ledger.in_flight();
            let applied = state.ledger.complete(id, attempt, completion);
            if let Some(record) = &applied {
                if record.status == AssetStatus::Committed {
                    state.payloads.remove(id);
                }
                self.events.emit(LedgerEvent::changed(record));
                self.emit_transition(&state, before);
            }
            applied
        };

        match (applied, outcome) {
            (Some(record), Ok(_)) => {
                info!(id = %id, attempt, source = %record.source_handle, "Upload committed");
            }
            (Some(record), Err(e)) => {
                warn!(id = %id, attempt, source = %record.source_handle, error = %e, "Upload failed");
            }
            (None, Ok(stored)) => {
                debug!(id = %id, attempt, "Discarding stale upload completion");
                self.writer.delete(&stored.reference, credential).await;
            }
            (None, Err(_)) => {
                debug!(id = %id, attempt, "Discarding stale upload failure");
            }
        }
    }
}

/// Coordinates concurrent uploads into the ledger
#[derive(Clone)]
pub struct UploadCoordinator {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for UploadCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadCoordinator")
            .field("writer", &self.inner.writer)
            .finish()
    }
}

impl UploadCoordinator {
    /// `writer` should carry the upload retry policy
    pub fn new(writer: StorageFallbackWriter) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    ledger: Ledger::new(),
                    payloads: HashMap::new(),
                }),
                writer,
                events: LedgerEvents::new(),
            }),
        }
    }

    /// Validate and dispatch a batch; returns the new record ids in order
    ///
    /// Any precondition failure rejects the whole batch before a single
    /// network call is made.
    #[instrument(skip_all, fields(batch = assets.len()))]
    pub fn submit_batch(
        &self,
        assets: Vec<RawAsset>,
        credential: Option<&Credential>,
    ) -> Result<Vec<AssetId>> {
        let credential = require_credential(credential)?;

        if assets.is_empty() {
            return Err(FlowError::validation("assets", "batch is empty"));
        }
        if let Some((index, asset)) = assets.iter().enumerate().find(|(_, a)| a.bytes.is_empty()) {
            return Err(FlowError::validation(
                format!("assets[{}]", index),
                format!("'{}' has no content", asset.source_handle),
            ));
        }

        let mut dispatches = Vec::with_capacity(assets.len());
        {
            let mut state = self.inner.lock();
            let before = state.ledger.in_flight();

            for asset in assets {
                let record = AssetRecord::new(asset.source_handle.clone());
                let id = record.id.clone();
                state.ledger.insert(record);

                let attempt = state.ledger.begin_upload(&id)?;
                let payload = Arc::new(asset);
                state.payloads.insert(id.clone(), payload.clone());

                if let Some(record) = state.ledger.get(&id) {
                    self.inner.events.emit(LedgerEvent::changed(record));
                }
                dispatches.push((id, attempt, payload));
            }

            self.inner.emit_transition(&state, before);
        }

        info!(count = dispatches.len(), "Dispatching upload batch");
        let ids = dispatches.iter().map(|(id, _, _)| id.clone()).collect();
        for (id, attempt, payload) in dispatches {
            self.dispatch(id, attempt, payload, credential.clone());
        }

        Ok(ids)
    }

    /// Re-dispatch a failed record without touching its siblings
    #[instrument(skip(self, credential), fields(id = %id))]
    pub fn retry(&self, id: &AssetId, credential: Option<&Credential>) -> Result<()> {
        let credential = require_credential(credential)?;

        let (attempt, payload) = {
            let mut state = self.inner.lock();
            let before = state.ledger.in_flight();

            let status = state
                .ledger
                .get(id)
                .map(|r| r.status)
                .ok_or_else(|| FlowError::UnknownAsset(id.clone()))?;
            if status != AssetStatus::Failed {
                return Err(FlowError::InvalidTransition {
                    id: id.clone(),
                    from: status,
                    to: AssetStatus::Uploading,
                });
            }
            let payload = state
                .payloads
                .get(id)
                .cloned()
                .ok_or_else(|| FlowError::UnknownAsset(id.clone()))?;
            let attempt = state.ledger.begin_upload(id)?;

            if let Some(record) = state.ledger.get(id) {
                self.inner.events.emit(LedgerEvent::changed(record));
            }
            self.inner.emit_transition(&state, before);
            (attempt, payload)
        };

        info!(attempt, "Retrying upload");
        self.dispatch(id.clone(), attempt, payload, credential.clone());
        Ok(())
    }

    /// Re-dispatch every failed record; returns the retried ids
    pub fn retry_failed(&self, credential: Option<&Credential>) -> Result<Vec<AssetId>> {
        let failed: Vec<AssetId> = self.snapshot().failed().map(|r| r.id.clone()).collect();
        for id in &failed {
            self.retry(id, credential)?;
        }
        Ok(failed)
    }

    /// Drop a record in any state
    ///
    /// Committed objects are deleted from storage on a best-effort basis.
    /// An in-flight upload keeps running, but its completion is discarded.
    #[instrument(skip(self, credential), fields(id = %id))]
    pub async fn remove(&self, id: &AssetId, credential: Option<&Credential>) -> Result<AssetRecord> {
        let record = {
            let mut state = self.inner.lock();
            let before = state.ledger.in_flight();

            let record = state
                .ledger
                .remove(id)
                .ok_or_else(|| FlowError::UnknownAsset(id.clone()))?;
            state.payloads.remove(id);

            self.inner
                .events
                .emit(LedgerEvent::RecordRemoved { id: id.clone() });
            self.inner.emit_transition(&state, before);
            record
        };

        if let Some(reference) = &record.committed_ref {
            match credential {
                Some(credential) => self.inner.writer.delete(reference, credential).await,
                None => warn!("No credential; leaving committed object in storage"),
            }
        }

        debug!(status = %record.status, "Record removed");
        Ok(record)
    }

    /// No record is pending or uploading
    pub fn is_ready_to_submit(&self) -> bool {
        self.inner.lock().ledger.in_flight() == 0
    }

    /// Committed references in ledger order, for downstream submission
    ///
    /// Rejected while any upload is still in flight.
    pub fn submission_refs(&self) -> Result<Vec<String>> {
        let state = self.inner.lock();
        let in_flight = state.ledger.in_flight();
        if in_flight > 0 {
            return Err(FlowError::UploadsInFlight { count: in_flight });
        }
        Ok(state.ledger.snapshot().committed_refs())
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.inner.lock().ledger.snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.inner.events.subscribe()
    }

    /// Resolve once no record is in flight
    pub async fn wait_quiescent(&self) -> LedgerSnapshot {
        let mut events = self.subscribe();
        loop {
            let snapshot = self.snapshot();
            if snapshot.is_quiescent() {
                return snapshot;
            }

            match events.recv().await {
                Ok(LedgerEvent::Quiescent { .. }) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Closed) => return self.snapshot(),
            }
        }
    }

    fn dispatch(&self, id: AssetId, attempt: u32, payload: Arc<RawAsset>, credential: Credential) {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            let meta = WriteMeta::new(payload.content_type.clone(), UPLOAD_PREFIX);
            let outcome = inner
                .writer
                .write_durable(&payload.bytes, &meta, &credential)
                .await;
            inner.finish(&id, attempt, outcome, &credential).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::RetryPolicy;
    use crate::storage::{ObjectStore, PutOptions, StoredObject};
    use async_trait::async_trait;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    /// Payload prefix `fail` always fails, `slow` takes 2s, others 100ms
    struct TestStore {
        healthy: AtomicBool,
        puts: AtomicUsize,
        deleted: Mutex<Vec<String>>,
    }

    impl TestStore {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                healthy: AtomicBool::new(true),
                puts: AtomicUsize::new(0),
                deleted: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ObjectStore for TestStore {
        fn name(&self) -> &str {
            "test"
        }

        async fn put(
            &self,
            name: &str,
            bytes: &[u8],
            _options: &PutOptions,
            _credential: &Credential,
        ) -> Result<StoredObject> {
            self.puts.fetch_add(1, Ordering::SeqCst);
            let delay = if bytes.starts_with(b"slow") { 2000 } else { 100 };
            tokio::time::sleep(Duration::from_millis(delay)).await;

            if bytes.starts_with(b"fail") || !self.healthy.load(Ordering::SeqCst) {
                return Err(FlowError::transient("test", "bucket unavailable"));
            }
            Ok(StoredObject {
                url: format!("https://cdn.test/{}", name),
            })
        }

        async fn delete(&self, url: &str, _credential: &Credential) -> Result<()> {
            self.deleted.lock().unwrap().push(url.to_string());
            Ok(())
        }
    }

    fn coordinator(store: Arc<TestStore>) -> UploadCoordinator {
        let policy = RetryPolicy::new(2, Duration::from_secs(5))
            .with_base_delay(Duration::from_millis(10));
        UploadCoordinator::new(StorageFallbackWriter::new(
            store,
            policy,
            Duration::from_secs(1),
        ))
    }

    fn asset(handle: &str, bytes: &[u8]) -> RawAsset {
        RawAsset::new(handle, bytes.to_vec(), "image/jpeg")
    }

    fn cred() -> Credential {
        Credential::bearer("token").unwrap()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_every_record_settles(outcomes in prop::collection::vec(any::<bool>(), 1..8)) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .start_paused(true)
                .build()
                .unwrap();

            let (committed, failed, total) = runtime.block_on(async {
                let coordinator = coordinator(TestStore::new());
                let assets = outcomes
                    .iter()
                    .enumerate()
                    .map(|(i, ok)| {
                        let bytes: &[u8] = if *ok { b"ok" } else { b"fail" };
                        asset(&format!("photo-{}.jpg", i), bytes)
                    })
                    .collect();

                coordinator.submit_batch(assets, Some(&cred())).unwrap();
                let snapshot = coordinator.wait_quiescent().await;
                (snapshot.committed.len(), snapshot.failed().count(), snapshot.len())
            });

            let expected_ok = outcomes.iter().filter(|ok| **ok).count();
            prop_assert_eq!(committed + failed, outcomes.len());
            prop_assert_eq!(total, outcomes.len());
            prop_assert_eq!(committed, expected_ok);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_submission_rejected_while_uploading() {
        let coordinator = coordinator(TestStore::new());
        coordinator
            .submit_batch(vec![asset("a.jpg", b"slow"), asset("b.jpg", b"ok")], Some(&cred()))
            .unwrap();

        assert!(!coordinator.is_ready_to_submit());
        assert!(matches!(
            coordinator.submission_refs(),
            Err(FlowError::UploadsInFlight { count: 2 })
        ));

        coordinator.wait_quiescent().await;
        assert!(coordinator.is_ready_to_submit());
        assert_eq!(coordinator.submission_refs().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_committed_in_completion_order() {
        let coordinator = coordinator(TestStore::new());
        let ids = coordinator
            .submit_batch(vec![asset("slow.jpg", b"slow"), asset("fast.jpg", b"ok")], Some(&cred()))
            .unwrap();

        let snapshot = coordinator.wait_quiescent().await;
        let order: Vec<AssetId> = snapshot.committed.iter().map(|r| r.id.clone()).collect();
        assert_eq!(order, vec![ids[1].clone(), ids[0].clone()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_failed_record_leaves_siblings_alone() {
        let store = TestStore::new();
        store.healthy.store(false, Ordering::SeqCst);
        let coordinator = coordinator(store.clone());

        let ids = coordinator
            .submit_batch(vec![asset("a.jpg", b"ok"), asset("b.jpg", b"ok")], Some(&cred()))
            .unwrap();
        let snapshot = coordinator.wait_quiescent().await;
        assert_eq!(snapshot.failed().count(), 2);
        assert!(snapshot.outstanding[0].error.is_some());

        store.healthy.store(true, Ordering::SeqCst);
        coordinator.retry(&ids[0], Some(&cred())).unwrap();
        let snapshot = coordinator.wait_quiescent().await;

        assert_eq!(snapshot.committed.len(), 1);
        assert_eq!(snapshot.committed[0].id, ids[0]);
        assert_eq!(snapshot.committed[0].attempts, 2);
        assert_eq!(snapshot.outstanding[0].id, ids[1]);
        assert_eq!(snapshot.outstanding[0].status, AssetStatus::Failed);
        assert_eq!(snapshot.outstanding[0].attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_rejects_non_failed_records() {
        let coordinator = coordinator(TestStore::new());
        let ids = coordinator
            .submit_batch(vec![asset("a.jpg", b"ok")], Some(&cred()))
            .unwrap();

        assert!(matches!(
            coordinator.retry(&ids[0], Some(&cred())),
            Err(FlowError::InvalidTransition { .. })
        ));
        coordinator.wait_quiescent().await;
        assert!(matches!(
            coordinator.retry(&AssetId::from("missing"), Some(&cred())),
            Err(FlowError::UnknownAsset(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_in_flight_discards_late_completion() {
        let store = TestStore::new();
        let coordinator = coordinator(store.clone());
        let ids = coordinator
            .submit_batch(vec![asset("a.jpg", b"slow"), asset("b.jpg", b"ok")], Some(&cred()))
            .unwrap();

        let removed = coordinator.remove(&ids[0], Some(&cred())).await.unwrap();
        assert_eq!(removed.status, AssetStatus::Uploading);

        coordinator.wait_quiescent().await;
        tokio::time::sleep(Duration::from_secs(5)).await;

        let snapshot = coordinator.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.committed[0].id, ids[1]);
        // The orphaned object is cleaned up
        assert_eq!(store.deleted.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_committed_deletes_object() {
        let store = TestStore::new();
        let coordinator = coordinator(store.clone());
        let ids = coordinator
            .submit_batch(vec![asset("a.jpg", b"ok")], Some(&cred()))
            .unwrap();
        let snapshot = coordinator.wait_quiescent().await;
        let reference = snapshot.committed_refs()[0].clone();

        coordinator.remove(&ids[0], Some(&cred())).await.unwrap();

        assert!(coordinator.snapshot().is_empty());
        assert_eq!(*store.deleted.lock().unwrap(), vec![reference]);
    }

    #[tokio::test]
    async fn test_preconditions_abort_whole_batch() {
        let store = TestStore::new();
        let coordinator = coordinator(store.clone());

        let missing = coordinator.submit_batch(vec![asset("a.jpg", b"ok")], None);
        assert!(matches!(missing, Err(FlowError::Auth(_))));

        let empty = coordinator.submit_batch(Vec::new(), Some(&cred()));
        assert!(matches!(empty, Err(FlowError::Validation(_))));

        let blank = coordinator.submit_batch(
            vec![asset("a.jpg", b"ok"), asset("b.jpg", b"")],
            Some(&cred()),
        );
        match blank.unwrap_err() {
            FlowError::Validation(e) => assert_eq!(e.field, "assets[1]"),
            other => panic!("unexpected error: {other:?}"),
        }

        assert!(coordinator.snapshot().is_empty());
        assert_eq!(store.puts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_report_busy_then_quiescent() {
        let coordinator = coordinator(TestStore::new());
        let mut events = coordinator.subscribe();

        coordinator
            .submit_batch(vec![asset("a.jpg", b"ok")], Some(&cred()))
            .unwrap();
        coordinator.wait_quiescent().await;

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }

        assert!(matches!(
            seen.first(),
            Some(LedgerEvent::RecordChanged {
                status: AssetStatus::Uploading,
                ..
            })
        ));
        assert!(seen.contains(&LedgerEvent::Busy { in_flight: 1 }));
        assert_eq!(
            seen.last(),
            Some(&LedgerEvent::Quiescent {
                committed: 1,
                failed: 0
            })
        );
    }
}
