use crate::error::{DiagnosticHook, NetlogError};
use crate::model::{LogEntry, LogSummary, ResponseData};
use crate::persist::EntryStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::warn;

/// Capacity of the observer broadcast channel; a slow subscriber lags
/// rather than blocking ingestion
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Disk work queued behind the store's single persistence task, so unit
/// writes, deletes, and bulk clears never reorder against each other
enum PersistCommand {
    Save(LogEntry),
    /// Save, then broadcast the response notification once the write
    /// attempt has completed
    SaveThenNotify(LogEntry),
    Remove(String),
    RemoveAll,
}

async fn run_persistence(
    store: Arc<EntryStore>,
    events: broadcast::Sender<LogEvent>,
    diagnostics: Option<DiagnosticHook>,
    mut rx: mpsc::UnboundedReceiver<PersistCommand>,
) {
    let report = |error: NetlogError| {
        warn!(error = %error, "entry persistence failed");
        if let Some(hook) = &diagnostics {
            hook(&error);
        }
    };

    while let Some(command) = rx.recv().await {
        match command {
            PersistCommand::Save(entry) => {
                if let Err(e) = store.save(&entry).await {
                    report(e);
                }
            }
            PersistCommand::SaveThenNotify(entry) => {
                if let Err(e) = store.save(&entry).await {
                    report(e);
                }
                let _ = events.send(LogEvent {
                    id: entry.id,
                    is_response_update: true,
                });
            }
            PersistCommand::Remove(id) => {
                if let Err(e) = store.remove_entry(&id).await {
                    report(e);
                }
            }
            PersistCommand::RemoveAll => {
                if let Err(e) = store.remove_all().await {
                    report(e);
                }
            }
        }
    }
}

/// Change notification delivered to subscribers after a store mutation
/// settles
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub id: String,
    pub is_response_update: bool,
}

/// Guarded under one writer-exclusive lock: readers snapshot in parallel,
/// every mutation runs alone.
#[derive(Default)]
struct StoreInner {
    /// Identifiers in first-insertion (request) order, oldest first
    ids: Vec<String>,
    /// Full captured entries, kept so a later response can be merged
    /// without a disk round-trip
    entries: HashMap<String, LogEntry>,
    /// Presentation projections, updated in place on every entry change
    summaries: HashMap<String, LogSummary>,
}

/// Authoritative in-memory index of captured network calls, safe under
/// concurrent insert, update, delete, and snapshot-read.
///
/// Presentation indices are newest-first while the internal sequence is
/// oldest-first; `summary_at` and `remove_at` translate external position
/// `p` to internal index `len - 1 - p`.
pub struct LogStore {
    inner: Arc<RwLock<StoreInner>>,
    persist_tx: Option<mpsc::UnboundedSender<PersistCommand>>,
    events: broadcast::Sender<LogEvent>,
}

impl LogStore {
    /// Create a store; entries are mirrored to `persistence` when given.
    /// Must be called from within a tokio runtime (the persistence queue
    /// runs on a spawned task).
    pub fn new(persistence: Option<Arc<EntryStore>>) -> Self {
        Self::with_diagnostics(persistence, None)
    }

    /// Like [`LogStore::new`], with a hook observing swallowed
    /// persistence failures
    pub fn with_diagnostics(
        persistence: Option<Arc<EntryStore>>,
        diagnostics: Option<DiagnosticHook>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let persist_tx = persistence.map(|store| {
            let (tx, rx) = mpsc::unbounded_channel();
            tokio::spawn(run_persistence(store, events.clone(), diagnostics, rx));
            tx
        });
        Self {
            inner: Arc::new(RwLock::new(StoreInner::default())),
            persist_tx,
            events,
        }
    }

    /// Subscribe to change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<LogEvent> {
        self.events.subscribe()
    }

    /// Index a request-start event: the identifier is appended to the
    /// sequence (first insertion only) and its summary upserted.
    ///
    /// Persistence is enqueued without waiting for the disk write; the
    /// change notification fires as soon as the in-memory mutation
    /// completes.
    pub async fn record_request_start(&self, entry: LogEntry) {
        let id = entry.id.clone();
        {
            let mut inner = self.inner.write().await;
            if !inner.entries.contains_key(&id) {
                inner.ids.push(id.clone());
            }
            inner.summaries.insert(id.clone(), LogSummary::from_entry(&entry));
            inner.entries.insert(id.clone(), entry.clone());
        }

        if let Some(tx) = &self.persist_tx {
            let _ = tx.send(PersistCommand::Save(entry));
        }

        let _ = self.events.send(LogEvent {
            id,
            is_response_update: false,
        });
    }

    /// Merge a response into an existing entry, updating its summary's
    /// status, duration, and state in place. The sequence is never touched.
    ///
    /// A response for an identifier never seen as a request-start is
    /// ignored: no summary is synthesized, no event fires. Returns the
    /// updated entry for downstream handlers, or None for an unknown
    /// identifier.
    ///
    /// The change notification fires only after the persisted rewrite of
    /// the unit completes, unlike request-start.
    pub async fn record_response(&self, id: &str, response: ResponseData) -> Option<LogEntry> {
        let updated = {
            let mut inner = self.inner.write().await;
            let Some(entry) = inner.entries.get_mut(id) else {
                warn!(id, "response for unknown identifier ignored");
                return None;
            };
            entry.apply_response(response.clone());
            let entry = entry.clone();
            if let Some(summary) = inner.summaries.get_mut(id) {
                summary.apply_response(&response);
            }
            entry
        };

        match &self.persist_tx {
            Some(tx) => {
                let _ = tx.send(PersistCommand::SaveThenNotify(updated.clone()));
            }
            None => {
                let _ = self.events.send(LogEvent {
                    id: updated.id.clone(),
                    is_response_update: true,
                });
            }
        }

        Some(updated)
    }

    /// Remove the entry at an external (newest-first) position, deleting
    /// its persisted unit as well. An out-of-range position is a no-op;
    /// returns the removed identifier when one existed.
    pub async fn remove_at(&self, external_index: usize) -> Option<String> {
        let id = {
            let mut inner = self.inner.write().await;
            let len = inner.ids.len();
            if external_index >= len {
                return None;
            }
            let id = inner.ids.remove(len - 1 - external_index);
            inner.entries.remove(&id);
            inner.summaries.remove(&id);
            id
        };

        if let Some(tx) = &self.persist_tx {
            let _ = tx.send(PersistCommand::Remove(id.clone()));
        }

        Some(id)
    }

    /// Empty the sequence and mapping atomically, then delete the
    /// persisted-entries directory. Readers never observe a partial clear.
    pub async fn clear(&self) {
        {
            let mut inner = self.inner.write().await;
            inner.ids.clear();
            inner.entries.clear();
            inner.summaries.clear();
        }

        if let Some(tx) = &self.persist_tx {
            let _ = tx.send(PersistCommand::RemoveAll);
        }
    }

    /// Copy of the identifier sequence, oldest first
    pub async fn snapshot_ids(&self) -> Vec<String> {
        self.inner.read().await.ids.clone()
    }

    /// Copy of the identifier → summary mapping
    pub async fn snapshot_summaries(&self) -> HashMap<String, LogSummary> {
        self.inner.read().await.summaries.clone()
    }

    /// Summary at an external (newest-first) position
    pub async fn summary_at(&self, external_index: usize) -> Option<LogSummary> {
        let inner = self.inner.read().await;
        let len = inner.ids.len();
        if external_index >= len {
            return None;
        }
        let id = &inner.ids[len - 1 - external_index];
        inner.summaries.get(id).cloned()
    }

    /// Full captured entry for an identifier
    pub async fn entry(&self, id: &str) -> Option<LogEntry> {
        self.inner.read().await.entries.get(id).cloned()
    }

    /// Number of indexed entries
    pub async fn len(&self) -> usize {
        self.inner.read().await.ids.len()
    }

    /// Whether the store holds no entries
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LifecycleState, RequestInfo};
    use chrono::Utc;
    use tempfile::TempDir;

    fn request(url: &str) -> RequestInfo {
        RequestInfo {
            url: url.to_string(),
            method: "GET".to_string(),
            headers: HashMap::new(),
            body: None,
        }
    }

    fn entry(id: &str) -> LogEntry {
        LogEntry::started(id, request("https://example.com/x"))
    }

    fn response(status: u16) -> ResponseData {
        ResponseData {
            status_code: Some(status),
            headers: HashMap::new(),
            body: None,
            error: None,
            end_time: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_request_starts_preserve_insertion_order() {
        let store = LogStore::new(None);
        for i in 0..5 {
            store.record_request_start(entry(&format!("req-{}", i))).await;
        }

        let ids = store.snapshot_ids().await;
        assert_eq!(ids, vec!["req-0", "req-1", "req-2", "req-3", "req-4"]);
    }

    #[tokio::test]
    async fn test_external_index_zero_is_newest() {
        let store = LogStore::new(None);
        store.record_request_start(entry("old")).await;
        store.record_request_start(entry("new")).await;

        assert_eq!(store.summary_at(0).await.unwrap().id, "new");
        assert_eq!(store.summary_at(1).await.unwrap().id, "old");
        assert!(store.summary_at(2).await.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_request_start_keeps_sequence_stable() {
        let store = LogStore::new(None);
        store.record_request_start(entry("a")).await;
        store.record_request_start(entry("a")).await;

        assert_eq!(store.snapshot_ids().await, vec!["a"]);
        assert_eq!(store.snapshot_summaries().await.len(), 1);
    }

    #[tokio::test]
    async fn test_response_updates_summary_in_place() {
        let store = LogStore::new(None);
        store.record_request_start(entry("a")).await;
        store.record_request_start(entry("b")).await;

        let updated = store.record_response("a", response(503)).await;
        assert!(updated.is_some());

        // Sequence untouched
        assert_eq!(store.snapshot_ids().await, vec!["a", "b"]);

        let summaries = store.snapshot_summaries().await;
        assert_eq!(summaries["a"].status_code, Some(503));
        assert_eq!(summaries["a"].state, LifecycleState::Completed);
        assert!(summaries["a"].duration.is_some());
        // The other entry is untouched
        assert_eq!(summaries["b"].state, LifecycleState::Pending);
        assert!(summaries["b"].status_code.is_none());
    }

    #[tokio::test]
    async fn test_response_for_unknown_identifier_is_ignored() {
        let store = LogStore::new(None);
        store.record_request_start(entry("a")).await;

        let updated = store.record_response("ghost", response(200)).await;
        assert!(updated.is_none());
        assert_eq!(store.snapshot_ids().await.len(), 1);
        assert_eq!(store.snapshot_summaries().await.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_at_valid_and_invalid_index() {
        let store = LogStore::new(None);
        store.record_request_start(entry("a")).await;
        store.record_request_start(entry("b")).await;
        store.record_request_start(entry("c")).await;

        // External index 0 is the newest entry, "c"
        assert_eq!(store.remove_at(0).await.as_deref(), Some("c"));
        assert_eq!(store.snapshot_ids().await, vec!["a", "b"]);
        assert!(store.snapshot_summaries().await.get("c").is_none());

        // Out of range is a no-op
        assert!(store.remove_at(5).await.is_none());
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_remove_at_deletes_persisted_unit() {
        let temp_dir = TempDir::new().unwrap();
        let persistence = Arc::new(EntryStore::new(temp_dir.path().join("entries")));
        let store = LogStore::new(Some(Arc::clone(&persistence)));

        store.record_request_start(entry("a")).await;
        // Persistence is fire-and-forget; give the spawned task a beat
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        assert!(persistence.contains("a").await);

        store.remove_at(0).await;
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        assert!(!persistence.contains("a").await);
    }

    #[tokio::test]
    async fn test_clear_empties_store_and_persisted_directory() {
        let temp_dir = TempDir::new().unwrap();
        let persistence = Arc::new(EntryStore::new(temp_dir.path().join("entries")));
        let store = LogStore::new(Some(Arc::clone(&persistence)));

        store.record_request_start(entry("a")).await;
        store.record_request_start(entry("b")).await;
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        store.clear().await;
        assert!(store.is_empty().await);
        assert!(store.snapshot_summaries().await.is_empty());

        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        assert!(!persistence.directory().exists());
    }

    #[tokio::test]
    async fn test_request_event_fires_without_waiting_on_disk() {
        let store = LogStore::new(None);
        let mut events = store.subscribe();

        store.record_request_start(entry("a")).await;

        let event = events.recv().await.unwrap();
        assert_eq!(event.id, "a");
        assert!(!event.is_response_update);
    }

    #[tokio::test]
    async fn test_response_event_fires_after_persistence() {
        let temp_dir = TempDir::new().unwrap();
        let persistence = Arc::new(EntryStore::new(temp_dir.path().join("entries")));
        let store = LogStore::new(Some(Arc::clone(&persistence)));
        let mut events = store.subscribe();

        store.record_request_start(entry("a")).await;
        let _ = events.recv().await.unwrap();

        store.record_response("a", response(200)).await;
        let event = events.recv().await.unwrap();
        assert!(event.is_response_update);

        // By the time the response event arrives, the finalized unit is on
        // disk.
        let unit = persistence.load("a").await.unwrap();
        assert_eq!(unit.response.unwrap().status_code, Some(200));
    }

    #[tokio::test]
    async fn test_concurrent_disjoint_ingestion_loses_nothing() {
        let store = Arc::new(LogStore::new(None));

        let mut handles = Vec::new();
        for task in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                for i in 0..50 {
                    let id = format!("t{}-{}", task, i);
                    store
                        .record_request_start(entry(&id))
                        .await;
                    store.record_response(&id, response(200)).await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let ids = store.snapshot_ids().await;
        let summaries = store.snapshot_summaries().await;
        assert_eq!(ids.len(), 400);
        assert_eq!(summaries.len(), 400);
        for id in &ids {
            assert_eq!(summaries[id].status_code, Some(200));
            assert_eq!(summaries[id].state, LifecycleState::Completed);
        }
    }
}
