use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::Notification;
use crate::notifications::document_store::{DocumentStore, StorageError};
use crate::notifications::pagination::{LoadedRange, Page, Paginator};

/// Document key the full log is persisted under.
pub const NOTIFICATIONS_KEY: &str = "notifications";

const LOG_FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct PersistedLogRef<'a> {
    version: u32,
    /// Newest first.
    notifications: &'a VecDeque<Notification>,
}

#[derive(Deserialize)]
struct PersistedLog {
    version: u32,
    notifications: VecDeque<Notification>,
}

#[derive(Default)]
struct Inner {
    /// Newest first: index 0 is the most recent notification.
    log: VecDeque<Notification>,
    /// id → position counted from the oldest entry.
    positions: HashMap<Uuid, usize>,
    unread: usize,
    paginator: Paginator,
}

impl Inner {
    fn from_log(log: VecDeque<Notification>) -> Self {
        let len = log.len();
        let positions = log
            .iter()
            .enumerate()
            .map(|(index, n)| (n.id, len - 1 - index))
            .collect();
        let unread = log.iter().filter(|n| !n.read).count();
        Self {
            log,
            positions,
            unread,
            paginator: Paginator::default(),
        }
    }

    fn index_of_seq(&self, seq: usize) -> usize {
        self.log.len() - 1 - seq
    }

    fn seq_of_index(&self, index: usize) -> usize {
        self.log.len() - 1 - index
    }
}

/// Durable, newest-first notification log with chunked consumption.
///
/// Every mutation updates memory first and then writes the whole log through the
/// document store. A failed write is reported as `AppError::Storage`; the in-memory
/// state is still authoritative and [`NotificationStore::flush`] retries the write.
pub struct NotificationStore {
    documents: Arc<dyn DocumentStore>,
    page_size: usize,
    inner: RwLock<Inner>,
}

impl NotificationStore {
    /// Opens the store, restoring any log previously persisted under [`NOTIFICATIONS_KEY`].
    pub fn open(documents: Arc<dyn DocumentStore>, page_size: usize) -> Result<Self, AppError> {
        if page_size == 0 {
            return Err(AppError::Validation(
                "notification page size must be greater than zero".to_string(),
            ));
        }

        let log = match documents.get(NOTIFICATIONS_KEY)? {
            Some(raw) => {
                let persisted: PersistedLog =
                    serde_json::from_str(&raw).map_err(StorageError::from)?;
                if persisted.version != LOG_FORMAT_VERSION {
                    return Err(AppError::Validation(format!(
                        "unsupported notification log version {}",
                        persisted.version
                    )));
                }
                persisted.notifications
            }
            None => VecDeque::new(),
        };

        info!("Notification store opened with {} notifications", log.len());

        Ok(Self {
            documents,
            page_size,
            inner: RwLock::new(Inner::from_log(log)),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, inner: &Inner) -> Result<(), AppError> {
        let document = serde_json::to_string(&PersistedLogRef {
            version: LOG_FORMAT_VERSION,
            notifications: &inner.log,
        })
        .map_err(StorageError::from)?;

        self.documents
            .put(NOTIFICATIONS_KEY, &document)
            .map_err(|e| {
                warn!("Failed to persist notification log: {e}");
                AppError::Storage(e)
            })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Inserts at the head of the log and persists.
    pub fn append(&self, notification: Notification) -> Result<(), AppError> {
        self.append_batch(vec![notification])
    }

    /// Inserts several notifications with a single write of the log.
    ///
    /// The last element ends up newest. Ids are checked before anything is inserted,
    /// so a duplicate rejects the whole batch.
    pub fn append_batch(&self, batch: Vec<Notification>) -> Result<(), AppError> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut inner = self.write();

        let mut incoming = HashSet::with_capacity(batch.len());
        for notification in &batch {
            if inner.positions.contains_key(&notification.id) || !incoming.insert(notification.id) {
                return Err(AppError::Validation(format!(
                    "notification {} already exists",
                    notification.id
                )));
            }
        }

        debug!("Appending {} notifications", batch.len());
        for notification in batch {
            let seq = inner.log.len();
            inner.positions.insert(notification.id, seq);
            if !notification.read {
                inner.unread += 1;
            }
            inner.log.push_front(notification);
            inner.paginator.on_prepend();
        }

        self.persist(&inner)
    }

    /// Retries persisting the current in-memory log.
    pub fn flush(&self) -> Result<(), AppError> {
        let inner = self.read();
        self.persist(&inner)
    }

    /// Returns `[start, end)` of the full log (clamped to its length).
    ///
    /// Windows already covered by loaded ranges are served from the materialized view
    /// without touching the log; anything else is fetched, materialized and recorded.
    pub fn load_range(&self, start: usize, end: usize) -> Page {
        let mut inner = self.write();
        let total = inner.log.len();
        let end = end.min(total);

        if start >= end {
            return Page {
                items: Vec::new(),
                start,
                total,
                from_cache: true,
            };
        }

        if inner.paginator.covers(start, end) {
            let items: Vec<Notification> = (start..end)
                .filter_map(|index| {
                    let seq = inner.seq_of_index(index);
                    inner.paginator.displayed_at(seq).cloned()
                })
                .collect();
            if items.len() == end - start {
                return Page {
                    items,
                    start,
                    total,
                    from_cache: true,
                };
            }
            warn!("Loaded ranges claim [{start}, {end}) but the view is incomplete; refetching");
        }

        let items: Vec<Notification> = inner.log.range(start..end).cloned().collect();
        let materialized = items
            .iter()
            .enumerate()
            .map(|(offset, n)| (inner.seq_of_index(start + offset), n.clone()))
            .collect();
        inner
            .paginator
            .record(LoadedRange::new(start, end), materialized);

        debug!("Materialized notifications [{start}, {end}) of {total}");
        Page {
            items,
            start,
            total,
            from_cache: false,
        }
    }

    /// Loads the next `page_size` notifications after the furthest loaded window.
    pub fn load_next_chunk(&self) -> Page {
        let start = self.read().paginator.frontier();
        self.load_range(start, start + self.page_size)
    }

    pub fn mark_as_read(&self, id: Uuid) -> Result<(), AppError> {
        let mut inner = self.write();
        let seq = *inner
            .positions
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("notification '{id}'")))?;
        let index = inner.index_of_seq(seq);

        if inner.log[index].read {
            return Ok(());
        }
        inner.log[index].read = true;
        inner.unread -= 1;
        inner.paginator.mark_read(seq);

        self.persist(&inner)
    }

    pub fn mark_all_as_read(&self) -> Result<(), AppError> {
        let mut inner = self.write();
        if inner.unread == 0 {
            return Ok(());
        }
        for notification in inner.log.iter_mut() {
            notification.read = true;
        }
        inner.unread = 0;
        inner.paginator.mark_all_read();

        self.persist(&inner)
    }

    /// Unread notifications across the whole log, not just what has been paged in.
    pub fn unread_count(&self) -> usize {
        self.read().unread
    }

    /// Empties the log and the loaded ranges. Irreversible.
    pub fn clear(&self) -> Result<(), AppError> {
        let mut inner = self.write();
        let dropped = inner.log.len();
        inner.log.clear();
        inner.positions.clear();
        inner.unread = 0;
        inner.paginator.reset();
        info!("Cleared {dropped} notifications");

        self.persist(&inner)
    }

    /// Full log, newest first.
    pub fn all(&self) -> Vec<Notification> {
        self.read().log.iter().cloned().collect()
    }

    pub fn get(&self, id: Uuid) -> Option<Notification> {
        let inner = self.read();
        let seq = *inner.positions.get(&id)?;
        inner.log.get(inner.index_of_seq(seq)).cloned()
    }

    /// What the consumer has paged in so far, newest first.
    pub fn displayed(&self) -> Vec<Notification> {
        self.read().paginator.displayed()
    }

    pub fn loaded_ranges(&self) -> Vec<LoadedRange> {
        self.read().paginator.ranges().to_vec()
    }

    /// Number of `load_range` calls that had to fetch from the log.
    pub fn fetches(&self) -> u64 {
        self.read().paginator.fetches()
    }

    pub fn len(&self) -> usize {
        self.read().log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().log.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::document_store::{FileDocumentStore, InMemoryDocumentStore};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Document store whose writes can be switched off.
    #[derive(Default)]
    struct FlakyDocumentStore {
        inner: InMemoryDocumentStore,
        down: AtomicBool,
    }

    impl DocumentStore for FlakyDocumentStore {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get(key)
        }

        fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
            if self.down.load(Ordering::SeqCst) {
                return Err(StorageError::Unavailable("disk offline".to_string()));
            }
            self.inner.put(key, value)
        }
    }

    fn store(page_size: usize) -> NotificationStore {
        NotificationStore::open(Arc::new(InMemoryDocumentStore::new()), page_size).unwrap()
    }

    fn fill(store: &NotificationStore, count: usize) -> Vec<Uuid> {
        (0..count)
            .map(|i| {
                let n = Notification::info(format!("n{i}"), "body");
                let id = n.id;
                store.append(n).unwrap();
                id
            })
            .collect()
    }

    fn titles(items: &[Notification]) -> Vec<String> {
        items.iter().map(|n| n.title.clone()).collect()
    }

    #[test]
    fn test_append_is_newest_first() {
        let store = store(10);
        fill(&store, 3);
        assert_eq!(titles(&store.all()), vec!["n2", "n1", "n0"]);
        let timestamps: Vec<_> = store.all().iter().map(|n| n.timestamp).collect();
        assert!(timestamps.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let store = store(10);
        let n = Notification::info("once", "body");
        store.append(n.clone()).unwrap();
        assert!(matches!(store.append(n), Err(AppError::Validation(_))));
        assert_eq!(store.len(), 1);
    }

    /// Document store that counts writes.
    #[derive(Default)]
    struct CountingDocumentStore {
        inner: InMemoryDocumentStore,
        puts: AtomicUsize,
    }

    impl DocumentStore for CountingDocumentStore {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get(key)
        }

        fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
            self.puts.fetch_add(1, Ordering::SeqCst);
            self.inner.put(key, value)
        }
    }

    #[test]
    fn test_append_batch_writes_log_once() {
        let documents = Arc::new(CountingDocumentStore::default());
        let store = NotificationStore::open(documents.clone(), 10).unwrap();
        store.load_range(0, 1);

        let batch = (0..4).map(|i| Notification::info(format!("n{i}"), "body")).collect();
        store.append_batch(batch).unwrap();

        assert_eq!(documents.puts.load(Ordering::SeqCst), 1);
        assert_eq!(titles(&store.all()), vec!["n3", "n2", "n1", "n0"]);
        assert_eq!(store.unread_count(), 4);

        store.append_batch(Vec::new()).unwrap();
        assert_eq!(documents.puts.load(Ordering::SeqCst), 1);

        let restored = NotificationStore::open(documents, 10).unwrap();
        assert_eq!(titles(&restored.all()), vec!["n3", "n2", "n1", "n0"]);
    }

    #[test]
    fn test_append_batch_with_duplicate_inserts_nothing() {
        let store = store(10);
        let existing = Notification::info("existing", "body");
        store.append(existing.clone()).unwrap();

        let repeated = Notification::info("twice", "body");
        let batch = vec![repeated.clone(), Notification::info("other", "body"), repeated];
        assert!(matches!(store.append_batch(batch), Err(AppError::Validation(_))));

        let batch = vec![Notification::info("fresh", "body"), existing];
        assert!(matches!(store.append_batch(batch), Err(AppError::Validation(_))));

        assert_eq!(titles(&store.all()), vec!["existing"]);
        assert_eq!(store.unread_count(), 1);
    }

    #[test]
    fn test_load_range_returns_window_and_clamps() {
        let store = store(10);
        fill(&store, 5);
        let page = store.load_range(1, 3);
        assert_eq!(titles(&page.items), vec!["n3", "n2"]);
        assert!(!page.from_cache);
        assert_eq!(page.total, 5);

        let page = store.load_range(3, 100);
        assert_eq!(titles(&page.items), vec!["n1", "n0"]);
        assert!(!page.has_more());

        assert!(store.load_range(7, 9).items.is_empty());
    }

    #[test]
    fn test_covered_range_is_served_without_fetch() {
        let store = store(10);
        fill(&store, 6);
        store.load_range(0, 4);
        assert_eq!(store.fetches(), 1);

        let again = store.load_range(1, 3);
        assert!(again.from_cache);
        assert_eq!(titles(&again.items), vec!["n4", "n3"]);
        assert_eq!(store.fetches(), 1);
        assert_eq!(store.loaded_ranges(), vec![LoadedRange::new(0, 4)]);
    }

    #[test]
    fn test_overlapping_ranges_are_kept_separately() {
        let store = store(10);
        fill(&store, 8);
        store.load_range(0, 4);
        store.load_range(2, 6);
        assert_eq!(
            store.loaded_ranges(),
            vec![LoadedRange::new(0, 4), LoadedRange::new(2, 6)]
        );
        assert!(store.load_range(1, 6).from_cache);
        assert_eq!(store.displayed().len(), 6);
    }

    #[test]
    fn test_append_after_paging_shifts_windows() {
        let store = store(10);
        fill(&store, 3);
        store.load_range(0, 3);
        store.append(Notification::info("fresh", "body")).unwrap();

        assert_eq!(store.loaded_ranges(), vec![LoadedRange::new(1, 4)]);
        let cached = store.load_range(1, 4);
        assert!(cached.from_cache);
        assert_eq!(titles(&cached.items), vec!["n2", "n1", "n0"]);

        let head = store.load_range(0, 1);
        assert!(!head.from_cache);
        assert_eq!(titles(&head.items), vec!["fresh"]);
        assert_eq!(titles(&store.displayed()), vec!["fresh", "n2", "n1", "n0"]);
    }

    #[test]
    fn test_load_next_chunk_walks_the_log() {
        let store = store(2);
        fill(&store, 5);
        let first = store.load_next_chunk();
        assert_eq!(titles(&first.items), vec!["n4", "n3"]);
        let second = store.load_next_chunk();
        assert_eq!(titles(&second.items), vec!["n2", "n1"]);
        let third = store.load_next_chunk();
        assert_eq!(titles(&third.items), vec!["n0"]);
        assert!(!third.has_more());
        assert!(store.load_next_chunk().items.is_empty());
    }

    #[test]
    fn test_unread_count_spans_whole_log() {
        let store = store(2);
        let ids = fill(&store, 5);
        store.load_next_chunk();
        assert_eq!(store.displayed().len(), 2);
        assert_eq!(store.unread_count(), 5);

        // Mark one outside the displayed window.
        store.mark_as_read(ids[0]).unwrap();
        assert_eq!(store.unread_count(), 4);
        assert_eq!(
            store.all().iter().filter(|n| !n.read).count(),
            store.unread_count()
        );
    }

    #[test]
    fn test_mark_as_read_is_one_way_and_keeps_order() {
        let store = store(10);
        let ids = fill(&store, 3);
        store.load_range(0, 3);
        store.mark_as_read(ids[1]).unwrap();
        store.mark_as_read(ids[1]).unwrap();
        assert_eq!(store.unread_count(), 2);
        assert!(store.get(ids[1]).unwrap().read);
        assert_eq!(titles(&store.all()), vec!["n2", "n1", "n0"]);

        let shown = store.load_range(0, 3);
        assert!(shown.from_cache);
        assert!(shown.items[1].read);

        store.mark_all_as_read().unwrap();
        store.mark_all_as_read().unwrap();
        assert_eq!(store.unread_count(), 0);
        assert!(store.all().iter().all(|n| n.read));
        assert!(store.displayed().iter().all(|n| n.read));
    }

    #[test]
    fn test_mark_unknown_is_not_found() {
        let store = store(10);
        assert!(store.mark_as_read(Uuid::new_v4()).unwrap_err().is_not_found());
    }

    #[test]
    fn test_clear_empties_log_and_ranges() {
        let store = store(10);
        fill(&store, 3);
        store.load_range(0, 2);
        store.clear().unwrap();
        assert!(store.is_empty());
        assert!(store.loaded_ranges().is_empty());
        assert!(store.displayed().is_empty());
        assert_eq!(store.unread_count(), 0);
    }

    #[test]
    fn test_log_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let ids = {
            let store =
                NotificationStore::open(Arc::new(FileDocumentStore::new(dir.path())), 10).unwrap();
            let ids = fill(&store, 3);
            store.mark_as_read(ids[2]).unwrap();
            ids
        };

        let reopened =
            NotificationStore::open(Arc::new(FileDocumentStore::new(dir.path())), 10).unwrap();
        assert_eq!(titles(&reopened.all()), vec!["n2", "n1", "n0"]);
        assert_eq!(reopened.unread_count(), 2);
        assert!(reopened.get(ids[2]).unwrap().read);
        assert!(reopened.loaded_ranges().is_empty());
    }

    #[test]
    fn test_failed_write_keeps_memory_and_flush_retries() {
        let documents = Arc::new(FlakyDocumentStore::default());
        let store = NotificationStore::open(documents.clone(), 10).unwrap();
        fill(&store, 1);

        documents.down.store(true, Ordering::SeqCst);
        let err = store.append(Notification::error("Sync", "failed")).unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));
        assert_eq!(store.len(), 2);
        assert_eq!(store.unread_count(), 2);

        documents.down.store(false, Ordering::SeqCst);
        store.flush().unwrap();
        let reopened = NotificationStore::open(documents, 10).unwrap();
        assert_eq!(reopened.len(), 2);
    }

    #[test]
    fn test_zero_page_size_is_rejected() {
        let result = NotificationStore::open(Arc::new(InMemoryDocumentStore::new()), 0);
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
