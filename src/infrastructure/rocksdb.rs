use crate::domain::ports::PreorderStore;
use crate::domain::preorder::{NewPreorder, Preorder, PreorderId, PreorderStatus};
use crate::error::{ReservationError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::error;

/// Column Family for storing preorder records.
pub const CF_PREORDERS: &str = "preorders";

const LOCK_STRIPES: usize = 64;

/// A persistent preorder store implementation using RocksDB.
///
/// Records are JSON-encoded and keyed by the raw 16 bytes of their id. Writes to one
/// record are serialized by a striped lock chosen from the id, so a guarded
/// transition is a read-check-write that no other writer of that record can
/// interleave with, while unrelated records proceed in parallel.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBPreorderStore {
    db: Arc<DB>,
    locks: Arc<[Mutex<()>]>,
}

impl RocksDBPreorderStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the "preorders" column family exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_preorders = ColumnFamilyDescriptor::new(CF_PREORDERS, Options::default());
        let db = DB::open_cf_descriptors(&opts, path, vec![cf_preorders])?;
        let locks = (0..LOCK_STRIPES).map(|_| Mutex::new(())).collect();

        Ok(Self {
            db: Arc::new(db),
            locks,
        })
    }

    fn cf(&self) -> Result<&ColumnFamily> {
        self.db.cf_handle(CF_PREORDERS).ok_or_else(|| {
            ReservationError::PersistenceFailure("preorders column family not found".to_string())
        })
    }

    fn stripe(&self, id: PreorderId) -> &Mutex<()> {
        let bytes = id.as_bytes();
        &self.locks[bytes[bytes.len() - 1] as usize % self.locks.len()]
    }

    fn read(&self, id: PreorderId) -> Result<Option<Preorder>> {
        let cf = self.cf()?;
        match self.db.get_cf(cf, id.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn write(&self, preorder: &Preorder) -> Result<()> {
        let cf = self.cf()?;
        let value = serde_json::to_vec(preorder).map_err(|e| {
            ReservationError::PersistenceFailure(format!("serialization error: {e}"))
        })?;
        self.db.put_cf(cf, preorder.id.as_bytes(), value)?;
        Ok(())
    }

    /// Undecodable records are logged and skipped so one bad row cannot stall a sweep.
    fn scan(&self, mut keep: impl FnMut(&Preorder) -> bool) -> Result<Vec<Preorder>> {
        let cf = self.cf()?;
        let mut out = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, value) = item?;
            let preorder = match decode(&value) {
                Ok(preorder) => preorder,
                Err(err) => {
                    error!(key = ?key, error = %err, "skipping unreadable preorder record");
                    continue;
                }
            };
            if keep(&preorder) {
                out.push(preorder);
            }
        }
        Ok(out)
    }
}

fn decode(bytes: &[u8]) -> Result<Preorder> {
    serde_json::from_slice(bytes)
        .map_err(|e| ReservationError::PersistenceFailure(format!("deserialization error: {e}")))
}

#[async_trait]
impl PreorderStore for RocksDBPreorderStore {
    async fn create(&self, preorder: NewPreorder) -> Result<PreorderId> {
        let id = PreorderId::new_v4();
        let _guard = self.stripe(id).lock().await;
        if self.read(id)?.is_some() {
            return Err(ReservationError::Conflict(format!(
                "preorder id {id} already allocated"
            )));
        }
        self.write(&Preorder::activate(id, preorder))?;
        Ok(id)
    }

    async fn transition(
        &self,
        id: PreorderId,
        from: PreorderStatus,
        to: PreorderStatus,
    ) -> Result<Preorder> {
        let _guard = self.stripe(id).lock().await;
        let mut preorder = self
            .read(id)?
            .ok_or_else(|| ReservationError::NotFound(format!("preorder {id}")))?;
        preorder.transition(from, to)?;
        self.write(&preorder)?;
        Ok(preorder)
    }

    async fn get(&self, id: PreorderId) -> Result<Option<Preorder>> {
        self.read(id)
    }

    async fn list_expired_active(&self, as_of: DateTime<Utc>) -> Result<Vec<Preorder>> {
        self.scan(|p| p.status == PreorderStatus::Active && p.is_expired_at(as_of))
    }

    async fn list_active(&self) -> Result<Vec<Preorder>> {
        self.scan(|p| p.status == PreorderStatus::Active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::SegmentRef;
    use crate::domain::inventory::{InventoryKey, Quantity, SeatClass};
    use chrono::{Duration, NaiveDate};
    use tempfile::tempdir;

    fn new_preorder(expires_in: Duration) -> NewPreorder {
        let now = Utc::now();
        NewPreorder {
            requester: "alice".to_string(),
            key: InventoryKey::new(
                SegmentRef {
                    train_no: "D5".to_string(),
                    date: NaiveDate::from_ymd_opt(2025, 10, 1).unwrap(),
                    from: "BJP".to_string(),
                    to: "SHH".to_string(),
                },
                SeatClass::new("second").unwrap(),
            ),
            quantity: Quantity::ONE,
            created_at: now,
            expires_at: now + expires_in,
        }
    }

    #[tokio::test]
    async fn test_rocksdb_open_cf() {
        let dir = tempdir().unwrap();
        let store = RocksDBPreorderStore::open(dir.path()).expect("Failed to open RocksDB");
        assert!(store.db.cf_handle(CF_PREORDERS).is_some());
    }

    #[tokio::test]
    async fn test_rocksdb_preorder_round_trip() {
        let dir = tempdir().unwrap();
        let store = RocksDBPreorderStore::open(dir.path()).unwrap();

        let new = new_preorder(Duration::minutes(15));
        let id = store.create(new.clone()).await.unwrap();

        let stored = store.get(id).await.unwrap().unwrap();
        assert_eq!(stored, Preorder::activate(id, new));
        assert_eq!(store.list_active().await.unwrap().len(), 1);

        assert!(store.get(PreorderId::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rocksdb_guarded_transition() {
        let dir = tempdir().unwrap();
        let store = RocksDBPreorderStore::open(dir.path()).unwrap();
        let id = store.create(new_preorder(Duration::zero())).await.unwrap();

        let expired = store.list_expired_active(Utc::now()).await.unwrap();
        assert_eq!(expired.len(), 1);

        store
            .transition(id, PreorderStatus::Active, PreorderStatus::Expired)
            .await
            .unwrap();
        let lost = store
            .transition(id, PreorderStatus::Active, PreorderStatus::Canceled)
            .await;
        assert!(matches!(lost, Err(ReservationError::Conflict(_))));
        assert_eq!(
            store.get(id).await.unwrap().unwrap().status,
            PreorderStatus::Expired
        );
        assert!(store.list_expired_active(Utc::now()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rocksdb_scan_skips_corrupt_records() {
        let dir = tempdir().unwrap();
        let store = RocksDBPreorderStore::open(dir.path()).unwrap();
        let id = store.create(new_preorder(Duration::zero())).await.unwrap();

        let corrupt = PreorderId::new_v4();
        store
            .db
            .put_cf(store.cf().unwrap(), corrupt.as_bytes(), b"not json")
            .unwrap();

        let expired = store.list_expired_active(Utc::now()).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, id);
        assert_eq!(store.list_active().await.unwrap().len(), 1);
        assert!(matches!(
            store.get(corrupt).await,
            Err(ReservationError::PersistenceFailure(_))
        ));
    }

    #[tokio::test]
    async fn test_rocksdb_survives_reopen() {
        let dir = tempdir().unwrap();
        let id = {
            let store = RocksDBPreorderStore::open(dir.path()).unwrap();
            store
                .create(new_preorder(Duration::minutes(15)))
                .await
                .unwrap()
        };

        let reopened = RocksDBPreorderStore::open(dir.path()).unwrap();
        let stored = reopened.get(id).await.unwrap().unwrap();
        assert_eq!(stored.status, PreorderStatus::Active);
    }
}
