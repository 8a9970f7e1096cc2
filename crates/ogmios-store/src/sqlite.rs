//! SQLite implementation of [`CheckpointStore`].
//!
//! Points are stored as deterministic CBOR next to a few indexed columns used
//! for de-duplication and pruning. rusqlite runs with bundled SQLite, wrapped
//! in async via `tokio::task::spawn_blocking`.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, Transaction};
use tracing::{debug, trace};

use ogmios_core::{sort_points, Point};

use crate::error::{Result, StoreError};
use crate::memory::DEFAULT_CAPACITY;
use crate::migration::{self, now_millis};
use crate::traits::CheckpointStore;

const KIND_MARKER: i64 = 1;
const KIND_STRUCT: i64 = 2;

/// SQLite-based checkpoint store.
///
/// Thread-safe via internal Mutex. Keeps at most `retain` points, dropping
/// the oldest on save.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    retain: usize,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            retain: DEFAULT_CAPACITY,
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            retain: DEFAULT_CAPACITY,
        })
    }

    /// Keep at most `retain` points.
    pub fn with_retain(mut self, retain: usize) -> Self {
        self.retain = retain.max(1);
        self
    }

    /// Run `f` against the connection on the blocking pool.
    async fn run_blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::LockPoisoned(format!("sqlite connection: {e}")))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

/// A point as stored: its `(kind, slot, key)` primary key plus the CBOR blob.
struct Row {
    kind: i64,
    slot: i64,
    key: String,
    blob: Vec<u8>,
}

impl Row {
    fn of(point: &Point) -> Result<Self> {
        let blob = point.to_cbor()?;
        match point {
            Point::Marker(s) => Ok(Self {
                kind: KIND_MARKER,
                slot: 0,
                key: s.clone(),
                blob,
            }),
            Point::Struct(p) => {
                let slot = i64::try_from(p.slot).map_err(|_| {
                    StoreError::Serialization(format!("slot {} does not fit the schema", p.slot))
                })?;
                Ok(Self {
                    kind: KIND_STRUCT,
                    slot,
                    key: p.id.clone(),
                    blob,
                })
            }
        }
    }

    /// Upsert the row, then prune to the newest `retain` rows.
    fn insert(&self, tx: &Transaction<'_>, retain: usize) -> Result<()> {
        tx.execute(
            "INSERT OR REPLACE INTO checkpoints (kind, slot, key, point, saved_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![self.kind, self.slot, self.key, self.blob, now_millis()],
        )?;
        tx.execute(
            "DELETE FROM checkpoints WHERE rowid NOT IN (
                 SELECT rowid FROM checkpoints ORDER BY kind DESC, slot DESC LIMIT ?1
             )",
            params![retain as i64],
        )?;
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for SqliteStore {
    async fn load(&self) -> Result<Vec<Point>> {
        let retain = self.retain;
        let blobs: Vec<Vec<u8>> = self
            .run_blocking(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT point FROM checkpoints
                     ORDER BY kind DESC, slot DESC
                     LIMIT ?1",
                )?;
                let rows = stmt
                    .query_map(params![retain as i64], |row| row.get(0))?
                    .collect::<rusqlite::Result<Vec<Vec<u8>>>>()?;
                Ok(rows)
            })
            .await?;

        let mut points = Vec::with_capacity(blobs.len());
        for blob in &blobs {
            if let Some(point) = Point::from_cbor(blob)? {
                points.push(point);
            }
        }
        sort_points(&mut points);
        Ok(points)
    }

    async fn save(&self, point: &Point) -> Result<()> {
        let row = Row::of(point)?;
        let retain = self.retain;
        trace!(point = %point, "saving checkpoint");

        self.run_blocking(move |conn| {
            let tx = conn.transaction()?;
            row.insert(&tx, retain)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn rollback(&self, point: &Point) -> Result<()> {
        let row = Row::of(point)?;
        let retain = self.retain;
        trace!(point = %point, "rolling back checkpoints");

        self.run_blocking(move |conn| {
            let tx = conn.transaction()?;
            let dropped = if row.kind == KIND_MARKER {
                tx.execute(
                    "DELETE FROM checkpoints WHERE kind = ?1",
                    params![KIND_STRUCT],
                )?
            } else {
                tx.execute(
                    "DELETE FROM checkpoints
                     WHERE kind = ?1 AND (slot > ?2 OR (slot = ?2 AND key != ?3))",
                    params![KIND_STRUCT, row.slot, row.key],
                )?
            };
            row.insert(&tx, retain)?;
            tx.commit()?;
            debug!(dropped, "discarded orphaned checkpoints");
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ogmios_core::PointStruct;

    fn at(slot: u64) -> Point {
        PointStruct::new(slot, format!("{slot:04x}")).point()
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let store = SqliteStore::open_memory().unwrap();
        assert!(store.load().await.unwrap().is_empty());

        store.save(&at(100)).await.unwrap();
        store.save(&at(300)).await.unwrap();
        store.save(&Point::origin()).await.unwrap();
        store.save(&at(200)).await.unwrap();

        assert_eq!(
            store.load().await.unwrap(),
            vec![at(300), at(200), at(100), Point::origin()]
        );
    }

    #[tokio::test]
    async fn test_save_idempotent_keeps_latest_height() {
        let store = SqliteStore::open_memory().unwrap();
        store.save(&at(7)).await.unwrap();
        store
            .save(&PointStruct::new(7, "0007").with_height(3).point())
            .await
            .unwrap();

        let points = store.load().await.unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].as_struct().unwrap().height, Some(3));
    }

    #[tokio::test]
    async fn test_retain_prunes_oldest() {
        let store = SqliteStore::open_memory().unwrap().with_retain(3);
        for slot in 1..=6 {
            store.save(&at(slot)).await.unwrap();
        }
        assert_eq!(store.load().await.unwrap(), vec![at(6), at(5), at(4)]);
    }

    #[tokio::test]
    async fn test_rollback_discards_orphans() {
        let store = SqliteStore::open_memory().unwrap();
        for slot in 101..=105 {
            store.save(&at(slot)).await.unwrap();
        }
        store.save(&Point::origin()).await.unwrap();
        store
            .save(&PointStruct::new(100, "beef").point())
            .await
            .unwrap();

        store.rollback(&at(100)).await.unwrap();
        assert_eq!(store.load().await.unwrap(), vec![at(100), Point::origin()]);

        store.rollback(&Point::origin()).await.unwrap();
        assert_eq!(store.load().await.unwrap(), vec![Point::origin()]);
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoints.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.save(&at(42)).await.unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.load().await.unwrap(), vec![at(42)]);
    }

    #[tokio::test]
    async fn test_slot_out_of_range() {
        let store = SqliteStore::open_memory().unwrap();
        let err = store
            .save(&PointStruct::new(u64::MAX, "ff").point())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
    }
}
