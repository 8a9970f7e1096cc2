//! In-memory checkpoint store.
//!
//! Keeps the most recent points in a bounded, de-duplicated list. Nothing
//! survives the process; use [`SqliteStore`](crate::SqliteStore) for that.

use std::sync::{RwLock, RwLockWriteGuard};

use async_trait::async_trait;
use ogmios_core::{sort_points, Point};

use crate::error::{Result, StoreError};
use crate::traits::CheckpointStore;

/// Points retained when no capacity is given.
pub const DEFAULT_CAPACITY: usize = 10;

/// In-memory store implementation. Thread-safe via RwLock.
pub struct MemoryStore {
    points: RwLock<Vec<Point>>,
    capacity: usize,
}

impl MemoryStore {
    /// Create an empty store holding up to [`DEFAULT_CAPACITY`] points.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: RwLock::new(Vec::new()),
            capacity: capacity.max(1),
        }
    }

    /// A store pre-seeded with `points`. Capacity grows to fit them.
    pub fn with_points(points: impl IntoIterator<Item = Point>) -> Self {
        let mut points: Vec<Point> = points.into_iter().collect();
        sort_points(&mut points);
        points.dedup();
        let capacity = points.len().max(DEFAULT_CAPACITY);
        Self {
            points: RwLock::new(points),
            capacity,
        }
    }

    /// Snapshot of the stored points, most recent first.
    pub fn points(&self) -> Result<Vec<Point>> {
        self.points
            .read()
            .map(|p| p.clone())
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<Point>>> {
        self.points
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    fn insert(&self, points: &mut Vec<Point>, point: &Point) {
        // Replace an equal entry so a later height wins.
        points.retain(|p| p != point);
        points.push(point.clone());
        sort_points(points);
        points.truncate(self.capacity);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CheckpointStore for MemoryStore {
    async fn load(&self) -> Result<Vec<Point>> {
        self.points()
    }

    async fn save(&self, point: &Point) -> Result<()> {
        let mut points = self.write()?;
        self.insert(&mut points, point);
        Ok(())
    }

    async fn rollback(&self, point: &Point) -> Result<()> {
        let mut points = self.write()?;
        points.retain(|p| !p.orphaned_by(point));
        self.insert(&mut points, point);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ogmios_core::PointStruct;

    fn at(slot: u64) -> Point {
        PointStruct::new(slot, format!("{slot:02x}")).point()
    }

    #[tokio::test]
    async fn test_memory_store_empty() {
        let store = MemoryStore::new();
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_store_most_recent_first() {
        let store = MemoryStore::new();
        store.save(&at(10)).await.unwrap();
        store.save(&at(30)).await.unwrap();
        store.save(&at(20)).await.unwrap();

        assert_eq!(store.load().await.unwrap(), vec![at(30), at(20), at(10)]);
    }

    #[tokio::test]
    async fn test_memory_store_idempotent() {
        let store = MemoryStore::new();
        store.save(&at(10)).await.unwrap();
        store.save(&at(10)).await.unwrap();
        assert_eq!(store.load().await.unwrap().len(), 1);

        let with_height = PointStruct::new(10, "0a").with_height(4).point();
        store.save(&with_height).await.unwrap();
        let loaded = store.load().await.unwrap();
        assert_eq!(loaded[0].as_struct().unwrap().height, Some(4));
    }

    #[tokio::test]
    async fn test_memory_store_bounded() {
        let store = MemoryStore::with_capacity(2);
        for slot in 1..=5 {
            store.save(&at(slot)).await.unwrap();
        }
        assert_eq!(store.load().await.unwrap(), vec![at(5), at(4)]);
    }

    #[tokio::test]
    async fn test_memory_store_rollback_discards_orphans() {
        let store = MemoryStore::new();
        for slot in 101..=105 {
            store.save(&at(slot)).await.unwrap();
        }
        let fork = PointStruct::new(103, "ff").point();
        store.save(&fork).await.unwrap();

        store.rollback(&at(100)).await.unwrap();
        assert_eq!(store.load().await.unwrap(), vec![at(100)]);

        store.save(&at(99)).await.unwrap();
        store.rollback(&at(100)).await.unwrap();
        assert_eq!(store.load().await.unwrap(), vec![at(100), at(99)]);
    }

    #[tokio::test]
    async fn test_memory_store_rollback_to_origin() {
        let store = MemoryStore::with_points([at(1), at(2)]);
        store.rollback(&Point::origin()).await.unwrap();
        assert_eq!(store.load().await.unwrap(), vec![Point::origin()]);
    }

    #[tokio::test]
    async fn test_memory_store_seeded() {
        let store = MemoryStore::with_points([at(1), at(3), at(2), at(3)]);
        assert_eq!(store.load().await.unwrap(), vec![at(3), at(2), at(1)]);
    }
}
