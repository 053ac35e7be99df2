//! Zone reference lookup.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use crate::domain::ParkingError;

use super::record::{ZoneRecord, parse_zones};
use super::source::ZoneSource;

type ZoneMap = HashMap<String, ZoneRecord>;

/// Thread-safe zone id → restriction record lookup.
///
/// The map is held behind an `Arc` and replaced wholesale on reload, so a
/// reader always sees one complete map (old or new), never a mix.
#[derive(Clone)]
pub struct ZoneReferenceStore {
    inner: Arc<RwLock<Arc<ZoneMap>>>,
    source: Arc<dyn ZoneSource>,
}

impl ZoneReferenceStore {
    /// Load the store from a source.
    ///
    /// Fails with `DataUnavailable` if the source cannot be read; the
    /// server cannot start without reference data.
    pub fn load(source: Arc<dyn ZoneSource>) -> Result<Self, ParkingError> {
        let raw = source.read()?;
        let map = parse_zones(&raw)?;

        info!(
            source = %source.describe(),
            zones = map.len(),
            "loaded zone reference data"
        );

        Ok(Self {
            inner: Arc::new(RwLock::new(Arc::new(map))),
            source,
        })
    }

    /// Rebuild the map from the same source.
    ///
    /// On failure the current map is kept and the error is returned.
    pub async fn reload(&self) -> Result<usize, ParkingError> {
        // Sources may hit the filesystem; keep that off the runtime workers
        let source = self.source.clone();
        let raw = tokio::task::spawn_blocking(move || source.read())
            .await
            .map_err(|e| ParkingError::DataUnavailable {
                message: format!("zone reload task failed: {e}"),
            })??;
        let map = parse_zones(&raw)?;
        let count = map.len();

        let mut guard = self.inner.write().await;
        *guard = Arc::new(map);
        drop(guard);

        info!(zones = count, "reloaded zone reference data");
        Ok(count)
    }

    /// The current map. Holding it keeps that version alive across reloads.
    pub async fn snapshot(&self) -> Arc<ZoneMap> {
        self.inner.read().await.clone()
    }

    /// Look up a zone by id.
    pub async fn get(&self, zone_id: &str) -> Option<ZoneRecord> {
        self.snapshot().await.get(zone_id).cloned()
    }

    /// All zone ids, sorted.
    pub async fn zone_ids(&self) -> Vec<String> {
        let map = self.snapshot().await;
        let mut ids: Vec<String> = map.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// All zone records, sorted by zone id.
    pub async fn records(&self) -> Vec<ZoneRecord> {
        let map = self.snapshot().await;
        let mut records: Vec<ZoneRecord> = map.values().cloned().collect();
        records.sort_by(|a, b| a.zone_id.cmp(&b.zone_id));
        records
    }

    pub async fn len(&self) -> usize {
        self.snapshot().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.snapshot().await.is_empty()
    }
}
