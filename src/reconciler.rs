//! Applies live position frames to the live feature store.
//!
//! Frames are applied in delivery order and the last one applied wins; no
//! sequence numbers are consulted. A frame that fails to parse is counted,
//! logged, and dropped without affecting the frames after it.

use crate::error::PayloadError;
use crate::payload::{StreamMessage, VehicleUpdate};
use crate::projection::project;
use crate::store::FeatureStore;
use crate::FeatureId;
use log::{debug, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Per-message counters, readable while the stream runs.
#[derive(Debug, Default)]
pub struct ReconcileStats {
    applied: AtomicU64,
    dropped: AtomicU64,
}

impl ReconcileStats {
    pub fn applied(&self) -> u64 {
        self.applied.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Insert-or-update of live vehicles keyed by route and vehicle.
#[derive(Debug, Clone, Default)]
pub struct LiveReconciler {
    stats: Arc<ReconcileStats>,
}

impl LiveReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters shared with every clone of this reconciler.
    pub fn stats(&self) -> Arc<ReconcileStats> {
        Arc::clone(&self.stats)
    }

    /// Apply one raw frame, logging and dropping it if it cannot be parsed.
    pub fn handle(&self, store: &mut FeatureStore<VehicleUpdate>, raw: &str) {
        if let Err(e) = self.apply(store, raw) {
            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
            warn!("[LiveReconciler] Dropped frame ({} bytes): {}", raw.len(), e);
        }
    }

    /// Apply one raw frame, returning the identity it was stored under.
    pub fn apply(
        &self,
        store: &mut FeatureStore<VehicleUpdate>,
        raw: &str,
    ) -> Result<FeatureId, PayloadError> {
        let update = StreamMessage::parse(raw)?.into_update();
        let id = update.feature_id();
        let coordinate = project(update.long, update.lat);

        debug!("[LiveReconciler] {} -> ({:.1}, {:.1})", id, coordinate.x, coordinate.y);

        store.upsert(id.clone(), coordinate, update);
        self.stats.applied.fetch_add(1, Ordering::Relaxed);
        Ok(id)
    }
}
