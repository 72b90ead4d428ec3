//! Indexed collection of point features.
//!
//! A feature is created once per identity and afterwards mutated in place: its
//! slot, and therefore its position in [`FeatureStore::iter`], never changes
//! until [`FeatureStore::clear`]. Readers get shared references only.

use crate::FeatureId;
use geo::{Coord, Distance, Euclidean, Point};
use std::collections::HashMap;

/// A renderable point with its most recent attribute bag.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature<A> {
    id: Option<FeatureId>,
    geometry: Point<f64>,
    attributes: A,
    revision: u64,
}

impl<A> Feature<A> {
    /// Identity, or `None` for anonymous features such as historical points.
    pub fn id(&self) -> Option<&FeatureId> {
        self.id.as_ref()
    }

    /// Position in projected map space.
    pub fn geometry(&self) -> Point<f64> {
        self.geometry
    }

    pub fn attributes(&self) -> &A {
        &self.attributes
    }

    /// Starts at 0, incremented on every in-place update.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

/// Point features addressable by [`FeatureId`].
#[derive(Debug, Clone)]
pub struct FeatureStore<A> {
    features: Vec<Feature<A>>,
    index: HashMap<FeatureId, usize>,
    revision: u64,
}

impl<A> Default for FeatureStore<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> FeatureStore<A> {
    pub fn new() -> Self {
        Self {
            features: Vec::new(),
            index: HashMap::new(),
            revision: 0,
        }
    }

    /// Insert a feature for `id`, or move the existing one and replace its attributes.
    ///
    /// Attributes are replaced wholesale; the newest bag is authoritative even
    /// when it drops fields the previous one had.
    pub fn upsert(&mut self, id: FeatureId, coordinate: Coord<f64>, attributes: A) {
        self.revision += 1;

        if let Some(&slot) = self.index.get(&id) {
            let feature = &mut self.features[slot];
            feature.geometry = Point::from(coordinate);
            feature.attributes = attributes;
            feature.revision += 1;
            return;
        }

        let slot = self.features.len();
        self.features.push(Feature {
            id: Some(id.clone()),
            geometry: Point::from(coordinate),
            attributes,
            revision: 0,
        });
        self.index.insert(id, slot);
    }

    /// Append a feature that has no identity.
    pub fn add(&mut self, coordinate: Coord<f64>, attributes: A) {
        self.revision += 1;
        self.features.push(Feature {
            id: None,
            geometry: Point::from(coordinate),
            attributes,
            revision: 0,
        });
    }

    pub fn lookup(&self, id: &FeatureId) -> Option<&Feature<A>> {
        self.index.get(id).map(|&slot| &self.features[slot])
    }

    /// Remove every feature. A no-op on an empty store.
    pub fn clear(&mut self) {
        if self.features.is_empty() {
            return;
        }
        self.features.clear();
        self.index.clear();
        self.revision += 1;
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Features in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Feature<A>> {
        self.features.iter()
    }

    /// Store-wide write counter, for renderers that poll for changes.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Closest feature to `coordinate` within `tolerance` projected units.
    pub fn nearest(&self, coordinate: Coord<f64>, tolerance: f64) -> Option<&Feature<A>> {
        let target = Point::from(coordinate);
        self.features
            .iter()
            .map(|f| (Euclidean::distance(f.geometry, target), f))
            .filter(|(d, _)| *d <= tolerance)
            .min_by(|(a, _), (b, _)| a.total_cmp(b))
            .map(|(_, f)| f)
    }
}

/// Store handle shared between its single writer and any readers.
#[cfg(feature = "tokio")]
pub type SharedStore<A> = std::sync::Arc<tokio::sync::Mutex<FeatureStore<A>>>;

/// Create an empty [`SharedStore`].
#[cfg(feature = "tokio")]
pub fn shared<A>() -> SharedStore<A> {
    std::sync::Arc::new(tokio::sync::Mutex::new(FeatureStore::new()))
}
