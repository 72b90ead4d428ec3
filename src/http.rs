//! History playback for a selected vehicle.
//!
//! This module provides:
//! - [`HttpHistorySource`], one POST per selection to the history endpoint
//! - [`HistoryLoader`], which clears the historical store, fetches, and fills it
//!
//! Requests are never cancelled. If a second selection is made while the first
//! request is in flight, the first response still lands in the store when it
//! arrives.

use crate::config::{Endpoints, HistoryConfig};
use crate::error::HistoryError;
use crate::payload::{HistoricalPoint, HistorySample, SelectionKey};
use crate::projection::project;
use crate::store::SharedStore;
use crate::Ident;
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

const POOL_IDLE_TIMEOUT_SECS: u64 = 60;
const TCP_KEEPALIVE_SECS: u64 = 30;

/// Body of a history request: the trip, without the vehicle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRequest {
    pub route: Ident,
    pub jrn: Ident,
    pub oday: Ident,
}

impl From<&SelectionKey> for HistoryRequest {
    fn from(key: &SelectionKey) -> Self {
        Self {
            route: key.route.clone(),
            jrn: key.jrn.clone(),
            oday: key.oday.clone(),
        }
    }
}

/// Where past positions of a trip come from.
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Ordered positions of the trip. All-or-nothing: a partial body is an error.
    async fn fetch(&self, request: &HistoryRequest) -> Result<Vec<HistorySample>, HistoryError>;
}

/// History endpoint over HTTP.
pub struct HttpHistorySource {
    client: Client,
    url: String,
}

impl HttpHistorySource {
    pub fn new(url: impl Into<String>, config: &HistoryConfig) -> Result<Self, HistoryError> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS))
            .tcp_keepalive(Duration::from_secs(TCP_KEEPALIVE_SECS))
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| HistoryError::Request(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, url: url.into() })
    }

    pub fn from_endpoints(endpoints: &Endpoints, config: &HistoryConfig) -> Result<Self, HistoryError> {
        Self::new(endpoints.history_url(), config)
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl HistorySource for HttpHistorySource {
    async fn fetch(&self, request: &HistoryRequest) -> Result<Vec<HistorySample>, HistoryError> {
        let req_start = Instant::now();

        // Phase 1: send request, receive headers
        let resp = self.client.post(&self.url).json(request).send().await?;
        let headers_elapsed = req_start.elapsed();

        let status = resp.status();
        if !status.is_success() {
            return Err(HistoryError::Status(status.as_u16()));
        }

        // Phase 2: body
        let bytes = resp.bytes().await?;

        // Phase 3: JSON
        let json_start = Instant::now();
        let samples: Vec<HistorySample> = serde_json::from_slice(&bytes)?;

        debug!(
            "[HistoryLoader] headers={:?} body={:.1}KB json={:?} total={:?} points={}",
            headers_elapsed,
            bytes.len() as f64 / 1024.0,
            json_start.elapsed(),
            req_start.elapsed(),
            samples.len()
        );

        Ok(samples)
    }
}

/// Fills the historical store with the trip of a selected vehicle.
pub struct HistoryLoader {
    source: Arc<dyn HistorySource>,
    store: SharedStore<HistoricalPoint>,
}

impl HistoryLoader {
    pub fn new(source: Arc<dyn HistorySource>, store: SharedStore<HistoricalPoint>) -> Self {
        Self { source, store }
    }

    pub fn store(&self) -> &SharedStore<HistoricalPoint> {
        &self.store
    }

    /// Clear the historical store, fetch the selected trip, and insert its points.
    ///
    /// On failure the error is logged and returned and the store stays empty.
    /// Returns the number of points inserted.
    pub async fn load_history(&self, key: &SelectionKey) -> Result<usize, HistoryError> {
        self.store.lock().await.clear();

        let request = HistoryRequest::from(key);
        let start = Instant::now();

        let samples = match self.source.fetch(&request).await {
            Ok(samples) => samples,
            Err(e) => {
                warn!(
                    "[HistoryLoader] History for {}/{} ({}) failed: {}",
                    key.route, key.jrn, key.oday, e
                );
                return Err(e);
            }
        };

        let count = samples.len();
        let mut store = self.store.lock().await;
        for sample in samples {
            let coordinate = project(sample.long, sample.lat);
            store.add(coordinate, HistoricalPoint::from_sample(sample, key));
        }

        info!(
            "[HistoryLoader] Loaded {} points for {}/{} ({}) in {:?}",
            count,
            key.route,
            key.jrn,
            key.oday,
            start.elapsed()
        );

        Ok(count)
    }
}
