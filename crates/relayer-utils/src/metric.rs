// Copyright (C) 2022-2024 Webb Technologies Inc.
//
// Tangle is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// Tangle is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should receive a copy of the GNU General Public License
// If not, see <http://www.gnu.org/licenses/>.

use prometheus::core::{AtomicF64, GenericCounter, GenericGauge};
use prometheus::{
    register_counter_vec_with_registry, register_counter_with_registry,
    register_gauge_with_registry, CounterVec, Encoder, Registry, TextEncoder,
};

/// A struct definition for collecting metrics in the relayer.
///
/// Every relayer instance owns its own [`Registry`], so several instances can
/// live in the same process.
#[derive(Debug, Clone)]
pub struct Metrics {
    registry: Registry,
    /// Witnessed events processed by the chain watchers, labelled by chain.
    pub events_processed: CounterVec,
    /// Claims broadcast to the destination chain, labelled by direction.
    pub claims_submitted: CounterVec,
    /// Broadcasts that failed after a nonce was allocated, labelled by direction.
    pub submission_failures: CounterVec,
    /// Nonces handed back to the cache after a failed broadcast.
    pub nonce_rollbacks: GenericCounter<AtomicF64>,
    /// Failed attempts to read the chain height, labelled by chain.
    pub height_fetch_failures: CounterVec,
    /// Chain watcher back off metric
    pub watcher_back_off: GenericCounter<AtomicF64>,
    /// Prophecies that reached a terminal status, labelled by status.
    pub prophecies_completed: CounterVec,
    /// Total amount of data stored metric
    pub total_amount_of_data_stored: GenericGauge<AtomicF64>,
}

impl Metrics {
    /// Instantiates the various metrics and their counters, also creates a registry for the counters and
    /// registers the counters
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("bridge".into()), None)?;
        let events_processed = register_counter_vec_with_registry!(
            "events_processed",
            "The total number of witnessed events processed",
            &["chain"],
            registry
        )?;
        let claims_submitted = register_counter_vec_with_registry!(
            "claims_submitted",
            "The total number of claims broadcast to the destination chain",
            &["direction"],
            registry
        )?;
        let submission_failures = register_counter_vec_with_registry!(
            "submission_failures",
            "The total number of failed claim broadcasts",
            &["direction"],
            registry
        )?;
        let nonce_rollbacks = register_counter_with_registry!(
            "nonce_rollbacks",
            "How many allocated nonces were rolled back",
            registry
        )?;
        let height_fetch_failures = register_counter_vec_with_registry!(
            "height_fetch_failures",
            "How many times reading the chain height failed",
            &["chain"],
            registry
        )?;
        let watcher_back_off = register_counter_with_registry!(
            "watcher_back_off",
            "specifies how many times the chain watchers backed off",
            registry
        )?;
        let prophecies_completed = register_counter_vec_with_registry!(
            "prophecies_completed",
            "The total number of prophecies that reached a terminal status",
            &["status"],
            registry
        )?;
        let total_amount_of_data_stored = register_gauge_with_registry!(
            "total_amount_of_data_stored",
            "The Total number of data stored",
            registry
        )?;

        Ok(Self {
            registry,
            events_processed,
            claims_submitted,
            submission_failures,
            nonce_rollbacks,
            height_fetch_failures,
            watcher_back_off,
            prophecies_completed,
            total_amount_of_data_stored,
        })
    }

    /// Gathers the whole relayer metrics
    pub fn gather_metrics(&self) -> Result<String, GatherMetricsError> {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GatherMetricsError {
    #[error(transparent)]
    PrometheusError(#[from] prometheus::Error),
    #[error(transparent)]
    FromUtf8Error(#[from] std::string::FromUtf8Error),
}
