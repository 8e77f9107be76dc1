// Copyright 2022 Webb Technologies Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![warn(missing_docs)]

//! # Relayer Configuration Module 🕸️
//!
//! A module for configuring the relayer.
//!
//! ## Overview
//!
//! The relayer configuration module is responsible for configuring the relayer.
//! Possible configuration include:
//! * `port`: The port the relayer will listen on. Defaults to 9955
//! * `evm`: The EVM chain holding the bridge bank and oracle contracts.
//! * `tendermint`: The Tendermint-style chain running the bridge executor.
//! * `validators`: The initial validator set of the embedded oracle.
//!
//! See [config/local](./config/local) for an example.

/// CLI configuration
#[cfg(feature = "cli")]
pub mod cli;
mod defaults;
/// Event watcher configuration
pub mod event_watcher;
/// EVM configuration
pub mod evm;
/// Tendermint configuration
pub mod tendermint;
/// Utils for processing configuration
pub mod utils;

use std::collections::HashSet;
use std::time::Duration;

use bridge_relayer_utils::Error;
use evm::EvmChainConfig;
use serde::{Deserialize, Serialize};
use tendermint::TendermintConfig;

/// The highest value of a percentage.
const MAX_PERCENT: u64 = 100;

/// BridgeRelayerConfig is the configuration for the bridge relayer.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct BridgeRelayerConfig {
    /// Http Server Port number
    ///
    /// default to 9955
    #[serde(default = "defaults::relayer_port", skip_serializing)]
    pub port: u16,
    /// Whether the metrics endpoint is served.
    #[serde(default = "defaults::enabled")]
    pub metrics: bool,
    /// Where oracle state is read from and claims are voted on.
    #[serde(default, rename(serialize = "oracleMode"))]
    pub oracle_mode: OracleMode,
    /// Percentage of the total power needed for a prophecy to succeed.
    #[serde(
        default = "defaults::consensus_threshold",
        rename(serialize = "consensusThreshold")
    )]
    pub consensus_threshold: u64,
    /// The initial validator set of the embedded oracle.
    #[serde(default)]
    pub validators: Vec<ValidatorConfig>,
    /// The EVM chain.
    pub evm: EvmChainConfig,
    /// The Tendermint-style chain.
    pub tendermint: TendermintConfig,
    /// Deployment bootstrap settings.
    #[serde(default)]
    pub deployment: DeploymentConfig,
}

impl BridgeRelayerConfig {
    /// Makes sure that the config is valid, by going
    /// through the whole config and doing some basic checks.
    pub fn verify(&self) -> bridge_relayer_utils::Result<()> {
        if !is_valid_percent(self.consensus_threshold) {
            return Err(Error::InvalidConfig(format!(
                "consensus-threshold must be within (0, 100], got {}",
                self.consensus_threshold
            )));
        }
        let mut seen = HashSet::new();
        for v in &self.validators {
            if !is_valid_percent(v.power) {
                return Err(Error::InvalidConfig(format!(
                    "power of validator {} must be within (0, 100], got {}",
                    v.address, v.power
                )));
            }
            if !seen.insert(v.address.trim().to_lowercase()) {
                return Err(Error::InvalidConfig(format!(
                    "duplicate validator {}",
                    v.address
                )));
            }
        }
        if self.evm.http_endpoint.is_websocket() {
            return Err(Error::InvalidConfig(String::from(
                "evm http-endpoint must be an http(s) url",
            )));
        }
        if let Some(ws) = &self.evm.ws_endpoint {
            if !ws.is_websocket() {
                return Err(Error::InvalidConfig(String::from(
                    "evm ws-endpoint must be a ws(s) url",
                )));
            }
        }
        if self.tendermint.rpc_endpoint.is_websocket() {
            return Err(Error::InvalidConfig(String::from(
                "tendermint rpc-endpoint must be an http(s) url",
            )));
        }
        if self.tendermint.bridge_exec_address.trim().is_empty() {
            return Err(Error::InvalidConfig(String::from(
                "tendermint bridge-exec-address is empty",
            )));
        }
        if !self.evm.enabled && !self.tendermint.enabled {
            return Err(Error::InvalidConfig(String::from(
                "at least one chain must be enabled",
            )));
        }
        Ok(())
    }
}

const fn is_valid_percent(value: u64) -> bool {
    value > 0 && value <= MAX_PERCENT
}

/// Where the relayer gets its oracle from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OracleMode {
    /// Prophecies are kept by an oracle running inside the relayer.
    #[default]
    Embedded,
    /// Prophecies are kept by the bridge executor of the Tendermint node.
    Remote,
}

/// A validator of the initial set.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct ValidatorConfig {
    /// The validator address.
    pub address: String,
    /// Voting power, in percent.
    pub power: u64,
}

/// DeploymentConfig controls how long the relayer waits for the bridge contracts.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct DeploymentConfig {
    /// Maximum number of milliseconds to wait for the bridge contracts.
    #[serde(
        default = "defaults::deployment_wait_timeout",
        rename(serialize = "waitTimeout")
    )]
    pub wait_timeout: u64,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            wait_timeout: defaults::deployment_wait_timeout(),
        }
    }
}

impl DeploymentConfig {
    /// The wait timeout as a [`Duration`].
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout)
    }
}

/// TxQueueConfig is the configuration for the submitter of one chain.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct TxQueueConfig {
    /// Maximum number of milliseconds to wait for a transaction to be mined.
    #[serde(
        default = "defaults::wait_mined_timeout",
        rename(serialize = "waitMinedTimeout")
    )]
    pub wait_mined_timeout: u64,
    /// Milliseconds between two status checks while waiting for a transaction.
    #[serde(
        default = "defaults::wait_mined_poll_interval",
        rename(serialize = "waitMinedPollInterval")
    )]
    pub wait_mined_poll_interval: u64,
    /// Milliseconds between two runs of the submissions status tracker.
    #[serde(
        default = "defaults::status_check_interval",
        rename(serialize = "statusCheckInterval")
    )]
    pub status_check_interval: u64,
}

impl Default for TxQueueConfig {
    fn default() -> Self {
        Self {
            wait_mined_timeout: defaults::wait_mined_timeout(),
            wait_mined_poll_interval: defaults::wait_mined_poll_interval(),
            status_check_interval: defaults::status_check_interval(),
        }
    }
}

impl TxQueueConfig {
    /// [`TxQueueConfig::wait_mined_timeout`] as a [`Duration`].
    pub fn wait_mined_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_mined_timeout)
    }

    /// [`TxQueueConfig::wait_mined_poll_interval`] as a [`Duration`].
    pub fn wait_mined_poll_interval(&self) -> Duration {
        Duration::from_millis(self.wait_mined_poll_interval)
    }

    /// [`TxQueueConfig::status_check_interval`] as a [`Duration`].
    pub fn status_check_interval(&self) -> Duration {
        Duration::from_millis(self.status_check_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BridgeRelayerConfig {
        serde_json::from_value(serde_json::json!({
            "validators": [
                { "address": "0xA", "power": 60 },
                { "address": "0xb", "power": 40 }
            ],
            "evm": {
                "name": "ganache",
                "enabled": true,
                "http-endpoint": "http://localhost:8545",
                "chain-id": 1337
            },
            "tendermint": {
                "name": "chain33",
                "enabled": true,
                "rpc-endpoint": "http://localhost:8801",
                "chain-id": 33,
                "bridge-exec-address": "1BqP2vHkYNjSgdnTqm7pGbnphLhtEhuJFi"
            }
        }))
        .unwrap()
    }

    #[test]
    fn defaults_should_work() {
        let config = sample();
        assert_eq!(config.port, 9955);
        assert_eq!(config.consensus_threshold, 70);
        assert_eq!(config.oracle_mode, OracleMode::Embedded);
        assert_eq!(config.deployment.wait_timeout, 60_000);
        assert_eq!(config.evm.maturity_degree, 10);
        assert_eq!(config.tendermint.fee, 100_000);
        assert_eq!(config.tendermint.events_watcher.fetch_batch_size, 10);
        assert_eq!(
            config.evm.events_watcher.max_height_fetch_failures,
            60
        );
        assert_eq!(config.evm.tx_queue.wait_mined_timeout, 300_000);
        config.verify().unwrap();
    }

    #[test]
    fn verify_should_reject_bad_values() {
        let mut config = sample();
        config.consensus_threshold = 0;
        assert!(config.verify().is_err());
        config.consensus_threshold = 101;
        assert!(config.verify().is_err());

        let mut config = sample();
        config.validators[1].address = String::from("0xa");
        assert!(matches!(config.verify(), Err(Error::InvalidConfig(_))));

        let mut config = sample();
        config.validators[0].power = 0;
        assert!(config.verify().is_err());

        let mut config = sample();
        config.evm.ws_endpoint = Some(config.evm.http_endpoint.clone());
        assert!(config.verify().is_err());
    }

    #[test]
    fn all_config_files_are_correct() {
        // Walks every directory inside the root config directory and parses
        // the config file(s) inside it.
        let config_dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("config");
        let config_dirs =
            glob::glob(config_dir.join("*").to_str().unwrap())
                .expect("Failed to read config directory")
                .filter_map(|p| p.ok())
                .filter(|p| p.is_dir())
                .collect::<Vec<_>>();
        assert!(
            !config_dirs.is_empty(),
            "No config directories found in the config directory"
        );
        for config_subdir in config_dirs {
            // Load the example dot env file.
            let _ = dotenv::from_path(config_subdir.join(".env.example"));
            if let Err(e) = utils::load(&config_subdir) {
                panic!("Failed to parse config file in directory: {config_subdir:?} with error: {e}");
            }
        }
    }
}
