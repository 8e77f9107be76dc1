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
//! # Relayer Context Module 🕸️
//!
//! A module for managing the context of the relayer.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use ethers::core::k256::SecretKey;
use ethers::prelude::*;
use tokio::sync::{broadcast, Mutex};

use bridge_relayer_store::SledStore;
use bridge_relayer_types::ChainKind;
use bridge_relayer_utils::metric::{self, Metrics};

mod ethers_retry_policy;
/// Passphrase gated signing keys.
pub mod key_manager;

pub use ethers_retry_policy::BridgeHttpRetryPolicy;
pub use key_manager::KeyManager;

/// The ethers client used for reads, retrying rate limited requests.
pub type EvmProvider = Provider<RetryClient<Http>>;

/// RelayerContext contains Relayer's configuration and shutdown signal.
#[derive(Clone)]
pub struct RelayerContext {
    /// The configuration of the relayer.
    pub config: bridge_relayer_config::BridgeRelayerConfig,
    /// Broadcasts a shutdown signal to all active tasks.
    ///
    /// When a task is spawned, it is passed a broadcast receiver handle.
    /// When a graceful shutdown is initiated, a `()` value is sent via the
    /// broadcast::Sender. Each active task receives it, reaches a safe
    /// terminal state, and completes.
    notify_shutdown: broadcast::Sender<()>,
    /// Represents the metrics for the relayer
    pub metrics: Arc<Mutex<metric::Metrics>>,
    store: SledStore,
    key_manager: KeyManager<SledStore>,
}

impl std::fmt::Debug for RelayerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayerContext")
            .field("key_manager", &self.key_manager)
            .finish()
    }
}

impl RelayerContext {
    /// Creates a new RelayerContext.
    pub fn new(
        config: bridge_relayer_config::BridgeRelayerConfig,
        store: SledStore,
    ) -> bridge_relayer_utils::Result<Self> {
        let (notify_shutdown, _) = broadcast::channel(2);
        let metrics = Arc::new(Mutex::new(Metrics::new()?));
        let mut configured = HashMap::new();
        if let Some(key) = config.evm.private_key.clone() {
            configured.insert(ChainKind::Evm, key);
        }
        if let Some(key) = config.tendermint.private_key.clone() {
            configured.insert(ChainKind::Tendermint, key);
        }
        // no passphrase is needed when every enabled chain has its key.
        let start_unlocked = (!config.evm.enabled
            || configured.contains_key(&ChainKind::Evm))
            && (!config.tendermint.enabled
                || configured.contains_key(&ChainKind::Tendermint));
        let key_manager =
            KeyManager::new(store.clone(), configured, start_unlocked);
        Ok(Self {
            config,
            notify_shutdown,
            metrics,
            store,
            key_manager,
        })
    }
    /// Returns a broadcast receiver handle for the shutdown signal.
    pub fn shutdown_signal(&self) -> Shutdown {
        Shutdown::new(self.notify_shutdown.subscribe())
    }
    /// Sends a shutdown signal to all subscribed tasks/connections.
    pub fn shutdown(&self) {
        let _ = self.notify_shutdown.send(());
    }
    /// Returns a new `EvmProvider` for the relayer.
    pub fn evm_provider(&self) -> bridge_relayer_utils::Result<EvmProvider> {
        let http = Http::new(self.config.evm.http_endpoint.as_url().clone());
        let policy = BridgeHttpRetryPolicy::boxed().map_err(|e| {
            bridge_relayer_utils::Error::InvalidConfig(e.to_string())
        })?;
        let client = RetryClient::new(http, policy, 10, 1_000);
        let provider =
            Provider::new(client).interval(Duration::from_millis(500u64));
        Ok(provider)
    }
    /// Sets up and returns the EVM wallet of the relayer.
    ///
    /// Fails while the keys are locked.
    pub fn evm_wallet(&self) -> bridge_relayer_utils::Result<LocalWallet> {
        let private_key = self.key_manager.signing_key(ChainKind::Evm)?;
        let key = SecretKey::from_bytes(private_key.as_bytes().into())?;
        let chain_id = self.config.evm.chain_id;
        let wallet = LocalWallet::from(key).with_chain_id(chain_id);
        Ok(wallet)
    }

    /// Returns [Sled](https://sled.rs)-based database store
    pub fn store(&self) -> &SledStore {
        &self.store
    }

    /// The signing keys of the relayer.
    pub fn key_manager(&self) -> &KeyManager<SledStore> {
        &self.key_manager
    }
}

/// Listens for the server shutdown signal.
///
/// Shutdown is signalled using a `broadcast::Receiver`. Only a single value is
/// ever sent. Once a value has been sent via the broadcast channel, the server
/// should shutdown.
///
/// The `Shutdown` struct listens for the signal and tracks that the signal has
/// been received. Callers may query for whether the shutdown signal has been
/// received or not.
#[derive(Debug)]
pub struct Shutdown {
    /// `true` if the shutdown signal has been received
    shutdown: bool,

    /// The receive half of the channel used to listen for shutdown.
    notify: broadcast::Receiver<()>,
}

impl Shutdown {
    /// Create a new `Shutdown` backed by the given `broadcast::Receiver`.
    pub fn new(notify: broadcast::Receiver<()>) -> Shutdown {
        Shutdown {
            shutdown: false,
            notify,
        }
    }

    /// Whether the signal was already received.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown
    }

    /// Receive the shutdown notice, waiting if necessary.
    pub async fn recv(&mut self) {
        // If the shutdown signal has already been received, then return
        // immediately.
        if self.shutdown {
            return;
        }

        // Cannot receive a "lag error" as only one value is ever sent.
        let _ = self.notify.recv().await;

        // Remember that the signal has been received.
        self.shutdown = true;
    }
}
