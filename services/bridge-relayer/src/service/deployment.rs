use std::time::Duration;

use bridge_ew_evm::{BridgeContracts, RegistryProbe, RegistryState};
use bridge_relayer_config::evm::EvmChainConfig;
use bridge_relayer_utils::retry::bounded_exponential;
use bridge_relayer_utils::{probe, Error};
use ethers::providers::JsonRpcClient;
use ethers::types::Address;
use tokio::sync::watch;

/// Where the bridge deployment is, as seen from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentState {
    /// Nothing is deployed at the registry address yet.
    NotDeployed,
    /// The registry exists but some bridge contracts are missing.
    Deploying,
    /// Every bridge contract is registered and matches the configuration.
    Deployed,
}

/// One look at the bridge registry.
#[async_trait::async_trait]
pub trait DeploymentProbe: Send + Sync {
    /// Reads the registry state.
    async fn probe(&self) -> bridge_relayer_utils::Result<RegistryState>;
}

#[async_trait::async_trait]
impl<P> DeploymentProbe for RegistryProbe<P>
where
    P: JsonRpcClient + 'static,
{
    async fn probe(&self) -> bridge_relayer_utils::Result<RegistryState> {
        RegistryProbe::probe(self).await
    }
}

/// Waits for the bridge contracts behind a registry.
pub struct DeploymentBootstrap<P> {
    probe: P,
    expected_bridge_bank: Option<Address>,
    expected_oracle: Option<Address>,
    timeout: Duration,
    state: watch::Sender<DeploymentState>,
}

impl<P> std::fmt::Debug for DeploymentBootstrap<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeploymentBootstrap")
            .field("state", &*self.state.borrow())
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn check_expected(
    what: &str,
    expected: Option<Address>,
    found: Address,
) -> bridge_relayer_utils::Result<()> {
    match expected {
        Some(expected) if expected != found => {
            Err(Error::DeploymentMismatch(format!(
                "configured {what} {expected:?} but the registry points at {found:?}"
            )))
        }
        _ => Ok(()),
    }
}

impl<P: DeploymentProbe> DeploymentBootstrap<P> {
    /// Creates a bootstrap checking the registry against the addresses
    /// configured for `config`.
    pub fn new(probe: P, config: &EvmChainConfig, timeout: Duration) -> Self {
        let (state, _) = watch::channel(DeploymentState::NotDeployed);
        Self {
            probe,
            expected_bridge_bank: config.bridge_bank,
            expected_oracle: config.oracle,
            timeout,
            state,
        }
    }

    /// The current state.
    pub fn state(&self) -> DeploymentState {
        *self.state.borrow()
    }

    /// A receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<DeploymentState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: DeploymentState) {
        let changed = self.state.send_if_modified(|current| {
            let changed = *current != state;
            *current = state;
            changed
        });
        if changed {
            tracing::event!(
                target: probe::TARGET,
                tracing::Level::DEBUG,
                kind = %probe::Kind::Deployment,
                deployment = ?state,
            );
        }
    }

    async fn step(&self) -> Result<BridgeContracts, backoff::Error<Error>> {
        let contracts = match self.probe.probe().await {
            Ok(RegistryState::Missing) => {
                self.set_state(DeploymentState::NotDeployed);
                return Err(backoff::Error::transient(Error::DeploymentTimeout));
            }
            Ok(RegistryState::Incomplete) => {
                self.set_state(DeploymentState::Deploying);
                return Err(backoff::Error::transient(Error::DeploymentTimeout));
            }
            Ok(RegistryState::Complete(contracts)) => contracts,
            Err(e) if e.is_retryable() => {
                tracing::warn!(error = %e, "Failed to read the bridge registry");
                return Err(backoff::Error::transient(e));
            }
            Err(e) => return Err(backoff::Error::permanent(e)),
        };
        check_expected(
            "bridge-bank",
            self.expected_bridge_bank,
            contracts.bridge_bank,
        )
        .and_then(|_| {
            check_expected("oracle", self.expected_oracle, contracts.oracle)
        })
        .map_err(backoff::Error::permanent)?;
        Ok(contracts)
    }

    /// Polls the registry until the bridge is deployed.
    ///
    /// Fails with [`Error::DeploymentTimeout`] once the timeout elapsed and
    /// with [`Error::DeploymentMismatch`] when the registry disagrees with the
    /// configuration.
    #[tracing::instrument(skip(self), fields(timeout = ?self.timeout))]
    pub async fn wait(&self) -> bridge_relayer_utils::Result<BridgeContracts> {
        let backoff = bounded_exponential(self.timeout);
        let task = backoff::future::retry(backoff, || self.step());
        // the backoff only checks the elapsed time between two attempts.
        let result = tokio::time::timeout(self.timeout, task)
            .await
            .map_err(|_| Error::DeploymentTimeout)?;
        match result {
            Ok(contracts) => {
                self.set_state(DeploymentState::Deployed);
                tracing::info!(
                    bridge_bank = ?contracts.bridge_bank,
                    oracle = ?contracts.oracle,
                    "Bridge contracts found",
                );
                Ok(contracts)
            }
            Err(e @ Error::DeploymentMismatch(_)) => Err(e),
            Err(e) if e.is_retryable() || matches!(e, Error::DeploymentTimeout) => {
                Err(Error::DeploymentTimeout)
            }
            Err(e) => Err(e),
        }
    }
}

/// The bridge contracts of an EVM chain without registry: both addresses
/// must be configured.
pub fn configured_contracts(
    config: &EvmChainConfig,
) -> bridge_relayer_utils::Result<BridgeContracts> {
    match (config.bridge_bank, config.oracle) {
        (Some(bridge_bank), Some(oracle)) => Ok(BridgeContracts {
            bridge_bank,
            oracle,
        }),
        _ => Err(Error::InvalidConfig(String::from(
            "evm needs either bridge-registry or both bridge-bank and oracle",
        ))),
    }
}
