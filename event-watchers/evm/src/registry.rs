use std::sync::Arc;

use ethers::providers::{JsonRpcClient, Middleware, Provider};
use ethers::types::Address;

use crate::contract_error;
use crate::contracts::BridgeRegistryContract;

/// The bridge contracts a registry points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeContracts {
    /// The bridge bank, emitting lock and burn events.
    pub bridge_bank: Address,
    /// The oracle, receiving claims.
    pub oracle: Address,
}

/// What the registry tells about the bridge deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryState {
    /// No code at the registry address.
    Missing,
    /// The registry exists but does not point at the bridge yet.
    Incomplete,
    /// Every bridge contract is registered.
    Complete(BridgeContracts),
}

/// Reads the bridge registry of an EVM chain.
#[derive(Debug)]
pub struct RegistryProbe<P> {
    provider: Arc<Provider<P>>,
    registry: Address,
}

impl<P: JsonRpcClient + 'static> RegistryProbe<P> {
    /// Creates a probe of the registry at `registry`.
    pub fn new(provider: Arc<Provider<P>>, registry: Address) -> Self {
        Self { provider, registry }
    }

    /// The registry address.
    pub fn registry(&self) -> Address {
        self.registry
    }

    /// Reads the registry once.
    #[tracing::instrument(skip(self), fields(registry = ?self.registry))]
    pub async fn probe(&self) -> bridge_relayer_utils::Result<RegistryState> {
        let code = self.provider.get_code(self.registry, None).await?;
        if code.as_ref().is_empty() {
            return Ok(RegistryState::Missing);
        }
        let contract =
            BridgeRegistryContract::new(self.registry, self.provider.clone());
        let bridge_bank =
            contract.bridge_bank().call().await.map_err(contract_error)?;
        let oracle = contract.oracle().call().await.map_err(contract_error)?;
        if bridge_bank.is_zero() || oracle.is_zero() {
            return Ok(RegistryState::Incomplete);
        }
        Ok(RegistryState::Complete(BridgeContracts {
            bridge_bank,
            oracle,
        }))
    }
}

#[cfg(test)]
mod tests {
    use ethers::abi::{encode, Token};
    use ethers::providers::MockProvider;
    use ethers::types::Bytes;

    use super::*;

    fn setup() -> (RegistryProbe<MockProvider>, MockProvider) {
        let (provider, mock) = Provider::mocked();
        let probe = RegistryProbe::new(Arc::new(provider), Address::repeat_byte(0x0e));
        (probe, mock)
    }

    fn address_word(address: Address) -> Bytes {
        encode(&[Token::Address(address)]).into()
    }

    #[tokio::test]
    async fn missing_registry_should_be_reported() {
        let (probe, mock) = setup();
        mock.push::<Bytes, _>(Bytes::new()).unwrap();
        assert_eq!(probe.probe().await.unwrap(), RegistryState::Missing);
    }

    #[tokio::test]
    async fn unregistered_contracts_should_be_incomplete() {
        let (probe, mock) = setup();
        // the code and both calls answer with the same word.
        for _ in 0..3 {
            mock.push::<Bytes, _>(address_word(Address::zero())).unwrap();
        }
        assert_eq!(probe.probe().await.unwrap(), RegistryState::Incomplete);
    }

    #[tokio::test]
    async fn registered_contracts_should_be_read() {
        let (probe, mock) = setup();
        let bridge = Address::repeat_byte(0x0b);
        for _ in 0..3 {
            mock.push::<Bytes, _>(address_word(bridge)).unwrap();
        }
        assert_eq!(
            probe.probe().await.unwrap(),
            RegistryState::Complete(BridgeContracts {
                bridge_bank: bridge,
                oracle: bridge,
            })
        );
    }
}
