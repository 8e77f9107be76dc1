use std::sync::Arc;

use bridge_claim_codec::{is_native_token, NATIVE_DECIMALS};
use bridge_relayer_store::KeyValueStore;
use ethers::providers::{JsonRpcClient, Provider};

use crate::contracts::BridgeTokenContract;
use crate::{contract_error, parse_address};

/// Namespace of the decimals cache.
const DECIMALS_NAMESPACE: &str = "decimals";

/// Decimals of the bridged EVM tokens, read once from the token contract and
/// cached in the store.
pub struct TokenDecimals<P, S> {
    provider: Arc<Provider<P>>,
    store: S,
}

impl<P, S> std::fmt::Debug for TokenDecimals<P, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenDecimals").finish()
    }
}

impl<P, S> TokenDecimals<P, S>
where
    P: JsonRpcClient + 'static,
    S: KeyValueStore,
{
    /// Creates a lookup reading token contracts through `provider`.
    pub fn new(provider: Arc<Provider<P>>, store: S) -> Self {
        Self { provider, store }
    }

    /// Decimals of `token`, the native asset has 18.
    #[tracing::instrument(skip(self))]
    pub async fn decimals(
        &self,
        token: &str,
    ) -> bridge_relayer_utils::Result<u8> {
        if is_native_token(token) {
            return Ok(NATIVE_DECIMALS);
        }
        let address = parse_address(token)?;
        let key = format!("evm:{address:?}");
        if let Some(cached) =
            self.store.get_value(DECIMALS_NAMESPACE, key.as_bytes())?
        {
            if let [decimals] = cached.as_slice() {
                return Ok(*decimals);
            }
        }
        let contract = BridgeTokenContract::new(address, self.provider.clone());
        let decimals = contract.decimals().call().await.map_err(contract_error)?;
        self.store
            .put_value(DECIMALS_NAMESPACE, key.as_bytes(), &[decimals])?;
        tracing::debug!(%token, decimals, "Token decimals cached");
        Ok(decimals)
    }
}
