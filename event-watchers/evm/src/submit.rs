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

use std::sync::Arc;

use bridge_claim_codec::Claim;
use bridge_relayer_context::KeyManager;
use bridge_relayer_store::KeyValueStore;
use bridge_relayer_tx_queue::SubmitClient;
use bridge_relayer_types::{ChainKind, TxStatus};
use bridge_relayer_utils::Error;
use ethers::core::k256::SecretKey;
use ethers::providers::{
    JsonRpcClient, Middleware, MiddlewareError, Provider, ProviderError,
};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, Bytes, H256, U64};

use crate::contracts::OracleContract;
use crate::parse_address;

/// Submits claims to the oracle contract of an EVM chain.
pub struct EvmSubmitClient<P, S> {
    provider: Arc<Provider<P>>,
    oracle: OracleContract<Provider<P>>,
    keys: KeyManager<S>,
    chain_id: u32,
}

impl<P, S> std::fmt::Debug for EvmSubmitClient<P, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvmSubmitClient")
            .field("chain_id", &self.chain_id)
            .finish()
    }
}

impl<P, S> EvmSubmitClient<P, S>
where
    P: JsonRpcClient + 'static,
    S: KeyValueStore,
{
    /// Creates a client voting on the oracle contract at `oracle`.
    pub fn new(
        provider: Arc<Provider<P>>,
        oracle: Address,
        keys: KeyManager<S>,
        chain_id: u32,
    ) -> Self {
        Self {
            oracle: OracleContract::new(oracle, provider.clone()),
            provider,
            keys,
            chain_id,
        }
    }

    fn wallet(&self) -> bridge_relayer_utils::Result<LocalWallet> {
        let key = self.keys.signing_key(ChainKind::Evm)?;
        let secret = SecretKey::from_bytes(key.as_bytes().into())?;
        Ok(LocalWallet::from(secret).with_chain_id(self.chain_id))
    }
}

/// A reverted claim is rejected for good, anything else may go through later.
fn send_error(e: ProviderError) -> Error {
    match e.as_error_response() {
        Some(rpc) if rpc.message.contains("revert") => {
            Error::Oracle(format!("claim rejected: {}", rpc.message))
        }
        _ => Error::EthersProvider(e),
    }
}

fn parse_tx_hash(tx_hash: &str) -> bridge_relayer_utils::Result<H256> {
    tx_hash
        .parse()
        .map_err(|_| Error::Decode(format!("invalid tx hash: {tx_hash}")))
}

#[async_trait::async_trait]
impl<P, S> SubmitClient for EvmSubmitClient<P, S>
where
    P: JsonRpcClient + 'static,
    S: KeyValueStore + Send + Sync,
{
    fn account(&self) -> bridge_relayer_utils::Result<String> {
        self.keys.address(ChainKind::Evm)
    }

    async fn pending_nonce(
        &self,
        account: &str,
    ) -> bridge_relayer_utils::Result<Option<u64>> {
        let address = parse_address(account)?;
        let count = self
            .provider
            .get_transaction_count(
                address,
                Some(ethers::types::BlockNumber::Pending.into()),
            )
            .await?;
        Ok(Some(count.as_u64()))
    }

    #[tracing::instrument(skip_all, fields(claim = %claim.claim_id, nonce = nonce))]
    async fn broadcast(
        &self,
        claim: &Claim,
        nonce: u64,
    ) -> bridge_relayer_utils::Result<String> {
        let content = &claim.content;
        let receiver = parse_address(&content.receiver)?;
        let token = parse_address(&content.token)?;
        let wallet = self.wallet()?;
        // validators sign the content address of the source event.
        let signature = wallet.sign_message(claim.relay_id.as_bytes()).await?;
        let call = self.oracle.new_oracle_claim(
            content.claim_type.to_u8(),
            Bytes::from(content.sender.as_bytes().to_vec()),
            receiver,
            token,
            content.symbol.clone(),
            content.amount,
            claim.relay_id.to_fixed_bytes(),
            Bytes::from(signature.to_vec()),
        );
        let mut tx = call.tx;
        tx.set_from(wallet.address());
        tx.set_nonce(nonce);
        tx.set_chain_id(self.chain_id);
        self.provider
            .fill_transaction(&mut tx, None)
            .await
            .map_err(send_error)?;
        let signed = wallet.sign_transaction(&tx).await?;
        let pending = self
            .provider
            .send_raw_transaction(tx.rlp_signed(&signed))
            .await
            .map_err(send_error)?;
        Ok(format!("{:?}", pending.tx_hash()))
    }

    async fn tx_status(
        &self,
        tx_hash: &str,
    ) -> bridge_relayer_utils::Result<TxStatus> {
        let receipt = self
            .provider
            .get_transaction_receipt(parse_tx_hash(tx_hash)?)
            .await?;
        Ok(match receipt {
            None => TxStatus::Pending,
            Some(r) if r.status == Some(U64::one()) => TxStatus::Success,
            Some(_) => TxStatus::Failed,
        })
    }
}
