use ethers::types::{H256, U256};
use ethers::utils::keccak256;

use crate::amount::amount_bytes;
use crate::claim::ClaimType;

/// Raw bytes of an address: hex decoded when it is `0x` hex, utf-8 otherwise.
pub fn address_bytes(address: &str) -> Vec<u8> {
    address
        .strip_prefix("0x")
        .and_then(|h| hex::decode(h).ok())
        .unwrap_or_else(|| address.as_bytes().to_vec())
}

/// The relay layer claim id:
/// `keccak256(tx_hash ‖ sender ‖ receiver ‖ symbol ‖ amount)`.
///
/// The amount is hashed as its minimal big endian bytes. Every validator must
/// compute the exact same bytes here or the destination contract never sees
/// two equal claims.
pub fn build_relay_claim_id(
    tx_hash: &[u8],
    sender: &str,
    receiver: &str,
    symbol: &str,
    amount: U256,
) -> H256 {
    let mut preimage = Vec::with_capacity(tx_hash.len() + 128);
    preimage.extend_from_slice(tx_hash);
    preimage.extend(address_bytes(sender));
    preimage.extend(address_bytes(receiver));
    preimage.extend_from_slice(symbol.as_bytes());
    preimage.extend(amount_bytes(amount));
    H256::from(keccak256(preimage))
}

/// The consensus layer id: the plain concatenation of chain id, nonce,
/// sender, token and the claim type suffix.
pub fn build_oracle_id(
    chain_id: u64,
    nonce: u64,
    sender: &str,
    token: &str,
    claim_type: ClaimType,
) -> String {
    format!("{chain_id}{nonce}{sender}{token}{claim_type}")
}
