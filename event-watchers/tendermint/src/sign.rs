//! Local signing of the transactions built by the node.
//!
//! The node only assembles the unsigned transaction, the key never leaves
//! the relayer.

use bridge_relayer_types::private_key::PrivateKey;
use bridge_relayer_utils::Error;
use ethers::core::k256::ecdsa::signature::hazmat::PrehashSigner;
use ethers::core::k256::ecdsa::{Signature as EcdsaSignature, SigningKey};
use ethers::core::k256::elliptic_curve::sec1::ToEncodedPoint;
use ethers::core::k256::PublicKey;
use prost::Message;
use sha2::{Digest, Sha256};

/// Signature type of a secp256k1 key.
pub const SECP256K1: i32 = 1;

/// The wire form of a Chain33 transaction.
#[derive(Clone, PartialEq, Message)]
pub struct RawTransaction {
    #[prost(bytes = "vec", tag = "1")]
    pub execer: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub payload: Vec<u8>,
    #[prost(message, optional, tag = "3")]
    pub signature: Option<RawSignature>,
    #[prost(int64, tag = "4")]
    pub fee: i64,
    #[prost(int64, tag = "5")]
    pub expire: i64,
    #[prost(int64, tag = "6")]
    pub nonce: i64,
    #[prost(string, tag = "7")]
    pub to: String,
    #[prost(int32, tag = "8")]
    pub group_count: i32,
    #[prost(bytes = "vec", tag = "9")]
    pub header: Vec<u8>,
    #[prost(bytes = "vec", tag = "10")]
    pub next: Vec<u8>,
    #[prost(int32, tag = "11")]
    pub chain_id: i32,
}

/// A transaction signature with the signer's compressed public key.
#[derive(Clone, PartialEq, Message)]
pub struct RawSignature {
    #[prost(int32, tag = "1")]
    pub ty: i32,
    #[prost(bytes = "vec", tag = "2")]
    pub pubkey: Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub signature: Vec<u8>,
}

/// Parses the hex answer of `Chain33.CreateTransaction`.
pub fn decode_tx_hex(tx_hex: &str) -> bridge_relayer_utils::Result<RawTransaction> {
    let bytes = hex::decode(tx_hex.trim().trim_start_matches("0x"))
        .map_err(|e| Error::Decode(format!("invalid transaction hex: {e}")))?;
    RawTransaction::decode(bytes.as_slice())
        .map_err(|e| Error::Decode(format!("invalid transaction: {e}")))
}

/// The digest a signature commits to: the transaction without signature.
pub fn signing_hash(tx: &RawTransaction) -> [u8; 32] {
    let mut unsigned = tx.clone();
    unsigned.signature = None;
    Sha256::digest(unsigned.encode_to_vec()).into()
}

/// Signs `tx` in place with at least `fee` paid, valid until `expire`.
pub fn sign_transaction(
    tx: &mut RawTransaction,
    key: &PrivateKey,
    fee: i64,
    expire: i64,
) -> bridge_relayer_utils::Result<()> {
    let signing_key = SigningKey::from_slice(key.as_bytes())
        .map_err(|_| Error::Generic("invalid secp256k1 signing key"))?;
    tx.fee = tx.fee.max(fee);
    tx.expire = expire;
    let hash = signing_hash(tx);
    let signature: EcdsaSignature = signing_key
        .sign_prehash(&hash)
        .map_err(|_| Error::Generic("failed to sign transaction"))?;
    let signature = signature.normalize_s().unwrap_or(signature);
    let pubkey = PublicKey::from(signing_key.verifying_key())
        .to_encoded_point(true)
        .as_bytes()
        .to_vec();
    tx.signature = Some(RawSignature {
        ty: SECP256K1,
        pubkey,
        signature: der_encode(&signature),
    });
    Ok(())
}

/// ASN.1 DER form of an ECDSA signature: a sequence of the two integers.
fn der_encode(signature: &EcdsaSignature) -> Vec<u8> {
    let (r, s) = signature.split_bytes();
    let r = der_integer(&r);
    let s = der_integer(&s);
    let mut out = Vec::with_capacity(2 + r.len() + s.len());
    out.push(0x30);
    out.push((r.len() + s.len()) as u8);
    out.extend(r);
    out.extend(s);
    out
}

fn der_integer(bytes: &[u8]) -> Vec<u8> {
    let start = bytes
        .iter()
        .position(|b| *b != 0)
        .unwrap_or(bytes.len() - 1);
    let value = &bytes[start..];
    // a set high bit would read as negative.
    let pad = value[0] & 0x80 != 0;
    let mut out = Vec::with_capacity(value.len() + 3);
    out.push(0x02);
    out.push((value.len() + usize::from(pad)) as u8);
    if pad {
        out.push(0);
    }
    out.extend_from_slice(value);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn der_integers_should_be_minimal() {
        assert_eq!(der_integer(&[0, 0, 0x12]), vec![0x02, 0x01, 0x12]);
        assert_eq!(der_integer(&[0, 0x80]), vec![0x02, 0x02, 0x00, 0x80]);
        assert_eq!(der_integer(&[0, 0]), vec![0x02, 0x01, 0x00]);
    }
}
