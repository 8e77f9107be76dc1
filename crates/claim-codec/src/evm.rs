use bridge_relayer_utils::Error;
use ethers::contract::{parse_log, EthEvent};
use ethers::types::{Address, Bytes, Log, H256, U256};

use crate::claim::{ClaimType, WitnessedEvent};

ethers::contract::abigen!(
    BridgeBankContract,
    r#"[
        event LogLock(address from, bytes to, address token, string symbol, uint256 value, uint256 nonce)
        event LogChain33TokenBurn(address token, string symbol, uint256 amount, address owner, bytes receiver, uint256 nonce)
    ]"#,
);

/// The event topics the EVM watcher filters for.
pub fn bridge_bank_topics() -> Vec<H256> {
    vec![LogLockFilter::signature(), LogChain33TokenBurnFilter::signature()]
}

fn format_address(address: Address) -> String {
    format!("{address:?}")
}

/// Receivers on the other chain are emitted as raw bytes of their textual form.
fn format_receiver(receiver: &Bytes) -> String {
    match std::str::from_utf8(receiver) {
        Ok(s) if !s.is_empty() => s.to_owned(),
        _ => format!("0x{}", hex::encode(receiver)),
    }
}

fn nonce_to_u64(nonce: U256) -> crate::Result<u64> {
    if nonce > U256::from(u64::MAX) {
        return Err(Error::Decode(format!("nonce {nonce} does not fit in u64")));
    }
    Ok(nonce.low_u64())
}

/// Decodes a bridge bank log into a witnessed event.
///
/// Returns `Ok(None)` for logs of other events, and [`Error::Decode`] when a
/// log carries one of the bridge topics but does not match its schema.
pub fn decode_bridge_bank_log(log: &Log) -> crate::Result<Option<WitnessedEvent>> {
    let Some(topic) = log.topics.first() else {
        return Ok(None);
    };
    let tx_hash = log
        .transaction_hash
        .ok_or_else(|| Error::Decode("log without transaction hash".into()))?;
    let decode_err = |e: ethers::abi::Error| Error::Decode(e.to_string());
    if *topic == LogLockFilter::signature() {
        let ev: LogLockFilter = parse_log(log.clone()).map_err(decode_err)?;
        Ok(Some(WitnessedEvent {
            claim_type: ClaimType::Lock,
            tx_hash,
            sender: format_address(ev.from),
            receiver: format_receiver(&ev.to),
            token: format_address(ev.token),
            symbol: ev.symbol,
            amount: ev.value,
            nonce: nonce_to_u64(ev.nonce)?,
        }))
    } else if *topic == LogChain33TokenBurnFilter::signature() {
        let ev: LogChain33TokenBurnFilter =
            parse_log(log.clone()).map_err(decode_err)?;
        Ok(Some(WitnessedEvent {
            claim_type: ClaimType::Burn,
            tx_hash,
            sender: format_address(ev.owner),
            receiver: format_receiver(&ev.receiver),
            token: format_address(ev.token),
            symbol: ev.symbol,
            amount: ev.amount,
            nonce: nonce_to_u64(ev.nonce)?,
        }))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use ethers::abi::{encode, Token};

    use super::*;

    fn lock_log() -> Log {
        let data = encode(&[
            Token::Address(Address::repeat_byte(0x01)),
            Token::Bytes(b"1Receiver".to_vec()),
            Token::Address(Address::zero()),
            Token::String("ETH".into()),
            Token::Uint(U256::from(1_000u64)),
            Token::Uint(U256::from(3u64)),
        ]);
        Log {
            topics: vec![LogLockFilter::signature()],
            data: data.into(),
            transaction_hash: Some(H256::repeat_byte(0x22)),
            ..Default::default()
        }
    }

    #[test]
    fn decode_lock_log_should_work() {
        let event = decode_bridge_bank_log(&lock_log()).unwrap().unwrap();
        assert_eq!(event.claim_type, ClaimType::Lock);
        assert_eq!(event.receiver, "1Receiver");
        assert_eq!(
            event.sender,
            "0x0101010101010101010101010101010101010101"
        );
        assert_eq!(event.amount, U256::from(1_000u64));
        assert_eq!(event.nonce, 3);
        assert_eq!(event.tx_hash, H256::repeat_byte(0x22));
    }

    #[test]
    fn malformed_log_is_a_decode_error() {
        let mut log = lock_log();
        log.data = vec![0u8; 3].into();
        assert!(matches!(
            decode_bridge_bank_log(&log),
            Err(Error::Decode(_))
        ));
    }

    #[test]
    fn unrelated_log_is_skipped() {
        let mut log = lock_log();
        log.topics = vec![H256::repeat_byte(0x99)];
        assert_eq!(decode_bridge_bank_log(&log).unwrap(), None);
    }
}
