use bridge_relayer_utils::Error;
use ethers::types::U256;

/// Decimals every claim amount is expressed in.
pub const CLAIM_DECIMALS: u8 = 8;

fn pow10(exp: u8) -> Option<U256> {
    U256::from(10u8).checked_pow(U256::from(exp))
}

/// Rescales `amount` from `from` decimals to `to` decimals.
///
/// Scaling down truncates, so at most `10^(from - to) - 1` minimal units are
/// lost. Scaling up never truncates and fails with [`Error::AmountOverflow`]
/// if the result does not fit.
pub fn rescale(amount: U256, from: u8, to: u8) -> crate::Result<U256> {
    let overflow = || Error::AmountOverflow {
        amount: amount.to_string(),
        from,
        to,
    };
    match from.cmp(&to) {
        std::cmp::Ordering::Equal => Ok(amount),
        std::cmp::Ordering::Greater => {
            let factor = pow10(from - to).ok_or_else(overflow)?;
            Ok(amount / factor)
        }
        std::cmp::Ordering::Less => {
            let factor = pow10(to - from).ok_or_else(overflow)?;
            amount.checked_mul(factor).ok_or_else(overflow)
        }
    }
}

/// Normalizes an amount given in `source_decimals` to the 8 decimals of a claim.
pub fn normalize_amount(amount: U256, source_decimals: u8) -> crate::Result<U256> {
    rescale(amount, source_decimals, CLAIM_DECIMALS)
}

/// Scales a claim amount back to the native decimals of the destination token.
pub fn denormalize_amount(
    amount: U256,
    destination_decimals: u8,
) -> crate::Result<U256> {
    rescale(amount, CLAIM_DECIMALS, destination_decimals)
}

/// Minimal big endian bytes of the amount, empty for zero.
pub fn amount_bytes(amount: U256) -> Vec<u8> {
    let mut buf = [0u8; 32];
    amount.to_big_endian(&mut buf);
    let first = buf.iter().position(|b| *b != 0).unwrap_or(buf.len());
    buf[first..].to_vec()
}

/// (De)serializes a [`U256`] as a decimal string.
pub mod decimal_string {
    use ethers::types::U256;
    use serde::{de, Deserialize, Deserializer, Serializer};

    /// Serializes the amount as a base 10 string.
    pub fn serialize<S: Serializer>(
        amount: &U256,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&amount.to_string())
    }

    /// Parses a base 10 string into an amount.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<U256, D::Error> {
        let s = String::deserialize(deserializer)?;
        U256::from_dec_str(&s).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_amount_should_work() {
        // 1.5 eth
        let wei = U256::from(1_500_000_000_000_000_000u128);
        assert_eq!(normalize_amount(wei, 18).unwrap(), U256::from(150_000_000u64));
        // 1.5 of a 6 decimals token
        assert_eq!(
            normalize_amount(U256::from(1_500_000u64), 6).unwrap(),
            U256::from(150_000_000u64)
        );
        assert_eq!(normalize_amount(U256::from(42u64), 8).unwrap(), U256::from(42u64));
    }

    #[test]
    fn round_trip_loss_should_be_bounded() {
        let original = U256::from(1_234_567_890_123_456_789u128);
        let normalized = normalize_amount(original, 18).unwrap();
        let back = denormalize_amount(normalized, 18).unwrap();
        assert!(back <= original);
        assert!(original - back < U256::from(10_000_000_000u64));

        let small = U256::from(123_456u64);
        let back = denormalize_amount(normalize_amount(small, 6).unwrap(), 6)
            .unwrap();
        assert_eq!(back, small);
    }

    #[test]
    fn amount_overflow_should_fail() {
        let err = normalize_amount(U256::MAX, 0).unwrap_err();
        assert!(matches!(err, Error::AmountOverflow { from: 0, to: 8, .. }));
        assert!(rescale(U256::one(), 0, 200).is_err());
    }

    #[test]
    fn amount_bytes_should_work() {
        assert!(amount_bytes(U256::zero()).is_empty());
        assert_eq!(amount_bytes(U256::from(100u64)), vec![100u8]);
        assert_eq!(amount_bytes(U256::from(0x0102u64)), vec![1u8, 2u8]);
    }
}
