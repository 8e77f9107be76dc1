use serde::{Deserialize, Serialize};

use crate::OracleError;

/// Highest power a single validator can hold, also the threshold ceiling.
pub const MAX_PERCENT: u64 = 100;

/// A validator and its voting power.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    /// Lower-cased address of the validator.
    pub address: String,
    /// Voting power, a positive share.
    pub power: u64,
}

impl Validator {
    /// Creates a validator after checking its power.
    pub fn new(address: &str, power: u64) -> crate::Result<Self> {
        if !is_valid_percent(power) {
            return Err(OracleError::InvalidPower(power));
        }
        Ok(Self {
            address: normalize_address(address),
            power,
        })
    }
}

/// Addresses are compared case insensitively.
pub fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase()
}

/// Accepts values in `(0, 100]`.
pub(crate) const fn is_valid_percent(value: u64) -> bool {
    value > 0 && value <= MAX_PERCENT
}

/// Sum of the powers of the set.
pub fn total_power(validators: &[Validator]) -> u64 {
    validators.iter().map(|v| v.power).sum()
}

/// Power of a validator, `None` when it is not in the set.
pub fn power_of(validators: &[Validator], address: &str) -> Option<u64> {
    validators
        .iter()
        .find(|v| v.address == address)
        .map(|v| v.power)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validator_power_should_be_checked() {
        assert!(matches!(
            Validator::new("0xA", 0),
            Err(OracleError::InvalidPower(0))
        ));
        assert!(matches!(
            Validator::new("0xA", 101),
            Err(OracleError::InvalidPower(101))
        ));
        let v = Validator::new(" 0xAbC ", 100).unwrap();
        assert_eq!(v.address, "0xabc");
    }

    #[test]
    fn total_power_should_work() {
        let set = vec![
            Validator::new("a", 80).unwrap(),
            Validator::new("b", 10).unwrap(),
            Validator::new("c", 10).unwrap(),
        ];
        assert_eq!(total_power(&set), 100);
        assert_eq!(power_of(&set, "b"), Some(10));
        assert_eq!(power_of(&set, "d"), None);
    }
}
