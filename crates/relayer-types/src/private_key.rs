use std::str::FromStr;

use ethereum_types::Secret;
use serde::Deserialize;

/// PrivateKey represents a secp256k1 private key used to sign bridge claims.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey(Secret);

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PrivateKey").finish()
    }
}

impl PrivateKey {
    /// Parses a `0x` prefixed (or bare) 32 bytes hex string.
    pub fn from_hex_str(value: &str) -> Result<Self, String> {
        let trimmed = value.trim();
        let hex_part = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        if hex_part.len() != 64 {
            return Err(format!(
                "expected 64 hex chars (without the 0x prefix) but found {}",
                hex_part.len()
            ));
        }
        Secret::from_str(hex_part)
            .map(Self)
            .map_err(|e| e.to_string())
    }

    /// Lower-case `0x` prefixed hex of the key.
    pub fn to_hex_string(&self) -> String {
        format!("0x{}", hex::encode(self.0.as_bytes()))
    }
}

impl From<Secret> for PrivateKey {
    fn from(secret: Secret) -> Self {
        PrivateKey(secret)
    }
}

impl std::ops::Deref for PrivateKey {
    type Target = Secret;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'de> Deserialize<'de> for PrivateKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct PrivateKeyVistor;
        impl<'de> serde::de::Visitor<'de> for PrivateKeyVistor {
            type Value = PrivateKey;

            fn expecting(
                &self,
                formatter: &mut std::fmt::Formatter,
            ) -> std::fmt::Result {
                formatter.write_str(
                    "hex string or an env var containing a hex string in it",
                )
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                if !value.starts_with("0x") && !value.starts_with('$') {
                    return Err(serde::de::Error::custom(
                        "private key must start with 0x or name an env var with $",
                    ));
                }
                let val = crate::resolve_env_value(value)
                    .map_err(serde::de::Error::custom)?;
                PrivateKey::from_hex_str(&val)
                    .map_err(serde::de::Error::custom)
            }
        }

        deserializer.deserialize_str(PrivateKeyVistor)
    }
}
