use std::collections::HashMap;
use std::sync::Arc;

use bridge_relayer_store::KeyValueStore;
use bridge_relayer_types::{ChainKind, PrivateKey};
use bridge_relayer_utils::{probe, Error};
use ethers::core::k256::SecretKey;
use ethers::signers::{LocalWallet, Signer};
use ethers::utils::keccak256;
use parking_lot::RwLock;
use tokio::sync::watch;

const NAMESPACE: &str = "key-store";
const PASSPHRASE_KEY: &[u8] = b"passphrase";

fn key_slot(chain: ChainKind) -> Vec<u8> {
    format!("key:{chain}").into_bytes()
}

/// Derives the `0x` address of a secp256k1 key, the same on both chains.
pub fn key_address(key: &PrivateKey) -> bridge_relayer_utils::Result<String> {
    let secret = SecretKey::from_bytes(key.as_bytes().into())?;
    let wallet = LocalWallet::from(secret);
    Ok(format!("0x{}", hex::encode(wallet.address().as_bytes())))
}

/// Gates the use of the relayer signing keys behind a passphrase.
///
/// Keys imported at runtime are persisted in the `key-store` namespace and
/// only usable while unlocked. Keys given in the configuration are usable
/// whenever the manager is unlocked too; when every enabled chain has one,
/// the manager starts unlocked.
#[derive(Clone)]
pub struct KeyManager<S> {
    store: S,
    configured: Arc<HashMap<ChainKind, PrivateKey>>,
    imported: Arc<RwLock<HashMap<ChainKind, PrivateKey>>>,
    unlocked: Arc<watch::Sender<bool>>,
}

impl<S> std::fmt::Debug for KeyManager<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyManager")
            .field("unlocked", &*self.unlocked.borrow())
            .finish()
    }
}

impl<S: KeyValueStore> KeyManager<S> {
    /// Creates a manager over `store` with keys coming from the configuration.
    pub fn new(
        store: S,
        configured: HashMap<ChainKind, PrivateKey>,
        start_unlocked: bool,
    ) -> Self {
        let (unlocked, _) = watch::channel(start_unlocked);
        Self {
            store,
            configured: Arc::new(configured),
            imported: Arc::default(),
            unlocked: Arc::new(unlocked),
        }
    }

    /// Whether the keys are usable right now.
    pub fn is_unlocked(&self) -> bool {
        *self.unlocked.borrow()
    }

    /// A receiver notified on every lock/unlock.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.unlocked.subscribe()
    }

    fn check_or_set_passphrase(
        &self,
        passphrase: &str,
    ) -> bridge_relayer_utils::Result<()> {
        let hash = keccak256(passphrase.as_bytes());
        match self.store.get_value(NAMESPACE, PASSPHRASE_KEY)? {
            Some(stored) if stored.as_slice() == hash.as_slice() => Ok(()),
            Some(_) => Err(Error::WrongPassphrase),
            None => {
                tracing::info!("Setting the relayer passphrase");
                self.store.put_value(NAMESPACE, PASSPHRASE_KEY, &hash)
            }
        }
    }

    fn set_unlocked(&self, unlocked: bool) {
        self.unlocked.send_replace(unlocked);
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::KeyManager,
            unlocked,
        );
    }

    /// Unlocks the keys, the first call sets the passphrase.
    #[tracing::instrument(skip_all)]
    pub fn unlock(&self, passphrase: &str) -> bridge_relayer_utils::Result<()> {
        self.check_or_set_passphrase(passphrase)?;
        let mut imported = HashMap::new();
        for chain in [ChainKind::Evm, ChainKind::Tendermint] {
            if let Some(raw) = self.store.get_value(NAMESPACE, &key_slot(chain))?
            {
                let hex = String::from_utf8_lossy(&raw);
                let key = PrivateKey::from_hex_str(&hex).map_err(|e| {
                    Error::InvariantViolation(format!(
                        "stored {chain} key is corrupted: {e}"
                    ))
                })?;
                imported.insert(chain, key);
            }
        }
        *self.imported.write() = imported;
        self.set_unlocked(true);
        tracing::info!("Relayer keys unlocked");
        Ok(())
    }

    /// Locks the keys until the next [`KeyManager::unlock`].
    pub fn lock(&self) {
        self.imported.write().clear();
        self.set_unlocked(false);
        tracing::info!("Relayer keys locked");
    }

    /// Imports the signing key of `chain` and returns its address.
    #[tracing::instrument(skip(self, private_key_hex, passphrase))]
    pub fn import_key(
        &self,
        chain: ChainKind,
        private_key_hex: &str,
        passphrase: &str,
    ) -> bridge_relayer_utils::Result<String> {
        let key = PrivateKey::from_hex_str(private_key_hex)
            .map_err(|e| Error::Decode(format!("invalid private key: {e}")))?;
        let address = key_address(&key)?;
        self.check_or_set_passphrase(passphrase)?;
        self.store.put_value(
            NAMESPACE,
            &key_slot(chain),
            key.to_hex_string().as_bytes(),
        )?;
        if self.is_unlocked() {
            self.imported.write().insert(chain, key);
        }
        tracing::info!(%chain, %address, "Imported relayer key");
        Ok(address)
    }

    /// Replaces the passphrase.
    pub fn change_passphrase(
        &self,
        old: &str,
        new: &str,
    ) -> bridge_relayer_utils::Result<()> {
        self.check_or_set_passphrase(old)?;
        self.store
            .put_value(NAMESPACE, PASSPHRASE_KEY, &keccak256(new.as_bytes()))
    }

    /// The key signing for `chain`; imported keys win over configured ones.
    pub fn signing_key(
        &self,
        chain: ChainKind,
    ) -> bridge_relayer_utils::Result<PrivateKey> {
        if !self.is_unlocked() {
            return Err(Error::KeysLocked);
        }
        self.imported
            .read()
            .get(&chain)
            .or_else(|| self.configured.get(&chain))
            .cloned()
            .ok_or_else(|| Error::KeyNotImported(chain.to_string()))
    }

    /// Address of the key signing for `chain`.
    pub fn address(
        &self,
        chain: ChainKind,
    ) -> bridge_relayer_utils::Result<String> {
        key_address(&self.signing_key(chain)?)
    }
}

#[cfg(test)]
mod tests {
    use bridge_relayer_store::InMemoryStore;

    use super::*;

    const KEY: &str =
        "0x4f3edf983ac636a65a842ce7c78d9aa706d3b113bce9c46f30d7d21715b23b1d";

    #[test]
    fn key_address_should_work() {
        let key = PrivateKey::from_hex_str(KEY).unwrap();
        assert_eq!(
            key_address(&key).unwrap(),
            "0x90f8bf6a479f320ead074411a4b0e7944ea8c9c1"
        );
    }

    #[test]
    fn unlock_flow_should_work() {
        let store = InMemoryStore::default();
        let keys = KeyManager::new(store.clone(), HashMap::new(), false);
        let mut rx = keys.subscribe();
        assert!(matches!(
            keys.signing_key(ChainKind::Evm),
            Err(Error::KeysLocked)
        ));
        // the first import sets the passphrase.
        let address = keys.import_key(ChainKind::Evm, KEY, "secret").unwrap();
        assert!(address.starts_with("0x"));
        assert!(matches!(keys.unlock("nope"), Err(Error::WrongPassphrase)));
        keys.unlock("secret").unwrap();
        assert!(*rx.borrow_and_update());
        assert_eq!(keys.address(ChainKind::Evm).unwrap(), address);
        assert!(matches!(
            keys.signing_key(ChainKind::Tendermint),
            Err(Error::KeyNotImported(_))
        ));

        keys.lock();
        assert!(!keys.is_unlocked());

        // a restarted manager over the same store finds the key again.
        let restarted = KeyManager::new(store, HashMap::new(), false);
        restarted.change_passphrase("secret", "other").unwrap();
        assert!(restarted.unlock("secret").is_err());
        restarted.unlock("other").unwrap();
        assert_eq!(restarted.address(ChainKind::Evm).unwrap(), address);
    }

    #[test]
    fn configured_keys_should_work() {
        let key = PrivateKey::from_hex_str(KEY).unwrap();
        let keys = KeyManager::new(
            InMemoryStore::default(),
            HashMap::from([(ChainKind::Tendermint, key)]),
            true,
        );
        assert!(keys.is_unlocked());
        assert!(keys.signing_key(ChainKind::Tendermint).is_ok());
    }
}
