use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bridge_relayer_store::KeyValueStore;
use ethers::types::U256;
use parking_lot::{Mutex, RwLock};

use crate::OracleError;

/// Namespace of the ledger in a [`KeyValueStore`].
pub const LEDGER_NAMESPACE: &str = "ledger";

#[derive(Debug, Clone)]
enum Entry {
    Credit {
        account: String,
        asset: String,
        amount: U256,
    },
    Debit {
        account: String,
        asset: String,
        amount: U256,
    },
}

/// Balance changes and records committed together.
///
/// A batch carrying a marker is committed at most once: committing it again
/// is a no-op.
#[derive(Debug, Clone, Default)]
pub struct LedgerBatch {
    marker: Option<String>,
    entries: Vec<Entry>,
    records: Vec<(String, Vec<u8>)>,
}

impl LedgerBatch {
    /// An unmarked batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// A batch committed at most once under `marker`.
    pub fn once(marker: impl Into<String>) -> Self {
        Self {
            marker: Some(marker.into()),
            ..Default::default()
        }
    }

    /// Adds `amount` of `asset` to `account`.
    pub fn credit(mut self, account: &str, asset: &str, amount: U256) -> Self {
        self.entries.push(Entry::Credit {
            account: account.to_owned(),
            asset: asset.to_owned(),
            amount,
        });
        self
    }

    /// Takes `amount` of `asset` from `account`.
    pub fn debit(mut self, account: &str, asset: &str, amount: U256) -> Self {
        self.entries.push(Entry::Debit {
            account: account.to_owned(),
            asset: asset.to_owned(),
            amount,
        });
        self
    }

    /// Stores `value` under `key`, readable with [`Ledger::record`].
    pub fn record(mut self, key: impl Into<String>, value: Vec<u8>) -> Self {
        self.records.push((key.into(), value));
        self
    }
}

type BalanceKey = (String, String);

fn balance_key(account: &str, asset: &str) -> BalanceKey {
    (account.to_lowercase(), asset.to_lowercase())
}

/// Runs the entries over the current balances and returns the new ones.
///
/// Nothing is written here, so a failing entry leaves the ledger untouched.
fn plan<F>(entries: &[Entry], mut current: F) -> crate::Result<HashMap<BalanceKey, U256>>
where
    F: FnMut(&BalanceKey) -> crate::Result<U256>,
{
    let mut changed: HashMap<BalanceKey, U256> = HashMap::new();
    for entry in entries {
        let (account, asset, amount, credit) = match entry {
            Entry::Credit {
                account,
                asset,
                amount,
            } => (account, asset, *amount, true),
            Entry::Debit {
                account,
                asset,
                amount,
            } => (account, asset, *amount, false),
        };
        let key = balance_key(account, asset);
        let available = match changed.get(&key) {
            Some(balance) => *balance,
            None => current(&key)?,
        };
        let next = if credit {
            available.checked_add(amount).ok_or_else(|| {
                OracleError::BalanceOverflow {
                    account: account.clone(),
                    asset: asset.clone(),
                }
            })?
        } else {
            available.checked_sub(amount).ok_or_else(|| {
                OracleError::InsufficientBalance {
                    account: account.clone(),
                    asset: asset.clone(),
                    needed: amount.to_string(),
                    available: available.to_string(),
                }
            })?
        };
        changed.insert(key, next);
    }
    Ok(changed)
}

/// Account balances per asset, in the asset's minimal units.
///
/// Amounts are integers all the way down. Every change goes through
/// [`Ledger::commit`], which applies a whole [`LedgerBatch`] or nothing.
pub trait Ledger: Clone + Send + Sync {
    /// Balance of `account` in `asset`.
    fn balance(&self, account: &str, asset: &str) -> crate::Result<U256>;
    /// A record stored by an earlier commit.
    fn record(&self, key: &str) -> crate::Result<Option<Vec<u8>>>;
    /// Applies `batch`, returns `false` without any change if its marker
    /// was committed before.
    fn commit(&self, batch: LedgerBatch) -> crate::Result<bool>;

    /// Creates `amount` of `asset` for `account`.
    fn mint(&self, account: &str, asset: &str, amount: U256) -> crate::Result<()> {
        self.commit(LedgerBatch::new().credit(account, asset, amount))
            .map(|_| ())
    }

    /// Destroys `amount` of `asset` held by `account`.
    fn burn(&self, account: &str, asset: &str, amount: U256) -> crate::Result<()> {
        self.commit(LedgerBatch::new().debit(account, asset, amount))
            .map(|_| ())
    }

    /// Moves `amount` of `asset` from one account to another.
    fn transfer(
        &self,
        from: &str,
        to: &str,
        asset: &str,
        amount: U256,
    ) -> crate::Result<()> {
        let batch = LedgerBatch::new()
            .debit(from, asset, amount)
            .credit(to, asset, amount);
        self.commit(batch).map(|_| ())
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    balances: HashMap<BalanceKey, U256>,
    markers: HashSet<String>,
    records: HashMap<String, Vec<u8>>,
}

/// A [`Ledger`] kept in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    state: Arc<RwLock<LedgerState>>,
}

impl Ledger for InMemoryLedger {
    fn balance(&self, account: &str, asset: &str) -> crate::Result<U256> {
        Ok(self
            .state
            .read()
            .balances
            .get(&balance_key(account, asset))
            .copied()
            .unwrap_or_default())
    }

    fn record(&self, key: &str) -> crate::Result<Option<Vec<u8>>> {
        Ok(self.state.read().records.get(key).cloned())
    }

    fn commit(&self, batch: LedgerBatch) -> crate::Result<bool> {
        let mut state = self.state.write();
        if let Some(marker) = &batch.marker {
            if state.markers.contains(marker) {
                return Ok(false);
            }
        }
        let changed = plan(&batch.entries, |key| {
            Ok(state.balances.get(key).copied().unwrap_or_default())
        })?;
        state.balances.extend(changed);
        state.records.extend(batch.records);
        if let Some(marker) = batch.marker {
            state.markers.insert(marker);
        }
        Ok(true)
    }
}

/// A [`Ledger`] persisted in a [`KeyValueStore`], one atomic write per
/// commit.
#[derive(Clone)]
pub struct StoreLedger<S> {
    store: S,
    // serializes the read-modify-write of a commit.
    lock: Arc<Mutex<()>>,
}

impl<S> std::fmt::Debug for StoreLedger<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreLedger").finish()
    }
}

impl<S: KeyValueStore> StoreLedger<S> {
    /// Creates a ledger over `store`.
    pub fn new(store: S) -> Self {
        Self {
            store,
            lock: Arc::new(Mutex::new(())),
        }
    }

    fn read_balance(&self, key: &BalanceKey) -> crate::Result<U256> {
        let raw = self
            .store
            .get_value(LEDGER_NAMESPACE, balance_path(key).as_bytes())?;
        Ok(raw.map(|bytes| U256::from_big_endian(&bytes)).unwrap_or_default())
    }
}

fn balance_path((account, asset): &BalanceKey) -> String {
    format!("balance/{account}/{asset}")
}

fn marker_path(marker: &str) -> String {
    format!("applied/{marker}")
}

fn record_path(key: &str) -> String {
    format!("record/{key}")
}

impl<S: KeyValueStore> Ledger for StoreLedger<S> {
    fn balance(&self, account: &str, asset: &str) -> crate::Result<U256> {
        self.read_balance(&balance_key(account, asset))
    }

    fn record(&self, key: &str) -> crate::Result<Option<Vec<u8>>> {
        Ok(self
            .store
            .get_value(LEDGER_NAMESPACE, record_path(key).as_bytes())?)
    }

    fn commit(&self, batch: LedgerBatch) -> crate::Result<bool> {
        let _guard = self.lock.lock();
        if let Some(marker) = &batch.marker {
            let applied = self
                .store
                .get_value(LEDGER_NAMESPACE, marker_path(marker).as_bytes())?;
            if applied.is_some() {
                return Ok(false);
            }
        }
        let changed = plan(&batch.entries, |key| self.read_balance(key))?;
        let mut writes = Vec::with_capacity(changed.len() + batch.records.len() + 1);
        for (key, balance) in changed {
            let mut bytes = [0u8; 32];
            balance.to_big_endian(&mut bytes);
            writes.push((balance_path(&key).into_bytes(), bytes.to_vec()));
        }
        for (key, value) in batch.records {
            writes.push((record_path(&key).into_bytes(), value));
        }
        if let Some(marker) = batch.marker {
            writes.push((marker_path(&marker).into_bytes(), vec![1]));
        }
        self.store.put_values(LEDGER_NAMESPACE, &writes)?;
        Ok(true)
    }
}
