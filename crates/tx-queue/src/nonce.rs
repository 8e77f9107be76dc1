use std::collections::HashMap;
use std::sync::Arc;

use bridge_relayer_utils::Error;
use tokio::sync::Mutex;

/// The cached nonce of one account.
#[derive(Debug, Default)]
pub struct NonceState {
    next: Option<u64>,
}

impl NonceState {
    /// The nonce the next allocation returns, `None` until seeded.
    pub fn next(&self) -> Option<u64> {
        self.next
    }

    /// Whether the cache needs the chain's pending nonce first.
    pub fn is_seeded(&self) -> bool {
        self.next.is_some()
    }

    /// Seeds the cache with the chain's pending nonce.
    pub fn seed(&mut self, pending: u64) {
        self.next = Some(pending);
    }

    /// Hands out the next nonce.
    pub fn allocate(&mut self) -> bridge_relayer_utils::Result<u64> {
        let nonce = self.next.ok_or_else(|| {
            Error::InvariantViolation("nonce allocated before seeding".into())
        })?;
        self.next = Some(nonce.saturating_add(1));
        Ok(nonce)
    }

    /// Gives `nonce` back after a failed broadcast.
    ///
    /// Only the last allocated nonce can be revoked, anything else would
    /// leave a gap in the account's nonces.
    pub fn revoke(&mut self, nonce: u64) -> bridge_relayer_utils::Result<()> {
        match self.next {
            Some(next) if next == nonce.saturating_add(1) => {
                self.next = Some(nonce);
                Ok(())
            }
            next => Err(Error::InvariantViolation(format!(
                "revoking nonce {nonce} while the next one is {next:?}"
            ))),
        }
    }

    /// Drops the cache, the next allocation asks the chain again.
    pub fn reset(&mut self) {
        self.next = None;
    }
}

/// Nonce caches of the signing accounts, one lock per account.
///
/// Owned by one relayer instance, so several instances can run in the same
/// process without sharing nonces.
#[derive(Debug, Default)]
pub struct NonceManager {
    accounts: parking_lot::Mutex<HashMap<String, Arc<Mutex<NonceState>>>>,
}

impl NonceManager {
    /// An empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// The state of `account`, created unseeded on first use.
    pub fn state(&self, account: &str) -> Arc<Mutex<NonceState>> {
        self.accounts
            .lock()
            .entry(account.to_lowercase())
            .or_default()
            .clone()
    }
}
