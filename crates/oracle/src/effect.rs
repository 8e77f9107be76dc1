use bridge_claim_codec::{denormalize_amount, ClaimContent, ClaimType};
use bridge_relayer_utils::probe;

use crate::ledger::{Ledger, LedgerBatch};

/// Applies the economic effect of a successful claim on the prophecy chain.
///
/// It is called by the [`Bridge`](crate::Bridge) on the transition into
/// success only. The ledger commit is marked with the claim's oracle id, so
/// a replay after a crash between the commit and the prophecy write changes
/// nothing.
#[derive(Debug, Clone)]
pub struct ClaimEffectApplier<L> {
    ledger: L,
    escrow: String,
    decimals: u8,
}

impl<L: Ledger> ClaimEffectApplier<L> {
    /// Creates an applier crediting assets of `decimals` decimals, releasing
    /// locked assets out of `escrow`.
    pub fn new(ledger: L, escrow: impl Into<String>, decimals: u8) -> Self {
        Self {
            ledger,
            escrow: escrow.into(),
            decimals,
        }
    }

    /// The ledger effects are applied to.
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// The escrow account.
    pub fn escrow(&self) -> &str {
        &self.escrow
    }

    /// A lock mints the bridged representation to the receiver, a burn
    /// releases the locked asset from the escrow to the receiver.
    #[tracing::instrument(skip_all, fields(claim_type = %claim.claim_type, nonce = claim.nonce))]
    pub fn apply(&self, claim: &ClaimContent) -> crate::Result<()> {
        let amount = denormalize_amount(claim.amount, self.decimals)?;
        let batch = LedgerBatch::once(format!("claim/{}", claim.oracle_id()));
        let batch = match claim.claim_type {
            ClaimType::Lock => batch.credit(&claim.receiver, &claim.asset(), amount),
            ClaimType::Burn => batch
                .debit(&self.escrow, &claim.symbol, amount)
                .credit(&claim.receiver, &claim.symbol, amount),
        };
        if !self.ledger.commit(batch)? {
            tracing::warn!(claim_id = %claim.oracle_id(), "Claim effect already applied");
            return Ok(());
        }
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::Oracle,
            effect = %claim.claim_type,
            receiver = %claim.receiver,
            amount = %amount,
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ethers::types::U256;

    use super::*;
    use crate::ledger::InMemoryLedger;
    use crate::OracleError;

    fn content(claim_type: ClaimType) -> ClaimContent {
        ClaimContent {
            claim_type,
            source_chain_id: 1,
            bridge_contract: "0xbank".into(),
            nonce: 1,
            sender: "0xsender".into(),
            receiver: "1receiver".into(),
            token: "0xtoken".into(),
            symbol: "bty".into(),
            amount: U256::from(500u64),
        }
    }

    #[test]
    fn lock_effect_should_mint() {
        let applier = ClaimEffectApplier::new(InMemoryLedger::default(), "escrow", 8);
        applier.apply(&content(ClaimType::Lock)).unwrap();
        assert_eq!(
            applier.ledger().balance("1receiver", "bty0xtoken").unwrap(),
            U256::from(500u64)
        );
    }

    #[test]
    #[tracing_test::traced_test]
    fn replayed_effect_should_change_nothing() {
        let applier = ClaimEffectApplier::new(InMemoryLedger::default(), "escrow", 8);
        applier.apply(&content(ClaimType::Lock)).unwrap();
        applier.apply(&content(ClaimType::Lock)).unwrap();
        assert_eq!(
            applier.ledger().balance("1receiver", "bty0xtoken").unwrap(),
            U256::from(500u64)
        );
        assert!(logs_contain("Claim effect already applied"));
    }

    #[test]
    fn burn_effect_should_release_escrow() {
        let ledger = InMemoryLedger::default();
        let applier = ClaimEffectApplier::new(ledger.clone(), "escrow", 8);
        assert!(matches!(
            applier.apply(&content(ClaimType::Burn)),
            Err(OracleError::InsufficientBalance { .. })
        ));
        ledger.mint("escrow", "bty", 800u64.into()).unwrap();
        applier.apply(&content(ClaimType::Burn)).unwrap();
        assert_eq!(ledger.balance("1receiver", "bty").unwrap(), U256::from(500u64));
        assert_eq!(ledger.balance("escrow", "bty").unwrap(), U256::from(300u64));
    }
}
