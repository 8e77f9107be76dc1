use bridge_claim_codec::ClaimContent;
use bridge_relayer_store::OracleStore;
use serde::{Deserialize, Serialize};

use crate::keeper::OracleKeeper;
use crate::prophecy::{Prophecy, ProphecyStatus};
use crate::validator::Validator;

/// What the query surface tells about a prophecy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProphecyView {
    /// The oracle id.
    pub id: String,
    /// Current status.
    pub status: ProphecyStatus,
    /// The winning content, once succeeded.
    pub final_claim: Option<ClaimContent>,
    /// Validators that voted so far.
    pub validators: Vec<String>,
}

impl From<Prophecy> for ProphecyView {
    fn from(p: Prophecy) -> Self {
        Self {
            id: p.id,
            status: p.status,
            final_claim: p.final_claim,
            validators: p.votes_by_validator.into_keys().collect(),
        }
    }
}

/// Read-only oracle queries, answered by the embedded keeper or a remote
/// prophecy chain node.
#[async_trait::async_trait]
pub trait OracleQuery: Send + Sync {
    /// The validator set.
    async fn validators(&self) -> bridge_relayer_utils::Result<Vec<Validator>>;
    /// Sum of the validators' power.
    async fn total_power(&self) -> bridge_relayer_utils::Result<u64>;
    /// The consensus threshold, in percent.
    async fn consensus_threshold(&self) -> bridge_relayer_utils::Result<u64>;
    /// A prophecy by its oracle id.
    async fn prophecy(
        &self,
        claim_id: &str,
    ) -> bridge_relayer_utils::Result<Option<ProphecyView>>;
}

#[async_trait::async_trait]
impl<S> OracleQuery for OracleKeeper<S>
where
    S: OracleStore + 'static,
{
    async fn validators(&self) -> bridge_relayer_utils::Result<Vec<Validator>> {
        Ok(OracleKeeper::validators(self)?)
    }

    async fn total_power(&self) -> bridge_relayer_utils::Result<u64> {
        Ok(OracleKeeper::total_power(self)?)
    }

    async fn consensus_threshold(&self) -> bridge_relayer_utils::Result<u64> {
        Ok(OracleKeeper::consensus_threshold(self)?)
    }

    async fn prophecy(
        &self,
        claim_id: &str,
    ) -> bridge_relayer_utils::Result<Option<ProphecyView>> {
        Ok(OracleKeeper::prophecy(self, claim_id)?.map(Into::into))
    }
}
