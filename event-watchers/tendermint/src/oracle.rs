use bridge_claim_codec::tendermint::BRIDGE_EXECUTOR;
use bridge_claim_codec::ClaimContent;
use bridge_oracle::validator::normalize_address;
use bridge_oracle::{OracleQuery, ProphecyStatus, ProphecyView, Validator};
use bridge_relayer_utils::Error;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::rpc::JsonRpcClient;
use crate::types::{
    ProphecyAnswer, QueryRequest, ThresholdAnswer, TotalPowerAnswer,
    ValidatorsAnswer,
};

/// Answers oracle queries from the bridge executor of a remote node.
#[derive(Debug, Clone)]
pub struct RemoteOracle {
    rpc: JsonRpcClient,
}

impl RemoteOracle {
    /// Creates an oracle asking the node behind `rpc`.
    pub fn new(rpc: JsonRpcClient) -> Self {
        Self { rpc }
    }

    async fn query<T: DeserializeOwned>(
        &self,
        func_name: &str,
        payload: Value,
    ) -> bridge_relayer_utils::Result<T> {
        let request = QueryRequest {
            execer: BRIDGE_EXECUTOR,
            func_name,
            payload,
        };
        self.rpc
            .call("Chain33.Query", serde_json::to_value(request)?)
            .await
    }
}

/// Reads a status as text (`SuccessStatusText`) or as its enum number.
pub fn parse_status(text: &Value) -> ProphecyStatus {
    match text {
        Value::String(s) => {
            let s = s.to_lowercase();
            if s.contains("success") || s.contains("withdraw") {
                ProphecyStatus::Success
            } else if s.contains("fail") {
                ProphecyStatus::Failed
            } else {
                ProphecyStatus::Pending
            }
        }
        Value::Number(n) => match n.as_u64() {
            Some(1) | Some(3) => ProphecyStatus::Success,
            Some(2) => ProphecyStatus::Failed,
            _ => ProphecyStatus::Pending,
        },
        _ => ProphecyStatus::Pending,
    }
}

fn is_not_found(e: &Error) -> bool {
    match e {
        Error::JsonRpc { message, .. } => {
            let message = message.to_lowercase();
            message.contains("not found") || message.contains("not exist")
        }
        _ => false,
    }
}

fn prophecy_view(answer: ProphecyAnswer) -> ProphecyView {
    let final_claim = match answer.status.final_claim.as_str() {
        "" => None,
        raw => match serde_json::from_str::<ClaimContent>(raw) {
            Ok(content) => Some(content),
            Err(e) => {
                tracing::warn!(error = %e, id = %answer.id, "Unreadable final claim");
                None
            }
        },
    };
    let mut validators: Vec<String> = answer
        .claim_validators
        .into_iter()
        .flat_map(|c| c.validators)
        .map(|v| normalize_address(&v))
        .collect();
    validators.sort();
    validators.dedup();
    ProphecyView {
        status: parse_status(&answer.status.text),
        id: answer.id,
        final_claim,
        validators,
    }
}

#[async_trait::async_trait]
impl OracleQuery for RemoteOracle {
    async fn validators(&self) -> bridge_relayer_utils::Result<Vec<Validator>> {
        let answer: ValidatorsAnswer =
            self.query("GetValidators", json!({})).await?;
        Ok(answer
            .validators
            .into_iter()
            .map(|v| Validator {
                address: normalize_address(&v.address),
                power: v.power,
            })
            .collect())
    }

    async fn total_power(&self) -> bridge_relayer_utils::Result<u64> {
        let answer: TotalPowerAnswer =
            self.query("GetTotalPower", json!({})).await?;
        Ok(answer.total_power)
    }

    async fn consensus_threshold(&self) -> bridge_relayer_utils::Result<u64> {
        let answer: ThresholdAnswer =
            self.query("GetConsensusThreshold", json!({})).await?;
        Ok(answer.consensus_threshold)
    }

    #[tracing::instrument(skip(self))]
    async fn prophecy(
        &self,
        claim_id: &str,
    ) -> bridge_relayer_utils::Result<Option<ProphecyView>> {
        let answer: bridge_relayer_utils::Result<ProphecyAnswer> = self
            .query("GetEthProphecy", json!({ "ID": claim_id }))
            .await;
        match answer {
            Ok(answer) => Ok(Some(prophecy_view(answer))),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
