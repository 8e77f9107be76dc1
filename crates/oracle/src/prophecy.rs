// Copyright 2022 Webb Technologies Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use bridge_claim_codec::ClaimContent;
use serde::{Deserialize, Serialize};

use crate::validator::{power_of, Validator};

/// Status of a prophecy. Success and Failed are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProphecyStatus {
    /// Waiting for more votes.
    Pending,
    /// The final claim reached the threshold.
    Success,
    /// The threshold can no longer be reached.
    Failed,
}

impl ProphecyStatus {
    /// Whether the status can still change.
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, ProphecyStatus::Pending)
    }
}

impl fmt::Display for ProphecyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProphecyStatus::Pending => write!(f, "pending"),
            ProphecyStatus::Success => write!(f, "success"),
            ProphecyStatus::Failed => write!(f, "failed"),
        }
    }
}

/// The aggregation of all votes cast for one claim id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prophecy {
    /// The oracle id of the claim.
    pub id: String,
    /// Current status.
    pub status: ProphecyStatus,
    /// The winning content, set on success only.
    pub final_claim: Option<ClaimContent>,
    /// Serialized content to the validators who voted for it.
    pub claims_by_content: BTreeMap<String, BTreeSet<String>>,
    /// Validator to the serialized content it voted for.
    pub votes_by_validator: BTreeMap<String, String>,
}

/// Power sums of a prophecy at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tally {
    /// The content with the most power, ties broken by the smallest key.
    pub leader: Option<String>,
    /// Power behind the leader.
    pub leader_power: u64,
    /// Power of every vote cast, whatever the content.
    pub voted_power: u64,
}

impl Prophecy {
    /// A fresh prophecy without votes.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: ProphecyStatus::Pending,
            final_claim: None,
            claims_by_content: BTreeMap::new(),
            votes_by_validator: BTreeMap::new(),
        }
    }

    /// Whether the validator already voted.
    pub fn has_voted(&self, validator: &str) -> bool {
        self.votes_by_validator.contains_key(validator)
    }

    /// Any content recorded so far.
    pub fn recorded_content(&self) -> Option<&str> {
        self.claims_by_content.keys().next().map(String::as_str)
    }

    /// Records a vote, without recomputing the status.
    pub fn add_vote(&mut self, validator: &str, content_key: &str) {
        self.claims_by_content
            .entry(content_key.to_owned())
            .or_default()
            .insert(validator.to_owned());
        self.votes_by_validator
            .insert(validator.to_owned(), content_key.to_owned());
    }

    /// Sums the votes with the current power of each validator. Validators
    /// that left the set since they voted weigh nothing.
    pub fn tally(&self, validators: &[Validator]) -> Tally {
        let mut leader = None;
        let mut leader_power = 0u64;
        let mut voted_power = 0u64;
        for (content, voters) in &self.claims_by_content {
            let power: u64 = voters
                .iter()
                .filter_map(|v| power_of(validators, v))
                .sum();
            voted_power = voted_power.saturating_add(power);
            if leader.is_none() || power > leader_power {
                leader = Some(content.clone());
                leader_power = power;
            }
        }
        Tally {
            leader,
            leader_power,
            voted_power,
        }
    }

    /// Applies the completion rule and returns the new status.
    ///
    /// With `P` the leader's power, `T` the voted power and `Total` the power
    /// of the whole set: success when `P*100 >= threshold*Total`, failure when
    /// `(P + Total - T)*100 < threshold*Total`, pending otherwise.
    pub fn recompute(
        &mut self,
        validators: &[Validator],
        total_power: u64,
        threshold: u64,
    ) -> crate::Result<ProphecyStatus> {
        if self.status.is_terminal() {
            return Ok(self.status);
        }
        let tally = self.tally(validators);
        let p = u128::from(tally.leader_power);
        let t = u128::from(tally.voted_power);
        let total = u128::from(total_power);
        let needed = u128::from(threshold) * total;
        if p * 100 >= needed {
            if let Some(leader) = tally.leader {
                self.final_claim = Some(serde_json::from_str(&leader)?);
                self.status = ProphecyStatus::Success;
            }
        } else if (p + total.saturating_sub(t)) * 100 < needed {
            self.status = ProphecyStatus::Failed;
        }
        Ok(self.status)
    }
}

#[cfg(test)]
mod tests {
    use bridge_claim_codec::ClaimType;
    use ethers::types::U256;

    use super::*;

    fn content(amount: u64) -> ClaimContent {
        ClaimContent {
            claim_type: ClaimType::Lock,
            source_chain_id: 1,
            bridge_contract: "0xbank".into(),
            nonce: 1,
            sender: "0xsender".into(),
            receiver: "1receiver".into(),
            token: String::new(),
            symbol: "eth".into(),
            amount: U256::from(amount),
        }
    }

    fn set() -> Vec<Validator> {
        vec![
            Validator::new("a", 80).unwrap(),
            Validator::new("b", 10).unwrap(),
            Validator::new("c", 10).unwrap(),
        ]
    }

    #[test]
    fn leader_alone_reaches_threshold() {
        let mut p = Prophecy::new("id");
        p.add_vote("a", &content(100).content_key());
        let status = p.recompute(&set(), 100, 70).unwrap();
        assert_eq!(status, ProphecyStatus::Success);
        assert_eq!(p.final_claim, Some(content(100)));
    }

    #[test]
    fn threshold_boundary_should_be_inclusive() {
        let x = content(100).content_key();
        let y = content(101).content_key();

        let mut p = Prophecy::new("id");
        p.add_vote("a", &x);
        assert_eq!(p.recompute(&set(), 100, 90).unwrap(), ProphecyStatus::Pending);
        p.add_vote("b", &y);
        // 80 + 10 (c still undecided) = 90 reaches 90 exactly, so still pending.
        assert_eq!(p.recompute(&set(), 100, 90).unwrap(), ProphecyStatus::Pending);
        p.add_vote("c", &x);
        assert_eq!(p.recompute(&set(), 100, 90).unwrap(), ProphecyStatus::Success);
        assert_eq!(p.final_claim, Some(content(100)));
    }

    #[test]
    fn unreachable_threshold_should_fail() {
        let x = content(100).content_key();
        let y = content(101).content_key();
        let mut p = Prophecy::new("id");
        p.add_vote("a", &x);
        p.add_vote("b", &y);
        p.add_vote("c", &y);
        // leader 80 with nothing left to vote, 80 < 90.
        assert_eq!(p.recompute(&set(), 100, 90).unwrap(), ProphecyStatus::Failed);
        assert_eq!(p.final_claim, None);
    }

    #[test]
    fn terminal_status_should_not_change() {
        let mut p = Prophecy::new("id");
        p.status = ProphecyStatus::Failed;
        p.add_vote("a", &content(1).content_key());
        assert_eq!(p.recompute(&set(), 100, 70).unwrap(), ProphecyStatus::Failed);
    }

    #[test]
    fn removed_validators_weigh_nothing() {
        let mut p = Prophecy::new("id");
        p.add_vote("z", &content(1).content_key());
        let tally = p.tally(&set());
        assert_eq!(tally.leader_power, 0);
        assert_eq!(tally.voted_power, 0);
    }
}
