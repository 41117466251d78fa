// Stake-weighted voting: the fallback a disputed assertion routes to.
//
// A dispute deterministically derives
// `request_id = hash(identifier, assertion_time, ancillary_data)` and opens a
// request. Each voter stakes once and picks a side; after the deadline the
// tally sums stake per side and yields a verdict plus the voted option id,
// since multi-option markets cannot infer the winner by negating the
// assertion. An unattended vote confirms the assertion.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::info;

use crate::errors::MarketError;
use crate::models::{Amount, MarketId, OptionId};

/// Deterministic request id, shared with the dispute originator.
pub fn derive_request_id(identifier: &str, assertion_time: u64, ancillary_data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(identifier.as_bytes());
    hasher.update(assertion_time.to_be_bytes());
    hasher.update(ancillary_data.as_bytes());
    hex::encode(hasher.finalize())
}

/// One voter's staked ballot. `option` is the voter's proposed winning
/// option; supporting votes are normalized to the asserted option at cast
/// time so the recorded ballot always names the side it backs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    pub stake: Amount,
    pub support: bool,
    pub option: OptionId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRequest {
    pub request_id: String,
    pub market_id: MarketId,
    pub identifier: String,
    pub assertion_time: u64,
    pub ancillary_data: String,
    pub asserted_option: OptionId,
    pub deadline: u64,
    pub votes: HashMap<String, Vote>,
    pub resolved: bool,
    /// Signed tally: supporting stake minus rejecting stake.
    pub result: i128,
    /// Verdict. An unattended vote confirms the assertion, so this is not
    /// always `result > 0`.
    pub confirmed: bool,
    pub voted_option: Option<OptionId>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct VotingEngine {
    requests: HashMap<String, VoteRequest>,
}

impl VotingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a vote for a disputed assertion. Returns the request id.
    pub fn open(
        &mut self,
        market_id: MarketId,
        identifier: &str,
        assertion_time: u64,
        ancillary_data: &str,
        asserted_option: OptionId,
        deadline: u64,
    ) -> String {
        let request_id = derive_request_id(identifier, assertion_time, ancillary_data);
        self.requests.insert(
            request_id.clone(),
            VoteRequest {
                request_id: request_id.clone(),
                market_id,
                identifier: identifier.to_string(),
                assertion_time,
                ancillary_data: ancillary_data.to_string(),
                asserted_option,
                deadline,
                votes: HashMap::new(),
                resolved: false,
                result: 0,
                confirmed: false,
                voted_option: None,
            },
        );
        info!(market_id, request_id, deadline, "vote request opened");
        request_id
    }

    pub fn request(&self, request_id: &str) -> Option<&VoteRequest> {
        self.requests.get(request_id)
    }

    /// Record one stake-weighted vote. Stake escrow happens in the engine
    /// after this validation succeeds.
    pub fn cast(
        &mut self,
        request_id: &str,
        voter: &str,
        support: bool,
        option: OptionId,
        stake: Amount,
        now: u64,
    ) -> Result<(), MarketError> {
        if stake == 0 {
            return Err(MarketError::ZeroAmount);
        }
        let request = self
            .requests
            .get_mut(request_id)
            .ok_or_else(|| MarketError::VoteRequestNotFound(request_id.to_string()))?;
        if request.resolved {
            return Err(MarketError::VotingClosed { deadline: request.deadline, now });
        }
        if now > request.deadline {
            return Err(MarketError::VotingClosed { deadline: request.deadline, now });
        }
        if request.votes.contains_key(voter) {
            return Err(MarketError::AlreadyVoted(voter.to_string()));
        }
        // A supporting ballot backs the asserted option, whatever was passed
        let option = if support { request.asserted_option } else { option };
        request
            .votes
            .insert(voter.to_string(), Vote { stake, support, option });
        info!(request_id, voter, support, option, stake, "vote cast");
        Ok(())
    }

    /// Tally after the deadline, returning (confirmed, winning option).
    /// Majority stake-weight decides; when the assertion is rejected the
    /// winning option is the one with the largest rejecting stake (ties
    /// break to the lowest option id). An unattended vote confirms the
    /// assertion: nobody contradicted it, and a dispute alone must not be
    /// able to overturn the asserted outcome.
    pub fn tally(&mut self, request_id: &str, now: u64) -> Result<(bool, OptionId), MarketError> {
        let request = self
            .requests
            .get_mut(request_id)
            .ok_or_else(|| MarketError::VoteRequestNotFound(request_id.to_string()))?;
        if request.resolved {
            return Ok((
                request.confirmed,
                request.voted_option.unwrap_or(request.asserted_option),
            ));
        }
        if now <= request.deadline {
            return Err(MarketError::VotingStillOpen { deadline: request.deadline, now });
        }

        let mut support_stake: Amount = 0;
        let mut reject_by_option: HashMap<OptionId, Amount> = HashMap::new();
        for vote in request.votes.values() {
            if vote.support {
                support_stake += vote.stake;
            } else {
                *reject_by_option.entry(vote.option).or_insert(0) += vote.stake;
            }
        }
        let reject_stake: Amount = reject_by_option.values().sum();
        let result = support_stake as i128 - reject_stake as i128;
        let confirmed = request.votes.is_empty() || result > 0;

        let option = if confirmed {
            request.asserted_option
        } else {
            let mut candidates: Vec<(OptionId, Amount)> = reject_by_option.into_iter().collect();
            candidates.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
            candidates
                .first()
                .map(|(o, _)| *o)
                .unwrap_or(request.asserted_option)
        };

        request.resolved = true;
        request.result = result;
        request.confirmed = confirmed;
        request.voted_option = Some(option);
        info!(request_id, result, confirmed, option, "vote tallied");
        Ok((confirmed, option))
    }

    /// Request ids opened for a market.
    pub fn requests_for(&self, market: MarketId) -> Vec<String> {
        self.requests
            .values()
            .filter(|r| r.market_id == market)
            .map(|r| r.request_id.clone())
            .collect()
    }

    /// Voter stakes for refund at settlement.
    pub fn voter_stakes(&self, request_id: &str) -> Vec<(String, Amount)> {
        self.requests
            .get(request_id)
            .map(|r| r.votes.iter().map(|(v, vote)| (v.clone(), vote.stake)).collect())
            .unwrap_or_default()
    }

    pub fn forget_market(&mut self, market: MarketId) {
        self.requests.retain(|_, r| r.market_id != market);
    }
}
