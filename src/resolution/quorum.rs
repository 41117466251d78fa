// Verifier quorum: the manual resolution path. A fixed admin-managed roster
// votes; the market resolves the instant any option reaches the required
// quorum. One immutable vote per verifier per market.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

use crate::errors::MarketError;
use crate::models::{AdminConfig, MarketId, OptionId};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct QuorumVotes {
    /// market -> verifier -> option
    votes: HashMap<MarketId, HashMap<String, OptionId>>,
}

impl QuorumVotes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a verifier's vote. Returns the winning option when this vote
    /// pushes it to quorum. Verifier membership is checked against the
    /// injected config; market-phase checks belong to the engine.
    pub fn cast(
        &mut self,
        market: MarketId,
        verifier: &str,
        option: OptionId,
        config: &AdminConfig,
    ) -> Result<Option<OptionId>, MarketError> {
        if !config.is_verifier(verifier) {
            return Err(MarketError::NotVerifier(verifier.to_string()));
        }
        let market_votes = self.votes.entry(market).or_default();
        if market_votes.contains_key(verifier) {
            return Err(MarketError::AlreadyVoted(verifier.to_string()));
        }
        market_votes.insert(verifier.to_string(), option);
        let count = market_votes.values().filter(|&&o| o == option).count();
        info!(market, verifier, option, count, "verifier vote cast");
        if count >= config.required_quorum {
            return Ok(Some(option));
        }
        Ok(None)
    }

    pub fn vote_count(&self, market: MarketId, option: OptionId) -> usize {
        self.votes
            .get(&market)
            .map(|v| v.values().filter(|&&o| o == option).count())
            .unwrap_or(0)
    }

    /// The option currently at/over quorum, if any. With the majority
    /// invariant on the roster at most one option can qualify.
    pub fn leader_at_quorum(&self, market: MarketId, config: &AdminConfig) -> Option<OptionId> {
        let market_votes = self.votes.get(&market)?;
        let mut counts: HashMap<OptionId, usize> = HashMap::new();
        for &option in market_votes.values() {
            *counts.entry(option).or_insert(0) += 1;
        }
        counts
            .into_iter()
            .find(|(_, c)| *c >= config.required_quorum)
            .map(|(o, _)| o)
    }

    pub fn forget_market(&mut self, market: MarketId) {
        self.votes.remove(&market);
    }
}
