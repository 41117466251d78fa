// Optimistic resolution: assert, optionally dispute, settle.
//
// An asserter posts a claim, a proposed winning option and a bond, opening a
// liveness window. Undisputed assertions auto-settle true at the deadline and
// the bond comes back. A dispute posts a matching bond and routes to the
// stake-weighted voting fallback; settlement then pays both bonds to the
// prevailing side and records the option the vote actually chose.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::info;

use crate::errors::MarketError;
use crate::models::{AdminConfig, Amount, MarketId, OptionId, Token};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assertion {
    pub assertion_id: String,
    pub market_id: MarketId,
    pub claim: String,
    pub asserter: String,
    pub disputer: Option<String>,
    pub assertion_time: u64,
    /// End of the liveness window; disputes must land at or before this.
    pub assertion_deadline: u64,
    /// Settlement unlock. Equals the deadline while undisputed; a dispute
    /// pushes it past the vote deadline by the configured grace.
    pub expiration_time: u64,
    pub currency: Token,
    pub bond: Amount,
    pub identifier: String,
    pub ancillary_data: String,
    pub proposed_option: OptionId,
    pub vote_request: Option<String>,
    pub settled: bool,
    /// True = assertion confirmed. Meaningful only once settled.
    pub result: bool,
    pub settled_option: Option<OptionId>,
}

impl Assertion {
    pub fn disputed(&self) -> bool {
        self.disputer.is_some()
    }
}

/// Bond disposition computed at settlement; the engine executes the ledger
/// movement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementOutcome {
    pub recipient: String,
    pub amount: Amount,
    pub currency: Token,
    pub result: bool,
    pub option: OptionId,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct OptimisticOracle {
    /// One assertion per market.
    assertions: HashMap<MarketId, Assertion>,
}

impl OptimisticOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assertion(&self, market: MarketId) -> Option<&Assertion> {
        self.assertions.get(&market)
    }

    /// Pre-transfer validation for a new assertion. Call before escrowing
    /// the bond so a rejected call leaves no side effects.
    pub fn validate_new_assertion(
        &self,
        market: MarketId,
        bond: Amount,
        currency: &Token,
        config: &AdminConfig,
    ) -> Result<(), MarketError> {
        if self.assertions.contains_key(&market) {
            return Err(MarketError::CannotReassert(market));
        }
        if *currency != config.bond_token {
            return Err(MarketError::BondCurrencyMismatch {
                expected: config.bond_token.clone(),
                got: currency.clone(),
            });
        }
        if bond < config.minimum_bond {
            return Err(MarketError::BondBelowMinimum { amount: bond, minimum: config.minimum_bond });
        }
        Ok(())
    }

    /// Record the assertion after its bond is escrowed.
    pub fn record_assertion(
        &mut self,
        market: MarketId,
        claim: &str,
        asserter: &str,
        proposed_option: OptionId,
        bond: Amount,
        config: &AdminConfig,
        now: u64,
    ) -> &Assertion {
        let mut hasher = Sha256::new();
        hasher.update(market.to_be_bytes());
        hasher.update(asserter.as_bytes());
        hasher.update(now.to_be_bytes());
        hasher.update(claim.as_bytes());
        let assertion_id = hex::encode(hasher.finalize());

        let deadline = now + config.liveness_secs;
        let assertion = Assertion {
            assertion_id,
            market_id: market,
            claim: claim.to_string(),
            asserter: asserter.to_string(),
            disputer: None,
            assertion_time: now,
            assertion_deadline: deadline,
            expiration_time: deadline,
            currency: config.bond_token.clone(),
            bond,
            identifier: config.voting_identifier.clone(),
            ancillary_data: claim.to_string(),
            proposed_option,
            vote_request: None,
            settled: false,
            result: false,
            settled_option: None,
        };
        info!(market, asserter, proposed_option, bond, deadline, "assertion posted");
        self.assertions.entry(market).or_insert(assertion)
    }

    /// Pre-transfer validation for a dispute.
    pub fn validate_dispute(&self, market: MarketId, now: u64) -> Result<&Assertion, MarketError> {
        let assertion = self
            .assertions
            .get(&market)
            .ok_or(MarketError::AssertionNotFound(market))?;
        if assertion.settled {
            return Err(MarketError::AlreadySettled(market));
        }
        if assertion.disputed() {
            return Err(MarketError::AlreadyDisputed(market));
        }
        if now > assertion.assertion_deadline {
            return Err(MarketError::DisputeWindowClosed {
                deadline: assertion.assertion_deadline,
                now,
            });
        }
        Ok(assertion)
    }

    /// Record the dispute after its bond is escrowed. Extends the settlement
    /// lock past the vote deadline.
    pub fn record_dispute(
        &mut self,
        market: MarketId,
        disputer: &str,
        request_id: &str,
        vote_deadline: u64,
        grace: u64,
    ) -> Result<(), MarketError> {
        let assertion = self
            .assertions
            .get_mut(&market)
            .ok_or(MarketError::AssertionNotFound(market))?;
        assertion.disputer = Some(disputer.to_string());
        assertion.vote_request = Some(request_id.to_string());
        assertion.expiration_time = vote_deadline + grace;
        info!(market, disputer, request_id, expiration = assertion.expiration_time, "assertion disputed");
        Ok(())
    }

    /// Timing/phase checks for settlement. For undisputed assertions the
    /// lock is the liveness deadline; for disputed ones the post-vote
    /// expiration.
    pub fn validate_settlement(
        &self,
        market: MarketId,
        now: u64,
    ) -> Result<&Assertion, MarketError> {
        let assertion = self
            .assertions
            .get(&market)
            .ok_or(MarketError::AssertionNotFound(market))?;
        if assertion.settled {
            return Err(MarketError::AlreadySettled(market));
        }
        let unlock = if assertion.disputed() {
            assertion.expiration_time
        } else {
            assertion.assertion_deadline
        };
        if now < unlock {
            return Err(MarketError::NotYetExpired { expiration: unlock, now });
        }
        Ok(assertion)
    }

    /// Finalize the assertion. `vote` carries the tallied verdict and voted
    /// option for disputed assertions; undisputed ones auto-settle true on
    /// the proposed option with the bond returned.
    pub fn commit_settlement(
        &mut self,
        market: MarketId,
        vote: Option<(bool, OptionId)>,
    ) -> Result<SettlementOutcome, MarketError> {
        let assertion = self
            .assertions
            .get_mut(&market)
            .ok_or(MarketError::AssertionNotFound(market))?;

        let outcome = match (assertion.disputer.clone(), vote) {
            (None, _) => SettlementOutcome {
                recipient: assertion.asserter.clone(),
                amount: assertion.bond,
                currency: assertion.currency.clone(),
                result: true,
                option: assertion.proposed_option,
            },
            (Some(disputer), Some((confirmed, option))) => SettlementOutcome {
                recipient: if confirmed {
                    assertion.asserter.clone()
                } else {
                    disputer
                },
                amount: assertion.bond * 2,
                currency: assertion.currency.clone(),
                result: confirmed,
                option,
            },
            (Some(_), None) => return Err(MarketError::NotDisputed(market)),
        };

        assertion.settled = true;
        assertion.result = outcome.result;
        assertion.settled_option = Some(outcome.option);
        info!(
            market,
            result = outcome.result,
            option = outcome.option,
            recipient = %outcome.recipient,
            "assertion settled"
        );
        Ok(outcome)
    }

    pub fn forget_market(&mut self, market: MarketId) {
        self.assertions.remove(&market);
    }
}
