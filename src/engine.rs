/// Market engine: the facade over the ledger, pool accounting, market state
/// machine, resolution protocols and payout book.
///
/// Every public method is one atomic mutating operation. Guards (state,
/// time windows, authorization) are re-validated at call time from current
/// state; all fund movements validate before mutating, so a failed call
/// leaves the engine untouched.

use std::collections::HashMap;
use tracing::{info, warn};

use crate::errors::MarketError;
use crate::ledger::{Ledger, TxType};
use crate::models::{
    AdminConfig, Amount, Clock, CreateMarketParams, Market, MarketId, MarketState, MarketType,
    OptionId, StakePosition, SupportPosition, Token, MAX_MARKET_OPTIONS,
};
use crate::payout::{compute_fees, PayoutEngine};
use crate::pool::PoolAccounting;
use crate::resolution::{
    price_feed, Assertion, OptimisticOracle, PriceFeed, QuorumVotes, SettlementOutcome,
    VoteRequest, VotingEngine,
};

pub struct MarketEngine {
    pub config: AdminConfig,
    clock: Clock,
    pub ledger: Ledger,
    pub pools: PoolAccounting,
    markets: HashMap<MarketId, Market>,
    next_market_id: MarketId,
    /// One stake per (market, user); the first call fixes the side.
    stakes: HashMap<(MarketId, String), StakePosition>,
    supports: HashMap<(MarketId, String, Token), SupportPosition>,
    quorum: QuorumVotes,
    oracle: OptimisticOracle,
    voting: VotingEngine,
    payouts: PayoutEngine,
    feeds: HashMap<String, Box<dyn PriceFeed>>,
}

impl MarketEngine {
    pub fn new(config: AdminConfig) -> Self {
        Self::with_clock(config, Clock::System)
    }

    pub fn with_clock(config: AdminConfig, clock: Clock) -> Self {
        Self {
            config,
            clock,
            ledger: Ledger::new(),
            pools: PoolAccounting::new(),
            markets: HashMap::new(),
            next_market_id: 1,
            stakes: HashMap::new(),
            supports: HashMap::new(),
            quorum: QuorumVotes::new(),
            oracle: OptimisticOracle::new(),
            voting: VotingEngine::new(),
            payouts: PayoutEngine::new(),
            feeds: HashMap::new(),
        }
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Pin the engine clock. Tests drive time explicitly with this.
    pub fn set_time(&mut self, now: u64) {
        self.clock = Clock::Fixed(now);
    }

    pub fn register_price_feed(&mut self, feed_id: &str, feed: Box<dyn PriceFeed>) {
        self.feeds.insert(feed_id.to_string(), feed);
    }

    // === Admin config passthroughs ===

    pub fn add_verifier(&mut self, caller: &str, addr: &str) -> Result<(), MarketError> {
        self.config.add_verifier(caller, addr)
    }

    pub fn remove_verifier(&mut self, caller: &str, addr: &str) -> Result<(), MarketError> {
        self.config.remove_verifier(caller, addr)
    }

    pub fn set_required_quorum(&mut self, caller: &str, quorum: usize) -> Result<(), MarketError> {
        self.config.set_required_quorum(caller, quorum)
    }

    // === Lookups ===

    pub fn market(&self, id: MarketId) -> Option<&Market> {
        self.markets.get(&id)
    }

    fn require_market(&self, id: MarketId) -> Result<&Market, MarketError> {
        self.markets.get(&id).ok_or(MarketError::MarketNotFound(id))
    }

    /// Markets currently in a given state; polling tooling lists Ended
    /// markets this way to drive resolution.
    pub fn markets_in_state(&self, state: MarketState) -> Vec<&Market> {
        let mut list: Vec<&Market> = self.markets.values().filter(|m| m.state == state).collect();
        list.sort_by_key(|m| m.id);
        list
    }

    pub fn stake_position(&self, market: MarketId, user: &str) -> Option<&StakePosition> {
        self.stakes.get(&(market, user.to_string()))
    }

    /// All of one user's stakes, oldest market first.
    pub fn stakes_for(&self, user: &str) -> Vec<&StakePosition> {
        let mut list: Vec<&StakePosition> = self
            .stakes
            .values()
            .filter(|p| p.user == user)
            .collect();
        list.sort_by_key(|p| p.market_id);
        list
    }

    pub fn support_position(
        &self,
        market: MarketId,
        user: &str,
        token: &Token,
    ) -> Option<&SupportPosition> {
        self.supports.get(&(market, user.to_string(), token.clone()))
    }

    pub fn assertion(&self, market: MarketId) -> Option<&Assertion> {
        self.oracle.assertion(market)
    }

    pub fn vote_request(&self, request_id: &str) -> Option<&VoteRequest> {
        self.voting.request(request_id)
    }

    pub fn verifier_vote_count(&self, market: MarketId, option: OptionId) -> usize {
        self.quorum.vote_count(market, option)
    }

    // === Market creation ===

    pub fn create_market(
        &mut self,
        creator: &str,
        params: CreateMarketParams,
    ) -> Result<MarketId, MarketError> {
        let now = self.now();

        if !(params.start_time <= params.stake_end_time
            && params.stake_end_time <= params.end_time
            && params.end_time <= params.resolution_end_time)
        {
            return Err(MarketError::InvalidSchedule {
                stake_end: params.stake_end_time,
                end: params.end_time,
                resolution_end: params.resolution_end_time,
            });
        }
        let valid_options = if params.is_multi_option {
            params.max_options >= 3 && params.max_options <= MAX_MARKET_OPTIONS
        } else {
            params.max_options == 2
        };
        if !valid_options {
            return Err(MarketError::InvalidOptionCount(params.max_options));
        }
        if params.min_stake == 0 {
            return Err(MarketError::ZeroAmount);
        }
        if params.creator_outcome == 0 || params.creator_outcome > params.max_options {
            return Err(MarketError::OptionOutOfRange {
                option: params.creator_outcome,
                max: params.max_options,
            });
        }
        if params.creator_deposit > 0 && params.creator_deposit < params.min_stake {
            return Err(MarketError::DepositBelowMinimum {
                amount: params.creator_deposit,
                minimum: params.min_stake,
            });
        }
        if params.market_type == MarketType::PriceFeed {
            let feed_id = params
                .price_feed
                .as_deref()
                .ok_or(MarketError::MissingPriceFeed(self.next_market_id))?;
            if !self.feeds.contains_key(feed_id) {
                return Err(MarketError::UnknownPriceFeed(feed_id.to_string()));
            }
        }

        let id = self.next_market_id;

        // The deposit transfer is the last fallible step; a failure leaves
        // no market behind.
        if params.creator_deposit > 0 {
            self.ledger.collect_stake(
                id,
                creator,
                &params.payment_token,
                params.creator_outcome,
                params.creator_deposit,
                TxType::CreatorDeposit,
                now,
            )?;
            self.pools.record_stake(
                id,
                &params.payment_token,
                params.creator_outcome,
                params.creator_deposit,
                params.max_options,
            );
            self.stakes.insert(
                (id, creator.to_string()),
                StakePosition {
                    market_id: id,
                    user: creator.to_string(),
                    token: params.payment_token.clone(),
                    option: params.creator_outcome,
                    amount: params.creator_deposit,
                    placed_at: now,
                    claimed: false,
                },
            );
        }

        let market = Market {
            id,
            creator: creator.to_string(),
            metadata_hash: params.metadata_hash,
            is_multi_option: params.is_multi_option,
            max_options: params.max_options,
            payment_token: params.payment_token,
            min_stake: params.min_stake,
            creator_deposit: params.creator_deposit,
            creator_outcome: params.creator_outcome,
            start_time: params.start_time,
            stake_end_time: params.stake_end_time,
            end_time: params.end_time,
            resolution_end_time: params.resolution_end_time,
            state: MarketState::Active,
            winning_option: None,
            is_resolved: false,
            market_type: params.market_type,
            price_feed: params.price_feed,
            price_threshold: params.price_threshold,
            direction: params.direction,
        };
        self.markets.insert(id, market);
        self.next_market_id += 1;
        info!(id, creator, "market created");
        Ok(id)
    }

    // === Staking ===

    /// Stake native value. The market must be native-denominated.
    pub fn place_stake(
        &mut self,
        market: MarketId,
        user: &str,
        option: OptionId,
        amount: Amount,
    ) -> Result<(), MarketError> {
        let token = self.require_market(market)?.payment_token.clone();
        if token != Token::Native {
            return Err(MarketError::WrongPaymentToken { expected: token });
        }
        self.stake_internal(market, user, option, amount)
    }

    /// Stake the market's fungible payment token (allowance-gated).
    pub fn place_stake_with_token(
        &mut self,
        market: MarketId,
        user: &str,
        option: OptionId,
        amount: Amount,
    ) -> Result<(), MarketError> {
        let token = self.require_market(market)?.payment_token.clone();
        if token == Token::Native {
            return Err(MarketError::WrongPaymentToken { expected: token });
        }
        self.stake_internal(market, user, option, amount)
    }

    fn stake_internal(
        &mut self,
        market_id: MarketId,
        user: &str,
        option: OptionId,
        amount: Amount,
    ) -> Result<(), MarketError> {
        let now = self.now();
        let market = self.require_market(market_id)?;

        if market.state != MarketState::Active {
            return Err(MarketError::MarketNotActive(market_id));
        }
        if !market.staking_open(now) {
            return Err(MarketError::StakingClosed(market_id));
        }
        market.validate_option(option)?;
        if amount < market.min_stake {
            return Err(MarketError::StakeBelowMinimum { amount, minimum: market.min_stake });
        }
        if self.stakes.contains_key(&(market_id, user.to_string())) {
            return Err(MarketError::AlreadyStaked { market: market_id, user: user.to_string() });
        }

        let token = market.payment_token.clone();
        let max_options = market.max_options;
        self.ledger
            .collect_stake(market_id, user, &token, option, amount, TxType::Stake, now)?;
        self.pools.record_stake(market_id, &token, option, amount, max_options);
        self.stakes.insert(
            (market_id, user.to_string()),
            StakePosition {
                market_id,
                user: user.to_string(),
                token,
                option,
                amount,
                placed_at: now,
                claimed: false,
            },
        );
        Ok(())
    }

    /// Non-directional support. Accumulates across calls; earns no
    /// winning-option share.
    pub fn support_market(
        &mut self,
        market_id: MarketId,
        user: &str,
        amount: Amount,
    ) -> Result<(), MarketError> {
        let now = self.now();
        let market = self.require_market(market_id)?;
        if market.state != MarketState::Active {
            return Err(MarketError::MarketNotActive(market_id));
        }
        if !market.staking_open(now) {
            return Err(MarketError::StakingClosed(market_id));
        }
        let token = market.payment_token.clone();
        let max_options = market.max_options;
        self.ledger.collect_support(market_id, user, &token, amount, now)?;
        self.pools.record_support(market_id, &token, amount, max_options);
        self.supports
            .entry((market_id, user.to_string(), token.clone()))
            .and_modify(|p| p.amount += amount)
            .or_insert(SupportPosition {
                market_id,
                user: user.to_string(),
                token,
                amount,
            });
        Ok(())
    }

    // === Lifecycle transitions ===

    /// One entry point, two authorization branches: anyone at/after
    /// `end_time`, only the creator before it.
    pub fn end_market(&mut self, market_id: MarketId, caller: &str) -> Result<(), MarketError> {
        let now = self.now();
        let market = self
            .markets
            .get_mut(&market_id)
            .ok_or(MarketError::MarketNotFound(market_id))?;
        if market.state != MarketState::Active {
            return Err(MarketError::MarketNotActive(market_id));
        }
        if now < market.end_time && caller != market.creator {
            return Err(MarketError::EarlyEndNotCreator {
                market: market_id,
                caller: caller.to_string(),
            });
        }
        market.state = MarketState::Ended;
        info!(market_id, caller, early = now < market.end_time, "market ended");
        Ok(())
    }

    /// Admin override: full refund of every position, no fee skim.
    pub fn cancel_market(&mut self, market_id: MarketId, caller: &str) -> Result<(), MarketError> {
        self.config.require_admin(caller)?;
        let state = self.require_market(market_id)?.state;
        if state.is_terminal() {
            return Err(MarketError::TerminalState(market_id));
        }
        self.refund_positions(market_id)?;
        self.refund_resolution_collateral(market_id)?;
        let market = self.markets.get_mut(&market_id).ok_or(MarketError::MarketNotFound(market_id))?;
        market.state = MarketState::Cancelled;
        info!(market_id, "market cancelled, all positions refunded");
        Ok(())
    }

    /// Admin delete. Soft: refund and mark Deleted. Hard: wipe the records
    /// of an already-settled market (all escrow drained).
    pub fn delete_market(
        &mut self,
        market_id: MarketId,
        caller: &str,
        hard: bool,
    ) -> Result<(), MarketError> {
        self.config.require_admin(caller)?;
        let state = self.require_market(market_id)?.state;

        if !hard {
            if state.is_terminal() {
                return Err(MarketError::TerminalState(market_id));
            }
            self.refund_positions(market_id)?;
            self.refund_resolution_collateral(market_id)?;
            let market = self
                .markets
                .get_mut(&market_id)
                .ok_or(MarketError::MarketNotFound(market_id))?;
            market.state = MarketState::Deleted;
            info!(market_id, "market soft-deleted");
            return Ok(());
        }

        if !state.is_terminal() {
            return Err(MarketError::NotSettled(market_id));
        }
        // Refuses while any escrow (unclaimed payouts, live bonds or vote
        // stakes) remains.
        let request_ids = self.voting.requests_for(market_id);
        self.ledger.forget_market(market_id, &request_ids)?;
        self.pools.forget_market(market_id);
        self.quorum.forget_market(market_id);
        self.voting.forget_market(market_id);
        self.oracle.forget_market(market_id);
        self.payouts.forget_market(market_id);
        self.stakes.retain(|(m, _), _| *m != market_id);
        self.supports.retain(|(m, _, _), _| *m != market_id);
        self.markets.remove(&market_id);
        info!(market_id, "market hard-deleted, records wiped");
        Ok(())
    }

    fn refund_positions(&mut self, market_id: MarketId) -> Result<(), MarketError> {
        let now = self.now();
        let stake_keys: Vec<(MarketId, String)> = self
            .stakes
            .keys()
            .filter(|(m, _)| *m == market_id)
            .cloned()
            .collect();
        for key in stake_keys {
            let Some(position) = self.stakes.get_mut(&key) else {
                continue;
            };
            if position.claimed {
                continue;
            }
            let (user, token, amount) =
                (position.user.clone(), position.token.clone(), position.amount);
            position.claimed = true;
            self.ledger
                .pay_from_market(market_id, &user, &token, amount, TxType::Refund, now)?;
        }
        let support_keys: Vec<(MarketId, String, Token)> = self
            .supports
            .keys()
            .filter(|(m, _, _)| *m == market_id)
            .cloned()
            .collect();
        for key in support_keys {
            let Some(position) = self.supports.remove(&key) else {
                continue;
            };
            self.ledger.pay_from_market(
                market_id,
                &position.user,
                &position.token,
                position.amount,
                TxType::Refund,
                now,
            )?;
        }
        Ok(())
    }

    /// Return any live bonds and vote stakes when a market is cancelled or
    /// soft-deleted mid-protocol.
    fn refund_resolution_collateral(&mut self, market_id: MarketId) -> Result<(), MarketError> {
        let now = self.now();
        let Some(assertion) = self.oracle.assertion(market_id) else {
            return Ok(());
        };
        if assertion.settled {
            return Ok(());
        }
        let currency = assertion.currency.clone();
        let bond = assertion.bond;
        let asserter = assertion.asserter.clone();
        let disputer = assertion.disputer.clone();
        let request = assertion.vote_request.clone();

        self.ledger.pay_bond(market_id, &asserter, &currency, bond, now)?;
        if let Some(disputer) = disputer {
            self.ledger.pay_bond(market_id, &disputer, &currency, bond, now)?;
        }
        if let Some(request_id) = request {
            for (voter, stake) in self.voting.voter_stakes(&request_id) {
                self.ledger
                    .refund_vote_stake(&request_id, &voter, &currency, stake, now)?;
            }
        }
        Ok(())
    }

    /// Ended-phase gate shared by every resolution entry point.
    fn require_ended(&self, market_id: MarketId) -> Result<&Market, MarketError> {
        let market = self.require_market(market_id)?;
        match market.state {
            MarketState::Ended => Ok(market),
            MarketState::Active => Err(MarketError::MarketNotEnded(market_id)),
            MarketState::Resolved => Err(MarketError::AlreadyResolved(market_id)),
            MarketState::Cancelled | MarketState::Deleted => {
                Err(MarketError::TerminalState(market_id))
            }
        }
    }

    // === Optimistic resolution ===

    /// Post an assertion: a claim, a proposed winning option and a bond.
    /// Returns the assertion id.
    pub fn request_resolution(
        &mut self,
        market_id: MarketId,
        caller: &str,
        claim: &str,
        option: OptionId,
        bond: Amount,
        currency: Token,
    ) -> Result<String, MarketError> {
        let now = self.now();
        let market = self.require_ended(market_id)?;
        if market.market_type != MarketType::Optimistic {
            return Err(MarketError::WrongResolutionPath(market_id));
        }
        market.validate_option(option)?;
        self.oracle
            .validate_new_assertion(market_id, bond, &currency, &self.config)?;
        self.ledger.collect_bond(market_id, caller, &currency, bond, now)?;
        let assertion =
            self.oracle
                .record_assertion(market_id, claim, caller, option, bond, &self.config, now);
        Ok(assertion.assertion_id.clone())
    }

    /// Dispute a live assertion with a matching bond; opens the voting
    /// fallback and returns its request id.
    pub fn dispute_resolution(
        &mut self,
        market_id: MarketId,
        caller: &str,
        currency: Token,
    ) -> Result<String, MarketError> {
        let now = self.now();
        self.require_ended(market_id)?;
        let assertion = self.oracle.validate_dispute(market_id, now)?;
        if currency != assertion.currency {
            return Err(MarketError::BondCurrencyMismatch {
                expected: assertion.currency.clone(),
                got: currency,
            });
        }
        let (bond, identifier, assertion_time, ancillary, proposed) = (
            assertion.bond,
            assertion.identifier.clone(),
            assertion.assertion_time,
            assertion.ancillary_data.clone(),
            assertion.proposed_option,
        );

        self.ledger.collect_bond(market_id, caller, &currency, bond, now)?;
        let vote_deadline = now + self.config.voting_period_secs;
        let request_id = self.voting.open(
            market_id,
            &identifier,
            assertion_time,
            &ancillary,
            proposed,
            vote_deadline,
        );
        self.oracle.record_dispute(
            market_id,
            caller,
            &request_id,
            vote_deadline,
            self.config.settlement_grace_secs,
        )?;
        Ok(request_id)
    }

    /// Stake into a dispute vote and pick a side. `option` is the voter's
    /// proposed winner; supporting votes are normalized to the asserted
    /// option.
    pub fn vote_on_dispute(
        &mut self,
        market_id: MarketId,
        voter: &str,
        support: bool,
        option: OptionId,
        stake: Amount,
    ) -> Result<(), MarketError> {
        let now = self.now();
        let market = self.require_ended(market_id)?;
        market.validate_option(option)?;
        let assertion = self
            .oracle
            .assertion(market_id)
            .ok_or(MarketError::AssertionNotFound(market_id))?;
        let request_id = assertion
            .vote_request
            .clone()
            .ok_or(MarketError::NotDisputed(market_id))?;
        let currency = assertion.currency.clone();

        // Pre-validate so the stake transfer only happens for a vote that
        // will be accepted.
        let request = self
            .voting
            .request(&request_id)
            .ok_or_else(|| MarketError::VoteRequestNotFound(request_id.clone()))?;
        if request.resolved || now > request.deadline {
            return Err(MarketError::VotingClosed { deadline: request.deadline, now });
        }
        if request.votes.contains_key(voter) {
            return Err(MarketError::AlreadyVoted(voter.to_string()));
        }
        if stake == 0 {
            return Err(MarketError::ZeroAmount);
        }

        self.ledger
            .collect_vote_stake(&request_id, voter, &currency, stake, now)?;
        self.voting.cast(&request_id, voter, support, option, stake, now)
    }

    /// Settle the assertion: auto-true for undisputed assertions past their
    /// liveness window, vote-decided for disputed ones past expiration.
    /// Distributes bonds and refunds voter stakes. The market itself is
    /// resolved by a subsequent `resolve_market` call.
    pub fn settle_resolution(
        &mut self,
        market_id: MarketId,
    ) -> Result<SettlementOutcome, MarketError> {
        let now = self.now();
        self.require_ended(market_id)?;
        let assertion = self.oracle.validate_settlement(market_id, now)?;
        let request_id = assertion.vote_request.clone();

        let vote = match &request_id {
            Some(id) => Some(self.voting.tally(id, now)?),
            None => None,
        };

        let outcome = self.oracle.commit_settlement(market_id, vote)?;
        self.ledger.pay_bond(
            market_id,
            &outcome.recipient,
            &outcome.currency,
            outcome.amount,
            now,
        )?;
        if let Some(id) = request_id {
            for (voter, stake) in self.voting.voter_stakes(&id) {
                self.ledger
                    .refund_vote_stake(&id, &voter, &outcome.currency, stake, now)?;
            }
        }
        Ok(outcome)
    }

    // === Manual (verifier quorum) resolution ===

    /// One immutable verifier vote; resolves the market the instant the
    /// option reaches quorum.
    pub fn cast_vote(
        &mut self,
        market_id: MarketId,
        verifier: &str,
        option: OptionId,
    ) -> Result<(), MarketError> {
        let market = self.require_ended(market_id)?;
        if market.market_type != MarketType::Manual {
            return Err(MarketError::WrongResolutionPath(market_id));
        }
        market.validate_option(option)?;
        if let Some(winner) = self.quorum.cast(market_id, verifier, option, &self.config)? {
            self.finalize_resolution(market_id, winner)?;
        }
        Ok(())
    }

    // === Resolution dispatch ===

    /// Execute the market's fixed resolution protocol. Retryable: a stale
    /// price or pending assertion fails without side effects and the market
    /// stays Ended.
    pub fn resolve_market(&mut self, market_id: MarketId) -> Result<OptionId, MarketError> {
        let now = self.now();
        let market = self.require_ended(market_id)?;

        let winner = match market.market_type {
            MarketType::PriceFeed => {
                let feed_id = market
                    .price_feed
                    .clone()
                    .ok_or(MarketError::MissingPriceFeed(market_id))?;
                let feed = self
                    .feeds
                    .get(&feed_id)
                    .ok_or_else(|| MarketError::UnknownPriceFeed(feed_id.clone()))?;
                let point = feed.latest_price()?;
                if let Err(e) =
                    price_feed::check_freshness(&point, now, self.config.price_max_age_secs)
                {
                    warn!(market_id, %feed_id, "stale price, resolution deferred");
                    return Err(e);
                }
                price_feed::evaluate(point.value, market.price_threshold, market.direction)
            }
            MarketType::Manual => self
                .quorum
                .leader_at_quorum(market_id, &self.config)
                .ok_or(MarketError::QuorumNotReached {
                    required: self.config.required_quorum,
                })?,
            MarketType::Optimistic => {
                let assertion = self
                    .oracle
                    .assertion(market_id)
                    .ok_or(MarketError::AssertionNotFound(market_id))?;
                if !assertion.settled {
                    return Err(MarketError::AssertionPending(market_id));
                }
                assertion
                    .settled_option
                    .ok_or(MarketError::AssertionPending(market_id))?
            }
        };

        self.finalize_resolution(market_id, winner)?;
        Ok(winner)
    }

    /// Write the winning option (immutable from here on), skim the fee once
    /// and open the payout book. An empty winning pool sweeps the
    /// distributable to the treasury, since nobody could ever claim it.
    fn finalize_resolution(
        &mut self,
        market_id: MarketId,
        winner: OptionId,
    ) -> Result<(), MarketError> {
        let now = self.now();
        let market = self
            .markets
            .get_mut(&market_id)
            .ok_or(MarketError::MarketNotFound(market_id))?;
        market.state = MarketState::Resolved;
        market.winning_option = Some(winner);
        market.is_resolved = true;
        let token = market.payment_token.clone();

        let total = self.pools.total_pool(market_id, &token);
        let fees = compute_fees(total, &self.config);
        let treasury = self.config.treasury.clone();
        let partner = self.config.partner_recipient().to_string();
        self.ledger
            .pay_from_market(market_id, &treasury, &token, fees.platform, TxType::Fee, now)?;
        self.ledger
            .pay_from_market(market_id, &partner, &token, fees.partner, TxType::Fee, now)?;

        let distributable = total - fees.total();
        let winning_pool = self.pools.option_pool(market_id, winner, &token);
        if winning_pool == 0 {
            self.ledger
                .pay_from_market(market_id, &treasury, &token, distributable, TxType::Sweep, now)?;
            self.payouts.open_market(market_id, 0, 0, 0);
        } else {
            let claimants = self
                .stakes
                .iter()
                .filter(|((m, _), p)| *m == market_id && p.option == winner)
                .count();
            self.payouts
                .open_market(market_id, distributable, winning_pool, claimants);
        }
        info!(market_id, winner, total, distributable, "market resolved");
        Ok(())
    }

    // === Payout ===

    /// Lazy per-claim payout for a resolved market.
    pub fn claim_payout(&mut self, market_id: MarketId, user: &str) -> Result<Amount, MarketError> {
        let now = self.now();
        let market = self.require_market(market_id)?;
        if !market.is_resolved {
            return Err(MarketError::NotResolved(market_id));
        }
        let winner = market
            .winning_option
            .ok_or(MarketError::NotResolved(market_id))?;

        let key = (market_id, user.to_string());
        let position = self
            .stakes
            .get(&key)
            .ok_or_else(|| MarketError::NothingToClaim { market: market_id, user: user.to_string() })?;
        if position.claimed {
            return Err(MarketError::AlreadyClaimed { market: market_id, user: user.to_string() });
        }
        if position.option != winner {
            return Err(MarketError::NothingToClaim { market: market_id, user: user.to_string() });
        }
        let (token, stake) = (position.token.clone(), position.amount);

        let amount = self.payouts.claim(market_id, user, stake)?;
        self.ledger
            .pay_from_market(market_id, user, &token, amount, TxType::Payout, now)?;
        if let Some(position) = self.stakes.get_mut(&key) {
            position.claimed = true;
        }
        info!(market_id, user, amount, "payout claimed");
        Ok(amount)
    }
}
