// Pari-mutuel payout engine.
//
// Fees are skimmed once at resolution, before any per-staker division. A
// winner's share is `stake * distributable / winning_pool` in integer math;
// the last winning claimant absorbs the division remainder so aggregate
// payouts equal the distributable pool exactly. Support contributions enter
// the distributable total but earn no option-based share.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::errors::MarketError;
use crate::models::{AdminConfig, Amount, MarketId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub platform: Amount,
    pub partner: Amount,
}

impl FeeBreakdown {
    pub fn total(&self) -> Amount {
        self.platform + self.partner
    }
}

/// One-time skim, basis points of the gross pool.
pub fn compute_fees(total_pool: Amount, config: &AdminConfig) -> FeeBreakdown {
    FeeBreakdown {
        platform: total_pool * config.platform_fee_bps as Amount / 10_000,
        partner: total_pool * config.partner_fee_bps as Amount / 10_000,
    }
}

/// Truncating share computation. Never exceeds `distributable` in aggregate
/// across stakers because each stake divides into the same pool.
pub fn winner_share(stake: Amount, winning_pool: Amount, distributable: Amount) -> Amount {
    if winning_pool == 0 {
        return 0;
    }
    stake * distributable / winning_pool
}

/// Per-market claim bookkeeping, populated at resolution time.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MarketPayout {
    distributable: Amount,
    winning_pool: Amount,
    paid: Amount,
    claimants_remaining: usize,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PayoutEngine {
    markets: HashMap<MarketId, MarketPayout>,
    claimed: HashSet<(MarketId, String)>,
}

impl PayoutEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resolved market. `claimant_count` is the number of winning
    /// stake positions (creator deposit included when it sits on the winning
    /// option).
    pub fn open_market(
        &mut self,
        market: MarketId,
        distributable: Amount,
        winning_pool: Amount,
        claimant_count: usize,
    ) {
        self.markets.insert(
            market,
            MarketPayout {
                distributable,
                winning_pool,
                paid: 0,
                claimants_remaining: claimant_count,
            },
        );
        debug!(market, distributable, winning_pool, claimant_count, "payout book opened");
    }

    pub fn has_claimed(&self, market: MarketId, user: &str) -> bool {
        self.claimed.contains(&(market, user.to_string()))
    }

    /// Compute and record one winner's claim. The final claimant receives
    /// whatever is left of the distributable pool (dust policy).
    pub fn claim(
        &mut self,
        market: MarketId,
        user: &str,
        stake: Amount,
    ) -> Result<Amount, MarketError> {
        if self.has_claimed(market, user) {
            return Err(MarketError::AlreadyClaimed { market, user: user.to_string() });
        }
        let book = self
            .markets
            .get_mut(&market)
            .ok_or(MarketError::NotResolved(market))?;

        let amount = if book.claimants_remaining <= 1 {
            book.distributable - book.paid
        } else {
            winner_share(stake, book.winning_pool, book.distributable)
        };

        book.paid += amount;
        book.claimants_remaining = book.claimants_remaining.saturating_sub(1);
        self.claimed.insert((market, user.to_string()));
        debug!(market, user, stake, amount, "claim computed");
        Ok(amount)
    }

    /// Unclaimed remainder of a market's distributable pool.
    pub fn unclaimed(&self, market: MarketId) -> Amount {
        self.markets
            .get(&market)
            .map(|b| b.distributable - b.paid)
            .unwrap_or(0)
    }

    pub fn forget_market(&mut self, market: MarketId) {
        self.markets.remove(&market);
        self.claimed.retain(|(m, _)| *m != market);
    }
}
