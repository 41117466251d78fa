// Pool accounting: per-option and per-support running totals per
// (market, token). Pure bookkeeping; the Ledger is the only fund mover.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::{Amount, MarketId, OptionId, Token};

/// Running totals for one (market, token) pair.
/// Invariant: `options.iter().sum() + support == total` at all times.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolTotals {
    /// Indexed by option id - 1.
    pub options: Vec<Amount>,
    pub support: Amount,
    pub total: Amount,
}

impl PoolTotals {
    fn new(max_options: u8) -> Self {
        Self {
            options: vec![0; max_options as usize],
            support: 0,
            total: 0,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PoolAccounting {
    pools: HashMap<(MarketId, Token), PoolTotals>,
}

impl PoolAccounting {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_stake(
        &mut self,
        market: MarketId,
        token: &Token,
        option: OptionId,
        amount: Amount,
        max_options: u8,
    ) {
        let totals = self
            .pools
            .entry((market, token.clone()))
            .or_insert_with(|| PoolTotals::new(max_options));
        totals.options[(option - 1) as usize] += amount;
        totals.total += amount;
    }

    pub fn record_support(
        &mut self,
        market: MarketId,
        token: &Token,
        amount: Amount,
        max_options: u8,
    ) {
        let totals = self
            .pools
            .entry((market, token.clone()))
            .or_insert_with(|| PoolTotals::new(max_options));
        totals.support += amount;
        totals.total += amount;
    }

    pub fn option_pool(&self, market: MarketId, option: OptionId, token: &Token) -> Amount {
        self.pools
            .get(&(market, token.clone()))
            .and_then(|t| t.options.get((option - 1) as usize))
            .copied()
            .unwrap_or(0)
    }

    pub fn support_pool(&self, market: MarketId, token: &Token) -> Amount {
        self.pools
            .get(&(market, token.clone()))
            .map(|t| t.support)
            .unwrap_or(0)
    }

    pub fn total_pool(&self, market: MarketId, token: &Token) -> Amount {
        self.pools
            .get(&(market, token.clone()))
            .map(|t| t.total)
            .unwrap_or(0)
    }

    pub fn totals(&self, market: MarketId, token: &Token) -> Option<&PoolTotals> {
        self.pools.get(&(market, token.clone()))
    }

    /// Option shares in basis points of the total pool. An empty pool yields
    /// all zeros.
    pub fn option_share_bps(&self, market: MarketId, token: &Token) -> Vec<u32> {
        match self.pools.get(&(market, token.clone())) {
            Some(t) if t.total > 0 => t
                .options
                .iter()
                .map(|&v| ((v * 10_000) / t.total) as u32)
                .collect(),
            Some(t) => vec![0; t.options.len()],
            None => Vec::new(),
        }
    }

    /// Check the bookkeeping invariant for one (market, token) pair.
    pub fn verify(&self, market: MarketId, token: &Token) -> bool {
        match self.pools.get(&(market, token.clone())) {
            Some(t) => t.options.iter().sum::<Amount>() + t.support == t.total,
            None => true,
        }
    }

    /// Wipe records for a hard-deleted market.
    pub fn forget_market(&mut self, market: MarketId) {
        self.pools.retain(|(m, _), _| *m != market);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_totals_invariant() {
        let mut pools = PoolAccounting::new();
        let token = Token::Native;
        pools.record_stake(1, &token, 1, 10, 2);
        pools.record_stake(1, &token, 2, 30, 2);
        pools.record_support(1, &token, 5, 2);

        assert_eq!(pools.option_pool(1, 1, &token), 10);
        assert_eq!(pools.option_pool(1, 2, &token), 30);
        assert_eq!(pools.support_pool(1, &token), 5);
        assert_eq!(pools.total_pool(1, &token), 45);
        assert!(pools.verify(1, &token));
    }

    #[test]
    fn test_share_bps() {
        let mut pools = PoolAccounting::new();
        let token = Token::Native;
        pools.record_stake(7, &token, 1, 25, 2);
        pools.record_stake(7, &token, 2, 75, 2);
        assert_eq!(pools.option_share_bps(7, &token), vec![2500, 7500]);
    }

    #[test]
    fn test_tokens_are_tracked_independently() {
        let mut pools = PoolAccounting::new();
        let p2p = Token::Fungible("P2P".into());
        pools.record_stake(1, &Token::Native, 1, 100, 2);
        pools.record_stake(1, &p2p, 1, 40, 2);
        assert_eq!(pools.total_pool(1, &Token::Native), 100);
        assert_eq!(pools.total_pool(1, &p2p), 40);
        assert!(pools.verify(1, &Token::Native));
        assert!(pools.verify(1, &p2p));
    }
}
