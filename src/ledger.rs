/// Ledger for the peermarket engine.
///
/// The only component that moves funds. Tracks free balances per
/// (user, token), ERC20-style allowances toward the engine, and three escrow
/// pots: per-market stake escrow, per-market bond escrow, per-request vote
/// escrow. Every movement appends a Transaction record; pool percentages and
/// totals live in PoolAccounting, which never touches funds.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::errors::MarketError;
use crate::models::{Amount, MarketId, OptionId, Token};

// ============================================================================
// TRANSACTION LOG
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxType {
    Deposit,
    Approve,
    Stake,
    /// Creator's own deposit; pooled like a stake but not a user-initiated
    /// stake event.
    CreatorDeposit,
    Support,
    Bond,
    VoteStake,
    Payout,
    Refund,
    Fee,
    BondPayout,
    VoteRefund,
    Sweep,
}

/// A single fund movement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub tx_type: TxType,
    pub account: String,
    pub token: Token,
    pub amount: Amount,
    pub market_id: Option<MarketId>,
    pub option: Option<OptionId>,
    pub timestamp: u64,
}

impl Transaction {
    fn new(tx_type: TxType, account: &str, token: &Token, amount: Amount, timestamp: u64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tx_type,
            account: account.to_string(),
            token: token.clone(),
            amount,
            market_id: None,
            option: None,
            timestamp,
        }
    }
}

// ============================================================================
// LEDGER
// ============================================================================

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Ledger {
    balances: HashMap<(String, Token), Amount>,
    /// Allowance granted by a user to the engine, fungible tokens only.
    allowances: HashMap<(String, Token), Amount>,
    /// Stake + support custody per (market, token).
    market_escrow: HashMap<(MarketId, Token), Amount>,
    /// Assertion/dispute bonds per market (bond currency).
    bond_escrow: HashMap<MarketId, Amount>,
    /// Vote stakes per request id (bond currency).
    vote_escrow: HashMap<String, Amount>,
    pub transactions: Vec<Transaction>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    // === Balances & allowances ===

    pub fn balance(&self, user: &str, token: &Token) -> Amount {
        self.balances
            .get(&(user.to_string(), token.clone()))
            .copied()
            .unwrap_or(0)
    }

    pub fn allowance(&self, user: &str, token: &Token) -> Amount {
        self.allowances
            .get(&(user.to_string(), token.clone()))
            .copied()
            .unwrap_or(0)
    }

    /// Credit a user's free balance (external deposit / faucet).
    pub fn deposit(&mut self, user: &str, token: &Token, amount: Amount, now: u64) {
        *self
            .balances
            .entry((user.to_string(), token.clone()))
            .or_insert(0) += amount;
        self.transactions
            .push(Transaction::new(TxType::Deposit, user, token, amount, now));
        debug!(user, %token, amount, "deposit");
    }

    /// Set the engine allowance for a fungible token (absolute, ERC20 style).
    pub fn approve(&mut self, user: &str, token: &Token, amount: Amount, now: u64) {
        self.allowances
            .insert((user.to_string(), token.clone()), amount);
        self.transactions
            .push(Transaction::new(TxType::Approve, user, token, amount, now));
        debug!(user, %token, amount, "approve");
    }

    /// Pull funds from a user. Fungible tokens are allowance-gated; native
    /// needs only balance. Validates fully before mutating so a failure
    /// leaves no trace.
    fn pull(&mut self, user: &str, token: &Token, amount: Amount) -> Result<(), MarketError> {
        if amount == 0 {
            return Err(MarketError::ZeroAmount);
        }
        let bal_key = (user.to_string(), token.clone());
        let available = self.balances.get(&bal_key).copied().unwrap_or(0);
        if available < amount {
            return Err(MarketError::InsufficientBalance {
                token: token.clone(),
                available,
                required: amount,
            });
        }
        if let Token::Fungible(_) = token {
            let approved = self.allowances.get(&bal_key).copied().unwrap_or(0);
            if approved < amount {
                return Err(MarketError::InsufficientAllowance {
                    token: token.clone(),
                    approved,
                    required: amount,
                });
            }
            self.allowances.insert(bal_key.clone(), approved - amount);
        }
        self.balances.insert(bal_key, available - amount);
        Ok(())
    }

    fn push(&mut self, user: &str, token: &Token, amount: Amount) {
        *self
            .balances
            .entry((user.to_string(), token.clone()))
            .or_insert(0) += amount;
    }

    // === Market stake escrow ===

    pub fn market_escrow(&self, market: MarketId, token: &Token) -> Amount {
        self.market_escrow
            .get(&(market, token.clone()))
            .copied()
            .unwrap_or(0)
    }

    pub fn collect_stake(
        &mut self,
        market: MarketId,
        user: &str,
        token: &Token,
        option: OptionId,
        amount: Amount,
        tx_type: TxType,
        now: u64,
    ) -> Result<(), MarketError> {
        self.pull(user, token, amount)?;
        *self
            .market_escrow
            .entry((market, token.clone()))
            .or_insert(0) += amount;
        let mut tx = Transaction::new(tx_type, user, token, amount, now);
        tx.market_id = Some(market);
        tx.option = Some(option);
        self.transactions.push(tx);
        info!(market, user, %token, option, amount, "stake escrowed");
        Ok(())
    }

    pub fn collect_support(
        &mut self,
        market: MarketId,
        user: &str,
        token: &Token,
        amount: Amount,
        now: u64,
    ) -> Result<(), MarketError> {
        self.pull(user, token, amount)?;
        *self
            .market_escrow
            .entry((market, token.clone()))
            .or_insert(0) += amount;
        let mut tx = Transaction::new(TxType::Support, user, token, amount, now);
        tx.market_id = Some(market);
        self.transactions.push(tx);
        info!(market, user, %token, amount, "support escrowed");
        Ok(())
    }

    /// Pay out of a market's escrow to a user. Used for winner payouts,
    /// refunds, fee skims and orphan-pool sweeps.
    pub fn pay_from_market(
        &mut self,
        market: MarketId,
        user: &str,
        token: &Token,
        amount: Amount,
        tx_type: TxType,
        now: u64,
    ) -> Result<(), MarketError> {
        if amount == 0 {
            return Ok(());
        }
        let key = (market, token.clone());
        let held = self.market_escrow.get(&key).copied().unwrap_or(0);
        if held < amount {
            return Err(MarketError::InsufficientBalance {
                token: token.clone(),
                available: held,
                required: amount,
            });
        }
        self.market_escrow.insert(key, held - amount);
        self.push(user, token, amount);
        let mut tx = Transaction::new(tx_type, user, token, amount, now);
        tx.market_id = Some(market);
        self.transactions.push(tx);
        info!(market, user, %token, amount, ?tx_type, "paid from market escrow");
        Ok(())
    }

    // === Bond escrow ===

    pub fn bond_escrow(&self, market: MarketId) -> Amount {
        self.bond_escrow.get(&market).copied().unwrap_or(0)
    }

    pub fn collect_bond(
        &mut self,
        market: MarketId,
        user: &str,
        token: &Token,
        amount: Amount,
        now: u64,
    ) -> Result<(), MarketError> {
        self.pull(user, token, amount)?;
        *self.bond_escrow.entry(market).or_insert(0) += amount;
        let mut tx = Transaction::new(TxType::Bond, user, token, amount, now);
        tx.market_id = Some(market);
        self.transactions.push(tx);
        info!(market, user, amount, "bond escrowed");
        Ok(())
    }

    pub fn pay_bond(
        &mut self,
        market: MarketId,
        user: &str,
        token: &Token,
        amount: Amount,
        now: u64,
    ) -> Result<(), MarketError> {
        let held = self.bond_escrow.get(&market).copied().unwrap_or(0);
        if held < amount {
            return Err(MarketError::InsufficientBalance {
                token: token.clone(),
                available: held,
                required: amount,
            });
        }
        self.bond_escrow.insert(market, held - amount);
        self.push(user, token, amount);
        let mut tx = Transaction::new(TxType::BondPayout, user, token, amount, now);
        tx.market_id = Some(market);
        self.transactions.push(tx);
        info!(market, user, amount, "bond paid out");
        Ok(())
    }

    // === Vote escrow ===

    pub fn vote_escrow(&self, request_id: &str) -> Amount {
        self.vote_escrow.get(request_id).copied().unwrap_or(0)
    }

    pub fn collect_vote_stake(
        &mut self,
        request_id: &str,
        voter: &str,
        token: &Token,
        amount: Amount,
        now: u64,
    ) -> Result<(), MarketError> {
        self.pull(voter, token, amount)?;
        *self
            .vote_escrow
            .entry(request_id.to_string())
            .or_insert(0) += amount;
        self.transactions
            .push(Transaction::new(TxType::VoteStake, voter, token, amount, now));
        debug!(request_id, voter, amount, "vote stake escrowed");
        Ok(())
    }

    pub fn refund_vote_stake(
        &mut self,
        request_id: &str,
        voter: &str,
        token: &Token,
        amount: Amount,
        now: u64,
    ) -> Result<(), MarketError> {
        let held = self.vote_escrow.get(request_id).copied().unwrap_or(0);
        if held < amount {
            return Err(MarketError::InsufficientBalance {
                token: token.clone(),
                available: held,
                required: amount,
            });
        }
        self.vote_escrow.insert(request_id.to_string(), held - amount);
        self.push(voter, token, amount);
        self.transactions
            .push(Transaction::new(TxType::VoteRefund, voter, token, amount, now));
        debug!(request_id, voter, amount, "vote stake refunded");
        Ok(())
    }

    // === Queries ===

    pub fn transactions_for(&self, user: &str) -> Vec<&Transaction> {
        self.transactions.iter().filter(|t| t.account == user).collect()
    }

    pub fn transactions_by_type(&self, tx_type: TxType) -> Vec<&Transaction> {
        self.transactions.iter().filter(|t| t.tx_type == tx_type).collect()
    }

    /// JSON export of the full transaction log for host-side persistence.
    pub fn export_transactions(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.transactions)
    }

    /// Total stake/support value currently in market escrow, per token.
    /// Bond and vote escrow are denominated in the configured bond token and
    /// tracked separately (`bond_escrow`, `vote_escrow`).
    pub fn total_escrowed(&self, token: &Token) -> Amount {
        self.market_escrow
            .iter()
            .filter(|((_, t), _)| t == token)
            .map(|(_, v)| *v)
            .sum()
    }

    /// Drop escrow slots for a hard-deleted market, including the vote
    /// escrow of the given requests. Only legal once every pot is empty; a
    /// non-empty pot means funds would be orphaned.
    pub fn forget_market(
        &mut self,
        market: MarketId,
        vote_requests: &[String],
    ) -> Result<(), MarketError> {
        let mut residual: Amount = self
            .market_escrow
            .iter()
            .filter(|((m, _), _)| *m == market)
            .map(|(_, v)| *v)
            .sum();
        residual += self.bond_escrow.get(&market).copied().unwrap_or(0);
        for request_id in vote_requests {
            residual += self.vote_escrow.get(request_id).copied().unwrap_or(0);
        }
        if residual > 0 {
            return Err(MarketError::NotSettled(market));
        }
        self.market_escrow.retain(|(m, _), _| *m != market);
        self.bond_escrow.remove(&market);
        for request_id in vote_requests {
            self.vote_escrow.remove(request_id);
        }
        Ok(())
    }
}
