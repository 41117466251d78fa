// Data models for the peermarket engine

use serde::{Deserialize, Serialize};

use crate::errors::MarketError;

/// Smallest-unit token amount. Integer math throughout; division remainders
/// are handled by the payout dust policy.
pub type Amount = u128;

/// Sequential market identifier.
pub type MarketId = u64;

/// 1-based option identifier. Binary markets: 1 = Yes, 2 = No.
pub type OptionId = u8;

/// Upper bound on outcome options for multi-option markets.
pub const MAX_MARKET_OPTIONS: u8 = 10;

/// Stake/bond denomination. `Native` is the chain-native unit and needs no
/// allowance; `Fungible` is an allowance-gated token identified by address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Token {
    Native,
    Fungible(String),
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Native => write!(f, "native"),
            Token::Fungible(addr) => write!(f, "token:{}", addr),
        }
    }
}

/// Market lifecycle states. Transitions are monotonic except for the
/// admin-triggered Cancelled/Deleted overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketState {
    Active,
    Ended,
    Resolved,
    Cancelled,
    Deleted,
}

impl MarketState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MarketState::Resolved | MarketState::Cancelled | MarketState::Deleted)
    }
}

/// Resolution protocol, fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketType {
    PriceFeed,
    Optimistic,
    Manual,
}

/// Comparison direction for price-feed markets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceDirection {
    Over,
    Under,
}

/// A prediction market.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    pub id: MarketId,
    pub creator: String,

    /// Opaque content hash; consumers resolve it to title/options/description
    /// off-path.
    pub metadata_hash: String,

    pub is_multi_option: bool,
    pub max_options: u8,
    pub payment_token: Token,
    pub min_stake: Amount,

    /// Creator's own stake, placed at creation on `creator_outcome`.
    /// Zero means the creator posted no deposit.
    pub creator_deposit: Amount,
    pub creator_outcome: OptionId,

    pub start_time: u64,
    pub stake_end_time: u64,
    pub end_time: u64,
    pub resolution_end_time: u64,

    pub state: MarketState,
    pub winning_option: Option<OptionId>,
    pub is_resolved: bool,

    pub market_type: MarketType,
    pub price_feed: Option<String>,
    pub price_threshold: Amount,
    pub direction: PriceDirection,
}

impl Market {
    /// Whether new stake/support is accepted right now.
    pub fn staking_open(&self, now: u64) -> bool {
        self.state == MarketState::Active && now < self.stake_end_time
    }

    pub fn validate_option(&self, option: OptionId) -> Result<(), MarketError> {
        if option == 0 || option > self.max_options {
            return Err(MarketError::OptionOutOfRange { option, max: self.max_options });
        }
        Ok(())
    }
}

/// Parameters for `create_market`. The engine assigns the id and stamps the
/// creator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMarketParams {
    pub metadata_hash: String,
    pub is_multi_option: bool,
    pub max_options: u8,
    pub payment_token: Token,
    pub min_stake: Amount,
    pub creator_deposit: Amount,
    pub creator_outcome: OptionId,
    pub start_time: u64,
    pub stake_end_time: u64,
    pub end_time: u64,
    pub resolution_end_time: u64,
    pub market_type: MarketType,
    pub price_feed: Option<String>,
    pub price_threshold: Amount,
    pub direction: PriceDirection,
}

/// A user's directional stake. One per user per market; the first stake fixes
/// the side permanently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakePosition {
    pub market_id: MarketId,
    pub user: String,
    pub token: Token,
    pub option: OptionId,
    pub amount: Amount,
    pub placed_at: u64,
    pub claimed: bool,
}

/// Non-directional liquidity contribution. Counted in the distributable
/// total, never entitled to a winning-option share.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportPosition {
    pub market_id: MarketId,
    pub user: String,
    pub token: Token,
    pub amount: Amount,
}

// ============================================================================
// ADMIN CONFIG
// ============================================================================

/// Process-wide admin-mutable configuration, injected into the engine rather
/// than read from ambient globals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    pub admin: String,
    pub treasury: String,
    /// Optional partner fee recipient; fees fall back to the treasury.
    pub partner: Option<String>,

    pub platform_fee_bps: u32,
    pub partner_fee_bps: u32,

    /// Currency for assertion/dispute bonds and vote stakes.
    pub bond_token: Token,
    pub minimum_bond: Amount,

    /// Liveness window for undisputed assertions.
    pub liveness_secs: u64,
    /// Voting window opened by a dispute.
    pub voting_period_secs: u64,
    /// Post-vote grace before settlement unlocks.
    pub settlement_grace_secs: u64,

    /// Maximum age of a price-feed read at resolution time.
    pub price_max_age_secs: u64,

    /// Identifier mixed into vote request ids.
    pub voting_identifier: String,

    pub max_verifiers: usize,
    pub required_quorum: usize,
    verifiers: Vec<String>,
}

impl AdminConfig {
    pub fn new(admin: &str, treasury: &str) -> Self {
        Self {
            admin: admin.to_string(),
            treasury: treasury.to_string(),
            partner: None,
            platform_fee_bps: 200,
            partner_fee_bps: 100,
            bond_token: Token::Native,
            minimum_bond: 100,
            liveness_secs: 7200,
            voting_period_secs: 86_400,
            settlement_grace_secs: 3600,
            price_max_age_secs: 3600,
            voting_identifier: "YES_OR_NO_QUERY".to_string(),
            max_verifiers: 21,
            required_quorum: 1,
            verifiers: Vec::new(),
        }
    }

    pub fn require_admin(&self, caller: &str) -> Result<(), MarketError> {
        if caller != self.admin {
            return Err(MarketError::NotAdmin(caller.to_string()));
        }
        Ok(())
    }

    pub fn is_verifier(&self, addr: &str) -> bool {
        self.verifiers.iter().any(|v| v == addr)
    }

    pub fn verifiers(&self) -> &[String] {
        &self.verifiers
    }

    pub fn verifier_count(&self) -> usize {
        self.verifiers.len()
    }

    /// Fee recipient for the partner share.
    pub fn partner_recipient(&self) -> &str {
        self.partner.as_deref().unwrap_or(&self.treasury)
    }

    // Quorum safety: with required_quorum > verifier_count / 2, at most one
    // option can ever reach quorum. Enforced on every roster mutation.
    fn check_quorum_invariant(quorum: usize, verifiers: usize) -> Result<(), MarketError> {
        if verifiers > 0 && quorum <= verifiers / 2 {
            return Err(MarketError::QuorumTooLow { quorum, verifiers });
        }
        Ok(())
    }

    pub fn add_verifier(&mut self, caller: &str, addr: &str) -> Result<(), MarketError> {
        self.require_admin(caller)?;
        if self.is_verifier(addr) {
            return Err(MarketError::AlreadyVerifier(addr.to_string()));
        }
        if self.verifiers.len() >= self.max_verifiers {
            return Err(MarketError::RosterFull { max: self.max_verifiers });
        }
        Self::check_quorum_invariant(self.required_quorum, self.verifiers.len() + 1)?;
        self.verifiers.push(addr.to_string());
        Ok(())
    }

    pub fn remove_verifier(&mut self, caller: &str, addr: &str) -> Result<(), MarketError> {
        self.require_admin(caller)?;
        let pos = self
            .verifiers
            .iter()
            .position(|v| v == addr)
            .ok_or_else(|| MarketError::UnknownVerifier(addr.to_string()))?;
        Self::check_quorum_invariant(self.required_quorum, self.verifiers.len() - 1)?;
        self.verifiers.remove(pos);
        Ok(())
    }

    pub fn set_required_quorum(&mut self, caller: &str, quorum: usize) -> Result<(), MarketError> {
        self.require_admin(caller)?;
        if quorum == 0 {
            return Err(MarketError::QuorumTooLow { quorum, verifiers: self.verifiers.len() });
        }
        Self::check_quorum_invariant(quorum, self.verifiers.len())?;
        self.required_quorum = quorum;
        Ok(())
    }
}

// ============================================================================
// CLOCK
// ============================================================================

/// Time source for every gate check. `Fixed` makes tests deterministic;
/// `System` reads the wall clock.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum Clock {
    System,
    Fixed(u64),
}

impl Clock {
    pub fn now(&self) -> u64 {
        match self {
            Clock::System => std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
            Clock::Fixed(t) => *t,
        }
    }
}
