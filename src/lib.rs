/// Peermarket: peer-to-peer pari-mutuel prediction market engine
/// Exports all modules for use as a library crate

pub mod engine;
pub mod errors;
pub mod ledger;
pub mod models;
pub mod payout;
pub mod pool;
pub mod resolution;

// Re-export the engine facade
pub use engine::MarketEngine;

// Re-export core data models
pub use models::{
    AdminConfig, Amount, Clock, CreateMarketParams, Market, MarketId, MarketState, MarketType,
    OptionId, PriceDirection, StakePosition, SupportPosition, Token, MAX_MARKET_OPTIONS,
};

// Re-export fund movement and pool bookkeeping
pub use ledger::{Ledger, Transaction, TxType};
pub use pool::{PoolAccounting, PoolTotals};
pub use payout::{compute_fees, winner_share, FeeBreakdown, PayoutEngine};

// Re-export resolution protocols
pub use resolution::{
    derive_request_id, Assertion, OptimisticOracle, PriceFeed, PricePoint, QuorumVotes,
    SettlementOutcome, StaticPriceFeed, Vote, VoteRequest, VotingEngine,
};
pub use resolution::price_feed::{OPTION_NO, OPTION_YES};

pub use errors::{ErrorKind, MarketError};
