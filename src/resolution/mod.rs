// Resolution protocols: price feed, verifier quorum, optimistic
// assertion/dispute with stake-weighted voting fallback.
//
// The engine dispatches on the market's fixed `market_type` and writes the
// winning option exactly once.

pub mod optimistic;
pub mod price_feed;
pub mod quorum;
pub mod voting;

pub use optimistic::{Assertion, OptimisticOracle, SettlementOutcome};
pub use price_feed::{PriceFeed, PricePoint, StaticPriceFeed};
pub use quorum::QuorumVotes;
pub use voting::{derive_request_id, Vote, VoteRequest, VotingEngine};
