/// Error taxonomy for the peermarket engine.
///
/// Every failure is synchronous, atomic and state-preserving; each variant is
/// a distinguishable reason code. `kind()` groups variants into the four
/// caller-facing classes (validation, state, authorization, funds).

use serde::{Deserialize, Serialize};

use crate::models::{Amount, MarketId, OptionId, Token};

/// Coarse classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Bad parameters, rejected before any mutation.
    Validation,
    /// Wrong phase or time window; no side effects.
    State,
    /// Caller lacks the privilege for this entry point.
    Authorization,
    /// Transfer or allowance failure; the whole call aborts.
    InsufficientFunds,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketError {
    // === Validation ===
    MarketNotFound(MarketId),
    InvalidSchedule { stake_end: u64, end: u64, resolution_end: u64 },
    InvalidOptionCount(u8),
    OptionOutOfRange { option: OptionId, max: u8 },
    StakeBelowMinimum { amount: Amount, minimum: Amount },
    DepositBelowMinimum { amount: Amount, minimum: Amount },
    ZeroAmount,
    WrongPaymentToken { expected: Token },
    UnknownPriceFeed(String),
    MissingPriceFeed(MarketId),
    QuorumTooLow { quorum: usize, verifiers: usize },
    RosterFull { max: usize },
    AlreadyVerifier(String),
    UnknownVerifier(String),
    AssertionNotFound(MarketId),
    VoteRequestNotFound(String),

    // === State ===
    MarketNotActive(MarketId),
    StakingClosed(MarketId),
    AlreadyStaked { market: MarketId, user: String },
    MarketNotEnded(MarketId),
    AlreadyResolved(MarketId),
    NotResolved(MarketId),
    TerminalState(MarketId),
    NotSettled(MarketId),
    CannotReassert(MarketId),
    DisputeWindowClosed { deadline: u64, now: u64 },
    AlreadyDisputed(MarketId),
    NotDisputed(MarketId),
    NotYetExpired { expiration: u64, now: u64 },
    AlreadySettled(MarketId),
    AssertionPending(MarketId),
    VotingClosed { deadline: u64, now: u64 },
    VotingStillOpen { deadline: u64, now: u64 },
    AlreadyVoted(String),
    QuorumNotReached { required: usize },
    StalePrice { updated_at: u64, max_age: u64, now: u64 },
    PriceUnavailable(String),
    WrongResolutionPath(MarketId),
    AlreadyClaimed { market: MarketId, user: String },
    NothingToClaim { market: MarketId, user: String },

    // === Authorization ===
    NotAdmin(String),
    NotVerifier(String),
    EarlyEndNotCreator { market: MarketId, caller: String },

    // === Funds ===
    InsufficientBalance { token: Token, available: Amount, required: Amount },
    InsufficientAllowance { token: Token, approved: Amount, required: Amount },
    BondBelowMinimum { amount: Amount, minimum: Amount },
    BondCurrencyMismatch { expected: Token, got: Token },
}

impl MarketError {
    pub fn kind(&self) -> ErrorKind {
        use MarketError::*;
        match self {
            MarketNotFound(_)
            | InvalidSchedule { .. }
            | InvalidOptionCount(_)
            | OptionOutOfRange { .. }
            | StakeBelowMinimum { .. }
            | DepositBelowMinimum { .. }
            | ZeroAmount
            | WrongPaymentToken { .. }
            | UnknownPriceFeed(_)
            | MissingPriceFeed(_)
            | QuorumTooLow { .. }
            | RosterFull { .. }
            | AlreadyVerifier(_)
            | UnknownVerifier(_)
            | AssertionNotFound(_)
            | VoteRequestNotFound(_) => ErrorKind::Validation,

            MarketNotActive(_)
            | StakingClosed(_)
            | AlreadyStaked { .. }
            | MarketNotEnded(_)
            | AlreadyResolved(_)
            | NotResolved(_)
            | TerminalState(_)
            | NotSettled(_)
            | CannotReassert(_)
            | DisputeWindowClosed { .. }
            | AlreadyDisputed(_)
            | NotDisputed(_)
            | NotYetExpired { .. }
            | AlreadySettled(_)
            | AssertionPending(_)
            | VotingClosed { .. }
            | VotingStillOpen { .. }
            | AlreadyVoted(_)
            | QuorumNotReached { .. }
            | StalePrice { .. }
            | PriceUnavailable(_)
            | WrongResolutionPath(_)
            | AlreadyClaimed { .. }
            | NothingToClaim { .. } => ErrorKind::State,

            NotAdmin(_) | NotVerifier(_) | EarlyEndNotCreator { .. } => ErrorKind::Authorization,

            InsufficientBalance { .. }
            | InsufficientAllowance { .. }
            | BondBelowMinimum { .. }
            | BondCurrencyMismatch { .. } => ErrorKind::InsufficientFunds,
        }
    }

    /// Stable machine-readable reason code.
    pub fn code(&self) -> &'static str {
        use MarketError::*;
        match self {
            MarketNotFound(_) => "MARKET_NOT_FOUND",
            InvalidSchedule { .. } => "INVALID_SCHEDULE",
            InvalidOptionCount(_) => "INVALID_OPTION_COUNT",
            OptionOutOfRange { .. } => "OPTION_OUT_OF_RANGE",
            StakeBelowMinimum { .. } => "STAKE_BELOW_MINIMUM",
            DepositBelowMinimum { .. } => "DEPOSIT_BELOW_MINIMUM",
            ZeroAmount => "ZERO_AMOUNT",
            WrongPaymentToken { .. } => "WRONG_PAYMENT_TOKEN",
            UnknownPriceFeed(_) => "UNKNOWN_PRICE_FEED",
            MissingPriceFeed(_) => "MISSING_PRICE_FEED",
            QuorumTooLow { .. } => "QUORUM_TOO_LOW",
            RosterFull { .. } => "ROSTER_FULL",
            AlreadyVerifier(_) => "ALREADY_VERIFIER",
            UnknownVerifier(_) => "UNKNOWN_VERIFIER",
            AssertionNotFound(_) => "ASSERTION_NOT_FOUND",
            VoteRequestNotFound(_) => "VOTE_REQUEST_NOT_FOUND",
            MarketNotActive(_) => "MARKET_NOT_ACTIVE",
            StakingClosed(_) => "STAKING_CLOSED",
            AlreadyStaked { .. } => "ALREADY_STAKED",
            MarketNotEnded(_) => "MARKET_NOT_ENDED",
            AlreadyResolved(_) => "ALREADY_RESOLVED",
            NotResolved(_) => "NOT_RESOLVED",
            TerminalState(_) => "TERMINAL_STATE",
            NotSettled(_) => "NOT_SETTLED",
            CannotReassert(_) => "CANNOT_REASSERT",
            DisputeWindowClosed { .. } => "DISPUTE_WINDOW_CLOSED",
            AlreadyDisputed(_) => "ALREADY_DISPUTED",
            NotDisputed(_) => "NOT_DISPUTED",
            NotYetExpired { .. } => "NOT_YET_EXPIRED",
            AlreadySettled(_) => "ALREADY_SETTLED",
            AssertionPending(_) => "ASSERTION_PENDING",
            VotingClosed { .. } => "VOTING_CLOSED",
            VotingStillOpen { .. } => "VOTING_STILL_OPEN",
            AlreadyVoted(_) => "ALREADY_VOTED",
            QuorumNotReached { .. } => "QUORUM_NOT_REACHED",
            StalePrice { .. } => "STALE_PRICE",
            PriceUnavailable(_) => "PRICE_UNAVAILABLE",
            WrongResolutionPath(_) => "WRONG_RESOLUTION_PATH",
            AlreadyClaimed { .. } => "ALREADY_CLAIMED",
            NothingToClaim { .. } => "NOTHING_TO_CLAIM",
            NotAdmin(_) => "NOT_ADMIN",
            NotVerifier(_) => "NOT_VERIFIER",
            EarlyEndNotCreator { .. } => "EARLY_END_NOT_CREATOR",
            InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            InsufficientAllowance { .. } => "INSUFFICIENT_ALLOWANCE",
            BondBelowMinimum { .. } => "BOND_BELOW_MINIMUM",
            BondCurrencyMismatch { .. } => "BOND_CURRENCY_MISMATCH",
        }
    }
}

impl std::fmt::Display for MarketError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use MarketError::*;
        match self {
            MarketNotFound(id) => write!(f, "Market {} not found", id),
            InvalidSchedule { stake_end, end, resolution_end } => write!(
                f,
                "Invalid schedule: require stake_end {} <= end {} <= resolution_end {}",
                stake_end, end, resolution_end
            ),
            InvalidOptionCount(n) => write!(f, "Invalid option count: {}", n),
            OptionOutOfRange { option, max } => {
                write!(f, "Option {} out of range 1..={}", option, max)
            }
            StakeBelowMinimum { amount, minimum } => {
                write!(f, "Stake {} below minimum {}", amount, minimum)
            }
            DepositBelowMinimum { amount, minimum } => {
                write!(f, "Creator deposit {} below minimum stake {}", amount, minimum)
            }
            ZeroAmount => write!(f, "Amount must be positive"),
            WrongPaymentToken { expected } => {
                write!(f, "Market is denominated in {}", expected)
            }
            UnknownPriceFeed(id) => write!(f, "Price feed {} is not registered", id),
            MissingPriceFeed(id) => write!(f, "Market {} has no price feed configured", id),
            QuorumTooLow { quorum, verifiers } => write!(
                f,
                "Quorum {} does not hold a majority of {} verifiers",
                quorum, verifiers
            ),
            RosterFull { max } => write!(f, "Verifier roster is full (max {})", max),
            AlreadyVerifier(addr) => write!(f, "Already a verifier: {}", addr),
            UnknownVerifier(addr) => write!(f, "Not a verifier: {}", addr),
            AssertionNotFound(id) => write!(f, "No assertion for market {}", id),
            VoteRequestNotFound(id) => write!(f, "Vote request not found: {}", id),
            MarketNotActive(id) => write!(f, "Market {} is not active", id),
            StakingClosed(id) => write!(f, "Staking window closed for market {}", id),
            AlreadyStaked { market, user } => {
                write!(f, "{} already holds a stake in market {}", user, market)
            }
            MarketNotEnded(id) => write!(f, "Market {} has not ended", id),
            AlreadyResolved(id) => write!(f, "Market {} is already resolved", id),
            NotResolved(id) => write!(f, "Market {} is not resolved", id),
            TerminalState(id) => write!(f, "Market {} is in a terminal state", id),
            NotSettled(id) => write!(f, "Market {} has not settled", id),
            CannotReassert(id) => write!(f, "Market {} already has an assertion", id),
            DisputeWindowClosed { deadline, now } => {
                write!(f, "Dispute window closed at {} (now {})", deadline, now)
            }
            AlreadyDisputed(id) => write!(f, "Assertion for market {} is already disputed", id),
            NotDisputed(id) => write!(f, "Assertion for market {} was never disputed", id),
            NotYetExpired { expiration, now } => {
                write!(f, "Settlement locked until {} (now {})", expiration, now)
            }
            AlreadySettled(id) => write!(f, "Assertion for market {} is already settled", id),
            AssertionPending(id) => {
                write!(f, "Assertion for market {} has not settled yet", id)
            }
            VotingClosed { deadline, now } => {
                write!(f, "Voting closed at {} (now {})", deadline, now)
            }
            VotingStillOpen { deadline, now } => {
                write!(f, "Voting open until {} (now {})", deadline, now)
            }
            AlreadyVoted(voter) => write!(f, "{} already voted", voter),
            QuorumNotReached { required } => {
                write!(f, "No option has reached the quorum of {}", required)
            }
            StalePrice { updated_at, max_age, now } => write!(
                f,
                "Price updated at {} is older than {}s (now {})",
                updated_at, max_age, now
            ),
            PriceUnavailable(feed) => write!(f, "Price feed {} returned no data", feed),
            WrongResolutionPath(id) => {
                write!(f, "Market {} uses a different resolution protocol", id)
            }
            AlreadyClaimed { market, user } => {
                write!(f, "{} already claimed winnings for market {}", user, market)
            }
            NothingToClaim { market, user } => {
                write!(f, "{} has nothing to claim for market {}", user, market)
            }
            NotAdmin(caller) => write!(f, "Not the admin: {}", caller),
            NotVerifier(caller) => write!(f, "Not a verifier: {}", caller),
            EarlyEndNotCreator { market, caller } => write!(
                f,
                "Only the creator may end market {} before its deadline, not {}",
                market, caller
            ),
            InsufficientBalance { token, available, required } => write!(
                f,
                "Insufficient {} balance: have {}, need {}",
                token, available, required
            ),
            InsufficientAllowance { token, approved, required } => write!(
                f,
                "Insufficient {} allowance: approved {}, need {}",
                token, approved, required
            ),
            BondBelowMinimum { amount, minimum } => {
                write!(f, "Bond {} below minimum {}", amount, minimum)
            }
            BondCurrencyMismatch { expected, got } => {
                write!(f, "Bond must be posted in {}, got {}", expected, got)
            }
        }
    }
}

impl std::error::Error for MarketError {}
