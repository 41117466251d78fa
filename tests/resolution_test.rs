/// Resolution protocol integration tests: optimistic assert/dispute/settle
/// with the stake-weighted voting fallback, verifier quorum, and price-feed
/// threshold resolution.

use peermarket::{
    AdminConfig, Clock, CreateMarketParams, MarketEngine, MarketError, MarketState, MarketType,
    PriceDirection, StaticPriceFeed, Token, OPTION_NO, OPTION_YES,
};

const T0: u64 = 1_000;

fn test_engine() -> MarketEngine {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let cfg = AdminConfig::new("admin", "treasury");
    MarketEngine::with_clock(cfg, Clock::Fixed(T0))
}

fn params(market_type: MarketType) -> CreateMarketParams {
    CreateMarketParams {
        metadata_hash: "QmMeta".to_string(),
        is_multi_option: false,
        max_options: 2,
        payment_token: Token::Native,
        min_stake: 10,
        creator_deposit: 0,
        creator_outcome: 1,
        start_time: T0,
        stake_end_time: 2_000,
        end_time: 3_000,
        resolution_end_time: 1_000_000,
        market_type,
        price_feed: None,
        price_threshold: 0,
        direction: PriceDirection::Over,
    }
}

fn fund(engine: &mut MarketEngine, user: &str, amount: u128) {
    engine.ledger.deposit(user, &Token::Native, amount, T0);
}

/// Create an ended optimistic market with X on option 1 (10) and Y on
/// option 2 (30).
fn ended_optimistic_market(engine: &mut MarketEngine) -> u64 {
    fund(engine, "x", 100);
    fund(engine, "y", 100);
    let id = engine.create_market("creator", params(MarketType::Optimistic)).unwrap();
    engine.place_stake(id, "x", 1, 10).unwrap();
    engine.place_stake(id, "y", 2, 30).unwrap();
    engine.set_time(3_000);
    engine.end_market(id, "anyone").unwrap();
    id
}

// ============================================================================
// OPTIMISTIC PATH
// ============================================================================

#[test]
fn test_undisputed_assertion_settles_and_resolves() {
    let mut engine = test_engine();
    engine.config.platform_fee_bps = 0;
    engine.config.partner_fee_bps = 0;
    let id = ended_optimistic_market(&mut engine);
    fund(&mut engine, "asserter", 1_000);

    engine
        .request_resolution(id, "asserter", "option 1 won", 1, 100, Token::Native)
        .unwrap();
    assert_eq!(engine.ledger.balance("asserter", &Token::Native), 900);
    assert_eq!(engine.ledger.bond_escrow(id), 100);

    // Resolution blocks while the assertion is live
    assert!(matches!(
        engine.resolve_market(id),
        Err(MarketError::AssertionPending(_))
    ));
    assert!(matches!(
        engine.settle_resolution(id),
        Err(MarketError::NotYetExpired { expiration: 10_200, .. })
    ));

    // Liveness window (7200s) passes undisputed
    engine.set_time(10_200);
    let outcome = engine.settle_resolution(id).unwrap();
    assert!(outcome.result);
    assert_eq!(outcome.option, 1);
    assert_eq!(outcome.recipient, "asserter");
    assert_eq!(engine.ledger.balance("asserter", &Token::Native), 1_000);
    assert_eq!(engine.ledger.bond_escrow(id), 0);

    assert_eq!(engine.resolve_market(id).unwrap(), 1);
    assert_eq!(engine.market(id).unwrap().winning_option, Some(1));
    assert_eq!(engine.claim_payout(id, "x").unwrap(), 40);
}

#[test]
fn test_assertion_validation() {
    let mut engine = test_engine();
    let id = ended_optimistic_market(&mut engine);
    fund(&mut engine, "asserter", 1_000);

    assert!(matches!(
        engine.request_resolution(id, "asserter", "claim", 1, 99, Token::Native),
        Err(MarketError::BondBelowMinimum { .. })
    ));
    assert!(matches!(
        engine.request_resolution(id, "asserter", "claim", 1, 100, Token::Fungible("X".into())),
        Err(MarketError::BondCurrencyMismatch { .. })
    ));
    assert!(matches!(
        engine.request_resolution(id, "asserter", "claim", 3, 100, Token::Native),
        Err(MarketError::OptionOutOfRange { .. })
    ));
    // Failed validation escrowed nothing
    assert_eq!(engine.ledger.balance("asserter", &Token::Native), 1_000);

    engine
        .request_resolution(id, "asserter", "claim", 1, 100, Token::Native)
        .unwrap();
    assert!(matches!(
        engine.request_resolution(id, "asserter", "again", 2, 100, Token::Native),
        Err(MarketError::CannotReassert(_))
    ));
}

#[test]
fn test_resolution_requires_ended_market() {
    let mut engine = test_engine();
    fund(&mut engine, "asserter", 1_000);
    let id = engine.create_market("creator", params(MarketType::Optimistic)).unwrap();
    assert!(matches!(
        engine.request_resolution(id, "asserter", "claim", 1, 100, Token::Native),
        Err(MarketError::MarketNotEnded(_))
    ));
}

#[test]
fn test_dispute_routes_to_vote_and_disputer_prevails() {
    // Scenario: asserter claims option 1; disputer disagrees; voters stake
    // 10 for / 20 against; the assertion is rejected and option 2 wins.
    let mut engine = test_engine();
    engine.config.platform_fee_bps = 0;
    engine.config.partner_fee_bps = 0;
    let id = ended_optimistic_market(&mut engine);
    fund(&mut engine, "asserter", 1_000);
    fund(&mut engine, "disputer", 1_000);
    fund(&mut engine, "alice", 100);
    fund(&mut engine, "bob", 100);
    fund(&mut engine, "carol", 100);

    engine
        .request_resolution(id, "asserter", "option 1 won", 1, 100, Token::Native)
        .unwrap();

    engine.set_time(3_500);
    let request_id = engine
        .dispute_resolution(id, "disputer", Token::Native)
        .unwrap();
    assert_eq!(engine.ledger.bond_escrow(id), 200);
    assert!(engine.assertion(id).unwrap().disputed());

    // Voting window: deadline 3500 + 86400 = 89900
    engine.set_time(4_000);
    engine.vote_on_dispute(id, "alice", true, 1, 10).unwrap();
    engine.vote_on_dispute(id, "bob", false, 2, 10).unwrap();
    engine.vote_on_dispute(id, "carol", false, 2, 10).unwrap();
    assert_eq!(engine.ledger.balance("alice", &Token::Native), 90);
    assert!(matches!(
        engine.vote_on_dispute(id, "alice", false, 2, 5),
        Err(MarketError::AlreadyVoted(_))
    ));

    // Settlement locked until vote deadline + grace = 93500
    engine.set_time(90_000);
    assert!(matches!(
        engine.settle_resolution(id),
        Err(MarketError::NotYetExpired { expiration: 93_500, .. })
    ));

    engine.set_time(93_500);
    let outcome = engine.settle_resolution(id).unwrap();
    assert!(!outcome.result);
    assert_eq!(outcome.option, 2);
    assert_eq!(outcome.recipient, "disputer");
    // Disputer takes both bonds; voters get their stakes back in full
    assert_eq!(engine.ledger.balance("disputer", &Token::Native), 1_100);
    assert_eq!(engine.ledger.balance("asserter", &Token::Native), 900);
    assert_eq!(engine.ledger.balance("alice", &Token::Native), 100);
    assert_eq!(engine.ledger.balance("bob", &Token::Native), 100);
    assert_eq!(engine.ledger.balance("carol", &Token::Native), 100);
    assert_eq!(engine.ledger.vote_escrow(&request_id), 0);

    // The vote, not the assertion, names the winner
    assert_eq!(engine.resolve_market(id).unwrap(), 2);
    assert_eq!(engine.claim_payout(id, "y").unwrap(), 40);

    // Winning option is immutable once written
    assert!(matches!(
        engine.resolve_market(id),
        Err(MarketError::AlreadyResolved(_))
    ));
}

#[test]
fn test_voteless_dispute_confirms_the_assertion() {
    // A dispute that attracts no votes must not overturn the assertion:
    // the asserter keeps both bonds and the asserted option stands.
    let mut engine = test_engine();
    engine.config.platform_fee_bps = 0;
    engine.config.partner_fee_bps = 0;
    let id = ended_optimistic_market(&mut engine);
    fund(&mut engine, "asserter", 1_000);
    fund(&mut engine, "disputer", 1_000);

    engine
        .request_resolution(id, "asserter", "option 1 won", 1, 100, Token::Native)
        .unwrap();
    engine.set_time(3_500);
    engine.dispute_resolution(id, "disputer", Token::Native).unwrap();

    engine.set_time(93_500);
    let outcome = engine.settle_resolution(id).unwrap();
    assert!(outcome.result);
    assert_eq!(outcome.option, 1);
    assert_eq!(outcome.recipient, "asserter");
    assert_eq!(engine.ledger.balance("asserter", &Token::Native), 1_100);
    assert_eq!(engine.ledger.balance("disputer", &Token::Native), 900);

    // Bond disposition and market outcome agree
    assert_eq!(engine.resolve_market(id).unwrap(), 1);
    assert_eq!(engine.claim_payout(id, "x").unwrap(), 40);
}

#[test]
fn test_supporting_vote_backs_the_asserted_option() {
    let mut engine = test_engine();
    let id = ended_optimistic_market(&mut engine);
    fund(&mut engine, "asserter", 1_000);
    fund(&mut engine, "disputer", 1_000);
    fund(&mut engine, "alice", 100);

    engine
        .request_resolution(id, "asserter", "option 1 won", 1, 100, Token::Native)
        .unwrap();
    engine.set_time(3_500);
    let request_id = engine
        .dispute_resolution(id, "disputer", Token::Native)
        .unwrap();

    // A supporting ballot with a mismatched option records the asserted one
    engine.set_time(4_000);
    engine.vote_on_dispute(id, "alice", true, 2, 10).unwrap();
    let request = engine.vote_request(&request_id).unwrap();
    assert_eq!(request.votes["alice"].option, 1);

    engine.set_time(93_500);
    let outcome = engine.settle_resolution(id).unwrap();
    assert!(outcome.result);
    assert_eq!(outcome.option, 1);
    assert_eq!(outcome.recipient, "asserter");
}

#[test]
fn test_confirmed_assertion_pays_asserter_both_bonds() {
    let mut engine = test_engine();
    let id = ended_optimistic_market(&mut engine);
    fund(&mut engine, "asserter", 1_000);
    fund(&mut engine, "disputer", 1_000);
    fund(&mut engine, "alice", 100);

    engine
        .request_resolution(id, "asserter", "option 1 won", 1, 100, Token::Native)
        .unwrap();
    engine.set_time(3_500);
    engine.dispute_resolution(id, "disputer", Token::Native).unwrap();
    engine.set_time(4_000);
    engine.vote_on_dispute(id, "alice", true, 1, 30).unwrap();

    engine.set_time(93_500);
    let outcome = engine.settle_resolution(id).unwrap();
    assert!(outcome.result);
    assert_eq!(outcome.option, 1);
    assert_eq!(engine.ledger.balance("asserter", &Token::Native), 1_100);
    assert_eq!(engine.ledger.balance("disputer", &Token::Native), 900);
    assert_eq!(engine.ledger.balance("alice", &Token::Native), 100);
}

#[test]
fn test_dispute_window_and_vote_gating() {
    let mut engine = test_engine();
    let id = ended_optimistic_market(&mut engine);
    fund(&mut engine, "asserter", 1_000);
    fund(&mut engine, "disputer", 1_000);
    fund(&mut engine, "alice", 100);

    // No vote before a dispute exists
    assert!(matches!(
        engine.vote_on_dispute(id, "alice", true, 1, 10),
        Err(MarketError::AssertionNotFound(_))
    ));

    engine
        .request_resolution(id, "asserter", "claim", 1, 100, Token::Native)
        .unwrap();
    assert!(matches!(
        engine.vote_on_dispute(id, "alice", true, 1, 10),
        Err(MarketError::NotDisputed(_))
    ));

    // Past the liveness deadline the dispute window is closed
    engine.set_time(10_201);
    assert!(matches!(
        engine.dispute_resolution(id, "disputer", Token::Native),
        Err(MarketError::DisputeWindowClosed { deadline: 10_200, .. })
    ));
    assert_eq!(engine.ledger.balance("disputer", &Token::Native), 1_000);
}

#[test]
fn test_late_vote_rejected_without_transfer() {
    let mut engine = test_engine();
    let id = ended_optimistic_market(&mut engine);
    fund(&mut engine, "asserter", 1_000);
    fund(&mut engine, "disputer", 1_000);
    fund(&mut engine, "alice", 100);

    engine
        .request_resolution(id, "asserter", "claim", 1, 100, Token::Native)
        .unwrap();
    engine.set_time(3_500);
    engine.dispute_resolution(id, "disputer", Token::Native).unwrap();

    engine.set_time(89_901);
    assert!(matches!(
        engine.vote_on_dispute(id, "alice", true, 1, 10),
        Err(MarketError::VotingClosed { deadline: 89_900, .. })
    ));
    assert_eq!(engine.ledger.balance("alice", &Token::Native), 100);
}

// ============================================================================
// VERIFIER QUORUM PATH
// ============================================================================

#[test]
fn test_quorum_resolution_two_of_three() {
    let mut engine = test_engine();
    engine.config.platform_fee_bps = 0;
    engine.config.partner_fee_bps = 0;
    engine.set_required_quorum("admin", 2).unwrap();
    for v in ["v1", "v2", "v3"] {
        engine.add_verifier("admin", v).unwrap();
    }
    fund(&mut engine, "x", 100);
    fund(&mut engine, "y", 100);

    let id = engine.create_market("creator", params(MarketType::Manual)).unwrap();
    engine.place_stake(id, "x", 1, 10).unwrap();
    engine.place_stake(id, "y", 2, 30).unwrap();
    engine.set_time(3_000);
    engine.end_market(id, "anyone").unwrap();

    assert!(matches!(
        engine.cast_vote(id, "rando", 2),
        Err(MarketError::NotVerifier(_))
    ));
    engine.cast_vote(id, "v1", 2).unwrap();
    assert_eq!(engine.market(id).unwrap().state, MarketState::Ended);
    assert!(matches!(
        engine.resolve_market(id),
        Err(MarketError::QuorumNotReached { required: 2 })
    ));

    engine.cast_vote(id, "v2", 2).unwrap();
    // Second matching vote resolves immediately
    let market = engine.market(id).unwrap();
    assert_eq!(market.state, MarketState::Resolved);
    assert_eq!(market.winning_option, Some(2));
    assert!(matches!(
        engine.cast_vote(id, "v3", 1),
        Err(MarketError::AlreadyResolved(_))
    ));

    assert_eq!(engine.claim_payout(id, "y").unwrap(), 40);
}

#[test]
fn test_resolution_path_is_fixed_at_creation() {
    let mut engine = test_engine();
    engine.add_verifier("admin", "v1").unwrap();
    fund(&mut engine, "asserter", 1_000);

    let manual = engine.create_market("creator", params(MarketType::Manual)).unwrap();
    let optimistic = engine.create_market("creator", params(MarketType::Optimistic)).unwrap();
    engine.set_time(3_000);
    engine.end_market(manual, "anyone").unwrap();
    engine.end_market(optimistic, "anyone").unwrap();

    assert!(matches!(
        engine.request_resolution(manual, "asserter", "claim", 1, 100, Token::Native),
        Err(MarketError::WrongResolutionPath(_))
    ));
    assert!(matches!(
        engine.cast_vote(optimistic, "v1", 1),
        Err(MarketError::WrongResolutionPath(_))
    ));
}

// ============================================================================
// PRICE-FEED PATH
// ============================================================================

fn price_market(engine: &mut MarketEngine, threshold: u128) -> u64 {
    fund(engine, "x", 100);
    fund(engine, "y", 100);
    let mut p = params(MarketType::PriceFeed);
    p.price_feed = Some("eth-usd".to_string());
    p.price_threshold = threshold;
    p.direction = PriceDirection::Over;
    let id = engine.create_market("creator", p).unwrap();
    engine.place_stake(id, "x", OPTION_YES, 10).unwrap();
    engine.place_stake(id, "y", OPTION_NO, 30).unwrap();
    engine.set_time(3_000);
    engine.end_market(id, "anyone").unwrap();
    id
}

#[test]
fn test_price_over_threshold_resolves_yes() {
    let mut engine = test_engine();
    engine.config.platform_fee_bps = 0;
    engine.config.partner_fee_bps = 0;
    engine.register_price_feed(
        "eth-usd",
        Box::new(StaticPriceFeed::with_price("eth-usd", 2_500, 2_900)),
    );
    let id = price_market(&mut engine, 2_000);

    assert_eq!(engine.resolve_market(id).unwrap(), OPTION_YES);
    assert_eq!(engine.claim_payout(id, "x").unwrap(), 40);
}

#[test]
fn test_price_under_threshold_resolves_no() {
    let mut engine = test_engine();
    engine.register_price_feed(
        "eth-usd",
        Box::new(StaticPriceFeed::with_price("eth-usd", 1_500, 2_900)),
    );
    let id = price_market(&mut engine, 2_000);
    assert_eq!(engine.resolve_market(id).unwrap(), OPTION_NO);
}

#[test]
fn test_stale_price_defers_resolution() {
    let mut engine = test_engine();
    engine.register_price_feed(
        "eth-usd",
        Box::new(StaticPriceFeed::with_price("eth-usd", 2_500, 100)),
    );
    let id = price_market(&mut engine, 2_000);

    // price_max_age_secs is 3600; an observation from t=100 is stale at 3000+3600+1
    engine.set_time(10_000);
    assert!(matches!(
        engine.resolve_market(id),
        Err(MarketError::StalePrice { updated_at: 100, .. })
    ));
    // The failed attempt had no side effects
    assert_eq!(engine.market(id).unwrap().state, MarketState::Ended);

    // A fresh observation lets a retry succeed
    engine.register_price_feed(
        "eth-usd",
        Box::new(StaticPriceFeed::with_price("eth-usd", 2_500, 9_500)),
    );
    assert_eq!(engine.resolve_market(id).unwrap(), OPTION_YES);
}

#[test]
fn test_price_market_requires_registered_feed() {
    let mut engine = test_engine();
    let mut p = params(MarketType::PriceFeed);
    p.price_feed = Some("eth-usd".to_string());
    assert!(matches!(
        engine.create_market("creator", p),
        Err(MarketError::UnknownPriceFeed(_))
    ));

    let mut p = params(MarketType::PriceFeed);
    p.price_feed = None;
    assert!(matches!(
        engine.create_market("creator", p),
        Err(MarketError::MissingPriceFeed(_))
    ));
}

// ============================================================================
// FEES AND SWEEPS
// ============================================================================

#[test]
fn test_fee_skim_with_partner() {
    let mut engine = test_engine();
    engine.config.partner = Some("partner".to_string());
    engine.add_verifier("admin", "v1").unwrap();
    fund(&mut engine, "x", 20_000);

    let mut p = params(MarketType::Manual);
    p.min_stake = 10_000;
    let id = engine.create_market("creator", p).unwrap();
    engine.place_stake(id, "x", 1, 10_000).unwrap();
    engine.set_time(3_000);
    engine.end_market(id, "anyone").unwrap();
    engine.cast_vote(id, "v1", 1).unwrap();

    // 2% platform + 1% partner of 10000
    assert_eq!(engine.ledger.balance("treasury", &Token::Native), 200);
    assert_eq!(engine.ledger.balance("partner", &Token::Native), 100);
    assert_eq!(engine.claim_payout(id, "x").unwrap(), 9_700);
}

#[test]
fn test_empty_winning_pool_sweeps_to_treasury() {
    let mut engine = test_engine();
    engine.config.platform_fee_bps = 0;
    engine.config.partner_fee_bps = 0;
    engine.add_verifier("admin", "v1").unwrap();
    fund(&mut engine, "x", 100);
    fund(&mut engine, "y", 100);

    let id = engine.create_market("creator", params(MarketType::Manual)).unwrap();
    engine.place_stake(id, "x", 1, 10).unwrap();
    engine.place_stake(id, "y", 1, 30).unwrap();
    engine.set_time(3_000);
    engine.end_market(id, "anyone").unwrap();
    // Nobody staked on option 2, yet it wins
    engine.cast_vote(id, "v1", 2).unwrap();

    assert_eq!(engine.ledger.balance("treasury", &Token::Native), 40);
    assert_eq!(engine.ledger.market_escrow(id, &Token::Native), 0);
    assert!(matches!(
        engine.claim_payout(id, "x"),
        Err(MarketError::NothingToClaim { .. })
    ));
}

#[test]
fn test_cancel_mid_dispute_refunds_bonds_and_votes() {
    let mut engine = test_engine();
    let id = ended_optimistic_market(&mut engine);
    fund(&mut engine, "asserter", 1_000);
    fund(&mut engine, "disputer", 1_000);
    fund(&mut engine, "alice", 100);

    engine
        .request_resolution(id, "asserter", "claim", 1, 100, Token::Native)
        .unwrap();
    engine.set_time(3_500);
    engine.dispute_resolution(id, "disputer", Token::Native).unwrap();
    engine.set_time(4_000);
    engine.vote_on_dispute(id, "alice", true, 1, 10).unwrap();

    engine.cancel_market(id, "admin").unwrap();
    assert_eq!(engine.ledger.balance("x", &Token::Native), 100);
    assert_eq!(engine.ledger.balance("y", &Token::Native), 100);
    assert_eq!(engine.ledger.balance("asserter", &Token::Native), 1_000);
    assert_eq!(engine.ledger.balance("disputer", &Token::Native), 1_000);
    assert_eq!(engine.ledger.balance("alice", &Token::Native), 100);
    assert_eq!(engine.ledger.bond_escrow(id), 0);
}
