// Price-feed resolution: read an external price, compare against a fixed
// threshold and direction. Stale reads defer resolution instead of guessing.

use serde::{Deserialize, Serialize};

use crate::errors::MarketError;
use crate::models::{Amount, OptionId, PriceDirection};

/// Binary outcome mapping used by price-feed markets.
pub const OPTION_YES: OptionId = 1;
pub const OPTION_NO: OptionId = 2;

/// A single price observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricePoint {
    pub value: Amount,
    pub updated_at: u64,
}

/// External price oracle. Implementations sit outside the core (HTTP feeds,
/// on-chain aggregators); the engine only ever sees `(value, updated_at)`.
pub trait PriceFeed: Send + Sync {
    fn latest_price(&self) -> Result<PricePoint, MarketError>;
}

/// Push-style feed holding the last written observation. Doubles as the test
/// feed and as an adapter for hosts that poll an upstream source themselves.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticPriceFeed {
    point: Option<PricePoint>,
    pub feed_id: String,
}

impl StaticPriceFeed {
    pub fn new(feed_id: &str) -> Self {
        Self { point: None, feed_id: feed_id.to_string() }
    }

    pub fn with_price(feed_id: &str, value: Amount, updated_at: u64) -> Self {
        Self {
            point: Some(PricePoint { value, updated_at }),
            feed_id: feed_id.to_string(),
        }
    }

    pub fn set_price(&mut self, value: Amount, updated_at: u64) {
        self.point = Some(PricePoint { value, updated_at });
    }
}

impl PriceFeed for StaticPriceFeed {
    fn latest_price(&self) -> Result<PricePoint, MarketError> {
        self.point
            .ok_or_else(|| MarketError::PriceUnavailable(self.feed_id.clone()))
    }
}

/// Reject observations older than the configured bound. Resolution on a
/// stale price must defer, never default to a guessed outcome.
pub fn check_freshness(
    point: &PricePoint,
    now: u64,
    max_age: u64,
) -> Result<(), MarketError> {
    if now.saturating_sub(point.updated_at) > max_age {
        return Err(MarketError::StalePrice {
            updated_at: point.updated_at,
            max_age,
            now,
        });
    }
    Ok(())
}

/// Yes iff (over and price >= threshold) or (under and price < threshold).
pub fn evaluate(price: Amount, threshold: Amount, direction: PriceDirection) -> OptionId {
    let yes = match direction {
        PriceDirection::Over => price >= threshold,
        PriceDirection::Under => price < threshold,
    };
    if yes {
        OPTION_YES
    } else {
        OPTION_NO
    }
}
