use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::*;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Event {
    MarketCreated {
        market: MarketId,
        creator: UserPubKey,
        asset: AssetId,
        entry_fee: Wei,
        prediction_cutoff_time: DateTime<Utc>,
        expiration_time: DateTime<Utc>,
    },
    PredictionMade {
        market: MarketId,
        participant: UserPubKey,
        guess: Decimal,
    },
    WinnerChosen {
        market: MarketId,
        winner: UserPubKey,
        total_payout: Wei,
        num_winners: usize,
    },
    WinnerPaid {
        market: MarketId,
        winner: UserPubKey,
        amount: Wei,
    },
}
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventRecord {
    pub seq: u64,
    pub at: DateTime<Utc>,
    pub event: Event,
}
