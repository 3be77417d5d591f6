use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::*;

#[derive(PartialEq, Debug, Serialize, Deserialize, Clone)]
pub struct MarketOverviewResponse {
    pub id: MarketId,
    pub creator: UserPubKey,
    pub asset: AssetId,
    pub price_feed: String,
    pub entry_fee: Wei,
    pub prediction_cutoff_time: DateTime<Utc>,
    pub expiration_time: DateTime<Utc>,
    pub phase: MarketPhase,
    pub pool: Wei,
    pub num_players: usize,
    pub settlement: Option<Settlement>,
}
