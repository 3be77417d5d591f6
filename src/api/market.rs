use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type Wei = u128;
pub type UserPubKey = secp256k1::PublicKey;
pub type MarketId = usize;
pub type AssetId = usize;
pub type PaymentId = String;

pub const WEI_PER_ETH: Wei = 1_000_000_000_000_000_000;
/// Assets a factory is configured with, indexed by [`AssetId`].
pub const ASSETS: [&str; 3] = ["ETH", "BTC", "DOGE"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prediction {
    pub participant: UserPubKey,
    pub guess: Decimal,
    pub amount_paid: Wei,
}
#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize, Deserialize)]
pub enum MarketPhase {
    Open,
    AwaitingSettlement,
    Settled,
}
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payout {
    pub user: UserPubKey,
    pub amount: Wei,
}
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settlement {
    pub price: Decimal,
    pub winners: Vec<Payout>,
    pub payout_per_winner: Wei,
    pub total_payout: Wei,
    pub remainder: Wei,
    pub settled_at: DateTime<Utc>,
}
/// One round reported by a price feed. The price is `answer / 10^decimals`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceData {
    pub answer: i128,
    pub decimals: u32,
    pub updated_at: DateTime<Utc>,
}
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceFeedInfo {
    pub asset: AssetId,
    pub description: String,
    pub decimals: u32,
}
