use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use anyhow::bail;
use rust_decimal::Decimal;

use super::*;

impl Display for MarketPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let output = match self {
            Self::Open => "Open",
            Self::AwaitingSettlement => "AwaitingSettlement",
            Self::Settled => "Settled",
        };
        write!(f, "{}", output)
    }
}
impl FromStr for MarketPhase {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Open" => Ok(Self::Open),
            "AwaitingSettlement" => Ok(Self::AwaitingSettlement),
            "Settled" => Ok(Self::Settled),
            e => bail!("Couldn't deserialize to MarketPhase: {}", e),
        }
    }
}
impl Event {
    pub fn market(&self) -> MarketId {
        match self {
            Self::MarketCreated { market, .. }
            | Self::PredictionMade { market, .. }
            | Self::WinnerChosen { market, .. }
            | Self::WinnerPaid { market, .. } => *market,
        }
    }
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MarketCreated { .. } => "MarketCreated",
            Self::PredictionMade { .. } => "PredictionMade",
            Self::WinnerChosen { .. } => "WinnerChosen",
            Self::WinnerPaid { .. } => "WinnerPaid",
        }
    }
}
impl Display for Event {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MarketCreated {
                market,
                creator,
                asset,
                entry_fee,
                prediction_cutoff_time,
                expiration_time,
            } => write!(
                f,
                "MarketCreated(market: {}, creator: {}, asset: {}, entry_fee: {}, cutoff: {}, expiration: {})",
                market, creator, asset, entry_fee, prediction_cutoff_time, expiration_time
            ),
            Self::PredictionMade {
                market,
                participant,
                guess,
            } => write!(
                f,
                "PredictionMade(market: {}, participant: {}, guess: {})",
                market, participant, guess
            ),
            Self::WinnerChosen {
                market,
                winner,
                total_payout,
                num_winners,
            } => write!(
                f,
                "WinnerChosen(market: {}, winner: {}, total_payout: {}, num_winners: {})",
                market, winner, total_payout, num_winners
            ),
            Self::WinnerPaid {
                market,
                winner,
                amount,
            } => write!(
                f,
                "WinnerPaid(market: {}, winner: {}, amount: {})",
                market, winner, amount
            ),
        }
    }
}
impl PriceData {
    /// `None` if the answer can't be represented at the reported precision.
    pub fn price(&self) -> Option<Decimal> {
        Decimal::try_from_i128_with_scale(self.answer, self.decimals).ok()
    }
}
