use crate::api::{AssetId, MarketId, Wei};
use rust_decimal::Decimal;
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, PartialEq, Debug)]
pub enum MarketError {
    #[error("payment of {paid} wei is below the entry fee of {entry_fee} wei")]
    InsufficientPayment { paid: Wei, entry_fee: Wei },
    #[error("guess {guess} has more decimals than the price feed's {decimals} or is out of range")]
    InvalidGuess { guess: Decimal, decimals: u32 },
    #[error("asset {asset} is not configured, the factory has {configured} price feeds")]
    InvalidAsset { asset: AssetId, configured: usize },
    #[error("expiration time has to be after the prediction cutoff time")]
    InvalidSchedule,
    #[error("market has no predictions to settle")]
    NoPredictions,
    #[error("market {0} doesn't exist")]
    MarketDoesntExist(MarketId),
    #[error("factory needs exactly {expected} price feeds but got {got}")]
    WrongPriceFeedCount { expected: usize, got: usize },
    #[error("prediction window is closed")]
    PredictionWindowClosed,
    #[error("market can't be settled before its expiration time")]
    SettlementNotReady,
    #[error("market was already settled")]
    AlreadySettled,
    #[error("oracle price unavailable: {0}")]
    OraclePriceUnavailable(String),
    #[error("entry fee collection failed: {0}")]
    CollectionFailed(String),
    #[error("payout failed: {0}")]
    PayoutFailed(String),
    #[error("tried to pay out {payout} wei from a pool of {pool} wei")]
    PoolOverdraw { payout: Wei, pool: Wei },
    #[error("pool holds {pool} wei but predictions paid {paid} wei")]
    PoolMismatch { pool: Wei, paid: Wei },
    #[error("pool of {pool} wei can't take another {payment} wei")]
    PoolOverflow { pool: Wei, payment: Wei },
}
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Phase,
    Oracle,
    Funding,
    InvariantViolation,
}
impl MarketError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InsufficientPayment { .. }
            | Self::InvalidGuess { .. }
            | Self::InvalidAsset { .. }
            | Self::InvalidSchedule
            | Self::NoPredictions
            | Self::WrongPriceFeedCount { .. } => ErrorKind::Validation,
            Self::MarketDoesntExist(_) => ErrorKind::NotFound,
            Self::PredictionWindowClosed | Self::SettlementNotReady | Self::AlreadySettled => {
                ErrorKind::Phase
            }
            Self::OraclePriceUnavailable(_) => ErrorKind::Oracle,
            Self::CollectionFailed(_) | Self::PayoutFailed(_) => ErrorKind::Funding,
            Self::PoolOverdraw { .. } | Self::PoolMismatch { .. } | Self::PoolOverflow { .. } => {
                ErrorKind::InvariantViolation
            }
        }
    }
    pub fn status_code(&self) -> StatusCode {
        if let Self::CollectionFailed(_) = self {
            return StatusCode::PAYMENT_REQUIRED;
        }
        match self.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Phase => StatusCode::CONFLICT,
            ErrorKind::Oracle | ErrorKind::Funding => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::InvariantViolation => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
pub fn map_market_err(e: MarketError) -> (StatusCode, String) {
    log::debug!("Error: {}", e);
    (e.status_code(), e.to_string())
}
