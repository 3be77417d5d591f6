use anyhow::{anyhow, Result};
use log::debug;
use reqwest::StatusCode;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use super::*;

pub fn map_any_err_and_code(e: anyhow::Error) -> (StatusCode, String) {
    debug!("Error: {:#}", e);
    (StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e))
}
pub fn map_any_err(e: anyhow::Error) -> String {
    debug!("Error: {:#}", e);
    format!("{:#}", e)
}
pub fn eth_to_wei(eth: Decimal) -> Result<Wei> {
    //! Fractions of a wei are truncated.
    if eth.is_sign_negative() {
        return Err(anyhow!("Amount {} ETH is negative", eth));
    }
    eth.checked_mul(Decimal::from(WEI_PER_ETH as u64))
        .and_then(|wei| wei.trunc().to_u128())
        .ok_or(anyhow!("Amount {} ETH doesn't fit into wei", eth))
}
pub fn wei_to_eth(wei: Wei) -> Option<Decimal> {
    let wei = i128::try_from(wei).ok()?;
    Decimal::try_from_i128_with_scale(wei, 18)
        .ok()
        .map(|eth| eth.normalize())
}
