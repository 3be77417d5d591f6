//! Winner selection and payout splitting.
//!
//! Every prediction is scored by its absolute distance to the reference
//! price. All predictions sharing the minimum distance win and split the
//! pool evenly. The integer division remainder is reported, never paid.
//!
//! Distances are computed on integers counting units of `10^-decimals`, the
//! precision of the price feed, so equal distances are exactly equal.

use crate::api::{Payout, Prediction, Wei};
use crate::error::MarketError;
use rust_decimal::Decimal;

#[derive(Debug, PartialEq)]
pub struct Resolution {
    pub winners: Vec<Payout>,
    pub payout_per_winner: Wei,
    pub total_payout: Wei,
    pub remainder: Wei,
}

/// `guess` as a whole number of `10^-decimals` units.
///
/// `None` when the guess is more precise than `decimals` or too large to scale.
pub fn guess_units(guess: Decimal, decimals: u32) -> Option<i128> {
    let guess = guess.normalize();
    let scale = guess.scale();
    if scale > decimals {
        return None;
    }
    10i128
        .checked_pow(decimals - scale)
        .and_then(|factor| guess.mantissa().checked_mul(factor))
}

/// Winners are returned in submission order, one entry per winning prediction.
///
/// `answer` and `decimals` describe the reference price as reported by the
/// oracle, `answer / 10^decimals`.
pub fn resolve(
    predictions: &[Prediction],
    answer: i128,
    decimals: u32,
    pool: Wei,
) -> Result<Resolution, MarketError> {
    let mut distances = Vec::with_capacity(predictions.len());
    for prediction in predictions {
        let units =
            guess_units(prediction.guess, decimals).ok_or(MarketError::InvalidGuess {
                guess: prediction.guess,
                decimals,
            })?;
        distances.push(units.abs_diff(answer));
    }
    let min_distance = distances
        .iter()
        .copied()
        .min()
        .ok_or(MarketError::NoPredictions)?;
    let winners: Vec<&Prediction> = predictions
        .iter()
        .zip(distances)
        .filter(|(_, distance)| *distance == min_distance)
        .map(|(prediction, _)| prediction)
        .collect();

    let num_winners = winners.len() as Wei;
    let payout_per_winner = pool / num_winners;
    let total_payout = payout_per_winner * num_winners;
    if total_payout > pool {
        return Err(MarketError::PoolOverdraw {
            payout: total_payout,
            pool,
        });
    }
    Ok(Resolution {
        winners: winners
            .into_iter()
            .map(|prediction| Payout {
                user: prediction.participant,
                amount: payout_per_winner,
            })
            .collect(),
        payout_per_winner,
        total_payout,
        remainder: pool - total_payout,
    })
}
