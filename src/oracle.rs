use crate::api::PriceData;
use crate::clock::Clock;
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

#[async_trait]
pub trait PriceOracle {
    async fn current_price(&self) -> Result<PriceData>;
    fn description(&self) -> String;
    fn decimals(&self) -> u32;
}
/// In-process aggregator reporting a fixed answer until told otherwise.
pub struct TestPriceFeed {
    description: String,
    decimals: u32,
    clock: Arc<dyn Clock + Send + Sync>,
    round: Mutex<Option<PriceData>>,
}
impl TestPriceFeed {
    pub fn new(
        description: impl Into<String>,
        decimals: u32,
        answer: i128,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        let round = PriceData {
            answer,
            decimals,
            updated_at: clock.now(),
        };
        Self {
            description: description.into(),
            decimals,
            clock,
            round: Mutex::new(Some(round)),
        }
    }
    pub fn update_answer(&self, answer: i128) {
        let round = PriceData {
            answer,
            decimals: self.decimals,
            updated_at: self.clock.now(),
        };
        *self.round.lock().unwrap() = Some(round);
    }
    /// Re-reports the current answer at the clock's time, like a keeper
    /// posting a heartbeat round.
    pub fn refresh(&self) {
        if let Some(round) = self.round.lock().unwrap().as_mut() {
            round.updated_at = self.clock.now();
        }
    }
    pub fn set_unavailable(&self) {
        *self.round.lock().unwrap() = None;
    }
}
#[async_trait]
impl PriceOracle for TestPriceFeed {
    async fn current_price(&self) -> Result<PriceData> {
        if let Some(round) = self.round.lock().unwrap().clone() {
            Ok(round)
        } else {
            bail!("No round data for {}", self.description)
        }
    }
    fn description(&self) -> String {
        self.description.clone()
    }
    fn decimals(&self) -> u32 {
        self.decimals
    }
}
