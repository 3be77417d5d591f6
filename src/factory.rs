use crate::api::*;
use crate::error::MarketError;
use crate::market::{Market, MarketContext};
use crate::oracle::PriceOracle;
use chrono::{DateTime, Utc};
use log::debug;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Registry and sole constructor of markets.
///
/// Markets are only ever appended, so a market id is its position in the
/// registry and stays valid for the lifetime of the factory.
pub struct MarketFactory {
    owner: UserPubKey,
    price_feeds: Vec<Arc<dyn PriceOracle + Send + Sync>>,
    markets: RwLock<Vec<Arc<Market>>>,
    context: Arc<MarketContext>,
}
impl MarketFactory {
    pub fn new(
        owner: UserPubKey,
        price_feeds: Vec<Arc<dyn PriceOracle + Send + Sync>>,
        context: MarketContext,
    ) -> Result<Self, MarketError> {
        if price_feeds.len() != ASSETS.len() {
            return Err(MarketError::WrongPriceFeedCount {
                expected: ASSETS.len(),
                got: price_feeds.len(),
            });
        }
        Ok(Self {
            owner,
            price_feeds,
            markets: RwLock::new(vec![]),
            context: Arc::new(context),
        })
    }
    pub async fn create_market(
        &self,
        creator: UserPubKey,
        asset: AssetId,
        entry_fee: Wei,
        prediction_cutoff_time: DateTime<Utc>,
        expiration_time: DateTime<Utc>,
    ) -> Result<Arc<Market>, MarketError> {
        let price_feed = self
            .price_feeds
            .get(asset)
            .ok_or(MarketError::InvalidAsset {
                asset,
                configured: self.price_feeds.len(),
            })?;
        if expiration_time <= prediction_cutoff_time {
            return Err(MarketError::InvalidSchedule);
        }
        let mut markets = self.markets.write().await;
        let market = Arc::new(Market::new(
            markets.len(),
            creator,
            asset,
            entry_fee,
            prediction_cutoff_time,
            expiration_time,
            price_feed.clone(),
            self.context.clone(),
        ));
        markets.push(market.clone());
        debug!(
            "Created market {} on {} for {}",
            market.id(),
            price_feed.description(),
            creator
        );
        self.context
            .events
            .emit(Event::MarketCreated {
                market: market.id(),
                creator,
                asset,
                entry_fee,
                prediction_cutoff_time,
                expiration_time,
            })
            .await;
        Ok(market)
    }
    pub async fn get_market(&self, id: MarketId) -> Result<Arc<Market>, MarketError> {
        self.markets
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or(MarketError::MarketDoesntExist(id))
    }
    pub async fn get_markets(&self) -> Vec<Arc<Market>> {
        self.markets.read().await.clone()
    }
    pub async fn get_num_markets(&self) -> usize {
        self.markets.read().await.len()
    }
    pub fn get_price_feeds(&self) -> &[Arc<dyn PriceOracle + Send + Sync>] {
        &self.price_feeds
    }
    pub fn get_price_feed_info(&self) -> Vec<PriceFeedInfo> {
        self.price_feeds
            .iter()
            .enumerate()
            .map(|(asset, feed)| PriceFeedInfo {
                asset,
                description: feed.description(),
                decimals: feed.decimals(),
            })
            .collect()
    }
    pub fn get_owner(&self) -> UserPubKey {
        self.owner
    }
    pub fn context(&self) -> &MarketContext {
        &self.context
    }
}
