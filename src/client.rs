use anyhow::{bail, Result};
use reqwest::Response;
use secp256k1::SecretKey;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::api::*;

pub struct Client {
    url: String,
    client: reqwest::Client,
}
impl Client {
    pub fn new(url: String) -> Self {
        let client = reqwest::Client::new();
        Self { url, client }
    }
    pub async fn create_market(
        &self,
        request: CreateMarketRequest,
        secret_key: &SecretKey,
    ) -> Result<MarketId> {
        let request = self.sign(request, secret_key).await?;
        self.post("/create_market", &request).await
    }
    pub async fn make_prediction(
        &self,
        request: MakePredictionRequest,
        secret_key: &SecretKey,
    ) -> Result<usize> {
        let request = self.sign(request, secret_key).await?;
        self.post("/make_prediction", &request).await
    }
    pub async fn end_market(&self, market: MarketId, secret_key: &SecretKey) -> Result<Settlement> {
        let request = self.sign(MarketRequest { market }, secret_key).await?;
        self.post("/end_market", &request).await
    }
    pub async fn get_challenge(&self, user: UserPubKey) -> Result<String> {
        self.post("/get_challenge", &user).await
    }
    pub async fn get_balance(&self, user: UserPubKey) -> Result<Wei> {
        self.post("/get_balance", &user).await
    }
    /// Credits `amount` to `user`. Only offered by servers in test mode.
    pub async fn deposit(&self, user: UserPubKey, amount: Wei) -> Result<Wei> {
        self.post("/deposit", &DepositRequest { user, amount }).await
    }
    pub async fn get_num_markets(&self) -> Result<usize> {
        self.get("/get_num_markets").await
    }
    pub async fn get_owner(&self) -> Result<UserPubKey> {
        self.get("/get_owner").await
    }
    pub async fn get_price_feeds(&self) -> Result<Vec<PriceFeedInfo>> {
        self.get("/get_price_feeds").await
    }
    pub async fn get_markets(&self) -> Result<Vec<MarketOverviewResponse>> {
        self.get("/get_markets").await
    }
    pub async fn get_market(&self, market: MarketId) -> Result<MarketOverviewResponse> {
        self.post("/get_market", &MarketRequest { market }).await
    }
    pub async fn get_predictions(&self, market: MarketId) -> Result<Vec<Prediction>> {
        self.post("/get_predictions", &MarketRequest { market }).await
    }
    pub async fn get_events(&self, request: EventsRequest) -> Result<Vec<EventRecord>> {
        self.post("/get_events", &request).await
    }
    #[cfg(test)]
    pub async fn advance_clock(&self, seconds: i64) -> Result<()> {
        let response = self
            .client
            .post(self.url.clone() + "/advance_clock")
            .json(&AdvanceClockRequest { seconds })
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
    async fn sign<T: Serialize>(&self, data: T, secret_key: &SecretKey) -> Result<PostRequest<T>> {
        let user = UserPubKey::from_secret_key_global(secret_key);
        let challenge = self.get_challenge(user).await?;
        PostRequest::sign(data, challenge, secret_key)
    }
    async fn post<T: Serialize, R: DeserializeOwned>(&self, path: &str, body: &T) -> Result<R> {
        let response = self
            .client
            .post(self.url.clone() + path)
            .json(body)
            .send()
            .await?;
        Ok(Self::check(response).await?.json::<R>().await?)
    }
    async fn get<R: DeserializeOwned>(&self, path: &str) -> Result<R> {
        let response = self.client.get(self.url.clone() + path).send().await?;
        Ok(Self::check(response).await?.json::<R>().await?)
    }
    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if !status.is_success() {
            bail!("{}: {}", status, response.text().await?)
        }
        Ok(response)
    }
}
