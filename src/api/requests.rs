use anyhow::Result;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secp256k1::ecdsa::Signature;
use secp256k1::hashes::sha256::Hash;
use secp256k1::{Message, SecretKey};
use serde::{Deserialize, Serialize};

use super::*;

// Requests
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AccessRequest {
    pub user: UserPubKey,
    pub challenge: String,
    pub sig: Signature,
}
/// A request whose `data` is signed by `access.user`.
///
/// The signature covers the SHA-256 of the JSON encoding of the server issued
/// `challenge` together with `data`. A challenge is only good for one request.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PostRequest<T> {
    pub access: AccessRequest,
    pub data: T,
}
impl<T: Serialize> PostRequest<T> {
    pub fn sign(data: T, challenge: String, secret_key: &SecretKey) -> Result<Self> {
        let message = Self::message(&challenge, &data)?;
        let access = AccessRequest {
            user: UserPubKey::from_secret_key_global(secret_key),
            challenge,
            sig: secret_key.sign_ecdsa(message),
        };
        Ok(Self { access, data })
    }
    pub fn verify(&self) -> Result<()> {
        let message = Self::message(&self.access.challenge, &self.data)?;
        self.access.sig.verify(&message, &self.access.user)?;
        Ok(())
    }
    fn message(challenge: &str, data: &T) -> Result<Message> {
        let bytes = serde_json::to_vec(&(challenge, data))?;
        Ok(Message::from_hashed_data::<Hash>(&bytes))
    }
}
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CreateMarketRequest {
    pub asset: AssetId,
    pub entry_fee: Wei,
    pub prediction_cutoff_time: DateTime<Utc>,
    pub expiration_time: DateTime<Utc>,
}
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MakePredictionRequest {
    pub market: MarketId,
    pub guess: Decimal,
    pub payment: Wei,
}
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MarketRequest {
    pub market: MarketId,
}
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct EventsRequest {
    pub market: Option<MarketId>,
    pub since: u64,
}
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DepositRequest {
    pub user: UserPubKey,
    pub amount: Wei,
}
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AdvanceClockRequest {
    pub seconds: i64,
}
