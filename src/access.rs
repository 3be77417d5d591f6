use crate::api::{PostRequest, UserPubKey};
use anyhow::{bail, Result};
use log::trace;
use secp256k1::rand::{self, distributions::Alphanumeric, Rng};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;

/// Hands out login challenges and accepts each one for a single signed request.
///
/// Only the latest challenge of a user is outstanding.
#[derive(Debug, Default)]
pub struct Challenges {
    outstanding: Mutex<HashMap<UserPubKey, String>>,
}
impl Challenges {
    pub fn issue(&self, user: UserPubKey) -> String {
        let challenge: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(30)
            .map(char::from)
            .collect();
        trace!("Generated challenge {} for {}", challenge, user);
        self.outstanding
            .lock()
            .unwrap()
            .insert(user, challenge.clone());
        challenge
    }
    /// Checks the signature and uses up the challenge it was made over.
    pub fn redeem<T: Serialize>(&self, request: &PostRequest<T>) -> Result<UserPubKey> {
        request.verify()?;
        let access = &request.access;
        let mut outstanding = self.outstanding.lock().unwrap();
        match outstanding.get(&access.user) {
            Some(challenge) if *challenge == access.challenge => {
                outstanding.remove(&access.user);
                Ok(access.user)
            }
            _ => bail!("Challenge {} is unknown or already used", access.challenge),
        }
    }
}
