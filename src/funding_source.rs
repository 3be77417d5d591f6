use crate::api::{PaymentId, Payout, UserPubKey, Wei};
use anyhow::{bail, Result};
use async_trait::async_trait;
use secp256k1::{generate_keypair, rand};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// Moves currency between participants and the escrow holding every pool.
#[async_trait]
pub trait FundingSource {
    /// Takes `amount` from `user` into escrow, or nothing at all.
    async fn collect(&self, user: &UserPubKey, amount: Wei) -> Result<PaymentId>;
    /// Pays every entry of `payouts` out of escrow or none of them.
    async fn pay_out(&self, payouts: &[Payout]) -> Result<PaymentId>;
    async fn balance(&self, user: &UserPubKey) -> Result<Wei>;
}
#[derive(Debug, Default)]
struct Ledger {
    balances: HashMap<UserPubKey, Wei>,
    escrow: Wei,
}
#[derive(Debug, Default)]
pub struct TestFundingSource {
    ledger: Arc<Mutex<Ledger>>,
    refused: Arc<Mutex<HashSet<UserPubKey>>>,
}
impl TestFundingSource {
    pub fn deposit(&self, user: UserPubKey, amount: Wei) -> Result<Wei> {
        let mut ledger = self.ledger.lock().unwrap();
        let balance = ledger.balances.entry(user).or_default();
        match balance.checked_add(amount) {
            Some(new) => *balance = new,
            None => bail!("Balance of {} can't take another {} wei", user, amount),
        }
        Ok(*balance)
    }
    pub fn escrow(&self) -> Wei {
        self.ledger.lock().unwrap().escrow
    }
    /// Every batch containing `user` fails from now on.
    pub fn refuse(&self, user: UserPubKey) {
        self.refused.lock().unwrap().insert(user);
    }
    pub fn accept(&self, user: &UserPubKey) {
        self.refused.lock().unwrap().remove(user);
    }
    fn payment_id() -> PaymentId {
        generate_keypair(&mut rand::thread_rng()).1.to_string()
    }
}
#[async_trait]
impl FundingSource for TestFundingSource {
    async fn collect(&self, user: &UserPubKey, amount: Wei) -> Result<PaymentId> {
        let mut ledger = self.ledger.lock().unwrap();
        let balance = ledger.balances.get(user).copied().unwrap_or_default();
        if balance < amount {
            bail!(
                "Balance of {} is {} wei, can't collect {} wei",
                user,
                balance,
                amount
            )
        }
        let Some(escrow) = ledger.escrow.checked_add(amount) else {
            bail!("Escrow can't take another {} wei", amount)
        };
        ledger.balances.insert(*user, balance - amount);
        ledger.escrow = escrow;
        Ok(Self::payment_id())
    }
    async fn pay_out(&self, payouts: &[Payout]) -> Result<PaymentId> {
        let refused = self.refused.lock().unwrap();
        if let Some(payout) = payouts.iter().find(|p| refused.contains(&p.user)) {
            bail!("Recipient {} refused the transfer", payout.user)
        }
        let mut ledger = self.ledger.lock().unwrap();
        let mut total: Wei = 0;
        for payout in payouts {
            total = match total.checked_add(payout.amount) {
                Some(total) => total,
                None => bail!("Payout batch overflows"),
            };
        }
        if total > ledger.escrow {
            bail!(
                "Escrow holds {} wei, can't pay out {} wei",
                ledger.escrow,
                total
            )
        }
        ledger.escrow -= total;
        for payout in payouts {
            *ledger.balances.entry(payout.user).or_default() += payout.amount;
        }
        Ok(Self::payment_id())
    }
    async fn balance(&self, user: &UserPubKey) -> Result<Wei> {
        Ok(self
            .ledger
            .lock()
            .unwrap()
            .balances
            .get(user)
            .copied()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn user() -> UserPubKey {
        generate_keypair(&mut rand::thread_rng()).1
    }

    #[tokio::test]
    async fn collection_needs_funds() {
        let funding = TestFundingSource::default();
        let u1 = user();
        funding.collect(&u1, 1).await.unwrap_err();
        funding.deposit(u1, 100).unwrap();
        funding.collect(&u1, 101).await.unwrap_err();
        assert_eq!(funding.balance(&u1).await.unwrap(), 100);

        funding.collect(&u1, 60).await.unwrap();
        assert_eq!(funding.balance(&u1).await.unwrap(), 40);
        assert_eq!(funding.escrow(), 60);
    }

    #[tokio::test]
    async fn batch_is_all_or_nothing() {
        let funding = TestFundingSource::default();
        let (u1, u2) = (user(), user());
        funding.deposit(u1, 100).unwrap();
        funding.collect(&u1, 100).await.unwrap();
        let batch = vec![
            Payout {
                user: u1,
                amount: 50,
            },
            Payout {
                user: u2,
                amount: 50,
            },
        ];

        funding.refuse(u2);
        funding.pay_out(&batch).await.unwrap_err();
        assert_eq!(funding.balance(&u1).await.unwrap(), 0);
        assert_eq!(funding.balance(&u2).await.unwrap(), 0);
        assert_eq!(funding.escrow(), 100);

        funding.accept(&u2);
        funding.pay_out(&batch).await.unwrap();
        assert_eq!(funding.balance(&u1).await.unwrap(), 50);
        assert_eq!(funding.balance(&u2).await.unwrap(), 50);
        assert_eq!(funding.escrow(), 0);
    }

    #[tokio::test]
    async fn escrow_is_never_overdrawn() {
        let funding = TestFundingSource::default();
        let u1 = user();
        let batch = vec![Payout {
            user: u1,
            amount: 1,
        }];
        funding.pay_out(&batch).await.unwrap_err();
        assert_eq!(funding.balance(&u1).await.unwrap(), 0);
    }
}
