use crate::api::*;
use crate::clock::Clock;
use crate::error::MarketError;
use crate::events::EventLog;
use crate::funding_source::FundingSource;
use crate::oracle::PriceOracle;
use crate::settlement;
use chrono::{DateTime, Duration, Utc};
use log::{debug, error, info};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Collaborators shared by a factory and every market it creates.
pub struct MarketContext {
    pub clock: Arc<dyn Clock + Send + Sync>,
    pub funding: Arc<dyn FundingSource + Send + Sync>,
    pub events: EventLog,
    pub max_price_age: Duration,
}
#[derive(Debug, Default)]
struct Book {
    predictions: Vec<Prediction>,
    pool: Wei,
    settlement: Option<Settlement>,
}
pub struct Market {
    id: MarketId,
    creator: UserPubKey,
    asset: AssetId,
    entry_fee: Wei,
    prediction_cutoff_time: DateTime<Utc>,
    expiration_time: DateTime<Utc>,
    price_feed: Arc<dyn PriceOracle + Send + Sync>,
    context: Arc<MarketContext>,
    book: Mutex<Book>,
}

pub fn phase(
    now: DateTime<Utc>,
    prediction_cutoff_time: DateTime<Utc>,
    expiration_time: DateTime<Utc>,
    settled: bool,
) -> MarketPhase {
    //! Settlement is possible in `AwaitingSettlement` once `now` reached
    //! `expiration_time`.
    debug_assert!(expiration_time > prediction_cutoff_time);
    if settled {
        MarketPhase::Settled
    } else if now < prediction_cutoff_time {
        MarketPhase::Open
    } else {
        MarketPhase::AwaitingSettlement
    }
}

impl Market {
    pub(crate) fn new(
        id: MarketId,
        creator: UserPubKey,
        asset: AssetId,
        entry_fee: Wei,
        prediction_cutoff_time: DateTime<Utc>,
        expiration_time: DateTime<Utc>,
        price_feed: Arc<dyn PriceOracle + Send + Sync>,
        context: Arc<MarketContext>,
    ) -> Self {
        Self {
            id,
            creator,
            asset,
            entry_fee,
            prediction_cutoff_time,
            expiration_time,
            price_feed,
            context,
            book: Mutex::new(Book::default()),
        }
    }
    pub async fn make_prediction(
        &self,
        participant: UserPubKey,
        guess: Decimal,
        payment: Wei,
    ) -> Result<usize, MarketError> {
        let mut book = self.book.lock().await;
        match self.phase_at(self.context.clock.now(), &book) {
            MarketPhase::Open => {}
            _ => return Err(MarketError::PredictionWindowClosed),
        }
        if payment < self.entry_fee {
            return Err(MarketError::InsufficientPayment {
                paid: payment,
                entry_fee: self.entry_fee,
            });
        }
        let decimals = self.price_feed.decimals();
        if settlement::guess_units(guess, decimals).is_none() {
            return Err(MarketError::InvalidGuess { guess, decimals });
        }
        let pool = book
            .pool
            .checked_add(payment)
            .ok_or(MarketError::PoolOverflow {
                pool: book.pool,
                payment,
            })?;
        let receipt = self
            .context
            .funding
            .collect(&participant, payment)
            .await
            .map_err(|e| MarketError::CollectionFailed(format!("{:#}", e)))?;
        book.predictions.push(Prediction {
            participant,
            guess,
            amount_paid: payment,
        });
        book.pool = pool;
        let index = book.predictions.len() - 1;
        debug!(
            "Market {}: prediction {} of {} by {} with {} wei, payment {}",
            self.id, index, guess, participant, payment, receipt
        );
        self.context
            .events
            .emit(Event::PredictionMade {
                market: self.id,
                participant,
                guess,
            })
            .await;
        Ok(index)
    }
    pub async fn end_market(&self) -> Result<Settlement, MarketError> {
        //! Nothing is changed unless the whole pool split was paid out.
        let mut book = self.book.lock().await;
        let now = self.context.clock.now();
        if book.settlement.is_some() {
            return Err(MarketError::AlreadySettled);
        }
        if now < self.expiration_time {
            return Err(MarketError::SettlementNotReady);
        }
        if book.predictions.is_empty() {
            return Err(MarketError::NoPredictions);
        }
        let (round, price) = self.reference_price(now).await?;
        let resolution =
            settlement::resolve(&book.predictions, round.answer, round.decimals, book.pool)?;
        let paid = book
            .predictions
            .iter()
            .try_fold(0 as Wei, |sum, p| sum.checked_add(p.amount_paid));
        if paid != Some(book.pool) {
            let paid = paid.unwrap_or(Wei::MAX);
            error!(
                "Market {}: pool holds {} wei but predictions paid {} wei",
                self.id, book.pool, paid
            );
            return Err(MarketError::PoolMismatch {
                pool: book.pool,
                paid,
            });
        }
        let payment = self
            .context
            .funding
            .pay_out(&resolution.winners)
            .await
            .map_err(|e| MarketError::PayoutFailed(format!("{:#}", e)))?;

        let settlement = Settlement {
            price,
            winners: resolution.winners,
            payout_per_winner: resolution.payout_per_winner,
            total_payout: resolution.total_payout,
            remainder: resolution.remainder,
            settled_at: now,
        };
        book.pool = resolution.remainder;
        book.settlement = Some(settlement.clone());
        info!(
            "Market {} settled at price {} with {} winner(s), payment {}",
            self.id,
            price,
            settlement.winners.len(),
            payment
        );

        let events = &self.context.events;
        events
            .emit(Event::WinnerChosen {
                market: self.id,
                winner: settlement.winners[0].user,
                total_payout: settlement.total_payout,
                num_winners: settlement.winners.len(),
            })
            .await;
        for winner in settlement.winners.iter() {
            events
                .emit(Event::WinnerPaid {
                    market: self.id,
                    winner: winner.user,
                    amount: winner.amount,
                })
                .await;
        }
        Ok(settlement)
    }
    async fn reference_price(
        &self,
        now: DateTime<Utc>,
    ) -> Result<(PriceData, Decimal), MarketError> {
        let description = self.price_feed.description();
        let round = self
            .price_feed
            .current_price()
            .await
            .map_err(|e| MarketError::OraclePriceUnavailable(format!("{:#}", e)))?;
        if round.answer <= 0 {
            return Err(MarketError::OraclePriceUnavailable(format!(
                "{} reported non-positive answer {}",
                description, round.answer
            )));
        }
        if round.decimals != self.price_feed.decimals() {
            return Err(MarketError::OraclePriceUnavailable(format!(
                "{} reported {} decimals instead of {}",
                description,
                round.decimals,
                self.price_feed.decimals()
            )));
        }
        if round.updated_at < now - self.context.max_price_age {
            return Err(MarketError::OraclePriceUnavailable(format!(
                "{} price from {} is stale",
                description, round.updated_at
            )));
        }
        match round.price() {
            Some(price) => Ok((round, price)),
            None => Err(MarketError::OraclePriceUnavailable(format!(
                "{} answer {} with {} decimals is out of range",
                description, round.answer, round.decimals
            ))),
        }
    }
    fn phase_at(&self, now: DateTime<Utc>, book: &Book) -> MarketPhase {
        phase(
            now,
            self.prediction_cutoff_time,
            self.expiration_time,
            book.settlement.is_some(),
        )
    }
    pub async fn phase(&self) -> MarketPhase {
        let book = self.book.lock().await;
        self.phase_at(self.context.clock.now(), &book)
    }
    pub fn id(&self) -> MarketId {
        self.id
    }
    pub fn creator(&self) -> UserPubKey {
        self.creator
    }
    pub fn asset(&self) -> AssetId {
        self.asset
    }
    pub fn entry_fee(&self) -> Wei {
        self.entry_fee
    }
    pub fn prediction_cutoff_time(&self) -> DateTime<Utc> {
        self.prediction_cutoff_time
    }
    pub fn expiration_time(&self) -> DateTime<Utc> {
        self.expiration_time
    }
    pub fn price_feed(&self) -> &Arc<dyn PriceOracle + Send + Sync> {
        &self.price_feed
    }
    pub async fn num_players(&self) -> usize {
        self.book.lock().await.predictions.len()
    }
    pub async fn predictions(&self) -> Vec<Prediction> {
        self.book.lock().await.predictions.clone()
    }
    pub async fn pool(&self) -> Wei {
        self.book.lock().await.pool
    }
    pub async fn is_settled(&self) -> bool {
        self.book.lock().await.settlement.is_some()
    }
    pub async fn settlement(&self) -> Option<Settlement> {
        self.book.lock().await.settlement.clone()
    }
    pub async fn overview(&self) -> MarketOverviewResponse {
        let book = self.book.lock().await;
        MarketOverviewResponse {
            id: self.id,
            creator: self.creator,
            asset: self.asset,
            price_feed: self.price_feed.description(),
            entry_fee: self.entry_fee,
            prediction_cutoff_time: self.prediction_cutoff_time,
            expiration_time: self.expiration_time,
            phase: self.phase_at(self.context.clock.now(), &book),
            pool: book.pool,
            num_players: book.predictions.len(),
            settlement: book.settlement.clone(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::clock::TestClock;
    use crate::db::SQLite;
    use crate::funding_source::TestFundingSource;
    use crate::oracle::TestPriceFeed;
    use rust_decimal_macros::dec;
    use secp256k1::{generate_keypair, rand};

    const ENTRY_FEE: Wei = 100_000_000_000_000_000;
    const DEPOSIT: Wei = 10 * ENTRY_FEE;

    struct Setup {
        market: Arc<Market>,
        clock: Arc<TestClock>,
        feed: Arc<TestPriceFeed>,
        funding: Arc<TestFundingSource>,
        context: Arc<MarketContext>,
    }
    impl Setup {
        /// A fresh participant holding `DEPOSIT` wei.
        fn funded(&self) -> UserPubKey {
            let participant = user();
            self.funding.deposit(participant, DEPOSIT).unwrap();
            participant
        }
    }

    async fn setup(price: i128) -> Setup {
        let clock = Arc::new(TestClock::default());
        let feed = Arc::new(TestPriceFeed::new("BTC / USD", 0, price, clock.clone()));
        let funding = Arc::new(TestFundingSource::default());
        let context = Arc::new(MarketContext {
            clock: clock.clone(),
            funding: funding.clone(),
            events: EventLog::new(Box::new(SQLite::new(None).await.unwrap()), clock.clone())
                .await
                .unwrap(),
            max_price_age: Duration::hours(3),
        });
        let now = clock.now();
        let market = Arc::new(Market::new(
            0,
            user(),
            1,
            ENTRY_FEE,
            now + Duration::hours(1),
            now + Duration::hours(2),
            feed.clone(),
            context.clone(),
        ));
        Setup {
            market,
            clock,
            feed,
            funding,
            context,
        }
    }
    fn user() -> UserPubKey {
        generate_keypair(&mut rand::thread_rng()).1
    }

    #[test]
    fn phase_follows_the_clock() {
        let cutoff = Utc::now();
        let expiration = cutoff + Duration::hours(1);
        let before = cutoff - Duration::seconds(1);
        assert_eq!(phase(before, cutoff, expiration, false), MarketPhase::Open);
        assert_eq!(
            phase(cutoff, cutoff, expiration, false),
            MarketPhase::AwaitingSettlement
        );
        assert_eq!(
            phase(expiration, cutoff, expiration, false),
            MarketPhase::AwaitingSettlement
        );
        assert_eq!(phase(before, cutoff, expiration, true), MarketPhase::Settled);
    }

    #[tokio::test]
    async fn prediction_with_entry_fee_is_recorded() {
        let s = setup(30000).await;
        let participant = s.funded();
        let index = s
            .market
            .make_prediction(participant, dec!(2500), ENTRY_FEE)
            .await
            .unwrap();
        assert_eq!(index, 0);
        assert_eq!(s.market.num_players().await, 1);
        assert_eq!(s.market.pool().await, ENTRY_FEE);
        assert_eq!(
            s.market.predictions().await,
            vec![Prediction {
                participant,
                guess: dec!(2500),
                amount_paid: ENTRY_FEE
            }]
        );
    }

    #[tokio::test]
    async fn payment_is_collected_from_the_participant() {
        let s = setup(30000).await;
        let participant = s.funded();
        s.market
            .make_prediction(participant, dec!(2500), 3 * ENTRY_FEE)
            .await
            .unwrap();
        assert_eq!(
            s.funding.balance(&participant).await.unwrap(),
            DEPOSIT - 3 * ENTRY_FEE
        );
        assert_eq!(s.funding.escrow(), 3 * ENTRY_FEE);
        assert_eq!(s.market.pool().await, 3 * ENTRY_FEE);
    }

    #[tokio::test]
    async fn unfunded_prediction_changes_nothing() {
        let s = setup(30000).await;
        let broke = user();
        let err = s
            .market
            .make_prediction(broke, dec!(30000), 1000 * ENTRY_FEE)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::CollectionFailed(_)));
        assert_eq!(err.kind(), crate::error::ErrorKind::Funding);
        assert_eq!(s.market.num_players().await, 0);
        assert_eq!(s.market.pool().await, 0);

        let participant = s.funded();
        s.market
            .make_prediction(participant, dec!(2500), ENTRY_FEE)
            .await
            .unwrap();
        s.clock.advance(Duration::hours(2));
        s.market.end_market().await.unwrap();
        assert_eq!(s.funding.balance(&broke).await.unwrap(), 0);
        assert_eq!(s.funding.balance(&participant).await.unwrap(), DEPOSIT);
        let events = s.context.events.get_events(Some(0), 0).await.unwrap();
        assert_eq!(
            events
                .iter()
                .filter(|r| r.event.kind() == "PredictionMade")
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn same_participant_may_predict_twice() {
        let s = setup(30000).await;
        let participant = s.funded();
        for _ in 0..2 {
            s.market
                .make_prediction(participant, dec!(2500), ENTRY_FEE)
                .await
                .unwrap();
        }
        assert_eq!(s.market.num_players().await, 2);
        assert_eq!(s.market.pool().await, 2 * ENTRY_FEE);
    }

    #[tokio::test]
    async fn insufficient_payment_changes_nothing() {
        let s = setup(30000).await;
        let participant = s.funded();
        let err = s
            .market
            .make_prediction(participant, dec!(2500), ENTRY_FEE - 1)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            MarketError::InsufficientPayment {
                paid: ENTRY_FEE - 1,
                entry_fee: ENTRY_FEE
            }
        );
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
        assert_eq!(s.market.num_players().await, 0);
        assert_eq!(s.market.pool().await, 0);
        assert_eq!(s.funding.balance(&participant).await.unwrap(), DEPOSIT);
    }

    #[tokio::test]
    async fn guess_finer_than_the_feed_is_rejected() {
        let s = setup(30000).await;
        let participant = s.funded();
        let err = s
            .market
            .make_prediction(participant, dec!(0.1000000000000000000000000001), ENTRY_FEE)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            MarketError::InvalidGuess {
                guess: dec!(0.1000000000000000000000000001),
                decimals: 0
            }
        );
        assert_eq!(s.market.num_players().await, 0);
        assert_eq!(s.funding.balance(&participant).await.unwrap(), DEPOSIT);
        s.market
            .make_prediction(participant, dec!(2500.000), ENTRY_FEE)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn window_closes_at_cutoff_regardless_of_payment() {
        let s = setup(30000).await;
        let participant = s.funded();
        s.clock.advance(Duration::hours(1));
        for payment in [0, ENTRY_FEE, 10 * ENTRY_FEE] {
            assert_eq!(
                s.market
                    .make_prediction(participant, dec!(2500), payment)
                    .await
                    .unwrap_err(),
                MarketError::PredictionWindowClosed
            );
        }
        assert_eq!(s.market.num_players().await, 0);
        assert_eq!(s.funding.balance(&participant).await.unwrap(), DEPOSIT);
    }

    #[tokio::test]
    async fn settlement_waits_for_expiration() {
        let s = setup(30000).await;
        s.market
            .make_prediction(s.funded(), dec!(2500), ENTRY_FEE)
            .await
            .unwrap();
        s.clock.advance(Duration::minutes(119));
        assert_eq!(
            s.market.end_market().await.unwrap_err(),
            MarketError::SettlementNotReady
        );
        assert!(!s.market.is_settled().await);
        assert_eq!(s.market.pool().await, ENTRY_FEE);
        assert_eq!(
            s.market.phase().await,
            MarketPhase::AwaitingSettlement
        );
    }

    #[tokio::test]
    async fn sole_participant_wins_the_pool() {
        let s = setup(30000).await;
        let participant = s.funded();
        s.market
            .make_prediction(participant, dec!(2500), ENTRY_FEE)
            .await
            .unwrap();
        s.clock.advance(Duration::hours(1));
        s.market
            .make_prediction(s.funded(), dec!(2500), ENTRY_FEE)
            .await
            .unwrap_err();
        s.clock.advance(Duration::hours(1));
        s.feed.update_answer(30000);

        let settlement = s.market.end_market().await.unwrap();
        assert_eq!(
            settlement.winners,
            vec![Payout {
                user: participant,
                amount: ENTRY_FEE
            }]
        );
        assert_eq!(settlement.price, dec!(30000));
        assert_eq!(s.market.pool().await, 0);
        assert_eq!(s.market.phase().await, MarketPhase::Settled);
        assert_eq!(s.funding.balance(&participant).await.unwrap(), DEPOSIT);
        assert_eq!(s.funding.escrow(), 0);

        let events = s.context.events.get_events(Some(0), 0).await.unwrap();
        let chosen = events
            .iter()
            .find(|r| r.event.kind() == "WinnerChosen")
            .unwrap();
        assert_eq!(
            chosen.event,
            Event::WinnerChosen {
                market: 0,
                winner: participant,
                total_payout: ENTRY_FEE,
                num_winners: 1
            }
        );

        assert_eq!(
            s.market.end_market().await.unwrap_err(),
            MarketError::AlreadySettled
        );
        assert_eq!(s.funding.balance(&participant).await.unwrap(), DEPOSIT);
    }

    #[tokio::test]
    async fn tie_splits_and_conserves_value() {
        let s = setup(3000).await;
        let (a, b, c) = (s.funded(), s.funded(), s.funded());
        s.market.make_prediction(a, dec!(2900), ENTRY_FEE).await.unwrap();
        s.market
            .make_prediction(b, dec!(3100), ENTRY_FEE + 1)
            .await
            .unwrap();
        s.market.make_prediction(c, dec!(2000), ENTRY_FEE).await.unwrap();
        s.clock.advance(Duration::hours(2));
        s.feed.update_answer(3000);

        let pool = 3 * ENTRY_FEE + 1;
        let settlement = s.market.end_market().await.unwrap();
        assert_eq!(settlement.winners.len(), 2);
        assert_eq!(settlement.payout_per_winner, pool / 2);
        assert_eq!(settlement.remainder, 1);
        assert_eq!(settlement.total_payout + settlement.remainder, pool);
        assert_eq!(s.market.pool().await, settlement.remainder);
        assert_eq!(s.funding.escrow(), settlement.remainder);
        assert_eq!(
            s.funding.balance(&a).await.unwrap(),
            DEPOSIT - ENTRY_FEE + pool / 2
        );
        assert_eq!(
            s.funding.balance(&b).await.unwrap(),
            DEPOSIT - ENTRY_FEE - 1 + pool / 2
        );
        assert_eq!(s.funding.balance(&c).await.unwrap(), DEPOSIT - ENTRY_FEE);

        let paid = s
            .context
            .events
            .get_events(Some(0), 0)
            .await
            .unwrap()
            .into_iter()
            .filter(|r| r.event.kind() == "WinnerPaid")
            .count();
        assert_eq!(paid, 2);
    }

    #[tokio::test]
    async fn empty_market_cannot_be_settled() {
        let s = setup(3000).await;
        s.clock.advance(Duration::hours(2));
        assert_eq!(
            s.market.end_market().await.unwrap_err(),
            MarketError::NoPredictions
        );
        assert!(!s.market.is_settled().await);
    }

    #[tokio::test]
    async fn unavailable_oracle_aborts_settlement() {
        let s = setup(3000).await;
        let participant = s.funded();
        s.market
            .make_prediction(participant, dec!(2500), ENTRY_FEE)
            .await
            .unwrap();
        s.clock.advance(Duration::hours(2));

        s.feed.set_unavailable();
        let err = s.market.end_market().await.unwrap_err();
        assert!(matches!(err, MarketError::OraclePriceUnavailable(_)));
        assert!(!s.market.is_settled().await);

        s.feed.update_answer(-1);
        assert!(matches!(
            s.market.end_market().await.unwrap_err(),
            MarketError::OraclePriceUnavailable(_)
        ));

        s.feed.update_answer(3000);
        s.clock.advance(Duration::hours(4));
        assert!(matches!(
            s.market.end_market().await.unwrap_err(),
            MarketError::OraclePriceUnavailable(_)
        ));
        assert_eq!(s.market.pool().await, ENTRY_FEE);
        assert_eq!(
            s.funding.balance(&participant).await.unwrap(),
            DEPOSIT - ENTRY_FEE
        );

        s.feed.update_answer(3000);
        s.market.end_market().await.unwrap();
        assert_eq!(s.funding.balance(&participant).await.unwrap(), DEPOSIT);
    }

    #[tokio::test]
    async fn refused_payout_rolls_back_everything() {
        let s = setup(3000).await;
        let (a, b) = (s.funded(), s.funded());
        s.market.make_prediction(a, dec!(2900), ENTRY_FEE).await.unwrap();
        s.market.make_prediction(b, dec!(3100), ENTRY_FEE).await.unwrap();
        s.clock.advance(Duration::hours(2));
        s.feed.update_answer(3000);

        s.funding.refuse(b);
        let err = s.market.end_market().await.unwrap_err();
        assert!(matches!(err, MarketError::PayoutFailed(_)));
        assert!(!s.market.is_settled().await);
        assert_eq!(s.market.pool().await, 2 * ENTRY_FEE);
        assert_eq!(s.funding.escrow(), 2 * ENTRY_FEE);
        assert_eq!(s.funding.balance(&a).await.unwrap(), DEPOSIT - ENTRY_FEE);
        let events = s.context.events.get_events(Some(0), 0).await.unwrap();
        assert!(events.iter().all(|r| r.event.kind() == "PredictionMade"));

        s.funding.accept(&b);
        s.market.end_market().await.unwrap();
        assert_eq!(s.funding.balance(&a).await.unwrap(), DEPOSIT);
        assert_eq!(s.funding.balance(&b).await.unwrap(), DEPOSIT);
    }

    #[tokio::test]
    async fn concurrent_predictions_are_serialized() {
        let s = setup(3000).await;
        let mut handles = vec![];
        for i in 0..20 {
            let market = s.market.clone();
            let participant = s.funded();
            handles.push(tokio::spawn(async move {
                market
                    .make_prediction(participant, Decimal::from(i), ENTRY_FEE + i as Wei)
                    .await
            }));
        }
        let mut indices = vec![];
        for handle in handles {
            indices.push(handle.await.unwrap().unwrap());
        }
        indices.sort();
        assert_eq!(indices, (0..20).collect::<Vec<_>>());
        let expected: Wei = (0..20).map(|i| ENTRY_FEE + i as Wei).sum();
        assert_eq!(s.market.pool().await, expected);
        assert_eq!(s.funding.escrow(), expected);
    }
}
