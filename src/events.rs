use crate::api::{Event, EventRecord, MarketId};
use crate::clock::Clock;
use crate::db::DB;
use anyhow::Result;
use log::{error, info};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Numbers, logs and journals every event a factory or its markets publish.
pub struct EventLog {
    db: Arc<Box<dyn DB + Send + Sync>>,
    clock: Arc<dyn Clock + Send + Sync>,
    next_seq: Mutex<u64>,
}
impl EventLog {
    pub async fn new(
        db: Box<dyn DB + Send + Sync>,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Result<Self> {
        let next_seq = db.get_last_seq().await?.map_or(0, |seq| seq + 1);
        Ok(Self {
            db: Arc::new(db),
            clock,
            next_seq: Mutex::new(next_seq),
        })
    }
    /// Emission never fails: the state change behind an event has already
    /// happened, so a journal error is only logged.
    pub async fn emit(&self, event: Event) -> EventRecord {
        let mut next_seq = self.next_seq.lock().await;
        let record = EventRecord {
            seq: *next_seq,
            at: self.clock.now(),
            event,
        };
        *next_seq += 1;
        info!("Event {}: {}", record.seq, record.event);
        if let Err(e) = self.db.add_event(&record).await {
            error!("Failed to journal event {}: {:#}", record.seq, e);
        }
        record
    }
    pub async fn get_events(&self, market: Option<MarketId>, since: u64) -> Result<Vec<EventRecord>> {
        self.db.get_events(market, since).await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::UserPubKey;
    use crate::clock::TestClock;
    use crate::db::SQLite;
    use rust_decimal_macros::dec;
    use secp256k1::{generate_keypair, rand};

    fn prediction_made(market: MarketId, participant: UserPubKey) -> Event {
        Event::PredictionMade {
            market,
            participant,
            guess: dec!(1),
        }
    }

    #[tokio::test]
    async fn sequence_numbers_are_gap_free() {
        let log = EventLog::new(
            Box::new(SQLite::new(None).await.unwrap()),
            Arc::new(TestClock::default()),
        )
        .await
        .unwrap();
        let (_, user) = generate_keypair(&mut rand::thread_rng());
        let first = log.emit(prediction_made(0, user)).await;
        let second = log.emit(prediction_made(1, user)).await;
        assert_eq!((first.seq, second.seq), (0, 1));
        assert_eq!(log.get_events(None, 0).await.unwrap(), vec![first, second]);
    }
}
