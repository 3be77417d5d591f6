use crate::access::Challenges;
use crate::api::*;
use crate::clock::{Clock, SystemClock, TestClock};
use crate::db::SQLite;
use crate::error::map_market_err;
use crate::events::EventLog;
use crate::factory::MarketFactory;
use crate::funding_source::{FundingSource, TestFundingSource};
use crate::market::MarketContext;
use crate::oracle::{PriceOracle, TestPriceFeed};
use crate::settings::Settings;
use anyhow::{Context, Result};
use axum::extract::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use axum_macros::debug_handler;
use chrono::Duration;
use clap::Parser;
use env_logger::{Builder, WriteStyle};
use log::{debug, error, trace, LevelFilter};
use secp256k1::{generate_keypair, rand};
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use tokio::task::JoinHandle;

mod access;
mod api;
mod client;
mod clock;
mod db;
mod error;
mod events;
mod factory;
mod funding_source;
mod market;
mod oracle;
mod settings;
mod settlement;

struct AppState {
    factory: MarketFactory,
    feeds: Vec<Arc<TestPriceFeed>>,
    funding: Arc<TestFundingSource>,
    challenges: Challenges,
    test_clock: Option<Arc<TestClock>>,
}

fn check_access<T: serde::Serialize>(
    state: &AppState,
    request: &PostRequest<T>,
) -> Result<UserPubKey, (StatusCode, String)> {
    if state.test_clock.is_some() {
        return Ok(request.access.user);
    }
    state.challenges.redeem(request).map_err(|e| {
        debug!(
            "User {} sent a request with an invalid signature or challenge",
            request.access.user
        );
        (StatusCode::UNAUTHORIZED, map_any_err(e))
    })
}
fn test_mode_only(state: &AppState) -> Result<&Arc<TestClock>, (StatusCode, String)> {
    state.test_clock.as_ref().ok_or((
        StatusCode::FORBIDDEN,
        "Only available in test mode".to_string(),
    ))
}

#[debug_handler]
async fn create_market(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PostRequest<CreateMarketRequest>>,
) -> Result<(StatusCode, Json<MarketId>), (StatusCode, String)> {
    let creator = check_access(&state, &request)?;
    let data = request.data;
    let market = state
        .factory
        .create_market(
            creator,
            data.asset,
            data.entry_fee,
            data.prediction_cutoff_time,
            data.expiration_time,
        )
        .await
        .map_err(map_market_err)?;
    Ok((StatusCode::CREATED, Json(market.id())))
}
#[debug_handler]
async fn make_prediction(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PostRequest<MakePredictionRequest>>,
) -> Result<(StatusCode, Json<usize>), (StatusCode, String)> {
    let participant = check_access(&state, &request)?;
    let data = request.data;
    trace!(
        "Prediction of {} on market {} by {}",
        data.guess,
        data.market,
        participant
    );
    let index = state
        .factory
        .get_market(data.market)
        .await
        .map_err(map_market_err)?
        .make_prediction(participant, data.guess, data.payment)
        .await
        .map_err(map_market_err)?;
    Ok((StatusCode::CREATED, Json(index)))
}
async fn end_market(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PostRequest<MarketRequest>>,
) -> Result<Json<Settlement>, (StatusCode, String)> {
    let caller = check_access(&state, &request)?;
    debug!("User {} ends market {}", caller, request.data.market);
    let settlement = state
        .factory
        .get_market(request.data.market)
        .await
        .map_err(map_market_err)?
        .end_market()
        .await
        .map_err(map_market_err)?;
    Ok(Json(settlement))
}
async fn get_num_markets(State(state): State<Arc<AppState>>) -> Json<usize> {
    Json(state.factory.get_num_markets().await)
}
async fn get_owner(State(state): State<Arc<AppState>>) -> Json<UserPubKey> {
    Json(state.factory.get_owner())
}
async fn get_price_feeds(State(state): State<Arc<AppState>>) -> Json<Vec<PriceFeedInfo>> {
    Json(state.factory.get_price_feed_info())
}
async fn get_markets(State(state): State<Arc<AppState>>) -> Json<Vec<MarketOverviewResponse>> {
    let mut overviews = vec![];
    for market in state.factory.get_markets().await {
        overviews.push(market.overview().await);
    }
    Json(overviews)
}
async fn get_market(
    State(state): State<Arc<AppState>>,
    Json(request): Json<MarketRequest>,
) -> Result<Json<MarketOverviewResponse>, (StatusCode, String)> {
    let market = state
        .factory
        .get_market(request.market)
        .await
        .map_err(map_market_err)?;
    Ok(Json(market.overview().await))
}
async fn get_predictions(
    State(state): State<Arc<AppState>>,
    Json(request): Json<MarketRequest>,
) -> Result<Json<Vec<Prediction>>, (StatusCode, String)> {
    let market = state
        .factory
        .get_market(request.market)
        .await
        .map_err(map_market_err)?;
    Ok(Json(market.predictions().await))
}
async fn get_events(
    State(state): State<Arc<AppState>>,
    Json(request): Json<EventsRequest>,
) -> Result<Json<Vec<EventRecord>>, (StatusCode, String)> {
    let events = state
        .factory
        .context()
        .events
        .get_events(request.market, request.since)
        .await
        .map_err(map_any_err_and_code)?;
    Ok(Json(events))
}
async fn get_challenge(
    State(state): State<Arc<AppState>>,
    Json(user): Json<UserPubKey>,
) -> Json<String> {
    trace!("Getting challenge for {}", user);
    Json(state.challenges.issue(user))
}
async fn get_balance(
    State(state): State<Arc<AppState>>,
    Json(user): Json<UserPubKey>,
) -> Result<Json<Wei>, (StatusCode, String)> {
    let balance = state
        .funding
        .balance(&user)
        .await
        .map_err(map_any_err_and_code)?;
    Ok(Json(balance))
}
async fn deposit(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DepositRequest>,
) -> Result<Json<Wei>, (StatusCode, String)> {
    test_mode_only(&state)?;
    let balance = state
        .funding
        .deposit(request.user, request.amount)
        .map_err(|e| (StatusCode::BAD_REQUEST, map_any_err(e)))?;
    debug!("Deposited {} wei for {}", request.amount, request.user);
    Ok(Json(balance))
}
async fn advance_clock(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AdvanceClockRequest>,
) -> Result<(), (StatusCode, String)> {
    let clock = test_mode_only(&state)?;
    clock.advance(Duration::seconds(request.seconds));
    state.feeds.iter().for_each(|feed| feed.refresh());
    debug!("Moved test clock to {}", clock.now());
    Ok(())
}

#[derive(Parser)]
struct Args {
    #[arg(short, long)]
    config: Option<String>,
    #[arg(short, long)]
    port: Option<u16>,
    #[arg(short, long)]
    test: bool,
    #[arg(short, long)]
    db: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Args::parse();
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        settings.port = port;
    }
    if cli.db.is_some() {
        settings.db = cli.db;
    }
    settings.test |= cli.test;
    Builder::default()
        .filter_level(LevelFilter::from_str(&settings.log_level).unwrap_or(LevelFilter::Debug))
        .write_style(WriteStyle::Always)
        .init();
    let (_port, handle) = run_server(settings).await?;
    handle.await?;
    Ok(())
}

async fn build_factory(settings: &Settings) -> Result<AppState> {
    let test_clock = settings.test.then(|| Arc::new(TestClock::default()));
    let clock: Arc<dyn Clock + Send + Sync> = match &test_clock {
        Some(clock) => clock.clone(),
        None => Arc::new(SystemClock),
    };
    let owner = match &settings.owner {
        Some(owner) => UserPubKey::from_str(owner).context("invalid owner public key")?,
        None => generate_keypair(&mut rand::thread_rng()).1,
    };
    let feeds = settings
        .feeds
        .iter()
        .map(|feed| {
            Arc::new(TestPriceFeed::new(
                feed.description.clone(),
                feed.decimals,
                feed.answer.into(),
                clock.clone(),
            ))
        })
        .collect::<Vec<_>>();
    let price_feeds = feeds
        .iter()
        .map(|feed| -> Arc<dyn PriceOracle + Send + Sync> { feed.clone() })
        .collect();
    let funding = Arc::new(TestFundingSource::default());
    let context = MarketContext {
        clock: clock.clone(),
        funding: funding.clone(),
        events: EventLog::new(Box::new(SQLite::new(settings.db.clone()).await?), clock).await?,
        max_price_age: Duration::seconds(settings.max_price_age_secs),
    };
    let factory = MarketFactory::new(owner, price_feeds, context)?;
    debug!("Factory owned by {}", owner);
    Ok(AppState {
        factory,
        feeds,
        funding,
        challenges: Challenges::default(),
        test_clock,
    })
}

async fn run_server(settings: Settings) -> Result<(u16, JoinHandle<()>)> {
    let state = Arc::new(build_factory(&settings).await?);
    let test = state.test_clock.is_some();
    if !test {
        let feeds = state.feeds.clone();
        tokio::spawn(async move {
            let mut heartbeat = tokio::time::interval(std::time::Duration::from_secs(60));
            loop {
                heartbeat.tick().await;
                feeds.iter().for_each(|feed| feed.refresh());
            }
        });
    }
    let mut app = Router::new()
        .route("/create_market", post(create_market))
        .route("/make_prediction", post(make_prediction))
        .route("/end_market", post(end_market))
        .route("/get_num_markets", get(get_num_markets))
        .route("/get_owner", get(get_owner))
        .route("/get_price_feeds", get(get_price_feeds))
        .route("/get_markets", get(get_markets))
        .route("/get_market", post(get_market))
        .route("/get_predictions", post(get_predictions))
        .route("/get_events", post(get_events))
        .route("/get_challenge", post(get_challenge))
        .route("/get_balance", post(get_balance));
    if test {
        app = app
            .route("/advance_clock", post(advance_clock))
            .route("/deposit", post(deposit));
    }
    let app = app.with_state(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], settings.port));
    let server = axum::Server::try_bind(&addr)?.serve(app.into_make_service());
    let port = server.local_addr().port();
    debug!("Listening on {}", server.local_addr());
    let handle = tokio::spawn(async move {
        if let Err(e) = server.await {
            error!("Server stopped: {}", e);
        }
    });
    Ok((port, handle))
}
