#![allow(unused)]
use std::str::FromStr;

use anyhow::Result;
use api::*;
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use secp256k1::{generate_keypair, rand, SecretKey};
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncWriteExt},
};

use crate::client::Client;

mod api;
mod client;

#[derive(Parser)]
struct Args {
    #[command(subcommand)]
    command: Commands,
    #[arg(short, long)]
    url: String,
}
#[derive(Subcommand)]
enum Commands {
    GenerateKeys,
    CreateMarket {
        #[arg(short, long)]
        asset: AssetId,
        /// Entry fee in ETH
        #[arg(short, long)]
        entry_fee: Decimal,
        #[arg(short, long)]
        cutoff: DateTime<Utc>,
        #[arg(short = 'x', long)]
        expiration: DateTime<Utc>,
    },
    Predict {
        #[arg(short, long)]
        market: MarketId,
        #[arg(short, long)]
        guess: Decimal,
        /// Payment in ETH
        #[arg(short, long)]
        payment: Decimal,
    },
    EndMarket {
        #[arg(short, long)]
        market: MarketId,
    },
    GetMarkets,
    GetMarket {
        #[arg(short, long)]
        market: MarketId,
    },
    GetPredictions {
        #[arg(short, long)]
        market: MarketId,
    },
    GetEvents {
        #[arg(short, long)]
        market: Option<MarketId>,
        #[arg(short, long, default_value_t = 0)]
        since: u64,
    },
    GetPriceFeeds,
    /// Credits ETH to a user, only on servers running in test mode
    Deposit {
        #[arg(short, long)]
        user: Option<UserPubKey>,
        #[arg(short, long)]
        amount: Decimal,
    },
    Balance {
        #[arg(short, long)]
        user: Option<UserPubKey>,
    },
    /// Creates a batch of markets spread over all assets for local testing
    Seed {
        #[arg(short, long, default_value_t = 8)]
        count: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Args::parse();
    let client = Client::new(cli.url);

    match cli.command {
        Commands::GenerateKeys => {
            let keys = generate_keypair(&mut rand::thread_rng());
            println!("Pubkey: {}", keys.1);
            let mut private = File::create("ecdsa.key").await?;
            let mut public = File::create("ecdsa.pub").await?;
            private
                .write_all(format!("{}", keys.0.display_secret()).as_bytes())
                .await?;
            public.write_all(keys.1.to_string().as_bytes()).await?;
        }
        Commands::CreateMarket {
            asset,
            entry_fee,
            cutoff,
            expiration,
        } => {
            let request = CreateMarketRequest {
                asset,
                entry_fee: eth_to_wei(entry_fee)?,
                prediction_cutoff_time: cutoff,
                expiration_time: expiration,
            };
            let id = client.create_market(request, &read_secret().await?).await?;
            println!("Created market {}", id);
        }
        Commands::Predict {
            market,
            guess,
            payment,
        } => {
            let request = MakePredictionRequest {
                market,
                guess,
                payment: eth_to_wei(payment)?,
            };
            let index = client
                .make_prediction(request, &read_secret().await?)
                .await?;
            println!("Recorded prediction #{} on market {}", index, market);
        }
        Commands::EndMarket { market } => {
            let settlement = client.end_market(market, &read_secret().await?).await?;
            println!("Settled market {} at a price of {}", market, settlement.price);
            for winner in settlement.winners {
                println!("{} won {} ETH", winner.user, format_eth(winner.amount));
            }
            if settlement.remainder > 0 {
                println!("{} wei stay in the pool", settlement.remainder);
            }
        }
        Commands::GetMarkets => {
            for market in client.get_markets().await? {
                println!(
                    "#{} {} [{}] fee {} ETH, pool {} ETH, {} players",
                    market.id,
                    market.price_feed,
                    market.phase,
                    format_eth(market.entry_fee),
                    format_eth(market.pool),
                    market.num_players
                );
            }
        }
        Commands::GetMarket { market } => {
            let response = client.get_market(market).await?;
            println!("{:#?}", response);
        }
        Commands::GetPredictions { market } => {
            let response = client.get_predictions(market).await?;
            println!("{:#?}", response);
        }
        Commands::GetEvents { market, since } => {
            for record in client.get_events(EventsRequest { market, since }).await? {
                println!("{} {} {}", record.seq, record.at, record.event);
            }
        }
        Commands::GetPriceFeeds => {
            let response = client.get_price_feeds().await?;
            println!("{:#?}", response);
        }
        Commands::Deposit { user, amount } => {
            let user = user_or_own(user).await?;
            let balance = client.deposit(user, eth_to_wei(amount)?).await?;
            println!("Balance of {}: {} ETH", user, format_eth(balance));
        }
        Commands::Balance { user } => {
            let user = user_or_own(user).await?;
            let balance = client.get_balance(user).await?;
            println!("Balance of {}: {} ETH", user, format_eth(balance));
        }
        Commands::Seed { count } => {
            let secret_key = read_secret().await?;
            let now = Utc::now();
            for j in 0..count {
                let request = CreateMarketRequest {
                    asset: j % ASSETS.len(),
                    entry_fee: WEI_PER_ETH / 10,
                    prediction_cutoff_time: now + Duration::hours(j as i64 + 1),
                    expiration_time: now + Duration::hours(j as i64 + 2),
                };
                let id = client.create_market(request, &secret_key).await?;
                println!("Created market {} on {}", id, ASSETS[j % ASSETS.len()]);
            }
        }
    }
    Ok(())
}
fn format_eth(wei: Wei) -> String {
    wei_to_eth(wei)
        .map(|eth| eth.to_string())
        .unwrap_or_else(|| format!("{} wei", wei))
}
async fn user_or_own(user: Option<UserPubKey>) -> Result<UserPubKey> {
    match user {
        Some(user) => Ok(user),
        None => Ok(UserPubKey::from_secret_key_global(&read_secret().await?)),
    }
}
async fn read_secret() -> Result<SecretKey> {
    let mut file = File::open("ecdsa.key").await?;
    let mut contents = vec![];
    file.read_to_end(&mut contents).await?;
    Ok(SecretKey::from_str(String::from_utf8(contents)?.trim())?)
}
