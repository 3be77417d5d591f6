use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct FeedSettings {
    pub description: String,
    pub decimals: u32,
    pub answer: i64,
}
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub port: u16,
    pub db: Option<String>,
    pub test: bool,
    /// Hex encoded public key of the factory owner, generated when missing.
    pub owner: Option<String>,
    pub max_price_age_secs: i64,
    pub log_level: String,
    pub feeds: Vec<FeedSettings>,
}
impl Default for Settings {
    fn default() -> Self {
        Self {
            port: 8081,
            db: None,
            test: false,
            owner: None,
            max_price_age_secs: 3600,
            log_level: "debug".to_string(),
            feeds: vec![
                FeedSettings {
                    description: "ETH / USD".to_string(),
                    decimals: 8,
                    answer: 200000000000,
                },
                FeedSettings {
                    description: "BTC / USD".to_string(),
                    decimals: 8,
                    answer: 2000000000000,
                },
                FeedSettings {
                    description: "DOGE / USD".to_string(),
                    decimals: 8,
                    answer: 10000000,
                },
            ],
        }
    }
}
impl Settings {
    /// Defaults, then the optional settings file, then `PRONOSTICO_*` variables.
    pub fn load(file: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(file) = file {
            builder = builder.add_source(File::with_name(file).required(false));
        }
        builder
            .add_source(Environment::with_prefix("PRONOSTICO"))
            .build()
            .context("couldn't read settings")?
            .try_deserialize()
            .context("invalid settings")
    }
}
