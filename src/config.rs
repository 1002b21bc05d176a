use clap::{Parser, ValueEnum};
use rust_decimal::Decimal;

/// Cross-venue perpetual-futures arbitrage: post passive on the maker venue,
/// hedge aggressively on the taker venue when the spread differential exceeds
/// its rolling baseline.
#[derive(Parser, Clone, Debug)]
#[command(name = "arb", version)]
pub struct Config {
    /// Trading symbol.
    #[arg(long, default_value = "BTC")]
    pub ticker: String,

    /// Quantity per arbitrage leg.
    #[arg(long)]
    pub size: Decimal,

    /// Maximum absolute position on the maker venue.
    #[arg(long)]
    pub max_position: Decimal,

    /// Absolute spread floor; below it no signal fires even when the
    /// rolling baseline collapses.
    #[arg(long, default_value = "0")]
    pub min_spread: Decimal,

    /// Long trigger offset over the rolling mean of T.bid - M.ask.
    #[arg(long, default_value = "10")]
    pub long_threshold: Decimal,

    /// Short trigger offset over the rolling mean of M.bid - T.ask.
    #[arg(long, default_value = "10")]
    pub short_threshold: Decimal,

    /// Seconds to wait for the resting maker order before cancelling.
    #[arg(long, default_value_t = 5)]
    pub fill_timeout: u64,

    /// Spread samples to collect before signals may fire.
    #[arg(long, default_value_t = 100)]
    pub warmup_samples: u64,

    /// Maker-venue price tick; the passive order rests one tick inside
    /// the touch.
    #[arg(long, default_value = "10")]
    pub tick_size: Decimal,

    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }
}

/// Credentials and endpoint overrides, env-sourced so they never appear on a
/// command line. Loaded after `dotenvy::dotenv()`.
#[derive(Clone)]
pub struct Secrets {
    pub maker_private_key: String,
    pub maker_api_url: String,
    pub taker_api_private_key: String,
    pub taker_account_index: u32,
    pub taker_api_key_index: u32,
    pub taker_api_url: String,
    pub tg_bot_token: Option<String>,
    pub tg_chat_id: Option<String>,
}

impl Secrets {
    /// Fails with the missing variable's name; the caller exits with the
    /// configuration error code.
    pub fn from_env() -> Result<Self, String> {
        let required = |key: &str| -> Result<String, String> {
            std::env::var(key).map_err(|_| format!("missing environment variable: {}", key))
        };

        let taker_account_index = required("TAKER_ACCOUNT_INDEX")?
            .parse::<u32>()
            .map_err(|_| "TAKER_ACCOUNT_INDEX must be an integer".to_string())?;
        let taker_api_key_index = std::env::var("TAKER_API_KEY_INDEX")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3);

        Ok(Self {
            maker_private_key: required("MAKER_PRIVATE_KEY")?,
            maker_api_url: std::env::var("MAKER_API_URL")
                .unwrap_or_else(|_| "https://api.maker.exchange".into()),
            taker_api_private_key: required("TAKER_API_PRIVATE_KEY")?,
            taker_account_index,
            taker_api_key_index,
            taker_api_url: std::env::var("TAKER_API_URL")
                .unwrap_or_else(|_| "https://mainnet.taker.exchange".into()),
            tg_bot_token: std::env::var("TG_BOT_TOKEN").ok().filter(|s| !s.is_empty()),
            tg_chat_id: std::env::var("TG_CHAT_ID").ok().filter(|s| !s.is_empty()),
        })
    }
}
