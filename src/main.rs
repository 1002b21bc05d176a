use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use cross_arb::config::{Config, Secrets};
use cross_arb::engine::supervisor::{stop_channel, Supervisor};
use cross_arb::feeds::taker_ws::{stream_watchdog, taker_stream};
use cross_arb::telemetry::telegram::TelegramNotifier;
use cross_arb::telemetry::writer::telemetry_writer;
use cross_arb::types::StopReason;
use cross_arb::venues::maker::{session_watchdog, MakerVenue};
use cross_arb::venues::taker::TakerVenue;
use cross_arb::venues::{VenueAdapter, STALE_THRESHOLD};

/// Outer bound on the whole shutdown sequence; expiry does not roll back
/// in-flight trades; they stay on the venue for the operator.
const SHUTDOWN_BUDGET: Duration = Duration::from_secs(60);
const STREAM_READY_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() {
    let code = run().await;
    std::process::exit(code);
}

async fn run() -> i32 {
    dotenvy::dotenv().ok();
    let config = Config::parse();

    // One log file per run, timestamp-named, alongside the CSVs.
    let run_stamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    std::fs::create_dir_all("logs").ok();
    let file_appender = tracing_appender::rolling::never("logs", format!("arb_{run_stamp}.log"));
    let (file_writer, _log_guard) = tracing_appender::non_blocking(file_appender);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_filter()));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();

    let secrets = match Secrets::from_env() {
        Ok(s) => s,
        Err(e) => {
            error!("configuration error: {e}");
            return 1;
        }
    };

    info!(
        ticker = %config.ticker,
        size = %config.size,
        max_position = %config.max_position,
        long_threshold = %config.long_threshold,
        short_threshold = %config.short_threshold,
        min_spread = %config.min_spread,
        fill_timeout_s = config.fill_timeout,
        warmup_samples = config.warmup_samples,
        tick_size = %config.tick_size,
        "cross-venue arbitrage starting"
    );

    // ── Venue adapters ──
    let maker = match MakerVenue::new(&secrets.maker_api_url, &secrets.maker_private_key, &config.ticker)
    {
        Ok(v) => Arc::new(v),
        Err(e) => {
            error!("maker venue init failed: {e}");
            return 1;
        }
    };
    let taker = match TakerVenue::new(
        &secrets.taker_api_url,
        &secrets.taker_api_private_key,
        secrets.taker_account_index,
        secrets.taker_api_key_index,
        &config.ticker,
    ) {
        Ok(v) => Arc::new(v),
        Err(e) => {
            error!("taker venue init failed: {e}");
            return 1;
        }
    };

    if let Err(e) = maker.connect().await {
        error!("maker connect failed: {e}");
        return 1;
    }
    if let Err(e) = taker.connect().await {
        error!("taker connect failed: {e}");
        return 1;
    }

    // ── Background tasks: push stream, its stale watchdog, session renewal ──
    let (ws_url, market_id, account_index) = match taker.stream_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("taker stream config unavailable: {e}");
            return 1;
        }
    };
    let push = taker.push_state();
    tokio::spawn(taker_stream(push.clone(), ws_url, market_id, account_index));
    tokio::spawn(stream_watchdog(push.clone(), STALE_THRESHOLD));
    tokio::spawn(session_watchdog(maker.clone()));

    info!("waiting for the taker book stream");
    let ready = timeout(STREAM_READY_TIMEOUT, async {
        while push.book().is_none() {
            sleep(Duration::from_millis(200)).await;
        }
    })
    .await;
    if ready.is_err() {
        warn!("taker book not ready after 30s, continuing; ticks skip until data arrives");
    }

    // ── Telemetry writer ──
    let (telem_tx, telem_rx) = mpsc::channel(1024);
    let notifier = match (&secrets.tg_bot_token, &secrets.tg_chat_id) {
        (Some(token), Some(chat)) => Some(TelegramNotifier::new(token, chat)),
        _ => {
            info!("telegram not configured, notifications disabled");
            None
        }
    };
    let writer_handle = tokio::spawn(telemetry_writer(
        telem_rx,
        "logs".to_string(),
        run_stamp,
        notifier,
    ));

    // ── Stop signal: first Ctrl-C latches, later ones are ignored so the
    // reconciliation completes ──
    let (stop_handle, stop_rx) = stop_channel();
    {
        let handle = stop_handle.clone();
        tokio::spawn(async move {
            loop {
                if tokio::signal::ctrl_c().await.is_err() {
                    return;
                }
                handle.request_stop(StopReason::Interrupt);
            }
        });
    }

    // ── Run ──
    let mut supervisor = Supervisor::new(
        maker.clone(),
        taker.clone(),
        config,
        telem_tx.clone(),
        stop_rx,
    );
    let reason = supervisor.run().await;

    if timeout(SHUTDOWN_BUDGET, supervisor.shutdown(reason)).await.is_err() {
        error!("shutdown exceeded its 60s budget, check venue positions manually");
    }

    // Close the telemetry channel and let the writer flush.
    drop(supervisor);
    drop(telem_tx);
    let _ = timeout(Duration::from_secs(5), writer_handle).await;

    reason.exit_code()
}
