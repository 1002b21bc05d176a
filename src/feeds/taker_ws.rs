use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::time::{interval, sleep};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::types::Bbo;
use crate::venues::taker::{AccountSnapshot, PushState};

const RECONNECT_BACKOFF: Duration = Duration::from_secs(3);
const WATCHDOG_POLL: Duration = Duration::from_secs(5);

// ─── Stream wire types ───

#[derive(Deserialize)]
struct Envelope {
    channel: String,
}

#[derive(Deserialize)]
struct BookMsg {
    bids: Vec<(String, String)>,
    asks: Vec<(String, String)>,
}

#[derive(Deserialize)]
struct AccountMsg {
    collateral: String,
    #[serde(default)]
    positions: Vec<PositionMsg>,
}

#[derive(Deserialize)]
struct PositionMsg {
    market_id: u32,
    size: String,
}

/// Pure producer: subscribes to the taker venue's book and account channels
/// and writes snapshots into the shared push cache. Owns no other state.
/// Reconnects forever (fixed backoff) until shutdown; the stale watchdog can
/// force a teardown mid-connection.
pub async fn taker_stream(
    push: Arc<PushState>,
    ws_url: String,
    market_id: u32,
    account_index: u32,
) {
    loop {
        if push.is_shutdown() {
            info!("taker stream shut down");
            return;
        }

        info!(url = %ws_url, "taker stream connecting");
        match connect_async(&ws_url).await {
            Ok((ws, _)) => {
                info!("taker stream connected");
                let (mut write, mut read) = ws.split();

                let sub = serde_json::json!({
                    "op": "subscribe",
                    "channels": [
                        format!("orderbook.{market_id}"),
                        format!("account.{account_index}"),
                    ],
                });
                if let Err(e) = write.send(Message::Text(sub.to_string())).await {
                    warn!("taker subscribe failed: {e}");
                } else {
                    loop {
                        tokio::select! {
                            msg = read.next() => match msg {
                                Some(Ok(Message::Text(text))) => {
                                    handle_message(&push, market_id, &text);
                                }
                                Some(Ok(_)) => {}
                                Some(Err(e)) => {
                                    warn!("taker stream error: {e}, reconnecting");
                                    break;
                                }
                                None => {
                                    warn!("taker stream closed, reconnecting");
                                    break;
                                }
                            },
                            _ = push.reconnect_requested() => {
                                warn!("taker stream teardown forced");
                                break;
                            }
                        }
                    }
                }
            }
            Err(e) => warn!("taker stream connect failed: {e}"),
        }

        if push.is_shutdown() {
            info!("taker stream shut down");
            return;
        }
        sleep(RECONNECT_BACKOFF).await;
    }
}

fn handle_message(push: &PushState, market_id: u32, text: &str) {
    let envelope: Envelope = match serde_json::from_str(text) {
        Ok(env) => env,
        Err(_) => return,
    };

    if envelope.channel.starts_with("orderbook") {
        match serde_json::from_str::<BookMsg>(text) {
            Ok(book) => {
                let parse_level = |level: Option<&(String, String)>| {
                    level.and_then(|(p, s)| {
                        Some((p.parse::<Decimal>().ok()?, s.parse::<Decimal>().ok()?))
                    })
                };
                let bid = parse_level(book.bids.first());
                let ask = parse_level(book.asks.first());
                push.set_book(Bbo {
                    best_bid: bid.map(|(p, _)| p),
                    best_bid_size: bid.map(|(_, s)| s),
                    best_ask: ask.map(|(p, _)| p),
                    best_ask_size: ask.map(|(_, s)| s),
                    updated_at: Instant::now(),
                });
            }
            Err(e) => debug!("orderbook message decode failed: {e}"),
        }
    } else if envelope.channel.starts_with("account") {
        match serde_json::from_str::<AccountMsg>(text) {
            Ok(account) => {
                let balance = match account.collateral.parse::<Decimal>() {
                    Ok(b) => b,
                    Err(_) => return,
                };
                // A successful account snapshot with no entry for our market
                // is a real measurement of flat, unlike a failed read.
                let position = account
                    .positions
                    .iter()
                    .find(|p| p.market_id == market_id)
                    .and_then(|p| p.size.parse::<Decimal>().ok())
                    .unwrap_or(Decimal::ZERO);
                push.set_account(AccountSnapshot { position, balance });
            }
            Err(e) => debug!("account message decode failed: {e}"),
        }
    }
}

/// Stale-stream watchdog: sleeps through the first staleness window, then
/// polls every few seconds and forces a stream teardown whenever the cache
/// age exceeds the threshold. The stream task's reconnect loop does the
/// rest.
pub async fn stream_watchdog(push: Arc<PushState>, stale_threshold: Duration) {
    sleep(stale_threshold).await;
    let mut ticker = interval(WATCHDOG_POLL);
    loop {
        ticker.tick().await;
        if push.is_shutdown() {
            return;
        }
        let stale = push
            .last_update_age()
            .map(|age| age > stale_threshold)
            .unwrap_or(true);
        if stale {
            warn!("taker stream stale, forcing reconnect");
            push.force_reconnect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    /// Scenario: An orderbook frame with two levels per side arrives.
    /// Expected: The cache holds the top level of each side with sizes, and
    /// the freshness timestamp is set.
    #[test]
    fn test_book_message_updates_cache() {
        let push = PushState::new();
        handle_message(
            &push,
            12,
            r#"{"channel":"orderbook.12","bids":[["30030.5","1.2"],["30030.0","4"]],"asks":[["30035.0","0.8"],["30036.5","2"]]}"#,
        );
        let bbo = push.book().unwrap();
        assert_eq!(bbo.best_bid, Some(dec!(30030.5)));
        assert_eq!(bbo.best_bid_size, Some(dec!(1.2)));
        assert_eq!(bbo.best_ask, Some(dec!(30035.0)));
        assert!(push.last_update_age().is_some());
    }

    /// Scenario: An account frame carrying our market's position plus an
    /// unrelated market.
    /// Expected: Position and collateral for our market land in the cache.
    #[test]
    fn test_account_message_updates_cache() {
        let push = PushState::new();
        handle_message(
            &push,
            12,
            r#"{"channel":"account.7","collateral":"512.75","positions":[{"market_id":3,"size":"9"},{"market_id":12,"size":"-0.002"}]}"#,
        );
        let account = push.account().unwrap();
        assert_eq!(account.position, dec!(-0.002));
        assert_eq!(account.balance, dec!(512.75));
    }

    /// Scenario: An account frame listing no position for our market.
    /// Expected: Flat (zero): a successful snapshot saying nothing about the
    /// market means no inventory there.
    #[test]
    fn test_account_message_without_our_market() {
        let push = PushState::new();
        handle_message(
            &push,
            12,
            r#"{"channel":"account.7","collateral":"512.75","positions":[]}"#,
        );
        assert_eq!(push.account().unwrap().position, Decimal::ZERO);
    }

    /// Scenario: Unknown channels and malformed JSON.
    /// Expected: Ignored without touching the cache.
    #[test]
    fn test_garbage_frames_ignored() {
        let push = PushState::new();
        handle_message(&push, 12, r#"{"channel":"trades.12","px":"1"}"#);
        handle_message(&push, 12, "not json at all");
        assert!(push.book().is_none());
        assert!(push.account().is_none());
        assert!(push.last_update_age().is_none());
    }

    /// Scenario: A one-sided book frame (asks only).
    /// Expected: The snapshot records the missing bid as absent, not zero.
    #[test]
    fn test_one_sided_book() {
        let push = PushState::new();
        handle_message(
            &push,
            12,
            r#"{"channel":"orderbook.12","bids":[],"asks":[["30035.0","0.8"]]}"#,
        );
        let bbo = push.book().unwrap();
        assert!(bbo.best_bid.is_none());
        assert!(!bbo.is_complete());
        assert_eq!(bbo.best_ask, Some(dec!(30035.0)));
    }
}
