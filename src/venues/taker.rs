use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde::Deserialize;
use sha2::Sha256;
use tokio::sync::Notify;
use tracing::{debug, info};

use crate::types::{Bbo, OrderRequest, OrderType, PlacedOrder, Side};
use crate::venues::{
    close_slip, parse_decimal, to_wire_units, CancelOutcome, MarketMeta, VenueAdapter, VenueError,
};

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Account state mirrored from the push stream.
#[derive(Clone, Copy, Debug)]
pub struct AccountSnapshot {
    pub position: Decimal,
    pub balance: Decimal,
}

/// State shared between the stream task, the stale watchdog and the
/// adapter. Writers replace whole snapshots inside short lock sections, so
/// readers always observe a consistent BBO.
pub struct PushState {
    book: Mutex<Option<Bbo>>,
    account: Mutex<Option<AccountSnapshot>>,
    last_update: Mutex<Option<Instant>>,
    reconnect: Notify,
    shutdown: AtomicBool,
}

impl PushState {
    pub fn new() -> Self {
        Self {
            book: Mutex::new(None),
            account: Mutex::new(None),
            last_update: Mutex::new(None),
            reconnect: Notify::new(),
            shutdown: AtomicBool::new(false),
        }
    }

    pub(crate) fn set_book(&self, bbo: Bbo) {
        *self.book.lock().unwrap() = Some(bbo);
        *self.last_update.lock().unwrap() = Some(Instant::now());
    }

    pub(crate) fn set_account(&self, account: AccountSnapshot) {
        *self.account.lock().unwrap() = Some(account);
        *self.last_update.lock().unwrap() = Some(Instant::now());
    }

    pub fn book(&self) -> Option<Bbo> {
        *self.book.lock().unwrap()
    }

    pub fn account(&self) -> Option<AccountSnapshot> {
        *self.account.lock().unwrap()
    }

    pub fn last_update_age(&self) -> Option<Duration> {
        self.last_update.lock().unwrap().map(|at| at.elapsed())
    }

    /// Tear the stream connection down; the stream task reconnects with
    /// backoff. Called by the stale watchdog.
    pub fn force_reconnect(&self) {
        self.reconnect.notify_one();
    }

    pub(crate) async fn reconnect_requested(&self) {
        self.reconnect.notified().await;
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.reconnect.notify_one();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub(crate) fn set_last_update(&self, at: Instant) {
        *self.last_update.lock().unwrap() = Some(at);
    }
}

impl Default for PushState {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Wire types (never cross the adapter boundary) ───

#[derive(Deserialize)]
struct MarketsResponse {
    markets: Vec<MarketEntry>,
}

#[derive(Deserialize)]
struct MarketEntry {
    symbol: String,
    market_id: u32,
    price_decimals: u32,
    size_decimals: u32,
}

#[derive(Deserialize)]
struct OrderbookResponse {
    bids: Vec<(String, String)>,
    asks: Vec<(String, String)>,
}

#[derive(Deserialize)]
struct PlaceResponse {
    order_index: u64,
    #[serde(default)]
    filled_size: Option<String>,
}

#[derive(Deserialize)]
struct OpenOrdersResponse {
    order_indexes: Vec<u64>,
}

#[derive(Deserialize)]
struct PositionResponse {
    position: String,
}

#[derive(Deserialize)]
struct AccountResponse {
    collateral: String,
}

#[derive(Deserialize)]
struct ApiError {
    code: String,
    message: String,
}

/// Taker venue: push-fed book and account caches over WebSocket, REST for
/// transactions and for the authoritative reads the freshness contract
/// requires once the stream goes quiet.
pub struct TakerVenue {
    http: reqwest::Client,
    base_url: String,
    ws_url: String,
    api_key: Vec<u8>,
    account_index: u32,
    api_key_index: u32,
    ticker: String,
    market: Mutex<Option<MarketMeta>>,
    push: Arc<PushState>,
    order_counter: AtomicU64,
}

impl TakerVenue {
    pub fn new(
        base_url: &str,
        api_private_key: &str,
        account_index: u32,
        api_key_index: u32,
        ticker: &str,
    ) -> Result<Self, VenueError> {
        let api_key = hex::decode(api_private_key.trim_start_matches("0x"))
            .map_err(|_| VenueError::Auth("TAKER_API_PRIVATE_KEY is not valid hex".into()))?;
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(VenueError::from)?;
        let base_url = base_url.trim_end_matches('/').to_string();
        let ws_url = format!(
            "{}/v1/stream",
            base_url
                .replacen("https://", "wss://", 1)
                .replacen("http://", "ws://", 1)
        );
        // Client order indexes must be unique across restarts.
        let seed = chrono::Utc::now().timestamp_millis() as u64 % 1_000_000;
        Ok(Self {
            http,
            base_url,
            ws_url,
            api_key,
            account_index,
            api_key_index,
            ticker: ticker.to_string(),
            market: Mutex::new(None),
            push: Arc::new(PushState::new()),
            order_counter: AtomicU64::new(seed),
        })
    }

    pub fn push_state(&self) -> Arc<PushState> {
        self.push.clone()
    }

    /// Everything the stream task needs; available after `connect`.
    pub fn stream_config(&self) -> Result<(String, u32, u32), VenueError> {
        let market = self.market()?;
        Ok((self.ws_url.clone(), market.market_id, self.account_index))
    }

    fn market(&self) -> Result<MarketMeta, VenueError> {
        (*self.market.lock().unwrap())
            .ok_or_else(|| VenueError::Protocol("taker venue not connected".into()))
    }

    fn next_client_order_index(&self) -> u64 {
        self.order_counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn sign(&self, payload: &str) -> String {
        let mut mac =
            Hmac::<Sha256>::new_from_slice(&self.api_key).expect("hmac accepts any key length");
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    async fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<String, VenueError> {
        let nonce = chrono::Utc::now().timestamp_millis().to_string();
        let body_str = body.map(|b| b.to_string()).unwrap_or_default();
        let signature = self.sign(&format!("{}{}{}", nonce, path, body_str));

        let mut req = self
            .http
            .request(method, format!("{}{}", self.base_url, path))
            .header("X-Account-Index", self.account_index)
            .header("X-Api-Key-Index", self.api_key_index)
            .header("X-Auth-Nonce", &nonce)
            .header("X-Auth-Signature", signature);
        if !body_str.is_empty() {
            req = req
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body_str);
        }

        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            let err: ApiError = serde_json::from_str(&text).unwrap_or(ApiError {
                code: status.as_u16().to_string(),
                message: text,
            });
            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Err(VenueError::Auth(format!("{}: {}", err.code, err.message)));
            }
            return Err(VenueError::Rejected(format!("{}: {}", err.code, err.message)));
        }
        Ok(text)
    }

    fn decode<T: for<'de> Deserialize<'de>>(&self, text: &str) -> Result<T, VenueError> {
        serde_json::from_str(text)
            .map_err(|e| VenueError::Protocol(format!("taker response decode: {e}")))
    }

    async fn load_market(&self) -> Result<(), VenueError> {
        let text = self.request(reqwest::Method::GET, "/v1/markets", None).await?;
        let resp: MarketsResponse = self.decode(&text)?;
        let entry = resp
            .markets
            .into_iter()
            .find(|m| m.symbol == self.ticker || m.symbol == format!("{}-PERP", self.ticker))
            .ok_or_else(|| {
                VenueError::Protocol(format!("taker venue does not list {}", self.ticker))
            })?;
        info!(
            market_id = entry.market_id,
            price_decimals = entry.price_decimals,
            size_decimals = entry.size_decimals,
            "taker market resolved"
        );
        *self.market.lock().unwrap() = Some(MarketMeta {
            market_id: entry.market_id,
            price_decimals: entry.price_decimals,
            size_decimals: entry.size_decimals,
        });
        Ok(())
    }

    async fn fetch_position(&self) -> Result<Decimal, VenueError> {
        let market = self.market()?;
        let path = format!("/v1/account/positions?market_id={}", market.market_id);
        let text = self.request(reqwest::Method::GET, &path, None).await?;
        let resp: PositionResponse = self.decode(&text)?;
        parse_decimal(&resp.position, "position")
    }

    async fn fetch_balance(&self) -> Result<Decimal, VenueError> {
        let text = self.request(reqwest::Method::GET, "/v1/account", None).await?;
        let resp: AccountResponse = self.decode(&text)?;
        parse_decimal(&resp.collateral, "balance")
    }

    async fn fetch_bbo(&self) -> Result<Bbo, VenueError> {
        let market = self.market()?;
        let path = format!("/v1/markets/{}/orderbook?depth=1", market.market_id);
        let text = self.request(reqwest::Method::GET, &path, None).await?;
        let book: OrderbookResponse = self.decode(&text)?;
        let parse_level = |level: Option<&(String, String)>| {
            level.and_then(|(p, s)| Some((p.parse::<Decimal>().ok()?, s.parse::<Decimal>().ok()?)))
        };
        let bid = parse_level(book.bids.first());
        let ask = parse_level(book.asks.first());
        Ok(Bbo {
            best_bid: bid.map(|(p, _)| p),
            best_bid_size: bid.map(|(_, s)| s),
            best_ask: ask.map(|(p, _)| p),
            best_ask_size: ask.map(|(_, s)| s),
            updated_at: Instant::now(),
        })
    }
}

#[async_trait]
impl VenueAdapter for TakerVenue {
    fn name(&self) -> &'static str {
        "taker"
    }

    async fn connect(&self) -> Result<(), VenueError> {
        self.load_market().await?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), VenueError> {
        self.push.request_shutdown();
        info!("taker disconnected");
        Ok(())
    }

    /// Cache read, served even when stale: a last-known book is
    /// still the best available price context (trading decisions gate on
    /// freshness elsewhere).
    async fn get_bbo(&self) -> Option<Bbo> {
        self.push.book()
    }

    fn last_update_age(&self) -> Option<Duration> {
        self.push.last_update_age()
    }

    async fn place_order(&self, req: &OrderRequest) -> Result<PlacedOrder, VenueError> {
        let market = self.market()?;
        let order_type = match req.order_type {
            OrderType::PostOnly => "post_only",
            OrderType::Ioc => "ioc",
            OrderType::LimitGtt => "limit",
        };
        let client_order_index = self.next_client_order_index();
        let body = serde_json::json!({
            "market_id": market.market_id,
            "client_order_index": client_order_index,
            "side": req.side.to_string(),
            "price": to_wire_units(req.price, market.price_decimals)?,
            "size": to_wire_units(req.size, market.size_decimals)?,
            "type": order_type,
            "reduce_only": req.reduce_only,
        });
        debug!(
            side = %req.side,
            price = %req.price,
            size = %req.size,
            order_type,
            client_order_index,
            "taker placing order"
        );
        let text = self
            .request(reqwest::Method::POST, "/v1/orders", Some(body))
            .await?;
        let resp: PlaceResponse = self.decode(&text)?;
        let immediate_fill = match resp.filled_size {
            Some(raw) => Some(parse_decimal(&raw, "filled size")?),
            None => None,
        };
        Ok(PlacedOrder {
            order_id: resp.order_index.to_string(),
            immediate_fill,
        })
    }

    async fn cancel_order(&self, order_id: &str) -> CancelOutcome {
        let market = match self.market() {
            Ok(m) => m,
            Err(e) => return CancelOutcome::Error(e.to_string()),
        };
        let body = serde_json::json!({ "market_id": market.market_id });
        let path = format!("/v1/orders/{}/cancel", order_id);
        match self.request(reqwest::Method::POST, &path, Some(body)).await {
            Ok(_) => CancelOutcome::Cancelled,
            Err(VenueError::Rejected(msg))
                if msg.contains("ORDER_NOT_FOUND") || msg.to_lowercase().contains("not found") =>
            {
                CancelOutcome::NotFound
            }
            Err(e) => CancelOutcome::Error(e.to_string()),
        }
    }

    async fn list_open_orders(&self) -> Result<HashSet<String>, VenueError> {
        let market = self.market()?;
        let path = format!("/v1/orders/open?market_id={}", market.market_id);
        let text = self.request(reqwest::Method::GET, &path, None).await?;
        let resp: OpenOrdersResponse = self.decode(&text)?;
        Ok(resp
            .order_indexes
            .into_iter()
            .map(|id| id.to_string())
            .collect())
    }

    /// Freshness contract: a fresh push cache may answer; a stale one must
    /// not. When the cache is stale AND the authoritative read fails, the
    /// error propagates; inferring zero inventory from a failure is
    /// forbidden.
    async fn get_position(&self) -> Result<Decimal, VenueError> {
        if !self.is_stale() {
            if let Some(account) = self.push.account() {
                return Ok(account.position);
            }
        }
        self.fetch_position().await.map_err(|e| {
            if self.is_stale() {
                VenueError::Stale(format!(
                    "taker position unknown: cache stale and authoritative read failed ({e})"
                ))
            } else {
                e
            }
        })
    }

    async fn get_balance(&self) -> Result<Decimal, VenueError> {
        if !self.is_stale() {
            if let Some(account) = self.push.account() {
                return Ok(account.balance);
            }
        }
        self.fetch_balance().await.map_err(|e| {
            if self.is_stale() {
                VenueError::Stale(format!(
                    "taker balance unknown: cache stale and authoritative read failed ({e})"
                ))
            } else {
                e
            }
        })
    }

    async fn cancel_all(&self) -> Result<(), VenueError> {
        let market = self.market()?;
        let body = serde_json::json!({ "market_id": market.market_id });
        self.request(reqwest::Method::POST, "/v1/orders/cancel-all", Some(body))
            .await?;
        Ok(())
    }

    async fn close_position(&self, signed_size: Decimal) -> Result<(), VenueError> {
        if signed_size.is_zero() {
            return Ok(());
        }
        let bbo = match self.push.book() {
            Some(bbo) => bbo,
            None => self.fetch_bbo().await?,
        };
        let (side, price) = if signed_size > Decimal::ZERO {
            let bid = bbo
                .best_bid
                .ok_or_else(|| VenueError::Rejected("no taker bid to close into".into()))?;
            (Side::Sell, bid * (Decimal::ONE - close_slip()))
        } else {
            let ask = bbo
                .best_ask
                .ok_or_else(|| VenueError::Rejected("no taker ask to close into".into()))?;
            (Side::Buy, ask * (Decimal::ONE + close_slip()))
        };
        info!(%side, size = %signed_size.abs(), %price, "taker reduce-only close");
        self.place_order(&OrderRequest {
            side,
            price,
            size: signed_size.abs(),
            order_type: OrderType::Ioc,
            reduce_only: true,
        })
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn venue() -> TakerVenue {
        // Closed port: authoritative reads fail fast with a connection error.
        let v = TakerVenue::new("http://127.0.0.1:1", "deadbeef", 7, 3, "BTC").unwrap();
        *v.market.lock().unwrap() = Some(MarketMeta {
            market_id: 12,
            price_decimals: 2,
            size_decimals: 6,
        });
        v
    }

    fn seeded_bbo() -> Bbo {
        Bbo {
            best_bid: Some(Decimal::from(30030)),
            best_bid_size: Some(Decimal::ONE),
            best_ask: Some(Decimal::from(30035)),
            best_ask_size: Some(Decimal::ONE),
            updated_at: Instant::now(),
        }
    }

    /// Scenario: Fresh push cache holding position -0.002 and balance 500.
    /// Expected: Reads are served from the cache with no network round-trip
    /// (the REST endpoint here is unreachable, so success proves cache use).
    #[tokio::test]
    async fn test_fresh_cache_serves_reads() {
        let v = venue();
        v.push.set_book(seeded_bbo());
        v.push.set_account(AccountSnapshot {
            position: Decimal::new(-2, 3),
            balance: Decimal::from(500),
        });
        assert_eq!(v.get_position().await.unwrap(), Decimal::new(-2, 3));
        assert_eq!(v.get_balance().await.unwrap(), Decimal::from(500));
    }

    /// Scenario: No stream updates for 35 s; the authoritative REST read
    /// also fails (endpoint unreachable).
    /// Expected: is_stale is true, get_bbo still serves the last snapshot, and
    /// position/balance reads fail loudly; they MUST NOT return zero.
    #[tokio::test]
    async fn test_stale_cache_fails_loudly() {
        let v = venue();
        v.push.set_book(seeded_bbo());
        v.push.set_account(AccountSnapshot {
            position: Decimal::new(-2, 3),
            balance: Decimal::from(500),
        });
        let Some(past) = Instant::now().checked_sub(Duration::from_secs(35)) else {
            return;
        };
        v.push.set_last_update(past);

        assert!(v.is_stale());
        assert!(v.get_bbo().await.is_some());
        assert!(matches!(v.get_position().await, Err(VenueError::Stale(_))));
        assert!(matches!(v.get_balance().await, Err(VenueError::Stale(_))));
    }

    /// Scenario: Connected venue with no account snapshot yet and an
    /// unreachable REST endpoint.
    /// Expected: The read falls through to the authoritative path and errors;
    /// an empty cache is not zero inventory.
    #[tokio::test]
    async fn test_empty_cache_is_not_zero() {
        let v = venue();
        v.push.set_book(seeded_bbo()); // fresh stream, but no account data yet
        assert!(v.get_position().await.is_err());
        assert!(v.get_balance().await.is_err());
    }

    /// Scenario: WS URL derivation from an https base.
    /// Expected: wss scheme with the stream path appended.
    #[test]
    fn test_ws_url_derivation() {
        let v = TakerVenue::new("https://mainnet.taker.exchange", "deadbeef", 7, 3, "BTC").unwrap();
        assert_eq!(v.ws_url, "wss://mainnet.taker.exchange/v1/stream");
    }
}
