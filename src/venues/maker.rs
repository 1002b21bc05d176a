use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde::Deserialize;
use sha2::Sha256;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::types::{Bbo, OrderRequest, OrderType, PlacedOrder, Side};
use crate::venues::{
    close_slip, parse_decimal, to_wire_units, CancelOutcome, MarketMeta, VenueAdapter, VenueError,
};

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);
/// Renew the session this long before the venue would expire it.
const SESSION_RENEW_BEFORE: Duration = Duration::from_secs(60);
const SESSION_WATCHDOG_INTERVAL: Duration = Duration::from_secs(5);

/// Credential lifetime as granted by the venue. Renewed whenever the
/// remaining lifetime drops under `renew_before`, and forcibly at shutdown
/// start; shutdown may need to transact long after the last activity.
#[derive(Clone, Debug)]
pub struct SessionState {
    pub created_at: Instant,
    pub duration: Duration,
    pub renew_before: Duration,
}

impl SessionState {
    pub fn needs_renewal(&self) -> bool {
        self.created_at.elapsed() >= self.duration.saturating_sub(self.renew_before)
    }
}

struct Session {
    token: String,
    state: SessionState,
}

// ─── Wire types (never cross the adapter boundary) ───

#[derive(Deserialize)]
struct SessionResponse {
    token: String,
    expires_in_secs: u64,
}

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
    order_id: u64,
    #[serde(default)]
    filled_size: Option<String>,
}

#[derive(Deserialize)]
struct OpenOrdersResponse {
    order_ids: Vec<u64>,
}

#[derive(Deserialize)]
struct PositionResponse {
    position: String,
}

#[derive(Deserialize)]
struct BalanceResponse {
    available: String,
}

#[derive(Deserialize)]
struct ApiError {
    code: String,
    message: String,
}

/// Maker venue: pull-only JSON REST behind HMAC-signed requests and a
/// renewable session token. No push telemetry and no order-status query;
/// fills are detected by the engine through the open-orders listing.
pub struct MakerVenue {
    http: reqwest::Client,
    base_url: String,
    ticker: String,
    signing_key: Vec<u8>,
    session: Mutex<Option<Session>>,
    market: Mutex<Option<MarketMeta>>,
    last_bbo: Mutex<Option<Bbo>>,
}

impl MakerVenue {
    pub fn new(base_url: &str, private_key: &str, ticker: &str) -> Result<Self, VenueError> {
        let signing_key = hex::decode(private_key.trim_start_matches("0x"))
            .map_err(|_| VenueError::Auth("MAKER_PRIVATE_KEY is not valid hex".into()))?;
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(VenueError::from)?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            ticker: ticker.to_string(),
            signing_key,
            session: Mutex::new(None),
            market: Mutex::new(None),
            last_bbo: Mutex::new(None),
        })
    }

    pub fn session_state(&self) -> Option<SessionState> {
        self.session.lock().unwrap().as_ref().map(|s| s.state.clone())
    }

    fn session_token(&self) -> Option<String> {
        self.session.lock().unwrap().as_ref().map(|s| s.token.clone())
    }

    fn market(&self) -> Result<MarketMeta, VenueError> {
        (*self.market.lock().unwrap())
            .ok_or_else(|| VenueError::Protocol("maker venue not connected".into()))
    }

    fn sign(&self, payload: &str) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.signing_key)
            .expect("hmac accepts any key length");
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
            .header("X-Auth-Nonce", &nonce)
            .header("X-Auth-Signature", signature);
        if let Some(token) = self.session_token() {
            req = req.header("X-Session-Token", token);
        }
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
            .map_err(|e| VenueError::Protocol(format!("maker response decode: {e}")))
    }

    async fn create_session(&self) -> Result<(), VenueError> {
        let body = serde_json::json!({ "scope": "trade" });
        let text = self
            .request(reqwest::Method::POST, "/v1/sessions", Some(body))
            .await?;
        let resp: SessionResponse = self.decode(&text)?;
        let state = SessionState {
            created_at: Instant::now(),
            duration: Duration::from_secs(resp.expires_in_secs),
            renew_before: SESSION_RENEW_BEFORE,
        };
        *self.session.lock().unwrap() = Some(Session {
            token: resp.token,
            state,
        });
        info!(expires_in_secs = resp.expires_in_secs, "maker session established");
        Ok(())
    }

    /// Renew only when the current session is close to expiry. Cheap enough
    /// for the watchdog to call every few seconds.
    pub async fn ensure_session(&self) -> Result<(), VenueError> {
        let fresh = self
            .session
            .lock()
            .unwrap()
            .as_ref()
            .map(|s| !s.state.needs_renewal())
            .unwrap_or(false);
        if fresh {
            return Ok(());
        }
        self.create_session().await
    }

    async fn load_market(&self) -> Result<(), VenueError> {
        let text = self.request(reqwest::Method::GET, "/v1/markets", None).await?;
        let resp: MarketsResponse = self.decode(&text)?;
        let entry = resp
            .markets
            .into_iter()
            .find(|m| m.symbol == self.ticker || m.symbol == format!("{}-PERP", self.ticker))
            .ok_or_else(|| {
                VenueError::Protocol(format!("maker venue does not list {}", self.ticker))
            })?;
        info!(
            market_id = entry.market_id,
            price_decimals = entry.price_decimals,
            size_decimals = entry.size_decimals,
            "maker market resolved"
        );
        *self.market.lock().unwrap() = Some(MarketMeta {
            market_id: entry.market_id,
            price_decimals: entry.price_decimals,
            size_decimals: entry.size_decimals,
        });
        Ok(())
    }
}

#[async_trait]
impl VenueAdapter for MakerVenue {
    fn name(&self) -> &'static str {
        "maker"
    }

    async fn connect(&self) -> Result<(), VenueError> {
        self.create_session().await?;
        self.load_market().await?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), VenueError> {
        // Best effort; an expired token is already disconnected.
        if self.session_token().is_some() {
            if let Err(e) = self
                .request(reqwest::Method::DELETE, "/v1/sessions", None)
                .await
            {
                debug!("maker session delete failed: {e}");
            }
        }
        *self.session.lock().unwrap() = None;
        info!("maker disconnected");
        Ok(())
    }

    /// Synchronous REST fetch. On transient failure the last good snapshot
    /// is served so a single flaky poll does not blank the tick.
    async fn get_bbo(&self) -> Option<Bbo> {
        let market = match self.market() {
            Ok(m) => m,
            Err(_) => return None,
        };
        let path = format!("/v1/markets/{}/orderbook?depth=1", market.market_id);
        match self.request(reqwest::Method::GET, &path, None).await {
            Ok(text) => match self.decode::<OrderbookResponse>(&text) {
                Ok(book) => {
                    let parse_level = |level: Option<&(String, String)>| {
                        level.and_then(|(p, s)| {
                            Some((p.parse::<Decimal>().ok()?, s.parse::<Decimal>().ok()?))
                        })
                    };
                    let bid = parse_level(book.bids.first());
                    let ask = parse_level(book.asks.first());
                    let bbo = Bbo {
                        best_bid: bid.map(|(p, _)| p),
                        best_bid_size: bid.map(|(_, s)| s),
                        best_ask: ask.map(|(p, _)| p),
                        best_ask_size: ask.map(|(_, s)| s),
                        updated_at: Instant::now(),
                    };
                    *self.last_bbo.lock().unwrap() = Some(bbo);
                    Some(bbo)
                }
                Err(e) => {
                    warn!("maker orderbook decode failed: {e}");
                    *self.last_bbo.lock().unwrap()
                }
            },
            Err(e) => {
                warn!("maker orderbook fetch failed: {e}");
                *self.last_bbo.lock().unwrap()
            }
        }
    }

    fn last_update_age(&self) -> Option<Duration> {
        // Pull venue: every read is fresh by construction.
        None
    }

    async fn place_order(&self, req: &OrderRequest) -> Result<PlacedOrder, VenueError> {
        let market = self.market()?;
        let order_type = match req.order_type {
            OrderType::PostOnly => "post_only",
            OrderType::Ioc => "ioc",
            OrderType::LimitGtt => "limit",
        };
        let body = serde_json::json!({
            "market_id": market.market_id,
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
            "maker placing order"
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
            order_id: resp.order_id.to_string(),
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
            // The venue reports an already-filled order only through this
            // error code; the mapping to NotFound stays inside the adapter.
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
        Ok(resp.order_ids.into_iter().map(|id| id.to_string()).collect())
    }

    async fn get_position(&self) -> Result<Decimal, VenueError> {
        let market = self.market()?;
        let path = format!("/v1/positions?market_id={}", market.market_id);
        let text = self.request(reqwest::Method::GET, &path, None).await?;
        let resp: PositionResponse = self.decode(&text)?;
        parse_decimal(&resp.position, "position")
    }

    async fn get_balance(&self) -> Result<Decimal, VenueError> {
        let text = self.request(reqwest::Method::GET, "/v1/balance", None).await?;
        let resp: BalanceResponse = self.decode(&text)?;
        parse_decimal(&resp.available, "balance")
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
        let bbo = self
            .get_bbo()
            .await
            .ok_or_else(|| VenueError::Rejected("no maker book to price the close".into()))?;
        let (side, price) = if signed_size > Decimal::ZERO {
            let bid = bbo
                .best_bid
                .ok_or_else(|| VenueError::Rejected("no maker bid to close into".into()))?;
            (Side::Sell, bid * (Decimal::ONE - close_slip()))
        } else {
            let ask = bbo
                .best_ask
                .ok_or_else(|| VenueError::Rejected("no maker ask to close into".into()))?;
            (Side::Buy, ask * (Decimal::ONE + close_slip()))
        };
        info!(%side, size = %signed_size.abs(), %price, "maker reduce-only close");
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

    async fn force_session_renew(&self) -> Result<(), VenueError> {
        self.create_session().await
    }
}

/// Background task: renew the maker session shortly before expiry. Safe
/// against a concurrent forced renew at shutdown: `ensure_session` simply
/// sees the fresh session and does nothing.
pub async fn session_watchdog(maker: Arc<MakerVenue>) {
    let mut ticker = interval(SESSION_WATCHDOG_INTERVAL);
    loop {
        ticker.tick().await;
        if let Err(e) = maker.ensure_session().await {
            warn!("maker session renewal failed: {e}");
        }
    }
}
