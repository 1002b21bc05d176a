pub mod maker;
pub mod taker;

#[cfg(test)]
pub mod stub;

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::types::{Bbo, OrderRequest, PlacedOrder};

/// Push-fed caches older than this are treated as stale: reads that feed
/// trading decisions must bypass them (see `VenueAdapter::is_stale`).
pub const STALE_THRESHOLD: Duration = Duration::from_secs(30);

/// Slippage cap on shutdown closes: wider than the hedge cap because a close
/// must go through.
pub(crate) fn close_slip() -> Decimal {
    Decimal::new(5, 3)
}

/// Per-market scaling resolved from venue metadata at connect time. Both
/// venues quote integer wire units; humans and the engine see decimals.
#[derive(Clone, Copy, Debug)]
pub(crate) struct MarketMeta {
    pub market_id: u32,
    pub price_decimals: u32,
    pub size_decimals: u32,
}

pub(crate) fn to_wire_units(value: Decimal, decimals: u32) -> Result<i64, VenueError> {
    (value * Decimal::from(10u64.pow(decimals)))
        .round()
        .to_i64()
        .ok_or_else(|| VenueError::Protocol(format!("value out of wire range: {value}")))
}

pub(crate) fn parse_decimal(raw: &str, what: &str) -> Result<Decimal, VenueError> {
    raw.parse::<Decimal>()
        .map_err(|_| VenueError::Protocol(format!("unparseable {what}: {raw}")))
}

#[derive(Debug, Error)]
pub enum VenueError {
    #[error("network: {0}")]
    Network(String),
    #[error("rejected: {0}")]
    Rejected(String),
    #[error("auth: {0}")]
    Auth(String),
    #[error("protocol: {0}")]
    Protocol(String),
    /// Cache stale AND the authoritative read failed. A query error is
    /// information-absence, not a measurement of zero.
    #[error("stale data: {0}")]
    Stale(String),
}

impl From<reqwest::Error> for VenueError {
    fn from(e: reqwest::Error) -> Self {
        VenueError::Network(e.to_string())
    }
}

/// Outcome of a cancel attempt. `NotFound` is the positive signal that the
/// order was already taken (or never accepted) and must stay distinguishable
/// from `Error`. Venues that only report not-found through an error message
/// map that message to `NotFound` here, inside the adapter; the string
/// matching never crosses this boundary.
#[derive(Debug)]
pub enum CancelOutcome {
    Cancelled,
    NotFound,
    Error(String),
}

/// Thin abstraction over one exchange, bound to one market. The symbol →
/// venue market mapping and the price/size tick scales are resolved in
/// `connect()`.
#[async_trait]
pub trait VenueAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Login / session setup plus market-metadata load. Idempotent on
    /// repeated calls only after a matching `disconnect`.
    async fn connect(&self) -> Result<(), VenueError>;

    async fn disconnect(&self) -> Result<(), VenueError>;

    /// Non-blocking snapshot read. Pull-only venues fetch synchronously and
    /// fall back to the last good snapshot on transient error; push-fed
    /// venues read their stream cache (even when stale).
    async fn get_bbo(&self) -> Option<Bbo>;

    /// Age of the push cache. `None` for pull venues, whose reads are fresh
    /// by construction.
    fn last_update_age(&self) -> Option<Duration>;

    fn is_stale(&self) -> bool {
        self.last_update_age()
            .map(|age| age > STALE_THRESHOLD)
            .unwrap_or(false)
    }

    async fn place_order(&self, req: &OrderRequest) -> Result<PlacedOrder, VenueError>;

    async fn cancel_order(&self, order_id: &str) -> CancelOutcome;

    /// Non-destructive listing of resting order ids. This is what the fill
    /// poll uses; it must not disturb the book.
    async fn list_open_orders(&self) -> Result<HashSet<String>, VenueError>;

    /// Exchange-reported signed position. When the push cache is stale this
    /// MUST be an authoritative read; on failure it MUST return an error,
    /// never zero.
    async fn get_position(&self) -> Result<Decimal, VenueError>;

    /// Quote-asset free balance, under the same staleness contract as
    /// `get_position`.
    async fn get_balance(&self) -> Result<Decimal, VenueError>;

    /// Best-effort cancel sweep for this market. Shutdown only.
    async fn cancel_all(&self) -> Result<(), VenueError>;

    /// Reduce-only IOC of magnitude |signed_size| in the sign-closing
    /// direction. Shutdown only.
    async fn close_position(&self, signed_size: Decimal) -> Result<(), VenueError>;

    /// Re-establish credentials immediately. No-op on venues without
    /// sessions; the maker venue renews before shutdown trades so they do
    /// not fail on expired credentials.
    async fn force_session_renew(&self) -> Result<(), VenueError> {
        Ok(())
    }
}
