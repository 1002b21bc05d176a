use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

// ─── Sides & directions ───

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// Direction of an arbitrage leg, named after the side taken on the maker
/// venue. `LongMaker` buys on M and sells on T; `ShortMaker` the reverse.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    LongMaker,
    ShortMaker,
}

impl Direction {
    pub fn maker_side(&self) -> Side {
        match self {
            Direction::LongMaker => Side::Buy,
            Direction::ShortMaker => Side::Sell,
        }
    }

    pub fn taker_side(&self) -> Side {
        self.maker_side().opposite()
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::LongMaker => write!(f, "long_maker"),
            Direction::ShortMaker => write!(f, "short_maker"),
        }
    }
}

// ─── Top of book ───

/// Best bid/offer snapshot. Either side may be absent when the venue has no
/// resting liquidity there. `updated_at` is monotonic.
#[derive(Clone, Copy, Debug)]
pub struct Bbo {
    pub best_bid: Option<Decimal>,
    pub best_bid_size: Option<Decimal>,
    pub best_ask: Option<Decimal>,
    pub best_ask_size: Option<Decimal>,
    pub updated_at: Instant,
}

impl Bbo {
    pub fn is_complete(&self) -> bool {
        self.best_bid.is_some() && self.best_ask.is_some()
    }

    pub fn age(&self) -> Duration {
        self.updated_at.elapsed()
    }
}

// ─── Orders ───

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderType {
    /// Rejected by the venue if it would cross, never converted.
    PostOnly,
    /// Immediate-or-cancel limit.
    Ioc,
    /// Good-till-time limit.
    LimitGtt,
}

#[derive(Clone, Debug)]
pub struct OrderRequest {
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
    pub order_type: OrderType,
    pub reduce_only: bool,
}

/// Acknowledgement of a placed order: the venue's opaque id plus any
/// immediately-reported fill size.
#[derive(Clone, Debug)]
pub struct PlacedOrder {
    pub order_id: String,
    pub immediate_fill: Option<Decimal>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderStatus {
    Open,
    Filled,
    Cancelled,
}

/// Locally tracked maker-side order. The maker venue has no push telemetry,
/// so this record is the only order state the engine holds. Transitions:
/// `Open → Filled` or `Open → Cancelled`, each at most once; a terminal
/// order is never resurrected.
#[derive(Clone, Debug)]
pub struct OrderRecord {
    pub order_id: String,
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub filled_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl OrderRecord {
    pub fn open(order_id: String, side: Side, price: Decimal, size: Decimal) -> Self {
        Self {
            order_id,
            side,
            price,
            size,
            status: OrderStatus::Open,
            created_at: Utc::now(),
            filled_at: None,
            cancelled_at: None,
        }
    }

    /// Returns false (and leaves the record untouched) if already terminal.
    pub fn mark_filled(&mut self) -> bool {
        if self.status != OrderStatus::Open {
            return false;
        }
        self.status = OrderStatus::Filled;
        self.filled_at = Some(Utc::now());
        true
    }

    pub fn mark_cancelled(&mut self) -> bool {
        if self.status != OrderStatus::Open {
            return false;
        }
        self.status = OrderStatus::Cancelled;
        self.cancelled_at = Some(Utc::now());
        true
    }
}

// ─── Stop reasons ───

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    Interrupt,
    Divergence,
    InsufficientFunds,
}

impl StopReason {
    /// Process exit code: 0 for a clean operator stop, 2 for risk trips.
    pub fn exit_code(&self) -> i32 {
        match self {
            StopReason::Interrupt => 0,
            StopReason::Divergence | StopReason::InsufficientFunds => 2,
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::Interrupt => write!(f, "operator interrupt"),
            StopReason::Divergence => write!(f, "position divergence"),
            StopReason::InsufficientFunds => write!(f, "insufficient funds"),
        }
    }
}

// ─── Telemetry events (produced by engine tasks, consumed by the writer) ───

pub enum TelemetryEvent {
    Sample(SampleRecord),
    Trade(TradeRecord),
    Heartbeat(HeartbeatRecord),
    Started(StartRecord),
    Stopped(StopRecord),
    Alert(String),
}

pub struct SampleRecord {
    pub ts: DateTime<Utc>,
    pub m_bid: Decimal,
    pub m_ask: Decimal,
    pub t_bid: Decimal,
    pub t_ask: Decimal,
    pub diff_long: Decimal,
    pub diff_short: Decimal,
    pub avg_long: Decimal,
    pub avg_short: Decimal,
    pub signal: Option<Direction>,
}

pub struct TradeRecord {
    pub ts: DateTime<Utc>,
    pub direction: Direction,
    pub m_side: Side,
    pub m_price: Decimal,
    pub m_size: Decimal,
    pub t_side: Side,
    pub t_price: Decimal,
    pub t_size: Decimal,
    pub spread_captured: Decimal,
    pub m_position: Decimal,
    pub t_position: Decimal,
}

pub struct HeartbeatRecord {
    pub runtime_hours: f64,
    pub total_trades: u64,
    pub diff_long: Decimal,
    pub diff_short: Decimal,
    pub avg_long: Decimal,
    pub avg_short: Decimal,
    pub m_position: Decimal,
    pub t_position: Decimal,
}

pub struct StartRecord {
    pub ticker: String,
    pub order_qty: Decimal,
    pub max_position: Decimal,
    pub long_threshold: Decimal,
    pub short_threshold: Decimal,
}

pub struct StopRecord {
    pub reason: String,
    pub runtime_hours: f64,
    pub total_trades: u64,
}
