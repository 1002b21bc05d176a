use rust_decimal::Decimal;
use tracing::{error, info};

use crate::types::{Direction, Side};

/// Local mirror of inventory on both venues. Positive = long, negative =
/// short. A completed arbitrage moves the two sides by equal and opposite
/// amounts, so under nominal operation the sum stays at zero; a one- or
/// two-multiple excursion is the natural transient between the legs of a
/// single arbitrage, three multiples means an un-hedged leg or a ledger
/// desync.
pub struct PositionLedger {
    pub m_position: Decimal,
    pub t_position: Decimal,
    pub long_trades: u64,
    pub short_trades: u64,

    max_position: Decimal,
    order_qty: Decimal,
}

impl PositionLedger {
    pub fn new(max_position: Decimal, order_qty: Decimal) -> Self {
        Self {
            m_position: Decimal::ZERO,
            t_position: Decimal::ZERO,
            long_trades: 0,
            short_trades: 0,
            max_position,
            order_qty,
        }
    }

    pub fn net_position(&self) -> Decimal {
        self.m_position + self.t_position
    }

    pub fn net_exposure(&self) -> Decimal {
        self.net_position().abs()
    }

    pub fn total_trades(&self) -> u64 {
        self.long_trades + self.short_trades
    }

    /// Admission gates: the maker position must stay within ±max_position.
    pub fn can_long_m(&self) -> bool {
        self.m_position < self.max_position
    }

    pub fn can_short_m(&self) -> bool {
        self.m_position > -self.max_position
    }

    pub fn admits(&self, direction: Direction) -> bool {
        match direction {
            Direction::LongMaker => self.can_long_m(),
            Direction::ShortMaker => self.can_short_m(),
        }
    }

    /// One-sided maker update, used when the hedge leg failed and only M
    /// actually traded.
    pub fn update_m(&mut self, side: Side, qty: Decimal) {
        match side {
            Side::Buy => self.m_position += qty,
            Side::Sell => self.m_position -= qty,
        }
        info!(side = %side, %qty, position = %self.m_position, "maker position updated");
    }

    pub fn update_t(&mut self, side: Side, qty: Decimal) {
        match side {
            Side::Buy => self.t_position += qty,
            Side::Sell => self.t_position -= qty,
        }
        info!(side = %side, %qty, position = %self.t_position, "taker position updated");
    }

    /// Commit a completed arbitrage: both sides move at once, by opposite
    /// signs, so the net stays where it was.
    pub fn record_arb_trade(&mut self, direction: Direction, qty: Decimal) {
        match direction {
            Direction::LongMaker => {
                self.m_position += qty;
                self.t_position -= qty;
                self.long_trades += 1;
            }
            Direction::ShortMaker => {
                self.m_position -= qty;
                self.t_position += qty;
                self.short_trades += 1;
            }
        }
        info!(
            direction = %direction,
            %qty,
            m = %self.m_position,
            t = %self.t_position,
            net = %self.net_position(),
            "arb trade recorded"
        );
    }

    /// Trading gate, checked every tick. A net excursion beyond twice the
    /// order size pauses trading; it resolves on its own if the excursion was
    /// a transient, and escalates to the divergence tripwire otherwise.
    pub fn check_risk(&self) -> bool {
        let limit = self.order_qty * Decimal::from(2);
        if self.net_exposure() > limit {
            error!(
                net = %self.net_position(),
                %limit,
                "net position exceeds pause threshold, trading paused"
            );
            return false;
        }
        true
    }

    /// Divergence tripwire: beyond three multiples the ledger no longer
    /// describes a transient and the supervisor must shut down.
    pub fn is_diverged(&self) -> bool {
        self.net_exposure() > self.order_qty * Decimal::from(3)
    }

    /// Shutdown-only reconciliation setters: overwrite the mirror with what
    /// the close loop actually achieved.
    pub fn set_m(&mut self, position: Decimal) {
        self.m_position = position;
    }

    pub fn set_t(&mut self, position: Decimal) {
        self.t_position = position;
    }
}
