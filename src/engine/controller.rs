use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};
use tracing::{error, info, warn};

use crate::engine::ledger::PositionLedger;
use crate::types::{
    Bbo, Direction, OrderRecord, OrderRequest, OrderType, Side, TelemetryEvent, TradeRecord,
};
use crate::venues::{CancelOutcome, VenueAdapter};

/// Initial wait before the first open-orders poll, giving the post a chance
/// to be taken without hammering the venue.
const FILL_GRACE: Duration = Duration::from_secs(1);
const FILL_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Slippage cap on the hedge IOC: 0.2%. The IOC limit bounds the fill price,
/// it does not predict it.
fn hedge_slip() -> Decimal {
    Decimal::new(2, 3)
}

/// Executes one arbitrage leg at a time: post-only on the maker venue, a
/// non-destructive fill poll, then an aggressive IOC hedge on the taker
/// venue. The `executing` flag is a local interlock: `try_execute` is a
/// no-op while a leg is in flight, and the supervisor never issues
/// overlapping signals.
pub struct OrderController<M, T> {
    maker: Arc<M>,
    taker: Arc<T>,
    order_qty: Decimal,
    tick_size: Decimal,
    fill_timeout: Duration,
    executing: bool,
    orders: Vec<OrderRecord>,
    telem_tx: mpsc::Sender<TelemetryEvent>,
}

impl<M: VenueAdapter, T: VenueAdapter> OrderController<M, T> {
    pub fn new(
        maker: Arc<M>,
        taker: Arc<T>,
        order_qty: Decimal,
        tick_size: Decimal,
        fill_timeout: Duration,
        telem_tx: mpsc::Sender<TelemetryEvent>,
    ) -> Self {
        Self {
            maker,
            taker,
            order_qty,
            tick_size,
            fill_timeout,
            executing: false,
            orders: Vec::new(),
            telem_tx,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.executing
    }

    /// Maker-order history for this run (the maker venue has no push
    /// telemetry, so this is the authoritative local record).
    pub fn orders(&self) -> &[OrderRecord] {
        &self.orders
    }

    /// Run one leg in the given direction. Returns true only when both legs
    /// completed and the ledger was committed.
    pub async fn try_execute(
        &mut self,
        direction: Direction,
        maker_bbo: &Bbo,
        ledger: &mut PositionLedger,
    ) -> bool {
        if self.executing {
            warn!("previous leg still in flight, skipping signal");
            return false;
        }
        self.executing = true;
        let done = self.execute_leg(direction, maker_bbo, ledger).await;
        self.executing = false;
        done
    }

    async fn execute_leg(
        &mut self,
        direction: Direction,
        maker_bbo: &Bbo,
        ledger: &mut PositionLedger,
    ) -> bool {
        let maker_side = direction.maker_side();

        // One tick inside the touch, so the order rests instead of crossing.
        // Post-only is the second line of defence.
        let maker_price = match direction {
            Direction::LongMaker => match maker_bbo.best_ask {
                Some(ask) => ask - self.tick_size,
                None => return false,
            },
            Direction::ShortMaker => match maker_bbo.best_bid {
                Some(bid) => bid + self.tick_size,
                None => return false,
            },
        };

        let req = OrderRequest {
            side: maker_side,
            price: maker_price,
            size: self.order_qty,
            order_type: OrderType::PostOnly,
            reduce_only: false,
        };
        let placed = match self.maker.place_order(&req).await {
            Ok(p) => p,
            Err(e) => {
                warn!(direction = %direction, price = %maker_price, "maker post failed: {e}");
                return false;
            }
        };

        info!(
            direction = %direction,
            order_id = %placed.order_id,
            side = %maker_side,
            price = %maker_price,
            size = %self.order_qty,
            "maker order resting"
        );
        let mut record = OrderRecord::open(
            placed.order_id.clone(),
            maker_side,
            maker_price,
            self.order_qty,
        );

        if !self.wait_for_maker_fill(&placed.order_id).await {
            record.mark_cancelled();
            self.orders.push(record);
            info!(order_id = %placed.order_id, "maker order timed out, leg aborted");
            return false;
        }
        record.mark_filled();
        info!(order_id = %placed.order_id, "maker order filled, hedging");

        let hedged = self.hedge(direction, maker_price, ledger).await;
        self.orders.push(record);
        hedged
    }

    /// Wait for the resting maker order to be taken. After the initial
    /// grace, absence from the open-orders listing is the fill signal; the
    /// order is never cancelled or probed destructively inside the window;
    /// that would race the taker about to fill it. On timeout the cancel
    /// itself resolves the race: NotFound means the fill won.
    async fn wait_for_maker_fill(&self, order_id: &str) -> bool {
        let deadline = Instant::now() + self.fill_timeout;
        sleep(FILL_GRACE).await;

        loop {
            match self.maker.list_open_orders().await {
                Ok(open) if !open.contains(order_id) => return true,
                Ok(_) => {}
                Err(e) => warn!(order_id, "open-orders poll failed: {e}"),
            }
            if Instant::now() >= deadline {
                break;
            }
            sleep(FILL_POLL_INTERVAL).await;
        }

        match self.maker.cancel_order(order_id).await {
            CancelOutcome::Cancelled => false,
            CancelOutcome::NotFound => {
                info!(order_id, "cancel raced a fill (not found), treating as filled");
                true
            }
            CancelOutcome::Error(msg) => {
                // Conservative: an unexplained cancel error is treated as
                // cancelled, so no hedge is sent against unknown inventory.
                warn!(order_id, "cancel returned error, treating as cancelled: {msg}");
                false
            }
        }
    }

    /// Opposite-sign IOC on the taker venue. The BBO snapshot taken here,
    /// before submission, is the recorded fill-price estimate; the IOC
    /// limit is only a slippage cap.
    async fn hedge(
        &self,
        direction: Direction,
        maker_price: Decimal,
        ledger: &mut PositionLedger,
    ) -> bool {
        let taker_side = direction.taker_side();
        let snapshot = self.taker.get_bbo().await;

        let estimate = match (taker_side, snapshot) {
            (Side::Buy, Some(bbo)) => bbo.best_ask,
            (Side::Sell, Some(bbo)) => bbo.best_bid,
            (_, None) => None,
        };
        let Some(estimate) = estimate else {
            self.hedge_failed(direction, maker_price, ledger, "no taker liquidity to price the hedge")
                .await;
            return false;
        };

        let limit_price = match taker_side {
            Side::Buy => estimate * (Decimal::ONE + hedge_slip()),
            Side::Sell => estimate * (Decimal::ONE - hedge_slip()),
        };

        let req = OrderRequest {
            side: taker_side,
            price: limit_price,
            size: self.order_qty,
            order_type: OrderType::Ioc,
            reduce_only: false,
        };
        if let Err(e) = self.taker.place_order(&req).await {
            self.hedge_failed(direction, maker_price, ledger, &e.to_string()).await;
            return false;
        }

        ledger.record_arb_trade(direction, self.order_qty);

        let spread = match direction {
            Direction::LongMaker => estimate - maker_price,
            Direction::ShortMaker => maker_price - estimate,
        };
        info!(
            direction = %direction,
            maker_price = %maker_price,
            taker_price = %estimate,
            %spread,
            "arbitrage complete"
        );

        let _ = self.telem_tx.try_send(TelemetryEvent::Trade(TradeRecord {
            ts: Utc::now(),
            direction,
            m_side: direction.maker_side(),
            m_price: maker_price,
            m_size: self.order_qty,
            t_side: taker_side,
            t_price: estimate,
            t_size: self.order_qty,
            spread_captured: spread,
            m_position: ledger.m_position,
            t_position: ledger.t_position,
        }));
        true
    }

    /// The maker leg is open with no hedge against it. Book the one-sided
    /// inventory truthfully and alert; the supervisor's divergence tripwire
    /// takes it from here.
    async fn hedge_failed(
        &self,
        direction: Direction,
        maker_price: Decimal,
        ledger: &mut PositionLedger,
        cause: &str,
    ) {
        let maker_side = direction.maker_side();
        error!(
            direction = %direction,
            side = %maker_side,
            price = %maker_price,
            size = %self.order_qty,
            "hedge failed, maker leg is UNHEDGED: {cause}"
        );
        ledger.update_m(maker_side, self.order_qty);
        let _ = self.telem_tx.try_send(TelemetryEvent::Alert(format!(
            "hedge failed after maker fill: {} {} {} @ {}, position unbalanced ({})",
            direction, maker_side, self.order_qty, maker_price, cause
        )));
    }
}
