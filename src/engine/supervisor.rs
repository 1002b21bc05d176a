use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, sleep, timeout, Instant};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::engine::book::BookCache;
use crate::engine::controller::OrderController;
use crate::engine::ledger::PositionLedger;
use crate::engine::spread::SpreadAnalyzer;
use crate::types::{
    HeartbeatRecord, SampleRecord, StartRecord, StopReason, StopRecord, TelemetryEvent,
};
use crate::venues::VenueAdapter;

const TICK: Duration = Duration::from_secs(1);
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(300);
const BALANCE_CHECK_INTERVAL: Duration = Duration::from_secs(10);
const BALANCE_CONFIRM_DELAY: Duration = Duration::from_secs(3);
const SHUTDOWN_STEP_TIMEOUT: Duration = Duration::from_secs(15);
const QUIESCENCE: Duration = Duration::from_secs(1);
const RECONCILE_ATTEMPTS: u32 = 3;
const RECONCILE_PAUSE: Duration = Duration::from_secs(3);
const STATUS_EVERY_TICKS: u64 = 30;
const WARMUP_LOG_EVERY_TICKS: u64 = 10;

/// Quote-asset floor below which trading cannot continue.
fn min_balance() -> Decimal {
    Decimal::from(10)
}

// ─── Stop signalling ───

/// Latching stop request shared between the signal handler, the watchdogs
/// and the supervisor. Only the first reason wins; repeat requests (a second
/// Ctrl-C during shutdown) are ignored so reconciliation completes.
#[derive(Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<Option<StopReason>>>,
}

impl StopHandle {
    pub fn request_stop(&self, reason: StopReason) {
        let latched = self.tx.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(reason);
                true
            } else {
                false
            }
        });
        if latched {
            info!(%reason, "stop requested");
        } else {
            debug!(%reason, "stop already requested, ignoring");
        }
    }
}

pub fn stop_channel() -> (StopHandle, watch::Receiver<Option<StopReason>>) {
    let (tx, rx) = watch::channel(None);
    (StopHandle { tx: Arc::new(tx) }, rx)
}

// ─── Supervisor ───

/// Single task driving the whole engine at 1 Hz: book refresh, spread
/// sampling, heartbeats, balance policy, risk gates, leg execution, and the
/// graceful shutdown sequence.
pub struct Supervisor<M, T> {
    maker: Arc<M>,
    taker: Arc<T>,
    books: BookCache,
    spread: SpreadAnalyzer,
    ledger: PositionLedger,
    controller: OrderController<M, T>,
    telem_tx: mpsc::Sender<TelemetryEvent>,
    stop_rx: watch::Receiver<Option<StopReason>>,
    config: Config,

    started_at: Instant,
    last_heartbeat: Instant,
    last_balance_check: Option<Instant>,
    tick_count: u64,
}

impl<M: VenueAdapter, T: VenueAdapter> Supervisor<M, T> {
    pub fn new(
        maker: Arc<M>,
        taker: Arc<T>,
        config: Config,
        telem_tx: mpsc::Sender<TelemetryEvent>,
        stop_rx: watch::Receiver<Option<StopReason>>,
    ) -> Self {
        let controller = OrderController::new(
            maker.clone(),
            taker.clone(),
            config.size,
            config.tick_size,
            Duration::from_secs(config.fill_timeout),
            telem_tx.clone(),
        );
        let spread = SpreadAnalyzer::new(
            config.warmup_samples,
            config.long_threshold,
            config.short_threshold,
            config.min_spread,
        );
        let ledger = PositionLedger::new(config.max_position, config.size);
        let now = Instant::now();
        Self {
            maker,
            taker,
            books: BookCache::new(),
            spread,
            ledger,
            controller,
            telem_tx,
            stop_rx,
            config,
            started_at: now,
            last_heartbeat: now,
            last_balance_check: None,
            tick_count: 0,
        }
    }

    fn runtime_hours(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64() / 3600.0
    }

    /// Main loop. Returns the reason trading stopped; the caller then runs
    /// `shutdown` under its own budget.
    pub async fn run(&mut self) -> StopReason {
        info!(
            ticker = %self.config.ticker,
            qty = %self.config.size,
            max_position = %self.config.max_position,
            warmup = self.config.warmup_samples,
            "supervisor started"
        );
        let _ = self.telem_tx.try_send(TelemetryEvent::Started(StartRecord {
            ticker: self.config.ticker.clone(),
            order_qty: self.config.size,
            max_position: self.config.max_position,
            long_threshold: self.config.long_threshold,
            short_threshold: self.config.short_threshold,
        }));

        let mut ticker = interval(TICK);
        loop {
            ticker.tick().await;
            if let Some(reason) = *self.stop_rx.borrow() {
                return reason;
            }
            if let Some(reason) = self.tick().await {
                return reason;
            }
        }
    }

    /// One 1 Hz iteration. Returns a reason when a tripwire fires.
    async fn tick(&mut self) -> Option<StopReason> {
        self.tick_count += 1;

        let ready = self.books.refresh(&*self.maker, &*self.taker).await;
        if !ready {
            if self.tick_count % WARMUP_LOG_EVERY_TICKS == 0 {
                warn!("order books incomplete, skipping tick");
            }
            return None;
        }

        let (Some(m), Some(t)) = (self.books.maker().copied(), self.books.taker().copied())
        else {
            return None;
        };
        let (Some(m_bid), Some(m_ask), Some(t_bid), Some(t_ask)) =
            (m.best_bid, m.best_ask, t.best_bid, t.best_ask)
        else {
            return None;
        };

        self.spread.update(m_bid, m_ask, t_bid, t_ask);
        let signal = self.spread.signal();
        let stats = self.spread.stats();

        let _ = self.telem_tx.try_send(TelemetryEvent::Sample(SampleRecord {
            ts: Utc::now(),
            m_bid,
            m_ask,
            t_bid,
            t_ask,
            diff_long: stats.diff_long,
            diff_short: stats.diff_short,
            avg_long: stats.avg_long,
            avg_short: stats.avg_short,
            signal,
        }));

        if self.tick_count % STATUS_EVERY_TICKS == 0 {
            info!(
                samples = stats.sample_count,
                diff_long = %stats.diff_long,
                diff_short = %stats.diff_short,
                avg_long = %stats.avg_long,
                avg_short = %stats.avg_short,
                m_pos = %self.ledger.m_position,
                t_pos = %self.ledger.t_position,
                net = %self.ledger.net_position(),
                long_trades = self.ledger.long_trades,
                short_trades = self.ledger.short_trades,
                m_age_s = self.books.maker_age().map(|a| a.as_secs()).unwrap_or(0),
                t_age_s = self.books.taker_age().map(|a| a.as_secs()).unwrap_or(0),
                "status"
            );
        }

        if self.last_heartbeat.elapsed() >= HEARTBEAT_INTERVAL {
            self.last_heartbeat = Instant::now();
            let _ = self.telem_tx.try_send(TelemetryEvent::Heartbeat(HeartbeatRecord {
                runtime_hours: self.runtime_hours(),
                total_trades: self.ledger.total_trades(),
                diff_long: stats.diff_long,
                diff_short: stats.diff_short,
                avg_long: stats.avg_long,
                avg_short: stats.avg_short,
                m_position: self.ledger.m_position,
                t_position: self.ledger.t_position,
            }));
        }

        if !self.spread.is_warmed_up() {
            if self.tick_count % WARMUP_LOG_EVERY_TICKS == 0 {
                info!(
                    samples = self.spread.sample_count(),
                    needed = self.spread.warmup_samples(),
                    "warming up"
                );
            }
            return None;
        }

        let balance_due = self
            .last_balance_check
            .map(|at| at.elapsed() >= BALANCE_CHECK_INTERVAL)
            .unwrap_or(true);
        if balance_due {
            if let Some(reason) = self.check_balances().await {
                return Some(reason);
            }
        }

        if self.ledger.is_diverged() {
            error!(
                net = %self.ledger.net_position(),
                "ledger divergence beyond tripwire, shutting down"
            );
            let _ = self.telem_tx.try_send(TelemetryEvent::Alert(format!(
                "position divergence: m={} t={} net={}",
                self.ledger.m_position,
                self.ledger.t_position,
                self.ledger.net_position()
            )));
            return Some(StopReason::Divergence);
        }
        if !self.ledger.check_risk() {
            return None;
        }

        if let Some(direction) = signal {
            if self.controller.is_busy() {
                return None;
            }
            if !self.ledger.admits(direction) {
                info!(%direction, m_pos = %self.ledger.m_position, "position cap reached, skipping signal");
                return None;
            }
            info!(
                %direction,
                diff_long = %stats.diff_long,
                diff_short = %stats.diff_short,
                "signal fired"
            );
            self.controller
                .try_execute(direction, &m, &mut self.ledger)
                .await;
        }

        None
    }

    /// Balance policy: a single query failure must not stop trading (venue
    /// APIs throw transient errors), so failed reads abort the check
    /// silently. A below-floor reading is only acted on when a confirming
    /// re-read 3 s later agrees.
    async fn check_balances(&mut self) -> Option<StopReason> {
        self.last_balance_check = Some(Instant::now());

        let (m, t) = match (self.maker.get_balance().await, self.taker.get_balance().await) {
            (Ok(m), Ok(t)) => (m, t),
            (Err(e), _) | (_, Err(e)) => {
                debug!("balance check skipped: {e}");
                return None;
            }
        };
        if m >= min_balance() && t >= min_balance() {
            debug!(maker = %m, taker = %t, "balances ok");
            return None;
        }

        warn!(maker = %m, taker = %t, floor = %min_balance(), "balance below floor, confirming");
        sleep(BALANCE_CONFIRM_DELAY).await;

        let (m, t) = match (self.maker.get_balance().await, self.taker.get_balance().await) {
            (Ok(m), Ok(t)) => (m, t),
            (Err(e), _) | (_, Err(e)) => {
                debug!("balance confirmation skipped: {e}");
                return None;
            }
        };
        if m < min_balance() || t < min_balance() {
            error!(maker = %m, taker = %t, "balance below floor on consecutive reads");
            let _ = self.telem_tx.try_send(TelemetryEvent::Alert(format!(
                "insufficient funds: maker={} taker={} (floor {})",
                m,
                t,
                min_balance()
            )));
            return Some(StopReason::InsufficientFunds);
        }
        info!(maker = %m, taker = %t, "balance recovered on confirmation read");
        None
    }

    /// Graceful shutdown, the reverse of startup. Every step is bounded; a
    /// failed step is logged and the sequence continues, leaving the venue
    /// in the best state still reachable.
    pub async fn shutdown(&mut self, reason: StopReason) {
        info!(%reason, "shutdown starting");

        // The session may have expired during a quiet stretch; shutdown's
        // trades must not fail on stale credentials.
        match timeout(SHUTDOWN_STEP_TIMEOUT, self.maker.force_session_renew()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("maker session renewal failed: {e}"),
            Err(_) => warn!("maker session renewal timed out"),
        }

        match timeout(SHUTDOWN_STEP_TIMEOUT, self.maker.cancel_all()).await {
            Ok(Ok(())) => info!("maker open orders cancelled"),
            Ok(Err(e)) => warn!("maker cancel-all failed: {e}"),
            Err(_) => warn!("maker cancel-all timed out"),
        }
        match timeout(SHUTDOWN_STEP_TIMEOUT, self.taker.cancel_all()).await {
            Ok(Ok(())) => info!("taker open orders cancelled"),
            Ok(Err(e)) => warn!("taker cancel-all failed: {e}"),
            Err(_) => warn!("taker cancel-all timed out"),
        }

        sleep(QUIESCENCE).await;

        self.reconcile_and_close().await;

        let m_res = self.residual(&*self.maker, self.ledger.m_position).await;
        let t_res = self.residual(&*self.taker, self.ledger.t_position).await;
        let trivial = self.trivial_size();
        if m_res.abs() >= trivial || t_res.abs() >= trivial {
            error!(maker = %m_res, taker = %t_res, "positions NOT flat after shutdown close");
            let _ = self.telem_tx.try_send(TelemetryEvent::Alert(format!(
                "shutdown close incomplete: residual maker={} taker={}, manual intervention required",
                m_res, t_res
            )));
        } else {
            info!("positions flat");
        }

        if let Err(e) = self.taker.disconnect().await {
            warn!("taker disconnect failed: {e}");
        }
        if let Err(e) = self.maker.disconnect().await {
            warn!("maker disconnect failed: {e}");
        }

        let _ = self
            .telem_tx
            .send(TelemetryEvent::Stopped(StopRecord {
                reason: reason.to_string(),
                runtime_hours: self.runtime_hours(),
                total_trades: self.ledger.total_trades(),
            }))
            .await;
        info!(%reason, trades = self.ledger.total_trades(), "shutdown complete");
    }

    fn trivial_size(&self) -> Decimal {
        self.config.size / Decimal::from(10)
    }

    /// Position used for closing: the authoritative venue read when it
    /// succeeds, the local ledger otherwise; when both are known, the
    /// larger magnitude. Over-closing is safe under reduce-only;
    /// under-closing leaves open risk. Never zero-on-failure.
    async fn close_size<V: VenueAdapter + ?Sized>(venue: &V, ledger_value: Decimal) -> Decimal {
        match venue.get_position().await {
            Ok(reported) => {
                if reported.abs() >= ledger_value.abs() {
                    reported
                } else {
                    ledger_value
                }
            }
            Err(e) => {
                warn!(venue = venue.name(), "position read failed, trusting local ledger: {e}");
                ledger_value
            }
        }
    }

    async fn residual<V: VenueAdapter + ?Sized>(&self, venue: &V, ledger_value: Decimal) -> Decimal {
        match venue.get_position().await {
            Ok(reported) => reported,
            Err(e) => {
                warn!(venue = venue.name(), "verification read failed, reporting ledger value: {e}");
                ledger_value
            }
        }
    }

    async fn reconcile_and_close(&mut self) {
        let trivial = self.trivial_size();

        for attempt in 1..=RECONCILE_ATTEMPTS {
            let m_pos = Self::close_size(&*self.maker, self.ledger.m_position).await;
            let t_pos = Self::close_size(&*self.taker, self.ledger.t_position).await;

            if m_pos.abs() < trivial && t_pos.abs() < trivial {
                info!("both venues flat");
                return;
            }
            info!(attempt, maker = %m_pos, taker = %t_pos, "closing residual positions");

            if m_pos.abs() >= trivial {
                match timeout(SHUTDOWN_STEP_TIMEOUT, self.maker.close_position(m_pos)).await {
                    Ok(Ok(())) => self.ledger.set_m(Decimal::ZERO),
                    Ok(Err(e)) => warn!("maker close failed: {e}"),
                    Err(_) => warn!("maker close timed out"),
                }
            }
            if t_pos.abs() >= trivial {
                match timeout(SHUTDOWN_STEP_TIMEOUT, self.taker.close_position(t_pos)).await {
                    Ok(Ok(())) => self.ledger.set_t(Decimal::ZERO),
                    Ok(Err(e)) => warn!("taker close failed: {e}"),
                    Err(_) => warn!("taker close timed out"),
                }
            }

            sleep(RECONCILE_PAUSE).await;
        }
        warn!("close attempts exhausted with positions still open");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Side;
    use crate::venues::stub::StubVenue;
    use rust_decimal_macros::dec;

    fn config() -> Config {
        use clap::Parser;
        Config::parse_from([
            "arb",
            "--size",
            "0.001",
            "--max-position",
            "0.01",
            "--warmup-samples",
            "1",
            "--long-threshold",
            "10",
            "--short-threshold",
            "10",
        ])
    }

    fn fixture() -> (
        Arc<StubVenue>,
        Arc<StubVenue>,
        Supervisor<StubVenue, StubVenue>,
        StopHandle,
        mpsc::Receiver<TelemetryEvent>,
    ) {
        let maker = Arc::new(StubVenue::new("maker"));
        let taker = Arc::new(StubVenue::new("taker"));
        maker.set_bbo(dec!(30000), dec!(30010));
        taker.set_bbo(dec!(30012), dec!(30015));
        let (telem_tx, telem_rx) = mpsc::channel(256);
        let (handle, stop_rx) = stop_channel();
        let sup = Supervisor::new(maker.clone(), taker.clone(), config(), telem_tx, stop_rx);
        (maker, taker, sup, handle, telem_rx)
    }

    /// Scenario: request_stop called twice with different reasons.
    /// Expected: The first reason latches; the second call is indistinguishable
    /// from never having happened.
    #[test]
    fn test_request_stop_is_idempotent() {
        let (handle, rx) = stop_channel();
        handle.request_stop(StopReason::Divergence);
        handle.request_stop(StopReason::Interrupt);
        assert_eq!(*rx.borrow(), Some(StopReason::Divergence));
    }

    /// Scenario: Both balances healthy on a due check.
    /// Expected: No stop reason; the check timestamp advances.
    #[tokio::test(start_paused = true)]
    async fn test_balance_check_healthy() {
        let (_maker, _taker, mut sup, _handle, _telem_rx) = fixture();
        assert_eq!(sup.check_balances().await, None);
        assert!(sup.last_balance_check.is_some());
    }

    /// Scenario: Maker balance reads 5 (below the 10 floor) twice in a row,
    /// 3 s apart.
    /// Expected: Only the second consecutive breach trips InsufficientFunds.
    #[tokio::test(start_paused = true)]
    async fn test_balance_double_read_trips() {
        let (maker, _taker, mut sup, _handle, mut telem_rx) = fixture();
        maker.push_balance(Ok(dec!(5)));
        maker.push_balance(Ok(dec!(5)));
        assert_eq!(
            sup.check_balances().await,
            Some(StopReason::InsufficientFunds)
        );
        let mut saw_alert = false;
        while let Ok(ev) = telem_rx.try_recv() {
            if let TelemetryEvent::Alert(msg) = ev {
                assert!(msg.contains("insufficient funds"));
                saw_alert = true;
            }
        }
        assert!(saw_alert);
    }

    /// Scenario: A transient low reading that recovers by the confirmation
    /// read 3 s later.
    /// Expected: Trading continues with no stop reason.
    #[tokio::test(start_paused = true)]
    async fn test_balance_transient_dip_recovers() {
        let (maker, _taker, mut sup, _handle, _telem_rx) = fixture();
        maker.push_balance(Ok(dec!(5)));
        // Queue exhausted → sticky 1000 on the confirmation read.
        assert_eq!(sup.check_balances().await, None);
    }

    /// Scenario: The balance query itself errors.
    /// Expected: The check aborts silently; a raw API error never stops trading.
    #[tokio::test(start_paused = true)]
    async fn test_balance_error_skipped() {
        let (maker, _taker, mut sup, _handle, _telem_rx) = fixture();
        maker.push_balance(Err("502 bad gateway"));
        assert_eq!(sup.check_balances().await, None);
    }

    /// Scenario: Ledger net pushed past 3·qty (an un-hedged double failure),
    /// books complete, analyzer warmed.
    /// Expected: The tick returns Divergence and emits a critical alert.
    #[tokio::test(start_paused = true)]
    async fn test_divergence_tripwire() {
        let (_maker, _taker, mut sup, _handle, mut telem_rx) = fixture();
        sup.ledger.update_m(Side::Buy, dec!(0.0035));
        assert_eq!(sup.tick().await, Some(StopReason::Divergence));
        let mut saw_alert = false;
        while let Ok(ev) = telem_rx.try_recv() {
            if let TelemetryEvent::Alert(msg) = ev {
                assert!(msg.contains("divergence"));
                saw_alert = true;
            }
        }
        assert!(saw_alert);
    }

    /// Scenario: Net exposure in the pause band (2·qty < net ≤ 3·qty).
    /// Expected: The tick completes without a stop reason and without
    /// executing anything: trading is paused, not stopped.
    #[tokio::test(start_paused = true)]
    async fn test_risk_pause_without_stop() {
        let (maker, _taker, mut sup, _handle, _telem_rx) = fixture();
        sup.ledger.update_m(Side::Buy, dec!(0.0025));
        assert_eq!(sup.tick().await, None);
        assert!(maker.placed().is_empty());
    }

    /// Scenario: An incomplete maker book (no ask).
    /// Expected: The tick is skipped before sampling; no signal can fire.
    #[tokio::test(start_paused = true)]
    async fn test_incomplete_book_skips_tick() {
        let (maker, _taker, mut sup, _handle, _telem_rx) = fixture();
        maker.clear_bbo();
        assert_eq!(sup.tick().await, None);
        assert_eq!(sup.spread.sample_count(), 0);
    }

    /// Scenario: Ledger pre-seeded m=+0.002 / t=-0.002; venue M reports
    /// +0.002 authoritatively, venue T errors (ledger fallback −0.002). Run the
    /// full shutdown.
    /// Expected: Session renewed, both cancel-alls issued, one close per venue
    /// (SELL 0.002 on M via close_position(+0.002), BUY 0.002 on T via
    /// close_position(−0.002)), final verify flat, stop notification sent.
    #[tokio::test(start_paused = true)]
    async fn test_shutdown_reconciliation() {
        let (maker, taker, mut sup, _handle, mut telem_rx) = fixture();
        sup.ledger.set_m(dec!(0.002));
        sup.ledger.set_t(dec!(-0.002));

        maker.set_position(Some(Decimal::ZERO));
        maker.push_position(Ok(dec!(0.002))); // first reconcile read
        taker.set_position(None); // authoritative read always fails → ledger fallback

        sup.shutdown(StopReason::Interrupt).await;

        assert_eq!(maker.session_renews(), 1);
        assert_eq!(maker.cancel_all_calls(), 1);
        assert_eq!(taker.cancel_all_calls(), 1);
        assert_eq!(maker.closes(), vec![dec!(0.002)]);
        assert_eq!(taker.closes(), vec![dec!(-0.002)]);

        let mut saw_stop = false;
        while let Ok(ev) = telem_rx.try_recv() {
            match ev {
                TelemetryEvent::Stopped(rec) => {
                    assert_eq!(rec.reason, "operator interrupt");
                    saw_stop = true;
                }
                TelemetryEvent::Alert(msg) => panic!("unexpected alert: {msg}"),
                _ => {}
            }
        }
        assert!(saw_stop);
    }

    /// Scenario: Maker position reads fail on every attempt while the ledger
    /// says m=+0.002, and every close attempt is rejected by the venue.
    /// Expected: The close loop trusts the ledger (never zero-on-failure),
    /// retries 3 times, the final verify reports the ledger residual with a
    /// loud alert, and the program still reaches its stop notification.
    #[tokio::test(start_paused = true)]
    async fn test_shutdown_residual_alert() {
        let (maker, taker, mut sup, _handle, mut telem_rx) = fixture();
        sup.ledger.set_m(dec!(0.002));
        maker.set_position(None);
        taker.set_position(Some(Decimal::ZERO));
        for _ in 0..3 {
            maker.fail_next_close("reduce-only rejected");
        }

        sup.shutdown(StopReason::Divergence).await;

        assert_eq!(maker.closes(), vec![dec!(0.002); 3]);
        assert!(taker.closes().is_empty());
        let (mut saw_stop, mut saw_residual) = (false, false);
        while let Ok(ev) = telem_rx.try_recv() {
            match ev {
                TelemetryEvent::Stopped(_) => saw_stop = true,
                TelemetryEvent::Alert(msg) if msg.contains("shutdown close incomplete") => {
                    saw_residual = true;
                }
                _ => {}
            }
        }
        assert!(saw_stop);
        assert!(saw_residual);
    }

    /// Scenario: A favorable long differential after warm-up with idle
    /// controller (stub fills immediately, hedge succeeds).
    /// Expected: The tick executes the leg end-to-end and the ledger commits.
    #[tokio::test(start_paused = true)]
    async fn test_signal_executes_leg() {
        let (maker, taker, mut sup, _handle, _telem_rx) = fixture();
        // Warm up with a flat differential.
        assert_eq!(sup.tick().await, None);
        assert!(sup.spread.is_warmed_up());
        // Now feed a taker book 40 over the maker ask: diff_long jumps.
        taker.set_bbo(dec!(30050), dec!(30055));
        assert_eq!(sup.tick().await, None);
        assert_eq!(sup.ledger.m_position, dec!(0.001));
        assert_eq!(sup.ledger.t_position, dec!(-0.001));
        assert_eq!(maker.placed().len(), 1);
        assert_eq!(taker.placed().len(), 1);
    }
}
