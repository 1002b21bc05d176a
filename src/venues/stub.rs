// Scriptable in-memory venue for controller/supervisor tests. Call results
// are queued per operation; a queue that runs dry falls back to the sticky
// default configured for that operation.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::types::{Bbo, OrderRequest, PlacedOrder};
use crate::venues::{CancelOutcome, VenueAdapter, VenueError};

#[derive(Default)]
struct StubState {
    bbo: Option<Bbo>,
    next_order_id: u64,
    place_errors: VecDeque<String>,
    open_orders_queue: VecDeque<Result<HashSet<String>, String>>,
    open_orders_sticky: HashSet<String>,
    cancel_queue: VecDeque<CancelOutcome>,
    position_queue: VecDeque<Result<Decimal, String>>,
    position_sticky: Option<Decimal>,
    balance_queue: VecDeque<Result<Decimal, String>>,
    balance_sticky: Option<Decimal>,
    stale_age: Option<Duration>,
    close_errors: VecDeque<String>,

    // Inspection
    placed: Vec<OrderRequest>,
    cancelled: Vec<String>,
    closes: Vec<Decimal>,
    cancel_all_calls: u32,
    session_renews: u32,
}

pub struct StubVenue {
    name: &'static str,
    state: Mutex<StubState>,
}

impl StubVenue {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Mutex::new(StubState {
                next_order_id: 100,
                position_sticky: Some(Decimal::ZERO),
                balance_sticky: Some(Decimal::from(1000)),
                ..StubState::default()
            }),
        }
    }

    // ── Scripting ──

    pub fn set_bbo(&self, bid: Decimal, ask: Decimal) {
        self.state.lock().unwrap().bbo = Some(Bbo {
            best_bid: Some(bid),
            best_bid_size: Some(Decimal::ONE),
            best_ask: Some(ask),
            best_ask_size: Some(Decimal::ONE),
            updated_at: Instant::now(),
        });
    }

    pub fn clear_bbo(&self) {
        self.state.lock().unwrap().bbo = None;
    }

    pub fn fail_next_place(&self, msg: &str) {
        self.state.lock().unwrap().place_errors.push_back(msg.to_string());
    }

    /// One-shot open-order listing; queued entries are consumed in order.
    pub fn push_open_orders(&self, ids: &[&str]) {
        let set = ids.iter().map(|s| s.to_string()).collect();
        self.state.lock().unwrap().open_orders_queue.push_back(Ok(set));
    }

    pub fn push_open_orders_err(&self, msg: &str) {
        self.state.lock().unwrap().open_orders_queue.push_back(Err(msg.to_string()));
    }

    /// Sticky listing served once the queue is empty.
    pub fn set_open_orders(&self, ids: &[&str]) {
        self.state.lock().unwrap().open_orders_sticky = ids.iter().map(|s| s.to_string()).collect();
    }

    pub fn push_cancel(&self, outcome: CancelOutcome) {
        self.state.lock().unwrap().cancel_queue.push_back(outcome);
    }

    pub fn push_position(&self, result: Result<Decimal, &str>) {
        self.state.lock().unwrap().position_queue.push_back(result.map_err(|e| e.to_string()));
    }

    pub fn set_position(&self, position: Option<Decimal>) {
        self.state.lock().unwrap().position_sticky = position;
    }

    pub fn push_balance(&self, result: Result<Decimal, &str>) {
        self.state.lock().unwrap().balance_queue.push_back(result.map_err(|e| e.to_string()));
    }

    pub fn set_balance(&self, balance: Option<Decimal>) {
        self.state.lock().unwrap().balance_sticky = balance;
    }

    pub fn set_stale_age(&self, age: Option<Duration>) {
        self.state.lock().unwrap().stale_age = age;
    }

    pub fn fail_next_close(&self, msg: &str) {
        self.state.lock().unwrap().close_errors.push_back(msg.to_string());
    }

    // ── Inspection ──

    pub fn placed(&self) -> Vec<OrderRequest> {
        self.state.lock().unwrap().placed.clone()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.state.lock().unwrap().cancelled.clone()
    }

    pub fn closes(&self) -> Vec<Decimal> {
        self.state.lock().unwrap().closes.clone()
    }

    pub fn cancel_all_calls(&self) -> u32 {
        self.state.lock().unwrap().cancel_all_calls
    }

    pub fn session_renews(&self) -> u32 {
        self.state.lock().unwrap().session_renews
    }
}

#[async_trait]
impl VenueAdapter for StubVenue {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn connect(&self) -> Result<(), VenueError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), VenueError> {
        Ok(())
    }

    async fn get_bbo(&self) -> Option<Bbo> {
        self.state.lock().unwrap().bbo
    }

    fn last_update_age(&self) -> Option<Duration> {
        self.state.lock().unwrap().stale_age
    }

    async fn place_order(&self, req: &OrderRequest) -> Result<PlacedOrder, VenueError> {
        let mut st = self.state.lock().unwrap();
        if let Some(msg) = st.place_errors.pop_front() {
            return Err(VenueError::Rejected(msg));
        }
        st.next_order_id += 1;
        let order_id = st.next_order_id.to_string();
        st.placed.push(req.clone());
        Ok(PlacedOrder {
            order_id,
            immediate_fill: None,
        })
    }

    async fn cancel_order(&self, order_id: &str) -> CancelOutcome {
        let mut st = self.state.lock().unwrap();
        st.cancelled.push(order_id.to_string());
        st.cancel_queue.pop_front().unwrap_or(CancelOutcome::Cancelled)
    }

    async fn list_open_orders(&self) -> Result<HashSet<String>, VenueError> {
        let mut st = self.state.lock().unwrap();
        match st.open_orders_queue.pop_front() {
            Some(Ok(set)) => Ok(set),
            Some(Err(msg)) => Err(VenueError::Network(msg)),
            None => Ok(st.open_orders_sticky.clone()),
        }
    }

    async fn get_position(&self) -> Result<Decimal, VenueError> {
        let mut st = self.state.lock().unwrap();
        match st.position_queue.pop_front() {
            Some(Ok(p)) => Ok(p),
            Some(Err(msg)) => Err(VenueError::Network(msg)),
            None => st
                .position_sticky
                .ok_or_else(|| VenueError::Stale("position unavailable".into())),
        }
    }

    async fn get_balance(&self) -> Result<Decimal, VenueError> {
        let mut st = self.state.lock().unwrap();
        match st.balance_queue.pop_front() {
            Some(Ok(b)) => Ok(b),
            Some(Err(msg)) => Err(VenueError::Network(msg)),
            None => st
                .balance_sticky
                .ok_or_else(|| VenueError::Stale("balance unavailable".into())),
        }
    }

    async fn cancel_all(&self) -> Result<(), VenueError> {
        self.state.lock().unwrap().cancel_all_calls += 1;
        Ok(())
    }

    async fn close_position(&self, signed_size: Decimal) -> Result<(), VenueError> {
        let mut st = self.state.lock().unwrap();
        st.closes.push(signed_size);
        match st.close_errors.pop_front() {
            Some(msg) => Err(VenueError::Rejected(msg)),
            None => Ok(()),
        }
    }

    async fn force_session_renew(&self) -> Result<(), VenueError> {
        self.state.lock().unwrap().session_renews += 1;
        Ok(())
    }
}
