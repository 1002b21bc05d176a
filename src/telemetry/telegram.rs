use tracing::warn;

use crate::types::{HeartbeatRecord, StartRecord, StopRecord, TradeRecord};

/// Telegram Bot API client. Persistent connection pool via reqwest. Sends
/// are best-effort: a failed notification is logged and never propagates
/// into the trading path.
#[derive(Clone)]
pub struct TelegramNotifier {
    client: reqwest::Client,
    url: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: &str, chat_id: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: format!("https://api.telegram.org/bot{}/sendMessage", bot_token),
            chat_id: chat_id.to_string(),
        }
    }

    async fn send(&self, text: &str) {
        let payload = serde_json::json!({
            "chat_id": &self.chat_id,
            "text": text,
        });
        match self.client.post(&self.url).json(&payload).send().await {
            Ok(resp) => {
                if !resp.status().is_success() {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    warn!("telegram send failed: {status}: {body}");
                }
            }
            Err(e) => warn!("telegram request error: {e}"),
        }
    }

    pub async fn notify_start(&self, rec: &StartRecord) {
        let text = format!(
            "🟢 Arbitrage engine started\n\
             {} | qty {} | max position {}\n\
             thresholds: long {} / short {}",
            rec.ticker, rec.order_qty, rec.max_position, rec.long_threshold, rec.short_threshold,
        );
        self.send(&text).await;
    }

    pub async fn notify_stop(&self, rec: &StopRecord) {
        let text = format!(
            "🔴 Arbitrage engine stopped\n\
             reason: {}\n\
             runtime: {:.1}h | trades: {}",
            rec.reason, rec.runtime_hours, rec.total_trades,
        );
        self.send(&text).await;
    }

    pub async fn notify_trade(&self, rec: &TradeRecord) {
        let text = format!(
            "🔔 Trade: {}\n\
             M: {} {} @ {}\n\
             T: {} {} @ {}\n\
             spread captured: {}\n\
             positions: M={} T={} net={}",
            rec.direction,
            rec.m_side,
            rec.m_size,
            rec.m_price,
            rec.t_side,
            rec.t_size,
            rec.t_price,
            rec.spread_captured,
            rec.m_position,
            rec.t_position,
            rec.m_position + rec.t_position,
        );
        self.send(&text).await;
    }

    pub async fn notify_heartbeat(&self, rec: &HeartbeatRecord) {
        let text = format!(
            "💓 Heartbeat | {:.1}h | {} trades\n\
             long diff {} (avg {})\n\
             short diff {} (avg {})\n\
             positions: M={} T={}",
            rec.runtime_hours,
            rec.total_trades,
            rec.diff_long,
            rec.avg_long,
            rec.diff_short,
            rec.avg_short,
            rec.m_position,
            rec.t_position,
        );
        self.send(&text).await;
    }

    pub async fn notify_alert(&self, msg: &str) {
        self.send(&format!("🚨 ALERT: {}", msg)).await;
    }
}
