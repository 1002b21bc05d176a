use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use tokio::sync::mpsc;
use tracing::{error, info};

use crate::telemetry::telegram::TelegramNotifier;
use crate::types::TelemetryEvent;

/// CSV file flushed after every row: a crash mid-run must not lose samples.
struct CsvWriter {
    file: File,
}

impl CsvWriter {
    fn create(path: &Path, header: &str) -> std::io::Result<Self> {
        let mut file = File::create(path)?;
        writeln!(file, "{}", header)?;
        file.flush()?;
        Ok(Self { file })
    }

    fn write_row(&mut self, row: &str) {
        writeln!(self.file, "{}", row).ok();
        self.file.flush().ok();
    }
}

/// Single background task handling ALL record I/O: the per-run sample and
/// trade CSVs plus Telegram fan-out. Consolidating it here keeps file and
/// network latency off the supervisor tick. Exits when every sender is
/// dropped, flushing on the way out.
pub async fn telemetry_writer(
    mut rx: mpsc::Receiver<TelemetryEvent>,
    log_dir: String,
    run_stamp: String,
    notifier: Option<TelegramNotifier>,
) {
    if let Err(e) = fs::create_dir_all(&log_dir) {
        error!("cannot create log dir {log_dir}: {e}");
        return;
    }

    let samples_path = Path::new(&log_dir).join(format!("samples_{run_stamp}.csv"));
    let trades_path = Path::new(&log_dir).join(format!("trades_{run_stamp}.csv"));

    let mut samples_csv = match CsvWriter::create(
        &samples_path,
        "timestamp,m_bid,m_ask,t_bid,t_ask,diff_long,diff_short,avg_long,avg_short,signal",
    ) {
        Ok(w) => w,
        Err(e) => {
            error!("cannot create {}: {e}", samples_path.display());
            return;
        }
    };
    let mut trades_csv = match CsvWriter::create(
        &trades_path,
        "timestamp,direction,m_side,m_price,m_size,t_side,t_price,t_size,spread_captured,m_position,t_position,net_position",
    ) {
        Ok(w) => w,
        Err(e) => {
            error!("cannot create {}: {e}", trades_path.display());
            return;
        }
    };

    info!(
        samples = %samples_path.display(),
        trades = %trades_path.display(),
        telegram = notifier.is_some(),
        "telemetry writer started"
    );

    while let Some(event) = rx.recv().await {
        match event {
            TelemetryEvent::Sample(s) => {
                samples_csv.write_row(&format!(
                    "{},{},{},{},{},{},{},{},{},{}",
                    s.ts.to_rfc3339(),
                    s.m_bid,
                    s.m_ask,
                    s.t_bid,
                    s.t_ask,
                    s.diff_long,
                    s.diff_short,
                    s.avg_long,
                    s.avg_short,
                    s.signal.map(|d| d.to_string()).unwrap_or_default(),
                ));
            }
            TelemetryEvent::Trade(t) => {
                trades_csv.write_row(&format!(
                    "{},{},{},{},{},{},{},{},{},{},{},{}",
                    t.ts.to_rfc3339(),
                    t.direction,
                    t.m_side,
                    t.m_price,
                    t.m_size,
                    t.t_side,
                    t.t_price,
                    t.t_size,
                    t.spread_captured,
                    t.m_position,
                    t.t_position,
                    t.m_position + t.t_position,
                ));
                if let Some(tg) = &notifier {
                    tg.notify_trade(&t).await;
                }
            }
            TelemetryEvent::Heartbeat(h) => {
                if let Some(tg) = &notifier {
                    tg.notify_heartbeat(&h).await;
                }
            }
            TelemetryEvent::Started(s) => {
                if let Some(tg) = &notifier {
                    tg.notify_start(&s).await;
                }
            }
            TelemetryEvent::Stopped(s) => {
                if let Some(tg) = &notifier {
                    tg.notify_stop(&s).await;
                }
            }
            TelemetryEvent::Alert(msg) => {
                error!("ALERT: {msg}");
                if let Some(tg) = &notifier {
                    tg.notify_alert(&msg).await;
                }
            }
        }
    }

    info!("telemetry writer stopped, files flushed");
}
