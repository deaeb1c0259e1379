//! History replay input
//!
//! Newline-delimited JSON events, one per line, fed to a [`HistoryWriter`].
//!
//! ```text
//! {"kind":"balance","time":1700000000.5,"user_id":42,"asset":"BTC","business":"deposit","change":"10.5","balance":"10.5","detail":"{}"}
//! {"kind":"deal","time":1700000001.0,"ask_order_id":1,"bid_order_id":2,"amount":"1","price":"100","deal":"100","ask_fee":"0.1","bid_fee":"0.001"}
//! {"kind":"order","order":{...}}
//! ```

use std::io::BufRead;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::history::HistoryWriter;
use crate::models::Order;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum HistoryEvent {
    Order {
        order: Order,
    },
    Deal {
        time: f64,
        ask_order_id: u64,
        bid_order_id: u64,
        amount: Decimal,
        price: Decimal,
        deal: Decimal,
        ask_fee: Decimal,
        bid_fee: Decimal,
    },
    Balance {
        time: f64,
        user_id: u32,
        asset: String,
        business: String,
        change: Decimal,
        balance: Decimal,
        #[serde(default)]
        detail: String,
    },
}

impl HistoryEvent {
    /// Buffer this event through the append API
    pub fn apply(&self, writer: &HistoryWriter) -> Result<()> {
        match self {
            HistoryEvent::Order { order } => writer.append_order_history(order)?,
            HistoryEvent::Deal {
                time,
                ask_order_id,
                bid_order_id,
                amount,
                price,
                deal,
                ask_fee,
                bid_fee,
            } => writer.append_order_deal_history(
                *time,
                *ask_order_id,
                *bid_order_id,
                amount,
                price,
                deal,
                ask_fee,
                bid_fee,
            )?,
            HistoryEvent::Balance {
                time,
                user_id,
                asset,
                business,
                change,
                balance,
                detail,
            } => writer.append_user_balance_history(
                *time, *user_id, asset, business, change, balance, detail,
            )?,
        }
        Ok(())
    }
}

/// Replay summary
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplayStats {
    pub applied: u64,
    pub skipped: u64,
}

/// Read events from `input` and append each one
///
/// Blank lines are ignored. Lines that fail to parse or are rejected by the
/// writer are logged and skipped; I/O errors abort the replay.
pub fn replay<R: BufRead>(input: R, writer: &HistoryWriter) -> Result<ReplayStats> {
    let mut stats = ReplayStats::default();

    for (idx, line) in input.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.with_context(|| format!("Failed to read line {}", line_no))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event: HistoryEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(e) => {
                warn!(line = line_no, error = %e, "Skipping malformed history event");
                stats.skipped += 1;
                continue;
            }
        };

        match event.apply(writer) {
            Ok(()) => stats.applied += 1,
            Err(e) => {
                warn!(line = line_no, error = %e, "History event rejected");
                stats.skipped += 1;
            }
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::PendingStore;
    use std::io::Cursor;
    use std::sync::Arc;

    #[test]
    fn test_replay_mixed_input() {
        let store = Arc::new(PendingStore::new(100));
        let writer = HistoryWriter::new(store.clone());
        let input = r#"
{"kind":"balance","time":1.0,"user_id":42,"asset":"BTC","business":"deposit","change":"10.5","balance":"10.5","detail":"{\"tx\":\"abc\"}"}
not json
{"kind":"deal","time":2.0,"ask_order_id":1,"bid_order_id":2,"amount":"1","price":"100","deal":"100","ask_fee":"0.1","bid_fee":"0.001"}
{"kind":"order","order":{"id":7,"create_time":1.0,"update_time":2.0,"user_id":42,"market":"BTCUSDT","order_type":"limit","side":"bid","price":"100","amount":"1","fee":"0.001","deal_stock":"1","deal_money":"100","deal_fee":"0.001"}}
"#;

        let stats = replay(Cursor::new(input), &writer).unwrap();
        assert_eq!(stats, ReplayStats { applied: 3, skipped: 1 });

        let drained = store.drain();
        let rows: usize = drained.iter().map(|d| d.rows).sum();
        // 1 balance + 2 deal + 2 order rows
        assert_eq!(rows, 5);
    }

    #[test]
    fn test_balance_detail_defaults_empty() {
        let event: HistoryEvent = serde_json::from_str(
            r#"{"kind":"balance","time":1.0,"user_id":1,"asset":"USDT","business":"trade","change":"-1","balance":"0"}"#,
        )
        .unwrap();
        match event {
            HistoryEvent::Balance { detail, change, .. } => {
                assert!(detail.is_empty());
                assert_eq!(change, Decimal::NEGATIVE_ONE);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
