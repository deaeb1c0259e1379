//! Append API
//!
//! Entry points called by the engine after each committed state change.
//! Every call only buffers rows; durability comes later from the flush task
//! and the execution pool.

use std::fmt::Write as _;
use std::sync::Arc;

use rust_decimal::Decimal;

use super::error::HistoryError;
use super::format::{push_decimal, push_text, push_time};
use super::key::{BatchKey, RecordType};
use super::store::PendingStore;
use crate::models::Order;

/// Handle used by the engine thread to record history
///
/// Cheap to clone. Rows are rendered completely before they touch the
/// pending set, so a rejected field never leaves a partial tuple behind.
#[derive(Clone)]
pub struct HistoryWriter {
    store: Arc<PendingStore>,
}

impl HistoryWriter {
    pub fn new(store: Arc<PendingStore>) -> Self {
        Self { store }
    }

    fn key(&self, record_type: RecordType, entity_id: u64) -> BatchKey {
        BatchKey::new(record_type, entity_id, self.store.shard_count())
    }

    /// Record an order in both `order_history` (by user) and `order_detail`
    /// (by order id)
    pub fn append_order_history(&self, order: &Order) -> Result<(), HistoryError> {
        let row = order_row(order)?;
        self.store
            .append(self.key(RecordType::UserOrder, order.user_id as u64), &row)?;
        self.store
            .append(self.key(RecordType::OrderDetail, order.id), &row)?;
        Ok(())
    }

    /// Record one fill as two rows, one per participating order
    #[allow(clippy::too_many_arguments)]
    pub fn append_order_deal_history(
        &self,
        time: f64,
        ask_order_id: u64,
        bid_order_id: u64,
        amount: &Decimal,
        price: &Decimal,
        deal: &Decimal,
        ask_fee: &Decimal,
        bid_fee: &Decimal,
    ) -> Result<(), HistoryError> {
        let ask_row = deal_row(time, ask_order_id, bid_order_id, amount, price, deal, ask_fee)?;
        let bid_row = deal_row(time, bid_order_id, ask_order_id, amount, price, deal, bid_fee)?;
        self.store
            .append(self.key(RecordType::OrderDeal, ask_order_id), &ask_row)?;
        self.store
            .append(self.key(RecordType::OrderDeal, bid_order_id), &bid_row)?;
        Ok(())
    }

    /// Record a balance change with its free-text detail
    #[allow(clippy::too_many_arguments)]
    pub fn append_user_balance_history(
        &self,
        time: f64,
        user_id: u32,
        asset: &str,
        business: &str,
        change: &Decimal,
        balance: &Decimal,
        detail: &str,
    ) -> Result<(), HistoryError> {
        let row = balance_row(time, user_id, asset, business, change, balance, detail)?;
        self.store
            .append(self.key(RecordType::UserBalance, user_id as u64), &row)
    }
}

fn order_row(order: &Order) -> Result<String, HistoryError> {
    let mut row = String::with_capacity(256);
    let _ = write!(row, "({}, ", order.id);
    push_time(&mut row, order.create_time)?;
    row.push_str(", ");
    push_time(&mut row, order.update_time)?;
    let _ = write!(row, ", {}, ", order.user_id);
    push_text(&mut row, &order.market)?;
    let _ = write!(
        row,
        ", {}, {}, ",
        order.order_type as u32, order.side as u32
    );
    push_decimals(
        &mut row,
        &[
            &order.price,
            &order.amount,
            &order.fee,
            &order.deal_stock,
            &order.deal_money,
            &order.deal_fee,
        ],
    );
    row.push(')');
    Ok(row)
}

fn deal_row(
    time: f64,
    order_id: u64,
    deal_order_id: u64,
    amount: &Decimal,
    price: &Decimal,
    deal: &Decimal,
    fee: &Decimal,
) -> Result<String, HistoryError> {
    let mut row = String::with_capacity(128);
    row.push_str("(NULL, ");
    push_time(&mut row, time)?;
    let _ = write!(row, ", {}, {}, ", order_id, deal_order_id);
    push_decimals(&mut row, &[amount, price, deal, fee]);
    row.push(')');
    Ok(row)
}

fn balance_row(
    time: f64,
    user_id: u32,
    asset: &str,
    business: &str,
    change: &Decimal,
    balance: &Decimal,
    detail: &str,
) -> Result<String, HistoryError> {
    let mut row = String::with_capacity(128 + detail.len());
    row.push_str("(NULL, ");
    push_time(&mut row, time)?;
    let _ = write!(row, ", {}, ", user_id);
    push_text(&mut row, asset)?;
    row.push_str(", ");
    push_text(&mut row, business)?;
    row.push_str(", ");
    push_decimals(&mut row, &[change, balance]);
    row.push_str(", ");
    push_text(&mut row, detail)?;
    row.push(')');
    Ok(row)
}

fn push_decimals(row: &mut String, values: &[&Decimal]) {
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            row.push_str(", ");
        }
        push_decimal(row, value);
    }
}
