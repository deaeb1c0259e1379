// models.rs - Order snapshot types recorded by the history writer

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order side, stored as its numeric code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Ask = 1, // Sell
    Bid = 2, // Buy
}

/// Order type, stored as its numeric code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Limit = 1,
    Market = 2,
}

/// Finished order as handed over by the engine
///
/// Times are unix seconds with fractional part. Amounts are exact decimals;
/// they are never converted to floating point on the way to the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub create_time: f64,
    /// Last update; recorded as `finish_time`
    pub update_time: f64,
    pub user_id: u32,
    pub market: String,
    pub order_type: OrderType,
    pub side: Side,
    pub price: Decimal,
    pub amount: Decimal,
    pub fee: Decimal,
    pub deal_stock: Decimal,
    pub deal_money: Decimal,
    pub deal_fee: Decimal,
}

impl Order {
    /// Create a limit order with nothing dealt yet
    pub fn new_limit(
        id: u64,
        user_id: u32,
        market: &str,
        side: Side,
        price: Decimal,
        amount: Decimal,
        time: f64,
    ) -> Self {
        Self {
            id,
            create_time: time,
            update_time: time,
            user_id,
            market: market.to_string(),
            order_type: OrderType::Limit,
            side,
            price,
            amount,
            fee: Decimal::ZERO,
            deal_stock: Decimal::ZERO,
            deal_money: Decimal::ZERO,
            deal_fee: Decimal::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(Side::Ask as u32, 1);
        assert_eq!(Side::Bid as u32, 2);
        assert_eq!(OrderType::Limit as u32, 1);
        assert_eq!(OrderType::Market as u32, 2);
    }

    #[test]
    fn test_new_limit() {
        let order = Order::new_limit(
            7,
            42,
            "BTCUSDT",
            Side::Bid,
            Decimal::new(85000, 0),
            Decimal::new(15, 1),
            1_700_000_000.5,
        );
        assert_eq!(order.order_type, OrderType::Limit);
        assert_eq!(order.create_time, order.update_time);
        assert!(order.deal_stock.is_zero());
    }
}
