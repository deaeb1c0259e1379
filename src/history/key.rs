//! Batch keys: `(record_type, shard)`

/// Default number of partitions per history table
pub const DEFAULT_SHARD_COUNT: u32 = 100;

/// History record family, one per destination table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    UserOrder,
    OrderDetail,
    OrderDeal,
    UserBalance,
}

impl RecordType {
    /// Table name prefix; the shard is appended as `_<shard>`
    pub fn table_prefix(self) -> &'static str {
        match self {
            RecordType::UserOrder => "order_history",
            RecordType::OrderDetail => "order_detail",
            RecordType::OrderDeal => "deal_history",
            RecordType::UserBalance => "balance_history",
        }
    }

    /// Backtick-quoted column list for the table
    pub fn columns(self) -> &'static str {
        match self {
            RecordType::UserOrder | RecordType::OrderDetail => {
                "(`id`, `create_time`, `finish_time`, `user_id`, `market`, `type`, `side`, \
                 `price`, `amount`, `fee`, `deal_stock`, `deal_money`, `deal_fee`)"
            }
            RecordType::OrderDeal => {
                "(`id`, `time`, `order_id`, `deal_order_id`, `amount`, `price`, `deal`, `fee`)"
            }
            RecordType::UserBalance => {
                "(`id`, `time`, `user_id`, `asset`, `business`, `change`, `balance`, `detail`)"
            }
        }
    }
}

/// Destination partition of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatchKey {
    pub record_type: RecordType,
    pub shard: u32,
}

impl BatchKey {
    /// Derive the key for `entity_id` (user id or order id)
    #[inline]
    pub fn new(record_type: RecordType, entity_id: u64, shard_count: u32) -> Self {
        Self {
            record_type,
            shard: (entity_id % shard_count as u64) as u32,
        }
    }

    pub fn table_name(&self) -> String {
        format!("{}_{}", self.record_type.table_prefix(), self.shard)
    }

    /// `INSERT INTO ... VALUES ` prefix written by the first append
    pub fn insert_prefix(&self) -> String {
        format!(
            "INSERT INTO `{}` {} VALUES ",
            self.table_name(),
            self.record_type.columns()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_is_modulo() {
        let key = BatchKey::new(RecordType::UserBalance, 42, 100);
        assert_eq!(key.shard, 42);

        let key = BatchKey::new(RecordType::OrderDeal, 12_345, 100);
        assert_eq!(key.shard, 45);

        let key = BatchKey::new(RecordType::OrderDetail, u64::MAX, 7);
        assert_eq!(key.shard, (u64::MAX % 7) as u32);
    }

    #[test]
    fn test_structural_equality() {
        let a = BatchKey::new(RecordType::UserOrder, 142, 100);
        let b = BatchKey::new(RecordType::UserOrder, 42, 100);
        let c = BatchKey::new(RecordType::OrderDetail, 42, 100);
        assert_eq!(a, b);
        assert_ne!(b, c);
    }

    #[test]
    fn test_insert_prefix() {
        let key = BatchKey::new(RecordType::UserBalance, 7, 100);
        assert_eq!(key.table_name(), "balance_history_7");
        assert_eq!(
            key.insert_prefix(),
            "INSERT INTO `balance_history_7` (`id`, `time`, `user_id`, `asset`, `business`, \
             `change`, `balance`, `detail`) VALUES "
        );
    }
}
