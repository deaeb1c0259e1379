//! Statement executors owned by pool workers

use async_trait::async_trait;
use sqlx::mysql::MySqlConnection;
use sqlx::Connection;

use super::error::HistoryError;
use crate::config::DbConfig;

/// One private database session
///
/// Each pool worker owns exactly one executor for its whole lifetime and
/// calls [`SqlExecutor::close`] once when it exits.
#[async_trait]
pub trait SqlExecutor: Send {
    /// Run one complete statement
    async fn execute(&mut self, sql: &str) -> Result<(), HistoryError>;

    /// Release the underlying session
    async fn close(self: Box<Self>);
}

/// MySQL-backed executor over a dedicated `MySqlConnection`
pub struct MySqlExecutor {
    conn: MySqlConnection,
}

impl MySqlExecutor {
    pub async fn connect(config: &DbConfig) -> Result<Self, HistoryError> {
        let conn = crate::db::connect(config).await?;
        Ok(Self { conn })
    }

    /// Open `count` executors, failing if any single connection fails
    pub async fn connect_many(
        config: &DbConfig,
        count: usize,
    ) -> Result<Vec<Box<dyn SqlExecutor>>, HistoryError> {
        let mut executors: Vec<Box<dyn SqlExecutor>> = Vec::with_capacity(count);
        for _ in 0..count {
            match Self::connect(config).await {
                Ok(exec) => executors.push(Box::new(exec)),
                Err(e) => {
                    for opened in executors {
                        opened.close().await;
                    }
                    return Err(e);
                }
            }
        }
        tracing::info!(count, db = %config.name, "History connections established");
        Ok(executors)
    }
}

#[async_trait]
impl SqlExecutor for MySqlExecutor {
    async fn execute(&mut self, sql: &str) -> Result<(), HistoryError> {
        // Each batch is unique text; keep it out of the connection's statement cache
        sqlx::query(sql)
            .persistent(false)
            .execute(&mut self.conn)
            .await
            .map(|_| ())
            .map_err(|e| HistoryError::Execute(e.to_string()))
    }

    async fn close(self: Box<Self>) {
        if let Err(e) = self.conn.close().await {
            tracing::warn!("Failed to close history connection: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires MySQL running
    async fn test_mysql_executor_roundtrip() {
        let config = DbConfig::default();
        let mut exec = MySqlExecutor::connect(&config)
            .await
            .expect("Failed to connect");
        exec.execute("SELECT 1").await.expect("Failed to execute");
        Box::new(exec).close().await;
    }

    fn assert_send<T: Send>(_: &T) {}

    #[test]
    fn test_mysql_executor_is_a_worker_executor() {
        // Executor futures must be Send to run on spawned workers
        fn boxed(exec: MySqlExecutor) -> Box<dyn SqlExecutor> {
            Box::new(exec)
        }
        let _ = boxed;

        let config = DbConfig::default();
        assert_send(&MySqlExecutor::connect(&config));
        assert_send(&MySqlExecutor::connect_many(&config, 1));
    }

    #[tokio::test]
    async fn test_connect_many_fails_on_unreachable_db() {
        let config = DbConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            ..DbConfig::default()
        };
        let res = MySqlExecutor::connect_many(&config, 2).await;
        assert!(matches!(res, Err(HistoryError::Connect(_))));
    }
}
