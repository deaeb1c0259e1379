//! Database connection management

use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::ConnectOptions;

use crate::config::DbConfig;

/// Connection options for the history database
pub fn connect_options(config: &DbConfig) -> MySqlConnectOptions {
    MySqlConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.user)
        .password(&config.pass)
        .database(&config.name)
        .charset(&config.charset)
}

/// Open one dedicated MySQL connection
pub async fn connect(config: &DbConfig) -> Result<MySqlConnection, sqlx::Error> {
    let conn = connect_options(config).connect().await?;
    tracing::debug!(host = %config.host, port = config.port, "MySQL connection established");
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Note: These tests require a running MySQL instance
    // Run with: docker-compose up -d mysql

    #[tokio::test]
    #[ignore] // Requires MySQL running
    async fn test_database_connect_success() {
        let conn = connect(&DbConfig::default()).await;
        assert!(conn.is_ok(), "Should connect to MySQL successfully");
    }

    #[test]
    fn test_connect_options_from_config() {
        let config = DbConfig {
            host: "db.internal".to_string(),
            port: 3307,
            ..DbConfig::default()
        };
        let opts = connect_options(&config);
        assert_eq!(opts.get_host(), "db.internal");
        assert_eq!(opts.get_port(), 3307);
        assert_eq!(opts.get_database(), Some("trade_log"));
    }
}
