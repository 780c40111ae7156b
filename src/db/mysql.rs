//! MySQL database client implementation.
//!
//! Provides the `MySqlClient` struct that implements the `DatabaseClient` trait
//! for MySQL/MariaDB servers using sqlx.

use crate::config::ConnectionConfig;
use crate::db::DatabaseClient;
use crate::error::{ReplayError, Result};
use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlDatabaseError, MySqlPool, MySqlPoolOptions};
use std::time::Duration;
use tracing::{debug, warn};

/// Maximum number of connection retry attempts.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay between retry attempts (doubles each retry).
const RETRY_BASE_DELAY_MS: u64 = 500;

/// MySQL database client.
#[derive(Debug)]
pub struct MySqlClient {
    pool: MySqlPool,
}

impl MySqlClient {
    /// Creates a new MySqlClient from an existing connection pool.
    ///
    /// This is primarily useful for testing.
    pub fn from_pool(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Connects to the server with a pool of `max_connections` connections.
    ///
    /// Opening the pool establishes one connection, which doubles as an
    /// access check. Transient failures are retried with exponential backoff.
    pub async fn connect(config: &ConnectionConfig, max_connections: u32) -> Result<Self> {
        let options = connect_options(config);

        let mut last_error = None;
        let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);

        for attempt in 1..=MAX_RETRY_ATTEMPTS {
            debug!("Connection attempt {} of {}", attempt, MAX_RETRY_ATTEMPTS);

            let result = MySqlPoolOptions::new()
                .max_connections(max_connections)
                .acquire_timeout(Duration::from_secs(10))
                .connect_with(options.clone())
                .await;

            match result {
                Ok(pool) => {
                    debug!(max_connections, "Successfully connected to database");
                    return Ok(Self { pool });
                }
                Err(e) => {
                    let is_transient = is_transient_error(&e);
                    last_error = Some(e);

                    if attempt < MAX_RETRY_ATTEMPTS && is_transient {
                        warn!(
                            "Connection attempt {} failed (transient error), retrying in {:?}",
                            attempt, delay
                        );
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                    } else {
                        break;
                    }
                }
            }
        }

        Err(match last_error {
            Some(e) => map_connection_error(e, config),
            None => ReplayError::internal("no connection attempt was made"),
        })
    }
}

#[async_trait]
impl DatabaseClient for MySqlClient {
    async fn execute(&self, sql: &str) -> Result<()> {
        // Text protocol: the submission may carry several statements.
        sqlx::raw_sql(sql)
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| ReplayError::execution(format_execution_error(e)))
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

/// Builds sqlx connect options from a connection config.
///
/// Passing the fields individually avoids escaping passwords into a URL.
fn connect_options(config: &ConnectionConfig) -> MySqlConnectOptions {
    let mut options = MySqlConnectOptions::new()
        .host(config.host.as_deref().unwrap_or(crate::config::DEFAULT_HOST))
        .port(config.port);

    if let Some(user) = &config.user {
        options = options.username(user);
    }
    if let Some(password) = &config.password {
        options = options.password(password);
    }
    if let Some(database) = &config.database {
        options = options.database(database);
    }

    options
}

/// Checks if a connection error is transient and worth retrying.
fn is_transient_error(error: &sqlx::Error) -> bool {
    if matches!(error, sqlx::Error::PoolTimedOut | sqlx::Error::Io(_)) {
        return true;
    }

    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused")
        || error_str.contains("timed out")
        || error_str.contains("too many connections")
        || error_str.contains("connection reset")
        || error_str.contains("broken pipe")
    {
        return true;
    }

    false
}

/// Maps sqlx connection errors to user-friendly messages.
fn map_connection_error(error: sqlx::Error, config: &ConnectionConfig) -> ReplayError {
    let host = config.host.as_deref().unwrap_or(crate::config::DEFAULT_HOST);
    let port = config.port;
    let user = config.user.as_deref().unwrap_or("unknown");
    let database = config.database.as_deref().unwrap_or("unknown");

    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") {
        ReplayError::connection(format!(
            "Cannot connect to {host}:{port}. Check that the server is running."
        ))
    } else if error_str.contains("access denied") {
        ReplayError::connection(format!(
            "Access denied for user '{user}'. Check your credentials."
        ))
    } else if error_str.contains("unknown database") {
        ReplayError::connection(format!("Database '{database}' does not exist."))
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        ReplayError::connection(format!(
            "Connection to {host}:{port} timed out. The server may be overloaded or unreachable."
        ))
    } else {
        ReplayError::connection(error.to_string())
    }
}

/// Formats an execution error with the MySQL error number and SQLSTATE if available.
fn format_execution_error(error: sqlx::Error) -> String {
    if let Some(db_error) = error.as_database_error() {
        if let Some(mysql_error) = db_error.try_downcast_ref::<MySqlDatabaseError>() {
            return match mysql_error.code() {
                Some(state) => format!(
                    "{} ({}): {}",
                    mysql_error.number(),
                    state,
                    mysql_error.message()
                ),
                None => format!("{}: {}", mysql_error.number(), mysql_error.message()),
            };
        }
        return db_error.message().to_string();
    }

    error.to_string()
}
