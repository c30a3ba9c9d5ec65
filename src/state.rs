use std::sync::Arc;

use crate::config::AppConfig;
use crate::metrics::Metrics;

/// The shared application state.
///
/// Holds everything handlers and middleware need across requests. Cloneable
/// for use with Axum's request extraction system; all members are cheap to
/// clone (pool handle, Arcs, atomics).
#[derive(Clone)]
pub struct AppState {
    /// The database connection pool.
    ///
    /// Provides connections to the SQLite database holding users, tokens,
    /// books, copies, borrows and reviews.
    pub db: sqlx::SqlitePool,
    /// The application configuration.
    ///
    /// Contains server settings, database configuration and auth parameters
    /// (bcrypt cost, password policy).
    pub config: Arc<AppConfig>,
    /// The application metrics.
    ///
    /// Tracks counters for registrations, logins, borrows and reviews.
    pub metrics: Metrics,
}

impl AppState {
    /// Creates a new `AppState` with a database pool and configuration.
    pub fn new(db: sqlx::SqlitePool, config: AppConfig) -> Self {
        Self { db, config: Arc::new(config), metrics: Metrics::new() }
    }
}
