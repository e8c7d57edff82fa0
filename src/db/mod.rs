//! SQLite database module for the marketplace
//!
//! ## Tables
//!
//! - `profiles`, `organizations`, `organization_members` - who is who
//! - `products` - listings, including surplus listings
//! - `demand_requests`, `demand_offers` - the demand board
//! - `commitments`, `commitment_deliveries` - standing orders
//! - `messages` - organization to organization messaging
//! - `organization_reliability` - cached reliability aggregates
//!
//! Repository functions take `&mut SqliteConnection` so services can compose
//! them inside one transaction.

pub mod context;
pub mod diesel_schema;
pub mod models;
pub mod schema;

pub mod commitments;
pub mod deliveries;
pub mod demand;
pub mod messages;
pub mod organizations;
pub mod products;
pub mod profiles;
pub mod reliability;

use std::path::Path;
use std::time::Duration;

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool};
use tracing::{debug, info};

use crate::error::MarketError;

pub use context::UserContext;

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;

/// Applied to every pooled connection
#[derive(Debug, Clone, Copy)]
struct ConnectionOptions {
    busy_timeout: Duration,
    wal: bool,
}

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        let mut pragmas = format!(
            "PRAGMA foreign_keys = ON; PRAGMA busy_timeout = {};",
            self.busy_timeout.as_millis()
        );
        if self.wal {
            pragmas.push_str(" PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;");
        }
        conn.batch_execute(&pragmas)
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Pooled SQLite database
pub struct MarketDb {
    pool: DbPool,
}

impl MarketDb {
    /// Open or create the database file
    pub fn open(db_path: &Path, pool_size: u32) -> Result<Self, MarketError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        info!("Opening SQLite database at {:?}", db_path);

        let manager = ConnectionManager::<SqliteConnection>::new(db_path.to_string_lossy());
        let pool = Pool::builder()
            .max_size(pool_size)
            .connection_customizer(Box::new(ConnectionOptions {
                busy_timeout: Duration::from_secs(5),
                wal: true,
            }))
            .build(manager)?;

        let db = Self { pool };
        db.init_schema()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    ///
    /// A single connection that never expires, since each new in-memory
    /// connection would see an empty database.
    pub fn open_in_memory() -> Result<Self, MarketError> {
        debug!("Opening in-memory SQLite database");

        let manager = ConnectionManager::<SqliteConnection>::new(":memory:");
        let pool = Pool::builder()
            .max_size(1)
            .max_lifetime(None)
            .idle_timeout(None)
            .connection_customizer(Box::new(ConnectionOptions {
                busy_timeout: Duration::from_secs(5),
                wal: false,
            }))
            .build(manager)?;

        let db = Self { pool };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<(), MarketError> {
        self.with_conn(schema::init_schema)
    }

    /// The underlying pool
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Run `f` with a pooled connection
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, MarketError>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T, MarketError>,
    {
        let mut conn = self.pool.get()?;
        f(&mut *conn)
    }

    /// Run `f` inside a transaction; any error rolls it back
    pub fn transaction<F, T>(&self, f: F) -> Result<T, MarketError>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T, MarketError>,
    {
        self.with_conn(|conn| conn.transaction::<T, MarketError, _>(f))
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats, MarketError> {
        use diesel_schema as t;

        fn count(r: QueryResult<i64>) -> Result<u64, MarketError> {
            r.map(|n| n as u64).map_err(MarketError::from)
        }

        self.with_conn(|conn| {
            Ok(DbStats {
                organizations: count(t::organizations::table.count().get_result(conn))?,
                products: count(t::products::table.count().get_result(conn))?,
                demand_requests: count(t::demand_requests::table.count().get_result(conn))?,
                offers: count(t::demand_offers::table.count().get_result(conn))?,
                commitments: count(t::commitments::table.count().get_result(conn))?,
                deliveries: count(t::commitment_deliveries::table.count().get_result(conn))?,
                messages: count(t::messages::table.count().get_result(conn))?,
            })
        })
    }
}

/// Database statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct DbStats {
    pub organizations: u64,
    pub products: u64,
    pub demand_requests: u64,
    pub offers: u64,
    pub commitments: u64,
    pub deliveries: u64,
    pub messages: u64,
}

/// New random row id
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory_has_empty_tables() {
        let db = MarketDb::open_in_memory().unwrap();
        let stats = db.stats().unwrap();
        assert_eq!(stats.organizations, 0);
        assert_eq!(stats.commitments, 0);
    }

    #[test]
    fn test_open_file_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("market.db");
        let db = MarketDb::open(&path, 2).unwrap();
        assert!(path.exists());
        assert_eq!(db.stats().unwrap().messages, 0);

        // Reopening an initialized database keeps its schema
        drop(db);
        let db = MarketDb::open(&path, 2).unwrap();
        assert_eq!(db.stats().unwrap().products, 0);
    }

    #[test]
    fn test_foreign_keys_enforced() {
        let db = MarketDb::open_in_memory().unwrap();
        let result = db.with_conn(|conn| {
            diesel::sql_query(
                "INSERT INTO products (id, organization_id, name, category, price, quantity, unit, created_by, created_at, updated_at) \
                 VALUES ('p1', 'missing-org', 'Kale', 'produce', 1.0, 1.0, 'lb', 'u1', 'now', 'now')",
            )
            .execute(conn)
            .map_err(MarketError::from)
        });
        assert!(result.is_err());
    }
}
