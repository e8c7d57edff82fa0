//! HarvestGrid - a marketplace connecting farms with restaurants
//!
//! Farms list products and surplus, restaurants post demand requests, farms
//! answer with offers, and accepted offers become standing orders
//! (commitments) with scheduled deliveries. Every organization carries a
//! reliability score derived from its commitment and delivery history.
//!
//! ## Layers
//!
//! ```text
//! http.rs       JSON routes, X-User-Id authentication
//! views.rs      camelCase API types (ts-rs exported)
//! services/     authorization, validation, transitions, events
//! db/           diesel repositories over SQLite
//! ```
//!
//! ## Storage Layout
//!
//! ```text
//! ~/.local/share/harvestgrid/
//! ├── harvestgrid.db     # SQLite database
//! └── config.toml        # Configuration
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod reliability;
pub mod services;
pub mod views;

pub use config::Config;
pub use db::{MarketDb, UserContext};
pub use error::MarketError;
pub use http::HttpServer;
pub use reliability::{ReliabilityStats, ReliabilityTier};
pub use services::{EventBus, MarketEvent, Services};
