//! Service layer for harvestgrid
//!
//! Services sit between the HTTP handlers and the repositories. Each one
//! wraps database operations with:
//! - Membership checks for the acting user
//! - Input validation
//! - Status transition rules
//! - Transaction boundaries
//! - Event emission
//!
//! ## Architecture
//!
//! ```text
//! HTTP Handlers (thin)
//!     ↓
//! Service Layer (business logic)
//!     ↓
//! Repository Layer (db/*.rs)
//!     ↓
//! SQLite Database
//! ```

pub mod commitment_service;
pub mod dashboard_service;
pub mod delivery_service;
pub mod demand_service;
pub mod events;
pub mod message_service;
pub mod organization_service;
pub mod product_service;
pub mod response;
pub mod validation;

pub use commitment_service::CommitmentService;
pub use dashboard_service::DashboardService;
pub use delivery_service::{CompleteDeliveryInput, DeliveryService, ScheduleDeliveryInput};
pub use demand_service::DemandService;
pub use events::{EventBus, EventListener, MarketEvent};
pub use message_service::MessageService;
pub use organization_service::OrganizationService;
pub use product_service::ProductService;

use std::sync::Arc;

use crate::db::MarketDb;
use crate::error::MarketError;

/// Service container for dependency injection
///
/// Holds all services over one shared database and event bus.
pub struct Services {
    pub organizations: Arc<OrganizationService>,
    pub products: Arc<ProductService>,
    pub demand: Arc<DemandService>,
    pub commitments: Arc<CommitmentService>,
    pub deliveries: Arc<DeliveryService>,
    pub messages: Arc<MessageService>,
    pub dashboard: Arc<DashboardService>,
    pub events: Arc<EventBus>,
    db: Arc<MarketDb>,
}

impl Services {
    pub fn new(db: Arc<MarketDb>) -> Self {
        let events = Arc::new(EventBus::new());

        Self {
            organizations: Arc::new(OrganizationService::new(db.clone(), events.clone())),
            products: Arc::new(ProductService::new(db.clone(), events.clone())),
            demand: Arc::new(DemandService::new(db.clone(), events.clone())),
            commitments: Arc::new(CommitmentService::new(db.clone(), events.clone())),
            deliveries: Arc::new(DeliveryService::new(db.clone(), events.clone())),
            messages: Arc::new(MessageService::new(db.clone(), events.clone())),
            dashboard: Arc::new(DashboardService::new(db.clone())),
            events,
            db,
        }
    }

    /// Services over a fresh in-memory database
    pub fn open_in_memory() -> Result<Self, MarketError> {
        Ok(Self::new(Arc::new(MarketDb::open_in_memory()?)))
    }

    pub fn db(&self) -> &Arc<MarketDb> {
        &self.db
    }
}
