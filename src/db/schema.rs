//! Database schema definitions

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sql_types::Integer;
use tracing::info;

use crate::error::MarketError;

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

#[derive(QueryableByName)]
struct VersionRow {
    #[diesel(sql_type = Integer)]
    version: i32,
}

/// Initialize the database schema
pub fn init_schema(conn: &mut SqliteConnection) -> Result<(), MarketError> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Creating new database schema v{}", SCHEMA_VERSION);
        create_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!("Migrating schema from v{} to v{}", current_version, SCHEMA_VERSION);
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else {
        info!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get current schema version (0 if not initialized)
fn get_schema_version(conn: &mut SqliteConnection) -> Result<i32, MarketError> {
    conn.batch_execute("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
        .map_err(|e| MarketError::Internal(format!("Failed to create schema_version table: {}", e)))?;

    let row = diesel::sql_query("SELECT version FROM schema_version LIMIT 1")
        .get_result::<VersionRow>(conn)
        .optional()
        .map_err(|e| MarketError::Internal(format!("Failed to read schema_version: {}", e)))?;

    Ok(row.map(|r| r.version).unwrap_or(0))
}

/// Set schema version
fn set_schema_version(conn: &mut SqliteConnection, version: i32) -> Result<(), MarketError> {
    diesel::sql_query("DELETE FROM schema_version")
        .execute(conn)
        .map_err(|e| MarketError::Internal(format!("Failed to clear schema_version: {}", e)))?;
    diesel::sql_query("INSERT INTO schema_version (version) VALUES (?)")
        .bind::<Integer, _>(version)
        .execute(conn)
        .map_err(|e| MarketError::Internal(format!("Failed to set schema_version: {}", e)))?;
    Ok(())
}

/// Create all tables
fn create_tables(conn: &mut SqliteConnection) -> Result<(), MarketError> {
    conn.batch_execute(ORGANIZATIONS_SCHEMA)
        .map_err(|e| MarketError::Internal(format!("Failed to create organization tables: {}", e)))?;

    conn.batch_execute(MARKETPLACE_SCHEMA)
        .map_err(|e| MarketError::Internal(format!("Failed to create marketplace tables: {}", e)))?;

    conn.batch_execute(COMMITMENTS_SCHEMA)
        .map_err(|e| MarketError::Internal(format!("Failed to create commitment tables: {}", e)))?;

    conn.batch_execute(INDEXES_SCHEMA)
        .map_err(|e| MarketError::Internal(format!("Failed to create indexes: {}", e)))?;

    Ok(())
}

/// Profiles, organizations and memberships
const ORGANIZATIONS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS profiles (
    id TEXT PRIMARY KEY NOT NULL,
    email TEXT,
    user_type TEXT NOT NULL CHECK (user_type IN ('farm', 'restaurant')),
    display_name TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS organizations (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    org_type TEXT NOT NULL CHECK (org_type IN ('farm', 'restaurant')),
    description TEXT,
    location TEXT,

    -- Logistics (delivery days stored as a JSON array of weekday names)
    delivery_days_json TEXT,
    pickup_available INTEGER NOT NULL DEFAULT 0,
    delivery_notes TEXT,

    created_by TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS organization_members (
    organization_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    role TEXT NOT NULL DEFAULT 'member',
    created_at TEXT NOT NULL,
    PRIMARY KEY (organization_id, user_id),
    FOREIGN KEY (organization_id) REFERENCES organizations(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS organization_reliability (
    organization_id TEXT PRIMARY KEY NOT NULL,
    total_commitments INTEGER NOT NULL DEFAULT 0,
    completed_commitments INTEGER NOT NULL DEFAULT 0,
    on_time_deliveries INTEGER NOT NULL DEFAULT 0,
    total_deliveries INTEGER NOT NULL DEFAULT 0,
    active_partnerships INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL,
    FOREIGN KEY (organization_id) REFERENCES organizations(id) ON DELETE CASCADE
);
"#;

/// Listings, demand board and messaging
const MARKETPLACE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS products (
    id TEXT PRIMARY KEY NOT NULL,
    organization_id TEXT NOT NULL,
    name TEXT NOT NULL,
    description TEXT,
    category TEXT NOT NULL CHECK (category IN ('produce', 'meat', 'dairy', 'other')),
    price REAL NOT NULL CHECK (price >= 0),
    quantity REAL NOT NULL CHECK (quantity >= 0),
    unit TEXT NOT NULL,
    location TEXT,
    image_url TEXT,
    available INTEGER NOT NULL DEFAULT 1,

    -- Surplus listing (discounted excess or imperfect inventory)
    is_surplus INTEGER NOT NULL DEFAULT 0,
    surplus_reason TEXT CHECK (surplus_reason IS NULL OR surplus_reason IN ('excess', 'imperfect', 'urgent')),
    discount_percentage INTEGER CHECK (discount_percentage IS NULL OR (discount_percentage BETWEEN 0 AND 100)),

    created_by TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    FOREIGN KEY (organization_id) REFERENCES organizations(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS demand_requests (
    id TEXT PRIMARY KEY NOT NULL,
    organization_id TEXT NOT NULL,
    product_name TEXT NOT NULL,
    category TEXT NOT NULL,
    quantity REAL NOT NULL CHECK (quantity > 0),
    unit TEXT NOT NULL,
    description TEXT,
    frequency TEXT NOT NULL,
    start_date TEXT NOT NULL,
    end_date TEXT,
    preferred_radius_miles INTEGER NOT NULL DEFAULT 50,
    status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'fulfilled', 'cancelled')),
    created_by TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    FOREIGN KEY (organization_id) REFERENCES organizations(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS demand_offers (
    id TEXT PRIMARY KEY NOT NULL,
    demand_request_id TEXT NOT NULL,
    farm_organization_id TEXT NOT NULL,
    offered_quantity REAL NOT NULL CHECK (offered_quantity > 0),
    offered_price REAL NOT NULL CHECK (offered_price >= 0),
    message TEXT,
    status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'accepted', 'rejected')),
    created_by TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    FOREIGN KEY (demand_request_id) REFERENCES demand_requests(id) ON DELETE CASCADE,
    FOREIGN KEY (farm_organization_id) REFERENCES organizations(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS messages (
    id TEXT PRIMARY KEY NOT NULL,
    from_organization_id TEXT NOT NULL,
    to_organization_id TEXT NOT NULL,
    product_id TEXT,
    subject TEXT NOT NULL,
    message TEXT NOT NULL,
    sender_id TEXT NOT NULL,
    is_read INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    FOREIGN KEY (from_organization_id) REFERENCES organizations(id) ON DELETE CASCADE,
    FOREIGN KEY (to_organization_id) REFERENCES organizations(id) ON DELETE CASCADE,
    FOREIGN KEY (product_id) REFERENCES products(id) ON DELETE SET NULL
);
"#;

/// Standing orders and their delivery schedule
const COMMITMENTS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS commitments (
    id TEXT PRIMARY KEY NOT NULL,
    demand_request_id TEXT,
    demand_offer_id TEXT UNIQUE,
    restaurant_organization_id TEXT NOT NULL,
    farm_organization_id TEXT NOT NULL,
    product_name TEXT NOT NULL,
    quantity REAL NOT NULL CHECK (quantity > 0),
    unit TEXT NOT NULL,
    price REAL NOT NULL CHECK (price >= 0),
    frequency TEXT NOT NULL,
    start_date TEXT NOT NULL,
    end_date TEXT,
    next_delivery_date TEXT,
    status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'paused', 'cancelled', 'completed')),
    created_by TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    FOREIGN KEY (demand_request_id) REFERENCES demand_requests(id) ON DELETE SET NULL,
    FOREIGN KEY (demand_offer_id) REFERENCES demand_offers(id) ON DELETE SET NULL,
    FOREIGN KEY (restaurant_organization_id) REFERENCES organizations(id),
    FOREIGN KEY (farm_organization_id) REFERENCES organizations(id)
);

CREATE TABLE IF NOT EXISTS commitment_deliveries (
    id TEXT PRIMARY KEY NOT NULL,
    commitment_id TEXT NOT NULL,
    scheduled_date TEXT NOT NULL,
    completed_date TEXT,
    quantity_delivered REAL,
    status TEXT NOT NULL DEFAULT 'scheduled' CHECK (status IN ('scheduled', 'completed', 'missed', 'cancelled')),
    notes TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    FOREIGN KEY (commitment_id) REFERENCES commitments(id) ON DELETE CASCADE
);
"#;

/// Index definitions for the list queries
const INDEXES_SCHEMA: &str = r#"
CREATE INDEX IF NOT EXISTS idx_members_user ON organization_members(user_id);

CREATE INDEX IF NOT EXISTS idx_products_org ON products(organization_id);
CREATE INDEX IF NOT EXISTS idx_products_available ON products(available, created_at);
CREATE INDEX IF NOT EXISTS idx_products_surplus ON products(is_surplus, available);

CREATE INDEX IF NOT EXISTS idx_demand_status ON demand_requests(status, created_at);
CREATE INDEX IF NOT EXISTS idx_demand_org ON demand_requests(organization_id);
CREATE INDEX IF NOT EXISTS idx_offers_request ON demand_offers(demand_request_id);
CREATE INDEX IF NOT EXISTS idx_offers_farm ON demand_offers(farm_organization_id);

CREATE INDEX IF NOT EXISTS idx_commitments_restaurant ON commitments(restaurant_organization_id);
CREATE INDEX IF NOT EXISTS idx_commitments_farm ON commitments(farm_organization_id);
CREATE INDEX IF NOT EXISTS idx_commitments_next ON commitments(next_delivery_date);
CREATE INDEX IF NOT EXISTS idx_deliveries_commitment ON commitment_deliveries(commitment_id, scheduled_date);

CREATE INDEX IF NOT EXISTS idx_messages_from ON messages(from_organization_id);
CREATE INDEX IF NOT EXISTS idx_messages_to ON messages(to_organization_id);
"#;
