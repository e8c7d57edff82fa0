//! Demand requests and supply offers using Diesel
//!
//! Restaurants post demand requests; farms answer them with offers. The
//! request owner accepts or rejects each offer once.

use diesel::prelude::*;
use serde::Deserialize;

use super::context::UserContext;
use super::diesel_schema::{demand_offers, demand_requests};
use super::models::{
    current_timestamp, offer_statuses, request_statuses, DemandOffer, DemandRequest,
    DemandRequestWithOrganization, NewDemandOffer, NewDemandRequest, OfferWithFarm,
};
use super::{new_id, organizations, reliability};
use crate::error::MarketError;

// ============================================================================
// Input Types
// ============================================================================

/// Input for posting a demand request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDemandRequestInput {
    pub organization_id: String,
    pub product_name: String,
    pub category: String,
    pub quantity: f64,
    pub unit: String,
    #[serde(default)]
    pub description: Option<String>,
    pub frequency: String,
    pub start_date: String,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default = "default_radius")]
    pub preferred_radius_miles: i32,
}

fn default_radius() -> i32 {
    50
}

/// Input for offering supply against a demand request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOfferInput {
    pub farm_organization_id: String,
    pub offered_quantity: f64,
    pub offered_price: f64,
    #[serde(default)]
    pub message: Option<String>,
}

// ============================================================================
// Demand Requests
// ============================================================================

pub fn get_request(
    conn: &mut SqliteConnection,
    request_id: &str,
) -> Result<Option<DemandRequest>, MarketError> {
    demand_requests::table
        .filter(demand_requests::id.eq(request_id))
        .select(DemandRequest::as_select())
        .first(conn)
        .optional()
        .map_err(|e| MarketError::Internal(format!("Query failed: {}", e)))
}

/// Open requests, newest first
pub fn list_active(conn: &mut SqliteConnection) -> Result<Vec<DemandRequest>, MarketError> {
    demand_requests::table
        .filter(demand_requests::status.eq(request_statuses::ACTIVE))
        .order((demand_requests::created_at.desc(), demand_requests::id.asc()))
        .select(DemandRequest::as_select())
        .load(conn)
        .map_err(|e| MarketError::Internal(format!("Query failed: {}", e)))
}

pub fn count_active(conn: &mut SqliteConnection) -> Result<i64, MarketError> {
    demand_requests::table
        .filter(demand_requests::status.eq(request_statuses::ACTIVE))
        .count()
        .get_result(conn)
        .map_err(|e| MarketError::Internal(format!("Query failed: {}", e)))
}

/// Attach the requesting restaurant and its reliability row
pub fn with_organizations(
    conn: &mut SqliteConnection,
    rows: Vec<DemandRequest>,
) -> Result<Vec<DemandRequestWithOrganization>, MarketError> {
    let ids: Vec<&str> = rows.iter().map(|r| r.organization_id.as_str()).collect();
    let orgs = organizations::get_organizations_by_ids(conn, &ids)?;
    let scores = reliability::get_many(conn, &ids)?;

    Ok(rows
        .into_iter()
        .map(|request| DemandRequestWithOrganization {
            organization: orgs.get(&request.organization_id).cloned(),
            reliability: scores.get(&request.organization_id).cloned(),
            request,
        })
        .collect())
}

pub fn create_request(
    conn: &mut SqliteConnection,
    ctx: &UserContext,
    input: &CreateDemandRequestInput,
) -> Result<DemandRequest, MarketError> {
    let id = new_id();
    let now = current_timestamp();

    let new_request = NewDemandRequest {
        id: &id,
        organization_id: &input.organization_id,
        product_name: input.product_name.trim(),
        category: &input.category,
        quantity: input.quantity,
        unit: input.unit.trim(),
        description: input.description.as_deref(),
        frequency: &input.frequency,
        start_date: &input.start_date,
        end_date: input.end_date.as_deref(),
        preferred_radius_miles: input.preferred_radius_miles,
        status: request_statuses::ACTIVE,
        created_by: &ctx.user_id,
        created_at: &now,
        updated_at: &now,
    };

    diesel::insert_into(demand_requests::table)
        .values(&new_request)
        .execute(conn)?;

    get_request(conn, &id)?
        .ok_or_else(|| MarketError::Internal("Failed to retrieve created demand request".into()))
}

pub fn set_request_status(
    conn: &mut SqliteConnection,
    request_id: &str,
    status: &str,
) -> Result<DemandRequest, MarketError> {
    diesel::update(demand_requests::table.filter(demand_requests::id.eq(request_id)))
        .set((
            demand_requests::status.eq(status),
            demand_requests::updated_at.eq(current_timestamp()),
        ))
        .execute(conn)?;

    get_request(conn, request_id)?
        .ok_or_else(|| MarketError::NotFound(format!("Demand request {}", request_id)))
}

// ============================================================================
// Offers
// ============================================================================

pub fn get_offer(
    conn: &mut SqliteConnection,
    offer_id: &str,
) -> Result<Option<DemandOffer>, MarketError> {
    demand_offers::table
        .filter(demand_offers::id.eq(offer_id))
        .select(DemandOffer::as_select())
        .first(conn)
        .optional()
        .map_err(|e| MarketError::Internal(format!("Query failed: {}", e)))
}

/// Offers made against a request, newest first, with the farm attached
pub fn list_offers_for_request(
    conn: &mut SqliteConnection,
    request_id: &str,
) -> Result<Vec<OfferWithFarm>, MarketError> {
    let offers: Vec<DemandOffer> = demand_offers::table
        .filter(demand_offers::demand_request_id.eq(request_id))
        .order((demand_offers::created_at.desc(), demand_offers::id.asc()))
        .select(DemandOffer::as_select())
        .load(conn)
        .map_err(|e| MarketError::Internal(format!("Query failed: {}", e)))?;

    let farm_ids: Vec<&str> = offers.iter().map(|o| o.farm_organization_id.as_str()).collect();
    let farms = organizations::get_organizations_by_ids(conn, &farm_ids)?;
    let scores = reliability::get_many(conn, &farm_ids)?;

    Ok(offers
        .into_iter()
        .map(|offer| OfferWithFarm {
            farm: farms.get(&offer.farm_organization_id).cloned(),
            reliability: scores.get(&offer.farm_organization_id).cloned(),
            offer,
        })
        .collect())
}

pub fn create_offer(
    conn: &mut SqliteConnection,
    ctx: &UserContext,
    request_id: &str,
    input: &CreateOfferInput,
) -> Result<DemandOffer, MarketError> {
    let id = new_id();
    let now = current_timestamp();

    diesel::insert_into(demand_offers::table)
        .values(&NewDemandOffer {
            id: &id,
            demand_request_id: request_id,
            farm_organization_id: &input.farm_organization_id,
            offered_quantity: input.offered_quantity,
            offered_price: input.offered_price,
            message: input.message.as_deref(),
            status: offer_statuses::PENDING,
            created_by: &ctx.user_id,
            created_at: &now,
            updated_at: &now,
        })
        .execute(conn)?;

    get_offer(conn, &id)?
        .ok_or_else(|| MarketError::Internal("Failed to retrieve created offer".into()))
}

/// Move an offer out of `pending`; returns None when it was already decided
pub fn decide_offer(
    conn: &mut SqliteConnection,
    offer_id: &str,
    status: &str,
) -> Result<Option<DemandOffer>, MarketError> {
    let updated = diesel::update(
        demand_offers::table
            .filter(demand_offers::id.eq(offer_id))
            .filter(demand_offers::status.eq(offer_statuses::PENDING)),
    )
    .set((
        demand_offers::status.eq(status),
        demand_offers::updated_at.eq(current_timestamp()),
    ))
    .execute(conn)?;

    if updated == 0 {
        return Ok(None);
    }
    get_offer(conn, offer_id)
}
