//! Standing order (commitment) operations using Diesel

use diesel::prelude::*;

use super::context::UserContext;
use super::diesel_schema::commitments;
use super::models::{
    commitment_statuses, current_timestamp, Commitment, CommitmentWithParties, DemandOffer,
    DemandRequest, NewCommitment,
};
use super::{new_id, organizations};
use crate::error::MarketError;

pub fn get_commitment(
    conn: &mut SqliteConnection,
    commitment_id: &str,
) -> Result<Option<Commitment>, MarketError> {
    commitments::table
        .filter(commitments::id.eq(commitment_id))
        .select(Commitment::as_select())
        .first(conn)
        .optional()
        .map_err(|e| MarketError::Internal(format!("Query failed: {}", e)))
}

pub fn get_by_offer(
    conn: &mut SqliteConnection,
    offer_id: &str,
) -> Result<Option<Commitment>, MarketError> {
    commitments::table
        .filter(commitments::demand_offer_id.eq(offer_id))
        .select(Commitment::as_select())
        .first(conn)
        .optional()
        .map_err(|e| MarketError::Internal(format!("Query failed: {}", e)))
}

/// Commitments where either party is one of `org_ids`, soonest delivery
/// first and undated ones last
pub fn list_for_organizations(
    conn: &mut SqliteConnection,
    org_ids: &[String],
) -> Result<Vec<Commitment>, MarketError> {
    if org_ids.is_empty() {
        return Ok(Vec::new());
    }

    commitments::table
        .filter(
            commitments::restaurant_organization_id
                .eq_any(org_ids)
                .or(commitments::farm_organization_id.eq_any(org_ids)),
        )
        .order((
            commitments::next_delivery_date.is_null().asc(),
            commitments::next_delivery_date.asc(),
            commitments::created_at.desc(),
        ))
        .select(Commitment::as_select())
        .load(conn)
        .map_err(|e| MarketError::Internal(format!("Query failed: {}", e)))
}

pub fn count_active_for_organizations(
    conn: &mut SqliteConnection,
    org_ids: &[String],
) -> Result<i64, MarketError> {
    if org_ids.is_empty() {
        return Ok(0);
    }

    commitments::table
        .filter(commitments::status.eq(commitment_statuses::ACTIVE))
        .filter(
            commitments::restaurant_organization_id
                .eq_any(org_ids)
                .or(commitments::farm_organization_id.eq_any(org_ids)),
        )
        .count()
        .get_result(conn)
        .map_err(|e| MarketError::Internal(format!("Query failed: {}", e)))
}

/// Attach both party organizations
pub fn with_parties(
    conn: &mut SqliteConnection,
    rows: Vec<Commitment>,
) -> Result<Vec<CommitmentWithParties>, MarketError> {
    let ids: Vec<&str> = rows.iter().flat_map(|c| c.parties()).collect();
    let orgs = organizations::get_organizations_by_ids(conn, &ids)?;

    Ok(rows
        .into_iter()
        .map(|commitment| CommitmentWithParties {
            restaurant: orgs.get(&commitment.restaurant_organization_id).cloned(),
            farm: orgs.get(&commitment.farm_organization_id).cloned(),
            commitment,
        })
        .collect())
}

/// Insert a commitment built from a request and its accepted offer
pub fn create_from_offer(
    conn: &mut SqliteConnection,
    ctx: &UserContext,
    request: &DemandRequest,
    offer: &DemandOffer,
) -> Result<Commitment, MarketError> {
    let id = new_id();
    let now = current_timestamp();

    diesel::insert_into(commitments::table)
        .values(&NewCommitment {
            id: &id,
            demand_request_id: Some(&request.id),
            demand_offer_id: Some(&offer.id),
            restaurant_organization_id: &request.organization_id,
            farm_organization_id: &offer.farm_organization_id,
            product_name: &request.product_name,
            quantity: offer.offered_quantity,
            unit: &request.unit,
            price: offer.offered_price,
            frequency: &request.frequency,
            start_date: &request.start_date,
            end_date: request.end_date.as_deref(),
            next_delivery_date: Some(&request.start_date),
            status: commitment_statuses::ACTIVE,
            created_by: &ctx.user_id,
            created_at: &now,
            updated_at: &now,
        })
        .execute(conn)?;

    get_commitment(conn, &id)?
        .ok_or_else(|| MarketError::Internal("Failed to retrieve created commitment".into()))
}

pub fn set_status(
    conn: &mut SqliteConnection,
    commitment_id: &str,
    status: &str,
) -> Result<(), MarketError> {
    diesel::update(commitments::table.filter(commitments::id.eq(commitment_id)))
        .set((
            commitments::status.eq(status),
            commitments::updated_at.eq(current_timestamp()),
        ))
        .execute(conn)?;
    Ok(())
}
