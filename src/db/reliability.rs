//! Reliability aggregates per organization
//!
//! The `organization_reliability` table is a cache: every row can be rebuilt
//! from commitments and deliveries with [`recompute`].

use std::collections::{HashMap, HashSet};

use diesel::prelude::*;

use super::diesel_schema::{commitment_deliveries, commitments, organization_reliability};
use super::models::{
    commitment_statuses, current_timestamp, delivery_statuses, CommitmentDelivery,
    OrganizationReliability,
};
use crate::error::MarketError;

pub fn get(
    conn: &mut SqliteConnection,
    org_id: &str,
) -> Result<Option<OrganizationReliability>, MarketError> {
    organization_reliability::table
        .filter(organization_reliability::organization_id.eq(org_id))
        .select(OrganizationReliability::as_select())
        .first(conn)
        .optional()
        .map_err(|e| MarketError::Internal(format!("Query failed: {}", e)))
}

pub fn get_many(
    conn: &mut SqliteConnection,
    org_ids: &[&str],
) -> Result<HashMap<String, OrganizationReliability>, MarketError> {
    if org_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<OrganizationReliability> = organization_reliability::table
        .filter(organization_reliability::organization_id.eq_any(org_ids))
        .select(OrganizationReliability::as_select())
        .load(conn)
        .map_err(|e| MarketError::Internal(format!("Query failed: {}", e)))?;

    Ok(rows
        .into_iter()
        .map(|r| (r.organization_id.clone(), r))
        .collect())
}

/// Aggregate the organization's commitment and delivery history
pub fn compute(
    conn: &mut SqliteConnection,
    org_id: &str,
) -> Result<OrganizationReliability, MarketError> {
    let rows: Vec<(String, String, String, String)> = commitments::table
        .filter(
            commitments::restaurant_organization_id
                .eq(org_id)
                .or(commitments::farm_organization_id.eq(org_id)),
        )
        .select((
            commitments::id,
            commitments::restaurant_organization_id,
            commitments::farm_organization_id,
            commitments::status,
        ))
        .load(conn)
        .map_err(|e| MarketError::Internal(format!("Commitments query failed: {}", e)))?;

    let completed = rows
        .iter()
        .filter(|(_, _, _, status)| status == commitment_statuses::COMPLETED)
        .count();

    let partners: HashSet<&str> = rows
        .iter()
        .filter(|(_, _, _, status)| status == commitment_statuses::ACTIVE)
        .map(|(_, restaurant, farm, _)| {
            if farm == org_id {
                restaurant.as_str()
            } else {
                farm.as_str()
            }
        })
        .collect();

    let commitment_ids: Vec<&str> = rows.iter().map(|(id, ..)| id.as_str()).collect();
    let resolved: Vec<CommitmentDelivery> = if commitment_ids.is_empty() {
        Vec::new()
    } else {
        commitment_deliveries::table
            .filter(commitment_deliveries::commitment_id.eq_any(&commitment_ids))
            .filter(commitment_deliveries::status.eq_any(delivery_statuses::RESOLVED))
            .select(CommitmentDelivery::as_select())
            .load(conn)
            .map_err(|e| MarketError::Internal(format!("Deliveries query failed: {}", e)))?
    };

    let on_time = resolved.iter().filter(|d| d.is_on_time()).count();

    Ok(OrganizationReliability {
        organization_id: org_id.to_string(),
        total_commitments: rows.len() as i32,
        completed_commitments: completed as i32,
        on_time_deliveries: on_time as i32,
        total_deliveries: resolved.len() as i32,
        active_partnerships: partners.len() as i32,
        updated_at: current_timestamp(),
    })
}

/// Rebuild and store the organization's reliability row
pub fn recompute(
    conn: &mut SqliteConnection,
    org_id: &str,
) -> Result<OrganizationReliability, MarketError> {
    let row = compute(conn, org_id)?;

    diesel::insert_into(organization_reliability::table)
        .values(&row)
        .on_conflict(organization_reliability::organization_id)
        .do_update()
        .set((
            organization_reliability::total_commitments.eq(row.total_commitments),
            organization_reliability::completed_commitments.eq(row.completed_commitments),
            organization_reliability::on_time_deliveries.eq(row.on_time_deliveries),
            organization_reliability::total_deliveries.eq(row.total_deliveries),
            organization_reliability::active_partnerships.eq(row.active_partnerships),
            organization_reliability::updated_at.eq(&row.updated_at),
        ))
        .execute(conn)?;

    Ok(row)
}
