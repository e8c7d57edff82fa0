//! Organization and membership operations using Diesel
//!
//! Organizations are either farms or restaurants. The user who creates an
//! organization becomes its owner; membership is what every other module
//! checks before letting a user act on the organization's behalf.

use std::collections::HashMap;

use diesel::prelude::*;
use serde::Deserialize;

use super::context::UserContext;
use super::diesel_schema::{organization_members, organizations, profiles};
use super::models::{
    current_timestamp, member_roles, MemberWithProfile, NewOrganization, NewOrganizationMember,
    Organization, OrganizationMember, OrganizationWithMembers,
};
use super::new_id;
use crate::error::MarketError;

// ============================================================================
// Input Types
// ============================================================================

/// Input for creating an organization
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrganizationInput {
    pub name: String,
    #[serde(alias = "type")]
    pub org_type: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

/// Logistics settings as received from clients
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLogisticsInput {
    #[serde(default)]
    pub delivery_days: Vec<String>,
    #[serde(default)]
    pub pickup_available: bool,
    #[serde(default)]
    pub delivery_notes: Option<String>,
}

// ============================================================================
// Read Operations
// ============================================================================

pub fn get_organization(
    conn: &mut SqliteConnection,
    org_id: &str,
) -> Result<Option<Organization>, MarketError> {
    organizations::table
        .filter(organizations::id.eq(org_id))
        .select(Organization::as_select())
        .first(conn)
        .optional()
        .map_err(|e| MarketError::Internal(format!("Query failed: {}", e)))
}

/// Organization with members and their profile details
pub fn get_organization_with_members(
    conn: &mut SqliteConnection,
    org_id: &str,
) -> Result<Option<OrganizationWithMembers>, MarketError> {
    let Some(organization) = get_organization(conn, org_id)? else {
        return Ok(None);
    };

    let members: Vec<OrganizationMember> = organization_members::table
        .filter(organization_members::organization_id.eq(org_id))
        .order(organization_members::created_at.asc())
        .select(OrganizationMember::as_select())
        .load(conn)
        .map_err(|e| MarketError::Internal(format!("Members query failed: {}", e)))?;

    let user_ids: Vec<&str> = members.iter().map(|m| m.user_id.as_str()).collect();
    let profile_rows: Vec<(String, Option<String>, Option<String>)> = profiles::table
        .filter(profiles::id.eq_any(&user_ids))
        .select((profiles::id, profiles::email, profiles::display_name))
        .load(conn)
        .map_err(|e| MarketError::Internal(format!("Profiles query failed: {}", e)))?;

    let mut by_user: HashMap<String, (Option<String>, Option<String>)> = profile_rows
        .into_iter()
        .map(|(id, email, name)| (id, (email, name)))
        .collect();

    let members = members
        .into_iter()
        .map(|member| {
            let (email, display_name) = by_user.remove(&member.user_id).unwrap_or_default();
            MemberWithProfile {
                member,
                email,
                display_name,
            }
        })
        .collect();

    Ok(Some(OrganizationWithMembers {
        organization,
        members,
    }))
}

/// Organizations the user belongs to, by name
pub fn list_user_organizations(
    conn: &mut SqliteConnection,
    user_id: &str,
) -> Result<Vec<Organization>, MarketError> {
    organizations::table
        .inner_join(organization_members::table)
        .filter(organization_members::user_id.eq(user_id))
        .order(organizations::name.asc())
        .select(Organization::as_select())
        .load(conn)
        .map_err(|e| MarketError::Internal(format!("Query failed: {}", e)))
}

/// Ids of the organizations the user belongs to
pub fn user_organization_ids(
    conn: &mut SqliteConnection,
    user_id: &str,
) -> Result<Vec<String>, MarketError> {
    organization_members::table
        .filter(organization_members::user_id.eq(user_id))
        .select(organization_members::organization_id)
        .load(conn)
        .map_err(|e| MarketError::Internal(format!("Query failed: {}", e)))
}

pub fn is_member(
    conn: &mut SqliteConnection,
    user_id: &str,
    org_id: &str,
) -> Result<bool, MarketError> {
    let count: i64 = organization_members::table
        .filter(organization_members::user_id.eq(user_id))
        .filter(organization_members::organization_id.eq(org_id))
        .count()
        .get_result(conn)
        .map_err(|e| MarketError::Internal(format!("Query failed: {}", e)))?;
    Ok(count > 0)
}

/// Whether the user belongs to any organization of the given type
pub fn has_organization_of_type(
    conn: &mut SqliteConnection,
    user_id: &str,
    org_type: &str,
) -> Result<bool, MarketError> {
    let count: i64 = organizations::table
        .inner_join(organization_members::table)
        .filter(organization_members::user_id.eq(user_id))
        .filter(organizations::org_type.eq(org_type))
        .count()
        .get_result(conn)
        .map_err(|e| MarketError::Internal(format!("Query failed: {}", e)))?;
    Ok(count > 0)
}

/// Load organizations by id, keyed for attaching summaries to list rows
pub fn get_organizations_by_ids(
    conn: &mut SqliteConnection,
    ids: &[&str],
) -> Result<HashMap<String, Organization>, MarketError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<Organization> = organizations::table
        .filter(organizations::id.eq_any(ids))
        .select(Organization::as_select())
        .load(conn)
        .map_err(|e| MarketError::Internal(format!("Query failed: {}", e)))?;

    Ok(rows.into_iter().map(|o| (o.id.clone(), o)).collect())
}

// ============================================================================
// Write Operations
// ============================================================================

/// Create an organization and make the creator its owner
pub fn create_organization(
    conn: &mut SqliteConnection,
    ctx: &UserContext,
    input: &CreateOrganizationInput,
) -> Result<Organization, MarketError> {
    let id = new_id();
    let now = current_timestamp();

    conn.transaction(|conn| {
        let new_org = NewOrganization {
            id: &id,
            name: input.name.trim(),
            org_type: &input.org_type,
            description: input.description.as_deref(),
            location: input.location.as_deref(),
            pickup_available: 0,
            created_by: &ctx.user_id,
            created_at: &now,
            updated_at: &now,
        };

        diesel::insert_into(organizations::table)
            .values(&new_org)
            .execute(conn)?;

        diesel::insert_into(organization_members::table)
            .values(&NewOrganizationMember {
                organization_id: &id,
                user_id: &ctx.user_id,
                role: member_roles::OWNER,
                created_at: &now,
            })
            .execute(conn)?;

        get_organization(conn, &id)?
            .ok_or_else(|| MarketError::Internal("Failed to retrieve created organization".into()))
    })
}

/// Store already-normalized logistics settings
pub fn update_logistics(
    conn: &mut SqliteConnection,
    org_id: &str,
    delivery_days: &[String],
    pickup_available: bool,
    delivery_notes: Option<&str>,
) -> Result<Organization, MarketError> {
    let days_json = serde_json::to_string(delivery_days)?;

    let updated = diesel::update(organizations::table.filter(organizations::id.eq(org_id)))
        .set((
            organizations::delivery_days_json.eq(Some(days_json)),
            organizations::pickup_available.eq(if pickup_available { 1 } else { 0 }),
            organizations::delivery_notes.eq(delivery_notes),
            organizations::updated_at.eq(current_timestamp()),
        ))
        .execute(conn)?;

    if updated == 0 {
        return Err(MarketError::NotFound(format!("Organization {}", org_id)));
    }

    get_organization(conn, org_id)?
        .ok_or_else(|| MarketError::NotFound(format!("Organization {}", org_id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::org_types;
    use crate::db::MarketDb;

    fn farm_input(name: &str) -> CreateOrganizationInput {
        CreateOrganizationInput {
            name: name.into(),
            org_type: org_types::FARM.into(),
            description: None,
            location: Some("Hudson Valley".into()),
        }
    }

    #[test]
    fn test_creator_becomes_owner() {
        let db = MarketDb::open_in_memory().unwrap();
        let ctx = UserContext::new("user-1");

        let detail = db
            .with_conn(|conn| {
                let org = create_organization(conn, &ctx, &farm_input("Green Acres"))?;
                assert!(is_member(conn, "user-1", &org.id)?);
                assert!(!is_member(conn, "user-2", &org.id)?);
                get_organization_with_members(conn, &org.id)
            })
            .unwrap()
            .unwrap();

        assert_eq!(detail.members.len(), 1);
        assert_eq!(detail.members[0].member.role, member_roles::OWNER);
        assert!(detail.members[0].email.is_none());
    }

    #[test]
    fn test_list_user_organizations_sorted_by_name() {
        let db = MarketDb::open_in_memory().unwrap();
        let ctx = UserContext::new("user-1");

        let orgs = db
            .with_conn(|conn| {
                create_organization(conn, &ctx, &farm_input("Zephyr Farm"))?;
                create_organization(conn, &ctx, &farm_input("Apple Hill"))?;
                create_organization(conn, &UserContext::new("user-2"), &farm_input("Other"))?;
                list_user_organizations(conn, "user-1")
            })
            .unwrap();

        let names: Vec<_> = orgs.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["Apple Hill", "Zephyr Farm"]);
    }

    #[test]
    fn test_update_logistics_round_trips_days() {
        let db = MarketDb::open_in_memory().unwrap();
        let ctx = UserContext::new("user-1");

        let org = db
            .with_conn(|conn| {
                let org = create_organization(conn, &ctx, &farm_input("Green Acres"))?;
                update_logistics(
                    conn,
                    &org.id,
                    &["monday".to_string(), "thursday".to_string()],
                    true,
                    None,
                )
            })
            .unwrap();

        assert_eq!(org.delivery_days(), vec!["monday", "thursday"]);
        assert_eq!(org.pickup_available, 1);
        assert!(org.delivery_notes.is_none());
    }

    #[test]
    fn test_update_logistics_unknown_org() {
        let db = MarketDb::open_in_memory().unwrap();
        let result = db.with_conn(|conn| update_logistics(conn, "missing", &[], false, None));
        assert!(matches!(result, Err(MarketError::NotFound(_))));
    }
}
