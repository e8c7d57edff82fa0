//! Organization service - profiles, organizations, logistics and reliability
//!
//! Also home to the membership guards the other services use before acting
//! on an organization's behalf.

use std::sync::Arc;

use diesel::SqliteConnection;
use tracing::info;

use crate::db::models::{
    org_types, weekdays, Organization, OrganizationReliability, OrganizationWithMembers, Profile,
};
use crate::db::organizations::{CreateOrganizationInput, UpdateLogisticsInput};
use crate::db::profiles::UpsertProfileInput;
use crate::db::{organizations, profiles, reliability, MarketDb, UserContext};
use crate::error::MarketError;

use super::events::{EventBus, MarketEvent};
use super::validation::{non_blank, require_non_empty, require_one_of};

/// Load an organization the user belongs to.
///
/// Unknown organizations are `NotFound`; non-members are `Forbidden`.
pub fn require_member(
    conn: &mut SqliteConnection,
    ctx: &UserContext,
    org_id: &str,
) -> Result<Organization, MarketError> {
    let org = organizations::get_organization(conn, org_id)?
        .ok_or_else(|| MarketError::NotFound(format!("Organization {}", org_id)))?;

    if !organizations::is_member(conn, &ctx.user_id, org_id)? {
        return Err(MarketError::Forbidden(format!(
            "Not a member of organization {}",
            org_id
        )));
    }
    Ok(org)
}

/// Like [`require_member`], and the organization must be of `org_type`
pub fn require_member_of_type(
    conn: &mut SqliteConnection,
    ctx: &UserContext,
    org_id: &str,
    org_type: &str,
) -> Result<Organization, MarketError> {
    let org = require_member(conn, ctx, org_id)?;
    if org.org_type != org_type {
        return Err(MarketError::Forbidden(format!(
            "Organization {} is not a {}",
            org.name, org_type
        )));
    }
    Ok(org)
}

/// Weekday names lowercased, checked, de-duplicated and put in week order
pub fn normalize_delivery_days(days: &[String]) -> Result<Vec<String>, MarketError> {
    let mut requested = Vec::with_capacity(days.len());
    for day in days {
        let day = day.trim().to_lowercase();
        if !weekdays::is_valid(&day) {
            return Err(MarketError::InvalidInput(format!("Unknown delivery day: {}", day)));
        }
        requested.push(day);
    }

    Ok(weekdays::ALL
        .iter()
        .filter(|d| requested.iter().any(|r| r == *d))
        .map(|d| d.to_string())
        .collect())
}

pub struct OrganizationService {
    db: Arc<MarketDb>,
    events: Arc<EventBus>,
}

impl OrganizationService {
    pub fn new(db: Arc<MarketDb>, events: Arc<EventBus>) -> Self {
        Self { db, events }
    }

    // =========================================================================
    // Profiles
    // =========================================================================

    pub fn get_profile(&self, ctx: &UserContext) -> Result<Option<Profile>, MarketError> {
        self.db.with_conn(|conn| profiles::get_profile(conn, &ctx.user_id))
    }

    pub fn upsert_profile(
        &self,
        ctx: &UserContext,
        input: UpsertProfileInput,
    ) -> Result<Profile, MarketError> {
        require_one_of("userType", &input.user_type, &org_types::ALL)?;

        let input = UpsertProfileInput {
            email: non_blank(input.email.as_deref()).map(str::to_string),
            display_name: non_blank(input.display_name.as_deref()).map(str::to_string),
            user_type: input.user_type,
        };

        let profile = self.db.with_conn(|conn| profiles::upsert_profile(conn, ctx, &input))?;
        self.events.emit(MarketEvent::ProfileSaved {
            user_id: ctx.user_id.clone(),
        });
        Ok(profile)
    }

    // =========================================================================
    // Organizations
    // =========================================================================

    pub fn create(
        &self,
        ctx: &UserContext,
        input: CreateOrganizationInput,
    ) -> Result<Organization, MarketError> {
        require_non_empty("name", &input.name)?;
        require_one_of("orgType", &input.org_type, &org_types::ALL)?;

        let input = CreateOrganizationInput {
            description: non_blank(input.description.as_deref()).map(str::to_string),
            location: non_blank(input.location.as_deref()).map(str::to_string),
            ..input
        };

        let org = self
            .db
            .with_conn(|conn| organizations::create_organization(conn, ctx, &input))?;

        info!(id = %org.id, user = %ctx.user_id, "Organization created");
        self.events.emit(MarketEvent::OrganizationCreated {
            id: org.id.clone(),
            name: org.name.clone(),
            org_type: org.org_type.clone(),
        });
        Ok(org)
    }

    pub fn get(&self, org_id: &str) -> Result<Option<OrganizationWithMembers>, MarketError> {
        self.db
            .with_conn(|conn| organizations::get_organization_with_members(conn, org_id))
    }

    pub fn list_mine(&self, ctx: &UserContext) -> Result<Vec<Organization>, MarketError> {
        self.db
            .with_conn(|conn| organizations::list_user_organizations(conn, &ctx.user_id))
    }

    /// Replace the organization's delivery days, pickup flag and notes.
    /// Pickup is a farm-only option and always stored false for restaurants.
    pub fn update_logistics(
        &self,
        ctx: &UserContext,
        org_id: &str,
        input: UpdateLogisticsInput,
    ) -> Result<Organization, MarketError> {
        let days = normalize_delivery_days(&input.delivery_days)?;
        let notes = non_blank(input.delivery_notes.as_deref());

        let org = self.db.transaction(|conn| {
            let org = require_member(conn, ctx, org_id)?;
            let pickup = org.is_farm() && input.pickup_available;
            organizations::update_logistics(conn, org_id, &days, pickup, notes)
        })?;

        self.events.emit(MarketEvent::LogisticsUpdated {
            organization_id: org.id.clone(),
        });
        Ok(org)
    }

    // =========================================================================
    // Reliability
    // =========================================================================

    /// Stored reliability row; organizations without one read as all zeros
    pub fn reliability(&self, org_id: &str) -> Result<OrganizationReliability, MarketError> {
        self.db.with_conn(|conn| {
            organizations::get_organization(conn, org_id)?
                .ok_or_else(|| MarketError::NotFound(format!("Organization {}", org_id)))?;
            Ok(reliability::get(conn, org_id)?
                .unwrap_or_else(|| OrganizationReliability::empty(org_id)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> OrganizationService {
        let db = Arc::new(MarketDb::open_in_memory().unwrap());
        OrganizationService::new(db, Arc::new(EventBus::new()))
    }

    fn farm(name: &str) -> CreateOrganizationInput {
        CreateOrganizationInput {
            name: name.into(),
            org_type: org_types::FARM.into(),
            description: Some("   ".into()),
            location: None,
        }
    }

    #[test]
    fn test_normalize_delivery_days() {
        let days = normalize_delivery_days(&[
            "Friday".to_string(),
            " monday".to_string(),
            "friday".to_string(),
        ])
        .unwrap();
        assert_eq!(days, vec!["monday", "friday"]);

        assert!(normalize_delivery_days(&["someday".to_string()]).is_err());
    }

    #[test]
    fn test_create_validates() {
        let svc = service();
        let ctx = UserContext::new("u1");

        let err = svc
            .create(
                &ctx,
                CreateOrganizationInput {
                    org_type: "cooperative".into(),
                    ..farm("Co-op")
                },
            )
            .unwrap_err();
        assert!(matches!(err, MarketError::InvalidInput(_)));

        let err = svc.create(&ctx, farm("  ")).unwrap_err();
        assert!(matches!(err, MarketError::InvalidInput(_)));

        let org = svc.create(&ctx, farm("Green Acres")).unwrap();
        assert!(org.description.is_none());
    }

    #[test]
    fn test_logistics_members_only() {
        let svc = service();
        let owner = UserContext::new("owner");
        let org = svc.create(&owner, farm("Green Acres")).unwrap();

        let input = UpdateLogisticsInput {
            delivery_days: vec!["tuesday".into()],
            pickup_available: true,
            delivery_notes: Some("".into()),
        };

        let err = svc
            .update_logistics(&UserContext::new("stranger"), &org.id, input.clone())
            .unwrap_err();
        assert!(matches!(err, MarketError::Forbidden(_)));

        let updated = svc.update_logistics(&owner, &org.id, input).unwrap();
        assert_eq!(updated.delivery_days(), vec!["tuesday"]);
        assert_eq!(updated.pickup_available, 1);
        assert!(updated.delivery_notes.is_none());
    }

    #[test]
    fn test_restaurant_pickup_forced_off() {
        let svc = service();
        let chef = UserContext::new("chef");
        let org = svc
            .create(
                &chef,
                CreateOrganizationInput {
                    org_type: org_types::RESTAURANT.into(),
                    ..farm("Bistro")
                },
            )
            .unwrap();

        let updated = svc
            .update_logistics(
                &chef,
                &org.id,
                UpdateLogisticsInput {
                    delivery_days: vec![],
                    pickup_available: true,
                    delivery_notes: Some("Back door".into()),
                },
            )
            .unwrap();
        assert_eq!(updated.pickup_available, 0);
        assert_eq!(updated.delivery_notes.as_deref(), Some("Back door"));
    }

    #[test]
    fn test_reliability_defaults_to_zero() {
        let svc = service();
        let org = svc.create(&UserContext::new("u1"), farm("Green Acres")).unwrap();
        let row = svc.reliability(&org.id).unwrap();
        assert_eq!(row.total_commitments, 0);

        assert!(matches!(
            svc.reliability("missing"),
            Err(MarketError::NotFound(_))
        ));
    }

    #[test]
    fn test_profile_user_type_checked() {
        let svc = service();
        let ctx = UserContext::new("u1");
        let err = svc
            .upsert_profile(
                &ctx,
                UpsertProfileInput {
                    email: None,
                    user_type: "admin".into(),
                    display_name: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, MarketError::InvalidInput(_)));

        let profile = svc
            .upsert_profile(
                &ctx,
                UpsertProfileInput {
                    email: Some(" chef@example.com ".into()),
                    user_type: org_types::RESTAURANT.into(),
                    display_name: None,
                },
            )
            .unwrap();
        assert_eq!(profile.email.as_deref(), Some("chef@example.com"));
        assert!(svc.get_profile(&ctx).unwrap().is_some());
    }
}
