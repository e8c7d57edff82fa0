//! Diesel model definitions for database tables
//!
//! - Queryable structs: for SELECT queries (reading data)
//! - Insertable structs: for INSERT queries (writing data)
//! - Constant modules: the allowed values of every TEXT enum column, plus
//!   the status transitions the services accept

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use super::diesel_schema::*;

// ============================================================================
// Timestamp Helpers (SQLite stores timestamps as TEXT)
// ============================================================================

/// Get current UTC timestamp as ISO 8601 string for SQLite TEXT columns
pub fn current_timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Today's UTC date as `YYYY-MM-DD`
pub fn current_date() -> String {
    chrono::Utc::now().date_naive().format(DATE_FORMAT).to_string()
}

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a `YYYY-MM-DD` column value
pub fn parse_date(value: &str) -> Option<chrono::NaiveDate> {
    chrono::NaiveDate::parse_from_str(value, DATE_FORMAT).ok()
}

// ============================================================================
// Profile Models
// ============================================================================

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = profiles)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Profile {
    pub id: String,
    pub email: Option<String>,
    pub user_type: String,
    pub display_name: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = profiles)]
pub struct NewProfile<'a> {
    pub id: &'a str,
    pub email: Option<&'a str>,
    pub user_type: &'a str,
    pub display_name: Option<&'a str>,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

// ============================================================================
// Organization Models
// ============================================================================

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = organizations)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub org_type: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub delivery_days_json: Option<String>,
    pub pickup_available: i32,
    pub delivery_notes: Option<String>,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Organization {
    pub fn is_farm(&self) -> bool {
        self.org_type == org_types::FARM
    }

    /// Delivery days decoded from storage; malformed JSON reads as empty
    pub fn delivery_days(&self) -> Vec<String> {
        self.delivery_days_json
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = organizations)]
pub struct NewOrganization<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub org_type: &'a str,
    pub description: Option<&'a str>,
    pub location: Option<&'a str>,
    pub pickup_available: i32,
    pub created_by: &'a str,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = organization_members)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct OrganizationMember {
    pub organization_id: String,
    pub user_id: String,
    pub role: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = organization_members)]
pub struct NewOrganizationMember<'a> {
    pub organization_id: &'a str,
    pub user_id: &'a str,
    pub role: &'a str,
    pub created_at: &'a str,
}

/// Member with profile e-mail attached
#[derive(Debug, Clone, Serialize)]
pub struct MemberWithProfile {
    pub member: OrganizationMember,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

/// Organization with its member list
#[derive(Debug, Clone, Serialize)]
pub struct OrganizationWithMembers {
    pub organization: Organization,
    pub members: Vec<MemberWithProfile>,
}

// ============================================================================
// Product Models
// ============================================================================

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = products)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Product {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub price: f64,
    pub quantity: f64,
    pub unit: String,
    pub location: Option<String>,
    pub image_url: Option<String>,
    pub available: i32,
    pub is_surplus: i32,
    pub surplus_reason: Option<String>,
    pub discount_percentage: Option<i32>,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = products)]
pub struct NewProduct<'a> {
    pub id: &'a str,
    pub organization_id: &'a str,
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub category: &'a str,
    pub price: f64,
    pub quantity: f64,
    pub unit: &'a str,
    pub location: Option<&'a str>,
    pub image_url: Option<&'a str>,
    pub available: i32,
    pub is_surplus: i32,
    pub surplus_reason: Option<&'a str>,
    pub discount_percentage: Option<i32>,
    pub created_by: &'a str,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

/// Product listing with its organization attached
#[derive(Debug, Clone, Serialize)]
pub struct ProductWithOrganization {
    pub product: Product,
    pub organization: Option<Organization>,
}

/// Product detail page data
#[derive(Debug, Clone, Serialize)]
pub struct ProductDetail {
    pub product: Product,
    pub organization: Option<Organization>,
    /// Viewer belongs to at least one restaurant and may contact the farm
    pub can_message: bool,
}

// ============================================================================
// Demand Models
// ============================================================================

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = demand_requests)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct DemandRequest {
    pub id: String,
    pub organization_id: String,
    pub product_name: String,
    pub category: String,
    pub quantity: f64,
    pub unit: String,
    pub description: Option<String>,
    pub frequency: String,
    pub start_date: String,
    pub end_date: Option<String>,
    pub preferred_radius_miles: i32,
    pub status: String,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = demand_requests)]
pub struct NewDemandRequest<'a> {
    pub id: &'a str,
    pub organization_id: &'a str,
    pub product_name: &'a str,
    pub category: &'a str,
    pub quantity: f64,
    pub unit: &'a str,
    pub description: Option<&'a str>,
    pub frequency: &'a str,
    pub start_date: &'a str,
    pub end_date: Option<&'a str>,
    pub preferred_radius_miles: i32,
    pub status: &'a str,
    pub created_by: &'a str,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = demand_offers)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct DemandOffer {
    pub id: String,
    pub demand_request_id: String,
    pub farm_organization_id: String,
    pub offered_quantity: f64,
    pub offered_price: f64,
    pub message: Option<String>,
    pub status: String,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = demand_offers)]
pub struct NewDemandOffer<'a> {
    pub id: &'a str,
    pub demand_request_id: &'a str,
    pub farm_organization_id: &'a str,
    pub offered_quantity: f64,
    pub offered_price: f64,
    pub message: Option<&'a str>,
    pub status: &'a str,
    pub created_by: &'a str,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

/// Demand board entry: request, restaurant and its reliability
#[derive(Debug, Clone, Serialize)]
pub struct DemandRequestWithOrganization {
    pub request: DemandRequest,
    pub organization: Option<Organization>,
    pub reliability: Option<OrganizationReliability>,
}

/// Offer with the offering farm and its reliability
#[derive(Debug, Clone, Serialize)]
pub struct OfferWithFarm {
    pub offer: DemandOffer,
    pub farm: Option<Organization>,
    pub reliability: Option<OrganizationReliability>,
}

/// Demand request detail page data
#[derive(Debug, Clone, Serialize)]
pub struct DemandRequestDetail {
    pub request: DemandRequest,
    pub organization: Option<Organization>,
    pub reliability: Option<OrganizationReliability>,
    pub offers: Vec<OfferWithFarm>,
    /// Viewer belongs to the requesting restaurant
    pub is_owner: bool,
}

// ============================================================================
// Commitment Models
// ============================================================================

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = commitments)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Commitment {
    pub id: String,
    pub demand_request_id: Option<String>,
    pub demand_offer_id: Option<String>,
    pub restaurant_organization_id: String,
    pub farm_organization_id: String,
    pub product_name: String,
    pub quantity: f64,
    pub unit: String,
    pub price: f64,
    pub frequency: String,
    pub start_date: String,
    pub end_date: Option<String>,
    pub next_delivery_date: Option<String>,
    pub status: String,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Commitment {
    /// Both party organization ids
    pub fn parties(&self) -> [&str; 2] {
        [&self.restaurant_organization_id, &self.farm_organization_id]
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = commitments)]
pub struct NewCommitment<'a> {
    pub id: &'a str,
    pub demand_request_id: Option<&'a str>,
    pub demand_offer_id: Option<&'a str>,
    pub restaurant_organization_id: &'a str,
    pub farm_organization_id: &'a str,
    pub product_name: &'a str,
    pub quantity: f64,
    pub unit: &'a str,
    pub price: f64,
    pub frequency: &'a str,
    pub start_date: &'a str,
    pub end_date: Option<&'a str>,
    pub next_delivery_date: Option<&'a str>,
    pub status: &'a str,
    pub created_by: &'a str,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = commitment_deliveries)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CommitmentDelivery {
    pub id: String,
    pub commitment_id: String,
    pub scheduled_date: String,
    pub completed_date: Option<String>,
    pub quantity_delivered: Option<f64>,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl CommitmentDelivery {
    /// Completed on or before the scheduled date
    pub fn is_on_time(&self) -> bool {
        if self.status != delivery_statuses::COMPLETED {
            return false;
        }
        match (
            self.completed_date.as_deref().and_then(parse_date),
            parse_date(&self.scheduled_date),
        ) {
            (Some(done), Some(due)) => done <= due,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = commitment_deliveries)]
pub struct NewCommitmentDelivery<'a> {
    pub id: &'a str,
    pub commitment_id: &'a str,
    pub scheduled_date: &'a str,
    pub status: &'a str,
    pub notes: Option<&'a str>,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

/// Commitment with both parties attached
#[derive(Debug, Clone, Serialize)]
pub struct CommitmentWithParties {
    pub commitment: Commitment,
    pub restaurant: Option<Organization>,
    pub farm: Option<Organization>,
}

/// Commitment detail page data
#[derive(Debug, Clone, Serialize)]
pub struct CommitmentDetail {
    pub commitment: Commitment,
    pub restaurant: Option<Organization>,
    pub farm: Option<Organization>,
    pub deliveries: Vec<CommitmentDelivery>,
}

/// Commitments of a user, split the way the commitments page lists them
#[derive(Debug, Clone, Serialize)]
pub struct CommitmentBoard {
    pub active: Vec<CommitmentWithParties>,
    pub other: Vec<CommitmentWithParties>,
}

/// Result of completing a delivery
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryOutcome {
    pub delivery: CommitmentDelivery,
    /// Follow-up delivery scheduled for recurring commitments
    pub next_delivery: Option<CommitmentDelivery>,
    pub commitment: Commitment,
}

// ============================================================================
// Message Models
// ============================================================================

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = messages)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Message {
    pub id: String,
    pub from_organization_id: String,
    pub to_organization_id: String,
    pub product_id: Option<String>,
    pub subject: String,
    pub message: String,
    pub sender_id: String,
    pub is_read: i32,
    pub created_at: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = messages)]
pub struct NewMessage<'a> {
    pub id: &'a str,
    pub from_organization_id: &'a str,
    pub to_organization_id: &'a str,
    pub product_id: Option<&'a str>,
    pub subject: &'a str,
    pub message: &'a str,
    pub sender_id: &'a str,
    pub is_read: i32,
    pub created_at: &'a str,
}

/// Message with both organizations and the product name attached
#[derive(Debug, Clone, Serialize)]
pub struct MessageWithParties {
    pub message: Message,
    pub from_org: Option<Organization>,
    pub to_org: Option<Organization>,
    pub product_name: Option<String>,
}

// ============================================================================
// Reliability Models
// ============================================================================

#[derive(Debug, Clone, Queryable, Selectable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = organization_reliability)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct OrganizationReliability {
    pub organization_id: String,
    pub total_commitments: i32,
    pub completed_commitments: i32,
    pub on_time_deliveries: i32,
    pub total_deliveries: i32,
    pub active_partnerships: i32,
    pub updated_at: String,
}

impl OrganizationReliability {
    /// Zeroed row for an organization with no history
    pub fn empty(organization_id: &str) -> Self {
        Self {
            organization_id: organization_id.to_string(),
            total_commitments: 0,
            completed_commitments: 0,
            on_time_deliveries: 0,
            total_deliveries: 0,
            active_partnerships: 0,
            updated_at: current_timestamp(),
        }
    }
}

// ============================================================================
// Dashboard
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub profile: Option<Profile>,
    pub organizations: Vec<Organization>,
    pub active_commitments: i64,
    pub active_demand_requests: i64,
    pub surplus_products: i64,
}

// ============================================================================
// Enum Constants
// ============================================================================

/// Organization (and profile) types
pub mod org_types {
    pub const FARM: &str = "farm";
    pub const RESTAURANT: &str = "restaurant";

    pub const ALL: [&str; 2] = [FARM, RESTAURANT];
}

/// Membership roles
pub mod member_roles {
    pub const OWNER: &str = "owner";
    pub const MEMBER: &str = "member";
}

/// Product and demand categories
pub mod categories {
    pub const PRODUCE: &str = "produce";
    pub const MEAT: &str = "meat";
    pub const DAIRY: &str = "dairy";
    pub const OTHER: &str = "other";

    pub const ALL: [&str; 4] = [PRODUCE, MEAT, DAIRY, OTHER];
}

/// Why a product is listed as surplus
pub mod surplus_reasons {
    pub const EXCESS: &str = "excess";
    pub const IMPERFECT: &str = "imperfect";
    pub const URGENT: &str = "urgent";

    pub const ALL: [&str; 3] = [EXCESS, IMPERFECT, URGENT];
}

/// Supply frequencies for demand requests and commitments
pub mod frequencies {
    use chrono::{Months, NaiveDate};

    pub const ONE_TIME: &str = "one-time";
    pub const WEEKLY: &str = "weekly";
    pub const BI_WEEKLY: &str = "bi-weekly";
    pub const MONTHLY: &str = "monthly";
    pub const SEASONAL: &str = "seasonal";

    pub const ALL: [&str; 5] = [ONE_TIME, WEEKLY, BI_WEEKLY, MONTHLY, SEASONAL];

    /// Next delivery date after `from`, for frequencies with a fixed interval.
    /// One-time and seasonal agreements are scheduled by hand.
    pub fn next_after(frequency: &str, from: NaiveDate) -> Option<NaiveDate> {
        match frequency {
            WEEKLY => from.checked_add_days(chrono::Days::new(7)),
            BI_WEEKLY => from.checked_add_days(chrono::Days::new(14)),
            MONTHLY => from.checked_add_months(Months::new(1)),
            _ => None,
        }
    }
}

/// Weekdays accepted in organization logistics
pub mod weekdays {
    pub const ALL: [&str; 7] = [
        "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday",
    ];

    pub fn is_valid(day: &str) -> bool {
        ALL.contains(&day)
    }
}

/// Demand request statuses
pub mod request_statuses {
    pub const ACTIVE: &str = "active";
    pub const FULFILLED: &str = "fulfilled";
    pub const CANCELLED: &str = "cancelled";

    pub const ALL: [&str; 3] = [ACTIVE, FULFILLED, CANCELLED];

    pub fn can_transition(from: &str, to: &str) -> bool {
        matches!((from, to), (ACTIVE, FULFILLED) | (ACTIVE, CANCELLED))
    }
}

/// Offer statuses
pub mod offer_statuses {
    pub const PENDING: &str = "pending";
    pub const ACCEPTED: &str = "accepted";
    pub const REJECTED: &str = "rejected";

    pub const ALL: [&str; 3] = [PENDING, ACCEPTED, REJECTED];
}

/// Commitment statuses
pub mod commitment_statuses {
    pub const ACTIVE: &str = "active";
    pub const PAUSED: &str = "paused";
    pub const CANCELLED: &str = "cancelled";
    pub const COMPLETED: &str = "completed";

    pub const ALL: [&str; 4] = [ACTIVE, PAUSED, CANCELLED, COMPLETED];

    pub fn is_terminal(status: &str) -> bool {
        matches!(status, CANCELLED | COMPLETED)
    }

    pub fn can_transition(from: &str, to: &str) -> bool {
        matches!(
            (from, to),
            (ACTIVE, PAUSED)
                | (ACTIVE, CANCELLED)
                | (ACTIVE, COMPLETED)
                | (PAUSED, ACTIVE)
                | (PAUSED, CANCELLED)
        )
    }
}

/// Delivery statuses
pub mod delivery_statuses {
    pub const SCHEDULED: &str = "scheduled";
    pub const COMPLETED: &str = "completed";
    pub const MISSED: &str = "missed";
    pub const CANCELLED: &str = "cancelled";

    pub const ALL: [&str; 4] = [SCHEDULED, COMPLETED, MISSED, CANCELLED];

    /// Statuses counted as a resolved delivery in reliability
    pub const RESOLVED: [&str; 2] = [COMPLETED, MISSED];

    /// Only scheduled deliveries change state
    pub fn can_transition(from: &str, to: &str) -> bool {
        from == SCHEDULED && matches!(to, COMPLETED | MISSED | CANCELLED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commitment_transitions() {
        use commitment_statuses::*;
        assert!(can_transition(ACTIVE, PAUSED));
        assert!(can_transition(PAUSED, ACTIVE));
        assert!(can_transition(PAUSED, CANCELLED));
        assert!(!can_transition(PAUSED, COMPLETED));
        assert!(!can_transition(CANCELLED, ACTIVE));
        assert!(!can_transition(COMPLETED, PAUSED));
        assert!(!can_transition(ACTIVE, ACTIVE));
    }

    #[test]
    fn test_next_after_by_frequency() {
        let start = NaiveDateExt::ymd(2026, 1, 31);
        assert_eq!(
            frequencies::next_after(frequencies::WEEKLY, start),
            Some(NaiveDateExt::ymd(2026, 2, 7))
        );
        assert_eq!(
            frequencies::next_after(frequencies::BI_WEEKLY, start),
            Some(NaiveDateExt::ymd(2026, 2, 14))
        );
        // Month end clamps to the last day of February
        assert_eq!(
            frequencies::next_after(frequencies::MONTHLY, start),
            Some(NaiveDateExt::ymd(2026, 2, 28))
        );
        assert_eq!(frequencies::next_after(frequencies::ONE_TIME, start), None);
        assert_eq!(frequencies::next_after(frequencies::SEASONAL, start), None);
    }

    #[test]
    fn test_on_time_delivery() {
        let mut delivery = CommitmentDelivery {
            id: "d1".into(),
            commitment_id: "c1".into(),
            scheduled_date: "2026-03-10".into(),
            completed_date: Some("2026-03-10".into()),
            quantity_delivered: Some(10.0),
            status: delivery_statuses::COMPLETED.into(),
            notes: None,
            created_at: current_timestamp(),
            updated_at: current_timestamp(),
        };
        assert!(delivery.is_on_time());

        delivery.completed_date = Some("2026-03-11".into());
        assert!(!delivery.is_on_time());

        delivery.completed_date = Some("2026-03-09".into());
        delivery.status = delivery_statuses::MISSED.into();
        assert!(!delivery.is_on_time());
    }

    struct NaiveDateExt;

    impl NaiveDateExt {
        fn ymd(y: i32, m: u32, d: u32) -> chrono::NaiveDate {
            chrono::NaiveDate::from_ymd_opt(y, m, d).unwrap()
        }
    }
}
