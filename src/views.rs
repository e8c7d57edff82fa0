//! View types for the HTTP API boundary
//!
//! These types use camelCase serialization for TypeScript clients.
//! Row types in db/models.rs mirror the SQLite columns.
//!
//! Pattern:
//! - Service layer returns row and composite types (Product, CommitmentDetail, ...)
//! - HTTP layer converts to View types (ProductView, CommitmentDetailView, ...)
//! - ts-rs generates camelCase TypeScript from View types
//!
//! Conversions:
//! - SQLite stores bools as i32. Views expose proper bools.
//! - `delivery_days_json` is parsed into a list of weekdays.
//! - Reliability rows carry their derived rates and tier.

use serde::Serialize;
use ts_rs::TS;

use crate::db::models::{
    Commitment, CommitmentBoard, CommitmentDelivery, CommitmentDetail, CommitmentWithParties,
    DashboardSummary, DeliveryOutcome, DemandOffer, DemandRequest, DemandRequestDetail,
    DemandRequestWithOrganization, MemberWithProfile, Message, MessageWithParties, OfferWithFarm,
    Organization, OrganizationReliability, OrganizationWithMembers, Product, ProductDetail,
    ProductWithOrganization, Profile,
};
use crate::db::DbStats;
use crate::reliability::{ReliabilityStats, ReliabilityTier};

// ============================================================================
// Profile View
// ============================================================================

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProfileView {
    pub id: String,
    pub email: Option<String>,
    pub user_type: String,
    pub display_name: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Profile> for ProfileView {
    fn from(p: Profile) -> Self {
        Self {
            id: p.id,
            email: p.email,
            user_type: p.user_type,
            display_name: p.display_name,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

// ============================================================================
// Organization Views
// ============================================================================

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct OrganizationView {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub org_type: String,
    pub description: Option<String>,
    pub location: Option<String>,
    /// Parsed from delivery_days_json
    pub delivery_days: Vec<String>,
    pub pickup_available: bool,
    pub delivery_notes: Option<String>,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Organization> for OrganizationView {
    fn from(o: Organization) -> Self {
        Self {
            delivery_days: o.delivery_days(),
            pickup_available: o.pickup_available == 1,
            id: o.id,
            name: o.name,
            org_type: o.org_type,
            description: o.description,
            location: o.location,
            delivery_notes: o.delivery_notes,
            created_by: o.created_by,
            created_at: o.created_at,
            updated_at: o.updated_at,
        }
    }
}

/// Organization as embedded in listings
#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct OrganizationSummaryView {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub org_type: String,
    pub description: Option<String>,
    pub location: Option<String>,
}

impl From<Organization> for OrganizationSummaryView {
    fn from(o: Organization) -> Self {
        Self {
            id: o.id,
            name: o.name,
            org_type: o.org_type,
            description: o.description,
            location: o.location,
        }
    }
}

fn summary(org: Option<Organization>) -> Option<OrganizationSummaryView> {
    org.map(OrganizationSummaryView::from)
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct MemberView {
    pub user_id: String,
    pub role: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub joined_at: String,
}

impl From<MemberWithProfile> for MemberView {
    fn from(m: MemberWithProfile) -> Self {
        Self {
            user_id: m.member.user_id,
            role: m.member.role,
            email: m.email,
            display_name: m.display_name,
            joined_at: m.member.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct OrganizationDetailView {
    pub organization: OrganizationView,
    pub members: Vec<MemberView>,
}

impl From<OrganizationWithMembers> for OrganizationDetailView {
    fn from(o: OrganizationWithMembers) -> Self {
        Self {
            organization: o.organization.into(),
            members: o.members.into_iter().map(MemberView::from).collect(),
        }
    }
}

// ============================================================================
// Reliability View
// ============================================================================

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ReliabilityView {
    pub organization_id: String,
    pub total_commitments: u32,
    pub completed_commitments: u32,
    pub on_time_deliveries: u32,
    pub total_deliveries: u32,
    pub active_partnerships: u32,
    /// Whole percentage, 0 with no commitments
    pub completion_rate: u32,
    /// Whole percentage, 0 with no resolved deliveries
    pub on_time_rate: u32,
    pub tier: ReliabilityTier,
    pub tier_label: String,
    pub updated_at: String,
}

impl From<OrganizationReliability> for ReliabilityView {
    fn from(r: OrganizationReliability) -> Self {
        let stats = ReliabilityStats::from(&r);
        let tier = stats.tier();
        Self {
            organization_id: r.organization_id,
            total_commitments: stats.total_commitments,
            completed_commitments: stats.completed_commitments,
            on_time_deliveries: stats.on_time_deliveries,
            total_deliveries: stats.total_deliveries,
            active_partnerships: stats.active_partnerships,
            completion_rate: stats.completion_rate(),
            on_time_rate: stats.on_time_rate(),
            tier,
            tier_label: tier.label().to_string(),
            updated_at: r.updated_at,
        }
    }
}

/// Organizations without a reliability row are shown as new
fn reliability_or_new(row: Option<OrganizationReliability>, org_id: &str) -> ReliabilityView {
    row.unwrap_or_else(|| OrganizationReliability::empty(org_id))
        .into()
}

// ============================================================================
// Product Views
// ============================================================================

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProductView {
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
    pub available: bool,
    pub is_surplus: bool,
    pub surplus_reason: Option<String>,
    pub discount_percentage: Option<i32>,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Product> for ProductView {
    fn from(p: Product) -> Self {
        Self {
            id: p.id,
            organization_id: p.organization_id,
            name: p.name,
            description: p.description,
            category: p.category,
            price: p.price,
            quantity: p.quantity,
            unit: p.unit,
            location: p.location,
            image_url: p.image_url,
            available: p.available == 1,
            is_surplus: p.is_surplus == 1,
            surplus_reason: p.surplus_reason,
            discount_percentage: p.discount_percentage,
            created_by: p.created_by,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProductListingView {
    pub product: ProductView,
    pub organization: Option<OrganizationSummaryView>,
}

impl From<ProductWithOrganization> for ProductListingView {
    fn from(p: ProductWithOrganization) -> Self {
        Self {
            product: p.product.into(),
            organization: summary(p.organization),
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProductDetailView {
    pub product: ProductView,
    pub organization: Option<OrganizationSummaryView>,
    /// Viewer belongs to a restaurant and can contact the farm
    pub can_message: bool,
}

impl From<ProductDetail> for ProductDetailView {
    fn from(p: ProductDetail) -> Self {
        Self {
            product: p.product.into(),
            organization: summary(p.organization),
            can_message: p.can_message,
        }
    }
}

// ============================================================================
// Demand Views
// ============================================================================

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DemandRequestView {
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

impl From<DemandRequest> for DemandRequestView {
    fn from(r: DemandRequest) -> Self {
        Self {
            id: r.id,
            organization_id: r.organization_id,
            product_name: r.product_name,
            category: r.category,
            quantity: r.quantity,
            unit: r.unit,
            description: r.description,
            frequency: r.frequency,
            start_date: r.start_date,
            end_date: r.end_date,
            preferred_radius_miles: r.preferred_radius_miles,
            status: r.status,
            created_by: r.created_by,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DemandListingView {
    pub request: DemandRequestView,
    pub organization: Option<OrganizationSummaryView>,
    pub reliability: ReliabilityView,
}

impl From<DemandRequestWithOrganization> for DemandListingView {
    fn from(d: DemandRequestWithOrganization) -> Self {
        let reliability = reliability_or_new(d.reliability, &d.request.organization_id);
        Self {
            request: d.request.into(),
            organization: summary(d.organization),
            reliability,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct OfferView {
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

impl From<DemandOffer> for OfferView {
    fn from(o: DemandOffer) -> Self {
        Self {
            id: o.id,
            demand_request_id: o.demand_request_id,
            farm_organization_id: o.farm_organization_id,
            offered_quantity: o.offered_quantity,
            offered_price: o.offered_price,
            message: o.message,
            status: o.status,
            created_by: o.created_by,
            created_at: o.created_at,
            updated_at: o.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct OfferListingView {
    pub offer: OfferView,
    pub farm: Option<OrganizationSummaryView>,
    pub reliability: ReliabilityView,
}

impl From<OfferWithFarm> for OfferListingView {
    fn from(o: OfferWithFarm) -> Self {
        let reliability = reliability_or_new(o.reliability, &o.offer.farm_organization_id);
        Self {
            offer: o.offer.into(),
            farm: summary(o.farm),
            reliability,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DemandDetailView {
    pub request: DemandRequestView,
    pub organization: Option<OrganizationSummaryView>,
    pub reliability: ReliabilityView,
    pub offers: Vec<OfferListingView>,
    pub is_owner: bool,
}

impl From<DemandRequestDetail> for DemandDetailView {
    fn from(d: DemandRequestDetail) -> Self {
        let reliability = reliability_or_new(d.reliability, &d.request.organization_id);
        Self {
            request: d.request.into(),
            organization: summary(d.organization),
            reliability,
            offers: d.offers.into_iter().map(OfferListingView::from).collect(),
            is_owner: d.is_owner,
        }
    }
}

// ============================================================================
// Commitment Views
// ============================================================================

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CommitmentView {
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

impl From<Commitment> for CommitmentView {
    fn from(c: Commitment) -> Self {
        Self {
            id: c.id,
            demand_request_id: c.demand_request_id,
            demand_offer_id: c.demand_offer_id,
            restaurant_organization_id: c.restaurant_organization_id,
            farm_organization_id: c.farm_organization_id,
            product_name: c.product_name,
            quantity: c.quantity,
            unit: c.unit,
            price: c.price,
            frequency: c.frequency,
            start_date: c.start_date,
            end_date: c.end_date,
            next_delivery_date: c.next_delivery_date,
            status: c.status,
            created_by: c.created_by,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CommitmentListingView {
    pub commitment: CommitmentView,
    pub restaurant: Option<OrganizationSummaryView>,
    pub farm: Option<OrganizationSummaryView>,
}

impl From<CommitmentWithParties> for CommitmentListingView {
    fn from(c: CommitmentWithParties) -> Self {
        Self {
            commitment: c.commitment.into(),
            restaurant: summary(c.restaurant),
            farm: summary(c.farm),
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CommitmentBoardView {
    pub active: Vec<CommitmentListingView>,
    pub other: Vec<CommitmentListingView>,
}

impl From<CommitmentBoard> for CommitmentBoardView {
    fn from(b: CommitmentBoard) -> Self {
        Self {
            active: b.active.into_iter().map(CommitmentListingView::from).collect(),
            other: b.other.into_iter().map(CommitmentListingView::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DeliveryView {
    pub id: String,
    pub commitment_id: String,
    pub scheduled_date: String,
    pub completed_date: Option<String>,
    pub quantity_delivered: Option<f64>,
    pub status: String,
    pub notes: Option<String>,
    /// Completed no later than scheduled
    pub on_time: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<CommitmentDelivery> for DeliveryView {
    fn from(d: CommitmentDelivery) -> Self {
        Self {
            on_time: d.is_on_time(),
            id: d.id,
            commitment_id: d.commitment_id,
            scheduled_date: d.scheduled_date,
            completed_date: d.completed_date,
            quantity_delivered: d.quantity_delivered,
            status: d.status,
            notes: d.notes,
            created_at: d.created_at,
            updated_at: d.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CommitmentDetailView {
    pub commitment: CommitmentView,
    pub restaurant: Option<OrganizationSummaryView>,
    pub farm: Option<OrganizationSummaryView>,
    pub deliveries: Vec<DeliveryView>,
}

impl From<CommitmentDetail> for CommitmentDetailView {
    fn from(c: CommitmentDetail) -> Self {
        Self {
            commitment: c.commitment.into(),
            restaurant: summary(c.restaurant),
            farm: summary(c.farm),
            deliveries: c.deliveries.into_iter().map(DeliveryView::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DeliveryOutcomeView {
    pub delivery: DeliveryView,
    pub next_delivery: Option<DeliveryView>,
    pub commitment: CommitmentView,
}

impl From<DeliveryOutcome> for DeliveryOutcomeView {
    fn from(o: DeliveryOutcome) -> Self {
        Self {
            delivery: o.delivery.into(),
            next_delivery: o.next_delivery.map(DeliveryView::from),
            commitment: o.commitment.into(),
        }
    }
}

// ============================================================================
// Message Views
// ============================================================================

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct MessageView {
    pub id: String,
    pub from_organization_id: String,
    pub to_organization_id: String,
    pub product_id: Option<String>,
    pub subject: String,
    pub message: String,
    pub sender_id: String,
    pub is_read: bool,
    pub created_at: String,
}

impl From<Message> for MessageView {
    fn from(m: Message) -> Self {
        Self {
            id: m.id,
            from_organization_id: m.from_organization_id,
            to_organization_id: m.to_organization_id,
            product_id: m.product_id,
            subject: m.subject,
            message: m.message,
            sender_id: m.sender_id,
            is_read: m.is_read == 1,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct MessageListingView {
    pub message: MessageView,
    pub from_organization: Option<OrganizationSummaryView>,
    pub to_organization: Option<OrganizationSummaryView>,
    pub product_name: Option<String>,
}

impl From<MessageWithParties> for MessageListingView {
    fn from(m: MessageWithParties) -> Self {
        Self {
            message: m.message.into(),
            from_organization: summary(m.from_org),
            to_organization: summary(m.to_org),
            product_name: m.product_name,
        }
    }
}

// ============================================================================
// Dashboard & Health
// ============================================================================

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DashboardView {
    pub profile: Option<ProfileView>,
    pub organizations: Vec<OrganizationView>,
    #[ts(type = "number")]
    pub active_commitments: i64,
    #[ts(type = "number")]
    pub active_demand_requests: i64,
    #[ts(type = "number")]
    pub surplus_products: i64,
}

impl From<DashboardSummary> for DashboardView {
    fn from(d: DashboardSummary) -> Self {
        Self {
            profile: d.profile.map(ProfileView::from),
            organizations: d.organizations.into_iter().map(OrganizationView::from).collect(),
            active_commitments: d.active_commitments,
            active_demand_requests: d.active_demand_requests,
            surplus_products: d.surplus_products,
        }
    }
}

/// Row counts reported by `/health`
#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TableCountsView {
    #[ts(type = "number")]
    pub organizations: u64,
    #[ts(type = "number")]
    pub products: u64,
    #[ts(type = "number")]
    pub demand_requests: u64,
    #[ts(type = "number")]
    pub offers: u64,
    #[ts(type = "number")]
    pub commitments: u64,
    #[ts(type = "number")]
    pub deliveries: u64,
    #[ts(type = "number")]
    pub messages: u64,
}

impl From<DbStats> for TableCountsView {
    fn from(s: DbStats) -> Self {
        Self {
            organizations: s.organizations,
            products: s.products,
            demand_requests: s.demand_requests,
            offers: s.offers,
            commitments: s.commitments,
            deliveries: s.deliveries,
            messages: s.messages,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct HealthView {
    pub status: String,
    pub version: String,
    pub counts: TableCountsView,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::delivery_statuses;

    fn organization() -> Organization {
        Organization {
            id: "org-1".into(),
            name: "Willow Creek".into(),
            org_type: "farm".into(),
            description: None,
            location: Some("Hudson Valley".into()),
            delivery_days_json: Some(r#"["tuesday","friday"]"#.into()),
            pickup_available: 1,
            delivery_notes: None,
            created_by: "farmer".into(),
            created_at: "2026-03-01T08:00:00Z".into(),
            updated_at: "2026-03-01T08:00:00Z".into(),
        }
    }

    #[test]
    fn test_organization_view_serializes_camel_case() {
        let json = serde_json::to_value(OrganizationView::from(organization())).unwrap();
        assert_eq!(json["type"], "farm");
        assert_eq!(json["pickupAvailable"], true);
        assert_eq!(json["deliveryDays"], serde_json::json!(["tuesday", "friday"]));
        assert!(json.get("delivery_days_json").is_none());
    }

    #[test]
    fn test_reliability_view_derives_rates() {
        let row = OrganizationReliability {
            organization_id: "org-1".into(),
            total_commitments: 10,
            completed_commitments: 9,
            on_time_deliveries: 19,
            total_deliveries: 20,
            active_partnerships: 3,
            updated_at: "2026-03-01T08:00:00Z".into(),
        };
        let json = serde_json::to_value(ReliabilityView::from(row)).unwrap();
        assert_eq!(json["completionRate"], 90);
        assert_eq!(json["onTimeRate"], 95);
        assert_eq!(json["tier"], "highly_reliable");
        assert_eq!(json["tierLabel"], "Highly Reliable");
    }

    #[test]
    fn test_missing_reliability_is_new() {
        let view = reliability_or_new(None, "org-9");
        assert_eq!(view.organization_id, "org-9");
        assert_eq!(view.tier, ReliabilityTier::New);
        assert_eq!(view.completion_rate, 0);
    }

    #[test]
    fn test_delivery_view_on_time_flag() {
        let delivery = CommitmentDelivery {
            id: "d-1".into(),
            commitment_id: "c-1".into(),
            scheduled_date: "2026-03-09".into(),
            completed_date: Some("2026-03-08".into()),
            quantity_delivered: Some(12.0),
            status: delivery_statuses::COMPLETED.into(),
            notes: None,
            created_at: "2026-03-02T08:00:00Z".into(),
            updated_at: "2026-03-08T08:00:00Z".into(),
        };
        let json = serde_json::to_value(DeliveryView::from(delivery)).unwrap();
        assert_eq!(json["onTime"], true);
        assert_eq!(json["quantityDelivered"], 12.0);
    }
}
