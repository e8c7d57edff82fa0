//! Commitment service - standing orders between a farm and a restaurant
//!
//! A commitment is created from an accepted offer and then moves through
//! `active` / `paused` until it ends as `completed` or `cancelled`. Both
//! parties' reliability rows are rebuilt whenever a commitment changes.

use std::sync::Arc;

use diesel::SqliteConnection;
use tracing::info;

use crate::db::models::{
    commitment_statuses, offer_statuses, Commitment, CommitmentBoard, CommitmentDetail,
};
use crate::db::{
    commitments, deliveries, demand, organizations, reliability, MarketDb, UserContext,
};
use crate::error::MarketError;

use super::events::{EventBus, MarketEvent};
use super::organization_service::require_member;
use super::validation::require_one_of;

/// Load a commitment the user is a party to.
///
/// Members of either organization qualify; anyone else is `Forbidden`.
pub fn require_party(
    conn: &mut SqliteConnection,
    ctx: &UserContext,
    commitment_id: &str,
) -> Result<Commitment, MarketError> {
    let commitment = commitments::get_commitment(conn, commitment_id)?
        .ok_or_else(|| MarketError::NotFound(format!("Commitment {}", commitment_id)))?;

    let mut is_party = false;
    for org_id in commitment.parties() {
        if organizations::is_member(conn, &ctx.user_id, org_id)? {
            is_party = true;
            break;
        }
    }

    if !is_party {
        return Err(MarketError::Forbidden(format!(
            "Not a party to commitment {}",
            commitment_id
        )));
    }
    Ok(commitment)
}

/// Rebuild the reliability rows of both parties
pub fn recompute_parties(
    conn: &mut SqliteConnection,
    commitment: &Commitment,
) -> Result<(), MarketError> {
    for org_id in commitment.parties() {
        reliability::recompute(conn, org_id)?;
    }
    Ok(())
}

/// Commitment with parties and deliveries
pub fn load_detail(
    conn: &mut SqliteConnection,
    commitment_id: &str,
) -> Result<CommitmentDetail, MarketError> {
    let commitment = commitments::get_commitment(conn, commitment_id)?
        .ok_or_else(|| MarketError::NotFound(format!("Commitment {}", commitment_id)))?;

    let ids: Vec<&str> = commitment.parties().to_vec();
    let mut orgs = organizations::get_organizations_by_ids(conn, &ids)?;
    let deliveries = deliveries::list_for_commitment(conn, commitment_id)?;

    Ok(CommitmentDetail {
        restaurant: orgs.remove(&commitment.restaurant_organization_id),
        farm: orgs.remove(&commitment.farm_organization_id),
        deliveries,
        commitment,
    })
}

pub struct CommitmentService {
    db: Arc<MarketDb>,
    events: Arc<EventBus>,
}

impl CommitmentService {
    pub fn new(db: Arc<MarketDb>, events: Arc<EventBus>) -> Self {
        Self { db, events }
    }

    /// Turn an accepted offer into an active standing order and schedule its
    /// first delivery on the start date
    pub fn create_from_offer(
        &self,
        ctx: &UserContext,
        offer_id: &str,
    ) -> Result<CommitmentDetail, MarketError> {
        let detail = self.db.transaction(|conn| {
            let offer = demand::get_offer(conn, offer_id)?
                .ok_or_else(|| MarketError::NotFound(format!("Offer {}", offer_id)))?;
            let request = demand::get_request(conn, &offer.demand_request_id)?.ok_or_else(|| {
                MarketError::NotFound(format!("Demand request {}", offer.demand_request_id))
            })?;
            require_member(conn, ctx, &request.organization_id)?;

            if offer.status != offer_statuses::ACCEPTED {
                return Err(MarketError::Conflict(format!(
                    "Offer is {}, only accepted offers become commitments",
                    offer.status
                )));
            }
            if commitments::get_by_offer(conn, offer_id)?.is_some() {
                return Err(MarketError::Conflict(format!(
                    "Offer {} already has a commitment",
                    offer_id
                )));
            }

            let commitment = commitments::create_from_offer(conn, ctx, &request, &offer)?;
            deliveries::schedule(conn, &commitment.id, &commitment.start_date, None)?;
            deliveries::refresh_next_delivery_date(conn, &commitment.id)?;
            recompute_parties(conn, &commitment)?;

            load_detail(conn, &commitment.id)
        })?;

        info!(
            id = %detail.commitment.id,
            offer = %offer_id,
            frequency = %detail.commitment.frequency,
            "Commitment created"
        );
        self.events.emit(MarketEvent::CommitmentCreated {
            id: detail.commitment.id.clone(),
            restaurant_organization_id: detail.commitment.restaurant_organization_id.clone(),
            farm_organization_id: detail.commitment.farm_organization_id.clone(),
        });
        Ok(detail)
    }

    /// The user's commitments split into active and everything else, each
    /// ordered by next delivery date with undated ones last
    pub fn list_for_user(&self, ctx: &UserContext) -> Result<CommitmentBoard, MarketError> {
        self.db.with_conn(|conn| {
            let org_ids = organizations::user_organization_ids(conn, &ctx.user_id)?;
            let rows = commitments::list_for_organizations(conn, &org_ids)?;
            let rows = commitments::with_parties(conn, rows)?;

            let (active, other): (Vec<_>, Vec<_>) = rows
                .into_iter()
                .partition(|c| c.commitment.status == commitment_statuses::ACTIVE);
            Ok(CommitmentBoard { active, other })
        })
    }

    pub fn get_detail(
        &self,
        ctx: &UserContext,
        commitment_id: &str,
    ) -> Result<CommitmentDetail, MarketError> {
        self.db.with_conn(|conn| {
            require_party(conn, ctx, commitment_id)?;
            load_detail(conn, commitment_id)
        })
    }

    /// Pause, resume, cancel or complete a commitment.
    ///
    /// Ending a commitment cancels its remaining scheduled deliveries and
    /// clears the next delivery date.
    pub fn set_status(
        &self,
        ctx: &UserContext,
        commitment_id: &str,
        status: &str,
    ) -> Result<CommitmentDetail, MarketError> {
        require_one_of("status", status, &commitment_statuses::ALL)?;

        let (previous, detail) = self.db.transaction(|conn| {
            let commitment = require_party(conn, ctx, commitment_id)?;
            if !commitment_statuses::can_transition(&commitment.status, status) {
                return Err(MarketError::transition(&commitment.status, status));
            }

            commitments::set_status(conn, commitment_id, status)?;
            if commitment_statuses::is_terminal(status) {
                deliveries::cancel_scheduled(conn, commitment_id)?;
            }
            deliveries::refresh_next_delivery_date(conn, commitment_id)?;
            recompute_parties(conn, &commitment)?;

            Ok((commitment.status, load_detail(conn, commitment_id)?))
        })?;

        info!(id = %commitment_id, from = %previous, to = %status, "Commitment status changed");
        self.events.emit(MarketEvent::CommitmentStatusChanged {
            id: commitment_id.to_string(),
            from: previous,
            to: status.to_string(),
        });
        Ok(detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::demand::{CreateDemandRequestInput, CreateOfferInput};
    use crate::db::models::{categories, delivery_statuses, frequencies, org_types};
    use crate::db::organizations::CreateOrganizationInput;
    use crate::services::Services;

    struct Deal {
        services: Services,
        offer_id: String,
    }

    fn accepted_offer(frequency: &str) -> Deal {
        let services = Services::open_in_memory().unwrap();
        let chef = UserContext::new("chef");
        let farmer = UserContext::new("farmer");

        let create = |ctx: &UserContext, org_type: &str| {
            services
                .organizations
                .create(
                    ctx,
                    CreateOrganizationInput {
                        name: format!("{} org", ctx.user_id),
                        org_type: org_type.into(),
                        description: None,
                        location: None,
                    },
                )
                .unwrap()
                .id
        };
        let bistro = create(&chef, org_types::RESTAURANT);
        let farm = create(&farmer, org_types::FARM);

        let request = services
            .demand
            .create_request(
                &chef,
                CreateDemandRequestInput {
                    organization_id: bistro,
                    product_name: "Pasture eggs".into(),
                    category: categories::DAIRY.into(),
                    quantity: 30.0,
                    unit: "dozen".into(),
                    description: None,
                    frequency: frequency.into(),
                    start_date: "2026-03-02".into(),
                    end_date: None,
                    preferred_radius_miles: 50,
                },
            )
            .unwrap();
        let offer = services
            .demand
            .create_offer(
                &farmer,
                &request.id,
                CreateOfferInput {
                    farm_organization_id: farm,
                    offered_quantity: 24.0,
                    offered_price: 5.5,
                    message: None,
                },
            )
            .unwrap();
        services.demand.accept_offer(&chef, &offer.id).unwrap();

        Deal {
            services,
            offer_id: offer.id,
        }
    }

    #[test]
    fn test_create_from_offer_copies_terms() {
        let deal = accepted_offer(frequencies::WEEKLY);
        let chef = UserContext::new("chef");

        let detail = deal
            .services
            .commitments
            .create_from_offer(&chef, &deal.offer_id)
            .unwrap();
        let c = &detail.commitment;
        assert_eq!(c.status, commitment_statuses::ACTIVE);
        assert_eq!(c.product_name, "Pasture eggs");
        assert_eq!(c.quantity, 24.0);
        assert_eq!(c.price, 5.5);
        assert_eq!(c.unit, "dozen");
        assert_eq!(c.next_delivery_date.as_deref(), Some("2026-03-02"));
        assert_eq!(detail.deliveries.len(), 1);
        assert_eq!(detail.deliveries[0].status, delivery_statuses::SCHEDULED);
        assert!(detail.restaurant.is_some() && detail.farm.is_some());

        // One commitment per offer
        assert!(matches!(
            deal.services.commitments.create_from_offer(&chef, &deal.offer_id),
            Err(MarketError::Conflict(_))
        ));

        // Both parties now carry a commitment in their reliability row
        let farm_score = deal.services.organizations.reliability(&c.farm_organization_id).unwrap();
        assert_eq!(farm_score.total_commitments, 1);
        assert_eq!(farm_score.active_partnerships, 1);
    }

    #[test]
    fn test_only_restaurant_creates_commitment() {
        let deal = accepted_offer(frequencies::WEEKLY);
        assert!(matches!(
            deal.services
                .commitments
                .create_from_offer(&UserContext::new("farmer"), &deal.offer_id),
            Err(MarketError::Forbidden(_))
        ));
    }

    #[test]
    fn test_status_transitions() {
        let deal = accepted_offer(frequencies::WEEKLY);
        let chef = UserContext::new("chef");
        let farmer = UserContext::new("farmer");
        let svc = &deal.services.commitments;
        let id = svc.create_from_offer(&chef, &deal.offer_id).unwrap().commitment.id;

        let paused = svc.set_status(&farmer, &id, commitment_statuses::PAUSED).unwrap();
        assert_eq!(paused.commitment.status, commitment_statuses::PAUSED);
        assert!(matches!(
            svc.set_status(&farmer, &id, commitment_statuses::COMPLETED),
            Err(MarketError::InvalidTransition { .. })
        ));

        svc.set_status(&chef, &id, commitment_statuses::ACTIVE).unwrap();
        let cancelled = svc.set_status(&chef, &id, commitment_statuses::CANCELLED).unwrap();
        assert!(cancelled.commitment.next_delivery_date.is_none());
        assert!(cancelled
            .deliveries
            .iter()
            .all(|d| d.status == delivery_statuses::CANCELLED));

        assert!(matches!(
            svc.set_status(&chef, &id, commitment_statuses::ACTIVE),
            Err(MarketError::InvalidTransition { .. })
        ));
        assert!(matches!(
            svc.set_status(&UserContext::new("stranger"), &id, commitment_statuses::PAUSED),
            Err(MarketError::Forbidden(_))
        ));
        assert!(matches!(
            svc.set_status(&chef, &id, "archived"),
            Err(MarketError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_board_splits_active() {
        let deal = accepted_offer(frequencies::MONTHLY);
        let chef = UserContext::new("chef");
        let svc = &deal.services.commitments;
        let id = svc.create_from_offer(&chef, &deal.offer_id).unwrap().commitment.id;

        let board = svc.list_for_user(&chef).unwrap();
        assert_eq!(board.active.len(), 1);
        assert!(board.other.is_empty());

        svc.set_status(&chef, &id, commitment_statuses::PAUSED).unwrap();
        let board = svc.list_for_user(&UserContext::new("farmer")).unwrap();
        assert!(board.active.is_empty());
        assert_eq!(board.other.len(), 1);

        assert!(matches!(
            svc.get_detail(&UserContext::new("stranger"), &id),
            Err(MarketError::Forbidden(_))
        ));
    }
}
