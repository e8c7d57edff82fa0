//! Demand service - the demand board and supply offers

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::info;

use crate::db::demand::{CreateDemandRequestInput, CreateOfferInput};
use crate::db::models::{
    categories, frequencies, offer_statuses, org_types, request_statuses, DemandOffer,
    DemandRequest, DemandRequestDetail, DemandRequestWithOrganization, DATE_FORMAT,
};
use crate::db::{demand, organizations, reliability, MarketDb, UserContext};
use crate::error::MarketError;

use super::events::{EventBus, MarketEvent};
use super::organization_service::{require_member, require_member_of_type};
use super::validation::{
    non_blank, require_date, require_non_empty, require_non_negative, require_one_of,
    require_positive,
};

pub struct DemandService {
    db: Arc<MarketDb>,
    events: Arc<EventBus>,
}

impl DemandService {
    pub fn new(db: Arc<MarketDb>, events: Arc<EventBus>) -> Self {
        Self { db, events }
    }

    // =========================================================================
    // Demand Requests
    // =========================================================================

    /// Active requests, newest first, with restaurant and reliability
    pub fn list_active(&self) -> Result<Vec<DemandRequestWithOrganization>, MarketError> {
        self.db.with_conn(|conn| {
            let rows = demand::list_active(conn)?;
            demand::with_organizations(conn, rows)
        })
    }

    pub fn get_detail(
        &self,
        ctx: &UserContext,
        request_id: &str,
    ) -> Result<Option<DemandRequestDetail>, MarketError> {
        self.db.with_conn(|conn| {
            let Some(request) = demand::get_request(conn, request_id)? else {
                return Ok(None);
            };

            let organization = organizations::get_organization(conn, &request.organization_id)?;
            let reliability = reliability::get(conn, &request.organization_id)?;
            let offers = demand::list_offers_for_request(conn, request_id)?;
            let is_owner = organizations::is_member(conn, &ctx.user_id, &request.organization_id)?;

            Ok(Some(DemandRequestDetail {
                request,
                organization,
                reliability,
                offers,
                is_owner,
            }))
        })
    }

    pub fn create_request(
        &self,
        ctx: &UserContext,
        input: CreateDemandRequestInput,
    ) -> Result<DemandRequest, MarketError> {
        let (start, end) = validate_request(&input)?;

        let input = CreateDemandRequestInput {
            description: non_blank(input.description.as_deref()).map(str::to_string),
            start_date: start.format(DATE_FORMAT).to_string(),
            end_date: end.map(|d| d.format(DATE_FORMAT).to_string()),
            ..input
        };

        let request = self.db.transaction(|conn| {
            require_member_of_type(conn, ctx, &input.organization_id, org_types::RESTAURANT)?;
            demand::create_request(conn, ctx, &input)
        })?;

        info!(id = %request.id, org = %request.organization_id, "Demand request posted");
        self.events.emit(MarketEvent::DemandRequestCreated {
            id: request.id.clone(),
            organization_id: request.organization_id.clone(),
            product_name: request.product_name.clone(),
        });
        Ok(request)
    }

    /// Close a request as fulfilled or cancelled; owner only
    pub fn set_status(
        &self,
        ctx: &UserContext,
        request_id: &str,
        status: &str,
    ) -> Result<DemandRequest, MarketError> {
        require_one_of("status", status, &request_statuses::ALL)?;

        let request = self.db.transaction(|conn| {
            let request = demand::get_request(conn, request_id)?
                .ok_or_else(|| MarketError::NotFound(format!("Demand request {}", request_id)))?;
            require_member(conn, ctx, &request.organization_id)?;

            if !request_statuses::can_transition(&request.status, status) {
                return Err(MarketError::transition(&request.status, status));
            }
            demand::set_request_status(conn, request_id, status)
        })?;

        self.events.emit(MarketEvent::DemandRequestStatusChanged {
            id: request.id.clone(),
            status: request.status.clone(),
        });
        Ok(request)
    }

    // =========================================================================
    // Offers
    // =========================================================================

    pub fn create_offer(
        &self,
        ctx: &UserContext,
        request_id: &str,
        input: CreateOfferInput,
    ) -> Result<DemandOffer, MarketError> {
        require_positive("offeredQuantity", input.offered_quantity)?;
        require_non_negative("offeredPrice", input.offered_price)?;

        let input = CreateOfferInput {
            message: non_blank(input.message.as_deref()).map(str::to_string),
            ..input
        };

        let offer = self.db.transaction(|conn| {
            let request = demand::get_request(conn, request_id)?
                .ok_or_else(|| MarketError::NotFound(format!("Demand request {}", request_id)))?;
            if request.status != request_statuses::ACTIVE {
                return Err(MarketError::Conflict(format!(
                    "Demand request is {}, not accepting offers",
                    request.status
                )));
            }

            require_member_of_type(conn, ctx, &input.farm_organization_id, org_types::FARM)?;
            demand::create_offer(conn, ctx, request_id, &input)
        })?;

        info!(id = %offer.id, request = %request_id, farm = %offer.farm_organization_id, "Offer submitted");
        self.events.emit(MarketEvent::OfferCreated {
            id: offer.id.clone(),
            demand_request_id: offer.demand_request_id.clone(),
            farm_organization_id: offer.farm_organization_id.clone(),
        });
        Ok(offer)
    }

    pub fn accept_offer(&self, ctx: &UserContext, offer_id: &str) -> Result<DemandOffer, MarketError> {
        self.decide_offer(ctx, offer_id, offer_statuses::ACCEPTED)
    }

    pub fn reject_offer(&self, ctx: &UserContext, offer_id: &str) -> Result<DemandOffer, MarketError> {
        self.decide_offer(ctx, offer_id, offer_statuses::REJECTED)
    }

    fn decide_offer(
        &self,
        ctx: &UserContext,
        offer_id: &str,
        status: &str,
    ) -> Result<DemandOffer, MarketError> {
        let offer = self.db.transaction(|conn| {
            let offer = demand::get_offer(conn, offer_id)?
                .ok_or_else(|| MarketError::NotFound(format!("Offer {}", offer_id)))?;
            let request = demand::get_request(conn, &offer.demand_request_id)?.ok_or_else(|| {
                MarketError::NotFound(format!("Demand request {}", offer.demand_request_id))
            })?;
            require_member(conn, ctx, &request.organization_id)?;

            if status == offer_statuses::ACCEPTED && request.status != request_statuses::ACTIVE {
                return Err(MarketError::Conflict(format!(
                    "Demand request is {}, offers can no longer be accepted",
                    request.status
                )));
            }

            demand::decide_offer(conn, offer_id, status)?
                .ok_or_else(|| MarketError::transition(&offer.status, status))
        })?;

        info!(id = %offer.id, status = %offer.status, "Offer decided");
        self.events.emit(MarketEvent::OfferStatusChanged {
            id: offer.id.clone(),
            status: offer.status.clone(),
        });
        Ok(offer)
    }
}

/// Checks the request and returns its parsed term
fn validate_request(
    input: &CreateDemandRequestInput,
) -> Result<(NaiveDate, Option<NaiveDate>), MarketError> {
    require_non_empty("productName", &input.product_name)?;
    require_non_empty("unit", &input.unit)?;
    require_one_of("category", &input.category, &categories::ALL)?;
    require_one_of("frequency", &input.frequency, &frequencies::ALL)?;
    require_positive("quantity", input.quantity)?;

    let start = require_date("startDate", &input.start_date)?;
    let end = match non_blank(input.end_date.as_deref()) {
        Some(value) => Some(require_date("endDate", value)?),
        None => None,
    };
    if end.is_some_and(|end| end < start) {
        return Err(MarketError::InvalidInput(
            "endDate must not be before startDate".into(),
        ));
    }

    if input.preferred_radius_miles < 1 {
        return Err(MarketError::InvalidInput(
            "preferredRadiusMiles must be at least 1".into(),
        ));
    }
    Ok((start, end))
}
