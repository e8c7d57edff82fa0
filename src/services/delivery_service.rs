//! Delivery service - scheduling and resolving deliveries of a commitment
//!
//! Completing a delivery of a weekly, bi-weekly or monthly commitment
//! schedules the following one; completing the delivery of a one-time
//! commitment completes the commitment, so a paused one-time commitment
//! must be resumed before its delivery can be completed.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info};

use crate::db::models::{
    commitment_statuses, current_date, delivery_statuses, frequencies, parse_date,
    CommitmentDelivery, DeliveryOutcome, DATE_FORMAT,
};
use crate::db::{commitments, deliveries, MarketDb, UserContext};
use crate::error::MarketError;

use super::commitment_service::{recompute_parties, require_party};
use super::events::{EventBus, MarketEvent};
use super::validation::{non_blank, require_date, require_non_negative};

/// Input for scheduling a delivery
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleDeliveryInput {
    pub scheduled_date: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Input for completing a delivery; omitted fields take the commitment
/// quantity and today's date
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteDeliveryInput {
    #[serde(default)]
    pub quantity_delivered: Option<f64>,
    #[serde(default)]
    pub completed_date: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

pub struct DeliveryService {
    db: Arc<MarketDb>,
    events: Arc<EventBus>,
}

impl DeliveryService {
    pub fn new(db: Arc<MarketDb>, events: Arc<EventBus>) -> Self {
        Self { db, events }
    }

    pub fn schedule(
        &self,
        ctx: &UserContext,
        commitment_id: &str,
        input: ScheduleDeliveryInput,
    ) -> Result<CommitmentDelivery, MarketError> {
        let date = require_date("scheduledDate", &input.scheduled_date)?;
        let date_str = date.format(DATE_FORMAT).to_string();
        let notes = non_blank(input.notes.as_deref());

        let delivery = self.db.transaction(|conn| {
            let commitment = require_party(conn, ctx, commitment_id)?;
            if commitment.status != commitment_statuses::ACTIVE {
                return Err(MarketError::Conflict(format!(
                    "Commitment is {}, deliveries can only be scheduled while active",
                    commitment.status
                )));
            }
            if let Some(end) = commitment.end_date.as_deref().and_then(parse_date) {
                if date > end {
                    return Err(MarketError::InvalidInput(format!(
                        "scheduledDate is after the commitment end date {}",
                        end.format(DATE_FORMAT)
                    )));
                }
            }

            let delivery = deliveries::schedule(conn, commitment_id, &date_str, notes)?;
            deliveries::refresh_next_delivery_date(conn, commitment_id)?;
            Ok(delivery)
        })?;

        self.events.emit(MarketEvent::DeliveryScheduled {
            id: delivery.id.clone(),
            commitment_id: delivery.commitment_id.clone(),
            scheduled_date: delivery.scheduled_date.clone(),
        });
        Ok(delivery)
    }

    /// Mark a scheduled delivery completed and roll the schedule forward
    pub fn complete(
        &self,
        ctx: &UserContext,
        delivery_id: &str,
        input: CompleteDeliveryInput,
    ) -> Result<DeliveryOutcome, MarketError> {
        let completed_date = match non_blank(input.completed_date.as_deref()) {
            Some(value) => require_date("completedDate", value)?.format(DATE_FORMAT).to_string(),
            None => current_date(),
        };
        if let Some(quantity) = input.quantity_delivered {
            require_non_negative("quantityDelivered", quantity)?;
        }
        let notes = non_blank(input.notes.as_deref());

        let outcome = self.db.transaction(|conn| {
            let delivery = deliveries::get_delivery(conn, delivery_id)?
                .ok_or_else(|| MarketError::NotFound(format!("Delivery {}", delivery_id)))?;
            let commitment = require_party(conn, ctx, &delivery.commitment_id)?;

            if !delivery_statuses::can_transition(&delivery.status, delivery_statuses::COMPLETED) {
                return Err(MarketError::transition(&delivery.status, delivery_statuses::COMPLETED));
            }
            if commitment_statuses::is_terminal(&commitment.status) {
                return Err(MarketError::Conflict(format!(
                    "Commitment is {}",
                    commitment.status
                )));
            }
            let completes_commitment = commitment.frequency == frequencies::ONE_TIME;
            if completes_commitment
                && !commitment_statuses::can_transition(&commitment.status, commitment_statuses::COMPLETED)
            {
                return Err(MarketError::Conflict(format!(
                    "Commitment is {}, resume it before completing its delivery",
                    commitment.status
                )));
            }

            let quantity = input.quantity_delivered.unwrap_or(commitment.quantity);
            let done = deliveries::complete(conn, delivery_id, &completed_date, quantity, notes)?;

            let mut next_delivery = None;
            if completes_commitment {
                commitments::set_status(conn, &commitment.id, commitment_statuses::COMPLETED)?;
                deliveries::cancel_scheduled(conn, &commitment.id)?;
            } else if commitment.status == commitment_statuses::ACTIVE {
                let next_date = parse_date(&done.scheduled_date)
                    .and_then(|d| frequencies::next_after(&commitment.frequency, d));
                let end_date = commitment.end_date.as_deref().and_then(parse_date);

                if let Some(next_date) = next_date {
                    let within_term = end_date.map_or(true, |end| next_date <= end);
                    let next_str = next_date.format(DATE_FORMAT).to_string();
                    if within_term && !deliveries::is_scheduled_on(conn, &commitment.id, &next_str)? {
                        next_delivery = Some(deliveries::schedule(conn, &commitment.id, &next_str, None)?);
                    } else {
                        debug!(commitment = %commitment.id, next = %next_str, "No follow-up delivery scheduled");
                    }
                }
            }

            deliveries::refresh_next_delivery_date(conn, &commitment.id)?;
            recompute_parties(conn, &commitment)?;

            let commitment = commitments::get_commitment(conn, &commitment.id)?
                .ok_or_else(|| MarketError::NotFound(format!("Commitment {}", commitment.id)))?;
            Ok(DeliveryOutcome {
                delivery: done,
                next_delivery,
                commitment,
            })
        })?;

        info!(
            id = %delivery_id,
            commitment = %outcome.commitment.id,
            next = ?outcome.next_delivery.as_ref().map(|d| &d.scheduled_date),
            "Delivery completed"
        );
        self.emit_updated(&outcome.delivery);
        if let Some(next) = &outcome.next_delivery {
            self.events.emit(MarketEvent::DeliveryScheduled {
                id: next.id.clone(),
                commitment_id: next.commitment_id.clone(),
                scheduled_date: next.scheduled_date.clone(),
            });
        }
        Ok(outcome)
    }

    pub fn mark_missed(
        &self,
        ctx: &UserContext,
        delivery_id: &str,
    ) -> Result<CommitmentDelivery, MarketError> {
        self.close(ctx, delivery_id, delivery_statuses::MISSED)
    }

    pub fn cancel(
        &self,
        ctx: &UserContext,
        delivery_id: &str,
    ) -> Result<CommitmentDelivery, MarketError> {
        self.close(ctx, delivery_id, delivery_statuses::CANCELLED)
    }

    fn close(
        &self,
        ctx: &UserContext,
        delivery_id: &str,
        status: &str,
    ) -> Result<CommitmentDelivery, MarketError> {
        let delivery = self.db.transaction(|conn| {
            let delivery = deliveries::get_delivery(conn, delivery_id)?
                .ok_or_else(|| MarketError::NotFound(format!("Delivery {}", delivery_id)))?;
            let commitment = require_party(conn, ctx, &delivery.commitment_id)?;

            if !delivery_statuses::can_transition(&delivery.status, status) {
                return Err(MarketError::transition(&delivery.status, status));
            }

            let closed = deliveries::close(conn, delivery_id, status)?;
            deliveries::refresh_next_delivery_date(conn, &commitment.id)?;
            recompute_parties(conn, &commitment)?;
            Ok(closed)
        })?;

        info!(id = %delivery_id, status = %status, "Delivery closed");
        self.emit_updated(&delivery);
        Ok(delivery)
    }

    fn emit_updated(&self, delivery: &CommitmentDelivery) {
        self.events.emit(MarketEvent::DeliveryUpdated {
            id: delivery.id.clone(),
            commitment_id: delivery.commitment_id.clone(),
            status: delivery.status.clone(),
        });
    }
}
