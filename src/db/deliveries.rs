//! Delivery schedule rows for commitments

use diesel::prelude::*;

use super::diesel_schema::{commitment_deliveries, commitments};
use super::models::{current_timestamp, delivery_statuses, CommitmentDelivery, NewCommitmentDelivery};
use super::new_id;
use crate::error::MarketError;

pub fn get_delivery(
    conn: &mut SqliteConnection,
    delivery_id: &str,
) -> Result<Option<CommitmentDelivery>, MarketError> {
    commitment_deliveries::table
        .filter(commitment_deliveries::id.eq(delivery_id))
        .select(CommitmentDelivery::as_select())
        .first(conn)
        .optional()
        .map_err(|e| MarketError::Internal(format!("Query failed: {}", e)))
}

/// Deliveries of a commitment, latest scheduled first
pub fn list_for_commitment(
    conn: &mut SqliteConnection,
    commitment_id: &str,
) -> Result<Vec<CommitmentDelivery>, MarketError> {
    commitment_deliveries::table
        .filter(commitment_deliveries::commitment_id.eq(commitment_id))
        .order((
            commitment_deliveries::scheduled_date.desc(),
            commitment_deliveries::created_at.desc(),
        ))
        .select(CommitmentDelivery::as_select())
        .load(conn)
        .map_err(|e| MarketError::Internal(format!("Query failed: {}", e)))
}

pub fn schedule(
    conn: &mut SqliteConnection,
    commitment_id: &str,
    scheduled_date: &str,
    notes: Option<&str>,
) -> Result<CommitmentDelivery, MarketError> {
    let id = new_id();
    let now = current_timestamp();

    diesel::insert_into(commitment_deliveries::table)
        .values(&NewCommitmentDelivery {
            id: &id,
            commitment_id,
            scheduled_date,
            status: delivery_statuses::SCHEDULED,
            notes,
            created_at: &now,
            updated_at: &now,
        })
        .execute(conn)?;

    get_delivery(conn, &id)?
        .ok_or_else(|| MarketError::Internal("Failed to retrieve scheduled delivery".into()))
}

/// Mark a scheduled delivery completed. Notes are kept when `notes` is None.
pub fn complete(
    conn: &mut SqliteConnection,
    delivery_id: &str,
    completed_date: &str,
    quantity_delivered: f64,
    notes: Option<&str>,
) -> Result<CommitmentDelivery, MarketError> {
    let target = commitment_deliveries::table
        .filter(commitment_deliveries::id.eq(delivery_id))
        .filter(commitment_deliveries::status.eq(delivery_statuses::SCHEDULED));

    let updated = match notes {
        Some(notes) => diesel::update(target)
            .set((
                commitment_deliveries::status.eq(delivery_statuses::COMPLETED),
                commitment_deliveries::completed_date.eq(completed_date),
                commitment_deliveries::quantity_delivered.eq(quantity_delivered),
                commitment_deliveries::notes.eq(notes),
                commitment_deliveries::updated_at.eq(current_timestamp()),
            ))
            .execute(conn)?,
        None => diesel::update(target)
            .set((
                commitment_deliveries::status.eq(delivery_statuses::COMPLETED),
                commitment_deliveries::completed_date.eq(completed_date),
                commitment_deliveries::quantity_delivered.eq(quantity_delivered),
                commitment_deliveries::updated_at.eq(current_timestamp()),
            ))
            .execute(conn)?,
    };

    if updated == 0 {
        return Err(MarketError::Conflict(format!(
            "Delivery {} is no longer scheduled",
            delivery_id
        )));
    }

    get_delivery(conn, delivery_id)?
        .ok_or_else(|| MarketError::NotFound(format!("Delivery {}", delivery_id)))
}

/// Move a scheduled delivery to `missed` or `cancelled`
pub fn close(
    conn: &mut SqliteConnection,
    delivery_id: &str,
    status: &str,
) -> Result<CommitmentDelivery, MarketError> {
    let updated = diesel::update(
        commitment_deliveries::table
            .filter(commitment_deliveries::id.eq(delivery_id))
            .filter(commitment_deliveries::status.eq(delivery_statuses::SCHEDULED)),
    )
    .set((
        commitment_deliveries::status.eq(status),
        commitment_deliveries::updated_at.eq(current_timestamp()),
    ))
    .execute(conn)?;

    if updated == 0 {
        return Err(MarketError::Conflict(format!(
            "Delivery {} is no longer scheduled",
            delivery_id
        )));
    }

    get_delivery(conn, delivery_id)?
        .ok_or_else(|| MarketError::NotFound(format!("Delivery {}", delivery_id)))
}

/// Cancel every still-scheduled delivery of a commitment
pub fn cancel_scheduled(
    conn: &mut SqliteConnection,
    commitment_id: &str,
) -> Result<usize, MarketError> {
    diesel::update(
        commitment_deliveries::table
            .filter(commitment_deliveries::commitment_id.eq(commitment_id))
            .filter(commitment_deliveries::status.eq(delivery_statuses::SCHEDULED)),
    )
    .set((
        commitment_deliveries::status.eq(delivery_statuses::CANCELLED),
        commitment_deliveries::updated_at.eq(current_timestamp()),
    ))
    .execute(conn)
    .map_err(MarketError::from)
}

/// Earliest date still scheduled for a commitment
pub fn earliest_scheduled(
    conn: &mut SqliteConnection,
    commitment_id: &str,
) -> Result<Option<String>, MarketError> {
    commitment_deliveries::table
        .filter(commitment_deliveries::commitment_id.eq(commitment_id))
        .filter(commitment_deliveries::status.eq(delivery_statuses::SCHEDULED))
        .order(commitment_deliveries::scheduled_date.asc())
        .select(commitment_deliveries::scheduled_date)
        .first(conn)
        .optional()
        .map_err(|e| MarketError::Internal(format!("Query failed: {}", e)))
}

/// Whether a delivery is already scheduled on `date`
pub fn is_scheduled_on(
    conn: &mut SqliteConnection,
    commitment_id: &str,
    date: &str,
) -> Result<bool, MarketError> {
    let count: i64 = commitment_deliveries::table
        .filter(commitment_deliveries::commitment_id.eq(commitment_id))
        .filter(commitment_deliveries::status.eq(delivery_statuses::SCHEDULED))
        .filter(commitment_deliveries::scheduled_date.eq(date))
        .count()
        .get_result(conn)
        .map_err(|e| MarketError::Internal(format!("Query failed: {}", e)))?;
    Ok(count > 0)
}

/// Point the commitment's `next_delivery_date` at its earliest scheduled
/// delivery, or clear it
pub fn refresh_next_delivery_date(
    conn: &mut SqliteConnection,
    commitment_id: &str,
) -> Result<Option<String>, MarketError> {
    let next = earliest_scheduled(conn, commitment_id)?;

    diesel::update(commitments::table.filter(commitments::id.eq(commitment_id)))
        .set((
            commitments::next_delivery_date.eq(next.as_deref()),
            commitments::updated_at.eq(current_timestamp()),
        ))
        .execute(conn)?;

    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MarketDb;
    use diesel::connection::SimpleConnection;

    // Minimal parent rows written directly so these tests only exercise
    // the delivery queries.
    fn seed(conn: &mut SqliteConnection) {
        conn.batch_execute(
            "INSERT INTO organizations (id, name, org_type, pickup_available, created_by, created_at, updated_at) VALUES \
               ('farm', 'Farm', 'farm', 0, 'u1', 't', 't'), \
               ('rest', 'Bistro', 'restaurant', 0, 'u2', 't', 't'); \
             INSERT INTO commitments (id, restaurant_organization_id, farm_organization_id, product_name, quantity, unit, price, frequency, start_date, status, created_by, created_at, updated_at) VALUES \
               ('c1', 'rest', 'farm', 'Eggs', 30, 'dozen', 4.0, 'weekly', '2026-06-01', 'active', 'u2', 't', 't');",
        )
        .unwrap();
    }

    #[test]
    fn test_next_delivery_tracks_earliest_scheduled() {
        let db = MarketDb::open_in_memory().unwrap();
        db.with_conn(|conn| {
            seed(conn);
            let late = schedule(conn, "c1", "2026-06-15", None)?;
            let early = schedule(conn, "c1", "2026-06-08", Some("gate code 42"))?;

            assert_eq!(refresh_next_delivery_date(conn, "c1")?.as_deref(), Some("2026-06-08"));

            complete(conn, &early.id, "2026-06-08", 30.0, None)?;
            assert_eq!(refresh_next_delivery_date(conn, "c1")?.as_deref(), Some("2026-06-15"));

            close(conn, &late.id, delivery_statuses::MISSED)?;
            assert_eq!(refresh_next_delivery_date(conn, "c1")?, None);

            let listed = list_for_commitment(conn, "c1")?;
            assert_eq!(listed[0].scheduled_date, "2026-06-15");
            assert_eq!(listed[1].notes.as_deref(), Some("gate code 42"));
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_only_scheduled_deliveries_change() {
        let db = MarketDb::open_in_memory().unwrap();
        db.with_conn(|conn| {
            seed(conn);
            let delivery = schedule(conn, "c1", "2026-06-08", None)?;
            close(conn, &delivery.id, delivery_statuses::CANCELLED)?;

            let again = complete(conn, &delivery.id, "2026-06-08", 1.0, None);
            assert!(matches!(again, Err(MarketError::Conflict(_))));
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_cancel_scheduled_skips_resolved() {
        let db = MarketDb::open_in_memory().unwrap();
        db.with_conn(|conn| {
            seed(conn);
            let done = schedule(conn, "c1", "2026-06-01", None)?;
            complete(conn, &done.id, "2026-06-01", 30.0, None)?;
            schedule(conn, "c1", "2026-06-08", None)?;
            schedule(conn, "c1", "2026-06-15", None)?;

            assert_eq!(cancel_scheduled(conn, "c1")?, 2);
            let done = get_delivery(conn, &done.id)?.unwrap();
            assert_eq!(done.status, delivery_statuses::COMPLETED);
            Ok(())
        })
        .unwrap();
    }
}
