//! Profile reads and upserts keyed by the authenticated user id

use diesel::prelude::*;
use serde::Deserialize;

use super::context::UserContext;
use super::diesel_schema::profiles;
use super::models::{current_timestamp, NewProfile, Profile};
use crate::error::MarketError;

/// Input for creating or updating the caller's profile
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertProfileInput {
    #[serde(default)]
    pub email: Option<String>,
    pub user_type: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

pub fn get_profile(
    conn: &mut SqliteConnection,
    user_id: &str,
) -> Result<Option<Profile>, MarketError> {
    profiles::table
        .filter(profiles::id.eq(user_id))
        .select(Profile::as_select())
        .first(conn)
        .optional()
        .map_err(|e| MarketError::Internal(format!("Query failed: {}", e)))
}

/// Insert the profile or update it in place
pub fn upsert_profile(
    conn: &mut SqliteConnection,
    ctx: &UserContext,
    input: &UpsertProfileInput,
) -> Result<Profile, MarketError> {
    let now = current_timestamp();
    let new_profile = NewProfile {
        id: &ctx.user_id,
        email: input.email.as_deref(),
        user_type: &input.user_type,
        display_name: input.display_name.as_deref(),
        created_at: &now,
        updated_at: &now,
    };

    diesel::insert_into(profiles::table)
        .values(&new_profile)
        .on_conflict(profiles::id)
        .do_update()
        .set((
            profiles::email.eq(input.email.as_deref()),
            profiles::user_type.eq(&input.user_type),
            profiles::display_name.eq(input.display_name.as_deref()),
            profiles::updated_at.eq(&now),
        ))
        .execute(conn)?;

    get_profile(conn, &ctx.user_id)?
        .ok_or_else(|| MarketError::Internal("Failed to retrieve saved profile".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MarketDb;

    #[test]
    fn test_upsert_then_update() {
        let db = MarketDb::open_in_memory().unwrap();
        let ctx = UserContext::new("user-1");

        db.with_conn(|conn| {
            let created = upsert_profile(
                conn,
                &ctx,
                &UpsertProfileInput {
                    email: Some("grower@example.com".into()),
                    user_type: "farm".into(),
                    display_name: None,
                },
            )?;
            assert_eq!(created.user_type, "farm");

            let updated = upsert_profile(
                conn,
                &ctx,
                &UpsertProfileInput {
                    email: Some("grower@example.com".into()),
                    user_type: "restaurant".into(),
                    display_name: Some("Sam".into()),
                },
            )?;
            assert_eq!(updated.user_type, "restaurant");
            assert_eq!(updated.display_name.as_deref(), Some("Sam"));
            assert_eq!(updated.created_at, created.created_at);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_missing_profile_is_none() {
        let db = MarketDb::open_in_memory().unwrap();
        let found = db.with_conn(|conn| get_profile(conn, "nobody")).unwrap();
        assert!(found.is_none());
    }
}
