//! Dashboard service - the signed-in landing summary

use std::sync::Arc;

use crate::db::models::DashboardSummary;
use crate::db::{commitments, demand, organizations, products, profiles, MarketDb, UserContext};
use crate::error::MarketError;

pub struct DashboardService {
    db: Arc<MarketDb>,
}

impl DashboardService {
    pub fn new(db: Arc<MarketDb>) -> Self {
        Self { db }
    }

    /// Profile, organizations and the marketplace counters.
    ///
    /// Active commitments are counted across the user's organizations; the
    /// demand and surplus counters are marketplace-wide.
    pub fn summary(&self, ctx: &UserContext) -> Result<DashboardSummary, MarketError> {
        self.db.with_conn(|conn| {
            let profile = profiles::get_profile(conn, &ctx.user_id)?;
            let organizations = organizations::list_user_organizations(conn, &ctx.user_id)?;
            let org_ids: Vec<String> = organizations.iter().map(|o| o.id.clone()).collect();

            Ok(DashboardSummary {
                profile,
                active_commitments: commitments::count_active_for_organizations(conn, &org_ids)?,
                active_demand_requests: demand::count_active(conn)?,
                surplus_products: products::count_available_surplus(conn)?,
                organizations,
            })
        })
    }
}
