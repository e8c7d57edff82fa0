//! Product listing operations using Diesel
//!
//! Listings belong to farm organizations. Surplus listings are ordinary
//! products flagged `is_surplus` with a reason and an optional discount.

use diesel::prelude::*;
use serde::Deserialize;

use super::context::UserContext;
use super::diesel_schema::products;
use super::models::{current_timestamp, NewProduct, Product, ProductWithOrganization};
use super::{new_id, organizations};
use crate::error::MarketError;

// ============================================================================
// Input Types
// ============================================================================

/// Input for creating a product listing
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category: String,
    pub price: f64,
    pub quantity: f64,
    pub unit: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default = "default_available")]
    pub available: bool,
    #[serde(default)]
    pub is_surplus: bool,
    #[serde(default)]
    pub surplus_reason: Option<String>,
    #[serde(default)]
    pub discount_percentage: Option<i32>,
}

fn default_available() -> bool {
    true
}

// ============================================================================
// Read Operations
// ============================================================================

pub fn get_product(
    conn: &mut SqliteConnection,
    product_id: &str,
) -> Result<Option<Product>, MarketError> {
    products::table
        .filter(products::id.eq(product_id))
        .select(Product::as_select())
        .first(conn)
        .optional()
        .map_err(|e| MarketError::Internal(format!("Query failed: {}", e)))
}

/// Available products, newest first, optionally narrowed to one category
pub fn list_available(
    conn: &mut SqliteConnection,
    category: Option<&str>,
) -> Result<Vec<Product>, MarketError> {
    let mut query = products::table
        .filter(products::available.eq(1))
        .select(Product::as_select())
        .into_boxed();

    if let Some(category) = category {
        query = query.filter(products::category.eq(category));
    }

    query
        .order((products::created_at.desc(), products::id.asc()))
        .load(conn)
        .map_err(|e| MarketError::Internal(format!("Query failed: {}", e)))
}

/// Available surplus products, newest first
pub fn list_surplus(conn: &mut SqliteConnection) -> Result<Vec<Product>, MarketError> {
    products::table
        .filter(products::is_surplus.eq(1))
        .filter(products::available.eq(1))
        .order((products::created_at.desc(), products::id.asc()))
        .select(Product::as_select())
        .load(conn)
        .map_err(|e| MarketError::Internal(format!("Query failed: {}", e)))
}

/// Every listing of an organization, including unavailable ones
pub fn list_for_organization(
    conn: &mut SqliteConnection,
    org_id: &str,
) -> Result<Vec<Product>, MarketError> {
    products::table
        .filter(products::organization_id.eq(org_id))
        .order((products::created_at.desc(), products::id.asc()))
        .select(Product::as_select())
        .load(conn)
        .map_err(|e| MarketError::Internal(format!("Query failed: {}", e)))
}

pub fn count_available_surplus(conn: &mut SqliteConnection) -> Result<i64, MarketError> {
    products::table
        .filter(products::is_surplus.eq(1))
        .filter(products::available.eq(1))
        .count()
        .get_result(conn)
        .map_err(|e| MarketError::Internal(format!("Query failed: {}", e)))
}

/// Names of the given products, keyed by id
pub fn product_names(
    conn: &mut SqliteConnection,
    ids: &[&str],
) -> Result<std::collections::HashMap<String, String>, MarketError> {
    if ids.is_empty() {
        return Ok(Default::default());
    }

    let rows: Vec<(String, String)> = products::table
        .filter(products::id.eq_any(ids))
        .select((products::id, products::name))
        .load(conn)
        .map_err(|e| MarketError::Internal(format!("Query failed: {}", e)))?;

    Ok(rows.into_iter().collect())
}

/// Attach the owning organization to each product
pub fn with_organizations(
    conn: &mut SqliteConnection,
    rows: Vec<Product>,
) -> Result<Vec<ProductWithOrganization>, MarketError> {
    let ids: Vec<&str> = rows.iter().map(|p| p.organization_id.as_str()).collect();
    let orgs = organizations::get_organizations_by_ids(conn, &ids)?;

    Ok(rows
        .into_iter()
        .map(|product| {
            let organization = orgs.get(&product.organization_id).cloned();
            ProductWithOrganization {
                product,
                organization,
            }
        })
        .collect())
}

// ============================================================================
// Write Operations
// ============================================================================

/// Insert a listing; surplus details are dropped for regular listings
pub fn create_product(
    conn: &mut SqliteConnection,
    ctx: &UserContext,
    org_id: &str,
    input: &CreateProductInput,
) -> Result<Product, MarketError> {
    let id = new_id();
    let now = current_timestamp();

    let (surplus_reason, discount_percentage) = if input.is_surplus {
        (input.surplus_reason.as_deref(), input.discount_percentage)
    } else {
        (None, None)
    };

    let new_product = NewProduct {
        id: &id,
        organization_id: org_id,
        name: input.name.trim(),
        description: input.description.as_deref(),
        category: &input.category,
        price: input.price,
        quantity: input.quantity,
        unit: input.unit.trim(),
        location: input.location.as_deref(),
        image_url: input.image_url.as_deref(),
        available: if input.available { 1 } else { 0 },
        is_surplus: if input.is_surplus { 1 } else { 0 },
        surplus_reason,
        discount_percentage,
        created_by: &ctx.user_id,
        created_at: &now,
        updated_at: &now,
    };

    diesel::insert_into(products::table)
        .values(&new_product)
        .execute(conn)?;

    get_product(conn, &id)?
        .ok_or_else(|| MarketError::Internal("Failed to retrieve created product".into()))
}

pub fn set_availability(
    conn: &mut SqliteConnection,
    product_id: &str,
    available: bool,
) -> Result<Product, MarketError> {
    let updated = diesel::update(products::table.filter(products::id.eq(product_id)))
        .set((
            products::available.eq(if available { 1 } else { 0 }),
            products::updated_at.eq(current_timestamp()),
        ))
        .execute(conn)?;

    if updated == 0 {
        return Err(MarketError::NotFound(format!("Product {}", product_id)));
    }

    get_product(conn, product_id)?
        .ok_or_else(|| MarketError::NotFound(format!("Product {}", product_id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{categories, org_types, surplus_reasons};
    use crate::db::organizations::{create_organization, CreateOrganizationInput};
    use crate::db::MarketDb;

    fn input(name: &str, category: &str, surplus: bool) -> CreateProductInput {
        CreateProductInput {
            name: name.into(),
            description: None,
            category: category.into(),
            price: 3.5,
            quantity: 40.0,
            unit: "lb".into(),
            location: None,
            image_url: None,
            available: true,
            is_surplus: surplus,
            surplus_reason: Some(surplus_reasons::EXCESS.into()),
            discount_percentage: Some(30),
        }
    }

    fn setup(db: &MarketDb) -> String {
        db.with_conn(|conn| {
            let org = create_organization(
                conn,
                &UserContext::new("farmer"),
                &CreateOrganizationInput {
                    name: "Green Acres".into(),
                    org_type: org_types::FARM.into(),
                    description: None,
                    location: None,
                },
            )?;
            Ok(org.id)
        })
        .unwrap()
    }

    #[test]
    fn test_regular_listing_drops_surplus_details() {
        let db = MarketDb::open_in_memory().unwrap();
        let org_id = setup(&db);
        let ctx = UserContext::new("farmer");

        let product = db
            .with_conn(|conn| create_product(conn, &ctx, &org_id, &input("Kale", categories::PRODUCE, false)))
            .unwrap();

        assert_eq!(product.is_surplus, 0);
        assert!(product.surplus_reason.is_none());
        assert!(product.discount_percentage.is_none());
    }

    #[test]
    fn test_list_filters() {
        let db = MarketDb::open_in_memory().unwrap();
        let org_id = setup(&db);
        let ctx = UserContext::new("farmer");

        db.with_conn(|conn| {
            create_product(conn, &ctx, &org_id, &input("Kale", categories::PRODUCE, false))?;
            create_product(conn, &ctx, &org_id, &input("Milk", categories::DAIRY, true))?;
            let hidden =
                create_product(conn, &ctx, &org_id, &input("Squash", categories::PRODUCE, true))?;
            set_availability(conn, &hidden.id, false)?;

            assert_eq!(list_available(conn, None)?.len(), 2);
            let produce = list_available(conn, Some(categories::PRODUCE))?;
            assert_eq!(produce.len(), 1);
            assert_eq!(produce[0].name, "Kale");

            let surplus = list_surplus(conn)?;
            assert_eq!(surplus.len(), 1);
            assert_eq!(surplus[0].name, "Milk");
            assert_eq!(count_available_surplus(conn)?, 1);

            assert_eq!(list_for_organization(conn, &org_id)?.len(), 3);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_with_organizations_attaches_summary() {
        let db = MarketDb::open_in_memory().unwrap();
        let org_id = setup(&db);
        let ctx = UserContext::new("farmer");

        let rows = db
            .with_conn(|conn| {
                create_product(conn, &ctx, &org_id, &input("Kale", categories::PRODUCE, false))?;
                let products = list_available(conn, None)?;
                with_organizations(conn, products)
            })
            .unwrap();

        assert_eq!(rows[0].organization.as_ref().unwrap().name, "Green Acres");
    }
}
