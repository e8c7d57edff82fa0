//! Product service - listings and surplus listings

use std::sync::Arc;

use tracing::info;

use crate::db::models::{
    categories, org_types, surplus_reasons, Product, ProductDetail, ProductWithOrganization,
};
use crate::db::products::CreateProductInput;
use crate::db::{organizations, products, MarketDb, UserContext};
use crate::error::MarketError;

use super::events::{EventBus, MarketEvent};
use super::organization_service::{require_member, require_member_of_type};
use super::validation::{non_blank, require_non_empty, require_non_negative, require_one_of};

pub struct ProductService {
    db: Arc<MarketDb>,
    events: Arc<EventBus>,
}

impl ProductService {
    pub fn new(db: Arc<MarketDb>, events: Arc<EventBus>) -> Self {
        Self { db, events }
    }

    // =========================================================================
    // Read Operations
    // =========================================================================

    /// Available listings, newest first
    pub fn list_available(
        &self,
        category: Option<&str>,
    ) -> Result<Vec<ProductWithOrganization>, MarketError> {
        if let Some(category) = category {
            require_one_of("category", category, &categories::ALL)?;
        }

        self.db.with_conn(|conn| {
            let rows = products::list_available(conn, category)?;
            products::with_organizations(conn, rows)
        })
    }

    pub fn list_surplus(&self) -> Result<Vec<ProductWithOrganization>, MarketError> {
        self.db.with_conn(|conn| {
            let rows = products::list_surplus(conn)?;
            products::with_organizations(conn, rows)
        })
    }

    /// Product page data; the viewer may message the farm when they belong
    /// to a restaurant
    pub fn get_detail(
        &self,
        ctx: &UserContext,
        product_id: &str,
    ) -> Result<Option<ProductDetail>, MarketError> {
        self.db.with_conn(|conn| {
            let Some(product) = products::get_product(conn, product_id)? else {
                return Ok(None);
            };
            let organization = organizations::get_organization(conn, &product.organization_id)?;
            let can_message =
                organizations::has_organization_of_type(conn, &ctx.user_id, org_types::RESTAURANT)?;

            Ok(Some(ProductDetail {
                product,
                organization,
                can_message,
            }))
        })
    }

    pub fn list_for_organization(&self, org_id: &str) -> Result<Vec<Product>, MarketError> {
        self.db.with_conn(|conn| {
            organizations::get_organization(conn, org_id)?
                .ok_or_else(|| MarketError::NotFound(format!("Organization {}", org_id)))?;
            products::list_for_organization(conn, org_id)
        })
    }

    // =========================================================================
    // Write Operations
    // =========================================================================

    pub fn create(
        &self,
        ctx: &UserContext,
        org_id: &str,
        input: CreateProductInput,
    ) -> Result<Product, MarketError> {
        self.validate_product(&input)?;

        let input = CreateProductInput {
            description: non_blank(input.description.as_deref()).map(str::to_string),
            location: non_blank(input.location.as_deref()).map(str::to_string),
            image_url: non_blank(input.image_url.as_deref()).map(str::to_string),
            ..input
        };

        let product = self.db.transaction(|conn| {
            require_member_of_type(conn, ctx, org_id, org_types::FARM)?;
            products::create_product(conn, ctx, org_id, &input)
        })?;

        info!(id = %product.id, org = %org_id, surplus = product.is_surplus == 1, "Product listed");
        self.events.emit(MarketEvent::ProductCreated {
            id: product.id.clone(),
            organization_id: product.organization_id.clone(),
            is_surplus: product.is_surplus == 1,
        });
        Ok(product)
    }

    pub fn set_availability(
        &self,
        ctx: &UserContext,
        product_id: &str,
        available: bool,
    ) -> Result<Product, MarketError> {
        let product = self.db.transaction(|conn| {
            let product = products::get_product(conn, product_id)?
                .ok_or_else(|| MarketError::NotFound(format!("Product {}", product_id)))?;
            require_member(conn, ctx, &product.organization_id)?;
            products::set_availability(conn, product_id, available)
        })?;

        self.events.emit(MarketEvent::ProductAvailabilityChanged {
            id: product.id.clone(),
            available,
        });
        Ok(product)
    }

    fn validate_product(&self, input: &CreateProductInput) -> Result<(), MarketError> {
        require_non_empty("name", &input.name)?;
        require_non_empty("unit", &input.unit)?;
        require_one_of("category", &input.category, &categories::ALL)?;
        require_non_negative("price", input.price)?;
        require_non_negative("quantity", input.quantity)?;

        if input.is_surplus {
            if let Some(reason) = input.surplus_reason.as_deref() {
                require_one_of("surplusReason", reason, &surplus_reasons::ALL)?;
            }
            if let Some(discount) = input.discount_percentage {
                if !(0..=100).contains(&discount) {
                    return Err(MarketError::InvalidInput(
                        "discountPercentage must be between 0 and 100".into(),
                    ));
                }
            }
        }
        Ok(())
    }
}
