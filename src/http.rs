//! HTTP API for the marketplace
//!
//! JSON over HTTP/1.1. Every route except `/health` needs the acting user in
//! the `X-User-Id` header, as forwarded by the authenticating gateway.
//!
//! ## Profiles & Organizations
//! - `GET|PUT /profiles/me` - Current user's profile
//! - `GET|POST /organizations` - My organizations / create one
//! - `GET /organizations/{id}` - Organization with members
//! - `PUT /organizations/{id}/logistics` - Delivery days, pickup, notes
//! - `GET /organizations/{id}/reliability` - Reliability report
//! - `GET|POST /organizations/{id}/products` - Farm catalogue
//!
//! ## Products
//! - `GET /products?category=` - Available listings
//! - `GET /products/surplus` - Surplus listings
//! - `GET /products/{id}` - Product detail
//! - `PUT /products/{id}/availability` - `{"available": bool}`
//!
//! ## Demand & Offers
//! - `GET|POST /demand` - Active board / post a request
//! - `GET /demand/{id}` - Request with offers
//! - `PUT /demand/{id}/status` - `{"status": "fulfilled" | "cancelled"}`
//! - `POST /demand/{id}/offers` - Submit an offer
//! - `POST /offers/{id}/accept` / `POST /offers/{id}/reject`
//! - `POST /offers/{id}/commitment` - Turn an accepted offer into a standing order
//!
//! ## Commitments & Deliveries
//! - `GET /commitments` - Active and past standing orders
//! - `GET /commitments/{id}` - Commitment with deliveries
//! - `PUT /commitments/{id}/status` - Pause, resume, cancel, complete
//! - `POST /commitments/{id}/deliveries` - Schedule a delivery
//! - `POST /deliveries/{id}/complete` / `missed` / `cancel`
//!
//! ## Messages & Dashboard
//! - `GET|POST /messages` - Inbox and outbox / send
//! - `POST /messages/{id}/read`
//! - `GET /dashboard`
//!
//! ## Example Usage
//!
//! ```bash
//! curl -H "X-User-Id: chef-1" http://localhost:8095/commitments
//!
//! curl -X POST -H "X-User-Id: farmer-1" -H "Content-Type: application/json" \
//!      -d '{"completedDate": "2026-03-09"}' \
//!      http://localhost:8095/deliveries/3f1c.../complete
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::db::UserContext;
use crate::error::MarketError;
use crate::services::response::{
    created, error_response, method_not_allowed, not_found, ok, unauthorized,
};
use crate::services::Services;
use crate::views::{
    CommitmentBoardView, CommitmentDetailView, DashboardView, DeliveryOutcomeView, DeliveryView,
    DemandDetailView, DemandListingView, DemandRequestView, HealthView, MessageListingView,
    MessageView, OfferView, OrganizationDetailView, OrganizationView, ProductDetailView,
    ProductListingView, ProductView, ProfileView, ReliabilityView,
};

/// Header carrying the acting user id
pub const USER_ID_HEADER: &str = "x-user-id";

type HttpResponse = Response<Full<Bytes>>;

#[derive(Debug, Deserialize)]
struct ProductQuery {
    #[serde(default)]
    category: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    status: String,
}

#[derive(Debug, Deserialize)]
struct AvailabilityBody {
    available: bool,
}

/// HTTP server state
pub struct HttpServer {
    services: Arc<Services>,
    bind_addr: SocketAddr,
}

impl HttpServer {
    pub fn new(services: Arc<Services>, bind_addr: SocketAddr) -> Self {
        Self {
            services,
            bind_addr,
        }
    }

    /// Run the HTTP server
    pub async fn run(self: Arc<Self>) -> Result<(), MarketError> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        info!(addr = %self.bind_addr, "HTTP server listening");

        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let server = self.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let server = server.clone();
                    async move { Ok::<_, Infallible>(server.handle_request(req).await) }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    warn!(addr = %remote_addr, error = %err, "Connection error");
                }
            });
        }
    }

    /// Authenticate and route one request
    pub async fn handle_request<B>(&self, req: Request<B>) -> HttpResponse
    where
        B: Body,
        B::Error: std::fmt::Display,
    {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let query = req.uri().query().unwrap_or("").to_string();

        debug!(method = %method, path = %path, "Incoming request");

        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        if matches!(segments.as_slice(), ["health"]) {
            return match method {
                Method::GET => self.handle_health(),
                _ => method_not_allowed(),
            };
        }

        let ctx = match req
            .headers()
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(UserContext::from_header)
        {
            Some(ctx) => ctx,
            None => return unauthorized(),
        };

        match self
            .route(method, &segments, &query, &ctx, req.into_body())
            .await
        {
            Ok(response) => response,
            Err(e) => {
                debug!(user = %ctx.user_id, path = %path, error = %e, "Request rejected");
                error_response(e)
            }
        }
    }

    fn handle_health(&self) -> HttpResponse {
        match self.services.db().stats() {
            Ok(stats) => ok(&HealthView {
                status: "ok".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                counts: stats.into(),
            }),
            Err(e) => error_response(e),
        }
    }

    async fn route<B>(
        &self,
        method: Method,
        segments: &[&str],
        query: &str,
        ctx: &UserContext,
        body: B,
    ) -> Result<HttpResponse, MarketError>
    where
        B: Body,
        B::Error: std::fmt::Display,
    {
        let s = &self.services;

        match (method, segments) {
            // Profiles
            (Method::GET, ["profiles", "me"]) => match s.organizations.get_profile(ctx)? {
                Some(profile) => Ok(ok(&ProfileView::from(profile))),
                None => Ok(not_found("Profile not found")),
            },
            (Method::PUT, ["profiles", "me"]) => {
                let profile = s.organizations.upsert_profile(ctx, read_json(body).await?)?;
                Ok(ok(&ProfileView::from(profile)))
            }

            // Organizations
            (Method::GET, ["organizations"]) => {
                Ok(ok(&views::<_, OrganizationView>(s.organizations.list_mine(ctx)?)))
            }
            (Method::POST, ["organizations"]) => {
                let org = s.organizations.create(ctx, read_json(body).await?)?;
                Ok(created(&OrganizationView::from(org)))
            }
            (Method::GET, ["organizations", id]) => match s.organizations.get(id)? {
                Some(org) => Ok(ok(&OrganizationDetailView::from(org))),
                None => Ok(not_found("Organization not found")),
            },
            (Method::PUT, ["organizations", id, "logistics"]) => {
                let org = s
                    .organizations
                    .update_logistics(ctx, id, read_json(body).await?)?;
                Ok(ok(&OrganizationView::from(org)))
            }
            (Method::GET, ["organizations", id, "reliability"]) => {
                Ok(ok(&ReliabilityView::from(s.organizations.reliability(id)?)))
            }
            (Method::GET, ["organizations", id, "products"]) => Ok(ok(&views::<_, ProductView>(
                s.products.list_for_organization(id)?,
            ))),
            (Method::POST, ["organizations", id, "products"]) => {
                let product = s.products.create(ctx, id, read_json(body).await?)?;
                Ok(created(&ProductView::from(product)))
            }

            // Products
            (Method::GET, ["products"]) => {
                let params: ProductQuery = serde_urlencoded::from_str(query)
                    .map_err(|e| MarketError::InvalidInput(format!("Invalid query: {}", e)))?;
                let category = params.category.as_deref().filter(|c| !c.trim().is_empty());
                Ok(ok(&views::<_, ProductListingView>(
                    s.products.list_available(category)?,
                )))
            }
            (Method::GET, ["products", "surplus"]) => Ok(ok(&views::<_, ProductListingView>(
                s.products.list_surplus()?,
            ))),
            (Method::GET, ["products", id]) => match s.products.get_detail(ctx, id)? {
                Some(detail) => Ok(ok(&ProductDetailView::from(detail))),
                None => Ok(not_found("Product not found")),
            },
            (Method::PUT, ["products", id, "availability"]) => {
                let body: AvailabilityBody = read_json(body).await?;
                let product = s.products.set_availability(ctx, id, body.available)?;
                Ok(ok(&ProductView::from(product)))
            }

            // Demand
            (Method::GET, ["demand"]) => Ok(ok(&views::<_, DemandListingView>(
                s.demand.list_active()?,
            ))),
            (Method::POST, ["demand"]) => {
                let request = s.demand.create_request(ctx, read_json(body).await?)?;
                Ok(created(&DemandRequestView::from(request)))
            }
            (Method::GET, ["demand", id]) => match s.demand.get_detail(ctx, id)? {
                Some(detail) => Ok(ok(&DemandDetailView::from(detail))),
                None => Ok(not_found("Demand request not found")),
            },
            (Method::PUT, ["demand", id, "status"]) => {
                let body: StatusBody = read_json(body).await?;
                let request = s.demand.set_status(ctx, id, &body.status)?;
                Ok(ok(&DemandRequestView::from(request)))
            }
            (Method::POST, ["demand", id, "offers"]) => {
                let offer = s.demand.create_offer(ctx, id, read_json(body).await?)?;
                Ok(created(&OfferView::from(offer)))
            }

            // Offers
            (Method::POST, ["offers", id, "accept"]) => {
                Ok(ok(&OfferView::from(s.demand.accept_offer(ctx, id)?)))
            }
            (Method::POST, ["offers", id, "reject"]) => {
                Ok(ok(&OfferView::from(s.demand.reject_offer(ctx, id)?)))
            }
            (Method::POST, ["offers", id, "commitment"]) => {
                let detail = s.commitments.create_from_offer(ctx, id)?;
                Ok(created(&CommitmentDetailView::from(detail)))
            }

            // Commitments
            (Method::GET, ["commitments"]) => Ok(ok(&CommitmentBoardView::from(
                s.commitments.list_for_user(ctx)?,
            ))),
            (Method::GET, ["commitments", id]) => Ok(ok(&CommitmentDetailView::from(
                s.commitments.get_detail(ctx, id)?,
            ))),
            (Method::PUT, ["commitments", id, "status"]) => {
                let body: StatusBody = read_json(body).await?;
                let detail = s.commitments.set_status(ctx, id, &body.status)?;
                Ok(ok(&CommitmentDetailView::from(detail)))
            }
            (Method::POST, ["commitments", id, "deliveries"]) => {
                let delivery = s.deliveries.schedule(ctx, id, read_json(body).await?)?;
                Ok(created(&DeliveryView::from(delivery)))
            }

            // Deliveries
            (Method::POST, ["deliveries", id, "complete"]) => {
                let outcome = s.deliveries.complete(ctx, id, read_json(body).await?)?;
                Ok(ok(&DeliveryOutcomeView::from(outcome)))
            }
            (Method::POST, ["deliveries", id, "missed"]) => {
                Ok(ok(&DeliveryView::from(s.deliveries.mark_missed(ctx, id)?)))
            }
            (Method::POST, ["deliveries", id, "cancel"]) => {
                Ok(ok(&DeliveryView::from(s.deliveries.cancel(ctx, id)?)))
            }

            // Messages
            (Method::GET, ["messages"]) => Ok(ok(&views::<_, MessageListingView>(
                s.messages.list_for_user(ctx)?,
            ))),
            (Method::POST, ["messages"]) => {
                let message = s.messages.send(ctx, read_json(body).await?)?;
                Ok(created(&MessageView::from(message)))
            }
            (Method::POST, ["messages", id, "read"]) => {
                Ok(ok(&MessageView::from(s.messages.mark_read(ctx, id)?)))
            }

            // Dashboard
            (Method::GET, ["dashboard"]) => {
                Ok(ok(&DashboardView::from(s.dashboard.summary(ctx)?)))
            }

            (_, segments) if is_known_route(segments) => Ok(method_not_allowed()),
            _ => Ok(not_found("Not found")),
        }
    }
}

fn views<T, V: From<T>>(rows: Vec<T>) -> Vec<V> {
    rows.into_iter().map(V::from).collect()
}

/// Paths served under some method
fn is_known_route(segments: &[&str]) -> bool {
    matches!(
        segments,
        ["profiles", "me"]
            | ["organizations"]
            | ["organizations", _]
            | ["organizations", _, "logistics" | "reliability" | "products"]
            | ["products"]
            | ["products", _]
            | ["products", _, "availability"]
            | ["demand"]
            | ["demand", _]
            | ["demand", _, "status" | "offers"]
            | ["offers", _, "accept" | "reject" | "commitment"]
            | ["commitments"]
            | ["commitments", _]
            | ["commitments", _, "status" | "deliveries"]
            | ["deliveries", _, "complete" | "missed" | "cancel"]
            | ["messages"]
            | ["messages", _, "read"]
            | ["dashboard"]
    )
}

/// Read a JSON request body; an empty body reads as `{}`
async fn read_json<T, B>(body: B) -> Result<T, MarketError>
where
    T: DeserializeOwned,
    B: Body,
    B::Error: std::fmt::Display,
{
    let bytes = body
        .collect()
        .await
        .map_err(|e| MarketError::InvalidInput(format!("Failed to read body: {}", e)))?
        .to_bytes();

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::from_slice(b"{}")?);
    }
    Ok(serde_json::from_slice(&bytes)?)
}
