//! End-to-end marketplace flow through the HTTP router
//!
//! Drives in-process requests against an on-disk database: a farm and a
//! restaurant meet through a demand request, agree on a weekly standing
//! order and complete its first delivery.

use std::sync::Arc;

use bytes::Bytes;
use harvestgrid::http::USER_ID_HEADER;
use harvestgrid::{HttpServer, MarketDb, Services};
use http_body_util::{BodyExt, Full};
use hyper::{Method, Request, StatusCode};
use serde_json::{json, Value};

struct Harness {
    server: HttpServer,
    _dir: tempfile::TempDir,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = MarketDb::open(&dir.path().join("market.db"), 2).unwrap();
        let services = Arc::new(Services::new(Arc::new(db)));
        Self {
            server: HttpServer::new(services, "127.0.0.1:0".parse().unwrap()),
            _dir: dir,
        }
    }

    async fn call(&self, method: Method, uri: &str, user: &str, body: Option<Value>) -> (StatusCode, Value) {
        let body = body.map(|b| b.to_string()).unwrap_or_default();
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header(USER_ID_HEADER, user)
            .header("content-type", "application/json")
            .body(Full::new(Bytes::from(body)))
            .unwrap();

        let resp = self.server.handle_request(req).await;
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn get(&self, uri: &str, user: &str) -> (StatusCode, Value) {
        self.call(Method::GET, uri, user, None).await
    }

    async fn post(&self, uri: &str, user: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, user, Some(body)).await
    }

    async fn put(&self, uri: &str, user: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::PUT, uri, user, Some(body)).await
    }
}

fn id(value: &Value) -> String {
    value["id"].as_str().unwrap().to_string()
}

/// Restaurant and farm organizations owned by "chef" and "farmer"
async fn two_parties(h: &Harness) -> (String, String) {
    let (status, bistro) = h
        .post("/organizations", "chef", json!({"name": "Bistro Verde", "type": "restaurant"}))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, farm) = h
        .post(
            "/organizations",
            "farmer",
            json!({"name": "Willow Creek Farm", "type": "farm", "location": "Hudson Valley"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    (id(&bistro), id(&farm))
}

#[tokio::test]
async fn test_profiles_and_logistics() {
    let h = Harness::new();

    let (status, _) = h.get("/profiles/me", "chef").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, profile) = h
        .put(
            "/profiles/me",
            "chef",
            json!({"userType": "restaurant", "displayName": "Ana", "email": "ana@bistro.test"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["userType"], "restaurant");

    let (_, farm) = two_parties(&h).await;

    let logistics = json!({
        "deliveryDays": ["friday", "Tuesday", "friday"],
        "pickupAvailable": true,
        "deliveryNotes": "  "
    });
    let (status, _) = h
        .put(&format!("/organizations/{farm}/logistics"), "chef", logistics.clone())
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, org) = h
        .put(&format!("/organizations/{farm}/logistics"), "farmer", logistics)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(org["deliveryDays"], json!(["tuesday", "friday"]));
    assert_eq!(org["pickupAvailable"], true);
    assert_eq!(org["deliveryNotes"], Value::Null);

    let (status, detail) = h.get(&format!("/organizations/{farm}"), "chef").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["members"][0]["userId"], "farmer");
    assert_eq!(detail["members"][0]["role"], "owner");
}

#[tokio::test]
async fn test_product_listings() {
    let h = Harness::new();
    let (_, farm) = two_parties(&h).await;

    let listing = json!({
        "name": "Seconds tomatoes",
        "category": "produce",
        "price": 2.5,
        "quantity": 40,
        "unit": "lb",
        "isSurplus": true,
        "surplusReason": "imperfect",
        "discountPercentage": 30
    });
    let (status, _) = h
        .post(&format!("/organizations/{farm}/products"), "chef", listing.clone())
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, product) = h
        .post(&format!("/organizations/{farm}/products"), "farmer", listing)
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(product["isSurplus"], true);
    assert_eq!(product["available"], true);
    let product_id = id(&product);

    let (_, surplus) = h.get("/products/surplus", "chef").await;
    assert_eq!(surplus.as_array().unwrap().len(), 1);
    assert_eq!(surplus[0]["organization"]["name"], "Willow Creek Farm");

    let (_, meat) = h.get("/products?category=meat", "chef").await;
    assert!(meat.as_array().unwrap().is_empty());
    let (status, _) = h.get("/products?category=jewelry", "chef").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, detail) = h.get(&format!("/products/{product_id}"), "chef").await;
    assert_eq!(detail["canMessage"], true);
    let (_, detail) = h.get(&format!("/products/{product_id}"), "farmer").await;
    assert_eq!(detail["canMessage"], false);

    let (status, hidden) = h
        .put(
            &format!("/products/{product_id}/availability"),
            "farmer",
            json!({"available": false}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(hidden["available"], false);

    let (_, surplus) = h.get("/products/surplus", "chef").await;
    assert!(surplus.as_array().unwrap().is_empty());

    let (status, _) = h.get("/products/does-not-exist", "chef").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_demand_to_standing_order() {
    let h = Harness::new();
    let (bistro, farm) = two_parties(&h).await;

    // Restaurant posts a weekly request
    let (status, request) = h
        .post(
            "/demand",
            "chef",
            json!({
                "organizationId": bistro,
                "productName": "Heirloom carrots",
                "category": "produce",
                "quantity": 20,
                "unit": "lb",
                "frequency": "weekly",
                "startDate": "2026-03-02",
                "endDate": "2026-06-01"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(request["status"], "active");
    assert_eq!(request["preferredRadiusMiles"], 50);
    let request_id = id(&request);

    let (_, board) = h.get("/demand", "farmer").await;
    assert_eq!(board.as_array().unwrap().len(), 1);
    assert_eq!(board[0]["reliability"]["tier"], "new");

    // Farm answers
    let (status, offer) = h
        .post(
            &format!("/demand/{request_id}/offers"),
            "farmer",
            json!({"farmOrganizationId": farm, "offeredQuantity": 20, "offeredPrice": 3.25}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(offer["status"], "pending");
    let offer_id = id(&offer);

    let (_, detail) = h.get(&format!("/demand/{request_id}"), "chef").await;
    assert_eq!(detail["isOwner"], true);
    assert_eq!(detail["offers"][0]["farm"]["id"], farm.as_str());

    // Only the restaurant decides, and only once
    let (status, _) = h.post(&format!("/offers/{offer_id}/accept"), "farmer", json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, accepted) = h.post(&format!("/offers/{offer_id}/accept"), "chef", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(accepted["status"], "accepted");
    let (status, _) = h.post(&format!("/offers/{offer_id}/reject"), "chef", json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Standing order
    let (status, commitment) = h
        .post(&format!("/offers/{offer_id}/commitment"), "chef", json!({}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(commitment["commitment"]["status"], "active");
    assert_eq!(commitment["commitment"]["price"], 3.25);
    assert_eq!(commitment["commitment"]["nextDeliveryDate"], "2026-03-02");
    let commitment_id = commitment["commitment"]["id"].as_str().unwrap().to_string();
    let first_delivery = commitment["deliveries"][0]["id"].as_str().unwrap().to_string();

    let (status, _) = h.get(&format!("/commitments/{commitment_id}"), "stranger").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // First delivery lands on time and the next week is scheduled
    let (status, outcome) = h
        .post(
            &format!("/deliveries/{first_delivery}/complete"),
            "farmer",
            json!({"completedDate": "2026-03-02"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["delivery"]["status"], "completed");
    assert_eq!(outcome["delivery"]["onTime"], true);
    assert_eq!(outcome["delivery"]["quantityDelivered"], 20.0);
    assert_eq!(outcome["nextDelivery"]["scheduledDate"], "2026-03-09");
    assert_eq!(outcome["commitment"]["nextDeliveryDate"], "2026-03-09");

    let (_, score) = h.get(&format!("/organizations/{farm}/reliability"), "chef").await;
    assert_eq!(score["totalCommitments"], 1);
    assert_eq!(score["totalDeliveries"], 1);
    assert_eq!(score["onTimeRate"], 100);
    assert_eq!(score["tier"], "establishing");

    // Pause, then the illegal jump to completed
    let (status, paused) = h
        .put(
            &format!("/commitments/{commitment_id}/status"),
            "chef",
            json!({"status": "paused"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paused["commitment"]["status"], "paused");
    let (status, _) = h
        .put(
            &format!("/commitments/{commitment_id}/status"),
            "chef",
            json!({"status": "completed"}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, board) = h.get("/commitments", "farmer").await;
    assert!(board["active"].as_array().unwrap().is_empty());
    assert_eq!(board["other"].as_array().unwrap().len(), 1);

    let (_, dashboard) = h.get("/dashboard", "chef").await;
    assert_eq!(dashboard["activeCommitments"], 0);
    assert_eq!(dashboard["activeDemandRequests"], 1);
    assert_eq!(dashboard["organizations"][0]["id"], bistro.as_str());

    // Fulfilling the request takes it off the board
    let (status, _) = h
        .put(&format!("/demand/{request_id}/status"), "chef", json!({"status": "fulfilled"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, board) = h.get("/demand", "farmer").await;
    assert!(board.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_messages_between_organizations() {
    let h = Harness::new();
    let (bistro, farm) = two_parties(&h).await;

    let (status, sent) = h
        .post(
            "/messages",
            "chef",
            json!({
                "fromOrganizationId": bistro,
                "toOrganizationId": farm,
                "subject": "Winter squash",
                "message": "Any delicata this season?"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(sent["isRead"], false);
    let message_id = id(&sent);

    let (_, inbox) = h.get("/messages", "farmer").await;
    assert_eq!(inbox[0]["fromOrganization"]["name"], "Bistro Verde");
    assert_eq!(inbox[0]["message"]["subject"], "Winter squash");

    let (status, _) = h.post(&format!("/messages/{message_id}/read"), "chef", json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, read) = h.post(&format!("/messages/{message_id}/read"), "farmer", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(read["isRead"], true);
}

#[tokio::test]
async fn test_health_reports_counts() {
    let h = Harness::new();
    two_parties(&h).await;

    let req = Request::builder()
        .method(Method::GET)
        .uri("/health")
        .body(Full::new(Bytes::new()))
        .unwrap();
    let resp = h.server.handle_request(req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["counts"]["organizations"], 2);
}
