use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use court_booking_portal::{
    AppConfig, AppState, create_router,
    api::MockBookingApi,
    errors::NOTICE_HEADER,
    guard::ACCESS_DENIED_NOTICE,
    models::{BookingRecord, BookingStatus, Coupon, CourtRecord},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::util::ServiceExt;

// --- Fixtures ---

const ADMIN: &str = "admin-1";
const MEMBER: &str = "member-1";
const USER: &str = "user-1";
const NO_ROLE: &str = "no-role-1";

fn court(id: usize, court_type: &str, image: Option<&str>) -> CourtRecord {
    CourtRecord {
        id: format!("court-{}", id),
        name: format!("{} court {}", court_type, id),
        court_type: court_type.to_string(),
        image: image.map(str::to_string),
        ..CourtRecord::default()
    }
}

fn seeded_api() -> MockBookingApi {
    let mut api = MockBookingApi::new()
        .with_profile(ADMIN, "admin@example.com", "admin")
        .with_profile(MEMBER, "member@example.com", "member")
        .with_profile(USER, "user@example.com", "user")
        .with_courts(vec![
            court(1, "tennis", Some("tennis.jpg")),
            court(2, "tennis", None),
            court(3, "golf", Some("golf.jpg")),
        ])
        .with_coupons(vec![Coupon {
            id: "coupon-1".to_string(),
            code: "SPRING10".to_string(),
            discount: 10,
            ..Coupon::default()
        }]);
    api.profiles.insert(
        NO_ROLE.to_string(),
        court_booking_portal::models::UserProfile {
            id: NO_ROLE.to_string(),
            email: "nobody@example.com".to_string(),
            role: None,
            ..Default::default()
        },
    );
    api.bookings = vec![BookingRecord {
        id: "booking-1".to_string(),
        user_id: Some(USER.to_string()),
        court_name: Some("tennis court 1".to_string()),
        status: BookingStatus::Confirmed,
        ..BookingRecord::default()
    }];
    api
}

/// The router over `api`, with the local `x-user-id` login bypass enabled.
fn app(api: MockBookingApi) -> Router {
    create_router(AppState::new(Arc::new(api), AppConfig::default()))
}

fn get(uri: &str, user: Option<&str>) -> Request<Body> {
    request(Method::GET, uri, user, None)
}

fn request(method: Method, uri: &str, user: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder
            .header("x-user-id", user)
            .header(header::AUTHORIZATION, "Bearer local-token");
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn location(response: &Response) -> &str {
    response.headers()[header::LOCATION].to_str().unwrap()
}

// --- Route Guard ---

#[tokio::test]
async fn anonymous_visitor_is_sent_to_login_with_destination() {
    let response = app(seeded_api())
        .oneshot(get("/admin-dashboard", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login?from=%2Fadmin-dashboard");
}

#[tokio::test]
async fn member_on_admin_route_gets_notice_and_own_dashboard() {
    let response = app(seeded_api())
        .oneshot(get("/admin-dashboard/coupons", Some(MEMBER)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/member-dashboard");
    assert_eq!(response.headers()[NOTICE_HEADER], ACCESS_DENIED_NOTICE);

    let body = json_body(response).await;
    assert_eq!(body["redirect_to"], "/member-dashboard");
}

#[tokio::test]
async fn signed_in_without_role_is_sent_to_fallback() {
    let response = app(seeded_api())
        .oneshot(get("/dashboard", Some(NO_ROLE)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn admin_dashboard_renders_for_admin() {
    let response = app(seeded_api())
        .oneshot(get("/admin-dashboard", Some(ADMIN)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["role"], "admin");
    assert_eq!(body["profile"]["email"], "admin@example.com");
    assert_eq!(body["coupon_count"], 1);
}

#[tokio::test]
async fn failed_role_lookup_settles_instead_of_loading_forever() {
    let mut api = seeded_api();
    api.profiles_unavailable = true;
    let router = app(api);

    for _ in 0..3 {
        let response = router
            .clone()
            .oneshot(get("/dashboard/bookings", Some(USER)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(response.headers().get(header::RETRY_AFTER).is_none());
        assert_eq!(location(&response), "/");
        assert_eq!(response.headers()[NOTICE_HEADER], ACCESS_DENIED_NOTICE);
    }
}

#[tokio::test]
async fn user_sees_confirmed_bookings() {
    let response = app(seeded_api())
        .oneshot(get("/dashboard/bookings", Some(USER)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["bookings"].as_array().unwrap().len(), 1);
    assert_eq!(body["bookings"][0]["status"], "confirmed");
}

// --- Login Redirects ---

#[tokio::test]
async fn login_page_renders_for_anonymous_visitor() {
    let response = app(seeded_api())
        .oneshot(get("/login?from=%2Fmember-dashboard", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["page"], "login");
    assert_eq!(body["from"], "/member-dashboard");
}

#[tokio::test]
async fn signed_in_member_returns_to_intended_destination() {
    let response = app(seeded_api())
        .oneshot(get("/login?from=%2Fmember-dashboard%2Fbookings", Some(MEMBER)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/member-dashboard/bookings");
}

#[tokio::test]
async fn destination_outside_role_falls_back_to_landing() {
    let response = app(seeded_api())
        .oneshot(get("/login?from=%2Fadmin-dashboard", Some(USER)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/dashboard");
}

#[tokio::test]
async fn off_site_destination_is_ignored() {
    let response = app(seeded_api())
        .oneshot(get("/login?from=https%3A%2F%2Fevil.example", Some(ADMIN)))
        .await
        .unwrap();

    assert_eq!(location(&response), "/admin-dashboard");
}

#[tokio::test]
async fn destination_with_control_characters_falls_back_to_landing() {
    let response = app(seeded_api())
        .oneshot(get("/login?from=%2Fdashboard%2F%0D%0Ax", Some(USER)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/dashboard");
}

// --- Listings ---

#[tokio::test]
async fn categories_are_aggregated_from_courts() {
    let response = app(seeded_api())
        .oneshot(get("/categories", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(
        body["page"]["items"],
        json!([
            { "type": "tennis", "count": 2, "image": "tennis.jpg" },
            { "type": "golf", "count": 1, "image": "golf.jpg" }
        ])
    );
    assert_eq!(body["page"]["total_pages"], 1);
    assert!(body.get("notice").is_none());
}

#[tokio::test]
async fn failed_fetch_renders_empty_listing_with_retry() {
    let response = app(MockBookingApi::new_failing())
        .oneshot(get("/categories", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["page"]["items"], json!([]));
    assert_eq!(body["page"]["page"], 1);
    assert!(body["notice"].is_string());
    assert_eq!(body["retry"], "/categories?refetch=1");
}

#[tokio::test]
async fn out_of_range_page_is_clamped() {
    let courts = (1..=25).map(|i| court(i, "padel", None)).collect();
    let router = app(MockBookingApi::new().with_courts(courts));

    let response = router
        .clone()
        .oneshot(get("/courts?page=99", None))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["page"]["page"], 3);
    assert_eq!(body["page"]["total_pages"], 3);
    assert_eq!(body["page"]["items"].as_array().unwrap().len(), 7);

    let response = router.oneshot(get("/courts?page=-2", None)).await.unwrap();
    let body = json_body(response).await;
    assert_eq!(body["page"]["page"], 1);
    assert_eq!(body["page"]["items"].as_array().unwrap().len(), 9);
}

#[tokio::test]
async fn category_detail_lists_matching_courts() {
    let router = app(seeded_api());

    let response = router
        .clone()
        .oneshot(get("/categories/tennis", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["title"], "tennis");
    assert_eq!(body["page"]["total_items"], 2);

    let response = router
        .oneshot(get("/categories/curling", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn court_list_is_served_from_cache_until_refetch() {
    let api = seeded_api();
    let router = app(api.clone());

    for uri in ["/categories", "/courts", "/"] {
        let response = router.clone().oneshot(get(uri, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    assert_eq!(api.court_fetches(), 1);

    router
        .oneshot(get("/categories?refetch=1", None))
        .await
        .unwrap();
    assert_eq!(api.court_fetches(), 2);
}

#[tokio::test]
async fn unknown_route_renders_error_page() {
    let response = app(seeded_api())
        .oneshot(get("/no/such/page", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["status"], 404);
    assert_eq!(body["message"], "No page at /no/such/page");
    assert_eq!(body["actions"], json!(["home", "back"]));
}

// --- Coupons ---

#[tokio::test]
async fn invalid_coupon_is_rejected_before_upstream() {
    let api = seeded_api();
    let response = app(api.clone())
        .oneshot(request(
            Method::POST,
            "/admin-dashboard/coupons",
            Some(ADMIN),
            Some(json!({ "code": "bad code!", "discount": 0 })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(response).await;
    let fields: Vec<&str> = body["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["code", "discount"]);
    assert_eq!(api.coupons.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn coupon_lifecycle() {
    let api = seeded_api();
    let router = app(api.clone());

    let response = router
        .clone()
        .oneshot(request(
            Method::POST,
            "/admin-dashboard/coupons",
            Some(ADMIN),
            Some(json!({ "code": "SUMMER25", "discount": 25 })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = json_body(response).await;
    assert_eq!(created["_id"], "coupon-2");

    let response = router
        .clone()
        .oneshot(request(
            Method::PUT,
            "/admin-dashboard/coupons/coupon-2",
            Some(ADMIN),
            Some(json!({ "code": "SUMMER30", "discount": 30 })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["discount"], 30);

    let response = router
        .clone()
        .oneshot(request(Method::DELETE, "/admin-dashboard/coupons/coupon-2", Some(ADMIN), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = router
        .oneshot(request(Method::DELETE, "/admin-dashboard/coupons/coupon-2", Some(ADMIN), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    assert_eq!(api.coupons.lock().unwrap().len(), 1);
}
