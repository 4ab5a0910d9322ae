use estate_auth::models::ApiResponse;
use estate_auth::routes::health::HealthResponse;
use estate_auth::test_support::TestRocketBuilder;
use rocket::http::Status;

#[test]
fn health_endpoint_returns_ok() {
    let client = TestRocketBuilder::new().blocking_client();

    let response = client.get("/api/v1/health").dispatch();
    assert_eq!(response.status(), Status::Ok);

    let payload: ApiResponse<HealthResponse> = response.into_json().expect("valid JSON payload");
    assert!(payload.success);
    assert_eq!(payload.data.expect("health data").status, "ok");
}

#[test]
fn unknown_routes_answer_with_the_envelope() {
    let client = TestRocketBuilder::new().blocking_client();

    let response = client.get("/api/v1/nowhere").dispatch();
    assert_eq!(response.status(), Status::NotFound);

    let payload: ApiResponse<()> = response.into_json().expect("valid JSON payload");
    assert!(!payload.success);
    assert_eq!(payload.message.as_deref(), Some("no route for /api/v1/nowhere"));
}
