mod common;

use common::*;
use futures::executor::block_on;
use inquiry_worker::http::ApiRequest;
use inquiry_worker::router::{boundary_failure, ROUTER_METHODS};
use worker::Method;

#[test]
fn preflight_is_empty_204_with_policy_headers() {
    let h = Harness::happy();
    let request = ApiRequest::new(Method::Options, "/anything").with_header("Origin", SITE_ORIGIN);
    let response = block_on(h.router().route(&request));

    assert_eq!(response.status, 204);
    assert!(response.body.is_none());
    assert_eq!(response.header("Access-Control-Allow-Origin"), Some(SITE_ORIGIN));
    assert_eq!(response.header("Access-Control-Allow-Methods"), Some("GET, POST, OPTIONS"));
    assert!(response.header("X-Request-ID").is_some());
    assert!(h.http.calls.borrow().is_empty());
}

#[test]
fn unknown_origin_gets_canonical_default() {
    let h = Harness::happy();
    let request = ApiRequest::new(Method::Get, "/health").with_header("Origin", "https://evil.example");
    let response = block_on(h.router().route(&request));

    assert_eq!(response.status, 200);
    assert_eq!(response.header("Access-Control-Allow-Origin"), Some(SITE_ORIGIN));
    assert!(h.sink.events().iter().any(|e| e == "INVALID_ORIGIN"));
}

#[test]
fn secondary_allowed_origin_is_echoed() {
    let h = Harness::happy();
    let request =
        ApiRequest::new(Method::Get, "/").with_header("Origin", "https://www.mcadroofcleaning.co.uk");
    let response = block_on(h.router().route(&request));
    assert_eq!(
        response.header("Access-Control-Allow-Origin"),
        Some("https://www.mcadroofcleaning.co.uk")
    );
}

#[test]
fn inquiry_is_delegated_and_cors_overwritten() {
    let h = Harness::happy();
    let response = block_on(h.router().route(&post("/inquiry/", &valid_body())));

    assert_eq!(response.status, 200);
    let body = body_of(&response);
    assert_eq!(body["success"], true);
    assert_eq!(body["requestId"], response.header("X-Request-ID").unwrap());

    // the handler advertises "POST, OPTIONS"; the router's policy replaces it
    assert_eq!(response.header("Access-Control-Allow-Methods"), Some("GET, POST, OPTIONS"));
    let cors_headers = response
        .headers
        .iter()
        .filter(|(k, _)| k.eq_ignore_ascii_case("Access-Control-Allow-Origin"))
        .count();
    assert_eq!(cors_headers, 1);
    assert_eq!(response.header("X-Frame-Options"), Some("DENY"));
    assert!(h.sink.events().iter().any(|e| e == "ROUTE_SUCCESS"));
}

#[test]
fn get_on_inquiry_reaches_handler_method_check() {
    let h = Harness::happy();
    let response = block_on(h.router().route(&ApiRequest::new(Method::Get, "/inquiry")));
    assert_eq!(response.status, 405);
    assert_eq!(body_of(&response)["errorCode"], "METHOD_NOT_ALLOWED");
}

#[test]
fn health_reports_configuration() {
    let h = Harness::happy();
    let response = block_on(h.router().route(&ApiRequest::new(Method::Get, "/health/")));
    let body = body_of(&response);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["services"]["inquiry"], true);
    assert_eq!(body["timestamp"], "2025-06-01T09:00:00.000Z");
    assert_eq!(body["requestId"], response.header("X-Request-ID").unwrap());

    let response = block_on(h.unconfigured_router().route(&ApiRequest::new(Method::Get, "/health")));
    assert_eq!(body_of(&response)["services"]["inquiry"], false);
}

#[test]
fn root_describes_the_api() {
    let h = Harness::happy();
    for path in ["/", ""] {
        let response = block_on(h.router().route(&ApiRequest::new(Method::Get, path)));
        assert_eq!(response.status, 200);
        let body = body_of(&response);
        assert_eq!(body["status"], "operational");
        assert_eq!(body["endpoints"]["inquiry"]["path"], "/inquiry");
        assert_eq!(body["endpoints"]["inquiry"]["method"], "POST");
        assert_eq!(body["endpoints"]["health"]["path"], "/health");
    }
}

#[test]
fn unknown_paths_are_404_with_timestamp() {
    let h = Harness::happy();
    for request in [
        ApiRequest::new(Method::Get, "/admin"),
        ApiRequest::new(Method::Post, "/health"),
        ApiRequest::new(Method::Delete, "/"),
    ] {
        let response = block_on(h.router().route(&request));
        assert_eq!(response.status, 404);
        let body = body_of(&response);
        assert_eq!(body["errorCode"], "NOT_FOUND");
        assert_eq!(body["error"], "Endpoint not found");
        assert_eq!(body["timestamp"], "2025-06-01T09:00:00.000Z");
        assert_eq!(response.header("X-Content-Type-Options"), Some("nosniff"));
    }
}

#[test]
fn unconfigured_inquiry_is_unavailable() {
    let h = Harness::happy();
    let response = block_on(h.unconfigured_router().route(&post("/inquiry", &valid_body())));
    assert_eq!(response.status, 503);
    assert_eq!(body_of(&response)["errorCode"], "SERVICE_NOT_CONFIGURED");
    assert!(h.http.calls.borrow().is_empty());
}

#[test]
fn each_request_gets_its_own_id() {
    let h = Harness::happy();
    let router = h.router();
    let a = block_on(router.route(&ApiRequest::new(Method::Get, "/health")));
    let b = block_on(router.route(&ApiRequest::new(Method::Get, "/health")));
    assert_ne!(a.header("X-Request-ID"), b.header("X-Request-ID"));
}

#[test]
fn boundary_failure_is_json_with_default_cors() {
    let h = Harness::happy();
    let response = boundary_failure(
        "CONFIG_ERROR",
        "SKIP_VERIFICATION must be true or false",
        Some("https://www.mcadroofcleaning.co.uk"),
        &h.sink,
        fixed_now(),
    );

    assert_eq!(response.status, 500);
    let body = body_of(&response);
    assert_eq!(body["success"], false);
    assert_eq!(body["errorCode"], "INTERNAL_ERROR");
    assert_eq!(body["error"], "Internal server error");
    assert_eq!(body["timestamp"], "2025-06-01T09:00:00.000Z");
    assert_eq!(
        response.header("Access-Control-Allow-Origin"),
        Some("https://www.mcadroofcleaning.co.uk")
    );
    assert_eq!(response.header("Access-Control-Allow-Methods"), Some(ROUTER_METHODS));
    assert_eq!(response.header("X-Content-Type-Options"), Some("nosniff"));
    assert_eq!(response.header("X-Request-ID"), body["requestId"].as_str());

    // detail goes to the log, not the client
    assert!(!body.to_string().contains("SKIP_VERIFICATION"));
    let logged = h.sink.raw();
    assert!(logged.contains("CONFIG_ERROR"));
    assert!(logged.contains("SKIP_VERIFICATION must be true or false"));
}

#[test]
fn boundary_failure_falls_back_to_canonical_origin() {
    let h = Harness::happy();
    let response = boundary_failure(
        "REQUEST_READ_ERROR",
        "body stream closed",
        Some("https://evil.example"),
        &h.sink,
        fixed_now(),
    );
    assert_eq!(response.status, 500);
    assert_eq!(response.header("Access-Control-Allow-Origin"), Some(SITE_ORIGIN));
    assert_eq!(h.sink.events(), vec!["REQUEST_READ_ERROR".to_string()]);
}
