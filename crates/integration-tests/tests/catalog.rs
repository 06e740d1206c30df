//! Catalog endpoint and health checks.

use nonito_integration_tests::TestApp;

#[tokio::test]
async fn test_products_endpoint_shape() {
    let app = TestApp::new();
    let response = app.get("/api/products").await;

    assert_eq!(response.status, 200);
    assert_eq!(response.body["success"], true);
    assert_eq!(response.body["products"].as_array().map(Vec::len), Some(3));
    assert_eq!(response.body["products"][0]["hasLiningOption"], true);
    assert_eq!(
        response.body["products"][0]["id"],
        response.body["products"][0]["slug"]
    );
    assert_eq!(response.body["fabrics"]["outer"].as_array().map(Vec::len), Some(2));
    assert_eq!(response.body["fabrics"]["inner"][0]["type"], "inner");
}

#[tokio::test]
async fn test_products_served_from_cache() {
    let app = TestApp::new();
    app.get("/api/products").await;
    assert_eq!(app.store.catalog_reads(), 1);

    // A cached snapshot outlives a store outage.
    app.store.set_unavailable(true);
    let cached = app.get("/api/products").await;
    assert_eq!(cached.status, 200);
    assert_eq!(cached.body["success"], true);
    assert_eq!(cached.body["products"].as_array().map(Vec::len), Some(3));
}

#[tokio::test]
async fn test_products_failure_without_snapshot() {
    let app = TestApp::new();
    app.store.set_unavailable(true);

    let response = app.get("/api/products").await;
    assert_eq!(response.status, 500);
    assert_eq!(response.body["success"], false);
    assert_eq!(response.body["error"], "Failed to fetch products");
    assert_eq!(response.body["products"].as_array().map(Vec::len), Some(0));
    assert!(response.body["fabrics"]["outer"].is_array());
}

#[tokio::test]
async fn test_health_checks() {
    let app = TestApp::new();
    assert_eq!(app.get("/health").await.status, 200);
    assert_eq!(app.get("/health/ready").await.status, 200);

    app.store.set_unavailable(true);
    assert_eq!(app.get("/health/ready").await.status, 503);
}
