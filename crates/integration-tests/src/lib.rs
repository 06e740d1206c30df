//! Integration test harness for the Nonito storefront.
//!
//! Tests drive the real router in-process: the in-memory store stands in for
//! `PostgreSQL`, [`FakeGateway`] for the payment provider, and
//! [`TestApp`] carries the session cookie between requests like a browser.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p nonito-integration-tests
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use secrecy::SecretString;
use serde_json::Value;
use tower::ServiceExt;
use tower_sessions::{MemoryStore as SessionMemoryStore, SessionManagerLayer};

use nonito_core::{CheckoutSessionId, PaymentStatus};
use nonito_storefront::checkout::CheckoutOrder;
use nonito_storefront::config::StorefrontConfig;
use nonito_storefront::payment::webhook::{SIGNATURE_HEADER, sign};
use nonito_storefront::payment::{
    CheckoutSession, CreatedSession, PaymentError, PaymentGateway, SessionLineItem,
    SessionLineItems,
};
use nonito_storefront::state::AppState;
use nonito_storefront::store::MemoryStore;
use nonito_storefront::test_support::fixture_store;

/// Webhook signing secret configured on every [`TestApp`].
pub const WEBHOOK_SECRET: &str = "whsec_integration";

/// Client IP sent with every request (the checkout rate limiter keys on it).
pub const CLIENT_IP: &str = "203.0.113.9";

/// Payment provider double.
///
/// Created sessions start unpaid; [`FakeGateway::mark_paid`] simulates the
/// shopper completing payment.
#[derive(Default)]
pub struct FakeGateway {
    sessions: Mutex<HashMap<String, CheckoutSession>>,
    orders: Mutex<Vec<CheckoutOrder>>,
    counter: AtomicUsize,
}

impl FakeGateway {
    /// Orders checkout has asked the provider to charge, oldest first.
    pub fn orders(&self) -> Vec<CheckoutOrder> {
        self.orders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The session as the provider currently reports it.
    pub fn session(&self, id: &str) -> Option<CheckoutSession> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Complete payment for a session.
    pub fn mark_paid(&self, id: &str) {
        if let Some(session) = self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(id)
        {
            session.status = Some("complete".to_string());
            session.payment_status = PaymentStatus::Paid;
        }
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_checkout_session(
        &self,
        order: &CheckoutOrder,
    ) -> Result<CreatedSession, PaymentError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let id = CheckoutSessionId::parse(&format!("cs_test_{n}"))
            .map_err(|e| PaymentError::NotFound(e.to_string()))?;
        let url = format!("https://checkout.example.test/pay/{id}");

        let line_items = order
            .lines
            .iter()
            .map(|line| SessionLineItem {
                description: Some(line.description()),
                quantity: Some(line.quantity),
                amount_total: Some(line.amount().minor_units()),
                currency: Some("sek".to_string()),
            })
            .collect();

        let session = CheckoutSession {
            id: id.clone(),
            status: Some("open".to_string()),
            payment_status: PaymentStatus::Unpaid,
            customer_details: None,
            shipping_details: None,
            amount_total: Some(order.subtotal().minor_units()),
            currency: Some("sek".to_string()),
            metadata: order.metadata.clone(),
            line_items: Some(SessionLineItems { data: line_items }),
            url: Some(url.clone()),
        };

        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string(), session);
        self.orders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(order.clone());

        Ok(CreatedSession { id, url })
    }

    async fn retrieve_session(
        &self,
        id: &CheckoutSessionId,
    ) -> Result<CheckoutSession, PaymentError> {
        self.session(id.as_str())
            .ok_or_else(|| PaymentError::NotFound(id.to_string()))
    }
}

/// A JSON response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// The storefront router plus a browser-like cookie jar of one cookie.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub gateway: Arc<FakeGateway>,
    cookie: Mutex<Option<String>>,
}

impl TestApp {
    /// Storefront over the fixture catalog with a configured gateway.
    pub fn new() -> Self {
        Self::build(true)
    }

    /// Storefront without payment credentials.
    pub fn without_payment() -> Self {
        Self::build(false)
    }

    fn build(with_payment: bool) -> Self {
        let mut config = StorefrontConfig::local("http://localhost:3000");
        if with_payment {
            config.payment.webhook_secret = Some(SecretString::from(WEBHOOK_SECRET.to_string()));
        }

        let store = Arc::new(fixture_store());
        let gateway = Arc::new(FakeGateway::default());
        let payment = with_payment.then(|| Arc::clone(&gateway) as Arc<dyn PaymentGateway>);
        let state = AppState::new(config, Arc::clone(&store), payment);

        let sessions = SessionManagerLayer::new(SessionMemoryStore::default()).with_secure(false);

        Self {
            router: nonito_storefront::app(state.clone(), sessions),
            state,
            store,
            gateway,
            cookie: Mutex::new(None),
        }
    }

    /// Forget the session cookie, as a fresh browser would.
    pub fn clear_cookies(&self) {
        *self.cookie.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Send a request, carrying and updating the session cookie.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built or the router fails.
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let mut request = request;
        if let Some(cookie) = self
            .cookie
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            request.headers_mut().insert(
                header::COOKIE,
                cookie.parse().unwrap_or_else(|e| panic!("bad cookie: {e}")),
            );
        }

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .unwrap_or_else(|e| panic!("router failed: {e}"));

        if let Some(set_cookie) = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
        {
            *self.cookie.lock().unwrap_or_else(PoisonError::into_inner) =
                Some(set_cookie.to_string());
        }

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap_or_else(|e| panic!("failed to read body: {e}"));
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse { status, body }
    }

    /// `GET` a path.
    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(request(Method::GET, uri).body(Body::empty()).unwrap_or_else(|e| panic!("{e}")))
            .await
    }

    /// `POST` a JSON body.
    pub async fn post_json(&self, uri: &str, body: &Value) -> TestResponse {
        self.send(
            request(Method::POST, uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap_or_else(|e| panic!("{e}")),
        )
        .await
    }

    /// Deliver a webhook event signed with [`WEBHOOK_SECRET`].
    pub async fn deliver_webhook(&self, event: &Value) -> TestResponse {
        let payload = event.to_string();
        let signature = sign(payload.as_bytes(), WEBHOOK_SECRET, unix_now());
        self.send(
            request(Method::POST, "/api/webhook/stripe")
                .header(header::CONTENT_TYPE, "application/json")
                .header(SIGNATURE_HEADER, signature)
                .body(Body::from(payload))
                .unwrap_or_else(|e| panic!("{e}")),
        )
        .await
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

/// Request builder with the client IP header set.
pub fn request(method: Method, uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-for", CLIENT_IP)
}

/// A provider event wrapping `session`.
pub fn session_event(event_type: &str, session: &CheckoutSession) -> Value {
    serde_json::json!({
        "id": "evt_integration",
        "type": event_type,
        "data": { "object": session },
    })
}

/// Seconds since the epoch.
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}
