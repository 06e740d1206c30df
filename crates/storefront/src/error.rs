//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//! Responses are JSON: `{ "error": "<message>" }`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::checkout::CheckoutError;
use crate::db::RepositoryError;
use crate::fulfillment::FulfillmentError;
use crate::payment::PaymentError;
use crate::payment::webhook::WebhookError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Payment provider call failed.
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    /// Checkout was rejected.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Webhook delivery could not be verified or parsed.
    #[error("Webhook error: {0}")]
    Webhook(#[from] WebhookError),

    /// Fulfillment could not start.
    #[error("Fulfillment error: {0}")]
    Fulfillment(#[from] FulfillmentError),

    /// A required secret or setting is missing.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request body has the wrong content type.
    #[error("Content-Type must be application/json")]
    UnsupportedMediaType,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Fulfillment(_) | Self::Internal(_) | Self::Configuration(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Payment(PaymentError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Payment(_) => StatusCode::BAD_GATEWAY,
            Self::Checkout(err) if err.is_client_error() => StatusCode::BAD_REQUEST,
            Self::Checkout(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Webhook(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        }
    }

    /// Client-facing message. Internal details are never included.
    fn public_message(&self) -> String {
        match self {
            Self::Database(_) | Self::Fulfillment(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
            Self::Configuration(_) | Self::Checkout(CheckoutError::NotConfigured) => {
                "Server configuration error".to_string()
            }
            Self::Checkout(CheckoutError::Repository(_)) => {
                "Failed to create checkout session".to_string()
            }
            Self::Payment(PaymentError::NotFound(_)) => "Session not found".to_string(),
            Self::Payment(_) => "Payment provider error".to_string(),
            Self::Checkout(err) => err.to_string(),
            Self::Webhook(WebhookError::MissingSignature) => "Missing signature".to_string(),
            Self::Webhook(WebhookError::InvalidSignature(_)) => "Invalid signature".to_string(),
            Self::Webhook(WebhookError::Parse(_)) => "Invalid event payload".to_string(),
            Self::BadRequest(msg) => msg.clone(),
            Self::UnsupportedMediaType => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = %status, "Request rejected");
        }

        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Add a breadcrumb for shopper actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added item", Some(&[("product", "necessar")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::Configuration("STRIPE_WEBHOOK_SECRET is not set".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: STRIPE_WEBHOOK_SECRET is not set"
        );

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            err.into_response().status()
        }

        assert_eq!(
            get_status(AppError::Checkout(CheckoutError::EmptyCart)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Checkout(CheckoutError::InvalidItem { index: 0 })),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Checkout(CheckoutError::NotConfigured)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(AppError::UnsupportedMediaType),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(
            get_status(AppError::Payment(PaymentError::MissingUrl)),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            get_status(AppError::Webhook(WebhookError::MissingSignature)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_details_hidden() {
        let err = AppError::Database(RepositoryError::DataCorruption("secret detail".into()));
        assert_eq!(err.public_message(), "Internal server error");

        let err = AppError::Configuration("STRIPE_SECRET_KEY missing".into());
        assert_eq!(err.public_message(), "Server configuration error");

        let err = AppError::Checkout(CheckoutError::UnknownProduct("finns-inte".into()));
        assert_eq!(err.public_message(), "Invalid product: finns-inte");
    }
}
