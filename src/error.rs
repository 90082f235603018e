//! Application error taxonomy.
//!
//! # Responsibilities
//! - Define every error the service can raise as one `AppError` enum
//! - Classify each error into an (error code, HTTP status, component) triple
//! - Hand errors to the boundary mapper through the response
//!
//! # Design Decisions
//! - Classification is a static table keyed by `ErrorKind`, with a fallback
//!   entry for anything not listed
//! - `IntoResponse` only tags the response; the error mapper middleware
//!   builds the body so every failure path gets the same shape and signals

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Field name → message pairs for request validation failures.
pub type FieldErrors = BTreeMap<String, String>;

/// Every error the service raises.
#[derive(Debug, Clone, Error)]
pub enum AppError {
    #[error("{0}")]
    UserNotFound(String),

    #[error("{0}")]
    ProductNotFound(String),

    #[error("{0}")]
    OrderNotFound(String),

    #[error("{0}")]
    DuplicateEmail(String),

    #[error("{0}")]
    DuplicateProduct(String),

    #[error("{0}")]
    InsufficientStock(String),

    #[error("{0}")]
    InvalidPrice(String),

    #[error("{0}")]
    DatabaseConnection(String),

    #[error("{0}")]
    Validation(String),

    /// Request payload failed field-level validation.
    #[error("Validation failed for request")]
    InvalidRequest(FieldErrors),

    #[error("{0}")]
    BusinessLogic(String),

    #[error("{0}")]
    ExternalService(String),

    #[error("{0}")]
    Timeout(String),

    #[error("{0}")]
    RateLimit(String),

    #[error("{0}")]
    DataIntegrity(String),

    /// Deliberate out-of-bounds fault fixture.
    #[error("Index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    /// Deliberate missing-value fault fixture.
    #[error("{0}")]
    NullReference(String),

    #[error("{0}")]
    IllegalArgument(String),

    #[error("Request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    #[error("No route for {0}")]
    RouteNotFound(String),

    #[error("Request method '{method}' is not supported for {path}")]
    MethodNotAllowed { method: String, path: String },

    #[error("{0}")]
    Internal(String),
}

/// Discriminant of `AppError`, used as the classification key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UserNotFound,
    ProductNotFound,
    OrderNotFound,
    DuplicateEmail,
    DuplicateProduct,
    InsufficientStock,
    InvalidPrice,
    DatabaseConnection,
    Validation,
    InvalidRequest,
    BusinessLogic,
    ExternalService,
    Timeout,
    RateLimit,
    DataIntegrity,
    IndexOutOfBounds,
    NullReference,
    IllegalArgument,
    PayloadTooLarge,
    RouteNotFound,
    MethodNotAllowed,
    Internal,
}

/// How an error is presented to clients and telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// Machine-readable code returned as `error` in the body.
    pub code: &'static str,
    pub status: StatusCode,
    /// Logical component the error is attributed to.
    pub component: &'static str,
    /// Stable type name used for `exception.type` and metric labels.
    pub exception_type: &'static str,
}

const fn class(
    code: &'static str,
    status: StatusCode,
    component: &'static str,
    exception_type: &'static str,
) -> Classification {
    Classification {
        code,
        status,
        component,
        exception_type,
    }
}

/// Fallback for anything the table does not list.
pub const INTERNAL_ERROR: Classification = class(
    "INTERNAL_SERVER_ERROR",
    StatusCode::INTERNAL_SERVER_ERROR,
    "application",
    "InternalError",
);

static CLASSIFICATIONS: &[(ErrorKind, Classification)] = &[
    (ErrorKind::UserNotFound, class("USER_NOT_FOUND", StatusCode::NOT_FOUND, "user-service", "UserNotFoundException")),
    (ErrorKind::ProductNotFound, class("PRODUCT_NOT_FOUND", StatusCode::NOT_FOUND, "product-service", "ProductNotFoundException")),
    (ErrorKind::OrderNotFound, class("ORDER_NOT_FOUND", StatusCode::NOT_FOUND, "order-service", "OrderNotFoundException")),
    (ErrorKind::DuplicateEmail, class("DUPLICATE_EMAIL", StatusCode::CONFLICT, "user-service", "DuplicateEmailException")),
    (ErrorKind::DuplicateProduct, class("DUPLICATE_PRODUCT", StatusCode::CONFLICT, "product-service", "DuplicateProductException")),
    (ErrorKind::InsufficientStock, class("INSUFFICIENT_STOCK", StatusCode::BAD_REQUEST, "inventory-service", "InsufficientStockException")),
    (ErrorKind::InvalidPrice, class("INVALID_PRICE", StatusCode::BAD_REQUEST, "validation-service", "InvalidPriceException")),
    (ErrorKind::DatabaseConnection, class("DATABASE_ERROR", StatusCode::INTERNAL_SERVER_ERROR, "database-service", "DatabaseConnectionException")),
    (ErrorKind::Validation, class("VALIDATION_ERROR", StatusCode::BAD_REQUEST, "validation-service", "ValidationException")),
    (ErrorKind::InvalidRequest, class("VALIDATION_FAILED", StatusCode::BAD_REQUEST, "validation-service", "RequestValidationException")),
    (ErrorKind::BusinessLogic, class("BUSINESS_LOGIC_ERROR", StatusCode::UNPROCESSABLE_ENTITY, "business-service", "BusinessLogicException")),
    (ErrorKind::ExternalService, class("EXTERNAL_SERVICE_ERROR", StatusCode::SERVICE_UNAVAILABLE, "external-service", "ExternalServiceException")),
    (ErrorKind::Timeout, class("TIMEOUT_ERROR", StatusCode::REQUEST_TIMEOUT, "timeout-service", "TimeoutException")),
    (ErrorKind::RateLimit, class("RATE_LIMIT_EXCEEDED", StatusCode::TOO_MANY_REQUESTS, "rate-limiter", "RateLimitException")),
    (ErrorKind::DataIntegrity, class("DATA_INTEGRITY_VIOLATION", StatusCode::CONFLICT, "database-service", "DataIntegrityViolationException")),
    (ErrorKind::IndexOutOfBounds, class("ARRAY_INDEX_OUT_OF_BOUNDS", StatusCode::INTERNAL_SERVER_ERROR, "application", "ArrayIndexOutOfBoundsException")),
    (ErrorKind::NullReference, class("NULL_POINTER_EXCEPTION", StatusCode::INTERNAL_SERVER_ERROR, "application", "NullPointerException")),
    (ErrorKind::IllegalArgument, class("ILLEGAL_ARGUMENT", StatusCode::BAD_REQUEST, "validation-service", "IllegalArgumentException")),
    (ErrorKind::PayloadTooLarge, class("PAYLOAD_TOO_LARGE", StatusCode::PAYLOAD_TOO_LARGE, "http-server", "PayloadTooLargeException")),
    (ErrorKind::RouteNotFound, class("ROUTE_NOT_FOUND", StatusCode::NOT_FOUND, "http-server", "RouteNotFoundException")),
    (ErrorKind::MethodNotAllowed, class("METHOD_NOT_ALLOWED", StatusCode::METHOD_NOT_ALLOWED, "http-server", "HttpRequestMethodNotSupportedException")),
];

/// Look up the classification for an error kind.
pub fn classify(kind: ErrorKind) -> &'static Classification {
    CLASSIFICATIONS
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, c)| c)
        .unwrap_or(&INTERNAL_ERROR)
}

/// Codes whose status is a 5xx.
pub fn server_error_codes() -> impl Iterator<Item = &'static str> {
    CLASSIFICATIONS
        .iter()
        .map(|(_, c)| c)
        .chain(std::iter::once(&INTERNAL_ERROR))
        .filter(|c| c.status.is_server_error())
        .map(|c| c.code)
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::UserNotFound(_) => ErrorKind::UserNotFound,
            AppError::ProductNotFound(_) => ErrorKind::ProductNotFound,
            AppError::OrderNotFound(_) => ErrorKind::OrderNotFound,
            AppError::DuplicateEmail(_) => ErrorKind::DuplicateEmail,
            AppError::DuplicateProduct(_) => ErrorKind::DuplicateProduct,
            AppError::InsufficientStock(_) => ErrorKind::InsufficientStock,
            AppError::InvalidPrice(_) => ErrorKind::InvalidPrice,
            AppError::DatabaseConnection(_) => ErrorKind::DatabaseConnection,
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            AppError::BusinessLogic(_) => ErrorKind::BusinessLogic,
            AppError::ExternalService(_) => ErrorKind::ExternalService,
            AppError::Timeout(_) => ErrorKind::Timeout,
            AppError::RateLimit(_) => ErrorKind::RateLimit,
            AppError::DataIntegrity(_) => ErrorKind::DataIntegrity,
            AppError::IndexOutOfBounds { .. } => ErrorKind::IndexOutOfBounds,
            AppError::NullReference(_) => ErrorKind::NullReference,
            AppError::IllegalArgument(_) => ErrorKind::IllegalArgument,
            AppError::PayloadTooLarge(_) => ErrorKind::PayloadTooLarge,
            AppError::RouteNotFound(_) => ErrorKind::RouteNotFound,
            AppError::MethodNotAllowed { .. } => ErrorKind::MethodNotAllowed,
            AppError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn classification(&self) -> &'static Classification {
        classify(self.kind())
    }

    /// Stable type name for span attributes and metric labels.
    pub fn exception_type(&self) -> &'static str {
        self.classification().exception_type
    }

    /// Field errors, present only for request validation failures.
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            AppError::InvalidRequest(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn user_not_found(id: i64) -> Self {
        AppError::UserNotFound(format!("User not found with id: {}", id))
    }

    pub fn product_not_found(id: i64) -> Self {
        AppError::ProductNotFound(format!("Product not found with id: {}", id))
    }

    pub fn order_not_found(id: i64) -> Self {
        AppError::OrderNotFound(format!("Order not found with id: {}", id))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() || db.is_foreign_key_violation() => {
                AppError::DataIntegrity(db.message().to_string())
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                AppError::DatabaseConnection(format!("Database connection failed: {}", err))
            }
            _ => AppError::Internal(err.to_string()),
        }
    }
}

/// Response extension carrying an error to the error mapper middleware.
#[derive(Debug, Clone)]
pub struct PendingError(pub Arc<AppError>);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.classification().status;
        let mut response = status.into_response();
        response.extensions_mut().insert(PendingError(Arc::new(self)));
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_listed_kind_has_unique_code() {
        let mut codes: Vec<_> = CLASSIFICATIONS.iter().map(|(_, c)| c.code).collect();
        codes.push(INTERNAL_ERROR.code);
        let total = codes.len();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), total);
    }

    #[test]
    fn test_internal_falls_back_to_default_entry() {
        let err = AppError::Internal("boom".into());
        assert_eq!(err.classification(), &INTERNAL_ERROR);
        assert_eq!(err.classification().status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_classification_triples() {
        let cases = [
            (AppError::RateLimit("x".into()), "RATE_LIMIT_EXCEEDED", 429, "rate-limiter"),
            (AppError::DatabaseConnection("x".into()), "DATABASE_ERROR", 500, "database-service"),
            (AppError::BusinessLogic("x".into()), "BUSINESS_LOGIC_ERROR", 422, "business-service"),
            (AppError::DuplicateEmail("x".into()), "DUPLICATE_EMAIL", 409, "user-service"),
            (AppError::Timeout("x".into()), "TIMEOUT_ERROR", 408, "timeout-service"),
            (AppError::ExternalService("x".into()), "EXTERNAL_SERVICE_ERROR", 503, "external-service"),
            (AppError::IndexOutOfBounds { index: 5, len: 3 }, "ARRAY_INDEX_OUT_OF_BOUNDS", 500, "application"),
            (AppError::NullReference("x".into()), "NULL_POINTER_EXCEPTION", 500, "application"),
            (
                AppError::MethodNotAllowed {
                    method: "PATCH".into(),
                    path: "/api/users".into(),
                },
                "METHOD_NOT_ALLOWED",
                405,
                "http-server",
            ),
        ];

        for (err, code, status, component) in cases {
            let c = err.classification();
            assert_eq!(c.code, code);
            assert_eq!(c.status.as_u16(), status);
            assert_eq!(c.component, component);
        }
    }

    #[test]
    fn test_field_errors_only_for_request_validation() {
        let mut fields = FieldErrors::new();
        fields.insert("email".into(), "missing field".into());
        let err = AppError::InvalidRequest(fields);

        assert_eq!(err.to_string(), "Validation failed for request");
        assert_eq!(err.field_errors().map(|f| f.len()), Some(1));
        assert!(AppError::Validation("x".into()).field_errors().is_none());
    }

    #[test]
    fn test_into_response_tags_pending_error() {
        let response = AppError::user_not_found(7).into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let pending = response.extensions().get::<PendingError>().unwrap();
        assert_eq!(pending.0.to_string(), "User not found with id: 7");
    }
}
