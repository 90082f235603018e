//! Extractors whose rejections are `AppError`s.
//!
//! Axum's stock extractors answer malformed input with their own plain-text
//! responses. These wrappers turn every rejection into an `AppError` so the
//! error mapper produces the usual body and telemetry.

use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;

use crate::error::{AppError, FieldErrors};
use crate::models::Validate;

/// JSON body that must deserialize and pass `Validate`.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|rejection| {
            let mut errors = FieldErrors::new();
            errors.insert("body".to_string(), rejection.body_text());
            AppError::InvalidRequest(errors)
        })?;

        let mut errors = FieldErrors::new();
        value.validate(&mut errors);
        if !errors.is_empty() {
            return Err(AppError::InvalidRequest(errors));
        }

        Ok(ValidatedJson(value))
    }
}

/// Path parameters; a value that does not parse is an illegal argument.
#[derive(Debug, Clone)]
pub struct Param<T>(pub T);

impl<T, S> FromRequestParts<S> for Param<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Path::<T>::from_request_parts(parts, state)
            .await
            .map(|Path(value)| Param(value))
            .map_err(|rejection| AppError::IllegalArgument(rejection.body_text()))
    }
}

/// Query string parameters; a value that does not parse is an illegal argument.
#[derive(Debug, Clone)]
pub struct QueryParams<T>(pub T);

impl<T, S> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::from_request_parts(parts, state)
            .await
            .map(|Query(value)| QueryParams(value))
            .map_err(|rejection| AppError::IllegalArgument(rejection.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRequest;
    use axum::body::Body;
    use axum::http::header::CONTENT_TYPE;

    fn json_request(body: &'static str) -> Request {
        Request::builder()
            .method("POST")
            .uri("/api/users")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_missing_fields_become_field_errors() {
        let err = ValidatedJson::<UserRequest>::from_request(json_request(r#"{"role":"USER"}"#), &())
            .await
            .unwrap_err();

        let fields = err.field_errors().unwrap();
        assert_eq!(fields.get("name").map(String::as_str), Some("Name is required"));
        assert_eq!(fields.get("email").map(String::as_str), Some("Email is required"));
    }

    #[tokio::test]
    async fn test_malformed_json_is_request_validation_failure() {
        let err = ValidatedJson::<UserRequest>::from_request(json_request("{not json"), &())
            .await
            .unwrap_err();

        assert_eq!(err.classification().code, "VALIDATION_FAILED");
        assert!(err.field_errors().unwrap().contains_key("body"));
    }

    #[tokio::test]
    async fn test_valid_body_passes_through() {
        let ValidatedJson(req) = ValidatedJson::<UserRequest>::from_request(
            json_request(r#"{"name":"Ann","email":"ann@example.com"}"#),
            &(),
        )
        .await
        .unwrap();

        assert_eq!(req.name.as_deref(), Some("Ann"));
        assert_eq!(req.role, None);
    }
}
