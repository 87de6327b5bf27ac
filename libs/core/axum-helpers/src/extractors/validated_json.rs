//! JSON extractor with automatic validation using the validator crate.

use crate::errors::AppError;
use axum::{
    extract::{FromRequest, Json, Request},
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;
use validator::Validate;

/// JSON extractor with automatic validation.
///
/// Unparseable bodies and failed validation are both rejected with 400 and a
/// structured [`ErrorResponse`](crate::errors::ErrorResponse).
///
/// ```ignore
/// #[derive(Deserialize, Validate)]
/// struct CreateTask {
///     #[validate(length(min = 1, max = 255))]
///     title: String,
/// }
///
/// async fn create(ValidatedJson(payload): ValidatedJson<CreateTask>) -> String {
///     payload.title
/// }
/// ```
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(data) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::from(e).into_response())?;

        data.validate()
            .map_err(|e| AppError::from(e).into_response())?;

        Ok(ValidatedJson(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, body::Body, http::Request, http::StatusCode, routing::post};
    use serde::Deserialize;
    use tower::ServiceExt;

    #[derive(Deserialize, Validate)]
    struct Payload {
        #[validate(length(min = 1))]
        name: String,
    }

    async fn handler(ValidatedJson(payload): ValidatedJson<Payload>) -> String {
        payload.name
    }

    async fn post_json(body: &str) -> StatusCode {
        Router::new()
            .route("/", post(handler))
            .oneshot(
                Request::post("/")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_valid_body() {
        assert_eq!(post_json(r#"{"name":"a"}"#).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_malformed_and_invalid_bodies_are_400() {
        assert_eq!(post_json("{oops").await, StatusCode::BAD_REQUEST);
        assert_eq!(post_json(r#"{"other":1}"#).await, StatusCode::BAD_REQUEST);
        assert_eq!(post_json(r#"{"name":""}"#).await, StatusCode::BAD_REQUEST);
    }
}
