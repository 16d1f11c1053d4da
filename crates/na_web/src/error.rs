use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use na_core::Error;

/// Error surface of the API handlers.
#[derive(Debug)]
pub enum ApiError {
    Core(Error),
    Unauthorized,
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError::Core(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "message": "Unauthorized" })),
            )
                .into_response(),
            ApiError::Core(Error::NotFound(what)) => (
                StatusCode::NOT_FOUND,
                Json(json!({ "message": format!("{what} not found") })),
            )
                .into_response(),
            ApiError::Core(Error::Validation(errors)) => {
                let mut fields = serde_json::Map::new();
                for (field, messages) in errors.by_field() {
                    fields.insert(field, json!(messages));
                }
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(json!({ "message": "Validation failed", "errors": fields })),
                )
                    .into_response()
            }
            // Everything else is an internal fault: log the detail, keep
            // the response body generic.
            ApiError::Core(err) => {
                error!(error = %err, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "message": "An unexpected error occurred" })),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn not_found_maps_to_404_with_message() {
        let response = ApiError::Core(Error::NotFound("Article".into())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["message"], "Article not found");
    }

    #[tokio::test]
    async fn validation_maps_to_422_with_field_errors() {
        let response =
            ApiError::Core(Error::validation("preferred_sources", "must be an array of strings"))
                .into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = body_json(response).await;
        assert_eq!(json["message"], "Validation failed");
        assert_eq!(
            json["errors"]["preferred_sources"][0],
            "must be an array of strings"
        );
    }

    #[tokio::test]
    async fn unauthorized_maps_to_401() {
        let response = ApiError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["message"], "Unauthorized");
    }

    #[tokio::test]
    async fn internal_faults_do_not_leak_detail() {
        let response =
            ApiError::Core(Error::Storage("disk on fire: /var/db/articles.db".into()))
                .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["message"], "An unexpected error occurred");
        assert!(!json.to_string().contains("disk on fire"));
    }
}
