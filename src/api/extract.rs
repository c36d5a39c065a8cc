//! Request extractors
//!
//! `ApiJson` is `axum::Json` with its rejection turned into an `AppError`, so
//! a malformed body gets the same `{kind, message}` shape as every other
//! error.

use axum::extract::rejection::JsonRejection;
use axum::extract::FromRequest;

use crate::error::AppError;

/// JSON request body
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::post;
    use axum::Router;
    use http_body_util::BodyExt;
    use serde::Deserialize;
    use tower::util::ServiceExt;

    #[derive(Deserialize)]
    struct Order {
        quantity: i64,
    }

    async fn echo(ApiJson(order): ApiJson<Order>) -> String {
        order.quantity.to_string()
    }

    async fn call(body: &'static str, content_type: &str) -> (StatusCode, Vec<u8>) {
        let app = Router::new().route("/", post(echo));
        let request = Request::post("/")
            .header("content-type", content_type)
            .body(Body::from(body))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, bytes.to_vec())
    }

    #[tokio::test]
    async fn test_valid_body_passes_through() {
        let (status, body) = call(r#"{"quantity": 3}"#, "application/json").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"3");
    }

    #[tokio::test]
    async fn test_rejections_use_error_shape() {
        let cases = [
            (r#"{"quantity": "#, "application/json"),
            (r#"{"quantity": "two"}"#, "application/json"),
            (r#"{"quantity": 3}"#, "text/plain"),
        ];

        for (body, content_type) in cases {
            let (status, bytes) = call(body, content_type).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);

            let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(json["kind"], "invalid_request");
            assert!(json["message"].as_str().is_some());
        }
    }
}
