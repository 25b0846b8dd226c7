use crate::Error;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{error, warn};

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let code = self.code().code();
        if status.is_server_error() {
            error!(status = status.as_u16(), code, error = %self, "request failed");
        } else {
            warn!(status = status.as_u16(), code, error = %self, "request rejected");
        }

        let retry_after = match &self {
            Error::RateLimit {
                retry_after: Some(ra),
                ..
            } => HeaderValue::from_str(&ra.as_secs().to_string()).ok(),
            _ => None,
        };

        let mut resp = (status, Json(self.to_body())).into_response();
        if let Some(v) = retry_after {
            resp.headers_mut().insert(header::RETRY_AFTER, v);
        }
        resp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_status_and_retry_after_header() {
        let resp = Error::RateLimit {
            message: "slow down".into(),
            retry_after: Some(Duration::from_secs(7)),
        }
        .into_response();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(resp.headers().get(header::RETRY_AFTER).unwrap(), "7");

        let resp = Error::validation("bad").into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }
}
