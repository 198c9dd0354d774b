// SPDX-License-Identifier: EUPL-1.2
// Copyright (c) 2026 Benjamin Küttner <benjamin.kuettner@icloud.com>
// Patent Pending — DE Gebrauchsmuster, filed 2026-02-23

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use thiserror::Error;

use super::target::InvalidTarget;

/// Every way a proxied exchange can fail before response headers are sent.
///
/// Once headers are on the wire a failing upstream only truncates the body;
/// it never surfaces as one of these.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("invalid target: {0}")]
    InvalidTarget(#[from] InvalidTarget),

    #[error("upstream {host} sent no response headers within {}s", timeout.as_secs_f32())]
    UpstreamTimeout { host: String, timeout: Duration },

    #[error("redirect chain exceeded {max} hops (last location: {last})")]
    TooManyRedirects { max: usize, last: String },

    #[error("upstream {host} unreachable: {reason}")]
    UpstreamConnection { host: String, reason: String },

    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("request body could not be read: {0}")]
    RequestBody(String),

    #[error("proxy access requires a valid token")]
    Unauthorized,

    #[error("internal proxy error: {0}")]
    Internal(String),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidTarget(_) => StatusCode::BAD_REQUEST,
            Self::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::TooManyRedirects { .. } | Self::UpstreamConnection { .. } => {
                StatusCode::BAD_GATEWAY
            }
            Self::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::RequestBody(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidTarget(_) => "invalid_target",
            Self::UpstreamTimeout { .. } => "upstream_timeout",
            Self::TooManyRedirects { .. } => "too_many_redirects",
            Self::UpstreamConnection { .. } => "upstream_connection",
            Self::BodyTooLarge { .. } => "body_too_large",
            Self::RequestBody(_) => "request_body",
            Self::Unauthorized => "unauthorized",
            Self::Internal(_) => "internal",
        }
    }

    pub(crate) fn connection(host: &str, reason: impl Into<String>) -> Self {
        Self::UpstreamConnection {
            host: host.to_owned(),
            reason: reason.into(),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.to_string(),
            "kind": self.kind(),
        });
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn status_mapping_follows_failure_class() {
        assert_eq!(
            ProxyError::from(InvalidTarget::MissingScheme).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ProxyError::UpstreamTimeout {
                host: "a".into(),
                timeout: Duration::from_secs(30)
            }
            .status(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            ProxyError::TooManyRedirects {
                max: 10,
                last: "http://a/".into()
            }
            .status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ProxyError::connection("a", "reset").status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ProxyError::BodyTooLarge { limit: 10 }.status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            ProxyError::RequestBody("reset".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ProxyError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn timeout_message_names_host_and_bound() {
        let err = ProxyError::UpstreamTimeout {
            host: "slow.example".into(),
            timeout: Duration::from_millis(1500),
        };
        assert_eq!(
            err.to_string(),
            "upstream slow.example sent no response headers within 1.5s"
        );
    }

    #[tokio::test]
    async fn into_response_carries_json_kind() {
        let response = ProxyError::from(InvalidTarget::Empty).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["kind"], "invalid_target");
        assert_eq!(json["error"], "invalid target: no target given");
    }
}
