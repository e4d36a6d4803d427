//! Origin proxy.
//!
//! Forwards an admitted request to the publisher origin and streams the
//! answer back. Payment headers never cross the trust boundary: both
//! `Authorization` and `X-402-Payment` are stripped, while `User-Agent`
//! survives and `X-Forwarded-For` gains the client IP. Hop-by-hop headers
//! are dropped in both directions. The origin has 20 s to produce response
//! headers; bodies stream without a deadline.
//!
//! With no origin configured the proxy serves a built-in stub so a fresh
//! deployment is exercisable end to end.

use std::time::Duration;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, HOST};
use axum::http::{HeaderMap, HeaderName, Request, Response, StatusCode};
use url::Url;

use crate::error::GatewayError;

/// Budget for the origin to return response headers.
const HEAD_TIMEOUT: Duration = Duration::from_secs(20);

/// Connect-phase budget.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const X_402_PAYMENT: HeaderName = HeaderName::from_static("x-402-payment");
const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Hop-by-hop headers that must not be forwarded in either direction.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Streams requests to the publisher origin.
#[derive(Debug, Clone)]
pub struct OriginProxy {
    client: reqwest::Client,
    origin: Option<Url>,
}

impl OriginProxy {
    /// Creates a proxy for the given origin; `None` serves the stub.
    ///
    /// # Errors
    ///
    /// Propagates [`reqwest`] client construction failures.
    pub fn new(origin: Option<Url>) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Internal(format!("proxy client: {e}")))?;
        Ok(Self { client, origin })
    }

    /// Forwards the request, appending `client_ip` to `X-Forwarded-For`.
    ///
    /// # Errors
    ///
    /// [`GatewayError::Proxy`] when the origin is unreachable, times out on
    /// headers, or the upstream answer cannot be relayed.
    pub async fn forward(
        &self,
        request: Request<Body>,
        client_ip: &str,
    ) -> Result<Response<Body>, GatewayError> {
        let Some(origin) = &self.origin else {
            return Ok(stub_response());
        };

        let (parts, body) = request.into_parts();

        let mut target = origin.clone();
        target.set_path(parts.uri.path());
        target.set_query(parts.uri.query());

        let mut headers = sanitize_request_headers(&parts.headers);
        let forwarded_for = match parts.headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok())
        {
            Some(existing) => format!("{existing}, {client_ip}"),
            None => client_ip.to_owned(),
        };
        if let Ok(value) = forwarded_for.parse() {
            headers.insert(X_FORWARDED_FOR.clone(), value);
        }

        let upstream_request = self
            .client
            .request(parts.method, target)
            .headers(headers)
            .body(reqwest::Body::wrap_stream(body.into_data_stream()));

        let upstream = tokio::time::timeout(HEAD_TIMEOUT, upstream_request.send())
            .await
            .map_err(|_| GatewayError::Proxy(format!("origin timed out after {HEAD_TIMEOUT:?}")))?
            .map_err(|e| GatewayError::Proxy(e.to_string()))?;

        let status = upstream.status();
        let mut builder = Response::builder().status(status);
        if let Some(response_headers) = builder.headers_mut() {
            for (name, value) in upstream.headers() {
                if !is_hop_by_hop(name.as_str()) {
                    response_headers.insert(name.clone(), value.clone());
                }
            }
        }
        builder
            .body(Body::from_stream(upstream.bytes_stream()))
            .map_err(|e| GatewayError::Proxy(format!("relaying origin response: {e}")))
    }
}

fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h))
}

/// Drops payment, hop-by-hop, and connection-managed headers before
/// forwarding. `Host` and `Content-Length` are recomputed by the client.
fn sanitize_request_headers(headers: &HeaderMap) -> HeaderMap {
    let mut sanitized = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if name == AUTHORIZATION || name == X_402_PAYMENT || name == HOST {
            continue;
        }
        if is_hop_by_hop(name.as_str()) || name == axum::http::header::CONTENT_LENGTH {
            continue;
        }
        sanitized.append(name.clone(), value.clone());
    }
    sanitized
}

fn stub_response() -> Response<Body> {
    let body = serde_json::json!({
        "message": "Tachi gateway development origin",
        "hint": "set ORIGIN_URL to proxy to your content",
    });
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("static stub response")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use axum::http::header::USER_AGENT;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request_with_headers(uri: &str, pairs: &[(&str, &str)]) -> Request<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        for (name, value) in pairs {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_forwards_path_query_and_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/articles/42"))
            .and(query_param("lang", "en"))
            .and(header(USER_AGENT.as_str(), "GPTBot/1.0"))
            .respond_with(ResponseTemplate::new(200).set_body_string("the content"))
            .mount(&server)
            .await;

        let proxy = OriginProxy::new(Some(server.uri().parse().unwrap())).unwrap();
        let request = request_with_headers(
            "/articles/42?lang=en",
            &[("user-agent", "GPTBot/1.0")],
        );
        let response = proxy.forward(request, "203.0.113.9").await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"the content");
    }

    #[tokio::test]
    async fn test_strips_payment_headers_appends_forwarded_for() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let proxy = OriginProxy::new(Some(server.uri().parse().unwrap())).unwrap();
        let request = request_with_headers(
            "/",
            &[
                ("authorization", "Bearer 0xdeadbeef"),
                ("x-402-payment", "0xdeadbeef,1000"),
                ("user-agent", "GPTBot/1.0"),
                ("x-forwarded-for", "198.51.100.1"),
            ],
        );
        proxy.forward(request, "203.0.113.9").await.unwrap();

        let received = server.received_requests().await.unwrap();
        assert_eq!(received.len(), 1);
        let forwarded = &received[0].headers;
        assert!(forwarded.get("authorization").is_none());
        assert!(forwarded.get("x-402-payment").is_none());
        assert_eq!(
            forwarded.get("x-forwarded-for").unwrap(),
            &HeaderValue::from_static("198.51.100.1, 203.0.113.9")
        );
        assert_eq!(
            forwarded.get("user-agent").unwrap(),
            &HeaderValue::from_static("GPTBot/1.0")
        );
    }

    #[tokio::test]
    async fn test_upstream_status_and_headers_relayed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(
                ResponseTemplate::new(404)
                    .insert_header("x-origin-tag", "v7")
                    .set_body_string("not here"),
            )
            .mount(&server)
            .await;

        let proxy = OriginProxy::new(Some(server.uri().parse().unwrap())).unwrap();
        let response = proxy
            .forward(request_with_headers("/missing", &[]), "203.0.113.9")
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers().get("x-origin-tag").unwrap(), "v7");
    }

    #[tokio::test]
    async fn test_unreachable_origin_is_proxy_error() {
        // Port 9 (discard) is closed on loopback in test environments.
        let proxy = OriginProxy::new(Some("http://127.0.0.1:9".parse().unwrap())).unwrap();
        let error = proxy
            .forward(request_with_headers("/", &[]), "203.0.113.9")
            .await
            .unwrap_err();
        assert!(matches!(error, GatewayError::Proxy(_)));
    }

    #[tokio::test]
    async fn test_stub_without_origin() {
        let proxy = OriginProxy::new(None).unwrap();
        let response = proxy
            .forward(request_with_headers("/anything", &[]), "203.0.113.9")
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
