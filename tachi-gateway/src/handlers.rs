//! Request handling: the gateway pipeline and the health endpoints.
//!
//! One [`Gateway`] value is built at startup and shared behind an [`Arc`];
//! every request runs the same pipeline against it:
//!
//! ```text
//! admitted → rate-limited? → classified → passthrough
//!                                       ↘ challenge / verify → replay
//!                                         → proxy → crawl log (detached)
//! ```
//!
//! Any stage short-circuits with a [`GatewayError`] which the challenger
//! maps to the client-visible response. The crawl log is scheduled after the
//! proxied response is committed and never affects it.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::Json;
use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::header::{AUTHORIZATION, USER_AGENT};
use axum::http::{HeaderMap, Method, Request, Response, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use serde_json::json;
use tower_http::trace::TraceLayer;

use tachi::{CrawlerClassifier, Kvs, PaymentProof};
use tachi_evm::{ChainReader, CrawlLedger, CrawlLogJob};

use crate::admission;
use crate::challenge::Challenger;
use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::logger::CrawlLogger;
use crate::proxy::OriginProxy;
use crate::rate_limit::RateLimiter;
use crate::replay::ReplayGuard;
use crate::verify::PaymentVerifier;

/// Budget for everything that happens before the origin proxy.
const REQUEST_BUDGET: Duration = Duration::from_secs(10);

/// The assembled gateway: configuration plus every collaborator, wired once
/// at startup and shared by all request tasks.
pub struct Gateway {
    config: GatewayConfig,
    kvs: Arc<dyn Kvs>,
    chain: Arc<dyn ChainReader>,
    classifier: CrawlerClassifier,
    limiter: RateLimiter,
    replay: ReplayGuard,
    verifier: PaymentVerifier,
    challenger: Challenger,
    proxy: OriginProxy,
    crawl_logger: CrawlLogger,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("config", &self.config)
            .field("limiter", &self.limiter)
            .finish_non_exhaustive()
    }
}

/// Shared handler state.
pub type GatewayState = Arc<Gateway>;

impl Gateway {
    /// Wires the gateway from its primitive collaborators.
    ///
    /// # Errors
    ///
    /// Fails when configured crawler patterns do not compile or the proxy
    /// client cannot be built.
    pub fn new(
        config: GatewayConfig,
        kvs: Arc<dyn Kvs>,
        chain: Arc<dyn ChainReader>,
        ledger: Arc<dyn CrawlLedger>,
    ) -> Result<Self, GatewayError> {
        let classifier = match &config.crawler_patterns {
            Some(patterns) => {
                CrawlerClassifier::with_patterns(patterns.iter().map(String::as_str))
                    .map_err(|e| GatewayError::Internal(format!("CRAWLER_PATTERNS: {e}")))?
            }
            None => CrawlerClassifier::new(),
        };
        let limiter = RateLimiter::new(Arc::clone(&kvs), config.rate_limit_requests);
        let replay = ReplayGuard::new(Arc::clone(&kvs));
        let verifier = PaymentVerifier::new(Arc::clone(&chain), &config);
        let challenger = Challenger::new(&config);
        let proxy = OriginProxy::new(config.origin_url.clone())?;
        let crawl_logger = CrawlLogger::new(ledger);
        Ok(Self {
            config,
            kvs,
            chain,
            classifier,
            limiter,
            replay,
            verifier,
            challenger,
            proxy,
            crawl_logger,
        })
    }

    /// The frozen configuration.
    #[must_use]
    pub const fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// The crawl logger, for shutdown draining.
    #[must_use]
    pub const fn crawl_logger(&self) -> &CrawlLogger {
        &self.crawl_logger
    }
}

/// Builds the gateway router: health endpoints plus the catch-all pipeline.
pub fn router(gateway: GatewayState) -> axum::Router {
    axum::Router::new()
        .route("/health", get(health).options(preflight))
        .route("/health/detailed", get(health_detailed).options(preflight))
        .fallback(handle)
        .layer(TraceLayer::new_for_http())
        .with_state(gateway)
}

/// CORS preflight for the explicitly routed paths; the fallback covers the
/// rest.
async fn preflight() -> Response<Body> {
    admission::preflight_response()
}

/// `GET /health` — liveness.
async fn health(State(gateway): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "environment": gateway.config.environment.as_str(),
    }))
}

/// `GET /health/detailed` — liveness plus chain and KVS probes.
///
/// Degraded dependencies turn the status into 503 so orchestrators can pull
/// the instance before clients notice.
async fn health_detailed(State(gateway): State<GatewayState>) -> Response<Body> {
    let chain = gateway.chain.block_number().await;
    let kvs = gateway.kvs.ping().await;
    let healthy = chain.is_ok() && kvs.is_ok();

    let chain_probe = match &chain {
        Ok(block) => json!({ "status": "ok", "latestBlock": block }),
        Err(error) => json!({ "status": "error", "error": error.to_string() }),
    };
    let kvs_probe = match &kvs {
        Ok(()) => json!({ "status": "ok" }),
        Err(error) => json!({ "status": "error", "error": error.to_string() }),
    };
    let body = json!({
        "status": if healthy { "ok" } else { "degraded" },
        "version": env!("CARGO_PKG_VERSION"),
        "environment": gateway.config.environment.as_str(),
        "chain": chain_probe,
        "kvs": kvs_probe,
        "rateLimiter": { "failOpen": gateway.limiter.fail_open_count() },
        "crawlLogger": { "failures": gateway.crawl_logger.failure_count() },
    });
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body)).into_response()
}

/// Catch-all handler running the gateway pipeline.
async fn handle(State(gateway): State<GatewayState>, request: Request<Body>) -> Response<Body> {
    if request.method() == Method::OPTIONS {
        return admission::preflight_response();
    }

    let connect_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip());
    let client_ip = client_ip(request.headers(), connect_ip);

    match run_pipeline(&gateway, &client_ip, request).await {
        Ok(response) => response,
        Err(error) => {
            if matches!(
                error,
                GatewayError::Internal(_) | GatewayError::UpstreamUnavailable(_)
            ) {
                tracing::error!(client_ip = %client_ip, %error, "request failed");
            } else {
                tracing::debug!(client_ip = %client_ip, %error, "request rejected");
            }
            gateway.challenger.error_response(&error)
        }
    }
}

async fn run_pipeline(
    gateway: &Gateway,
    client_ip: &str,
    request: Request<Body>,
) -> Result<Response<Body>, GatewayError> {
    admission::admit(
        request.method(),
        request.headers(),
        gateway.config.max_request_size,
    )?;

    let decision = gateway.limiter.check(client_ip).await;
    if !decision.allowed {
        return Err(GatewayError::RateLimited {
            limit: decision.limit,
            retry_after: decision.retry_after,
        });
    }

    let user_agent = request
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned();

    if !gateway.classifier.is_ai_crawler(&user_agent) {
        // Ordinary traffic: straight to the origin, no payment, no log.
        return gateway.proxy.forward(request, client_ip).await;
    }

    let proof = {
        let headers = request.headers();
        let authorization = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
        let x402_payment = headers
            .get(tachi::headers::X402_PAYMENT_HEADER)
            .and_then(|v| v.to_str().ok());
        PaymentProof::from_headers(authorization, x402_payment)?
    }
    .ok_or(GatewayError::MissingProof)?;

    let verified = tokio::time::timeout(REQUEST_BUDGET, async {
        let verified = gateway.verifier.verify(&proof, &gateway.replay).await?;
        // The hash is spent before any byte of the response is produced;
        // a concurrent request holding the same hash sees a replay.
        if !gateway.replay.consume(&proof.tx_hash).await? {
            return Err(GatewayError::Replay);
        }
        Ok(verified)
    })
    .await
    .map_err(|_| GatewayError::Internal("request budget exceeded".to_owned()))??;

    tracing::info!(
        client_ip = %client_ip,
        payer = %verified.payer,
        tx = %verified.tx_hash,
        amount = %verified.amount_base_units,
        "payment verified, proxying crawl"
    );

    let response = gateway.proxy.forward(request, client_ip).await?;

    gateway.crawl_logger.submit(CrawlLogJob {
        token_id: gateway.config.crawl_token_id,
        crawler: verified.payer,
        user_agent,
        timestamp: unix_now(),
    });

    Ok(response)
}

/// Best client-IP guess: forwarded headers first, then the socket peer.
fn client_ip(headers: &HeaderMap, connect_ip: Option<std::net::IpAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        })
        .or_else(|| connect_ip.map(|ip| ip.to_string()))
        .unwrap_or_else(|| "unknown".to_owned())
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.7"));
        assert_eq!(client_ip(&headers, None), "203.0.113.9");
    }

    #[test]
    fn test_client_ip_falls_back_to_real_ip_then_socket() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.7"));
        assert_eq!(client_ip(&headers, None), "198.51.100.7");

        let headers = HeaderMap::new();
        let socket = "192.0.2.4".parse().unwrap();
        assert_eq!(client_ip(&headers, Some(socket)), "192.0.2.4");
        assert_eq!(client_ip(&headers, None), "unknown");
    }
}
