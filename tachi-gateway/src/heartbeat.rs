//! Uptime heartbeat.
//!
//! When a heartbeat URL is configured the gateway pings it once a minute
//! while running. A missed ping on the monitoring side then means the
//! process is down or wedged, not that a request failed. Ping failures are
//! logged and otherwise ignored.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use url::Url;

const INTERVAL: Duration = Duration::from_secs(60);

/// Spawns the heartbeat loop; returns immediately.
///
/// The loop stops when `shutdown` is cancelled.
pub fn spawn(url: Url, client: reqwest::Client, shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(INTERVAL);
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    match client.get(url.clone()).send().await {
                        Ok(response) if response.status().is_success() => {
                            tracing::debug!("heartbeat delivered");
                        }
                        Ok(response) => {
                            tracing::warn!(status = %response.status(), "heartbeat rejected");
                        }
                        Err(error) => {
                            tracing::warn!(%error, "heartbeat failed");
                        }
                    }
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_heartbeat_pings_and_stops_on_cancel() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let token = CancellationToken::new();
        spawn(
            server.uri().parse().unwrap(),
            reqwest::Client::new(),
            token.clone(),
        );

        // First tick fires immediately.
        tokio::time::sleep(Duration::from_millis(200)).await;
        token.cancel();
        let delivered = server.received_requests().await.unwrap().len();
        assert!(delivered >= 1);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(server.received_requests().await.unwrap().len(), delivered);
    }
}
