//! HTTP callback server that turns producer POSTs into channel events.
//!
//! The producer is handed the callback URL in the generation request and
//! posts each progress payload to it. The channel reports connected for as
//! long as the server is running.
//!
//! ## Endpoints
//!
//! | Method | Path              | Body                         |
//! |--------|-------------------|------------------------------|
//! | `GET`  | `/health`         | -                            |
//! | `POST` | `/events/{event}` | `GenerationProgress` as JSON |
//!
//! Only the `generation:progress` event is accepted; other event names get
//! `404 Not Found`.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, oneshot, watch};
use tracing::{debug, error, info};

use super::channel::{LocalChannel, ProgressChannel};
use super::models::{GenerationProgress, PROGRESS_EVENT};

pub struct CallbackChannel {
    channel: LocalChannel,
    shutdown_tx: Option<oneshot::Sender<()>>,
    addr: Option<SocketAddr>,
}

impl Default for CallbackChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl CallbackChannel {
    pub fn new() -> Self {
        Self {
            channel: LocalChannel::default(),
            shutdown_tx: None,
            addr: None,
        }
    }

    /// Bind to `bind` (use port 0 for a dynamic port) and start serving.
    ///
    /// Returns the base callback URL.
    pub async fn start(&mut self, bind: &str) -> Result<String> {
        let listener = TcpListener::bind(bind)
            .await
            .with_context(|| format!("Failed to bind callback server on {}", bind))?;
        let addr = listener
            .local_addr()
            .context("Failed to get callback server address")?;
        self.addr = Some(addr);

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        self.shutdown_tx = Some(shutdown_tx);

        let app = build_router(self.channel.clone());
        let channel = self.channel.clone();
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
            {
                error!(error = %e, "Callback server error");
            }
            channel.set_connected(false);
        });

        self.channel.set_connected(true);
        let url = format!("http://{}", addr);
        info!(url = %url, "Progress callback server listening");
        Ok(url)
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.channel.set_connected(false);
        self.addr = None;
    }

    pub fn addr(&self) -> Option<SocketAddr> {
        self.addr
    }

    /// URL the producer should post `generation:progress` payloads to.
    pub fn event_url(&self) -> Option<String> {
        self.addr
            .map(|addr| format!("http://{}/events/{}", addr, PROGRESS_EVENT))
    }
}

impl Drop for CallbackChannel {
    fn drop(&mut self) {
        self.stop();
    }
}

impl ProgressChannel for CallbackChannel {
    fn is_connected(&self) -> bool {
        self.channel.is_connected()
    }

    fn connection(&self) -> watch::Receiver<bool> {
        self.channel.connection()
    }

    fn subscribe(&self) -> broadcast::Receiver<GenerationProgress> {
        self.channel.subscribe()
    }
}

fn build_router(channel: LocalChannel) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/events/{event}", post(event_handler))
        .with_state(channel)
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn event_handler(
    State(channel): State<LocalChannel>,
    Path(event): Path<String>,
    Json(progress): Json<GenerationProgress>,
) -> StatusCode {
    if event != PROGRESS_EVENT {
        return StatusCode::NOT_FOUND;
    }
    let delivered = channel.publish(progress);
    debug!(delivered, "Forwarded progress event");
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::models::{GenerationStep, ProgressStatus};
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_router() -> (Router, LocalChannel) {
        let channel = LocalChannel::default();
        channel.set_connected(true);
        (build_router(channel.clone()), channel)
    }

    fn post_event(uri: &str, body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_progress_endpoint_publishes() {
        let (app, channel) = test_router();
        let mut rx = channel.subscribe();

        let event = GenerationProgress::in_progress(GenerationStep::Modules, 40, "Modules");
        let request = post_event(
            "/events/generation:progress",
            serde_json::to_string(&event).unwrap(),
        );
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.status, ProgressStatus::InProgress);
        assert_eq!(received.progress, 40);
    }

    #[tokio::test]
    async fn test_unknown_event_is_not_found() {
        let (app, channel) = test_router();
        let mut rx = channel.subscribe();

        let event = GenerationProgress::in_progress(GenerationStep::Course, 10, "Course");
        let request = post_event("/events/chat:message", serde_json::to_string(&event).unwrap());
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_malformed_payload_is_rejected() {
        let (app, _channel) = test_router();
        let request = post_event("/events/generation:progress", "{\"progress\": 5}".to_string());
        let response = app.oneshot(request).await.unwrap();
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (app, _channel) = test_router();
        let request = Request::builder()
            .method("GET")
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_start_stop_toggles_connection() {
        let mut server = CallbackChannel::new();
        assert!(!server.is_connected());

        match server.start("127.0.0.1:0").await {
            Ok(url) => {
                assert!(url.starts_with("http://127.0.0.1:"));
                assert!(server.is_connected());
                assert!(
                    server
                        .event_url()
                        .unwrap()
                        .ends_with("/events/generation:progress")
                );
                server.stop();
                assert!(!server.is_connected());
                assert!(server.addr().is_none());
            }
            Err(e) => {
                let err_chain = format!("{:?}", e);
                if err_chain.contains("Operation not permitted")
                    || err_chain.contains("Permission denied")
                    || err_chain.contains("bind")
                {
                    eprintln!("Skipping test_start_stop_toggles_connection (sandbox): {:?}", e);
                    return;
                }
                panic!("Unexpected error: {:?}", e);
            }
        }
    }
}
