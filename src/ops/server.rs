// * HTTP surface: /health, /ready, /metrics
// * Every route answers 200; callers read the /ready body, not the status code, for degradation

use crate::app::{AppContext, StartupError};
use crate::ops::telemetry;
use chrono::{DateTime, Utc};
use hyper::header::{HeaderValue, ALLOW, CONTENT_TYPE};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, StatusCode};
use serde::Serialize;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

// * Route label for paths outside the known set; keeps metric cardinality bounded
const UNMATCHED: &str = "unmatched";

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: &'static str,
}

/// Server handle for graceful shutdown
pub struct ServerHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    running: Arc<AtomicBool>,
    local_addr: SocketAddr,
    join: JoinHandle<()>,
}

impl ServerHandle {
    /// Stops accepting connections and waits for in-flight requests to finish
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.join).await {
            tracing::error!(error = %e, "HTTP server task failed");
        }
        self.running.store(false, Ordering::Relaxed);
    }

    /// Returns true if the server is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

/// Resolves `host:port`; accepts IP literals and hostnames
pub async fn resolve_listen_addr(host: &str, port: u16) -> Result<SocketAddr, StartupError> {
    let display = format!("{host}:{port}");
    let mut addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|source| StartupError::Resolve {
            addr: display.clone(),
            source,
        })?;
    addrs.next().ok_or(StartupError::NoAddress(display))
}

/// Binds and starts the HTTP server in a background task
///
/// # Example
/// ```ignore
/// let handle = server::start_server(ctx, "127.0.0.1:8000".parse()?).await?;
/// // Server is now answering /health, /ready and /metrics
/// handle.shutdown().await;
/// ```
pub async fn start_server(
    ctx: Arc<AppContext>,
    addr: SocketAddr,
) -> Result<ServerHandle, StartupError> {
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();

    let make_svc = make_service_fn(move |_conn| {
        let ctx = Arc::clone(&ctx);
        async move {
            Ok::<_, Infallible>(service_fn(move |req| handle_request(Arc::clone(&ctx), req)))
        }
    });

    let server = hyper::Server::try_bind(&addr)?.serve(make_svc);
    let local_addr = server.local_addr();
    let server = server.with_graceful_shutdown(async {
        let _ = shutdown_rx.await;
    });

    tracing::info!(addr = %local_addr, "HTTP server started");

    let join = tokio::spawn(async move {
        if let Err(e) = server.await {
            tracing::error!(error = %e, "HTTP server error");
        }

        running_clone.store(false, Ordering::Relaxed);
        tracing::info!("HTTP server stopped");
    });

    Ok(ServerHandle {
        shutdown_tx: Some(shutdown_tx),
        running,
        local_addr,
        join,
    })
}

/// Routes one request and records its metrics
pub async fn handle_request(
    ctx: Arc<AppContext>,
    req: Request<Body>,
) -> Result<Response<Body>, Infallible> {
    let started = Instant::now();
    let method = req.method().clone();
    let endpoint = route_label(req.uri().path());

    telemetry::request_started(method.as_str(), endpoint);
    let response = route(&ctx, &method, endpoint).await;
    telemetry::request_finished(
        method.as_str(),
        endpoint,
        response.status().as_u16(),
        started.elapsed().as_secs_f64(),
    );

    Ok(response)
}

fn route_label(path: &str) -> &'static str {
    match path {
        "/health" => "/health",
        "/ready" => "/ready",
        "/metrics" => "/metrics",
        _ => UNMATCHED,
    }
}

async fn route(ctx: &AppContext, method: &Method, endpoint: &'static str) -> Response<Body> {
    if endpoint == UNMATCHED {
        return json_response(StatusCode::NOT_FOUND, &ErrorBody { detail: "Not Found" });
    }

    if method != Method::GET {
        let mut response = json_response(
            StatusCode::METHOD_NOT_ALLOWED,
            &ErrorBody {
                detail: "Method Not Allowed",
            },
        );
        response
            .headers_mut()
            .insert(ALLOW, HeaderValue::from_static("GET"));
        return response;
    }

    match endpoint {
        "/health" => json_response(
            StatusCode::OK,
            &HealthBody {
                status: "healthy",
                timestamp: Utc::now(),
            },
        ),
        "/ready" => {
            let report = ctx.readiness.check().await;
            json_response(StatusCode::OK, &report)
        }
        _ => metrics_response(),
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Body> {
    let payload = serde_json::to_vec(body).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to serialize response body");
        b"{}".to_vec()
    });

    let mut response = Response::new(Body::from(payload));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn metrics_response() -> Response<Body> {
    let mut response = Response::new(Body::from(telemetry::get_metrics_string()));
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static(telemetry::metrics_content_type()),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn request(method: Method, path: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(path)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(response: Response<Body>) -> serde_json::Value {
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_route_labels() {
        assert_eq!(route_label("/health"), "/health");
        assert_eq!(route_label("/ready"), "/ready");
        assert_eq!(route_label("/metrics"), "/metrics");
        assert_eq!(route_label("/admin"), UNMATCHED);
    }

    #[tokio::test]
    async fn test_health() {
        let ctx = AppContext::build(AppConfig::default());
        let response = handle_request(ctx, request(Method::GET, "/health"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        let timestamp = body["timestamp"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(timestamp).is_ok());
    }

    #[tokio::test]
    async fn test_ready_without_integrations() {
        let ctx = AppContext::build(AppConfig::default());
        let response = handle_request(ctx, request(Method::GET, "/ready"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["status"], "ready");
        assert!(body["services"].as_object().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let ctx = AppContext::build(AppConfig::default());
        let response = handle_request(ctx, request(Method::GET, "/nope"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_wrong_method() {
        let ctx = AppContext::build(AppConfig::default());
        let response = handle_request(ctx, request(Method::POST, "/health"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[ALLOW], "GET");
    }

    #[tokio::test]
    async fn test_metrics_content_type() {
        let ctx = AppContext::build(AppConfig::default());
        let response = handle_request(ctx, request(Method::GET, "/metrics"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/plain; version=0.0.4"));
    }

    #[tokio::test]
    async fn test_resolve_listen_addr() {
        let addr = resolve_listen_addr("127.0.0.1", 8000).await.unwrap();
        assert_eq!(addr.port(), 8000);
        assert!(addr.ip().is_loopback());
    }
}
