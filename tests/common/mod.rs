#![allow(dead_code)]

use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server, StatusCode};
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

/// A request as seen by the stub: path, raw query and Authorization header
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
}

impl SeenRequest {
    /// Decoded value of one query parameter
    pub fn param(&self, name: &str) -> Option<String> {
        let query = self.query.as_deref()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }
}

/// Minimal upstream stand-in; unknown paths answer 404
pub struct StubServer {
    pub addr: SocketAddr,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl StubServer {
    pub async fn spawn(routes: &[(&str, u16, &str)]) -> Self {
        let routes: Arc<HashMap<String, (u16, String)>> = Arc::new(
            routes
                .iter()
                .map(|(path, status, body)| (path.to_string(), (*status, body.to_string())))
                .collect(),
        );
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = oneshot::channel::<()>();

        let svc_routes = Arc::clone(&routes);
        let svc_seen = Arc::clone(&seen);
        let make_svc = make_service_fn(move |_conn| {
            let routes = Arc::clone(&svc_routes);
            let seen = Arc::clone(&svc_seen);
            async move {
                Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
                    let routes = Arc::clone(&routes);
                    let seen = Arc::clone(&seen);
                    async move {
                        let path = req.uri().path().to_string();
                        let query = req.uri().query().map(str::to_string);
                        let authorization = req
                            .headers()
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string);
                        seen.lock().unwrap().push(SeenRequest {
                            path: path.clone(),
                            query,
                            authorization,
                        });

                        let (status, body) = routes
                            .get(&path)
                            .cloned()
                            .unwrap_or((404, String::new()));
                        let mut response = Response::new(Body::from(body));
                        *response.status_mut() = StatusCode::from_u16(status).unwrap();
                        Ok::<_, Infallible>(response)
                    }
                }))
            }
        });

        let server = Server::try_bind(&"127.0.0.1:0".parse().unwrap())
            .unwrap()
            .serve(make_svc);
        let addr = server.local_addr();
        tokio::spawn(server.with_graceful_shutdown(async {
            let _ = rx.await;
        }));

        Self {
            addr,
            seen,
            shutdown: Some(tx),
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn seen(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.seen().into_iter().map(|r| r.path).collect()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// An address nothing listens on
pub fn unreachable_base_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}
