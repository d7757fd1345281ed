//! Helpers for testing the coordinator and the API executors.
//!
//! When writing tests, keep the following points in mind:
//!
//!  - In every test, call [`setup`]. This will set up the logger so that all console output
//!    is captured by the test runner.
//!
//!  - When using [`sample_api`], make sure that the server is held until all requests to
//!    the server have been made. If the server is dropped, the ports remain open and all
//!    connections to it will time out. To avoid this, assign it to a variable:
//!    `let api = sample_api();`.

use std::collections::BTreeMap;
use std::net::{SocketAddr, TcpListener};
use std::sync::{Arc, Mutex};

use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router, extract, middleware};
use reqwest::Url;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::fmt;

/// Setup the test environment.
///
///  - Initializes logs: The logger only captures logs from the `fetchcoord` crates and mutes all
///    other logs (such as hyper or reqwest).
pub fn setup() {
    fmt()
        .with_env_filter(EnvFilter::new(
            "fetchcoord_service=trace,fetchcoord_api=trace,fetchcoord=trace",
        ))
        .with_target(false)
        .pretty()
        .with_test_writer()
        .try_init()
        .ok();
}

/// A local HTTP server, shut down when dropped.
pub struct Server {
    handle: tokio::task::JoinHandle<()>,
    socket: SocketAddr,
}

impl Server {
    /// Serves `router` on an ephemeral port.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a tokio runtime, or if no port can be bound.
    pub fn with_router(router: Router) -> Self {
        let addr = SocketAddr::from(([127, 0, 0, 1], 0));
        let listener = TcpListener::bind(addr).unwrap();
        listener.set_nonblocking(true).unwrap();
        let socket = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            axum::serve(listener, router).await.unwrap();
        });

        Self { handle, socket }
    }

    /// Returns the socket address that this server listens on.
    pub fn addr(&self) -> SocketAddr {
        self.socket
    }

    /// Returns the port that this server listens on.
    pub fn port(&self) -> u16 {
        self.addr().port()
    }

    /// Returns a full URL pointing to the given path.
    ///
    /// This URL uses `localhost` as hostname.
    pub fn url(&self, path: &str) -> Url {
        let path = path.trim_start_matches('/');
        format!("http://localhost:{}/{}", self.port(), path)
            .parse()
            .unwrap()
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// A mock of the sample REST API that counts requests per URI.
///
/// Besides the regular endpoints, the mock has a couple of special cases:
///
///  - `/example/items/:id` responds with `404` for unknown ids, `403` for `secret`, and `500`
///    for `broken`.
///  - `/users/:id` responds with `401` for id `0`.
pub struct SampleApi {
    server: Server,
    hits: Arc<Mutex<BTreeMap<String, usize>>>,
}

impl SampleApi {
    /// Returns a full URL pointing to the given path.
    pub fn url(&self, path: &str) -> Url {
        self.server.url(path)
    }

    /// The number of requests to the given URI since the last call to [`accesses`](Self::accesses)
    /// or [`all_hits`](Self::all_hits).
    pub fn hits(&self, uri: &str) -> usize {
        let hits = self.hits.lock().unwrap();
        hits.get(uri).copied().unwrap_or_default()
    }

    /// Takes the number of all requests, resetting the counter.
    pub fn accesses(&self) -> usize {
        let map = std::mem::take(&mut *self.hits.lock().unwrap());
        map.into_values().sum()
    }

    /// Takes the number of requests per URI, resetting the counter.
    pub fn all_hits(&self) -> Vec<(String, usize)> {
        let map = std::mem::take(&mut *self.hits.lock().unwrap());
        map.into_iter().collect()
    }
}

/// The items served by the mock, in list order.
pub fn sample_items() -> Value {
    json!([
        { "id": "1", "name": "Widget", "price": 9.99 },
        { "id": "2", "name": "Gadget", "price": 24.5 },
        { "id": "3", "name": "Gizmo", "price": 3.0 },
    ])
}

fn find_item(id: &str) -> Option<Value> {
    match sample_items() {
        Value::Array(items) => items.into_iter().find(|item| item["id"] == id),
        _ => None,
    }
}

#[derive(Deserialize)]
struct NewUser {
    name: String,
    email: String,
}

/// Spawns the mock API, see [`SampleApi`].
///
/// Both base URLs of the client can point to the same mock, as the paths do not overlap.
pub fn sample_api() -> SampleApi {
    let hits = Arc::new(Mutex::new(BTreeMap::new()));

    let hitcounter = {
        let hits = hits.clone();
        move |extract::OriginalUri(uri), req: extract::Request, next: middleware::Next| {
            let hits = hits.clone();
            async move {
                {
                    let mut hits = hits.lock().unwrap();
                    let hits = hits.entry(uri.to_string()).or_default();
                    *hits += 1;
                }

                next.run(req).await
            }
        }
    };

    let router = Router::new()
        .route(
            "/health",
            get(|| async {
                Json(json!({
                    "status": "ok",
                    "timestamp": "2024-01-01T00:00:00.000Z",
                    "uptime": 42.5,
                    "environment": "test",
                    "version": "1.0.0",
                }))
            }),
        )
        .route("/example/items", get(|| async { Json(sample_items()) }))
        .route(
            "/example/items/:id",
            get(|extract::Path(id): extract::Path<String>| async move {
                match id.as_str() {
                    "secret" => Err(StatusCode::FORBIDDEN),
                    "broken" => Err(StatusCode::INTERNAL_SERVER_ERROR),
                    _ => find_item(&id).map(Json).ok_or(StatusCode::NOT_FOUND),
                }
            }),
        )
        .route(
            "/users",
            get(|| async {
                Json(json!({
                    "success": true,
                    "data": [
                        { "id": 1, "name": "John Doe", "email": "john@example.com" },
                        { "id": 2, "name": "Jane Smith", "email": "jane@example.com" },
                    ],
                    "message": "Users retrieved successfully",
                }))
            })
            .post(|Json(user): Json<NewUser>| async move {
                let body = json!({
                    "success": true,
                    "data": {
                        "id": 1700000000000u64,
                        "name": user.name,
                        "email": user.email,
                        "createdAt": "2024-01-01T00:00:00.000Z",
                    },
                    "message": "User created successfully",
                });
                (StatusCode::CREATED, Json(body))
            }),
        )
        .route(
            "/users/:id",
            get(|extract::Path(id): extract::Path<u64>| async move {
                if id == 0 {
                    return Err(StatusCode::UNAUTHORIZED);
                }
                Ok(Json(json!({
                    "success": true,
                    "data": { "id": id, "name": "Sample User", "email": "user@example.com" },
                    "message": "User retrieved successfully",
                })))
            }),
        )
        .route(
            "/app-config",
            get(|| async {
                Json(json!({
                    "success": true,
                    "data": {
                        "appName": "Mobile App Template",
                        "version": "1.0.0",
                        "features": {
                            "authentication": true,
                            "pushNotifications": false,
                            "analytics": true,
                        },
                        "api": { "baseUrl": "http://localhost:3000", "version": "v1" },
                    },
                    "message": "App configuration retrieved successfully",
                }))
            }),
        )
        .layer(middleware::from_fn(hitcounter));

    let server = Server::with_router(router);

    SampleApi { server, hits }
}
