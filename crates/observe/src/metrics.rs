use {
    axum::{Router, http::StatusCode, routing::get},
    prometheus::{Encoder, Registry, TextEncoder},
    std::{
        net::SocketAddr,
        sync::{
            Arc, OnceLock,
            atomic::{AtomicBool, Ordering},
        },
    },
};

static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Creates the global registry, optionally prefixing every metric. Call
/// once at startup before anything registers a metric.
pub fn setup_registry(prefix: Option<String>) {
    let registry = Registry::new_custom(prefix, None).expect("invalid metrics prefix");
    REGISTRY.set(registry).expect("registry initialized twice");
}

/// The process wide registry. Lazily created without a prefix when
/// [`setup_registry`] was never called, which keeps tests simple.
pub fn get_registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

fn encode() -> (StatusCode, String) {
    let metrics = get_registry().gather();
    let mut buffer = Vec::new();
    match TextEncoder::new().encode(&metrics, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            String::from_utf8(buffer).unwrap_or_default(),
        ),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("encoding metrics failed: {err}"),
        ),
    }
}

/// `/metrics` plus the probe endpoints: `/liveness` answers 200 for the
/// lifetime of the process, `/healthz` answers 200 once orchestration has
/// flipped the readiness flag.
pub fn router(ready: Arc<AtomicBool>) -> Router {
    Router::new()
        .route("/metrics", get(|| async { encode() }))
        .route("/liveness", get(|| async { StatusCode::OK }))
        .route(
            "/healthz",
            get(move || {
                let ready = ready.clone();
                async move {
                    if ready.load(Ordering::Relaxed) {
                        StatusCode::OK
                    } else {
                        StatusCode::SERVICE_UNAVAILABLE
                    }
                }
            }),
        )
}

pub async fn serve(address: SocketAddr, ready: Arc<AtomicBool>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(address).await?;
    axum::serve(listener, router(ready)).await
}
