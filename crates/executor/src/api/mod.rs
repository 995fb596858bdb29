//! The HTTP and WebSocket surface. Three routes: order intake, the
//! per-order update stream (a GET upgrade on the same path) and the
//! paginated history. Everything else is a JSON 404.

pub mod execute;
pub mod history;
pub mod subscribe;

use {
    crate::{history::HistoryReader, hub::Hub, intake::Intake},
    axum::{
        Json, Router,
        http::StatusCode,
        routing::{get, post},
    },
    serde_json::json,
    std::{future::Future, net::SocketAddr, sync::Arc},
    tower_http::{
        cors::CorsLayer,
        request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
        trace::TraceLayer,
    },
};

#[derive(Clone)]
pub struct Context {
    pub intake: Arc<Intake>,
    pub hub: Arc<Hub>,
    pub history: Arc<dyn HistoryReader>,
}

pub fn router(context: Context) -> Router {
    Router::new()
        .route(
            "/api/orders/execute",
            post(execute::handler).get(subscribe::handler),
        )
        .route("/api/orders/history", get(history::list))
        .route("/api/orders/history/{order_id}", get(history::get))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        // Set must wrap Propagate so the id exists by the time the
        // response passes back through.
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(context)
}

async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"message": "Route not found"})),
    )
}

pub async fn serve(
    port: u16,
    router: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port))).await?;
    tracing::info!(port, "serving order api");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::tests::support::{InMemoryQueue, RecordingHistory},
        axum::body::{Body, to_bytes},
        serde_json::Value,
        tower::ServiceExt,
    };

    fn context_with(history: Arc<RecordingHistory>) -> Context {
        let hub = Arc::new(Hub::new());
        Context {
            intake: Arc::new(Intake::new(
                history.clone(),
                Arc::new(InMemoryQueue::default()),
                hub.clone(),
            )),
            hub,
            history,
        }
    }

    fn context() -> Context {
        context_with(Arc::new(RecordingHistory::default()))
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn unknown_routes_are_a_json_404() {
        let response = router(context())
            .oneshot(
                axum::http::Request::builder()
                    .uri("/api/unknown")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await,
            json!({"message": "Route not found"}),
        );
    }

    #[tokio::test]
    async fn accepted_orders_come_back_as_202_with_request_id() {
        let payload = json!({
            "tokenIn": "MINTA",
            "tokenOut": "MINTB",
            "amount": 1_000_000,
            "orderType": "market",
        });
        let response = router(context())
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/api/orders/execute")
                    .header("content-type", "application/json")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert!(response.headers().contains_key("x-request-id"));
        let body = body_json(response).await;
        assert_eq!(body["status"], json!("pending"));
        assert_eq!(body["orderId"].as_str().unwrap().len(), 12);
    }

    #[tokio::test]
    async fn invalid_payloads_are_a_400_with_issues() {
        let payload = json!({"tokenIn": "", "amount": 0});
        let response = router(context())
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/api/orders/execute")
                    .header("content-type", "application/json")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["message"], json!("Invalid payload"));
        assert!(!body["issues"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_json_bodies_are_rejected_as_invalid() {
        let response = router(context())
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/api/orders/execute")
                    .header("content-type", "text/plain")
                    .body(Body::from("not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn history_pages_report_cursor_and_has_more() {
        let history = Arc::new(RecordingHistory::default());
        for i in 0i64..3 {
            history.seed_listing(&format!("ORDER{i}"), i);
        }
        let response = router(context_with(history))
            .oneshot(
                axum::http::Request::builder()
                    .uri("/api/orders/history?limit=2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
        assert_eq!(body["pagination"]["limit"], json!(2));
        assert_eq!(body["pagination"]["hasMore"], json!(true));
        assert!(body["pagination"]["nextCursor"].is_string());
    }
}
