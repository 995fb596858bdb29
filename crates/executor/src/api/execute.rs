use {
    crate::{api::Context, intake},
    axum::{
        Json,
        extract::{State, rejection::JsonRejection},
        http::StatusCode,
        response::{IntoResponse, Response},
    },
    model::Status,
    serde_json::{Value, json},
};

/// `POST /api/orders/execute` — accepts a market order for asynchronous
/// execution. 202 means the order is queued; subscribe on the same path
/// for its lifecycle.
pub async fn handler(
    State(context): State<Context>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let Ok(Json(payload)) = payload else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "message": "Invalid payload",
                "issues": ["body must be a JSON object"],
            })),
        )
            .into_response();
    };
    match context.intake.submit(&payload).await {
        Ok(job) => (
            StatusCode::ACCEPTED,
            Json(json!({"orderId": job.order_id, "status": Status::Pending})),
        )
            .into_response(),
        Err(intake::Error::Validation { issues }) => (
            StatusCode::BAD_REQUEST,
            Json(json!({"message": "Invalid payload", "issues": issues})),
        )
            .into_response(),
        Err(intake::Error::Internal(err)) => {
            tracing::error!(?err, "order intake failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"message": "Failed to accept order"})),
            )
                .into_response()
        }
    }
}
