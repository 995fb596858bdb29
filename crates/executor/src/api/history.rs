use {
    crate::api::Context,
    axum::{
        Json,
        extract::{Path, Query, State},
        http::StatusCode,
        response::{IntoResponse, Response},
    },
    chrono::{DateTime, Utc},
    serde::Deserialize,
    serde_json::json,
};

const DEFAULT_LIMIT: i64 = 50;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    limit: Option<i64>,
    /// `updatedAt` of the last row of the previous page.
    cursor: Option<DateTime<Utc>>,
}

/// `GET /api/orders/history?limit=&cursor=` — newest first, keyset
/// paginated on `updatedAt`.
pub async fn list(State(context): State<Context>, Query(pagination): Query<Pagination>) -> Response {
    let limit = pagination.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, 200);
    match context.history.list(pagination.cursor, limit).await {
        Ok(rows) => {
            let has_more = rows.len() == usize::try_from(limit).unwrap_or(usize::MAX);
            let next_cursor = has_more
                .then(|| rows.last().map(|row| row.updated_at))
                .flatten();
            Json(json!({
                "data": rows,
                "pagination": {
                    "limit": limit,
                    "nextCursor": next_cursor,
                    "hasMore": has_more,
                },
            }))
            .into_response()
        }
        Err(err) => {
            tracing::error!(?err, "listing order history failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"message": "Failed to load order history"})),
            )
                .into_response()
        }
    }
}

/// `GET /api/orders/history/{orderId}` — one full history record.
pub async fn get(State(context): State<Context>, Path(order_id): Path<String>) -> Response {
    match context.history.get(&order_id).await {
        Ok(Some(record)) => Json(record).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({"message": "Order not found"})),
        )
            .into_response(),
        Err(err) => {
            tracing::error!(%order_id, ?err, "loading order failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"message": "Failed to load order"})),
            )
                .into_response()
        }
    }
}
