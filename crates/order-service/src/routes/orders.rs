//! Order submission.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use saga::{Order, OrderProducts, Topic};
use serde::Deserialize;

use crate::AppState;
use crate::error::ApiError;
use crate::repository::EventRepository;

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub products: Vec<OrderProducts>,
}

/// POST /api/order: creates an order and starts its saga.
///
/// The response only acknowledges the order; the saga outcome is available
/// later through `/api/event`.
#[tracing::instrument(skip_all, fields(lines = req.products.len()))]
pub async fn create<R: EventRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    if req.products.is_empty() {
        return Err(ApiError::BadRequest(
            "Order must have at least one product.".to_string(),
        ));
    }

    let order = Order::new(req.products);
    let payload = serde_json::to_string(&order)?;
    state
        .broker
        .send(Topic::StartSaga.as_str(), payload)
        .await?;

    metrics::counter!("orders_created_total").increment(1);
    tracing::info!(order_id = %order.id, "order created, saga requested");

    Ok((StatusCode::CREATED, Json(order)))
}
