//! Saga history queries.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use saga::Event;

use crate::AppState;
use crate::error::ApiError;
use crate::history::EventFilters;
use crate::repository::EventRepository;

/// GET /api/event?orderId=..&transactionId=..
#[tracing::instrument(skip(state))]
pub async fn find_by_filters<R: EventRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Query(filters): Query<EventFilters>,
) -> Result<Json<Event>, ApiError> {
    let event = state.history.find_by_filters(&filters).await?;
    Ok(Json(event))
}

/// GET /api/event/all
pub async fn find_all<R: EventRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
) -> Result<Json<Vec<Event>>, ApiError> {
    Ok(Json(state.history.find_all().await?))
}
