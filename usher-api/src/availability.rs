use std::convert::Infallible;

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::error::ApiError;
use crate::reservations::parse_show_time;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/availability", get(list_available))
        .route("/v1/screenings/{id}/count", get(count_active))
        .route("/v1/screenings/{id}/stream", get(seat_stream))
}

#[derive(Debug, Deserialize)]
struct AvailabilityQuery {
    room_name: String,
    date: String,
    time: String,
}

#[derive(Debug, Serialize)]
struct AvailabilityResponse {
    screening_id: Uuid,
    available: Vec<u32>,
}

#[derive(Debug, Serialize)]
struct CountResponse {
    screening_id: Uuid,
    active: usize,
}

async fn list_available(
    State(state): State<AppState>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, ApiError> {
    let starts_at = parse_show_time(&query.date, &query.time)?;
    let screening_id = state
        .catalog
        .resolve_screening(&query.room_name, starts_at)
        .await
        .map_err(|e| ApiError::Unavailable(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound("Screening not found".to_string()))?;

    let available = state.allocator.list_available(screening_id).await?;
    Ok(Json(AvailabilityResponse {
        screening_id,
        available,
    }))
}

async fn count_active(
    State(state): State<AppState>,
    Path(screening_id): Path<Uuid>,
) -> Result<Json<CountResponse>, ApiError> {
    let exists = state
        .catalog
        .screening_exists(screening_id)
        .await
        .map_err(|e| ApiError::Unavailable(e.to_string()))?;
    if !exists {
        return Err(ApiError::NotFound("Screening not found".to_string()));
    }

    let active = state.allocator.count_active(screening_id).await?;
    Ok(Json(CountResponse {
        screening_id,
        active,
    }))
}

async fn seat_stream(
    State(state): State<AppState>,
    Path(screening_id): Path<Uuid>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.seat_tx.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(move |result| async move {
        match result {
            Ok(event) if event.screening_id == screening_id => {
                Event::default().event("seat").json_data(&event).ok().map(Ok)
            }
            _ => None,
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
