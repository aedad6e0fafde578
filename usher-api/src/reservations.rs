use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use usher_admission::{ClaimOutcome, CompensationStatus, MoveOutcome, ReleaseOutcome};
use usher_core::events::SeatEvent;
use usher_core::reservation::Reservation;

use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/reservations", post(claim_seat))
        .route(
            "/v1/reservations/{id}",
            get(view_reservation).delete(release_reservation),
        )
        .route("/v1/reservations/{id}/move", post(move_seat))
}

/// Parse human-entered date and time into the screening start instant.
pub(crate) fn parse_show_time(date: &str, time: &str) -> Result<DateTime<Utc>, ApiError> {
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest("Invalid date, expected YYYY-MM-DD".to_string()))?;
    let time = NaiveTime::parse_from_str(time, "%H:%M")
        .map_err(|_| ApiError::BadRequest("Invalid time, expected HH:MM".to_string()))?;
    Ok(Utc.from_utc_datetime(&date.and_time(time)))
}

#[derive(Debug, Deserialize)]
struct ClaimRequest {
    room_name: String,
    date: String,
    time: String,
    seat_number: u32,
    holder_id: Uuid,
}

#[derive(Debug, Serialize)]
struct ReservationResponse {
    reservation_id: Uuid,
    holder_id: Uuid,
    screening_id: Uuid,
    seat_number: u32,
    created_at: DateTime<Utc>,
}

impl From<Reservation> for ReservationResponse {
    fn from(r: Reservation) -> Self {
        Self {
            reservation_id: r.id,
            holder_id: r.holder_id,
            screening_id: r.screening_id,
            seat_number: r.seat_number,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct ReservationDetails {
    #[serde(flatten)]
    reservation: ReservationResponse,
    room_name: Option<String>,
    starts_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct MoveRequest {
    new_seat_number: u32,
}

#[derive(Debug, Serialize)]
struct MoveResponse {
    #[serde(flatten)]
    reservation: ReservationResponse,
    old_seat_release: &'static str,
}

async fn claim_seat(
    State(state): State<AppState>,
    Json(req): Json<ClaimRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let starts_at = parse_show_time(&req.date, &req.time)?;
    let screening_id = state
        .catalog
        .resolve_screening(&req.room_name, starts_at)
        .await
        .map_err(|e| ApiError::Unavailable(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound("Screening not found".to_string()))?;

    match state
        .allocator
        .claim(screening_id, req.seat_number, req.holder_id)
        .await?
    {
        ClaimOutcome::Won(reservation) => {
            let _ = state.seat_tx.send(SeatEvent::claimed(&reservation));
            Ok((
                StatusCode::CREATED,
                Json(ReservationResponse::from(reservation)),
            ))
        }
        ClaimOutcome::SeatTaken => Err(ApiError::Conflict("Seat already occupied".to_string())),
    }
}

async fn move_seat(
    State(state): State<AppState>,
    Path(reservation_id): Path<Uuid>,
    Json(req): Json<MoveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Advisory pre-read so the released old seat can be announced.
    let old = state.allocator.get(reservation_id).await.ok();

    match state
        .allocator
        .move_to(reservation_id, req.new_seat_number)
        .await?
    {
        MoveOutcome::Moved {
            reservation,
            compensation,
        } => {
            if let Some(old) = old {
                if compensation == CompensationStatus::Released {
                    let _ = state.seat_tx.send(SeatEvent::released(&old));
                }
            }
            let _ = state.seat_tx.send(SeatEvent::moved(&reservation));
            Ok(Json(MoveResponse {
                reservation: reservation.into(),
                old_seat_release: match compensation {
                    CompensationStatus::Released => "released",
                    CompensationStatus::Superseded => "superseded",
                    CompensationStatus::PendingRetry => "pending_retry",
                },
            }))
        }
        MoveOutcome::SeatTaken => Err(ApiError::Conflict("Seat already occupied".to_string())),
    }
}

async fn view_reservation(
    State(state): State<AppState>,
    Path(reservation_id): Path<Uuid>,
) -> Result<Json<ReservationDetails>, ApiError> {
    let reservation = state.allocator.get(reservation_id).await?;
    let summary = state
        .catalog
        .screening_summary(reservation.screening_id)
        .await
        .map_err(|e| ApiError::Unavailable(e.to_string()))?;

    Ok(Json(ReservationDetails {
        room_name: summary.as_ref().map(|s| s.room_name.clone()),
        starts_at: summary.map(|s| s.starts_at),
        reservation: reservation.into(),
    }))
}

async fn release_reservation(
    State(state): State<AppState>,
    Path(reservation_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let existing = state.allocator.get(reservation_id).await.ok();

    if state.allocator.release(reservation_id).await? == ReleaseOutcome::Released {
        if let Some(reservation) = existing {
            let _ = state.seat_tx.send(SeatEvent::released(&reservation));
        }
    }
    Ok(StatusCode::NO_CONTENT)
}
