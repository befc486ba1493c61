use super::AppState;
use super::error::ApiError;
use super::extractors::{CallerIdentity, SystemCaller, UserId};
use crate::application::{CreatedBooking, PointsPurchase, VerifyOutcome, WebhookAck};
use crate::domain::booking::Booking;
use crate::domain::payout::{BankAccount, Payout};
use crate::error::BookingError;
use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub listing_id: Uuid,
    pub check_in: String,
    pub check_out: String,
    pub service_fee: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    pub reference: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct PointsPurchaseRequest {
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddPointsRequest {
    pub user_id: Uuid,
    pub points: u64,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PointsBalance {
    pub points: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutRequest {
    pub vendor_id: Uuid,
    pub amount: Decimal,
    pub account_number: String,
    pub bank_code: String,
}

/// Accepts RFC 3339 instants or bare `YYYY-MM-DD` dates (midnight UTC).
fn parse_instant(field: &str, value: &str) -> Result<DateTime<Utc>, BookingError> {
    let value = value.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Ok(instant.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| BookingError::MalformedPayload(format!("{field} is not a valid date")))
}

pub async fn create_booking(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Json(request): Json<CreateBookingRequest>,
) -> ApiResult<(StatusCode, Json<CreatedBooking>)> {
    let check_in = parse_instant("checkIn", &request.check_in)?;
    let check_out = parse_instant("checkOut", &request.check_out)?;
    let created = state
        .bookings
        .create_booking(
            user_id,
            request.listing_id,
            check_in,
            check_out,
            request.service_fee,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn list_bookings(
    State(state): State<AppState>,
    UserId(user_id): UserId,
) -> ApiResult<Json<Vec<Booking>>> {
    Ok(Json(state.bookings.user_bookings(user_id).await?))
}

pub async fn verify_booking(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(booking_id): Path<Uuid>,
    Query(query): Query<VerifyQuery>,
) -> ApiResult<Json<VerifyOutcome>> {
    let outcome = state
        .bookings
        .verify_payment(booking_id, user_id, query.reference)
        .await?;
    Ok(Json(outcome))
}

pub async fn delete_booking(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(booking_id): Path<Uuid>,
) -> ApiResult<Json<Booking>> {
    Ok(Json(state.bookings.delete_booking(booking_id, user_id).await?))
}

pub async fn update_booking_status(
    State(state): State<AppState>,
    CallerIdentity(caller): CallerIdentity,
    Path(booking_id): Path<Uuid>,
    Json(update): Json<StatusUpdate>,
) -> ApiResult<Json<Booking>> {
    let booking = state
        .bookings
        .update_booking_status(booking_id, &update.status, caller)
        .await?;
    Ok(Json(booking))
}

pub async fn purchase_points(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Json(request): Json<PointsPurchaseRequest>,
) -> ApiResult<(StatusCode, Json<PointsPurchase>)> {
    let purchase = state
        .points
        .initialize_points_purchase(user_id, request.amount)
        .await?;
    Ok((StatusCode::CREATED, Json(purchase)))
}

pub async fn points_balance(
    State(state): State<AppState>,
    UserId(user_id): UserId,
) -> ApiResult<Json<PointsBalance>> {
    let points = state.points.user_points(user_id).await?;
    Ok(Json(PointsBalance { points }))
}

pub async fn add_points(
    State(state): State<AppState>,
    _system: SystemCaller,
    Json(request): Json<AddPointsRequest>,
) -> ApiResult<Json<PointsBalance>> {
    let points = state
        .points
        .add_points(request.user_id, request.points, request.reason)
        .await?;
    Ok(Json(PointsBalance { points }))
}

pub async fn initiate_payout(
    State(state): State<AppState>,
    _system: SystemCaller,
    Json(request): Json<PayoutRequest>,
) -> ApiResult<(StatusCode, Json<Payout>)> {
    let destination = BankAccount {
        account_number: request.account_number,
        bank_code: request.bank_code,
    };
    let payout = state
        .payouts
        .initiate_payout(request.vendor_id, request.amount, destination)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(payout)))
}

/// Signature is checked over the exact bytes received.
pub async fn webhook(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookAck>> {
    let header = state
        .reconciliation
        .signature_header(&provider)
        .map_err(ApiError::for_webhook)?;
    let signature = headers.get(header).and_then(|v| v.to_str().ok());
    let ack = state
        .reconciliation
        .handle_webhook(&provider, signature, &body)
        .await
        .map_err(ApiError::for_webhook)?;
    Ok(Json(ack))
}

pub async fn health() -> &'static str {
    "ok"
}
