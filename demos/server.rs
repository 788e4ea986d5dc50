//! Simple REST API server example for the booking engine.
//!
//! Run with: `cargo run --example server`
//!
//! ## Endpoints
//!
//! - `POST /bookings` - Submit a booking request
//! - `GET /bookings` - List all bookings
//! - `GET /bookings/{id}` - Get a booking by id
//! - `PUT /bookings/{id}/status` - Approve/reject/cancel/complete a booking
//! - `PUT /bookings/{id}/payment` - Record a payment status change
//! - `PUT /bookings/{id}/dates` - Move a booking to new dates
//! - `DELETE /bookings/{id}` - Hard-delete a booking (admin override)
//! - `GET /availability?year=2025&month=7` - Occupied dates for a month
//! - `POST /quotes` - Price a stay without booking it
//! - `GET /rates` / `POST /rates` / `DELETE /rates/{id}` - Rate administration
//! - `GET /calendar/export` - Confirmed stays for the iCal feed
//! - `POST /calendar/import` - Import a booking row from an external feed
//!
//! ## Example Usage
//!
//! ```bash
//! # Set a base rate
//! curl -X POST http://localhost:3000/rates \
//!   -H "Content-Type: application/json" \
//!   -d '{"id": null, "kind": "base", "guests": 2, "amount_per_night": "950.00", "start_date": null, "end_date": null, "description": null}'
//!
//! # Request a booking
//! curl -X POST http://localhost:3000/bookings \
//!   -H "Content-Type: application/json" \
//!   -d '{"check_in": "2025-07-01", "check_out": "2025-07-04", "guests": 2, "guest_name": "Thandi", "email": "thandi@example.com", "phone": "063 000 0000", "special_requests": null}'
//!
//! # Approve it
//! curl -X PUT http://localhost:3000/bookings/1/status \
//!   -H "Content-Type: application/json" \
//!   -d '{"status": "approved", "note": "deposit received", "notify_guest": true}'
//! ```

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use booking_engine_rs::{
    Actor, Booking, BookingEngine, BookingError, BookingId, BookingRequest, BookingStatus,
    CalendarEntry, ExternalBooking, GuestCount, ImportOutcome, PaymentStatus, PaymentUpdate,
    Quote, Rate, RateDraft, RateFilter, RateId,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;

// === Request/Response DTOs ===

/// Request body for a booking status transition.
#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: BookingStatus,
    pub note: Option<String>,
    #[serde(default)]
    pub notify_guest: bool,
}

/// Request body for a payment status transition.
#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub payment_status: PaymentStatus,
    pub amount: Option<Decimal>,
    pub reference: Option<String>,
    pub method: Option<String>,
}

/// Request body for moving a booking to new dates.
#[derive(Debug, Deserialize)]
pub struct DatesRequest {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub note: Option<String>,
}

/// Request body for pricing a stay.
#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: GuestCount,
}

/// Response body for availability queries.
#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub year: i32,
    pub month: u32,
    pub unavailable_dates: Vec<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityParams {
    pub year: i32,
    pub month: u32,
}

/// Response body for import attempts.
#[derive(Debug, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ImportResponse {
    Imported { booking: Booking },
    Skipped { external_uid: String },
}

/// Response body for errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

// === Application State ===

/// Shared application state containing the booking engine.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<BookingEngine>,
}

/// The staff identity the demo runs admin actions under; a real deployment
/// resolves this from the bearer token.
fn staff() -> Actor {
    Actor::staff("admin@example.com")
}

// === Error Handling ===

/// Wrapper for converting `BookingError` into HTTP responses.
pub struct AppError(BookingError);

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            BookingError::Validation { .. } => (StatusCode::BAD_REQUEST, "VALIDATION"),
            BookingError::DateConflict { .. } => (StatusCode::CONFLICT, "DATE_CONFLICT"),
            BookingError::OverlappingRate { .. } => (StatusCode::CONFLICT, "OVERLAPPING_RATE"),
            BookingError::LastBaseRate { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "LAST_BASE_RATE")
            }
            BookingError::NoRateAvailable { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "NO_RATE_AVAILABLE")
            }
            BookingError::IllegalTransition { .. } => (StatusCode::CONFLICT, "ILLEGAL_TRANSITION"),
            BookingError::IllegalPaymentTransition { .. } => {
                (StatusCode::CONFLICT, "ILLEGAL_PAYMENT_TRANSITION")
            }
            BookingError::PaymentOnRejected => (StatusCode::CONFLICT, "PAYMENT_ON_REJECTED"),
            BookingError::BookingNotFound { .. } => (StatusCode::NOT_FOUND, "BOOKING_NOT_FOUND"),
            BookingError::RateNotFound { .. } => (StatusCode::NOT_FOUND, "RATE_NOT_FOUND"),
            BookingError::DataIntegrity { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "DATA_INTEGRITY")
            }
        };

        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}

// === Handlers ===

/// POST /bookings - Submit a new booking request.
async fn create_booking(
    State(state): State<AppState>,
    Json(request): Json<BookingRequest>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let booking = state.engine.create_booking(&request, &Actor::Guest)?;
    Ok((StatusCode::CREATED, Json(booking)))
}

/// GET /bookings - List all bookings.
async fn list_bookings(State(state): State<AppState>) -> Json<Vec<Booking>> {
    Json(state.engine.bookings())
}

/// GET /bookings/{id} - Get a booking by id.
async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<Booking>, AppError> {
    state
        .engine
        .get_booking(BookingId(id))
        .map(Json)
        .ok_or_else(|| AppError(BookingError::BookingNotFound { id: BookingId(id) }))
}

/// PUT /bookings/{id}/status - Move a booking through the lifecycle.
async fn transition_status(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Json(request): Json<StatusRequest>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.engine.transition_status(
        BookingId(id),
        request.status,
        &staff(),
        request.note,
        request.notify_guest,
    )?;
    Ok(Json(booking))
}

/// PUT /bookings/{id}/payment - Record a payment status change.
async fn transition_payment(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Json(request): Json<PaymentRequest>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.engine.transition_payment(
        BookingId(id),
        request.payment_status,
        PaymentUpdate {
            amount: request.amount,
            reference: request.reference,
            method: request.method,
        },
        &staff(),
    )?;
    Ok(Json(booking))
}

/// PUT /bookings/{id}/dates - Move a booking to new dates.
async fn update_dates(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Json(request): Json<DatesRequest>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.engine.update_booking_dates(
        BookingId(id),
        request.check_in,
        request.check_out,
        &staff(),
        request.note,
    )?;
    Ok(Json(booking))
}

/// DELETE /bookings/{id} - Hard-delete a booking.
async fn delete_booking(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<StatusCode, AppError> {
    state.engine.delete_booking(BookingId(id), &staff())?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /availability - Occupied dates for a month.
async fn availability(
    State(state): State<AppState>,
    Query(params): Query<AvailabilityParams>,
) -> Result<Json<AvailabilityResponse>, AppError> {
    let occupied = state.engine.availability(params.year, params.month)?;
    Ok(Json(AvailabilityResponse {
        year: params.year,
        month: params.month,
        unavailable_dates: occupied.into_iter().collect(),
    }))
}

/// POST /quotes - Price a stay.
async fn quote(
    State(state): State<AppState>,
    Json(request): Json<QuoteRequest>,
) -> Result<Json<Quote>, AppError> {
    let quote = state
        .engine
        .quote(request.check_in, request.check_out, request.guests)?;
    Ok(Json(quote))
}

/// GET /rates - List all rates.
async fn list_rates(State(state): State<AppState>) -> Json<Vec<Rate>> {
    Json(state.engine.rates(RateFilter::default()))
}

/// POST /rates - Create or update a rate.
async fn upsert_rate(
    State(state): State<AppState>,
    Json(draft): Json<RateDraft>,
) -> Result<(StatusCode, Json<Rate>), AppError> {
    let created = draft.id.is_none();
    let rate = state.engine.upsert_rate(draft, &staff())?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(rate)))
}

/// DELETE /rates/{id} - Soft-delete a rate.
async fn deactivate_rate(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<Rate>, AppError> {
    let rate = state.engine.deactivate_rate(RateId(id), &staff())?;
    Ok(Json(rate))
}

/// GET /calendar/export - Confirmed stays for the iCal feed.
async fn calendar_export(State(state): State<AppState>) -> Json<Vec<CalendarEntry>> {
    Json(state.engine.calendar_export())
}

/// POST /calendar/import - Import one row from an external feed.
async fn calendar_import(
    State(state): State<AppState>,
    Json(row): Json<ExternalBooking>,
) -> Result<(StatusCode, Json<ImportResponse>), AppError> {
    let actor = Actor::service(row.platform.clone());
    match state.engine.import_external(&row, &actor)? {
        ImportOutcome::Imported(booking) => Ok((
            StatusCode::CREATED,
            Json(ImportResponse::Imported { booking }),
        )),
        ImportOutcome::Skipped { external_uid } => {
            Ok((StatusCode::OK, Json(ImportResponse::Skipped { external_uid })))
        }
    }
}

// === Router ===

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/bookings", post(create_booking).get(list_bookings))
        .route("/bookings/{id}", get(get_booking).delete(delete_booking))
        .route("/bookings/{id}/status", put(transition_status))
        .route("/bookings/{id}/payment", put(transition_payment))
        .route("/bookings/{id}/dates", put(update_dates))
        .route("/availability", get(availability))
        .route("/quotes", post(quote))
        .route("/rates", get(list_rates).post(upsert_rate))
        .route("/rates/{id}", delete(deactivate_rate))
        .route("/calendar/export", get(calendar_export))
        .route("/calendar/import", post(calendar_import))
        .with_state(state)
}

// === Main ===

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    // The demo "mailer": a thread draining notification events the way the
    // real email sender would.
    let (sender, receiver) = crossbeam::channel::unbounded();
    std::thread::spawn(move || {
        for notification in receiver {
            tracing::info!(?notification, "would send email");
        }
    });

    let state = AppState {
        engine: Arc::new(BookingEngine::new().with_notifier(sender)),
    };

    let app = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:3000").await.unwrap();
    println!("Booking API server running on http://127.0.0.1:3000");
    println!();
    println!("Endpoints:");
    println!("  POST   /bookings              - Submit a booking request");
    println!("  GET    /bookings              - List all bookings");
    println!("  GET    /bookings/:id          - Get booking by id");
    println!("  PUT    /bookings/:id/status   - Transition booking status");
    println!("  PUT    /bookings/:id/payment  - Transition payment status");
    println!("  PUT    /bookings/:id/dates    - Move a booking to new dates");
    println!("  DELETE /bookings/:id          - Hard-delete a booking");
    println!("  GET    /availability          - Occupied dates for a month");
    println!("  POST   /quotes                - Price a stay");
    println!("  GET    /rates                 - List rates");
    println!("  POST   /rates                 - Create or update a rate");
    println!("  DELETE /rates/:id             - Deactivate a rate");
    println!("  GET    /calendar/export       - Confirmed stays for iCal");
    println!("  POST   /calendar/import       - Import an external booking");

    axum::serve(listener, app).await.unwrap();
}
