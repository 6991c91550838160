use axum::{
    debug_handler,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use sqlx::SqlitePool;
use time::{Date, OffsetDateTime};
use tracing::info;

use crate::{
    auth::Identity,
    models::{Booking, BookingStatus},
    policy, AppError, AppResult, AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(get_one).patch(update))
}

pub(crate) fn nights(check_in: Date, check_out: Date) -> i64 {
    (check_out - check_in).whole_days()
}

/// The renter never supplies the total; it is always nights x nightly rate.
pub(crate) fn total_price(check_in: Date, check_out: Date, price_per_night: f64) -> f64 {
    nights(check_in, check_out) as f64 * price_per_night
}

#[debug_handler]
async fn list(
    State(db_pool): State<SqlitePool>,
    ident: Identity,
) -> AppResult<Json<Vec<Booking>>> {
    let bookings: Vec<Booking> = match policy::owner_filter(&ident) {
        Some(user_id) => {
            sqlx::query_as("SELECT * FROM bookings WHERE user_id=? ORDER BY created_at DESC, id DESC")
                .bind(user_id)
                .fetch_all(&db_pool)
                .await?
        }
        None => {
            sqlx::query_as("SELECT * FROM bookings ORDER BY created_at DESC, id DESC")
                .fetch_all(&db_pool)
                .await?
        }
    };
    Ok(Json(bookings))
}

#[debug_handler]
async fn get_one(
    Path(id): Path<i64>,
    State(db_pool): State<SqlitePool>,
    ident: Identity,
) -> AppResult<Json<Booking>> {
    let booking: Booking = sqlx::query_as("SELECT * FROM bookings WHERE id=?")
        .bind(id)
        .fetch_optional(&db_pool)
        .await?
        .ok_or(AppError::NotFound)?;
    let booking = policy::visible_to(&ident, booking.user_id, booking)?;
    Ok(Json(booking))
}

#[derive(Debug, Deserialize)]
struct BookingCreate {
    room_id: i64,
    check_in_date: Date,
    check_out_date: Date,
    #[serde(default)]
    special_requests: String,
}

#[debug_handler]
async fn create(
    State(db_pool): State<SqlitePool>,
    ident: Identity,
    Json(body): Json<BookingCreate>,
) -> AppResult<(StatusCode, Json<Booking>)> {
    if body.check_out_date <= body.check_in_date {
        return Err(AppError::validation(
            "check_out_date",
            "must be after check_in_date",
        ));
    }

    // Availability, overlap check and insert share one transaction so two
    // concurrent requests cannot both pass the overlap check.
    let mut tx = db_pool.begin().await?;

    let room: Option<(f64, bool)> =
        sqlx::query_as("SELECT price_per_night,is_available FROM rooms WHERE id=?")
            .bind(body.room_id)
            .fetch_optional(&mut *tx)
            .await?;
    let (price_per_night, is_available) =
        room.ok_or_else(|| AppError::validation("room_id", "unknown room"))?;
    if !is_available {
        return Err(AppError::validation("room_id", "room is not available"));
    }

    let (overlapping,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM bookings WHERE room_id=? \
         AND status IN ('PENDING','CONFIRMED') \
         AND check_in_date < ? AND check_out_date > ?",
    )
    .bind(body.room_id)
    .bind(body.check_out_date)
    .bind(body.check_in_date)
    .fetch_one(&mut *tx)
    .await?;
    if overlapping > 0 {
        return Err(AppError::validation(
            "room_id",
            "room is already booked for these dates",
        ));
    }

    let total = total_price(body.check_in_date, body.check_out_date, price_per_night);
    let now = OffsetDateTime::now_utc();
    let id = sqlx::query(
        "INSERT INTO bookings \
         (user_id,room_id,check_in_date,check_out_date,status,total_price,special_requests,\
          created_at,updated_at) \
         VALUES (?,?,?,?,?,?,?,?,?)",
    )
    .bind(ident.user_id)
    .bind(body.room_id)
    .bind(body.check_in_date)
    .bind(body.check_out_date)
    .bind(BookingStatus::Pending)
    .bind(total)
    .bind(&body.special_requests)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    tx.commit().await?;
    info!(booking_id = id, user_id = ident.user_id, room_id = body.room_id, total, "booking created");

    let booking: Booking = sqlx::query_as("SELECT * FROM bookings WHERE id=?")
        .bind(id)
        .fetch_one(&db_pool)
        .await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

#[derive(Debug, Deserialize)]
struct BookingUpdate {
    status: BookingStatus,
}

/// Status transitions are explicit: staff may perform any legal one, the
/// renter may only cancel their own booking.
#[debug_handler]
async fn update(
    Path(id): Path<i64>,
    State(db_pool): State<SqlitePool>,
    ident: Identity,
    Json(body): Json<BookingUpdate>,
) -> AppResult<Json<Booking>> {
    let booking: Booking = sqlx::query_as("SELECT * FROM bookings WHERE id=?")
        .bind(id)
        .fetch_optional(&db_pool)
        .await?
        .ok_or(AppError::NotFound)?;
    let booking = policy::visible_to(&ident, booking.user_id, booking)?;

    if !ident.is_staff() && body.status != BookingStatus::Cancelled {
        return Err(AppError::Forbidden);
    }
    if !booking.status.can_become(body.status) {
        return Err(AppError::validation("status", "illegal status transition"));
    }

    sqlx::query("UPDATE bookings SET status=?, updated_at=? WHERE id=?")
        .bind(body.status)
        .bind(OffsetDateTime::now_utc())
        .bind(id)
        .execute(&db_pool)
        .await?;

    let booking: Booking = sqlx::query_as("SELECT * FROM bookings WHERE id=?")
        .bind(id)
        .fetch_one(&db_pool)
        .await?;
    Ok(Json(booking))
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;

    #[test]
    fn price_is_nights_times_rate() {
        let check_in = date!(2025 - 01 - 01);
        let check_out = date!(2025 - 01 - 04);
        assert_eq!(nights(check_in, check_out), 3);
        assert_eq!(total_price(check_in, check_out, 50.0), 150.0);
    }

    #[test]
    fn single_night_stay() {
        let check_in = date!(2025 - 06 - 10);
        let check_out = date!(2025 - 06 - 11);
        assert_eq!(total_price(check_in, check_out, 32.5), 32.5);
    }

    #[test]
    fn month_boundary() {
        let check_in = date!(2025 - 01 - 30);
        let check_out = date!(2025 - 02 - 02);
        assert_eq!(nights(check_in, check_out), 3);
    }
}
