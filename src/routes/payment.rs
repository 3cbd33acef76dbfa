use mongodb::bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::FindOptions;
use rand::distributions::Alphanumeric;
use rand::Rng;
use rocket::futures::TryStreamExt;
use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use crate::db::{is_duplicate_key, DbConn};
use crate::guards::AuthGuard;
use crate::models::{
    Booking, BookingStatus, CreatePaymentDto, Notification, NotificationType, Payment,
    PaymentStatus, Role,
};
use crate::services::fee_split;
use crate::services::lifecycle::{build_notification, NotificationSpec};
use crate::utils::{ApiError, ApiResponse};

fn generate_transaction_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(char::from)
        .collect();
    format!("TXN_{}_{}", chrono::Utc::now().timestamp_millis(), suffix)
}

#[openapi(tag = "Payment")]
#[post("/payments/create", data = "<dto>")]
pub async fn create_payment(
    db: &State<DbConn>,
    auth: AuthGuard,
    dto: Json<CreatePaymentDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let booking_id = ObjectId::parse_str(&dto.booking_id)
        .map_err(|_| ApiError::bad_request("Invalid booking ID"))?;

    if dto.amount <= 0.0 {
        return Err(ApiError::bad_request("Amount must be positive"));
    }

    let booking = db
        .collection::<Booking>("bookings")
        .find_one(doc! { "_id": booking_id, "client_id": auth.user_id }, None)
        .await?
        .ok_or_else(|| ApiError::not_found("Booking not found"))?;

    if booking.status != BookingStatus::Pending {
        return Err(ApiError::bad_request(
            "Payment can only be made for pending bookings",
        ));
    }

    // Same split as booking creation; the two ledgers share one formula
    let split = fee_split(dto.amount);

    let payment = Payment {
        id: None,
        booking_id,
        client_id: auth.user_id,
        freelancer_id: booking.freelancer_id,
        amount: dto.amount,
        platform_fee: split.platform_fee,
        freelancer_amount: split.freelancer_amount,
        payment_method: dto.payment_method,
        status: PaymentStatus::Pending,
        transaction_id: generate_transaction_id(),
        created_at: DateTime::now(),
        updated_at: DateTime::now(),
        released_at: None,
    };

    // The unique index on booking_id is the real existence check; a
    // concurrent double-submit loses here with a 409.
    let result = match db
        .collection::<Payment>("payments")
        .insert_one(&payment, None)
        .await
    {
        Ok(r) => r,
        Err(e) if is_duplicate_key(&e) => {
            return Err(ApiError::conflict(
                "Payment already exists for this booking",
            ));
        }
        Err(e) => return Err(e.into()),
    };

    // Flip the booking to paid, but only if it is still pending
    let updated = db
        .collection::<Booking>("bookings")
        .update_one(
            doc! { "_id": booking_id, "status": BookingStatus::Pending.as_str() },
            doc! { "$set": {
                "status": BookingStatus::Paid.as_str(),
                "updated_at": DateTime::now(),
            }},
            None,
        )
        .await?;

    if updated.matched_count == 0 {
        // The payment record stays on the ledger; nothing is ever deleted
        return Err(ApiError::conflict(
            "Booking was modified concurrently, please retry",
        ));
    }

    let notification = build_notification(
        &NotificationSpec {
            recipient: booking.freelancer_id,
            kind: NotificationType::PaymentReceived,
        },
        &booking,
    );
    if let Err(e) = db
        .collection::<Notification>("notifications")
        .insert_one(&notification, None)
        .await
    {
        warn!("Failed to write notification: {}", e);
    }

    Ok(Json(ApiResponse::success_with_message(
        "Payment created successfully".to_string(),
        serde_json::json!({
            "payment_id": result.inserted_id.as_object_id().map(|id| id.to_hex()),
            "transaction_id": payment.transaction_id,
            "amount": payment.amount,
            "platform_fee": payment.platform_fee,
            "freelancer_amount": payment.freelancer_amount,
        }),
    )))
}

#[openapi(tag = "Payment")]
#[get("/payments/<payment_id>")]
pub async fn get_payment(
    db: &State<DbConn>,
    auth: AuthGuard,
    payment_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let object_id = ObjectId::parse_str(&payment_id)
        .map_err(|_| ApiError::bad_request("Invalid payment ID"))?;

    let payment = db
        .collection::<Payment>("payments")
        .find_one(doc! { "_id": object_id }, None)
        .await?
        .ok_or_else(|| ApiError::not_found("Payment not found"))?;

    if payment.client_id != auth.user_id && payment.freelancer_id != auth.user_id {
        return Err(ApiError::forbidden("Access denied"));
    }

    Ok(Json(ApiResponse::success(serde_json::json!({
        "payment": payment
    }))))
}

#[derive(FromForm, serde::Deserialize, rocket_okapi::okapi::schemars::JsonSchema)]
pub struct PaymentListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<String>,
}

#[openapi(tag = "Payment")]
#[get("/payments?<query..>")]
pub async fn get_payments(
    db: &State<DbConn>,
    auth: AuthGuard,
    query: PaymentListQuery,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(10).clamp(1, 100);
    let skip = (page - 1) * limit;

    let mut filter = doc! {
        "$or": [
            { "client_id": auth.user_id },
            { "freelancer_id": auth.user_id }
        ]
    };
    if let Some(status) = &query.status {
        filter.insert("status", status.as_str());
    }

    let find_options = FindOptions::builder()
        .skip(skip as u64)
        .limit(limit)
        .sort(doc! { "created_at": -1 })
        .build();

    let payments: Vec<Payment> = db
        .collection::<Payment>("payments")
        .find(filter.clone(), find_options)
        .await?
        .try_collect()
        .await?;

    let total = db
        .collection::<Payment>("payments")
        .count_documents(filter, None)
        .await?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "payments": payments,
        "pagination": {
            "page": page,
            "limit": limit,
            "total": total,
            "pages": (total as f64 / limit as f64).ceil() as i64,
        }
    }))))
}

#[openapi(tag = "Payment")]
#[patch("/payments/<payment_id>/release")]
pub async fn release_payment(
    db: &State<DbConn>,
    auth: AuthGuard,
    payment_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let object_id = ObjectId::parse_str(&payment_id)
        .map_err(|_| ApiError::bad_request("Invalid payment ID"))?;

    let payment = db
        .collection::<Payment>("payments")
        .find_one(doc! { "_id": object_id }, None)
        .await?
        .ok_or_else(|| ApiError::not_found("Payment not found"))?;

    if payment.client_id != auth.user_id {
        return Err(ApiError::forbidden("Only the client can release payment"));
    }

    let booking = db
        .collection::<Booking>("bookings")
        .find_one(doc! { "_id": payment.booking_id }, None)
        .await?
        .ok_or_else(|| ApiError::not_found("Booking not found"))?;
    if booking.status != BookingStatus::Completed {
        return Err(ApiError::bad_request(
            "Payment can only be released for completed bookings",
        ));
    }

    if payment.status == PaymentStatus::Released {
        return Err(ApiError::bad_request("Payment has already been released"));
    }

    // Conditional on the payment still being un-released: concurrent
    // double-release loses with a 409
    let result = db
        .collection::<Payment>("payments")
        .update_one(
            doc! {
                "_id": object_id,
                "status": { "$ne": PaymentStatus::Released.as_str() }
            },
            doc! { "$set": {
                "status": PaymentStatus::Released.as_str(),
                "released_at": DateTime::now(),
                "updated_at": DateTime::now(),
            }},
            None,
        )
        .await?;

    if result.matched_count == 0 {
        return Err(ApiError::conflict("Payment has already been released"));
    }

    db.collection::<Booking>("bookings")
        .update_one(
            doc! { "_id": payment.booking_id },
            doc! { "$set": { "payment_status": "released", "updated_at": DateTime::now() } },
            None,
        )
        .await?;

    let notification = build_notification(
        &NotificationSpec {
            recipient: payment.freelancer_id,
            kind: NotificationType::PaymentReleased,
        },
        &booking,
    );
    if let Err(e) = db
        .collection::<Notification>("notifications")
        .insert_one(&notification, None)
        .await
    {
        warn!("Failed to write notification: {}", e);
    }

    Ok(Json(ApiResponse::success_with_message(
        "Payment released successfully".to_string(),
        serde_json::json!({}),
    )))
}

#[openapi(tag = "Payment")]
#[get("/payments/stats/freelancer")]
pub async fn get_freelancer_stats(
    db: &State<DbConn>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    if auth.role != Role::Freelancer {
        return Err(ApiError::forbidden(
            "Only freelancers can access this endpoint",
        ));
    }

    let pipeline = vec![
        doc! { "$match": { "freelancer_id": auth.user_id } },
        doc! { "$group": {
            "_id": "$status",
            "count": { "$sum": 1 },
            "total_amount": { "$sum": "$freelancer_amount" },
        }},
    ];

    let groups: Vec<Document> = db
        .collection::<Payment>("payments")
        .aggregate(pipeline, None)
        .await?
        .try_collect()
        .await?;

    let mut stats = Vec::new();
    let mut total_earnings = 0.0;
    for group in &groups {
        let status = group.get_str("_id").unwrap_or_default().to_string();
        let count = group_count(group);
        let total_amount = group.get_f64("total_amount").unwrap_or(0.0);
        // Earnings count released payments only
        if status == PaymentStatus::Released.as_str() {
            total_earnings = total_amount;
        }
        stats.push(serde_json::json!({
            "status": status,
            "count": count,
            "total_amount": total_amount,
        }));
    }

    Ok(Json(ApiResponse::success(serde_json::json!({
        "stats": stats,
        "total_earnings": total_earnings,
    }))))
}

/// `$sum: 1` comes back as Int32 or Int64 depending on the group size.
fn group_count(group: &Document) -> i64 {
    group
        .get_i64("count")
        .or_else(|_| group.get_i32("count").map(i64::from))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_count_reads_both_integer_widths() {
        assert_eq!(group_count(&doc! { "count": 7_i32 }), 7);
        assert_eq!(group_count(&doc! { "count": 5_000_000_000_i64 }), 5_000_000_000);
        assert_eq!(group_count(&doc! {}), 0);
    }
}
