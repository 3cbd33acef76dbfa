use mongodb::bson::{doc, oid::ObjectId, to_bson, DateTime, Document};
use mongodb::options::FindOptions;
use rocket::futures::TryStreamExt;
use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use crate::db::DbConn;
use crate::guards::AuthGuard;
use crate::models::{
    AddReviewDto, Booking, BookingListQuery, BookingPaymentStatus, BookingStatus,
    CreateBookingDto, Notification, NotificationType, Payment, PaymentStatus, ReviewEntry, Role,
    UpdateBookingStatusDto, User, UserSummary,
};
use crate::services::fee_split;
use crate::services::lifecycle::{
    build_notification, ensure_releasable, plan_transition, recompute_rating, review_side,
    side_of, validate_rating, LifecycleError, NotificationSpec, Side,
};
use crate::utils::{ApiError, ApiResponse};

fn lifecycle_err(e: LifecycleError) -> ApiError {
    match e {
        LifecycleError::Validation(msg) => ApiError::bad_request(msg),
        LifecycleError::Authorization(msg) => ApiError::forbidden(msg),
        LifecycleError::InvalidTransition { .. } => ApiError::bad_request(e.to_string()),
    }
}

/// Notification writes are best-effort: losing one never rolls back the
/// state change it announces.
async fn emit(db: &DbConn, notification: Notification) {
    if let Err(e) = db
        .collection::<Notification>("notifications")
        .insert_one(&notification, None)
        .await
    {
        warn!("Failed to write notification: {}", e);
    }
}

#[openapi(tag = "Booking")]
#[post("/bookings", data = "<dto>")]
pub async fn create_booking(
    db: &State<DbConn>,
    auth: AuthGuard,
    dto: Json<CreateBookingDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    if auth.role != Role::Client {
        return Err(ApiError::forbidden("Only clients can create bookings"));
    }

    let dto = dto.into_inner();

    let freelancer_id = ObjectId::parse_str(&dto.freelancer_id)
        .map_err(|_| ApiError::bad_request("Invalid freelancer ID"))?;
    let service_id = ObjectId::parse_str(&dto.service_id)
        .map_err(|_| ApiError::bad_request("Invalid service ID"))?;
    let package_id = ObjectId::parse_str(&dto.package_id)
        .map_err(|_| ApiError::bad_request("Invalid package ID"))?;

    if dto.total_amount <= 0.0 {
        return Err(ApiError::bad_request("Total amount must be positive"));
    }
    if dto.service_location.address.trim().is_empty() {
        return Err(ApiError::bad_request("All required fields must be provided"));
    }

    let scheduled_date = chrono::DateTime::parse_from_rfc3339(&dto.scheduled_date)
        .map_err(|_| ApiError::bad_request("Invalid scheduled date"))?;
    let scheduled_date = DateTime::from_millis(scheduled_date.timestamp_millis());

    let split = fee_split(dto.total_amount);

    let booking = Booking {
        id: None,
        client_id: auth.user_id,
        freelancer_id,
        service_id,
        package_id,
        service_category: dto.service_category,
        service_name: dto.service_name,
        package_name: dto.package_name,
        scheduled_date,
        estimated_hours: dto.estimated_hours,
        total_amount: dto.total_amount,
        platform_fee: split.platform_fee,
        freelancer_amount: split.freelancer_amount,
        service_location: dto.service_location,
        before_photos: dto.before_photos.unwrap_or_default(),
        after_photos: None,
        special_instructions: dto.special_instructions,
        status: BookingStatus::Pending,
        payment_status: BookingPaymentStatus::Pending,
        created_at: DateTime::now(),
        updated_at: DateTime::now(),
        accepted_at: None,
        started_at: None,
        completed_at: None,
        client_review: None,
        freelancer_review: None,
    };

    let result = db
        .collection::<Booking>("bookings")
        .insert_one(&booking, None)
        .await?;

    let mut booking = booking;
    booking.id = result.inserted_id.as_object_id();

    emit(
        db,
        build_notification(
            &NotificationSpec {
                recipient: freelancer_id,
                kind: NotificationType::BookingRequest,
            },
            &booking,
        ),
    )
    .await;

    Ok(Json(ApiResponse::success_with_message(
        "Booking created successfully".to_string(),
        serde_json::json!({ "booking": booking }),
    )))
}

#[openapi(tag = "Booking")]
#[get("/bookings/my-bookings?<query..>")]
pub async fn get_my_bookings(
    db: &State<DbConn>,
    auth: AuthGuard,
    query: BookingListQuery,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(10).clamp(1, 100);
    let skip = (page - 1) * limit;

    let mut filter = match auth.role {
        Role::Client => doc! { "client_id": auth.user_id },
        Role::Freelancer => doc! { "freelancer_id": auth.user_id },
    };
    if let Some(status) = &query.status {
        filter.insert("status", status.as_str());
    }

    let find_options = FindOptions::builder()
        .skip(skip as u64)
        .limit(limit)
        .sort(doc! { "created_at": -1 })
        .build();

    let bookings: Vec<Booking> = db
        .collection::<Booking>("bookings")
        .find(filter.clone(), find_options)
        .await?
        .try_collect()
        .await?;

    // Attach the other party's public profile to each booking
    let other_ids: Vec<ObjectId> = bookings
        .iter()
        .map(|b| match auth.role {
            Role::Client => b.freelancer_id,
            Role::Freelancer => b.client_id,
        })
        .collect();

    let others: Vec<User> = if other_ids.is_empty() {
        Vec::new()
    } else {
        db.collection::<User>("users")
            .find(doc! { "_id": { "$in": other_ids } }, None)
            .await?
            .try_collect()
            .await?
    };

    let items: Vec<serde_json::Value> = bookings
        .iter()
        .map(|b| {
            let other_id = match auth.role {
                Role::Client => b.freelancer_id,
                Role::Freelancer => b.client_id,
            };
            let other = others.iter().find(|u| u.id == Some(other_id));
            booking_json(b, &[("other_user", other)])
        })
        .collect();

    let total = db
        .collection::<Booking>("bookings")
        .count_documents(filter, None)
        .await?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "bookings": items,
        "pagination": {
            "page": page,
            "limit": limit,
            "total": total,
            "pages": (total as f64 / limit as f64).ceil() as i64,
        }
    }))))
}

#[openapi(tag = "Booking")]
#[patch("/bookings/<booking_id>/status", data = "<dto>")]
pub async fn update_booking_status(
    db: &State<DbConn>,
    auth: AuthGuard,
    booking_id: String,
    dto: Json<UpdateBookingStatusDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let object_id = ObjectId::parse_str(&booking_id)
        .map_err(|_| ApiError::bad_request("Invalid booking ID"))?;

    let booking = db
        .collection::<Booking>("bookings")
        .find_one(doc! { "_id": object_id }, None)
        .await?
        .ok_or_else(|| ApiError::not_found("Booking not found"))?;

    let photos = dto.before_photos.clone().unwrap_or_default();
    let plan = plan_transition(&booking, &auth.actor(), dto.status, &photos)
        .map_err(lifecycle_err)?;

    // Confirm-completion is gated on the booking actually having been paid
    let payment = if plan.release_payment {
        let payment = db
            .collection::<Payment>("payments")
            .find_one(doc! { "booking_id": object_id }, None)
            .await?;
        ensure_releasable(payment.as_ref()).map_err(lifecycle_err)?;
        payment
    } else {
        None
    };

    let mut set = Document::new();
    set.insert("status", plan.next_status.as_str());
    set.insert("updated_at", DateTime::now());
    if let Some(stamp) = plan.stamp {
        set.insert(stamp.field(), DateTime::now());
    }
    if !plan.append_before_photos.is_empty() {
        let mut all = booking.before_photos.clone();
        all.extend(plan.append_before_photos.iter().cloned());
        set.insert("before_photos", all);
    }
    if plan.release_payment {
        set.insert(
            "payment_status",
            to_bson(&BookingPaymentStatus::Released).map_err(|e| {
                error!("BSON serialization error: {}", e);
                ApiError::internal_error("Internal server error")
            })?,
        );
    }

    // Conditional update on the status we planned against: a concurrent
    // transition makes this match nothing, and the caller gets a 409
    // instead of silently re-applying.
    let result = db
        .collection::<Booking>("bookings")
        .update_one(
            doc! { "_id": object_id, "status": plan.expected_status.as_str() },
            doc! { "$set": set },
            None,
        )
        .await?;

    if result.matched_count == 0 {
        return Err(ApiError::conflict(
            "Booking was modified concurrently, please retry",
        ));
    }

    if let Some(payment) = payment {
        release_payment_record(db, &payment).await?;
    }

    if let Some(spec) = &plan.notify {
        emit(db, build_notification(spec, &booking)).await;
    }

    Ok(Json(ApiResponse::success_with_message(
        "Booking status updated successfully".to_string(),
        serde_json::json!({ "status": plan.next_status }),
    )))
}

/// Flip the linked payment to released, guarded against double release.
async fn release_payment_record(db: &DbConn, payment: &Payment) -> Result<(), ApiError> {
    let result = db
        .collection::<Payment>("payments")
        .update_one(
            doc! {
                "_id": payment.id,
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

    Ok(())
}

#[openapi(tag = "Booking")]
#[post("/bookings/<booking_id>/review", data = "<dto>")]
pub async fn add_review(
    db: &State<DbConn>,
    auth: AuthGuard,
    booking_id: String,
    dto: Json<AddReviewDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    validate_rating(dto.rating).map_err(lifecycle_err)?;

    let object_id = ObjectId::parse_str(&booking_id)
        .map_err(|_| ApiError::bad_request("Invalid booking ID"))?;

    let booking = db
        .collection::<Booking>("bookings")
        .find_one(doc! { "_id": object_id }, None)
        .await?
        .ok_or_else(|| ApiError::not_found("Booking not found"))?;

    let side = review_side(&booking, &auth.actor()).map_err(lifecycle_err)?;

    let review = ReviewEntry {
        rating: dto.rating,
        comment: dto.comment.clone(),
        created_at: DateTime::now(),
    };
    let review_bson = to_bson(&review).map_err(|e| {
        error!("BSON serialization error: {}", e);
        ApiError::internal_error("Internal server error")
    })?;

    // Overwrite semantics: re-reviewing replaces the slot, and the
    // aggregate below is recomputed from scratch either way.
    let (slot, reviewee_id) = match side {
        Side::Client => ("client_review", booking.freelancer_id),
        Side::Freelancer => ("freelancer_review", booking.client_id),
    };

    db.collection::<Booking>("bookings")
        .update_one(
            doc! { "_id": object_id },
            doc! { "$set": { slot: review_bson, "updated_at": DateTime::now() } },
            None,
        )
        .await?;

    if side == Side::Client {
        update_freelancer_rating(db, booking.freelancer_id).await?;
    }

    emit(
        db,
        build_notification(
            &NotificationSpec {
                recipient: reviewee_id,
                kind: NotificationType::ReviewReceived,
            },
            &booking,
        )
        .with_rating(dto.rating),
    )
    .await;

    Ok(Json(ApiResponse::success_with_message(
        "Review added successfully".to_string(),
        serde_json::json!({}),
    )))
}

/// Recompute the freelancer's aggregate from every client-reviewed booking
/// so the stored `{average, count}` can never drift from the reviews.
async fn update_freelancer_rating(db: &DbConn, freelancer_id: ObjectId) -> Result<(), ApiError> {
    let reviewed: Vec<Booking> = db
        .collection::<Booking>("bookings")
        .find(
            doc! {
                "freelancer_id": freelancer_id,
                "client_review": { "$exists": true }
            },
            None,
        )
        .await?
        .try_collect()
        .await?;

    let ratings: Vec<i32> = reviewed
        .iter()
        .filter_map(|b| b.client_review.as_ref().map(|r| r.rating))
        .collect();

    let rating = recompute_rating(&ratings);

    db.collection::<User>("users")
        .update_one(
            doc! { "_id": freelancer_id },
            doc! { "$set": {
                "rating.average": rating.average,
                "rating.count": rating.count,
            }},
            None,
        )
        .await?;

    Ok(())
}

#[openapi(tag = "Booking")]
#[get("/bookings/<booking_id>")]
pub async fn get_booking(
    db: &State<DbConn>,
    auth: AuthGuard,
    booking_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let object_id = ObjectId::parse_str(&booking_id)
        .map_err(|_| ApiError::bad_request("Invalid booking ID"))?;

    let booking = db
        .collection::<Booking>("bookings")
        .find_one(doc! { "_id": object_id }, None)
        .await?
        .ok_or_else(|| ApiError::not_found("Booking not found"))?;

    if side_of(&booking, &auth.actor()).is_none() {
        return Err(ApiError::forbidden("Unauthorized"));
    }

    let client = db
        .collection::<User>("users")
        .find_one(doc! { "_id": booking.client_id }, None)
        .await?;
    let freelancer = db
        .collection::<User>("users")
        .find_one(doc! { "_id": booking.freelancer_id }, None)
        .await?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "booking": booking_json(
            &booking,
            &[("client", client.as_ref()), ("freelancer", freelancer.as_ref())],
        )
    }))))
}

fn booking_json(booking: &Booking, parties: &[(&str, Option<&User>)]) -> serde_json::Value {
    let mut value = serde_json::json!({
        "id": booking.id.map(|id| id.to_hex()),
        "service_category": &booking.service_category,
        "service_name": &booking.service_name,
        "package_name": &booking.package_name,
        "scheduled_date": booking.scheduled_date.try_to_rfc3339_string().unwrap_or_default(),
        "estimated_hours": booking.estimated_hours,
        "total_amount": booking.total_amount,
        "platform_fee": booking.platform_fee,
        "freelancer_amount": booking.freelancer_amount,
        "service_location": &booking.service_location,
        "before_photos": &booking.before_photos,
        "after_photos": &booking.after_photos,
        "special_instructions": &booking.special_instructions,
        "status": booking.status,
        "payment_status": booking.payment_status,
        "created_at": booking.created_at.try_to_rfc3339_string().unwrap_or_default(),
        "accepted_at": booking.accepted_at.and_then(|d| d.try_to_rfc3339_string().ok()),
        "started_at": booking.started_at.and_then(|d| d.try_to_rfc3339_string().ok()),
        "completed_at": booking.completed_at.and_then(|d| d.try_to_rfc3339_string().ok()),
        "client_review": &booking.client_review,
        "freelancer_review": &booking.freelancer_review,
    });

    if let Some(map) = value.as_object_mut() {
        for (key, user) in parties {
            if let Some(user) = user {
                map.insert(
                    key.to_string(),
                    serde_json::to_value(UserSummary::from(*user)).unwrap_or_default(),
                );
            }
        }
    }

    value
}
