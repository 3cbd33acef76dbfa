use mongodb::bson::{doc, oid::ObjectId};
use mongodb::options::FindOptions;
use rocket::futures::TryStreamExt;
use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use crate::db::DbConn;
use crate::guards::AuthGuard;
use crate::models::{Notification, NotificationListQuery};
use crate::utils::{ApiError, ApiResponse};

#[openapi(tag = "Notification")]
#[get("/notifications?<query..>")]
pub async fn get_notifications(
    db: &State<DbConn>,
    auth: AuthGuard,
    query: NotificationListQuery,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let skip = (page - 1) * limit;

    let mut filter = doc! { "user_id": auth.user_id };
    if query.unread_only == Some(true) {
        filter.insert("is_read", false);
    }

    let find_options = FindOptions::builder()
        .skip(skip as u64)
        .limit(limit)
        .sort(doc! { "created_at": -1 })
        .build();

    let notifications: Vec<Notification> = db
        .collection::<Notification>("notifications")
        .find(filter.clone(), find_options)
        .await?
        .try_collect()
        .await?;

    let total = db
        .collection::<Notification>("notifications")
        .count_documents(filter, None)
        .await?;

    let unread_count = db
        .collection::<Notification>("notifications")
        .count_documents(doc! { "user_id": auth.user_id, "is_read": false }, None)
        .await?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "notifications": notifications,
        "unread_count": unread_count,
        "pagination": {
            "page": page,
            "limit": limit,
            "total": total,
            "pages": (total as f64 / limit as f64).ceil() as i64,
        }
    }))))
}

#[openapi(tag = "Notification")]
#[get("/notifications/unread-count")]
pub async fn get_unread_count(
    db: &State<DbConn>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let unread_count = db
        .collection::<Notification>("notifications")
        .count_documents(doc! { "user_id": auth.user_id, "is_read": false }, None)
        .await?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "unread_count": unread_count
    }))))
}

#[openapi(tag = "Notification")]
#[patch("/notifications/<notification_id>/read")]
pub async fn mark_as_read(
    db: &State<DbConn>,
    auth: AuthGuard,
    notification_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let object_id = ObjectId::parse_str(&notification_id)
        .map_err(|_| ApiError::bad_request("Invalid notification ID"))?;

    let result = db
        .collection::<Notification>("notifications")
        .update_one(
            doc! { "_id": object_id, "user_id": auth.user_id },
            doc! { "$set": { "is_read": true } },
            None,
        )
        .await?;

    if result.matched_count == 0 {
        return Err(ApiError::not_found("Notification not found"));
    }

    Ok(Json(ApiResponse::success_with_message(
        "Notification marked as read".to_string(),
        serde_json::json!({}),
    )))
}

#[openapi(tag = "Notification")]
#[patch("/notifications/mark-all-read")]
pub async fn mark_all_as_read(
    db: &State<DbConn>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    db.collection::<Notification>("notifications")
        .update_many(
            doc! { "user_id": auth.user_id, "is_read": false },
            doc! { "$set": { "is_read": true } },
            None,
        )
        .await?;

    Ok(Json(ApiResponse::success_with_message(
        "All notifications marked as read".to_string(),
        serde_json::json!({}),
    )))
}

#[openapi(tag = "Notification")]
#[delete("/notifications/<notification_id>")]
pub async fn delete_notification(
    db: &State<DbConn>,
    auth: AuthGuard,
    notification_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let object_id = ObjectId::parse_str(&notification_id)
        .map_err(|_| ApiError::bad_request("Invalid notification ID"))?;

    let result = db
        .collection::<Notification>("notifications")
        .delete_one(doc! { "_id": object_id, "user_id": auth.user_id }, None)
        .await?;

    if result.deleted_count == 0 {
        return Err(ApiError::not_found("Notification not found"));
    }

    Ok(Json(ApiResponse::success_with_message(
        "Notification deleted successfully".to_string(),
        serde_json::json!({}),
    )))
}
