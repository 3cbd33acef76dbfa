use mongodb::bson::{oid::ObjectId, DateTime};
use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    BookingRequest,
    BookingAccepted,
    BookingRejected,
    PaymentReceived,
    PaymentReleased,
    JobStarted,
    JobCompleted,
    ReviewReceived,
}

/// Immutable once written, except for the `is_read` flag.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Notification {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<ObjectId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<i32>,
    pub is_read: bool,
    pub created_at: DateTime,
}

impl Notification {
    pub fn new(user_id: ObjectId, kind: NotificationType, title: &str, message: String) -> Self {
        Notification {
            id: None,
            user_id,
            kind,
            title: title.to_string(),
            message,
            booking_id: None,
            rating: None,
            is_read: false,
            created_at: DateTime::now(),
        }
    }

    pub fn about_booking(mut self, booking_id: ObjectId) -> Self {
        self.booking_id = Some(booking_id);
        self
    }

    pub fn with_rating(mut self, rating: i32) -> Self {
        self.rating = Some(rating);
        self
    }
}

#[derive(Debug, FromForm, Deserialize, JsonSchema)]
pub struct NotificationListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub unread_only: Option<bool>,
}
