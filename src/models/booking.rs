use mongodb::bson::{oid::ObjectId, DateTime};
use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Accepted,
    Rejected,
    InProgress,
    Completed,
    Cancelled,
    Paid,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Accepted => "accepted",
            BookingStatus::Rejected => "rejected",
            BookingStatus::InProgress => "in_progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Paid => "paid",
        }
    }
}

/// Payment state tracked on the booking itself, independent of work state:
/// a booking can be `completed` while release is still a pending client
/// confirmation.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BookingPaymentStatus {
    Pending,
    Paid,
    Released,
    Refunded,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    ClientLocation,
    FreelancerLocation,
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema)]
pub struct ServiceLocation {
    #[serde(rename = "type")]
    pub kind: LocationKind,
    pub address: String,
    pub coordinates: Option<super::Coordinates>,
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema)]
pub struct ReviewEntry {
    pub rating: i32, // 1-5
    pub comment: Option<String>,
    #[schemars(skip)]
    pub created_at: DateTime,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Booking {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub client_id: ObjectId,
    pub freelancer_id: ObjectId,
    pub service_id: ObjectId,
    pub package_id: ObjectId,

    // Snapshot of what was booked, immune to later catalog edits
    pub service_category: String,
    pub service_name: String,
    pub package_name: String,

    pub scheduled_date: DateTime,
    pub estimated_hours: f64,
    pub total_amount: f64,
    pub platform_fee: f64,
    pub freelancer_amount: f64,

    pub service_location: ServiceLocation,
    pub before_photos: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after_photos: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_instructions: Option<String>,

    pub status: BookingStatus,
    pub payment_status: BookingPaymentStatus,

    pub created_at: DateTime,
    pub updated_at: DateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted_at: Option<DateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_review: Option<ReviewEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freelancer_review: Option<ReviewEntry>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateBookingDto {
    pub freelancer_id: String,
    pub service_id: String,
    pub package_id: String,
    pub service_category: String,
    pub service_name: String,
    pub package_name: String,
    /// RFC 3339 timestamp
    pub scheduled_date: String,
    pub estimated_hours: f64,
    pub total_amount: f64,
    pub service_location: ServiceLocation,
    pub before_photos: Option<Vec<String>>,
    pub special_instructions: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateBookingStatusDto {
    pub status: BookingStatus,
    pub before_photos: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AddReviewDto {
    pub rating: i32,
    pub comment: Option<String>,
}

#[derive(Debug, FromForm, Deserialize, JsonSchema)]
pub struct BookingListQuery {
    pub status: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}
