use mongodb::bson::{oid::ObjectId, DateTime};
use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Client,
    Freelancer,
}

/// Aggregate of all client reviews across a freelancer's bookings.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema)]
pub struct Rating {
    pub average: f64,
    pub count: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema)]
pub struct UserLocation {
    pub address: String,
    pub coordinates: Option<Coordinates>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub password: String,
    pub role: Role,
    pub is_verified: bool,

    // Freelancer specific fields
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mpesa_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_categories: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kyc_verified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terms_accepted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<UserLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<Rating>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,

    // Client specific fields
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_payment_method: Option<String>,

    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SignupDto {
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub password: String,
    pub role: Role,
    pub mpesa_number: Option<String>,
    pub service_categories: Option<Vec<String>>,
    pub terms_accepted: Option<bool>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct LoginDto {
    pub email_or_phone: String,
    pub password: String,
}

/// User as returned by the API: everything but the password hash.
#[derive(Debug, Serialize, JsonSchema)]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone_number: String,
    pub role: Role,
    pub is_verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_categories: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<UserLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<Rating>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse {
            id: user.id.map(|id| id.to_hex()).unwrap_or_default(),
            name: user.name,
            email: user.email,
            phone_number: user.phone_number,
            role: user.role,
            is_verified: user.is_verified,
            service_categories: user.service_categories,
            profile_image: user.profile_image,
            bio: user.bio,
            location: user.location,
            rating: user.rating,
        }
    }
}

/// Counterparty summary embedded in booking and service listings.
#[derive(Debug, Serialize, JsonSchema)]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<Rating>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<UserLocation>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        UserSummary {
            id: user.id.map(|id| id.to_hex()).unwrap_or_default(),
            name: user.name.clone(),
            profile_image: user.profile_image.clone(),
            rating: user.rating.clone(),
            location: user.location.clone(),
        }
    }
}
