use mongodb::bson::{oid::ObjectId, DateTime};
use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema)]
pub struct ServicePackage {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    #[schemars(skip)]
    pub id: Option<ObjectId>,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub duration: String, // e.g. "2 hours", "1 day"
    pub features: Vec<String>,
    pub is_active: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServiceListing {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub freelancer_id: ObjectId,
    pub service_category: String,
    pub service_name: String,
    pub description: String,
    pub packages: Vec<ServicePackage>,
    pub images: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PackageDto {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub duration: String,
    pub features: Vec<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateServiceDto {
    pub service_category: String,
    pub service_name: String,
    pub description: String,
    pub packages: Vec<PackageDto>,
    pub images: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateServiceDto {
    pub service_category: Option<String>,
    pub service_name: Option<String>,
    pub description: Option<String>,
    /// Replaces the whole package list; ids are regenerated.
    pub packages: Option<Vec<PackageDto>>,
    pub images: Option<Vec<String>>,
    pub is_active: Option<bool>,
}
