use mongodb::bson::{doc, oid::ObjectId, to_bson, DateTime, Document};
use mongodb::options::FindOptions;
use rocket::futures::TryStreamExt;
use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use crate::db::DbConn;
use crate::guards::AuthGuard;
use crate::models::{
    CreateServiceDto, PackageDto, Role, ServiceListing, ServicePackage, UpdateServiceDto, User,
    UserSummary,
};
use crate::utils::{ApiError, ApiResponse};

pub const SERVICE_CATEGORIES: [&str; 15] = [
    "House Cleaning",
    "Plumbing",
    "Electrical Work",
    "Gardening",
    "Handyman Services",
    "Moving Help",
    "Painting",
    "Carpentry",
    "Appliance Repair",
    "Pest Control",
    "Laundry Services",
    "Car Wash",
    "Beauty Services",
    "Tutoring",
    "Pet Care",
];

#[openapi(tag = "Service")]
#[get("/services/categories")]
pub async fn get_categories() -> Json<ApiResponse<serde_json::Value>> {
    Json(ApiResponse::success(serde_json::json!({
        "categories": SERVICE_CATEGORIES
    })))
}

#[openapi(tag = "Service")]
#[post("/services", data = "<dto>")]
pub async fn create_service(
    db: &State<DbConn>,
    auth: AuthGuard,
    dto: Json<CreateServiceDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    if auth.role != Role::Freelancer {
        return Err(ApiError::forbidden("Only freelancers can create services"));
    }

    let dto = dto.into_inner();
    if dto.service_category.trim().is_empty()
        || dto.service_name.trim().is_empty()
        || dto.description.trim().is_empty()
        || dto.packages.is_empty()
    {
        return Err(ApiError::bad_request("All required fields must be provided"));
    }

    let service = ServiceListing {
        id: None,
        freelancer_id: auth.user_id,
        service_category: dto.service_category,
        service_name: dto.service_name,
        description: dto.description,
        packages: build_packages(dto.packages),
        images: dto.images.unwrap_or_default(),
        is_active: true,
        created_at: DateTime::now(),
        updated_at: DateTime::now(),
    };

    let result = db
        .collection::<ServiceListing>("services")
        .insert_one(&service, None)
        .await?;

    let mut service = service;
    service.id = result.inserted_id.as_object_id();

    Ok(Json(ApiResponse::success_with_message(
        "Service created successfully".to_string(),
        serde_json::json!({ "service": service }),
    )))
}

#[derive(FromForm, serde::Deserialize, rocket_okapi::okapi::schemars::JsonSchema)]
pub struct CategoryQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[openapi(tag = "Service")]
#[get("/services/category/<category>?<query..>")]
pub async fn get_services_by_category(
    db: &State<DbConn>,
    category: String,
    query: CategoryQuery,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(10).clamp(1, 100);
    let skip = (page - 1) * limit;

    let filter = doc! { "service_category": &category, "is_active": true };

    let find_options = FindOptions::builder()
        .skip(skip as u64)
        .limit(limit)
        .sort(doc! { "created_at": -1 })
        .build();

    let services: Vec<ServiceListing> = db
        .collection::<ServiceListing>("services")
        .find(filter.clone(), find_options)
        .await?
        .try_collect()
        .await?;

    let freelancers = load_freelancers(db, &services).await?;

    let listings: Vec<serde_json::Value> = services
        .iter()
        .filter_map(|s| {
            // Listings of deactivated freelancers are hidden, not deleted
            let freelancer = freelancers
                .iter()
                .find(|u| u.id == Some(s.freelancer_id))
                .filter(|u| u.is_active.unwrap_or(true))?;
            Some(listing_json(s, freelancer))
        })
        .collect();

    let total = db
        .collection::<ServiceListing>("services")
        .count_documents(filter, None)
        .await?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "services": listings,
        "pagination": {
            "page": page,
            "limit": limit,
            "total": total,
            "pages": (total as f64 / limit as f64).ceil() as i64,
        }
    }))))
}

#[openapi(tag = "Service")]
#[get("/services/my-services")]
pub async fn get_my_services(
    db: &State<DbConn>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    if auth.role != Role::Freelancer {
        return Err(ApiError::forbidden(
            "Only freelancers can access this endpoint",
        ));
    }

    let services: Vec<ServiceListing> = db
        .collection::<ServiceListing>("services")
        .find(doc! { "freelancer_id": auth.user_id }, None)
        .await?
        .try_collect()
        .await?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "services": services
    }))))
}

#[openapi(tag = "Service")]
#[put("/services/<service_id>", data = "<dto>")]
pub async fn update_service(
    db: &State<DbConn>,
    auth: AuthGuard,
    service_id: String,
    dto: Json<UpdateServiceDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    if auth.role != Role::Freelancer {
        return Err(ApiError::forbidden("Only freelancers can update services"));
    }

    let object_id = ObjectId::parse_str(&service_id)
        .map_err(|_| ApiError::bad_request("Invalid service ID"))?;

    let dto = dto.into_inner();

    let mut set = Document::new();
    if let Some(category) = &dto.service_category {
        set.insert("service_category", category.as_str());
    }
    if let Some(name) = &dto.service_name {
        set.insert("service_name", name.as_str());
    }
    if let Some(description) = &dto.description {
        set.insert("description", description.as_str());
    }
    if let Some(packages) = dto.packages {
        if packages.is_empty() {
            return Err(ApiError::bad_request(
                "Service must have at least one package",
            ));
        }
        // Replacement list; package ids are regenerated like on creation
        let packages = build_packages(packages);
        set.insert(
            "packages",
            to_bson(&packages).map_err(|e| {
                error!("BSON serialization error: {}", e);
                ApiError::internal_error("Internal server error")
            })?,
        );
    }
    if let Some(images) = &dto.images {
        set.insert("images", images.clone());
    }
    if let Some(is_active) = dto.is_active {
        set.insert("is_active", is_active);
    }
    if set.is_empty() {
        return Err(ApiError::bad_request("Nothing to update"));
    }
    set.insert("updated_at", DateTime::now());

    let result = db
        .collection::<ServiceListing>("services")
        .update_one(
            doc! { "_id": object_id, "freelancer_id": auth.user_id },
            doc! { "$set": set },
            None,
        )
        .await?;

    if result.matched_count == 0 {
        return Err(ApiError::not_found("Service not found or unauthorized"));
    }

    Ok(Json(ApiResponse::success_with_message(
        "Service updated successfully".to_string(),
        serde_json::json!({}),
    )))
}

#[openapi(tag = "Service")]
#[get("/services/<service_id>")]
pub async fn get_service(
    db: &State<DbConn>,
    service_id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let object_id = ObjectId::parse_str(&service_id)
        .map_err(|_| ApiError::bad_request("Invalid service ID"))?;

    let service = db
        .collection::<ServiceListing>("services")
        .find_one(doc! { "_id": object_id, "is_active": true }, None)
        .await?
        .ok_or_else(|| ApiError::not_found("Service not found"))?;

    let freelancer = db
        .collection::<User>("users")
        .find_one(doc! { "_id": service.freelancer_id }, None)
        .await?
        .ok_or_else(|| ApiError::not_found("Service not found"))?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "service": listing_json(&service, &freelancer)
    }))))
}

async fn load_freelancers(
    db: &DbConn,
    services: &[ServiceListing],
) -> Result<Vec<User>, ApiError> {
    let ids: Vec<ObjectId> = services.iter().map(|s| s.freelancer_id).collect();
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let users = db
        .collection::<User>("users")
        .find(doc! { "_id": { "$in": ids } }, None)
        .await?
        .try_collect()
        .await?;

    Ok(users)
}

/// Packages are stored wholesale from the request body; every write gets
/// fresh ids so stale package references cannot resolve to edited prices.
fn build_packages(dtos: Vec<PackageDto>) -> Vec<ServicePackage> {
    dtos.into_iter()
        .map(|pkg| ServicePackage {
            id: Some(ObjectId::new()),
            name: pkg.name,
            description: pkg.description,
            price: pkg.price,
            duration: pkg.duration,
            features: pkg.features,
            is_active: true,
        })
        .collect()
}

fn listing_json(service: &ServiceListing, freelancer: &User) -> serde_json::Value {
    serde_json::json!({
        "id": service.id.map(|id| id.to_hex()),
        "service_category": &service.service_category,
        "service_name": &service.service_name,
        "description": &service.description,
        "packages": &service.packages,
        "images": &service.images,
        "created_at": service.created_at.try_to_rfc3339_string().unwrap_or_default(),
        "freelancer": UserSummary::from(freelancer),
        "freelancer_bio": &freelancer.bio,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package_dto(name: &str, price: f64) -> PackageDto {
        PackageDto {
            name: name.to_string(),
            description: "Two bedrooms and a kitchen".to_string(),
            price,
            duration: "2 hours".to_string(),
            features: vec!["Supplies included".to_string()],
        }
    }

    #[test]
    fn replacement_packages_get_fresh_ids_and_start_active() {
        let built = build_packages(vec![package_dto("Standard", 45.0), package_dto("Deep", 80.0)]);

        assert_eq!(built.len(), 2);
        for pkg in &built {
            assert!(pkg.id.is_some());
            assert!(pkg.is_active);
        }
        assert_ne!(built[0].id, built[1].id);
        assert_eq!(built[0].name, "Standard");
        assert_eq!(built[1].price, 80.0);
    }
}
