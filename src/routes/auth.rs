use mongodb::bson::{doc, DateTime};
use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;

use crate::db::{is_duplicate_key, DbConn};
use crate::guards::AuthGuard;
use crate::models::{LoginDto, Rating, Role, SignupDto, User, UserResponse};
use crate::services::JwtService;
use crate::utils::{validate_email, validate_phone, ApiError, ApiResponse};

#[openapi(tag = "Auth")]
#[post("/auth/signup", data = "<dto>")]
pub async fn signup(
    db: &State<DbConn>,
    dto: Json<SignupDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let dto = dto.into_inner();

    if dto.name.trim().is_empty() || dto.password.is_empty() {
        return Err(ApiError::bad_request("All required fields must be provided"));
    }
    if !validate_email(&dto.email) {
        return Err(ApiError::bad_request("Invalid email"));
    }
    if !validate_phone(&dto.phone_number) {
        return Err(ApiError::bad_request("Invalid phone number"));
    }

    if dto.role == Role::Freelancer {
        let has_categories = dto
            .service_categories
            .as_ref()
            .map(|c| !c.is_empty())
            .unwrap_or(false);
        if dto.mpesa_number.is_none() || !has_categories || dto.terms_accepted != Some(true) {
            return Err(ApiError::bad_request(
                "Freelancers must provide M-Pesa number, service categories, and accept terms",
            ));
        }
    }

    let users = db.collection::<User>("users");

    let existing = users
        .find_one(
            doc! { "$or": [ { "email": &dto.email }, { "phone_number": &dto.phone_number } ] },
            None,
        )
        .await?;
    if existing.is_some() {
        return Err(ApiError::conflict(
            "User with this email or phone number already exists",
        ));
    }

    let hashed = bcrypt::hash(&dto.password, bcrypt::DEFAULT_COST)
        .map_err(|e| {
            error!("Password hashing failed: {}", e);
            ApiError::internal_error("Internal server error")
        })?;

    let is_freelancer = dto.role == Role::Freelancer;
    let user = User {
        id: None,
        name: dto.name,
        email: dto.email.clone(),
        phone_number: dto.phone_number,
        password: hashed,
        role: dto.role,
        is_verified: false,
        mpesa_number: dto.mpesa_number,
        service_categories: dto.service_categories,
        kyc_verified: is_freelancer.then_some(false),
        terms_accepted: dto.terms_accepted,
        profile_image: None,
        bio: None,
        location: None,
        rating: is_freelancer.then(|| Rating {
            average: 0.0,
            count: 0,
        }),
        is_active: is_freelancer.then_some(true),
        preferred_payment_method: None,
        created_at: DateTime::now(),
        updated_at: DateTime::now(),
    };

    // Unique index on email/phone backstops the pre-check under races
    let result = match users.insert_one(&user, None).await {
        Ok(r) => r,
        Err(e) if is_duplicate_key(&e) => {
            return Err(ApiError::conflict(
                "User with this email or phone number already exists",
            ));
        }
        Err(e) => return Err(e.into()),
    };

    let user_id = result
        .inserted_id
        .as_object_id()
        .ok_or_else(|| ApiError::internal_error("Internal server error"))?;

    let token = JwtService::generate_token(&user_id, &dto.email, dto.role)
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    let mut user = user;
    user.id = Some(user_id);

    Ok(Json(ApiResponse::success_with_message(
        "User created successfully".to_string(),
        serde_json::json!({
            "user": UserResponse::from(user),
            "token": token
        }),
    )))
}

#[openapi(tag = "Auth")]
#[post("/auth/login", data = "<dto>")]
pub async fn login(
    db: &State<DbConn>,
    dto: Json<LoginDto>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    if dto.email_or_phone.is_empty() || dto.password.is_empty() {
        return Err(ApiError::bad_request(
            "Email/phone and password are required",
        ));
    }

    let user = db
        .collection::<User>("users")
        .find_one(
            doc! { "$or": [
                { "email": &dto.email_or_phone },
                { "phone_number": &dto.email_or_phone }
            ] },
            None,
        )
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    let valid = bcrypt::verify(&dto.password, &user.password).unwrap_or(false);
    if !valid {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let user_id = user
        .id
        .ok_or_else(|| ApiError::internal_error("Internal server error"))?;

    let token = JwtService::generate_token(&user_id, &user.email, user.role)
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    Ok(Json(ApiResponse::success_with_message(
        "Login successful".to_string(),
        serde_json::json!({
            "user": UserResponse::from(user),
            "token": token
        }),
    )))
}

#[openapi(tag = "Auth")]
#[get("/auth/profile")]
pub async fn get_profile(
    db: &State<DbConn>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let user = db
        .collection::<User>("users")
        .find_one(doc! { "_id": auth.user_id }, None)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(ApiResponse::success(UserResponse::from(user))))
}
