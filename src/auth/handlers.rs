use crate::{
    api::{ApiResponse, failure},
    auth::{
        auth::AuthUser,
        jwt::{generate_access_token, generate_refresh_token, verify_token},
        password::{MIN_PASSWORD_LEN, hash_password, verify_password},
    },
    config::Config,
    error::AttendanceError,
    model::{
        role::Role,
        user::{Employee, next_employee_code},
    },
    models::{Claims, LoginReqDto, RegisterReq, TokenType, UserSql},
    service::AppAttendanceService,
    store::mysql::fetch_pending_employees,
    utils::email_cache,
};
use actix_web::{HttpRequest, HttpResponse, Responder, http::StatusCode, web};
use serde::Serialize;
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument, warn};
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[schema(example = "employee")]
    pub role: String,
}

#[derive(Serialize, ToSchema)]
pub struct RegisterResponse {
    #[schema(example = 7)]
    pub user_id: u64,
    #[schema(example = "EMP007")]
    pub employee_code: String,
    #[serde(flatten)]
    pub tokens: TokenResponse,
}

/// Registration input after trimming and validation.
#[derive(Debug, PartialEq)]
struct NewUser {
    name: String,
    email: String,
    department: String,
    role: Role,
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    }
}

fn validate_registration(req: &RegisterReq) -> Result<NewUser, &'static str> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err("Name is required");
    }

    let email = email_cache::normalize(&req.email);
    if !is_plausible_email(&email) {
        return Err("Please provide a valid email");
    }

    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err("Password must be at least 6 characters");
    }

    let department = req.department.trim();
    if department.is_empty() {
        return Err("Department is required");
    }

    // Admins are provisioned directly in the database
    let role = match req.role.as_deref().map(str::trim) {
        None | Some("") => Role::Employee,
        Some(raw) => match raw.to_lowercase().parse::<Role>() {
            Ok(role @ (Role::Employee | Role::Manager)) => role,
            _ => return Err("Role must be employee or manager"),
        },
    };

    Ok(NewUser {
        name: name.to_string(),
        email,
        department: department.to_string(),
        role,
    })
}

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

fn server_error() -> HttpResponse {
    failure(StatusCode::INTERNAL_SERVER_ERROR, "Server error")
}

/// true  => email AVAILABLE
/// false => email TAKEN
async fn is_email_available(email: &str, pool: &MySqlPool) -> Result<bool, sqlx::Error> {
    if email_cache::is_taken(email).await {
        return Ok(false);
    }

    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = ? LIMIT 1)",
    )
    .bind(email)
    .fetch_one(pool)
    .await?;

    if exists {
        email_cache::mark_taken(email).await;
    }

    Ok(!exists)
}

async fn store_refresh_token(
    pool: &MySqlPool,
    user_id: u64,
    claims: &Claims,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(user_id)
    .bind(&claims.jti)
    .bind(claims.exp as i64)
    .execute(pool)
    .await?;

    Ok(())
}

/// Issues an access/refresh pair and records the refresh token's `jti`.
async fn issue_tokens(
    user_id: u64,
    email: &str,
    role: Role,
    pool: &MySqlPool,
    config: &Config,
) -> Result<TokenResponse, HttpResponse> {
    let access_token = generate_access_token(
        user_id,
        email.to_string(),
        role.id(),
        &config.jwt_secret,
        config.access_token_ttl,
    )
    .map_err(|e| {
        error!(error = %e, user_id, "Failed to sign access token");
        server_error()
    })?;

    let (refresh_token, refresh_claims) = generate_refresh_token(
        user_id,
        email.to_string(),
        role.id(),
        &config.jwt_secret,
        config.refresh_token_ttl,
    )
    .map_err(|e| {
        error!(error = %e, user_id, "Failed to sign refresh token");
        server_error()
    })?;

    debug!(user_id, jti = %refresh_claims.jti, "Storing refresh token");
    store_refresh_token(pool, user_id, &refresh_claims)
        .await
        .map_err(|e| {
            error!(error = %e, user_id, "Failed to store refresh token");
            server_error()
        })?;

    Ok(TokenResponse {
        access_token,
        refresh_token,
        role: role.as_ref().to_string(),
    })
}

/// Register a new user
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterReq,
    responses(
        (status = 201, description = "User registered", body = RegisterResponse),
        (status = 400, description = "Validation failed", body = Object, example = json!({
            "success": false, "message": "Password must be at least 6 characters"
        })),
        (status = 409, description = "Email already registered", body = Object, example = json!({
            "success": false, "message": "User already exists"
        })),
        (status = 500, description = "Internal server error")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_register", skip(req, pool, config), fields(email = %req.email))]
pub async fn register(
    req: web::Json<RegisterReq>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    let new_user = match validate_registration(&req) {
        Ok(u) => u,
        Err(msg) => {
            info!(reason = msg, "Registration rejected");
            return failure(StatusCode::BAD_REQUEST, msg);
        }
    };

    match is_email_available(&new_user.email, pool.get_ref()).await {
        Ok(true) => {}
        Ok(false) => return failure(StatusCode::CONFLICT, "User already exists"),
        Err(e) => {
            error!(error = %e, "Email availability check failed");
            return server_error();
        }
    }

    let last_code = match sqlx::query_scalar::<_, String>(
        "SELECT employee_code FROM users ORDER BY id DESC LIMIT 1",
    )
    .fetch_optional(pool.get_ref())
    .await
    {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Failed to read last employee code");
            return server_error();
        }
    };
    let employee_code = next_employee_code(last_code.as_deref());

    let hashed = match hash_password(&req.password) {
        Ok(h) => h,
        Err(e) => {
            error!(error = %e, "Failed to hash password");
            return server_error();
        }
    };

    let result = sqlx::query(
        r#"
        INSERT INTO users (name, email, password, employee_code, department, role_id, is_approved)
        VALUES (?, ?, ?, ?, ?, ?, TRUE)
        "#,
    )
    .bind(&new_user.name)
    .bind(&new_user.email)
    .bind(&hashed)
    .bind(&employee_code)
    .bind(&new_user.department)
    .bind(new_user.role.id())
    .execute(pool.get_ref())
    .await;

    let user_id = match result {
        Ok(r) => r.last_insert_id(),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            // Lost a race on email or employee code
            warn!(error = %db_err, "Registration hit unique key");
            return failure(StatusCode::CONFLICT, "User already exists");
        }
        Err(e) => {
            error!(error = %e, "Failed to insert user");
            return server_error();
        }
    };

    email_cache::mark_taken(&new_user.email).await;
    info!(user_id, %employee_code, "User registered");

    match issue_tokens(user_id, &new_user.email, new_user.role, pool.get_ref(), &config).await {
        Ok(tokens) => HttpResponse::Created().json(ApiResponse::with_message(
            "User registered successfully",
            RegisterResponse {
                user_id,
                employee_code,
                tokens,
            },
        )),
        Err(resp) => resp,
    }
}

/// Log in with email and password
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Logged in", body = TokenResponse),
        (status = 400, description = "Email or password missing"),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Account pending approval"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_login", skip(pool, config, user), fields(email = %user.email))]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    info!("Login request received");

    let email = email_cache::normalize(&user.email);
    if email.is_empty() || user.password.is_empty() {
        return failure(StatusCode::BAD_REQUEST, "Email and password are required");
    }

    let db_user = match sqlx::query_as::<_, UserSql>(
        r#"
        SELECT id, email, password, role_id, is_approved
        FROM users
        WHERE email = ?
        "#,
    )
    .bind(&email)
    .fetch_optional(pool.get_ref())
    .await
    {
        Ok(Some(u)) => u,
        Ok(None) => {
            info!("Invalid credentials: user not found");
            return failure(StatusCode::UNAUTHORIZED, "Invalid credentials");
        }
        Err(e) => {
            error!(error = %e, "Database error while fetching user");
            return server_error();
        }
    };

    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return failure(StatusCode::UNAUTHORIZED, "Invalid credentials");
    }

    if !db_user.is_approved {
        info!(user_id = db_user.id, "Login refused: pending approval");
        return failure(StatusCode::FORBIDDEN, "Account pending approval");
    }

    let Some(role) = Role::from_id(db_user.role_id) else {
        error!(user_id = db_user.id, role_id = db_user.role_id, "User has unknown role");
        return server_error();
    };

    let tokens = match issue_tokens(db_user.id, &db_user.email, role, pool.get_ref(), &config).await
    {
        Ok(t) => t,
        Err(resp) => return resp,
    };

    // Not fatal for the login
    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to update last_login_at");
    }

    email_cache::mark_taken(&db_user.email).await;
    info!(user_id = db_user.id, "Login successful");

    ApiResponse::ok(tokens)
}

/// Exchange a refresh token for a new token pair
#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "New token pair", body = TokenResponse),
        (status = 401, description = "Missing, invalid, or revoked refresh token"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_refresh", skip_all)]
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    let Some(token) = bearer_token(&req) else {
        return failure(StatusCode::UNAUTHORIZED, "No token");
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) if c.token_type == TokenType::Refresh => c,
        _ => return failure(StatusCode::UNAUTHORIZED, "Invalid refresh token"),
    };

    let Some(role) = Role::from_id(claims.role) else {
        return failure(StatusCode::UNAUTHORIZED, "Invalid refresh token");
    };

    // Revoking only a live row makes a replayed token lose the race
    let revoked = match sqlx::query(
        "UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ? AND revoked = FALSE",
    )
    .bind(&claims.jti)
    .execute(pool.get_ref())
    .await
    {
        Ok(r) => r.rows_affected(),
        Err(e) => {
            error!(error = %e, "Failed to revoke refresh token");
            return server_error();
        }
    };

    if revoked == 0 {
        warn!(user_id = claims.user_id, jti = %claims.jti, "Refresh token unknown or already used");
        return failure(StatusCode::UNAUTHORIZED, "Invalid refresh token");
    }

    match issue_tokens(claims.user_id, &claims.sub, role, pool.get_ref(), &config).await {
        Ok(tokens) => ApiResponse::ok(tokens),
        Err(resp) => resp,
    }
}

/// Revoke a refresh token. Always succeeds.
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 204, description = "Logged out")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    let Some(token) = bearer_token(&req) else {
        return HttpResponse::NoContent().finish();
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) if c.token_type == TokenType::Refresh => c,
        _ => return HttpResponse::NoContent().finish(),
    };

    if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await
    {
        warn!(error = %e, "Failed to revoke refresh token on logout");
    }

    HttpResponse::NoContent().finish()
}

/// Profile of the calling user
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Caller's profile", body = Employee),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "User not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Auth"
)]
pub async fn me(
    auth: AuthUser,
    service: web::Data<AppAttendanceService>,
) -> actix_web::Result<HttpResponse> {
    match service.employee(auth.user_id).await? {
        Some(profile) => Ok(ApiResponse::ok(profile)),
        None => Ok(failure(StatusCode::NOT_FOUND, "User not found")),
    }
}

/// Registrations waiting for a manager
#[utoipa::path(
    get,
    path = "/api/auth/pending-approvals",
    responses(
        (status = 200, description = "Pending employees, newest first", body = [Employee]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Manager role required")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Auth"
)]
pub async fn pending_approvals(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<HttpResponse> {
    auth.require_manager()?;

    let pending = fetch_pending_employees(pool.get_ref())
        .await
        .map_err(AttendanceError::from)?;

    Ok(ApiResponse::ok(pending))
}

/// Approve a pending registration
#[utoipa::path(
    put,
    path = "/api/auth/approve/{id}",
    params(
        ("id" = u64, Path, description = "User id")
    ),
    responses(
        (status = 200, description = "User approved", body = Employee),
        (status = 403, description = "Manager role required"),
        (status = 404, description = "User not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_approve", skip(auth, pool, service), fields(manager_id = auth.user_id))]
pub async fn approve_user(
    auth: AuthUser,
    path: web::Path<u64>,
    pool: web::Data<MySqlPool>,
    service: web::Data<AppAttendanceService>,
) -> actix_web::Result<HttpResponse> {
    auth.require_manager()?;
    let user_id = path.into_inner();

    let Some(mut profile) = service.employee(user_id).await? else {
        return Ok(failure(StatusCode::NOT_FOUND, "User not found"));
    };

    sqlx::query("UPDATE users SET is_approved = TRUE WHERE id = ?")
        .bind(user_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| AttendanceError::Store(e.into()))?;

    profile.is_approved = true;
    info!(user_id, "User approved");

    Ok(HttpResponse::Ok().json(ApiResponse::with_message("User approved", profile)))
}

/// Reject and delete a pending registration
#[utoipa::path(
    delete,
    path = "/api/auth/reject/{id}",
    params(
        ("id" = u64, Path, description = "User id")
    ),
    responses(
        (status = 200, description = "User rejected and removed"),
        (status = 403, description = "Manager role required"),
        (status = 404, description = "No pending user with that id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_reject", skip(auth, pool, service), fields(manager_id = auth.user_id))]
pub async fn reject_user(
    auth: AuthUser,
    path: web::Path<u64>,
    pool: web::Data<MySqlPool>,
    service: web::Data<AppAttendanceService>,
) -> actix_web::Result<HttpResponse> {
    auth.require_manager()?;
    let user_id = path.into_inner();

    let profile = match service.employee(user_id).await? {
        Some(p) if !p.is_approved => p,
        _ => return Ok(failure(StatusCode::NOT_FOUND, "Pending user not found")),
    };

    let result = sqlx::query("DELETE FROM users WHERE id = ? AND is_approved = FALSE")
        .bind(user_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| AttendanceError::Store(e.into()))?;

    if result.rows_affected() == 0 {
        return Ok(failure(StatusCode::NOT_FOUND, "Pending user not found"));
    }

    email_cache::forget(&profile.email).await;
    info!(user_id, "Pending user rejected");

    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        "User rejected and removed",
        serde_json::json!({ "id": user_id }),
    )))
}
