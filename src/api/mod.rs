//! API handlers for Libris REST endpoints

pub mod borrow;
pub mod health;
pub mod instances;
pub mod logs;
pub mod openapi;

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{error::AppError, models::user::UserClaims, AppState};

/// Mount point of the routes guarded by the access policy
pub const PRIVATE_PREFIX: &str = "/api/v1/private";

/// Extractor for authenticated user from JWT token
pub struct AuthenticatedUser(pub UserClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::Authentication("Missing or invalid bearer token".to_string()))?;

        let claims = UserClaims::from_token(bearer.token(), &state.config.auth.jwt_secret)
            .map_err(|e| AppError::Authentication(e.to_string()))?;

        Ok(AuthenticatedUser(claims))
    }
}

/// Path as the permission table sees it: routing prefix removed, never empty
pub fn policy_path(path: &str) -> &str {
    match path.strip_prefix(PRIVATE_PREFIX) {
        Some("") => "/",
        Some(rest) => rest,
        None => path,
    }
}

/// Resolve the caller and run the access policy before any private handler.
///
/// On success the caller's [`Identity`](crate::models::user::Identity) is available to
/// handlers as a request extension.
pub async fn require_permission(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity = claims.identity();
    let path = policy_path(request.uri().path()).to_string();

    let decision = state
        .services
        .policy
        .authorize_request(&identity.role, request.method(), &path);

    if !decision.is_allowed() {
        tracing::info!(
            user_id = identity.user_id,
            role = %identity.role,
            method = %request.method(),
            path = %path,
            "Access denied"
        );
        return Err(AppError::Authorization("You are not authorized to do that".to_string()));
    }

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let private = Router::new()
        // Borrowing
        .route("/borrow", get(borrow::active_loans))
        .route("/borrow/:unit_id", post(borrow::checkout))
        .route("/return/:unit_id", post(borrow::return_unit))
        .route("/history", get(borrow::history))
        // Book instances
        .route("/book/:book_id/instance", post(instances::create_instance))
        .route(
            "/book/:book_id/instance/:id",
            get(instances::get_instance)
                .patch(instances::update_instance)
                .delete(instances::delete_instance),
        )
        // System logs
        .route("/system-logs", get(logs::list_logs))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_permission));

    let api_v1 = Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .nest("/private", private)
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
