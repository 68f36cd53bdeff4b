use crate::common::IdentityId;
use crate::domains::gateway::{GatewayError, IdentityGateway};
use crate::server::error::ApiError;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

/// Authenticated identity from the session token
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AuthUser {
    pub identity_id: IdentityId,
}

/// JWT authentication middleware
///
/// Extracts the session token from the Authorization header, verifies it, and adds
/// AuthUser to request extensions. Requests without a valid token continue
/// anonymously; handlers that take `AuthUser` reject them with 401.
pub async fn jwt_auth_middleware(
    gateway: Arc<IdentityGateway>,
    mut request: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    match extract_auth_user(request.headers(), &gateway) {
        Some(user) => {
            debug!(identity_id = %user.identity_id, "authenticated request");
            request.extensions_mut().insert(user);
        }
        None => debug!("No valid authentication token"),
    }

    next.run(request).await
}

/// Extract and verify the session token
fn extract_auth_user(headers: &HeaderMap, gateway: &IdentityGateway) -> Option<AuthUser> {
    let auth_str = headers.get("authorization")?.to_str().ok()?;

    // Handle both "Bearer <token>" and raw token
    let token = auth_str.strip_prefix("Bearer ").unwrap_or(auth_str);

    let identity_id = gateway.authenticate(token).ok()?;
    Some(AuthUser { identity_id })
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .copied()
            .ok_or(ApiError(GatewayError::Unauthorized))
    }
}
