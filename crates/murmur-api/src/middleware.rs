use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::auth::{AppState, decode_token};
use crate::error::ApiError;
use crate::with_db;

/// Identity of the caller, resolved from the bearer token against the
/// current user row. Handlers receive it as `Extension<AuthUser>`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
}

/// Extract and validate the JWT from the Authorization header, then
/// re-fetch the user so deleted accounts and stale claims are rejected.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::Unauthorized("Not authorized, no token".into()))?;

    let claims = decode_token(&state.jwt_secret, token)?;

    let user_id = claims.sub.to_string();
    let user = with_db(&state, move |db| db.get_user_by_id(&user_id))
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Not authorized, user no longer exists".into()))?;

    req.extensions_mut().insert(AuthUser {
        id: claims.sub,
        username: user.username,
    });
    Ok(next.run(req).await)
}
