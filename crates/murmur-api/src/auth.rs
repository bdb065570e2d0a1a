use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use tracing::info;
use uuid::Uuid;

use murmur_db::Database;
use murmur_db::models::{NewUser, ProfileUpdate};
use murmur_types::api::{AuthResponse, Claims, LoginRequest, SignupRequest, UpdateProfileRequest};

use crate::convert::user_profile;
use crate::error::ApiError;
use crate::extract::Json;
use crate::middleware::AuthUser;
use crate::with_db;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
}

const MIN_PASSWORD_LEN: usize = 8;

pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_username(&req.username)?;
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let password_hash = tokio::task::spawn_blocking(move || hash_password(&req.password)).await??;

    let user_id = Uuid::new_v4();
    let gender = req.gender.unwrap_or_default();
    let username = req.username;

    let user = with_db(&state, move |db| {
        let created = db.create_user(&NewUser {
            id: &user_id.to_string(),
            username: &username,
            password_hash: &password_hash,
            gender: gender.as_str(),
        })?;
        if !created {
            return Ok(None);
        }
        db.get_user_by_id(&user_id.to_string())
    })
    .await?
    .ok_or_else(|| ApiError::Conflict("User already exists".into()))?;

    info!("New user registered: {} ({})", user.username, user.id);

    let token = create_token(&state, user_id)?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: user_profile(&user),
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let invalid = || ApiError::Unauthorized("Invalid username or password".into());

    let username = req.username.clone();
    let user = with_db(&state, move |db| db.get_user_by_username(&username))
        .await?
        .ok_or_else(invalid)?;

    let stored_hash = user.password.clone();
    let password = req.password;
    let valid = tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash)).await??;
    if !valid {
        return Err(invalid());
    }

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| anyhow::anyhow!("Corrupt user id '{}': {}", user.id, e))?;

    let token = create_token(&state, user_id)?;
    Ok(Json(AuthResponse {
        user: user_profile(&user),
        token,
    }))
}

/// GET /auth/me: the caller's own profile.
pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let id = auth.id.to_string();
    let user = with_db(&state, move |db| db.get_user_by_id(&id))
        .await?
        .ok_or(ApiError::NotFound("User"))?;
    Ok(Json(user_profile(&user)))
}

/// PUT /auth/profile: partial update; returns the profile with a fresh token.
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Blank strings for the text preferences mean "leave unchanged".
    let non_blank = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

    let update = ProfileUpdate {
        gender: req.gender.map(|g| g.as_str().to_string()),
        vibe: non_blank(req.vibe),
        accent_color: non_blank(req.accent_color),
        chat_wallpaper: req.chat_wallpaper,
        sounds_enabled: req.sounds_enabled,
        profile_pic: req.profile_pic,
        bio: req.bio,
    };

    let id = auth.id.to_string();
    let user = with_db(&state, move |db| db.update_profile(&id, &update))
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    let token = create_token(&state, auth.id)?;
    Ok(Json(AuthResponse {
        user: user_profile(&user),
        token,
    }))
}

pub fn create_token(state: &AppStateInner, user_id: Uuid) -> anyhow::Result<String> {
    let now = chrono::Utc::now();
    let claims = Claims {
        sub: user_id,
        iat: now.timestamp() as usize,
        exp: (now + state.token_ttl).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.jwt_secret.as_bytes()),
    )?;

    Ok(token)
}

/// Check signature and expiry. Does not look the user up; callers must
/// re-fetch current user state.
pub fn decode_token(secret: &str, token: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => ApiError::Unauthorized("Not authorized, token expired".into()),
        _ => ApiError::Unauthorized("Not authorized, token failed".into()),
    })
}

fn validate_username(username: &str) -> Result<(), ApiError> {
    let len = username.chars().count();
    if !(3..=32).contains(&len) {
        return Err(ApiError::Validation("Username must be 3-32 characters".into()));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(ApiError::Validation(
            "Username may only contain letters, digits, '_', '.' and '-'".into(),
        ));
    }
    Ok(())
}

fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

fn verify_password(password: &str, stored_hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored_hash).map_err(|e| anyhow::anyhow!("Corrupt password hash: {}", e))?;
    Ok(Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> AppStateInner {
        AppStateInner {
            db: Arc::new(Database::open_in_memory().unwrap()),
            jwt_secret: "test-secret".into(),
            token_ttl: chrono::Duration::days(30),
        }
    }

    #[test]
    fn token_roundtrip_carries_only_user_id() {
        let state = state();
        let user_id = Uuid::new_v4();
        let token = create_token(&state, user_id).unwrap();

        let claims = decode_token(&state.jwt_secret, &token).unwrap();
        assert_eq!(claims.sub, user_id);
        let ttl = claims.exp - claims.iat;
        assert_eq!(ttl, 30 * 24 * 60 * 60);
    }

    #[test]
    fn token_with_wrong_secret_is_rejected() {
        let state = state();
        let token = create_token(&state, Uuid::new_v4()).unwrap();
        assert!(matches!(decode_token("other-secret", &token), Err(ApiError::Unauthorized(_))));
    }

    #[test]
    fn expired_token_is_rejected() {
        let mut state = state();
        state.token_ttl = chrono::Duration::days(-1);
        let token = create_token(&state, Uuid::new_v4()).unwrap();
        match decode_token(&state.jwt_secret, &token) {
            Err(ApiError::Unauthorized(msg)) => assert!(msg.contains("expired")),
            other => panic!("expected expiry rejection, got {:?}", other.map(|c| c.sub)),
        }
    }

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("correct horse").unwrap();
        assert_ne!(hash, "correct horse");
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
    }

    #[test]
    fn username_rules() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username("a.b-c_d").is_ok());
        assert!(validate_username("al").is_err());
        assert!(validate_username("has space").is_err());
        assert!(validate_username(&"x".repeat(33)).is_err());
    }
}
