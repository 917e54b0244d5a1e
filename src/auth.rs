use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};

use crate::{
    config::AppConfig,
    error::AppError,
    repository::{Repository, RepositoryState},
};

/// Fixed lifetime of every issued token, bound at issuance.
pub const TOKEN_LIFETIME_SECS: i64 = 60 * 60;

pub const MISSING_CREDENTIAL: &str = "unauthorized access";
pub const INVALID_CREDENTIAL: &str = "forbidden access";

/// Claims
///
/// The payload signed into every access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject email. Everything downstream identifies the caller by it.
    pub email: String,
    /// Expiration Time (exp): the token is rejected after this instant.
    pub exp: usize,
    /// Issued At (iat).
    pub iat: usize,
}

/// issue_token
///
/// Signs a token for `email` with the process-wide secret, valid for one hour.
pub fn issue_token(secret: &str, email: &str) -> Result<String, AppError> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        email: email.to_string(),
        iat: now as usize,
        exp: (now + TOKEN_LIFETIME_SECS) as usize,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

/// verify_token
///
/// Decodes and validates a token: signature, structure and expiry. Any failure is the
/// same `Unauthenticated` outcome, distinct in message from a missing credential.
pub fn verify_token(secret: &str, token: &str) -> Result<Claims, AppError> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::default();
    // Ensure expiration time validation is always active.
    validation.validate_exp = true;

    match decode::<Claims>(token, &decoding_key, &validation) {
        Ok(data) => Ok(data.claims),
        Err(e) => {
            match e.kind() {
                ErrorKind::ExpiredSignature => tracing::debug!("rejected expired token"),
                kind => tracing::debug!(?kind, "rejected invalid token"),
            }
            Err(AppError::Unauthenticated(INVALID_CREDENTIAL))
        }
    }
}

/// AuthUser Extractor Result
///
/// The verified identity of the caller. Handlers taking an `AuthUser` argument never
/// run for unauthenticated requests.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub email: String,
}

/// AuthUser Extractor Implementation
///
/// 1. Token Extraction: `Authorization: Bearer <token>`; absent → 401 "unauthorized access".
/// 2. Token Validation: decode with the configured secret; invalid/expired → 401
///    "forbidden access".
///
/// Verification is pure: it does not touch the store.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AppConfig::from_ref(state);

        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(AppError::Unauthenticated(MISSING_CREDENTIAL))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AppError::Unauthenticated(MISSING_CREDENTIAL))?;

        let claims = verify_token(&config.jwt_secret, token)?;

        Ok(AuthUser {
            email: claims.email,
        })
    }
}

/// is_admin
///
/// Role resolution. A missing user is simply "not admin", never an error.
pub async fn is_admin(repo: &dyn Repository, email: &str) -> Result<bool, AppError> {
    let user = repo.get_user_by_email(email).await?;
    Ok(user.is_some_and(|u| u.is_admin()))
}

/// ensure_self_or_admin
///
/// Guards per-participant resources: the caller must be the owner of `email` or an admin.
pub async fn ensure_self_or_admin(
    repo: &dyn Repository,
    caller: &AuthUser,
    email: &str,
) -> Result<(), AppError> {
    if caller.email == email || is_admin(repo, &caller.email).await? {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

/// AdminUser
///
/// An authenticated caller whose stored role is "admin".
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub email: String,
}

/// AdminUser Extractor Implementation
///
/// Authentication runs first, so a missing credential stays a 401. A verified caller
/// that is not an admin (for whatever reason) gets a single 403.
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthUser { email } = AuthUser::from_request_parts(parts, state).await?;
        let repo = RepositoryState::from_ref(state);

        if !is_admin(repo.as_ref(), &email).await? {
            tracing::warn!(%email, "admin route refused");
            return Err(AppError::Forbidden);
        }

        Ok(AdminUser { email })
    }
}
