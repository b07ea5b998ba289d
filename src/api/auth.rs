use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{request::Parts, StatusCode},
    response::IntoResponse,
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::sync::Arc;
use tracing::{debug, info};

use super::error::{ApiError, ApiJson};
use crate::auth::{self, hash_password, verify_password, TOKEN_COOKIE};
use crate::db::{LoginRequest, SignupRequest, User, UserResponse};
use crate::error::Error;
use crate::AppState;

/// Session cookie carrying a freshly issued token
fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((TOKEN_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}

/// Register a new user and sign them in
pub async fn signup(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    ApiJson(mut request): ApiJson<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    request.normalize();
    request.validate().finish().map_err(Error::from)?;

    let password_hash = hash_password(request.password.as_deref().unwrap_or_default())?;
    let user = User::create(&state.db, &request, &password_hash).await?;
    let token = state.tokens.issue(&user.id)?;

    info!(user = %user.id, "User signed up");

    let jar = jar.add(session_cookie(token, state.config.auth.secure_cookie));
    Ok((StatusCode::CREATED, jar, Json(UserResponse::from(user))))
}

/// Login endpoint
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = User::get_by_email(&state.db, &request.email_id)
        .await?
        .ok_or(Error::InvalidCredentials)?;

    if !verify_password(&request.password, &user.password_hash) {
        debug!(user = %user.id, "Password mismatch");
        return Err(Error::InvalidCredentials.into());
    }

    let token = state.tokens.issue(&user.id)?;
    info!(user = %user.id, "User logged in");

    let jar = jar.add(session_cookie(token, state.config.auth.secure_cookie));
    Ok((jar, Json(UserResponse::from(user))))
}

/// Clear the session cookie
pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    let jar = jar.remove(Cookie::build(TOKEN_COOKIE).path("/"));
    (jar, "Logout successful!")
}

/// The authenticated caller, resolved from the `token` cookie.
///
/// Runs before any body extractor, so a rejected request never reaches a
/// handler or storage.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar.get(TOKEN_COOKIE).map(|c| c.value().to_string());

        match auth::authenticate(&state.db, &state.tokens, token.as_deref()).await {
            Ok(user) => Ok(CurrentUser(user)),
            Err(e) => {
                debug!(path = %parts.uri.path(), reason = %e, "Request rejected by auth guard");
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie("abc".to_string(), false);
        assert_eq!(cookie.name(), "token");
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.secure(), Some(false));

        assert_eq!(session_cookie("abc".to_string(), true).secure(), Some(true));
    }
}
