//! Authentication extractors and session-expiry handling.

use axum::{
    extract::{FromRequestParts, Request},
    http::{StatusCode, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;
use tracing::{info, warn};

use crate::models::{CurrentUser, session_keys};

/// Extractor that requires a signed-in user.
///
/// Anonymous visitors are redirected to the login page.
///
/// # Example
///
/// ```rust,ignore
/// async fn account(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", user.display_name())
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

/// Rejection for [`RequireAuth`].
pub enum AuthRejection {
    /// Redirect to the login page.
    RedirectToLogin,
    /// No session layer; should not happen outside misconfigured tests.
    MissingSession,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to("/auth/login").into_response(),
            Self::MissingSession => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or(AuthRejection::MissingSession)?;

        let user = session
            .get::<CurrentUser>(session_keys::CURRENT_USER)
            .await
            .ok()
            .flatten()
            .ok_or(AuthRejection::RedirectToLogin)?;

        Ok(Self(user))
    }
}

/// Extractor that optionally gets the current user.
///
/// Decides which cart source a request uses: `None` means the guest cart.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = match parts.extensions.get::<Session>() {
            Some(session) => session
                .get::<CurrentUser>(session_keys::CURRENT_USER)
                .await
                .ok()
                .flatten(),
            None => None,
        };

        Ok(Self(user))
    }
}

/// Store the signed-in user in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::CURRENT_USER, user).await
}

/// Remove the signed-in user from the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<CurrentUser>(session_keys::CURRENT_USER)
        .await?;
    Ok(())
}

// =============================================================================
// Session expiry
// =============================================================================

/// Response extension set when the backend reported the user's session as
/// expired.
#[derive(Debug, Clone, Copy)]
pub struct SessionExpired;

/// Drop the local user when a handler saw the backend session expire.
///
/// Handlers surface `ApiError::Unauthorized` as a redirect carrying
/// [`SessionExpired`]; this layer clears the stale identity so the next
/// request falls back to the guest cart.
pub async fn session_expiry_middleware(session: Session, request: Request, next: Next) -> Response {
    let response = next.run(request).await;

    if response.extensions().get::<SessionExpired>().is_some() {
        info!("Backend session expired, signing out");
        if let Err(e) = clear_current_user(&session).await {
            warn!(error = %e, "Failed to clear expired user");
        }
        crate::error::clear_sentry_user();
    }

    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{
        Router,
        body::Body,
        http::{Request as HttpRequest, header},
        middleware::from_fn,
        routing::get,
    };
    use tower::ServiceExt;
    use tower_sessions::{MemoryStore, SessionManagerLayer};
    use tradepost_core::{Email, UserId, UserRole};

    use super::*;
    use crate::api::{ApiError, ApiSession};
    use crate::error::AppError;

    async fn sign_in(session: Session) -> Result<StatusCode, AppError> {
        let user = CurrentUser {
            id: UserId::new(7),
            email: Email::parse("asha@example.com").unwrap(),
            name: Some("Asha".to_string()),
            role: UserRole::Buyer,
            api_session: ApiSession::new("sid=abc"),
        };
        set_current_user(&session, &user).await?;
        Ok(StatusCode::OK)
    }

    async fn backend_rejects_session() -> Result<StatusCode, AppError> {
        Err(ApiError::Unauthorized.into())
    }

    async fn whoami(OptionalAuth(user): OptionalAuth) -> String {
        user.map(|u| u.id.to_string()).unwrap_or_default()
    }

    fn app() -> Router {
        Router::new()
            .route("/sign-in", get(sign_in))
            .route("/orders", get(backend_rejects_session))
            .route("/whoami", get(whoami))
            .layer(from_fn(session_expiry_middleware))
            .layer(SessionManagerLayer::new(MemoryStore::default()).with_secure(false))
    }

    async fn send(app: &Router, uri: &str, cookie: Option<&str>) -> Response {
        let mut request = HttpRequest::get(uri);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        app.clone()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn text(response: Response) -> String {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_backend_unauthorized_clears_user() {
        let app = app();

        let response = send(&app, "/sign-in", None).await;
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_string();
        assert_eq!(text(send(&app, "/whoami", Some(&cookie)).await).await, "7");

        let response = send(&app, "/orders", Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "/auth/login"
        );

        assert_eq!(text(send(&app, "/whoami", Some(&cookie)).await).await, "");
    }

    #[tokio::test]
    async fn test_require_auth_redirects_guests() {
        async fn account(RequireAuth(user): RequireAuth) -> String {
            user.id.to_string()
        }
        let app = Router::new()
            .route("/account", get(account))
            .layer(SessionManagerLayer::new(MemoryStore::default()));

        let response = send(&app, "/account", None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }
}
