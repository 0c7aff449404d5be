//! Authentication route handlers.
//!
//! One-time passcode login: the shopper enters an email, receives a code,
//! and either signs straight in or completes a short registration form.
//! Any guest cart is merged into the account once login completes.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use tradepost_core::{Email, UserRole};

use super::Layout;
use crate::error::{AppError, add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::middleware::{
    Flash, Flashes, OptionalAuth, clear_current_user, push_flash, set_current_user,
};
use crate::models::{CurrentUser, PendingRegistration, session_keys};
use crate::services::auth::{AuthError, AuthService, Verification};
use crate::services::cart::{load_guest_cart, merge_guest_cart, save_guest_cart};
use crate::services::pricing::clear_applied_coupon;
use crate::state::AppState;

// =============================================================================
// Form Types
// =============================================================================

/// Email form data.
#[derive(Debug, Deserialize)]
pub struct RequestCodeForm {
    pub email: String,
}

/// Passcode form data.
#[derive(Deserialize)]
pub struct VerifyCodeForm {
    pub code: String,
}

/// Registration form data.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub name: String,
    /// `seller` opts into a seller account; anything else registers a buyer.
    #[serde(default)]
    pub role: Option<String>,
}

impl RegisterForm {
    fn role(&self) -> UserRole {
        self.role
            .as_deref()
            .and_then(|r| r.parse().ok())
            .unwrap_or_default()
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub layout: Layout,
}

/// Passcode entry template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/verify.html")]
pub struct VerifyTemplate {
    pub layout: Layout,
    pub email: String,
}

/// Registration page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub layout: Layout,
    pub email: String,
}

// =============================================================================
// Session helpers
// =============================================================================

async fn pending_email(session: &Session) -> Option<Email> {
    session
        .get::<Email>(session_keys::OTP_EMAIL)
        .await
        .ok()
        .flatten()
}

async fn pending_registration(session: &Session) -> Option<PendingRegistration> {
    session
        .get::<PendingRegistration>(session_keys::PENDING_REGISTRATION)
        .await
        .ok()
        .flatten()
}

/// Finish login: rotate the session id, store the user and fold any guest
/// cart into the account.
async fn complete_login(
    state: &AppState,
    session: &Session,
    user: &CurrentUser,
) -> Result<Redirect, AppError> {
    session.cycle_id().await?;
    session.remove_value(session_keys::OTP_EMAIL).await?;
    session.remove_value(session_keys::PENDING_REGISTRATION).await?;
    set_current_user(session, user).await?;
    set_sentry_user(&user.id, Some(user.email.as_str()));
    add_breadcrumb("auth", "Logged in", &[("user_id", &user.id.to_string())]);

    let mut guest = load_guest_cart(session).await;
    let report = merge_guest_cart(state.api(), &user.api_session, &mut guest).await;

    push_flash(
        session,
        Flash::success(format!("Welcome, {}", user.display_name())),
    )
    .await;

    let Some(report) = report else {
        return Ok(Redirect::to("/"));
    };

    save_guest_cart(session, &guest).await?;
    if !report.is_complete() {
        let count = report.failed.len();
        push_flash(
            session,
            Flash::error(format!(
                "{count} item{} from your cart could not be added to your account",
                if count == 1 { "" } else { "s" }
            )),
        )
        .await;
    }
    Ok(Redirect::to("/cart"))
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the login page.
#[instrument(skip_all)]
pub async fn login_page(OptionalAuth(user): OptionalAuth, flashes: Flashes) -> Response {
    if user.is_some() {
        return Redirect::to("/account").into_response();
    }
    LoginTemplate {
        layout: Layout::new(None, flashes),
    }
    .into_response()
}

/// Send a passcode to the submitted email.
///
/// # Errors
///
/// Returns an error if the session cannot be saved.
#[instrument(skip(state, session))]
pub async fn request_code(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RequestCodeForm>,
) -> Result<Redirect, AppError> {
    match AuthService::new(state.api()).request_code(&form.email).await {
        Ok(email) => {
            session.insert(session_keys::OTP_EMAIL, &email).await?;
            push_flash(
                &session,
                Flash::info(format!("We sent a sign-in code to {email}")),
            )
            .await;
            Ok(Redirect::to("/auth/otp/verify"))
        }
        Err(e) => {
            warn!(error = %e, "Passcode request failed");
            push_flash(&session, Flash::error(e.user_message())).await;
            Ok(Redirect::to("/auth/login"))
        }
    }
}

/// Display the passcode form.
#[instrument(skip_all)]
pub async fn verify_page(session: Session, flashes: Flashes) -> Response {
    let Some(email) = pending_email(&session).await else {
        push_flash(&session, Flash::info(AuthError::NoPendingCode.user_message())).await;
        return Redirect::to("/auth/login").into_response();
    };

    VerifyTemplate {
        layout: Layout::new(None, flashes),
        email: email.to_string(),
    }
    .into_response()
}

/// Check the passcode and sign in, or continue to registration.
///
/// # Errors
///
/// Returns an error if the session cannot be saved.
#[instrument(skip_all)]
pub async fn verify_code(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<VerifyCodeForm>,
) -> Result<Redirect, AppError> {
    let Some(email) = pending_email(&session).await else {
        push_flash(&session, Flash::info(AuthError::NoPendingCode.user_message())).await;
        return Ok(Redirect::to("/auth/login"));
    };

    match AuthService::new(state.api())
        .verify_code(&email, &form.code)
        .await
    {
        Ok(Verification::LoggedIn(user)) => complete_login(&state, &session, &user).await,
        Ok(Verification::NeedsRegistration(pending)) => {
            info!(email = %pending.email, "New account needs registration");
            session
                .insert(session_keys::PENDING_REGISTRATION, &pending)
                .await?;
            Ok(Redirect::to("/auth/register"))
        }
        Err(e) => {
            warn!(error = %e, "Passcode verification failed");
            push_flash(&session, Flash::error(e.user_message())).await;
            Ok(Redirect::to("/auth/otp/verify"))
        }
    }
}

/// Display the registration form for a verified email.
#[instrument(skip_all)]
pub async fn register_page(session: Session, flashes: Flashes) -> Response {
    let Some(pending) = pending_registration(&session).await else {
        return Redirect::to("/auth/login").into_response();
    };

    RegisterTemplate {
        layout: Layout::new(None, flashes),
        email: pending.email.to_string(),
    }
    .into_response()
}

/// Create the account and sign in.
///
/// # Errors
///
/// Returns an error if the session cannot be saved.
#[instrument(skip(state, session))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Result<Redirect, AppError> {
    let Some(pending) = pending_registration(&session).await else {
        push_flash(&session, Flash::info(AuthError::NoPendingCode.user_message())).await;
        return Ok(Redirect::to("/auth/login"));
    };

    match AuthService::new(state.api())
        .register(pending, &form.name, form.role())
        .await
    {
        Ok(user) => complete_login(&state, &session, &user).await,
        Err(e) => {
            warn!(error = %e, "Registration failed");
            push_flash(&session, Flash::error(e.user_message())).await;
            Ok(Redirect::to("/auth/register"))
        }
    }
}

/// Sign out locally and, best effort, on the backend.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
#[instrument(skip_all)]
pub async fn logout(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<Redirect, AppError> {
    if let Some(user) = &user {
        AuthService::new(state.api()).logout(&user.api_session).await;
        info!(user_id = %user.id, "User logged out");
    }

    clear_current_user(&session).await?;
    clear_applied_coupon(&session).await?;
    session.remove_value(session_keys::GUEST_CART).await?;
    session.cycle_id().await?;
    clear_sentry_user();

    push_flash(&session, Flash::info("Signed out")).await;
    Ok(Redirect::to("/"))
}
