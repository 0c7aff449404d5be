//! Wishlist route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    response::Redirect,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use tradepost_core::ProductId;

use super::products::ProductView;
use super::{Layout, flash_failure, safe_return_to};
use crate::api::types::WishlistItem;
use crate::error::AppError;
use crate::middleware::{Flash, Flashes, RequireAuth, push_flash};
use crate::state::AppState;

#[derive(Clone)]
pub struct WishlistEntry {
    pub product: ProductView,
    pub added_on: String,
}

impl WishlistEntry {
    fn new(item: &WishlistItem, currency: tradepost_core::CurrencyCode) -> Self {
        Self {
            product: ProductView::new(&item.product, currency, None),
            added_on: item.added_at.format("%d %b %Y").to_string(),
        }
    }
}

/// Wishlist page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/wishlist.html")]
pub struct WishlistTemplate {
    pub layout: Layout,
    pub items: Vec<WishlistEntry>,
}

/// Add to wishlist form data.
#[derive(Debug, Deserialize)]
pub struct WishlistForm {
    pub product_id: ProductId,
    #[serde(default)]
    pub return_to: Option<String>,
}

/// Display the wishlist.
///
/// # Errors
///
/// Returns an error if the wishlist cannot be fetched.
#[instrument(skip(state, user, flashes), fields(user_id = %user.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    flashes: Flashes,
) -> Result<WishlistTemplate, AppError> {
    let currency = state.config().currency;
    let items = state.api().wishlist(&user.api_session).await?;

    Ok(WishlistTemplate {
        layout: Layout::new(Some(&user), flashes),
        items: items.iter().map(|i| WishlistEntry::new(i, currency)).collect(),
    })
}

/// Save a product to the wishlist.
///
/// # Errors
///
/// Returns an error only when the backend session expired.
#[instrument(skip(state, session, user), fields(user_id = %user.id))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Form(form): Form<WishlistForm>,
) -> Result<Redirect, AppError> {
    match state
        .api()
        .add_to_wishlist(&user.api_session, form.product_id)
        .await
    {
        Ok(()) => push_flash(&session, Flash::success("Saved to your wishlist")).await,
        Err(e) => flash_failure(&session, e.into()).await?,
    }

    Ok(Redirect::to(&safe_return_to(
        form.return_to.as_deref(),
        "/account/wishlist",
    )))
}

/// Remove a product from the wishlist.
///
/// # Errors
///
/// Returns an error only when the backend session expired.
#[instrument(skip(state, session, user), fields(user_id = %user.id))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(product_id): Path<ProductId>,
) -> Result<Redirect, AppError> {
    match state
        .api()
        .remove_from_wishlist(&user.api_session, product_id)
        .await
    {
        Ok(()) => push_flash(&session, Flash::info("Removed from your wishlist")).await,
        Err(e) => flash_failure(&session, e.into()).await?,
    }

    Ok(Redirect::to("/account/wishlist"))
}
