//! Cart route handlers.
//!
//! Anonymous visitors mutate the guest cart kept in their session; signed-in
//! users mutate the server cart through the REST backend. Every mutation
//! redirects back with a flash message.

use askama::Template;
use askama_web::WebTemplate;
use axum::{Form, extract::State, response::Redirect};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use tradepost_core::{CartLineId, CurrencyCode, ProductId, VariantId};

use super::{Layout, flash_failure, money, safe_return_to};
use crate::api::ApiSession;
use crate::error::AppError;
use crate::middleware::{Flash, Flashes, OptionalAuth, push_flash};
use crate::models::CurrentUser;
use crate::services::cart::{
    CartError, CartLine, CartOwner, CartService, CartSnapshot, CartSource, GuestCart,
    load_guest_cart, save_guest_cart,
};
use crate::state::AppState;

// =============================================================================
// Active cart
// =============================================================================

/// The cart a request works on, resolved from the session user.
pub enum ActiveCart {
    Guest(GuestCart),
    Member(ApiSession),
}

impl ActiveCart {
    /// Guest cart for anonymous visitors, server cart otherwise.
    pub async fn resolve(session: &Session, user: Option<&CurrentUser>) -> Self {
        match user {
            Some(user) => Self::Member(user.api_session.clone()),
            None => Self::Guest(load_guest_cart(session).await),
        }
    }

    pub fn owner(&mut self) -> CartOwner<'_> {
        match self {
            Self::Guest(cart) => CartOwner::Guest(cart),
            Self::Member(api_session) => CartOwner::Member(api_session),
        }
    }

    /// Write a guest cart back to the session; no-op for members.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store write fails.
    pub async fn persist(&self, session: &Session) -> Result<(), tower_sessions::session::Error> {
        match self {
            Self::Guest(cart) => save_guest_cart(session, cart).await,
            Self::Member(_) => Ok(()),
        }
    }
}

/// Turn a cart mutation result into a flash message.
///
/// An expired backend session is returned as an error so the request is
/// redirected to login.
async fn report(
    session: &Session,
    result: Result<(), CartError>,
    success: String,
) -> Result<(), AppError> {
    match result {
        Ok(()) => {
            push_flash(session, Flash::success(success)).await;
            Ok(())
        }
        Err(e) => flash_failure(session, e.into()).await,
    }
}

// =============================================================================
// Views
// =============================================================================

/// Cart line display data for templates.
#[derive(Clone)]
pub struct CartLineView {
    pub id: String,
    pub product_id: i32,
    pub name: String,
    pub variant: Option<String>,
    pub image_url: Option<String>,
    pub quantity: u32,
    pub unit_price: String,
    pub line_total: String,
}

impl CartLineView {
    #[must_use]
    pub fn new(line: &CartLine, currency: CurrencyCode) -> Self {
        Self {
            id: line.id.to_string(),
            product_id: line.product_id.as_i32(),
            name: line.product_name.clone(),
            variant: line.variant_name.clone(),
            image_url: line.image_url.clone(),
            quantity: line.quantity,
            unit_price: money(line.unit_price, currency),
            line_total: money(line.line_total(), currency),
        }
    }
}

/// Cart display data for templates.
#[derive(Clone)]
pub struct CartView {
    pub lines: Vec<CartLineView>,
    pub item_count: u32,
    pub subtotal: String,
    pub delivery: String,
    pub total: String,
    pub is_guest: bool,
}

impl CartView {
    #[must_use]
    pub fn new(snapshot: &CartSnapshot, currency: CurrencyCode) -> Self {
        let subtotal = snapshot.subtotal();
        let delivery = snapshot.delivery_total();
        Self {
            lines: snapshot
                .lines
                .iter()
                .map(|l| CartLineView::new(l, currency))
                .collect(),
            item_count: snapshot.item_count(),
            subtotal: money(subtotal, currency),
            delivery: money(delivery, currency),
            total: money(subtotal + delivery, currency),
            is_guest: snapshot.source == CartSource::Guest,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub layout: Layout,
    pub cart: CartView,
}

// =============================================================================
// Forms
// =============================================================================

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: ProductId,
    #[serde(default)]
    pub variant_id: Option<VariantId>,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub return_to: Option<String>,
}

/// Update quantity form data.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub line_id: String,
    pub quantity: u32,
}

/// Remove line form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub line_id: String,
}

fn parse_line_id(raw: &str) -> Result<CartLineId, AppError> {
    CartLineId::parse(raw).ok_or_else(|| AppError::BadRequest("Invalid cart item".to_string()))
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the cart page.
///
/// # Errors
///
/// Returns an error if the server cart cannot be fetched.
#[instrument(skip(state, session, user, flashes))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    flashes: Flashes,
) -> Result<CartShowTemplate, AppError> {
    let mut cart = ActiveCart::resolve(&session, user.as_ref()).await;
    let snapshot = CartService::new(state.api()).load(cart.owner()).await?;

    Ok(CartShowTemplate {
        layout: Layout::new(user.as_ref(), flashes),
        cart: CartView::new(&snapshot, state.config().currency),
    })
}

/// Add a product to the cart.
///
/// # Errors
///
/// Returns an error for unknown products or variants, or when the session
/// cannot be saved.
#[instrument(skip(state, session, user), fields(product_id = %form.product_id))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Form(form): Form<AddToCartForm>,
) -> Result<Redirect, AppError> {
    let product = state.api().product(form.product_id).await?;
    let variant = match form.variant_id {
        Some(id) => Some(
            product
                .variant(id)
                .ok_or_else(|| AppError::BadRequest("Unknown product option".to_string()))?,
        ),
        None => None,
    };
    let quantity = form.quantity.unwrap_or(1);

    let mut cart = ActiveCart::resolve(&session, user.as_ref()).await;
    let result = CartService::new(state.api())
        .add(cart.owner(), &product, variant, quantity)
        .await;
    cart.persist(&session).await?;

    crate::error::add_breadcrumb(
        "cart",
        "Added to cart",
        &[("product_id", &product.id.to_string())],
    );
    report(&session, result, format!("Added {} to your cart", product.name)).await?;

    Ok(Redirect::to(&safe_return_to(
        form.return_to.as_deref(),
        "/cart",
    )))
}

/// Set a line's quantity.
///
/// # Errors
///
/// Returns an error for malformed line ids or session failures.
#[instrument(skip(state, session, user))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Form(form): Form<UpdateCartForm>,
) -> Result<Redirect, AppError> {
    let line_id = parse_line_id(&form.line_id)?;

    let mut cart = ActiveCart::resolve(&session, user.as_ref()).await;
    let result = CartService::new(state.api())
        .update_quantity(cart.owner(), &line_id, form.quantity)
        .await;
    cart.persist(&session).await?;

    report(&session, result, "Cart updated".to_string()).await?;
    Ok(Redirect::to("/cart"))
}

/// Remove one line.
///
/// # Errors
///
/// Returns an error for malformed line ids or session failures.
#[instrument(skip(state, session, user))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Form(form): Form<RemoveFromCartForm>,
) -> Result<Redirect, AppError> {
    let line_id = parse_line_id(&form.line_id)?;

    let mut cart = ActiveCart::resolve(&session, user.as_ref()).await;
    let result = CartService::new(state.api())
        .remove(cart.owner(), &line_id)
        .await;
    cart.persist(&session).await?;

    report(&session, result, "Item removed".to_string()).await?;
    Ok(Redirect::to("/cart"))
}

/// Empty the cart.
///
/// # Errors
///
/// Returns an error if the session cannot be saved.
#[instrument(skip(state, session, user))]
pub async fn clear(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<Redirect, AppError> {
    let mut cart = ActiveCart::resolve(&session, user.as_ref()).await;
    let result = CartService::new(state.api()).clear(cart.owner()).await;
    cart.persist(&session).await?;

    report(&session, result, "Cart cleared".to_string()).await?;
    Ok(Redirect::to("/cart"))
}
