//! Checkout route handlers.
//!
//! The checkout page and the order POST both price the order from the
//! current server cart. Totals are never read back from the form.

use std::str::FromStr;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use rust_decimal::Decimal;
use tower_sessions::Session;
use tracing::{debug, info, instrument, warn};

use tradepost_core::{AddressId, CartLineId, CurrencyCode, OrderId, PaymentMethod};

use super::account::{AddressView, OrderView};
use super::{Layout, flash_failure, money};
use crate::api::types::{Order, WalletSettings};
use crate::api::ApiClient;
use crate::error::{AppError, add_breadcrumb};
use crate::middleware::{Flash, Flashes, RequireAuth, push_flash};
use crate::models::CurrentUser;
use crate::services::address::AddressForm;
use crate::services::cart::{CartError, CartOwner, CartService, CartSnapshot};
use crate::services::checkout::{CheckoutError, OrderDraft, ShippingChoice};
use crate::services::pricing::{
    CheckoutQuote, WalletEligibility, WalletRequest, clear_applied_coupon, load_applied_coupon,
    store_applied_coupon,
};
use crate::state::AppState;

// =============================================================================
// Form parsing
// =============================================================================

/// Shipping address selected on the checkout form.
#[derive(Debug, Clone, Default)]
pub enum AddressChoice {
    #[default]
    None,
    Saved(AddressId),
    New(AddressForm),
}

/// Parsed checkout form.
///
/// Built from raw key/value pairs because each selected cart line is posted
/// as a repeated `item` field.
#[derive(Debug, Clone, Default)]
pub struct CheckoutForm {
    /// Selected lines; empty checks out the whole cart.
    pub items: Vec<CartLineId>,
    pub address: AddressChoice,
    pub payment_method: PaymentMethod,
    pub use_wallet: bool,
    /// Wallet amount to redeem; `None` redeems as much as the policy allows.
    pub wallet_amount: Option<Decimal>,
}

impl CheckoutForm {
    /// Parse checkout fields, ignoring unknown keys.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for malformed ids, payment methods or
    /// amounts.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Result<Self, AppError> {
        let mut form = Self::default();
        let mut address = AddressForm::default();
        let mut saved = None;
        let mut wants_new = false;

        for (key, value) in pairs {
            let trimmed = value.trim();
            match key.as_str() {
                "item" => form.items.push(
                    CartLineId::parse(trimmed).ok_or_else(|| bad("Invalid cart item"))?,
                ),
                "address_id" => match trimmed {
                    "" => {}
                    "new" => wants_new = true,
                    id => {
                        saved = Some(
                            AddressId::from_str(id).map_err(|_| bad("Invalid address"))?,
                        );
                    }
                },
                "payment_method" => {
                    form.payment_method = trimmed
                        .parse()
                        .map_err(|_| bad("Unknown payment method"))?;
                }
                "use_wallet" => form.use_wallet = true,
                "wallet_amount" if !trimmed.is_empty() => {
                    form.wallet_amount = Some(
                        Decimal::from_str(trimmed).map_err(|_| bad("Invalid wallet amount"))?,
                    );
                }
                "full_name" => address.full_name = value,
                "phone" => address.phone = value,
                "line1" => address.line1 = value,
                "line2" => address.line2 = value,
                "city" => address.city = value,
                "state" => address.state = value,
                "postal_code" => address.postal_code = value,
                "is_default" => address.is_default = Some(value),
                _ => {}
            }
        }

        form.address = match saved {
            Some(id) if !wants_new => AddressChoice::Saved(id),
            _ if wants_new || !address.is_blank() => AddressChoice::New(address),
            _ => AddressChoice::None,
        };
        Ok(form)
    }

    fn wallet_request<'a>(
        &self,
        settings: &'a WalletSettings,
        balance: Decimal,
    ) -> WalletRequest<'a> {
        WalletRequest {
            settings,
            balance,
            requested: self.wallet_amount.unwrap_or(balance),
        }
    }
}

fn bad(message: &str) -> AppError {
    AppError::BadRequest(message.to_string())
}

// =============================================================================
// Views
// =============================================================================

#[derive(Clone)]
pub struct CheckoutLineView {
    pub id: String,
    pub name: String,
    pub variant: Option<String>,
    pub quantity: u32,
    pub line_total: String,
    pub selected: bool,
}

#[derive(Clone)]
pub struct AddressOption {
    pub id: i32,
    pub summary: String,
    pub selected: bool,
}

/// Priced totals for templates.
#[derive(Clone)]
pub struct QuoteView {
    pub subtotal: String,
    pub delivery: String,
    pub coupon_discount: Option<String>,
    pub wallet_discount: Option<String>,
    pub savings: Option<String>,
    pub total: String,
}

impl QuoteView {
    #[must_use]
    pub fn new(quote: &CheckoutQuote, currency: CurrencyCode) -> Self {
        let minus = |amount: Decimal| {
            (amount > Decimal::ZERO).then(|| format!("-{}", money(amount, currency)))
        };
        Self {
            subtotal: money(quote.subtotal, currency),
            delivery: money(quote.delivery, currency),
            coupon_discount: minus(quote.coupon_discount),
            wallet_discount: minus(quote.wallet_discount),
            savings: (quote.savings() > Decimal::ZERO).then(|| money(quote.savings(), currency)),
            total: money(quote.total, currency),
        }
    }
}

/// Wallet panel on the checkout page.
#[derive(Clone)]
pub struct WalletPanel {
    pub balance: String,
    pub cap: String,
    pub eligible: bool,
    pub blockers: Vec<&'static str>,
    pub in_use: bool,
}

impl WalletPanel {
    fn new(
        eligibility: &WalletEligibility,
        balance: Decimal,
        in_use: bool,
        currency: CurrencyCode,
    ) -> Self {
        Self {
            balance: money(balance, currency),
            cap: money(eligibility.cap, currency),
            eligible: eligibility.is_eligible(),
            blockers: eligibility
                .blockers()
                .into_iter()
                .map(|b| b.message())
                .collect(),
            in_use: in_use && eligibility.is_eligible(),
        }
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "checkout/show.html")]
pub struct CheckoutTemplate {
    pub layout: Layout,
    pub lines: Vec<CheckoutLineView>,
    pub addresses: Vec<AddressOption>,
    pub new_address: bool,
    pub quote: QuoteView,
    pub wallet: WalletPanel,
    pub coupon_code: Option<String>,
    pub cash_on_delivery: bool,
}

#[derive(Template, WebTemplate)]
#[template(path = "orders/confirmation.html")]
pub struct ConfirmationTemplate {
    pub layout: Layout,
    pub order: OrderView,
}

fn address_options(views: &[AddressView], choice: &AddressChoice) -> Vec<AddressOption> {
    let chosen = match choice {
        AddressChoice::Saved(id) => Some(id.as_i32()),
        AddressChoice::New(_) => None,
        AddressChoice::None => views
            .iter()
            .find(|a| a.is_default)
            .or_else(|| views.first())
            .map(|a| a.id),
    };

    views
        .iter()
        .map(|a| AddressOption {
            id: a.id,
            summary: a.summary(),
            selected: chosen == Some(a.id),
        })
        .collect()
}

fn line_views(
    cart: &CartSnapshot,
    selection: &[CartLineId],
    currency: CurrencyCode,
) -> Vec<CheckoutLineView> {
    cart.lines
        .iter()
        .map(|line| CheckoutLineView {
            id: line.id.to_string(),
            name: line.product_name.clone(),
            variant: line.variant_name.clone(),
            quantity: line.quantity,
            line_total: money(line.line_total(), currency),
            selected: selection.is_empty() || selection.contains(&line.id),
        })
        .collect()
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the checkout form with a live quote.
///
/// Query parameters use the same names as the order form so "update totals"
/// can resubmit the current selection.
///
/// # Errors
///
/// Returns an error if the cart, addresses or wallet cannot be fetched.
#[instrument(skip(state, session, user, flashes, pairs), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    flashes: Flashes,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let form = CheckoutForm::from_pairs(pairs)?;
    let api = state.api();
    let currency = state.config().currency;
    let credentials = &user.api_session;

    let cart = CartService::new(api)
        .load(CartOwner::Member(credentials))
        .await?;
    if cart.is_empty() {
        push_flash(&session, Flash::info("Your cart is empty")).await;
        return Ok(Redirect::to("/cart").into_response());
    }
    let selected = cart.select(&form.items)?;

    let (addresses, wallet, settings) = tokio::try_join!(
        api.addresses(credentials),
        api.wallet(credentials),
        api.wallet_settings(credentials)
    )?;
    let coupon = load_applied_coupon(&session).await;

    let wallet_request = form.wallet_request(&settings, wallet.balance);
    let quote = CheckoutQuote::compute(
        &selected,
        coupon.as_ref().map(|c| c.discount),
        form.use_wallet.then_some(wallet_request),
    );
    let eligibility = quote.wallet.clone().unwrap_or_else(|| {
        WalletEligibility::evaluate(
            &settings,
            wallet.balance,
            selected.subtotal(),
            selected.lines.iter().map(|l| l.category_id),
        )
    });

    let address_views: Vec<AddressView> = addresses.iter().map(AddressView::from).collect();

    Ok(CheckoutTemplate {
        layout: Layout::new(Some(&user), flashes),
        lines: line_views(&cart, &form.items, currency),
        addresses: address_options(&address_views, &form.address),
        new_address: address_views.is_empty() || matches!(form.address, AddressChoice::New(_)),
        quote: QuoteView::new(&quote, currency),
        wallet: WalletPanel::new(&eligibility, wallet.balance, form.use_wallet, currency),
        coupon_code: coupon.map(|c| c.code),
        cash_on_delivery: form.payment_method == PaymentMethod::CashOnDelivery,
    }
    .into_response())
}

/// Coupon form data: the code plus the lines currently selected for
/// checkout, posted as repeated `item` fields.
#[derive(Debug, Clone, Default)]
pub struct CouponForm {
    pub code: String,
    pub items: Vec<CartLineId>,
}

impl CouponForm {
    /// Parse the coupon form, uppercasing the code.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for malformed line ids.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Result<Self, AppError> {
        let mut form = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "code" => form.code = value.trim().to_uppercase(),
                "item" => form.items.push(
                    CartLineId::parse(value.trim()).ok_or_else(|| bad("Invalid cart item"))?,
                ),
                _ => {}
            }
        }
        Ok(form)
    }
}

/// Subtotal of the lines a coupon will apply to.
fn selection_subtotal(cart: &CartSnapshot, items: &[CartLineId]) -> Result<Decimal, CartError> {
    Ok(cart.select(items)?.subtotal())
}

/// Checkout page URL that keeps the current line selection.
fn checkout_url(items: &[CartLineId]) -> String {
    if items.is_empty() {
        return "/checkout".to_string();
    }
    let query: Vec<String> = items.iter().map(|id| format!("item={id}")).collect();
    format!("/checkout?{}", query.join("&"))
}

/// Validate a coupon against the selected lines and remember it.
///
/// # Errors
///
/// Returns an error only when the backend session expired.
#[instrument(skip(state, session, user, pairs), fields(user_id = %user.id))]
pub async fn apply_coupon(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<Redirect, AppError> {
    let form = match CouponForm::from_pairs(pairs) {
        Ok(form) => form,
        Err(e) => {
            flash_failure(&session, e).await?;
            return Ok(Redirect::to("/checkout"));
        }
    };
    let back = checkout_url(&form.items);
    if form.code.is_empty() {
        push_flash(&session, Flash::error("Enter a coupon code")).await;
        return Ok(Redirect::to(&back));
    }

    let result = async {
        let api = state.api();
        let cart = CartService::new(api)
            .load(CartOwner::Member(&user.api_session))
            .await?;
        let subtotal = selection_subtotal(&cart, &form.items)?;
        let coupon = api
            .validate_coupon(&user.api_session, &form.code, subtotal)
            .await?;
        store_applied_coupon(&session, &coupon).await?;
        Ok::<_, AppError>(coupon)
    }
    .await;

    match result {
        Ok(coupon) => {
            info!(code = %coupon.code, "Coupon applied");
            push_flash(&session, Flash::success(format!("Coupon {} applied", coupon.code))).await;
        }
        Err(e) => flash_failure(&session, e).await?,
    }
    Ok(Redirect::to(&back))
}

/// Drop the applied coupon.
///
/// # Errors
///
/// Returns an error if the session cannot be saved.
#[instrument(skip_all)]
pub async fn remove_coupon(
    session: Session,
    RequireAuth(_user): RequireAuth,
) -> Result<Redirect, AppError> {
    clear_applied_coupon(&session).await?;
    push_flash(&session, Flash::info("Coupon removed")).await;
    Ok(Redirect::to("/checkout"))
}

/// Price, validate and place the order.
async fn submit_order(
    api: &ApiClient,
    session: &Session,
    user: &CurrentUser,
    form: CheckoutForm,
) -> Result<(Order, OrderDraft), CheckoutError> {
    let credentials = &user.api_session;
    let cart = CartService::new(api)
        .load(CartOwner::Member(credentials))
        .await?;

    let shipping = match &form.address {
        AddressChoice::None => None,
        AddressChoice::Saved(id) => api
            .addresses(credentials)
            .await?
            .into_iter()
            .find(|a| a.id == *id)
            .map(ShippingChoice::Saved),
        AddressChoice::New(fields) => Some(ShippingChoice::New(fields.validate()?)),
    };

    // Revalidated against the final selection, which may be smaller than
    // the one the coupon was applied to.
    let coupon = match load_applied_coupon(session).await {
        Some(applied) => {
            let subtotal = selection_subtotal(&cart, &form.items)?;
            Some(
                api.validate_coupon(credentials, &applied.code, subtotal)
                    .await?,
            )
        }
        None => None,
    };
    let wallet = if form.use_wallet {
        Some(tokio::try_join!(
            api.wallet(credentials),
            api.wallet_settings(credentials)
        )?)
    } else {
        None
    };

    let draft = OrderDraft::build(
        &cart,
        &form.items,
        shipping,
        form.payment_method,
        coupon.as_ref(),
        wallet
            .as_ref()
            .map(|(w, settings)| form.wallet_request(settings, w.balance)),
    )?;

    let order = api.create_order(credentials, &draft.request).await?;
    Ok((order, draft))
}

/// Place the order and redirect to its confirmation page.
///
/// # Errors
///
/// Returns an error when the backend session expired or the session store
/// fails; other failures return to the checkout page with a message.
#[instrument(skip(state, session, user, pairs), fields(user_id = %user.id))]
pub async fn place_order(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<Redirect, AppError> {
    let form = match CheckoutForm::from_pairs(pairs) {
        Ok(form) => form,
        Err(e) => {
            flash_failure(&session, e).await?;
            return Ok(Redirect::to("/checkout"));
        }
    };

    let api = state.api();
    match submit_order(api, &session, &user, form).await {
        Ok((order, draft)) => {
            info!(
                order_id = %order.id,
                lines = draft.lines.lines.len(),
                total = %draft.quote.total,
                "Order placed"
            );
            add_breadcrumb("checkout", "Order placed", &[("order_id", &order.id.to_string())]);

            clear_applied_coupon(&session).await?;
            match api.cart(&user.api_session).await {
                Ok(cart) => debug!(remaining = cart.items.len(), "Cart refreshed after order"),
                Err(e) => warn!(error = %e, "Failed to refresh cart after order"),
            }

            Ok(Redirect::to(&format!("/orders/{}/confirmation", order.id)))
        }
        Err(e) => {
            info!(error = %e, "Checkout rejected");
            flash_failure(&session, e.into()).await?;
            Ok(Redirect::to("/checkout"))
        }
    }
}

/// Display a placed order.
///
/// # Errors
///
/// Returns `AppError::Api(NotFound)` for orders of other users.
#[instrument(skip(state, user, flashes), fields(user_id = %user.id, order_id = %id))]
pub async fn confirmation(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    flashes: Flashes,
    Path(id): Path<OrderId>,
) -> Result<ConfirmationTemplate, AppError> {
    let order = state.api().order(&user.api_session, id).await?;

    Ok(ConfirmationTemplate {
        layout: Layout::new(Some(&user), flashes),
        order: OrderView::new(&order, state.config().currency),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_parse_selection_and_saved_address() {
        let form = CheckoutForm::from_pairs(pairs(&[
            ("item", "11"),
            ("item", "12"),
            ("address_id", "4"),
            ("payment_method", "online"),
            ("use_wallet", "on"),
            ("wallet_amount", ""),
        ]))
        .unwrap();

        assert_eq!(form.items.len(), 2);
        assert!(matches!(form.address, AddressChoice::Saved(id) if id.as_i32() == 4));
        assert_eq!(form.payment_method, PaymentMethod::Online);
        assert!(form.use_wallet);
        assert!(form.wallet_amount.is_none());
    }

    #[test]
    fn test_parse_new_address() {
        let form = CheckoutForm::from_pairs(pairs(&[
            ("address_id", "new"),
            ("full_name", "Asha Rao"),
            ("city", "Bengaluru"),
            ("wallet_amount", "12.50"),
        ]))
        .unwrap();

        let AddressChoice::New(address) = form.address else {
            panic!("expected a new address");
        };
        assert_eq!(address.full_name, "Asha Rao");
        assert_eq!(form.wallet_amount, Some(Decimal::new(1250, 2)));
        assert_eq!(form.payment_method, PaymentMethod::CashOnDelivery);
    }

    #[test]
    fn test_parse_defaults_and_errors() {
        let empty = CheckoutForm::from_pairs(Vec::new()).unwrap();
        assert!(empty.items.is_empty());
        assert!(matches!(empty.address, AddressChoice::None));

        assert!(CheckoutForm::from_pairs(pairs(&[("item", "x")])).is_err());
        assert!(CheckoutForm::from_pairs(pairs(&[("payment_method", "barter")])).is_err());
        assert!(CheckoutForm::from_pairs(pairs(&[("wallet_amount", "lots")])).is_err());
    }

    #[test]
    fn test_coupon_form_keeps_selection() {
        let form = CouponForm::from_pairs(pairs(&[
            ("code", " save10 "),
            ("item", "11"),
            ("item", "g-2-0"),
        ]))
        .unwrap();

        assert_eq!(form.code, "SAVE10");
        assert_eq!(form.items.len(), 2);
        assert_eq!(checkout_url(&form.items), "/checkout?item=11&item=g-2-0");
        assert_eq!(checkout_url(&[]), "/checkout");
        assert!(CouponForm::from_pairs(pairs(&[("item", "??")])).is_err());
    }

    #[test]
    fn test_coupon_subtotal_uses_selection() {
        use crate::services::cart::GuestCart;
        use crate::services::cart::testing::product;

        let mut guest = GuestCart::default();
        let tea = product(1, 100, 10);
        let rice = product(2, 400, 20);
        guest.add(&tea, None, 1).unwrap();
        guest.add(&rice, None, 1).unwrap();
        let cart = guest.snapshot();

        assert_eq!(selection_subtotal(&cart, &[]).unwrap(), Decimal::from(500));

        let tea_only = [cart.lines[0].id.clone()];
        assert_eq!(
            selection_subtotal(&cart, &tea_only).unwrap(),
            Decimal::from(100)
        );

        let stale = [CartLineId::parse("g-9-0").unwrap()];
        assert!(selection_subtotal(&cart, &stale).is_err());
    }

    #[test]
    fn test_default_address_preselected() {
        let view = |id: i32, is_default: bool| AddressView {
            id,
            full_name: "Asha Rao".to_string(),
            phone: "+919876543210".to_string(),
            line1: "12 MG Road".to_string(),
            line2: String::new(),
            city: "Bengaluru".to_string(),
            state: "Karnataka".to_string(),
            postal_code: "560001".to_string(),
            is_default,
        };
        let views = vec![view(1, false), view(2, true)];

        let options = address_options(&views, &AddressChoice::None);
        assert!(!options[0].selected);
        assert!(options[1].selected);

        let options = address_options(&views, &AddressChoice::Saved(AddressId::new(1)));
        assert!(options[0].selected);
    }
}
