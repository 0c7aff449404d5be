//! Account route handlers: profile, order history, wallet and address book.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    response::Redirect,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, instrument};

use tradepost_core::{AddressId, CurrencyCode, PaymentStatus, Phone, WalletTransactionKind};

use super::{Layout, flash_failure, money};
use crate::api::types::{
    Address, Order, UpdateProfileRequest, User, WalletSettings, WalletTransaction,
};
use crate::error::AppError;
use crate::middleware::{Flash, Flashes, RequireAuth, push_flash, set_current_user};
use crate::models::CurrentUser;
use crate::services::address::AddressForm;
use crate::services::auth::validate_name;
use crate::services::cart::{CartOwner, CartService};
use crate::services::pricing::WalletEligibility;
use crate::state::AppState;

// =============================================================================
// Views
// =============================================================================

/// Placed order display data, shared with the confirmation page.
#[derive(Clone)]
pub struct OrderView {
    pub id: i32,
    pub placed_on: String,
    pub status: &'static str,
    pub payment_method: &'static str,
    pub paid: bool,
    pub items: Vec<OrderItemView>,
    pub subtotal: String,
    pub delivery: String,
    pub coupon_discount: Option<String>,
    pub wallet_discount: Option<String>,
    pub total: String,
    pub ship_to: String,
    pub payment_url: Option<String>,
}

#[derive(Clone)]
pub struct OrderItemView {
    pub name: String,
    pub variant: Option<String>,
    pub quantity: u32,
    pub line_total: String,
}

/// Format a discount, hiding zero amounts.
fn discount(amount: Decimal, currency: CurrencyCode) -> Option<String> {
    (amount > Decimal::ZERO).then(|| format!("-{}", money(amount, currency)))
}

impl OrderView {
    #[must_use]
    pub fn new(order: &Order, currency: CurrencyCode) -> Self {
        let address = &order.shipping_address;
        Self {
            id: order.id.as_i32(),
            placed_on: order.created_at.format("%d %b %Y").to_string(),
            status: order.status.label(),
            payment_method: order.payment_method.label(),
            paid: order.payment_status == PaymentStatus::Paid,
            items: order
                .items
                .iter()
                .map(|item| OrderItemView {
                    name: item.product_name.clone(),
                    variant: item.variant_name.clone(),
                    quantity: item.quantity,
                    line_total: money(item.unit_price * Decimal::from(item.quantity), currency),
                })
                .collect(),
            subtotal: money(order.subtotal, currency),
            delivery: money(order.delivery_charge, currency),
            coupon_discount: discount(order.coupon_discount, currency),
            wallet_discount: discount(order.wallet_discount, currency),
            total: money(order.total, currency),
            ship_to: format!(
                "{}, {}, {} {}",
                address.full_name, address.city, address.state, address.postal_code
            ),
            payment_url: order
                .payment_url
                .clone()
                .filter(|_| order.payment_status != PaymentStatus::Paid),
        }
    }
}

/// Saved address display data.
#[derive(Clone)]
pub struct AddressView {
    pub id: i32,
    pub full_name: String,
    pub phone: String,
    pub line1: String,
    pub line2: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub is_default: bool,
}

impl From<&Address> for AddressView {
    fn from(address: &Address) -> Self {
        let fields = &address.fields;
        Self {
            id: address.id.as_i32(),
            full_name: fields.full_name.clone(),
            phone: fields.phone.to_string(),
            line1: fields.line1.clone(),
            line2: fields.line2.clone().unwrap_or_default(),
            city: fields.city.clone(),
            state: fields.state.clone(),
            postal_code: fields.postal_code.clone(),
            is_default: fields.is_default,
        }
    }
}

impl AddressView {
    /// One-line summary for address pickers.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{}, {}, {}, {} {}",
            self.full_name, self.line1, self.city, self.state, self.postal_code
        )
    }
}

#[derive(Clone)]
pub struct TransactionView {
    pub date: String,
    pub description: String,
    pub amount: String,
    pub is_credit: bool,
}

impl TransactionView {
    fn new(tx: &WalletTransaction, currency: CurrencyCode) -> Self {
        let is_credit = tx.kind == WalletTransactionKind::Credit;
        Self {
            date: tx.created_at.format("%d %b %Y").to_string(),
            description: tx
                .description
                .clone()
                .unwrap_or_else(|| String::from(if is_credit { "Credit" } else { "Redeemed" })),
            amount: format!(
                "{}{}",
                if is_credit { "+" } else { "-" },
                money(tx.amount.abs(), currency)
            ),
            is_credit,
        }
    }
}

/// Wallet redemption policy and how the current cart fares against it.
#[derive(Clone)]
pub struct WalletPolicyView {
    pub active: bool,
    pub percentage_cap: String,
    pub min_cart_value: String,
    pub min_discount_value: String,
    pub restricted_categories: bool,
    /// Redeemable on the current cart; `None` when the cart is empty.
    pub cart_cap: Option<String>,
    pub blockers: Vec<&'static str>,
}

impl WalletPolicyView {
    fn new(
        settings: &WalletSettings,
        eligibility: Option<&WalletEligibility>,
        currency: CurrencyCode,
    ) -> Self {
        Self {
            active: settings.active,
            percentage_cap: format!("{}%", settings.percentage_cap.normalize()),
            min_cart_value: money(settings.min_cart_value, currency),
            min_discount_value: money(settings.min_discount_value, currency),
            restricted_categories: !settings.allowed_categories.is_empty(),
            cart_cap: eligibility
                .filter(|e| e.is_eligible())
                .map(|e| money(e.cap, currency)),
            blockers: eligibility
                .map(|e| e.blockers().into_iter().map(|b| b.message()).collect())
                .unwrap_or_default(),
        }
    }
}

// =============================================================================
// Templates
// =============================================================================

#[derive(Template, WebTemplate)]
#[template(path = "account/index.html")]
pub struct ProfileTemplate {
    pub layout: Layout,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub is_seller: bool,
}

#[derive(Template, WebTemplate)]
#[template(path = "account/orders.html")]
pub struct OrdersTemplate {
    pub layout: Layout,
    pub orders: Vec<OrderView>,
}

#[derive(Template, WebTemplate)]
#[template(path = "account/wallet.html")]
pub struct WalletTemplate {
    pub layout: Layout,
    pub balance: String,
    pub transactions: Vec<TransactionView>,
    pub policy: WalletPolicyView,
}

#[derive(Template, WebTemplate)]
#[template(path = "account/addresses.html")]
pub struct AddressesTemplate {
    pub layout: Layout,
    pub addresses: Vec<AddressView>,
}

// =============================================================================
// Forms
// =============================================================================

/// Profile form data.
#[derive(Debug, Deserialize)]
pub struct ProfileForm {
    pub name: String,
    #[serde(default)]
    pub phone: String,
}

impl ProfileForm {
    fn phone(&self) -> Result<Option<Phone>, AppError> {
        let phone = self.phone.trim();
        if phone.is_empty() {
            return Ok(None);
        }
        Phone::parse(phone)
            .map(Some)
            .map_err(|e| AppError::BadRequest(format!("Invalid phone number: {e}")))
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the profile page.
///
/// # Errors
///
/// Returns an error if the profile cannot be fetched.
#[instrument(skip(state, user, flashes), fields(user_id = %user.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    flashes: Flashes,
) -> Result<ProfileTemplate, AppError> {
    let profile: User = state.api().current_user(&user.api_session).await?;

    Ok(ProfileTemplate {
        layout: Layout::new(Some(&user), flashes),
        name: profile.name.unwrap_or_default(),
        email: profile.email.to_string(),
        phone: profile.phone.map(|p| p.to_string()).unwrap_or_default(),
        is_seller: profile.role.is_seller(),
    })
}

/// Update name and phone.
///
/// # Errors
///
/// Returns an error only when the backend session expired.
#[instrument(skip(state, session, user, form), fields(user_id = %user.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Form(form): Form<ProfileForm>,
) -> Result<Redirect, AppError> {
    let result = async {
        let name = validate_name(&form.name)?;
        let phone = form.phone()?;
        let updated = state
            .api()
            .update_profile(
                &user.api_session,
                &UpdateProfileRequest {
                    name,
                    phone: phone.as_ref(),
                },
            )
            .await?;
        set_current_user(&session, &CurrentUser::new(updated, user.api_session.clone())).await?;
        Ok::<_, AppError>(())
    }
    .await;

    match result {
        Ok(()) => {
            info!("Profile updated");
            push_flash(&session, Flash::success("Profile updated")).await;
        }
        Err(e) => flash_failure(&session, e).await?,
    }
    Ok(Redirect::to("/account"))
}

/// Display order history.
///
/// # Errors
///
/// Returns an error if the orders cannot be fetched.
#[instrument(skip(state, user, flashes), fields(user_id = %user.id))]
pub async fn orders(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    flashes: Flashes,
) -> Result<OrdersTemplate, AppError> {
    let currency = state.config().currency;
    let orders = state.api().orders(&user.api_session).await?;

    Ok(OrdersTemplate {
        layout: Layout::new(Some(&user), flashes),
        orders: orders.iter().map(|o| OrderView::new(o, currency)).collect(),
    })
}

/// Display wallet balance, ledger and the redemption policy applied to the
/// current cart.
///
/// # Errors
///
/// Returns an error if the wallet or cart cannot be fetched.
#[instrument(skip(state, user, flashes), fields(user_id = %user.id))]
pub async fn wallet(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    flashes: Flashes,
) -> Result<WalletTemplate, AppError> {
    let api = state.api();
    let currency = state.config().currency;
    let (wallet, settings) = tokio::try_join!(
        api.wallet(&user.api_session),
        api.wallet_settings(&user.api_session)
    )?;

    let cart = CartService::new(api)
        .load(CartOwner::Member(&user.api_session))
        .await?;
    let eligibility = (!cart.is_empty()).then(|| {
        WalletEligibility::evaluate(
            &settings,
            wallet.balance,
            cart.subtotal(),
            cart.lines.iter().map(|l| l.category_id),
        )
    });

    Ok(WalletTemplate {
        layout: Layout::new(Some(&user), flashes),
        balance: money(wallet.balance, currency),
        transactions: wallet
            .transactions
            .iter()
            .map(|tx| TransactionView::new(tx, currency))
            .collect(),
        policy: WalletPolicyView::new(&settings, eligibility.as_ref(), currency),
    })
}

/// Display the address book.
///
/// # Errors
///
/// Returns an error if the addresses cannot be fetched.
#[instrument(skip(state, user, flashes), fields(user_id = %user.id))]
pub async fn addresses(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    flashes: Flashes,
) -> Result<AddressesTemplate, AppError> {
    let addresses = state.api().addresses(&user.api_session).await?;

    Ok(AddressesTemplate {
        layout: Layout::new(Some(&user), flashes),
        addresses: addresses.iter().map(AddressView::from).collect(),
    })
}

/// Save a new address.
///
/// # Errors
///
/// Returns an error only when the backend session expired.
#[instrument(skip(state, session, user, form), fields(user_id = %user.id))]
pub async fn create_address(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Form(form): Form<AddressForm>,
) -> Result<Redirect, AppError> {
    let result = async {
        let input = form.validate().map_err(|e| AppError::BadRequest(capitalize(&e.to_string())))?;
        state.api().create_address(&user.api_session, &input).await?;
        Ok::<_, AppError>(())
    }
    .await;

    finish(&session, result, "Address saved").await
}

/// Replace a saved address.
///
/// # Errors
///
/// Returns an error only when the backend session expired.
#[instrument(skip(state, session, user, form), fields(user_id = %user.id, address_id = %id))]
pub async fn update_address(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(id): Path<AddressId>,
    Form(form): Form<AddressForm>,
) -> Result<Redirect, AppError> {
    let result = async {
        let input = form.validate().map_err(|e| AppError::BadRequest(capitalize(&e.to_string())))?;
        state.api().update_address(&user.api_session, id, &input).await?;
        Ok::<_, AppError>(())
    }
    .await;

    finish(&session, result, "Address updated").await
}

/// Delete a saved address.
///
/// # Errors
///
/// Returns an error only when the backend session expired.
#[instrument(skip(state, session, user), fields(user_id = %user.id, address_id = %id))]
pub async fn delete_address(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Path(id): Path<AddressId>,
) -> Result<Redirect, AppError> {
    let result = state
        .api()
        .delete_address(&user.api_session, id)
        .await
        .map_err(AppError::from);

    finish(&session, result, "Address removed").await
}

async fn finish(
    session: &Session,
    result: Result<(), AppError>,
    success: &str,
) -> Result<Redirect, AppError> {
    match result {
        Ok(()) => push_flash(session, Flash::success(success)).await,
        Err(e) => flash_failure(session, e).await?,
    }
    Ok(Redirect::to("/account/addresses"))
}

fn capitalize(message: &str) -> String {
    let mut chars = message.chars();
    chars
        .next()
        .map_or_else(String::new, |first| first.to_uppercase().chain(chars).collect())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use chrono::{TimeZone, Utc};
    use tradepost_core::{CategoryId, OrderId, OrderStatus, PaymentMethod};

    use super::*;
    use crate::api::types::{AddressInput, OrderItem};

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn shipping() -> AddressInput {
        AddressInput {
            full_name: "Asha Rao".to_string(),
            phone: Phone::parse("+91 98765 43210").unwrap(),
            line1: "12 MG Road".to_string(),
            line2: None,
            city: "Bengaluru".to_string(),
            state: "Karnataka".to_string(),
            postal_code: "560001".to_string(),
            is_default: true,
        }
    }

    fn order(payment_status: PaymentStatus) -> Order {
        Order {
            id: OrderId::new(7),
            status: OrderStatus::Confirmed,
            payment_method: PaymentMethod::Online,
            payment_status,
            items: vec![OrderItem {
                product_id: tradepost_core::ProductId::new(1),
                product_name: "Basmati Rice".to_string(),
                variant_name: Some("5 kg".to_string()),
                quantity: 3,
                unit_price: dec("120.50"),
            }],
            subtotal: dec("361.50"),
            delivery_charge: dec("15"),
            wallet_discount: dec("18.07"),
            coupon_discount: Decimal::ZERO,
            total: dec("358.43"),
            shipping_address: shipping(),
            created_at: Utc.with_ymd_and_hms(2026, 3, 9, 10, 0, 0).unwrap(),
            payment_url: Some("https://pay.example/7".to_string()),
        }
    }

    #[test]
    fn test_order_view() {
        let view = OrderView::new(&order(PaymentStatus::Pending), CurrencyCode::INR);

        assert_eq!(view.placed_on, "09 Mar 2026");
        assert_eq!(view.status, "Confirmed");
        assert_eq!(view.items[0].line_total, "₹361.50");
        assert_eq!(view.wallet_discount.as_deref(), Some("-₹18.07"));
        assert!(view.coupon_discount.is_none());
        assert_eq!(view.ship_to, "Asha Rao, Bengaluru, Karnataka 560001");
        assert!(view.payment_url.is_some());
    }

    #[test]
    fn test_paid_order_hides_payment_link() {
        let view = OrderView::new(&order(PaymentStatus::Paid), CurrencyCode::INR);
        assert!(view.paid);
        assert!(view.payment_url.is_none());
    }

    #[test]
    fn test_wallet_policy_view() {
        let settings = WalletSettings {
            active: true,
            percentage_cap: dec("5.00"),
            min_cart_value: dec("500"),
            min_discount_value: Decimal::ZERO,
            allowed_categories: vec![CategoryId::new(1)],
        };
        let eligibility = WalletEligibility::evaluate(
            &settings,
            dec("100"),
            dec("200"),
            [Some(CategoryId::new(1))],
        );

        let view = WalletPolicyView::new(&settings, Some(&eligibility), CurrencyCode::INR);
        assert_eq!(view.percentage_cap, "5%");
        assert!(view.restricted_categories);
        assert!(view.cart_cap.is_none());
        assert_eq!(view.blockers.len(), 1);

        let empty_cart = WalletPolicyView::new(&settings, None, CurrencyCode::INR);
        assert!(empty_cart.blockers.is_empty());
    }

    #[test]
    fn test_profile_phone() {
        let blank = ProfileForm {
            name: "Asha".to_string(),
            phone: "  ".to_string(),
        };
        assert!(blank.phone().unwrap().is_none());

        let bad = ProfileForm {
            name: "Asha".to_string(),
            phone: "call me".to_string(),
        };
        assert!(bad.phone().is_err());
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("city is required"), "City is required");
        assert_eq!(capitalize(""), "");
    }
}
