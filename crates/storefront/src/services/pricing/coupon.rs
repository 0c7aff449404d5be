//! Coupon and voucher discounts.

use rust_decimal::Decimal;
use tower_sessions::Session;
use tracing::warn;

use super::wallet::round_money;
use crate::api::types::{Coupon, CouponDiscount};
use crate::models::session_keys;

/// Discount a coupon grants on a goods subtotal.
///
/// Percentages are clamped to 0-100 and never touch delivery charges.
/// Fixed amounts are capped at the subtotal.
#[must_use]
pub fn coupon_discount(discount: CouponDiscount, subtotal: Decimal) -> Decimal {
    let subtotal = subtotal.max(Decimal::ZERO);
    let amount = match discount {
        CouponDiscount::Percentage(percent) => {
            let percent = percent.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED);
            subtotal * percent / Decimal::ONE_HUNDRED
        }
        CouponDiscount::Fixed(amount) => amount.max(Decimal::ZERO),
    };
    round_money(amount).min(subtotal)
}

/// The coupon applied to this visitor's checkout, if any.
pub async fn load_applied_coupon(session: &Session) -> Option<Coupon> {
    session
        .get::<Coupon>(session_keys::APPLIED_COUPON)
        .await
        .unwrap_or_else(|e| {
            warn!(error = %e, "Discarding unreadable coupon");
            None
        })
}

/// Replace the applied coupon.
///
/// # Errors
///
/// Returns an error if the session store write fails.
pub async fn store_applied_coupon(
    session: &Session,
    coupon: &Coupon,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::APPLIED_COUPON, coupon).await
}

/// Drop the applied coupon.
///
/// # Errors
///
/// Returns an error if the session store write fails.
pub async fn clear_applied_coupon(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<Coupon>(session_keys::APPLIED_COUPON)
        .await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_percentage_of_subtotal() {
        let discount = coupon_discount(CouponDiscount::Percentage(dec("10")), dec("1299.50"));
        assert_eq!(discount, dec("129.95"));
    }

    #[test]
    fn test_percentage_rounds_half_up() {
        // 15% of 3.30 = 0.495
        let discount = coupon_discount(CouponDiscount::Percentage(dec("15")), dec("3.30"));
        assert_eq!(discount, dec("0.50"));
    }

    #[test]
    fn test_percentage_clamped() {
        assert_eq!(
            coupon_discount(CouponDiscount::Percentage(dec("150")), dec("80")),
            dec("80")
        );
        assert_eq!(
            coupon_discount(CouponDiscount::Percentage(dec("-5")), dec("80")),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_fixed_capped_at_subtotal() {
        assert_eq!(
            coupon_discount(CouponDiscount::Fixed(dec("500")), dec("120")),
            dec("120")
        );
        assert_eq!(
            coupon_discount(CouponDiscount::Fixed(dec("50")), dec("120")),
            dec("50")
        );
    }
}
