//! Checkout pricing: subtotal, delivery, wallet and coupon discounts.
//!
//! ```text
//! subtotal = Σ(unit price × quantity)
//! delivery = Σ(delivery charge × quantity)
//! coupon   = coupon discount on subtotal
//! wallet   = min(wallet cap, requested), limited to what the coupon left
//! total    = clamp(subtotal + delivery − wallet − coupon, 0, subtotal + delivery)
//! ```

mod coupon;
mod wallet;

pub use coupon::{clear_applied_coupon, coupon_discount, load_applied_coupon, store_applied_coupon};
pub use wallet::{WalletBlocker, WalletEligibility};

use rust_decimal::Decimal;

use super::cart::CartSnapshot;
use crate::api::types::{CouponDiscount, WalletSettings};

/// Wallet inputs for a quote.
#[derive(Debug, Clone, Copy)]
pub struct WalletRequest<'a> {
    pub settings: &'a WalletSettings,
    pub balance: Decimal,
    /// Amount the shopper asked to redeem.
    pub requested: Decimal,
}

/// Priced checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutQuote {
    pub subtotal: Decimal,
    pub delivery: Decimal,
    pub coupon_discount: Decimal,
    pub wallet_discount: Decimal,
    pub total: Decimal,
    /// Wallet policy outcome, when a wallet was considered.
    pub wallet: Option<WalletEligibility>,
}

impl CheckoutQuote {
    /// Price the given cart lines.
    #[must_use]
    pub fn compute(
        cart: &CartSnapshot,
        coupon: Option<CouponDiscount>,
        wallet: Option<WalletRequest<'_>>,
    ) -> Self {
        let subtotal = cart.subtotal();
        let delivery = cart.delivery_total();
        let gross = subtotal + delivery;

        let coupon_discount = coupon.map_or(Decimal::ZERO, |c| coupon_discount(c, subtotal));

        let eligibility = wallet.map(|w| {
            WalletEligibility::evaluate(
                w.settings,
                w.balance,
                subtotal,
                cart.lines.iter().map(|l| l.category_id),
            )
        });
        let wallet_discount = match (wallet, &eligibility) {
            (Some(w), Some(e)) => {
                let remaining = (gross - coupon_discount).max(Decimal::ZERO);
                e.apply(w.requested).min(remaining)
            }
            _ => Decimal::ZERO,
        };

        let total = (gross - coupon_discount - wallet_discount).clamp(Decimal::ZERO, gross);

        Self {
            subtotal,
            delivery,
            coupon_discount,
            wallet_discount,
            total,
            wallet: eligibility,
        }
    }

    /// Total discount applied.
    #[must_use]
    pub fn savings(&self) -> Decimal {
        self.coupon_discount + self.wallet_discount
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::services::cart::GuestCart;
    use crate::services::cart::testing::product;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn cart(lines: &[(i32, i64, i64, u32)]) -> CartSnapshot {
        let mut cart = GuestCart::default();
        for &(id, price, delivery, qty) in lines {
            cart.add(&product(id, price, delivery), None, qty).unwrap();
        }
        cart.snapshot()
    }

    fn active() -> WalletSettings {
        WalletSettings {
            active: true,
            ..WalletSettings::default()
        }
    }

    #[test]
    fn test_plain_total() {
        let quote = CheckoutQuote::compute(&cart(&[(1, 100, 10, 2), (2, 50, 0, 1)]), None, None);
        assert_eq!(quote.subtotal, dec("250"));
        assert_eq!(quote.delivery, dec("20"));
        assert_eq!(quote.total, dec("270"));
        assert!(quote.wallet.is_none());
    }

    #[test]
    fn test_coupon_and_wallet() {
        let settings = active();
        let quote = CheckoutQuote::compute(
            &cart(&[(1, 1000, 40, 1)]),
            Some(CouponDiscount::Percentage(dec("10"))),
            Some(WalletRequest {
                settings: &settings,
                balance: dec("200"),
                requested: dec("200"),
            }),
        );

        assert_eq!(quote.coupon_discount, dec("100"));
        assert_eq!(quote.wallet_discount, dec("50"));
        // 1000 + 40 - 100 - 50
        assert_eq!(quote.total, dec("890"));
        assert_eq!(quote.savings(), dec("150"));
    }

    #[test]
    fn test_ineligible_wallet_contributes_nothing() {
        let settings = WalletSettings::default();
        let quote = CheckoutQuote::compute(
            &cart(&[(1, 1000, 0, 1)]),
            None,
            Some(WalletRequest {
                settings: &settings,
                balance: dec("200"),
                requested: dec("200"),
            }),
        );
        assert_eq!(quote.wallet_discount, Decimal::ZERO);
        assert_eq!(quote.total, dec("1000"));
        assert!(!quote.wallet.unwrap().is_eligible());
    }

    #[test]
    fn test_total_bounds() {
        let generous = WalletSettings {
            active: true,
            percentage_cap: dec("100"),
            ..WalletSettings::default()
        };
        let carts = [
            cart(&[]),
            cart(&[(1, 0, 0, 1)]),
            cart(&[(1, 5, 0, 1)]),
            cart(&[(1, 99, 15, 3), (2, 1, 1, 9)]),
        ];
        let coupons = [
            None,
            Some(CouponDiscount::Percentage(dec("100"))),
            Some(CouponDiscount::Percentage(dec("33"))),
            Some(CouponDiscount::Fixed(dec("10000"))),
        ];
        let requests = [dec("0"), dec("3"), dec("100000")];
        let standard = active();

        for cart in &carts {
            let gross = cart.subtotal() + cart.delivery_total();
            for coupon in coupons {
                for requested in requests {
                    for settings in [&generous, &standard] {
                        let quote = CheckoutQuote::compute(
                            cart,
                            coupon,
                            Some(WalletRequest {
                                settings,
                                balance: dec("100000"),
                                requested,
                            }),
                        );
                        assert!(quote.total >= Decimal::ZERO);
                        assert!(quote.total <= gross);
                        assert!(quote.wallet_discount <= quote.subtotal);
                    }
                }
            }
        }
    }
}
