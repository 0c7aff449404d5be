//! Wallet redemption policy.

use rust_decimal::{Decimal, RoundingStrategy};

use tradepost_core::CategoryId;

use crate::api::types::WalletSettings;

/// Round a money amount to cents, halves away from zero.
pub(crate) fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Why the wallet cannot be used on an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletBlocker {
    SystemInactive,
    NoBalance,
    BelowMinCartValue,
    BelowMinDiscount,
    CategoryNotAllowed,
}

impl WalletBlocker {
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::SystemInactive => "Wallet payments are currently unavailable",
            Self::NoBalance => "Your wallet balance is empty",
            Self::BelowMinCartValue => "Your cart is below the minimum value for wallet use",
            Self::BelowMinDiscount => "The redeemable amount is below the minimum",
            Self::CategoryNotAllowed => "Some items in your cart cannot be paid with wallet credit",
        }
    }
}

/// Result of checking an order against the wallet policy.
///
/// Every check is kept separately so the checkout page can say which ones
/// failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletEligibility {
    pub system_active: bool,
    pub has_balance: bool,
    pub meets_min_cart_value: bool,
    pub meets_min_discount: bool,
    pub categories_allowed: bool,
    /// `min(percentage_cap% of order value, balance)`, truncated to cents.
    pub cap: Decimal,
}

impl WalletEligibility {
    /// Evaluate the policy for an order.
    ///
    /// `order_value` is the goods subtotal. `categories` yields the category
    /// of each cart line; uncategorised lines fail a non-empty allow-list.
    #[must_use]
    pub fn evaluate<I>(
        settings: &WalletSettings,
        balance: Decimal,
        order_value: Decimal,
        categories: I,
    ) -> Self
    where
        I: IntoIterator<Item = Option<CategoryId>>,
    {
        let balance = balance.max(Decimal::ZERO);
        let share = order_value.max(Decimal::ZERO) * settings.percentage_cap / Decimal::ONE_HUNDRED;
        let cap = share
            .min(balance)
            .round_dp_with_strategy(2, RoundingStrategy::ToZero);

        let categories_allowed = settings.allowed_categories.is_empty()
            || categories.into_iter().all(|category| {
                category.is_some_and(|id| settings.allowed_categories.contains(&id))
            });

        Self {
            system_active: settings.active,
            has_balance: balance > Decimal::ZERO,
            meets_min_cart_value: order_value >= settings.min_cart_value,
            meets_min_discount: cap > Decimal::ZERO && cap >= settings.min_discount_value,
            categories_allowed,
            cap,
        }
    }

    #[must_use]
    pub const fn is_eligible(&self) -> bool {
        self.system_active
            && self.has_balance
            && self.meets_min_cart_value
            && self.meets_min_discount
            && self.categories_allowed
    }

    /// Failed checks, in display order.
    #[must_use]
    pub fn blockers(&self) -> Vec<WalletBlocker> {
        [
            (self.system_active, WalletBlocker::SystemInactive),
            (self.has_balance, WalletBlocker::NoBalance),
            (self.meets_min_cart_value, WalletBlocker::BelowMinCartValue),
            (self.meets_min_discount, WalletBlocker::BelowMinDiscount),
            (self.categories_allowed, WalletBlocker::CategoryNotAllowed),
        ]
        .into_iter()
        .filter_map(|(ok, blocker)| (!ok).then_some(blocker))
        .collect()
    }

    /// Discount for a requested amount: `min(cap, requested)`, zero when
    /// ineligible, never negative.
    #[must_use]
    pub fn apply(&self, requested: Decimal) -> Decimal {
        if !self.is_eligible() {
            return Decimal::ZERO;
        }
        round_money(requested.max(Decimal::ZERO).min(self.cap))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn active() -> WalletSettings {
        WalletSettings {
            active: true,
            ..WalletSettings::default()
        }
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_cap_is_five_percent() {
        let eligibility =
            WalletEligibility::evaluate(&active(), dec("500"), dec("1000"), [None]);
        assert!(eligibility.is_eligible());
        assert_eq!(eligibility.cap, dec("50"));
        assert_eq!(eligibility.apply(dec("500")), dec("50"));
        assert_eq!(eligibility.apply(dec("20")), dec("20"));
    }

    #[test]
    fn test_cap_limited_by_balance() {
        let eligibility = WalletEligibility::evaluate(&active(), dec("12.5"), dec("1000"), [None]);
        assert_eq!(eligibility.cap, dec("12.50"));
        assert_eq!(eligibility.apply(dec("100")), dec("12.50"));
    }

    #[test]
    fn test_cap_truncates_to_cents() {
        // 5% of 333.33 = 16.6665
        let eligibility = WalletEligibility::evaluate(&active(), dec("100"), dec("333.33"), [None]);
        assert_eq!(eligibility.cap, dec("16.66"));
    }

    #[test]
    fn test_negative_request_is_zero() {
        let eligibility = WalletEligibility::evaluate(&active(), dec("100"), dec("1000"), [None]);
        assert_eq!(eligibility.apply(dec("-10")), Decimal::ZERO);
    }

    #[test]
    fn test_inactive_system() {
        let eligibility = WalletEligibility::evaluate(
            &WalletSettings::default(),
            dec("100"),
            dec("1000"),
            [None],
        );
        assert!(!eligibility.is_eligible());
        assert_eq!(eligibility.blockers(), vec![WalletBlocker::SystemInactive]);
        assert_eq!(eligibility.apply(dec("10")), Decimal::ZERO);
    }

    #[test]
    fn test_each_check_reported() {
        let settings = WalletSettings {
            active: true,
            min_cart_value: dec("2000"),
            min_discount_value: dec("10"),
            allowed_categories: vec![CategoryId::new(1)],
            ..WalletSettings::default()
        };

        let eligibility = WalletEligibility::evaluate(
            &settings,
            Decimal::ZERO,
            dec("100"),
            [Some(CategoryId::new(1)), Some(CategoryId::new(2))],
        );

        assert_eq!(
            eligibility.blockers(),
            vec![
                WalletBlocker::NoBalance,
                WalletBlocker::BelowMinCartValue,
                WalletBlocker::BelowMinDiscount,
                WalletBlocker::CategoryNotAllowed,
            ]
        );
    }

    #[test]
    fn test_category_allow_list() {
        let settings = WalletSettings {
            active: true,
            allowed_categories: vec![CategoryId::new(1), CategoryId::new(3)],
            ..WalletSettings::default()
        };

        let allowed = WalletEligibility::evaluate(
            &settings,
            dec("100"),
            dec("1000"),
            [Some(CategoryId::new(1)), Some(CategoryId::new(3))],
        );
        assert!(allowed.categories_allowed);

        let uncategorised =
            WalletEligibility::evaluate(&settings, dec("100"), dec("1000"), [None]);
        assert!(!uncategorised.categories_allowed);
    }

    #[test]
    fn test_discount_never_exceeds_default_cap() {
        let balances = ["0", "0.01", "3", "49.99", "50", "1000"];
        let values = ["0", "1", "19.99", "999.99", "1000", "25000.5"];
        let requests = ["0", "1", "10", "50", "100000"];

        for balance in balances {
            for value in values {
                let eligibility =
                    WalletEligibility::evaluate(&active(), dec(balance), dec(value), [None]);
                let limit = (dec(value) * dec("0.05")).min(dec(balance));
                for requested in requests {
                    let applied = eligibility.apply(dec(requested));
                    assert!(applied >= Decimal::ZERO);
                    assert!(
                        applied <= limit,
                        "balance {balance}, value {value}, requested {requested}: {applied} > {limit}"
                    );
                }
            }
        }
    }
}
