//! Promotion Budget Constraints
//!
//! A budget caps how many times and for how much total value a promotion may
//! redeem. Limits are configured on [`PromotionBudget`]; the running state
//! lives in a [`BudgetTracker`] scoped to one stack evaluation. Callers that
//! enforce ceilings across separate evaluations seed the initial consumption
//! from their durable redemption records before each call.

use rusty_money::{Money, iso::Currency};

/// Budget constraints for a promotion.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromotionBudget<'a> {
    /// Maximum number of applications (items or combos depending on promotion type).
    pub application_limit: Option<u32>,

    /// Maximum total discount value (original - discounted).
    pub monetary_limit: Option<Money<'a, Currency>>,

    /// Applications already consumed before this evaluation.
    pub initial_consumed_count: u32,

    /// Discount value already consumed before this evaluation.
    pub initial_consumed_amount: Option<Money<'a, Currency>>,
}

impl<'a> PromotionBudget<'a> {
    /// Create a budget with no constraints.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            application_limit: None,
            monetary_limit: None,
            initial_consumed_count: 0,
            initial_consumed_amount: None,
        }
    }

    /// Create a budget with an application limit only.
    #[must_use]
    pub const fn with_application_limit(limit: u32) -> Self {
        Self {
            application_limit: Some(limit),
            monetary_limit: None,
            initial_consumed_count: 0,
            initial_consumed_amount: None,
        }
    }

    /// Create a budget with a monetary limit only.
    #[must_use]
    pub const fn with_monetary_limit(limit: Money<'a, Currency>) -> Self {
        Self {
            application_limit: None,
            monetary_limit: Some(limit),
            initial_consumed_count: 0,
            initial_consumed_amount: None,
        }
    }

    /// Create a budget with both limits.
    #[must_use]
    pub const fn with_both_limits(applications: u32, monetary: Money<'a, Currency>) -> Self {
        Self {
            application_limit: Some(applications),
            monetary_limit: Some(monetary),
            initial_consumed_count: 0,
            initial_consumed_amount: None,
        }
    }

    /// Seed consumption carried over from earlier evaluations.
    #[must_use]
    pub const fn consumed(mut self, count: u32, amount: Option<Money<'a, Currency>>) -> Self {
        self.initial_consumed_count = count;
        self.initial_consumed_amount = amount;

        self
    }

    /// Check if this budget has any constraints.
    #[must_use]
    pub const fn has_constraints(&self) -> bool {
        self.application_limit.is_some() || self.monetary_limit.is_some()
    }

    /// Create the running tracker for one stack evaluation.
    #[must_use]
    pub fn tracker(&self) -> BudgetTracker {
        BudgetTracker {
            application_limit: self.application_limit,
            monetary_limit_minor: self.monetary_limit.map(|m| m.to_minor_units()),
            consumed_count: self.initial_consumed_count,
            consumed_minor: self
                .initial_consumed_amount
                .map_or(0, |m| m.to_minor_units()),
        }
    }
}

/// Running budget state for one promotion during one stack evaluation.
#[derive(Debug, Clone, Copy)]
pub struct BudgetTracker {
    application_limit: Option<u32>,
    monetary_limit_minor: Option<i64>,
    consumed_count: u32,
    consumed_minor: i64,
}

impl BudgetTracker {
    /// Attempt to consume one application worth `savings` of discount value.
    ///
    /// Gates in order: the application limit, then the monetary limit.
    /// Returns `false` and leaves the state unchanged when either limit would
    /// be exceeded. Rejection is a normal skip outcome, not an error.
    ///
    /// Negative savings, as produced by an override above the item's price,
    /// count as zero; they never widen monetary headroom.
    pub fn try_consume(&mut self, savings: &Money<'_, Currency>) -> bool {
        let savings_minor = savings.to_minor_units().max(0);

        if let Some(limit) = self.application_limit
            && self.consumed_count >= limit
        {
            return false;
        }

        if let Some(limit) = self.monetary_limit_minor
            && self.consumed_minor + savings_minor > limit
        {
            return false;
        }

        self.consumed_count += 1;
        self.consumed_minor += savings_minor;

        true
    }

    /// Applications consumed so far, including any seeded consumption.
    #[must_use]
    pub fn consumed_count(&self) -> u32 {
        self.consumed_count
    }

    /// Discount value consumed so far in minor units, including any seeded consumption.
    #[must_use]
    pub fn consumed_minor(&self) -> i64 {
        self.consumed_minor
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::GBP;

    use super::*;

    #[test]
    fn unlimited_budget_never_rejects() {
        let budget = PromotionBudget::unlimited();
        assert!(!budget.has_constraints());

        let mut tracker = budget.tracker();

        for _ in 0..1000 {
            assert!(tracker.try_consume(&Money::from_minor(1_000_000, GBP)));
        }
    }

    #[test]
    fn application_limit_rejects_after_limit_and_leaves_state_unchanged() {
        let budget = PromotionBudget::with_application_limit(1);
        let mut tracker = budget.tracker();

        assert!(tracker.try_consume(&Money::from_minor(50, GBP)));
        assert_eq!(tracker.consumed_count(), 1);
        assert_eq!(tracker.consumed_minor(), 50);

        assert!(!tracker.try_consume(&Money::from_minor(50, GBP)));
        assert_eq!(tracker.consumed_count(), 1);
        assert_eq!(tracker.consumed_minor(), 50);
    }

    #[test]
    fn monetary_limit_rejects_when_exceeded() {
        let budget = PromotionBudget::with_monetary_limit(Money::from_minor(100, GBP));
        let mut tracker = budget.tracker();

        assert!(tracker.try_consume(&Money::from_minor(60, GBP)));
        assert!(!tracker.try_consume(&Money::from_minor(50, GBP)), "60 + 50 > 100");
        assert!(tracker.try_consume(&Money::from_minor(40, GBP)), "60 + 40 == 100");
        assert_eq!(tracker.consumed_minor(), 100);
    }

    #[test]
    fn both_limits_gate_independently() {
        let budget = PromotionBudget::with_both_limits(2, Money::from_minor(100, GBP));
        let mut tracker = budget.tracker();

        assert!(tracker.try_consume(&Money::from_minor(90, GBP)));

        // Application limit not yet reached, but monetary limit blocks.
        assert!(!tracker.try_consume(&Money::from_minor(20, GBP)));

        assert!(tracker.try_consume(&Money::from_minor(10, GBP)));

        // Monetary limit not exceeded by a free application, but count blocks.
        assert!(!tracker.try_consume(&Money::from_minor(0, GBP)));
    }

    #[test]
    fn negative_savings_do_not_widen_monetary_headroom() {
        let budget = PromotionBudget::with_monetary_limit(Money::from_minor(100, GBP));
        let mut tracker = budget.tracker();

        // A price-raising override reports negative savings.
        assert!(tracker.try_consume(&Money::from_minor(-40, GBP)));
        assert_eq!(tracker.consumed_minor(), 0);

        assert!(tracker.try_consume(&Money::from_minor(100, GBP)));
        assert!(!tracker.try_consume(&Money::from_minor(1, GBP)));
    }

    #[test]
    fn seeded_consumption_counts_against_limits() {
        let budget = PromotionBudget::with_application_limit(2)
            .consumed(1, Some(Money::from_minor(30, GBP)));

        let mut tracker = budget.tracker();

        assert_eq!(tracker.consumed_count(), 1);
        assert_eq!(tracker.consumed_minor(), 30);

        assert!(tracker.try_consume(&Money::from_minor(10, GBP)));
        assert!(!tracker.try_consume(&Money::from_minor(10, GBP)));
    }
}
