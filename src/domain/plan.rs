use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::common::{shift_month, start_of_day, whole_months_between, CurrencyCode};

/// Formula used to accrue interest on the running plan balance.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum InterestType {
    #[default]
    Simple,
    Compound,
}

impl fmt::Display for InterestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            InterestType::Simple => "simple",
            InterestType::Compound => "compound",
        };
        f.write_str(label)
    }
}

/// Resolved interest behaviour for a plan, including the disabled case.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InterestPolicy {
    Disabled,
    Simple { rate: f64 },
    Compound { rate: f64 },
}

impl InterestPolicy {
    /// Interest accrued for one month on the balance carried into it.
    pub fn accrue(self, prior_balance: f64) -> f64 {
        match self {
            InterestPolicy::Disabled => 0.0,
            InterestPolicy::Simple { rate } => prior_balance * rate,
            // The carried balance already holds earlier interest, so growth compounds across months.
            InterestPolicy::Compound { rate } => prior_balance * ((1.0 + rate) - 1.0),
        }
    }
}

/// Immutable description of a financial plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinancialPlan {
    pub id: Uuid,
    pub name: String,
    pub start_date: NaiveDate,
    pub duration_in_months: u32,
    pub monthly_income: f64,
    pub manual_monthly_expenses: f64,
    pub use_app_expense_data: bool,
    pub is_inflation_applied: bool,
    pub inflation_rate: f64,
    pub is_interest_applied: bool,
    pub interest_rate: f64,
    pub interest_type: InterestType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub default_currency: CurrencyCode,
}

impl FinancialPlan {
    /// Date the plan finishes: `start_date` plus the plan's duration in calendar months.
    pub fn end_date(&self) -> NaiveDate {
        shift_month(self.start_date, self.duration_in_months as i32)
    }

    /// Calendar date on which the given month of the plan begins.
    pub fn month_start(&self, month_index: u32) -> NaiveDate {
        shift_month(self.start_date, month_index as i32)
    }

    /// True iff `now` lies strictly between the plan's start and end instants.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now > start_of_day(self.start_date) && now < start_of_day(self.end_date())
    }

    /// Months elapsed as of `now`, counting the current partial month.
    pub fn months_elapsed(&self, now: DateTime<Utc>) -> u32 {
        if now < start_of_day(self.start_date) {
            return 0;
        }
        if now > start_of_day(self.end_date()) {
            return self.duration_in_months;
        }
        let whole = whole_months_between(self.start_date, now.date_naive()) as u32;
        (whole + 1).min(self.duration_in_months)
    }

    /// Fraction of the plan elapsed as of `now`, in `[0, 1]`.
    pub fn progress_percentage(&self, now: DateTime<Utc>) -> f64 {
        let duration = self.duration_in_months.max(1) as f64;
        self.months_elapsed(now) as f64 / duration
    }

    pub fn interest_policy(&self) -> InterestPolicy {
        if !self.is_interest_applied {
            return InterestPolicy::Disabled;
        }
        match self.interest_type {
            InterestType::Simple => InterestPolicy::Simple {
                rate: self.interest_rate,
            },
            InterestType::Compound => InterestPolicy::Compound {
                rate: self.interest_rate,
            },
        }
    }

    /// Multiplier applied to month `month_index` amounts: `(1 + inflation)^m` when inflation is on.
    pub fn inflation_factor(&self, month_index: u32) -> f64 {
        if self.is_inflation_applied {
            (1.0 + self.inflation_rate).powi(month_index as i32)
        } else {
            1.0
        }
    }

    pub fn monthly_income_at(&self, month_index: u32) -> f64 {
        self.monthly_income * self.inflation_factor(month_index)
    }

    /// Flat manual expenses for the month, inflation-adjusted when inflation is on.
    pub fn manual_expenses_at(&self, month_index: u32) -> f64 {
        self.manual_monthly_expenses * self.inflation_factor(month_index)
    }

    pub fn total_expected_income(&self) -> f64 {
        if self.is_inflation_applied {
            (0..self.duration_in_months)
                .map(|month| self.monthly_income_at(month))
                .sum()
        } else {
            self.monthly_income * self.duration_in_months as f64
        }
    }
}

/// Caller-supplied parameters for creating a plan. Validated before anything is built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanParameters {
    pub name: String,
    pub start_date: NaiveDate,
    pub duration_in_months: i64,
    pub monthly_income: f64,
    #[serde(default)]
    pub manual_monthly_expenses: f64,
    #[serde(default)]
    pub use_app_expense_data: bool,
    #[serde(default)]
    pub is_inflation_applied: bool,
    #[serde(default)]
    pub inflation_rate: Option<f64>,
    #[serde(default)]
    pub is_interest_applied: bool,
    #[serde(default)]
    pub interest_rate: Option<f64>,
    #[serde(default)]
    pub interest_type: InterestType,
    #[serde(default)]
    pub default_currency: Option<CurrencyCode>,
}

impl PlanParameters {
    /// Parameters for a plain plan with manual expenses, no inflation, and no interest.
    pub fn new(
        name: impl Into<String>,
        start_date: NaiveDate,
        duration_in_months: i64,
        monthly_income: f64,
        manual_monthly_expenses: f64,
    ) -> Self {
        Self {
            name: name.into(),
            start_date,
            duration_in_months,
            monthly_income,
            manual_monthly_expenses,
            use_app_expense_data: false,
            is_inflation_applied: false,
            inflation_rate: None,
            is_interest_applied: false,
            interest_rate: None,
            interest_type: InterestType::default(),
            default_currency: None,
        }
    }

    pub fn with_inflation(mut self, rate: f64) -> Self {
        self.is_inflation_applied = true;
        self.inflation_rate = Some(rate);
        self
    }

    pub fn with_interest(mut self, interest_type: InterestType, rate: f64) -> Self {
        self.is_interest_applied = true;
        self.interest_type = interest_type;
        self.interest_rate = Some(rate);
        self
    }

    pub fn with_app_expense_data(mut self) -> Self {
        self.use_app_expense_data = true;
        self
    }

    pub fn with_currency(mut self, currency: CurrencyCode) -> Self {
        self.default_currency = Some(currency);
        self
    }
}


#[cfg(test)]
mod tests {
    use super::tests_support::plan_starting as plan;
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn end_date_uses_calendar_months() {
        let plan = plan(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(), 1);
        assert_eq!(plan.end_date(), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    }

    #[test]
    fn months_elapsed_counts_partial_month() {
        let plan = plan(NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(), 12);
        let before = Utc.with_ymd_and_hms(2024, 1, 5, 12, 0, 0).unwrap();
        let first_month = Utc.with_ymd_and_hms(2024, 1, 20, 12, 0, 0).unwrap();
        let third_month = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();

        assert_eq!(plan.months_elapsed(before), 0);
        assert_eq!(plan.months_elapsed(first_month), 1);
        assert_eq!(plan.months_elapsed(third_month), 3);
        assert_eq!(plan.months_elapsed(after), 12);
        assert_eq!(plan.progress_percentage(after), 1.0);
        assert_eq!(plan.progress_percentage(before), 0.0);
        assert!(plan.is_active(third_month));
        assert!(!plan.is_active(after));
    }

    #[test]
    fn activity_excludes_both_midnight_bounds() {
        let plan = plan(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), 2);
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();

        assert!(!plan.is_active(start));
        assert!(plan.is_active(start + chrono::Duration::seconds(1)));
        assert!(plan.is_active(end - chrono::Duration::seconds(1)));
        assert!(!plan.is_active(end));
    }

    #[test]
    fn inflation_adjusts_income_per_month() {
        let mut plan = plan(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), 3);
        assert_eq!(plan.total_expected_income(), 3000.0);

        plan.is_inflation_applied = true;
        plan.inflation_rate = 0.1;
        assert!((plan.monthly_income_at(2) - 1210.0).abs() < 1e-9);
        assert!((plan.total_expected_income() - 3310.0).abs() < 1e-9);
    }

    #[test]
    fn interest_policy_respects_toggle() {
        let mut plan = plan(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), 3);
        plan.interest_rate = 0.01;
        assert_eq!(plan.interest_policy(), InterestPolicy::Disabled);
        assert_eq!(plan.interest_policy().accrue(5000.0), 0.0);

        plan.is_interest_applied = true;
        plan.interest_type = InterestType::Compound;
        assert!((plan.interest_policy().accrue(8040.0) - 80.4).abs() < 1e-9);
        assert!((plan.interest_policy().accrue(-1000.0) + 10.0).abs() < 1e-9);
    }
}
