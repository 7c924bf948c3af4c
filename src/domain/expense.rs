use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::common::CurrencyCode;

/// An expense the user recorded in the app.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordedExpense {
    pub id: Uuid,
    pub amount: f64,
    pub currency: CurrencyCode,
    pub date: NaiveDate,
    /// Recurring expenses count as fixed costs; everything else is discretionary spending.
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default)]
    pub category: Option<String>,
}

impl RecordedExpense {
    pub fn new(amount: f64, currency: CurrencyCode, date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            amount,
            currency,
            date,
            is_recurring: false,
            category: None,
        }
    }

    pub fn recurring(mut self) -> Self {
        self.is_recurring = true;
        self
    }

    pub fn in_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// Aggregated monthly expense figures handed to the projection engine.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ExpenseFigures {
    pub fixed_expenses: f64,
    pub average_expenses: f64,
}

impl ExpenseFigures {
    pub fn new(fixed_expenses: f64, average_expenses: f64) -> Self {
        Self {
            fixed_expenses,
            average_expenses,
        }
    }

    pub fn total(&self) -> f64 {
        self.fixed_expenses + self.average_expenses
    }

    /// Scales both components, e.g. by an inflation factor.
    pub fn scaled(self, factor: f64) -> Self {
        Self {
            fixed_expenses: self.fixed_expenses * factor,
            average_expenses: self.average_expenses * factor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaling_keeps_the_split() {
        let figures = ExpenseFigures::new(200.0, 300.0).scaled(2.0);
        assert_eq!(figures, ExpenseFigures::new(400.0, 600.0));
        assert_eq!(figures.total(), 1000.0);
    }

    #[test]
    fn builders_mark_recurring_and_category() {
        let on = NaiveDate::from_ymd_opt(2024, 4, 2).unwrap();
        let expense = RecordedExpense::new(42.0, CurrencyCode::new("eur"), on)
            .recurring()
            .in_category("Rent");
        assert!(expense.is_recurring);
        assert_eq!(expense.category.as_deref(), Some("Rent"));
        assert_eq!(expense.currency.as_str(), "EUR");
    }
}
