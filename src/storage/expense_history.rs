use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;

use super::ExpenseDataSource;
use crate::{
    config::Config,
    core::time::Clock,
    domain::{common::shift_month, ExpenseFigures, FinancialPlan, RecordedExpense},
    errors::Result,
};

/// Expense data source backed by the expenses the user recorded.
///
/// A plan month that has already closed and holds recorded expenses reports its actual
/// totals. Any other month reports the mean monthly totals of the lookback window before
/// the plan starts. Only expenses in the plan's currency are counted.
pub struct ExpenseHistory {
    expenses: RwLock<Vec<RecordedExpense>>,
    lookback_months: u32,
    clock: Arc<dyn Clock>,
}

impl ExpenseHistory {
    pub fn new(lookback_months: u32, clock: Arc<dyn Clock>) -> Self {
        Self {
            expenses: RwLock::new(Vec::new()),
            lookback_months: lookback_months.max(1),
            clock,
        }
    }

    pub fn from_config(config: &Config, clock: Arc<dyn Clock>) -> Self {
        Self::new(config.expense_lookback_months, clock)
    }

    pub async fn record(&self, expense: RecordedExpense) {
        self.expenses.write().await.push(expense);
    }

    pub async fn record_all(&self, expenses: impl IntoIterator<Item = RecordedExpense>) {
        self.expenses.write().await.extend(expenses);
    }

    pub async fn len(&self) -> usize {
        self.expenses.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.expenses.read().await.is_empty()
    }

    /// Actual totals for `[start, end)`, or `None` when nothing was recorded there.
    async fn totals_between(
        &self,
        plan: &FinancialPlan,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Option<ExpenseFigures> {
        let expenses = self.expenses.read().await;
        let mut figures = ExpenseFigures::default();
        let mut seen = false;
        for expense in expenses.iter().filter(|expense| {
            expense.currency == plan.default_currency && expense.date >= start && expense.date < end
        }) {
            seen = true;
            if expense.is_recurring {
                figures.fixed_expenses += expense.amount;
            } else {
                figures.average_expenses += expense.amount;
            }
        }
        seen.then_some(figures)
    }

    async fn lookback_average(&self, plan: &FinancialPlan) -> ExpenseFigures {
        let window_start = shift_month(plan.start_date, -(self.lookback_months as i32));
        let months = self.lookback_months as f64;
        self.totals_between(plan, window_start, plan.start_date)
            .await
            .map(|totals| {
                ExpenseFigures::new(totals.fixed_expenses / months, totals.average_expenses / months)
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl ExpenseDataSource for ExpenseHistory {
    async fn monthly_expenses(
        &self,
        plan: &FinancialPlan,
        month_index: u32,
    ) -> Result<ExpenseFigures> {
        let month_start = plan.month_start(month_index);
        let month_end = plan.month_start(month_index + 1);
        if month_end <= self.clock.today() {
            if let Some(actual) = self.totals_between(plan, month_start, month_end).await {
                return Ok(actual);
            }
        }
        Ok(self.lookback_average(plan).await)
    }
}
