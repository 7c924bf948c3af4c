use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{common::amounts_match, plan::FinancialPlan};
use crate::errors::ValidationError;

/// Projected figures for one month of a plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanMonthlyBreakdown {
    pub id: Uuid,
    pub plan_id: Uuid,
    pub month_index: u32,
    pub month_start: NaiveDate,
    pub projected_income: f64,
    pub fixed_expenses: f64,
    pub average_expenses: f64,
    pub total_projected_expenses: f64,
    pub net_amount: f64,
    pub interest_earned: f64,
    pub cumulative_net: f64,
    #[serde(default)]
    pub is_manually_edited: bool,
}

impl PlanMonthlyBreakdown {
    /// Replaces the expense split and recomputes the month's net.
    pub fn set_expenses(&mut self, fixed_expenses: f64, average_expenses: f64) {
        self.fixed_expenses = fixed_expenses;
        self.average_expenses = average_expenses;
        self.total_projected_expenses = fixed_expenses + average_expenses;
        self.net_amount = self.projected_income - self.total_projected_expenses;
    }

    /// Name of the first amount field holding NaN or an infinity, if any.
    pub fn non_finite_field(&self) -> Option<&'static str> {
        [
            ("projected_income", self.projected_income),
            ("fixed_expenses", self.fixed_expenses),
            ("average_expenses", self.average_expenses),
            ("total_projected_expenses", self.total_projected_expenses),
            ("net_amount", self.net_amount),
            ("interest_earned", self.interest_earned),
            ("cumulative_net", self.cumulative_net),
        ]
        .into_iter()
        .find(|(_, amount)| !amount.is_finite())
        .map(|(name, _)| name)
    }

    /// Rejects a breakdown that JSON could not round-trip.
    pub fn ensure_finite(&self) -> Result<(), ValidationError> {
        match self.non_finite_field() {
            Some(field) => Err(ValidationError::NonFiniteAmount(field)),
            None => Ok(()),
        }
    }

    /// Applies a user override. Fields left unset are derived from the ones that were set:
    /// the expense total follows the split and the net follows income minus expenses.
    pub fn apply_edit(&mut self, edit: &BreakdownEdit) -> Result<(), ValidationError> {
        edit.ensure_finite()?;
        if let Some(income) = edit.projected_income {
            self.projected_income = income;
        }
        if let Some(fixed) = edit.fixed_expenses {
            self.fixed_expenses = fixed;
        }
        if let Some(average) = edit.average_expenses {
            self.average_expenses = average;
        }
        self.total_projected_expenses = match edit.total_projected_expenses {
            Some(total) => total,
            None if edit.fixed_expenses.is_some() || edit.average_expenses.is_some() => {
                self.fixed_expenses + self.average_expenses
            }
            None => self.total_projected_expenses,
        };
        self.net_amount = match edit.net_amount {
            Some(net) => net,
            None => self.projected_income - self.total_projected_expenses,
        };
        self.is_manually_edited = true;
        Ok(())
    }
}

/// Partial override of a month's projected figures.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BreakdownEdit {
    pub projected_income: Option<f64>,
    pub fixed_expenses: Option<f64>,
    pub average_expenses: Option<f64>,
    pub total_projected_expenses: Option<f64>,
    pub net_amount: Option<f64>,
}

impl BreakdownEdit {
    pub fn net_amount(net: f64) -> Self {
        Self {
            net_amount: Some(net),
            ..Self::default()
        }
    }

    fn ensure_finite(&self) -> Result<(), ValidationError> {
        let fields = [
            ("projected_income", self.projected_income),
            ("fixed_expenses", self.fixed_expenses),
            ("average_expenses", self.average_expenses),
            ("total_projected_expenses", self.total_projected_expenses),
            ("net_amount", self.net_amount),
        ];
        for (name, value) in fields {
            if value.is_some_and(|amount| !amount.is_finite()) {
                return Err(ValidationError::NonFiniteAmount(name));
            }
        }
        Ok(())
    }
}

/// First month whose stored cumulative value breaks the running-total chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainViolation {
    pub month_index: u32,
    pub expected: f64,
    pub actual: f64,
}

/// Aggregate figures across a whole plan.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanSummary {
    pub total_projected_income: f64,
    pub total_projected_expenses: f64,
    pub total_interest_earned: f64,
    pub final_cumulative_net: f64,
    pub lowest_cumulative_net: f64,
    pub lowest_month_index: u32,
    pub manually_edited_months: usize,
}

/// A plan paired with its breakdowns ordered by month.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanWithBreakdowns {
    pub plan: FinancialPlan,
    pub breakdowns: Vec<PlanMonthlyBreakdown>,
}

impl PlanWithBreakdowns {
    pub fn new(plan: FinancialPlan, mut breakdowns: Vec<PlanMonthlyBreakdown>) -> Self {
        breakdowns.sort_by_key(|breakdown| breakdown.month_index);
        Self { plan, breakdowns }
    }

    pub fn breakdown(&self, month_index: u32) -> Option<&PlanMonthlyBreakdown> {
        self.breakdowns
            .iter()
            .find(|breakdown| breakdown.month_index == month_index)
    }

    /// Checks `cumulative[i] = cumulative[i-1] + net[i] + interest[i]` across the sequence.
    pub fn verify_chain(&self) -> Result<(), ChainViolation> {
        let mut running = 0.0;
        for breakdown in &self.breakdowns {
            let expected = running + breakdown.net_amount + breakdown.interest_earned;
            if !amounts_match(expected, breakdown.cumulative_net) {
                return Err(ChainViolation {
                    month_index: breakdown.month_index,
                    expected,
                    actual: breakdown.cumulative_net,
                });
            }
            running = breakdown.cumulative_net;
        }
        Ok(())
    }

    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary {
            total_projected_income: 0.0,
            total_projected_expenses: 0.0,
            total_interest_earned: 0.0,
            final_cumulative_net: 0.0,
            lowest_cumulative_net: 0.0,
            lowest_month_index: 0,
            manually_edited_months: 0,
        };
        for (position, breakdown) in self.breakdowns.iter().enumerate() {
            summary.total_projected_income += breakdown.projected_income;
            summary.total_projected_expenses += breakdown.total_projected_expenses;
            summary.total_interest_earned += breakdown.interest_earned;
            summary.final_cumulative_net = breakdown.cumulative_net;
            if position == 0 || breakdown.cumulative_net < summary.lowest_cumulative_net {
                summary.lowest_cumulative_net = breakdown.cumulative_net;
                summary.lowest_month_index = breakdown.month_index;
            }
            if breakdown.is_manually_edited {
                summary.manually_edited_months += 1;
            }
        }
        summary
    }

    /// Where `now` falls inside the plan, or `None` when the plan is not active.
    pub fn current_position(&self, now: DateTime<Utc>) -> Option<PlanCurrentPosition> {
        if !self.plan.is_active(now) {
            return None;
        }
        let months_elapsed = self.plan.months_elapsed(now);
        let current_month_index = months_elapsed
            .saturating_sub(1)
            .min(self.plan.duration_in_months.saturating_sub(1));
        let current = self.breakdown(current_month_index);
        Some(PlanCurrentPosition {
            plan_id: self.plan.id,
            as_of: now,
            current_month_index,
            months_elapsed,
            months_remaining: self.plan.duration_in_months - months_elapsed,
            progress: self.plan.progress_percentage(now),
            projected_cumulative_net: current.map(|breakdown| breakdown.cumulative_net),
        })
    }
}

/// Snapshot of where "now" falls within an active plan. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanCurrentPosition {
    pub plan_id: Uuid,
    pub as_of: DateTime<Utc>,
    pub current_month_index: u32,
    pub months_elapsed: u32,
    pub months_remaining: u32,
    pub progress: f64,
    pub projected_cumulative_net: Option<f64>,
}
