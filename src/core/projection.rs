//! Month-by-month projection of a plan's income, expenses, savings, and interest.

use tracing::debug;
use uuid::Uuid;

use crate::{
    domain::{ExpenseFigures, FinancialPlan, InterestPolicy, PlanMonthlyBreakdown},
    errors::{Result, ValidationError},
};

/// Stateless projection utilities that operate over a [`FinancialPlan`].
pub struct ProjectionEngine;

impl ProjectionEngine {
    /// Builds one breakdown per month of the plan, ordered by `month_index`.
    ///
    /// `recorded` must hold one entry per month when the plan uses app expense data and is
    /// ignored otherwise.
    pub fn project(
        plan: &FinancialPlan,
        recorded: Option<&[ExpenseFigures]>,
    ) -> Result<Vec<PlanMonthlyBreakdown>> {
        if plan.duration_in_months == 0 {
            return Err(ValidationError::InvalidDuration(0).into());
        }
        let recorded = if plan.use_app_expense_data {
            let figures = recorded.unwrap_or_default();
            if figures.len() != plan.duration_in_months as usize {
                return Err(ValidationError::ExpenseFigureCount {
                    expected: plan.duration_in_months,
                    actual: figures.len(),
                }
                .into());
            }
            Some(figures)
        } else {
            None
        };

        let mut months: Vec<PlanMonthlyBreakdown> = (0..plan.duration_in_months)
            .map(|month_index| {
                let expenses = Self::month_expenses(plan, month_index, recorded);
                let mut breakdown = PlanMonthlyBreakdown {
                    id: Uuid::new_v4(),
                    plan_id: plan.id,
                    month_index,
                    month_start: plan.month_start(month_index),
                    projected_income: plan.monthly_income_at(month_index),
                    fixed_expenses: 0.0,
                    average_expenses: 0.0,
                    total_projected_expenses: 0.0,
                    net_amount: 0.0,
                    interest_earned: 0.0,
                    cumulative_net: 0.0,
                    is_manually_edited: false,
                };
                breakdown.set_expenses(expenses.fixed_expenses, expenses.average_expenses);
                breakdown
            })
            .collect();

        Self::roll_forward(plan.interest_policy(), 0.0, &mut months);
        Self::ensure_finite(&months)?;
        debug!(
            plan = %plan.id,
            months = months.len(),
            final_cumulative = months.last().map(|m| m.cumulative_net).unwrap_or_default(),
            "projected plan breakdowns"
        );
        Ok(months)
    }

    /// Expense figures for a month, inflation-adjusted when the plan applies inflation.
    ///
    /// Manual plans book the flat monthly estimate as average spending with no fixed part.
    pub fn month_expenses(
        plan: &FinancialPlan,
        month_index: u32,
        recorded: Option<&[ExpenseFigures]>,
    ) -> ExpenseFigures {
        match recorded {
            Some(figures) => figures
                .get(month_index as usize)
                .copied()
                .unwrap_or_default()
                .scaled(plan.inflation_factor(month_index)),
            None => ExpenseFigures::new(0.0, plan.manual_expenses_at(month_index)),
        }
    }

    /// Fails on the first month whose figures overflowed or became NaN.
    pub fn ensure_finite(months: &[PlanMonthlyBreakdown]) -> Result<()> {
        match months
            .iter()
            .find(|month| month.non_finite_field().is_some())
        {
            Some(month) => Err(ValidationError::NonFiniteProjection {
                month_index: month.month_index,
            }
            .into()),
            None => Ok(()),
        }
    }

    /// Rebuilds `interest_earned` and `cumulative_net` for a contiguous run of months.
    ///
    /// `prior_cumulative` is the stored cumulative value of the month before the run (zero
    /// when the run starts at month 0). Net amounts are taken as stored.
    pub fn roll_forward(
        policy: InterestPolicy,
        prior_cumulative: f64,
        months: &mut [PlanMonthlyBreakdown],
    ) -> f64 {
        let mut running = prior_cumulative;
        for month in months.iter_mut() {
            month.interest_earned = policy.accrue(running);
            running += month.net_amount + month.interest_earned;
            month.cumulative_net = running;
        }
        running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{plan::tests_support::plan_fixture, InterestType, PlanWithBreakdowns};

    fn scenario_a() -> FinancialPlan {
        let mut plan = plan_fixture(3);
        plan.monthly_income = 10_000.0;
        plan.manual_monthly_expenses = 6_000.0;
        plan
    }

    fn close(left: f64, right: f64) -> bool {
        (left - right).abs() < 1e-6
    }

    #[test]
    fn flat_plan_accumulates_net_savings() {
        let months = ProjectionEngine::project(&scenario_a(), None).unwrap();
        let cumulative: Vec<f64> = months.iter().map(|m| m.cumulative_net).collect();
        assert_eq!(cumulative, vec![4000.0, 8000.0, 12000.0]);
        assert!(months.iter().all(|m| m.net_amount == 4000.0));
        assert!(months.iter().all(|m| m.interest_earned == 0.0));
        assert_eq!(
            months.iter().map(|m| m.month_index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn simple_interest_accrues_on_prior_balance() {
        let mut plan = scenario_a();
        plan.is_interest_applied = true;
        plan.interest_type = InterestType::Simple;
        plan.interest_rate = 0.01;

        let months = ProjectionEngine::project(&plan, None).unwrap();
        assert_eq!(months[0].interest_earned, 0.0);
        assert_eq!(months[0].cumulative_net, 4000.0);
        assert!(close(months[1].interest_earned, 40.0));
        assert!(close(months[1].cumulative_net, 8040.0));
        assert!(close(months[2].interest_earned, 80.4));
        assert!(close(months[2].cumulative_net, 12120.4));
    }

    #[test]
    fn compound_interest_matches_chain_invariant() {
        let mut plan = plan_fixture(24);
        plan.is_interest_applied = true;
        plan.interest_type = InterestType::Compound;
        plan.interest_rate = 0.005;

        let months = ProjectionEngine::project(&plan, None).unwrap();
        assert_eq!(months.len(), 24);
        let composite = PlanWithBreakdowns::new(plan, months);
        assert!(composite.verify_chain().is_ok());
        let interest: Vec<f64> = composite
            .breakdowns
            .iter()
            .map(|m| m.interest_earned)
            .collect();
        assert!(interest.windows(2).all(|pair| pair[1] > pair[0]));
    }

    #[test]
    fn single_month_plan_has_one_breakdown() {
        let mut plan = plan_fixture(1);
        plan.is_interest_applied = true;
        plan.interest_rate = 0.05;
        let months = ProjectionEngine::project(&plan, None).unwrap();
        assert_eq!(months.len(), 1);
        assert_eq!(
            months[0].cumulative_net,
            months[0].net_amount + months[0].interest_earned
        );
    }

    #[test]
    fn losses_accrue_interest_as_debt() {
        let mut plan = plan_fixture(2);
        plan.monthly_income = 1000.0;
        plan.manual_monthly_expenses = 2000.0;
        plan.is_interest_applied = true;
        plan.interest_rate = 0.1;

        let months = ProjectionEngine::project(&plan, None).unwrap();
        assert_eq!(months[0].cumulative_net, -1000.0);
        assert!(close(months[1].interest_earned, -100.0));
        assert!(close(months[1].cumulative_net, -2100.0));
    }

    #[test]
    fn inflation_raises_income_and_expenses() {
        let mut plan = plan_fixture(3);
        plan.is_inflation_applied = true;
        plan.inflation_rate = 0.1;

        let months = ProjectionEngine::project(&plan, None).unwrap();
        assert!(close(months[2].projected_income, 1210.0));
        assert!(close(months[2].total_projected_expenses, 484.0));
        assert!(close(months[2].net_amount, 726.0));
    }

    #[test]
    fn recorded_expenses_drive_the_split() {
        let mut plan = plan_fixture(2);
        plan.use_app_expense_data = true;
        let figures = [ExpenseFigures::new(300.0, 200.0), ExpenseFigures::new(350.0, 150.0)];

        let months = ProjectionEngine::project(&plan, Some(&figures)).unwrap();
        assert_eq!(months[0].fixed_expenses, 300.0);
        assert_eq!(months[1].fixed_expenses, 350.0);
        assert_eq!(months[1].total_projected_expenses, 500.0);
        assert_eq!(months[1].cumulative_net, 1000.0);
    }

    #[test]
    fn recorded_expenses_must_cover_every_month() {
        let mut plan = plan_fixture(3);
        plan.use_app_expense_data = true;
        let err = ProjectionEngine::project(&plan, Some(&[ExpenseFigures::default()])).unwrap_err();
        assert!(matches!(
            err,
            crate::errors::PlanError::Validation(ValidationError::ExpenseFigureCount {
                expected: 3,
                actual: 1
            })
        ));
    }

    #[test]
    fn roll_forward_starts_from_given_predecessor() {
        let mut months = ProjectionEngine::project(&scenario_a(), None).unwrap();
        let tail = &mut months[1..];
        tail[0].net_amount = 3000.0;
        let last = ProjectionEngine::roll_forward(InterestPolicy::Disabled, 4000.0, tail);
        assert_eq!(last, 11000.0);
        assert_eq!(months[1].cumulative_net, 7000.0);
        assert_eq!(months[0].cumulative_net, 4000.0);
    }

    #[test]
    fn overflowing_inflation_is_rejected() {
        let mut plan = scenario_a();
        plan.duration_in_months = 360;
        plan.is_inflation_applied = true;
        plan.inflation_rate = 10.0;

        let err = ProjectionEngine::project(&plan, None).unwrap_err();
        assert!(matches!(
            err,
            crate::errors::PlanError::Validation(ValidationError::NonFiniteProjection { .. })
        ));
    }
}
