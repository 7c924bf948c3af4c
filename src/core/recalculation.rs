//! Downstream-only recalculation after a month has been edited.

use tracing::{debug, warn};

use super::{projection::ProjectionEngine, storage::PlanStore};
use crate::{
    domain::{FinancialPlan, PlanMonthlyBreakdown},
    errors::{PlanError, Result, ValidationError},
};

/// Rebuilds interest and cumulative figures from an edited month to the end of its plan.
pub struct RecalculationService;

impl RecalculationService {
    /// Stores `edited` and walks forward to the last month, rewriting each later month's
    /// interest and cumulative net. Months before the edited one are never written.
    ///
    /// Returns the plan's full breakdown list as it stands after the walk. A failed write
    /// stops the walk; months already written stay updated, and rerunning the call is safe
    /// because it always restarts from the stored predecessor.
    pub async fn recalculate(
        store: &dyn PlanStore,
        plan: &FinancialPlan,
        edited: &PlanMonthlyBreakdown,
    ) -> Result<Vec<PlanMonthlyBreakdown>> {
        if edited.plan_id != plan.id {
            return Err(ValidationError::ForeignBreakdown {
                breakdown: edited.id,
                plan: plan.id,
            }
            .into());
        }

        let mut months = store.fetch_breakdowns(plan.id).await?;
        let position = months
            .iter()
            .position(|month| month.id == edited.id)
            .ok_or(PlanError::BreakdownNotFound(edited.id))?;

        let stored_index = months[position].month_index;
        months[position] = PlanMonthlyBreakdown {
            month_index: stored_index,
            month_start: months[position].month_start,
            ..edited.clone()
        };

        Self::walk_from(store, plan, &mut months, position).await?;
        debug!(
            plan = %plan.id,
            month = stored_index,
            rewritten = months.len() - position,
            "recalculated breakdowns after edit"
        );
        Ok(months)
    }

    /// Recomputes the whole chain from month 0 and persists every month.
    pub async fn rebuild(
        store: &dyn PlanStore,
        plan: &FinancialPlan,
        months: &mut [PlanMonthlyBreakdown],
    ) -> Result<()> {
        Self::walk_from(store, plan, months, 0).await
    }

    async fn walk_from(
        store: &dyn PlanStore,
        plan: &FinancialPlan,
        months: &mut [PlanMonthlyBreakdown],
        position: usize,
    ) -> Result<()> {
        let prior_cumulative = match position {
            0 => 0.0,
            _ => months[position - 1].cumulative_net,
        };
        let tail = &mut months[position..];
        ProjectionEngine::roll_forward(plan.interest_policy(), prior_cumulative, tail);
        ProjectionEngine::ensure_finite(tail)?;

        for month in tail.iter() {
            if let Err(err) = store.update_breakdown(month).await {
                warn!(
                    plan = %plan.id,
                    month = month.month_index,
                    error = %err,
                    "recalculation stopped part way; later months keep stale values"
                );
                return Err(err);
            }
        }
        Ok(())
    }
}
