use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    domain::{ExpenseFigures, FinancialPlan, PlanMonthlyBreakdown},
    errors::Result,
};

/// Persistence collaborator holding plans and their monthly breakdowns.
///
/// Every method may fail with a storage error; callers surface it rather than swallow it.
#[async_trait]
pub trait PlanStore: Send + Sync {
    /// Stores a new plan. Fails if a plan with the same id already exists.
    async fn insert_plan(&self, plan: &FinancialPlan) -> Result<()>;

    /// Stores a new plan together with its breakdowns as one write: either both become
    /// visible or neither does. Fails if a plan with the same id already exists.
    async fn insert_plan_with_breakdowns(
        &self,
        plan: &FinancialPlan,
        breakdowns: &[PlanMonthlyBreakdown],
    ) -> Result<()>;

    /// Stores a plan's full breakdown batch in one write. Fails if the plan is unknown.
    async fn insert_breakdowns(
        &self,
        plan_id: Uuid,
        breakdowns: &[PlanMonthlyBreakdown],
    ) -> Result<()>;

    async fn fetch_plans(&self) -> Result<Vec<FinancialPlan>>;

    async fn fetch_plan(&self, id: Uuid) -> Result<Option<FinancialPlan>>;

    /// Breakdowns for the plan, ordered by `month_index`.
    async fn fetch_breakdowns(&self, plan_id: Uuid) -> Result<Vec<PlanMonthlyBreakdown>>;

    /// Replaces one stored breakdown, matched by id.
    async fn update_breakdown(&self, breakdown: &PlanMonthlyBreakdown) -> Result<()>;

    /// Removes the plan and all of its breakdowns. Returns `false` when nothing was stored.
    async fn delete_plan(&self, id: Uuid) -> Result<bool>;
}

/// Expense data collaborator supplying recorded spending per plan month.
#[async_trait]
pub trait ExpenseDataSource: Send + Sync {
    /// Fixed and average expenses for `month_index` of `plan`, in the plan's currency,
    /// before any inflation adjustment.
    async fn monthly_expenses(
        &self,
        plan: &FinancialPlan,
        month_index: u32,
    ) -> Result<ExpenseFigures>;
}
