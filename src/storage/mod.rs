//! Persistence and expense-data collaborators for the planning core.

pub mod expense_history;
pub mod json_backend;
pub mod memory;

use serde::{Deserialize, Serialize};

use crate::domain::{FinancialPlan, PlanMonthlyBreakdown};

pub use crate::core::storage::{ExpenseDataSource, PlanStore};
pub use expense_history::ExpenseHistory;
pub use json_backend::JsonPlanStore;
pub use memory::MemoryPlanStore;

pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Stored unit: a plan together with its breakdowns, always written as a whole.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanDocument {
    pub schema_version: u32,
    pub plan: FinancialPlan,
    #[serde(default)]
    pub breakdowns: Vec<PlanMonthlyBreakdown>,
}

impl PlanDocument {
    pub fn new(plan: FinancialPlan) -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            plan,
            breakdowns: Vec::new(),
        }
    }

    pub fn with_breakdowns(plan: FinancialPlan, breakdowns: &[PlanMonthlyBreakdown]) -> Self {
        Self {
            breakdowns: breakdowns.to_vec(),
            ..Self::new(plan)
        }
    }

    pub(crate) fn ordered_breakdowns(&self) -> Vec<PlanMonthlyBreakdown> {
        let mut breakdowns = self.breakdowns.clone();
        breakdowns.sort_by_key(|breakdown| breakdown.month_index);
        breakdowns
    }

    /// Replaces the stored breakdown with the same id. Returns `false` when there is none.
    pub(crate) fn replace_breakdown(&mut self, breakdown: &PlanMonthlyBreakdown) -> bool {
        match self
            .breakdowns
            .iter_mut()
            .find(|stored| stored.id == breakdown.id)
        {
            Some(stored) => {
                *stored = breakdown.clone();
                true
            }
            None => false,
        }
    }
}

/// Orders plans the way listings present them: oldest first, then by name.
pub(crate) fn sort_plans(plans: &mut [FinancialPlan]) {
    plans.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.name.cmp(&b.name))
    });
}
