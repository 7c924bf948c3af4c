//! Plan lifecycle: creation, selection, deletion, edits, and expense refreshes.

use std::{
    future::Future,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    locks::PlanLocks,
    projection::ProjectionEngine,
    recalculation::RecalculationService,
    storage::{ExpenseDataSource, PlanStore},
    time::Clock,
    validation::build_plan,
};
use crate::{
    config::Config,
    domain::{
        BreakdownEdit, ExpenseFigures, FinancialPlan, PlanCurrentPosition, PlanMonthlyBreakdown,
        PlanParameters, PlanWithBreakdowns,
    },
    errors::{PlanError, Result, ValidationError},
};

/// A loaded plan plus where "now" falls in it, when the plan is active.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanSelection {
    pub plan: PlanWithBreakdowns,
    pub position: Option<PlanCurrentPosition>,
}

#[derive(Debug, Default)]
struct CoordinatorState {
    selected: Option<PlanWithBreakdowns>,
    last_error: Option<String>,
}

/// Facade that coordinates plan state, projection, and persistence.
///
/// Operations on one plan are serialized through [`PlanLocks`]; operations on different
/// plans run independently. Writes run in spawned tasks that own the plan's lock, so a
/// caller dropping its future never leaves a half-written breakdown chain behind.
pub struct PlanCoordinator {
    config: Config,
    store: Arc<dyn PlanStore>,
    expenses: Arc<dyn ExpenseDataSource>,
    clock: Arc<dyn Clock>,
    locks: PlanLocks,
    state: Mutex<CoordinatorState>,
    in_flight: AtomicUsize,
}

impl PlanCoordinator {
    pub fn new(
        config: Config,
        store: Arc<dyn PlanStore>,
        expenses: Arc<dyn ExpenseDataSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            store,
            expenses,
            clock,
            locks: PlanLocks::new(),
            state: Mutex::new(CoordinatorState::default()),
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn load_plans(&self) -> Result<Vec<FinancialPlan>> {
        let _busy = self.begin();
        let result = self.store.fetch_plans().await;
        self.settle(result)
    }

    /// Validates the parameters, projects every month, and stores plan and breakdowns as
    /// one unit. Nothing is written when validation or projection fails.
    pub async fn create_plan(&self, params: PlanParameters) -> Result<PlanWithBreakdowns> {
        let _busy = self.begin();
        let result = self.create_plan_inner(params).await;
        self.settle(result)
    }

    async fn create_plan_inner(&self, params: PlanParameters) -> Result<PlanWithBreakdowns> {
        let plan = build_plan(&params, &self.config.currency, self.clock.now())?;
        let recorded = if plan.use_app_expense_data {
            Some(self.collect_expenses(&plan).await?)
        } else {
            None
        };
        let breakdowns = ProjectionEngine::project(&plan, recorded.as_deref())?;
        let created = PlanWithBreakdowns::new(plan, breakdowns);

        let guard = self.locks.acquire(created.plan.id).await;
        let store = Arc::clone(&self.store);
        let batch = created.clone();
        detach(async move {
            let _guard = guard;
            store
                .insert_plan_with_breakdowns(&batch.plan, &batch.breakdowns)
                .await
        })
        .await?;

        info!(
            plan = %created.plan.id,
            name = %created.plan.name,
            months = created.breakdowns.len(),
            "created plan"
        );
        Ok(created)
    }

    /// Loads a plan with its breakdowns and makes it the current selection.
    ///
    /// Waits for any write in progress on the plan, so the selection never mixes months
    /// from before and after a recalculation.
    pub async fn select_plan(&self, id: Uuid) -> Result<PlanSelection> {
        let _busy = self.begin();
        let result = self.load_plan(id).await.map(|plan| {
            let position = plan.current_position(self.clock.now());
            self.lock_state().selected = Some(plan.clone());
            debug!(plan = %id, active = position.is_some(), "selected plan");
            PlanSelection { plan, position }
        });
        self.settle_for(Some(id), result)
    }

    /// Removes the plan and its breakdowns, clearing the selection when it pointed at it.
    pub async fn delete_plan(&self, id: Uuid) -> Result<()> {
        let _busy = self.begin();
        let guard = self.locks.acquire(id).await;
        let store = Arc::clone(&self.store);
        let removed = detach(async move {
            let _guard = guard;
            store.delete_plan(id).await
        })
        .await;

        let result = match removed {
            Ok(true) => {
                self.clear_selection_of(id);
                self.locks.forget(id);
                info!(plan = %id, "deleted plan");
                Ok(())
            }
            Ok(false) => Err(PlanError::PlanNotFound(id)),
            Err(err) => Err(err),
        };
        self.settle_for(Some(id), result)
    }

    /// Stores a user-edited breakdown and recalculates it and every later month.
    ///
    /// Amounts that are NaN or infinite are rejected before anything is written.
    pub async fn update_breakdown(
        &self,
        breakdown: PlanMonthlyBreakdown,
    ) -> Result<PlanWithBreakdowns> {
        let _busy = self.begin();
        let plan_id = breakdown.plan_id;
        let result = self.update_breakdown_inner(breakdown).await;
        if let Ok(updated) = &result {
            self.replace_selection(updated);
        }
        self.settle_for(Some(plan_id), result)
    }

    async fn update_breakdown_inner(
        &self,
        edited: PlanMonthlyBreakdown,
    ) -> Result<PlanWithBreakdowns> {
        edited.ensure_finite()?;
        let guard = self.locks.acquire(edited.plan_id).await;
        let plan = self.require_plan(edited.plan_id).await?;
        self.recalculate_locked(guard, plan, edited).await
    }

    /// Applies a partial override to one month and recalculates downstream months.
    ///
    /// The month is read and edited while the plan is locked, so concurrent edits and
    /// refreshes of the same month all land.
    pub async fn edit_breakdown(
        &self,
        plan_id: Uuid,
        month_index: u32,
        edit: &BreakdownEdit,
    ) -> Result<PlanWithBreakdowns> {
        let _busy = self.begin();
        let result = self.edit_breakdown_inner(plan_id, month_index, edit).await;
        if let Ok(updated) = &result {
            self.replace_selection(updated);
        }
        self.settle_for(Some(plan_id), result)
    }

    async fn edit_breakdown_inner(
        &self,
        plan_id: Uuid,
        month_index: u32,
        edit: &BreakdownEdit,
    ) -> Result<PlanWithBreakdowns> {
        let guard = self.locks.acquire(plan_id).await;
        let current = self.read_plan(plan_id).await?;
        let mut month = current.breakdown(month_index).cloned().ok_or(
            ValidationError::MonthOutOfRange {
                month_index,
                duration: current.plan.duration_in_months,
            },
        )?;
        month.apply_edit(edit)?;
        month.ensure_finite()?;
        self.recalculate_locked(guard, current.plan, month).await
    }

    /// Writes `edited` and walks the later months on a detached task that owns `guard`.
    async fn recalculate_locked(
        &self,
        guard: OwnedMutexGuard<()>,
        plan: FinancialPlan,
        mut edited: PlanMonthlyBreakdown,
    ) -> Result<PlanWithBreakdowns> {
        edited.is_manually_edited = true;
        let plan_id = plan.id;
        let month = edited.month_index;

        let store = Arc::clone(&self.store);
        let updated = detach(async move {
            let _guard = guard;
            RecalculationService::recalculate(store.as_ref(), &plan, &edited).await?;
            let breakdowns = store.fetch_breakdowns(plan.id).await?;
            Ok(PlanWithBreakdowns::new(plan, breakdowns))
        })
        .await?;

        info!(plan = %plan_id, month, "updated breakdown");
        Ok(updated)
    }

    /// Pulls fresh expense figures for a plan that uses app expense data.
    ///
    /// Months flagged as manually edited keep their figures; all other months take the new
    /// figures, and the cumulative chain is rebuilt from month 0. Plans with manual
    /// expenses are returned unchanged.
    pub async fn refresh_expense_data(&self, plan_id: Uuid) -> Result<PlanWithBreakdowns> {
        let _busy = self.begin();
        let result = self.refresh_expense_data_inner(plan_id).await;
        if let Ok(updated) = &result {
            self.replace_selection(updated);
        }
        self.settle_for(Some(plan_id), result)
    }

    async fn refresh_expense_data_inner(&self, plan_id: Uuid) -> Result<PlanWithBreakdowns> {
        let guard = self.locks.acquire(plan_id).await;
        let plan = self.require_plan(plan_id).await?;
        if !plan.use_app_expense_data {
            debug!(plan = %plan_id, "plan uses manual expenses; nothing to refresh");
            let breakdowns = self.store.fetch_breakdowns(plan_id).await?;
            return Ok(PlanWithBreakdowns::new(plan, breakdowns));
        }

        let mut breakdowns = self.store.fetch_breakdowns(plan_id).await?;
        let mut refreshed = 0usize;
        for month in breakdowns.iter_mut().filter(|m| !m.is_manually_edited) {
            let figures = self
                .expenses
                .monthly_expenses(&plan, month.month_index)
                .await?
                .scaled(plan.inflation_factor(month.month_index));
            month.set_expenses(figures.fixed_expenses, figures.average_expenses);
            refreshed += 1;
        }

        let store = Arc::clone(&self.store);
        let updated = detach(async move {
            let _guard = guard;
            RecalculationService::rebuild(store.as_ref(), &plan, &mut breakdowns).await?;
            Ok(PlanWithBreakdowns::new(plan, breakdowns))
        })
        .await?;

        info!(plan = %plan_id, refreshed, "refreshed expense data");
        Ok(updated)
    }

    pub fn selected(&self) -> Option<PlanWithBreakdowns> {
        self.lock_state().selected.clone()
    }

    /// Where "now" falls in the selected plan. Recomputed on every call, never cached.
    pub fn current_position(&self) -> Option<PlanCurrentPosition> {
        let now = self.clock.now();
        self.lock_state()
            .selected
            .as_ref()
            .and_then(|plan| plan.current_position(now))
    }

    pub fn clear_selection(&self) {
        self.lock_state().selected = None;
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    pub fn last_error(&self) -> Option<String> {
        self.lock_state().last_error.clone()
    }

    async fn load_plan(&self, id: Uuid) -> Result<PlanWithBreakdowns> {
        let _guard = self.locks.acquire(id).await;
        self.read_plan(id).await
    }

    /// Reads a plan and its breakdowns. The caller holds the plan's lock.
    async fn read_plan(&self, id: Uuid) -> Result<PlanWithBreakdowns> {
        let plan = self.require_plan(id).await?;
        let breakdowns = self.store.fetch_breakdowns(id).await?;
        Ok(PlanWithBreakdowns::new(plan, breakdowns))
    }

    async fn require_plan(&self, id: Uuid) -> Result<FinancialPlan> {
        self.store
            .fetch_plan(id)
            .await?
            .ok_or(PlanError::PlanNotFound(id))
    }

    async fn collect_expenses(&self, plan: &FinancialPlan) -> Result<Vec<ExpenseFigures>> {
        let mut figures = Vec::with_capacity(plan.duration_in_months as usize);
        for month_index in 0..plan.duration_in_months {
            figures.push(self.expenses.monthly_expenses(plan, month_index).await?);
        }
        Ok(figures)
    }

    fn begin(&self) -> BusyGuard<'_> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        BusyGuard(&self.in_flight)
    }

    fn settle<T>(&self, result: Result<T>) -> Result<T> {
        self.settle_for(None, result)
    }

    /// Records the outcome for the presentation layer. A not-found error for the selected
    /// plan, or for a breakdown of the plan `target` names, drops the selection.
    fn settle_for<T>(&self, target: Option<Uuid>, result: Result<T>) -> Result<T> {
        let mut state = self.lock_state();
        match &result {
            Ok(_) => state.last_error = None,
            Err(err) => {
                warn!(error = %err, plan = ?target, "plan operation failed");
                let stale = match err {
                    PlanError::PlanNotFound(missing) => Some(*missing),
                    PlanError::BreakdownNotFound(_) => target,
                    _ => None,
                };
                if stale.is_some_and(|stale| {
                    state
                        .selected
                        .as_ref()
                        .is_some_and(|selected| selected.plan.id == stale)
                }) {
                    state.selected = None;
                }
                state.last_error = Some(err.to_string());
            }
        }
        result
    }

    fn replace_selection(&self, updated: &PlanWithBreakdowns) {
        let mut state = self.lock_state();
        if let Some(selected) = state.selected.as_mut() {
            if selected.plan.id == updated.plan.id {
                *selected = updated.clone();
            }
        }
    }

    fn clear_selection_of(&self, id: Uuid) {
        let mut state = self.lock_state();
        if state
            .selected
            .as_ref()
            .is_some_and(|selected| selected.plan.id == id)
        {
            state.selected = None;
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct BusyGuard<'a>(&'a AtomicUsize);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Runs write work on its own task so it finishes even if the caller stops waiting.
async fn detach<T, F>(work: F) -> Result<T>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(work)
        .await
        .map_err(|err| PlanError::Persistence(format!("background write task failed: {err}")))?
}
