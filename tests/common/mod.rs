#![allow(dead_code)]

use std::{
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use plan_core::{
    config::Config,
    core::{FixedClock, PlanCoordinator, PlanStore},
    domain::{FinancialPlan, PlanMonthlyBreakdown, PlanParameters},
    errors::{PlanError, Result},
    storage::{ExpenseHistory, MemoryPlanStore},
};
use uuid::Uuid;

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub fn noon(day: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&day.and_hms_opt(12, 0, 0).expect("valid time"))
}

/// Ten thousand in, six thousand out, three months from January 2024.
pub fn scenario_a() -> PlanParameters {
    PlanParameters::new("Emergency fund", date(2024, 1, 1), 3, 10_000.0, 6_000.0)
}

/// Coordinator wired to in-memory collaborators and a clock the test controls.
pub struct Harness<S: PlanStore + 'static = MemoryPlanStore> {
    pub coordinator: PlanCoordinator,
    pub store: Arc<S>,
    pub expenses: Arc<ExpenseHistory>,
    pub clock: Arc<FixedClock>,
}

pub fn harness_at(now: DateTime<Utc>) -> Harness {
    harness_with_store(MemoryPlanStore::new(), now)
}

pub fn harness_with_store<S: PlanStore + 'static>(store: S, now: DateTime<Utc>) -> Harness<S> {
    let config = Config::default();
    let clock = Arc::new(FixedClock::new(now));
    let store = Arc::new(store);
    let expenses = Arc::new(ExpenseHistory::from_config(&config, clock.clone()));
    let coordinator = PlanCoordinator::new(config, store.clone(), expenses.clone(), clock.clone());
    Harness {
        coordinator,
        store,
        expenses,
        clock,
    }
}

const NEVER: usize = usize::MAX;

/// Memory store that fails or slows chosen writes, for exercising partial-failure and
/// interleaving paths.
pub struct FlakyStore {
    inner: MemoryPlanStore,
    fail_update_at: AtomicUsize,
    fail_batch: AtomicUsize,
    write_delay_ms: AtomicU64,
    pub updates: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryPlanStore::new(),
            fail_update_at: AtomicUsize::new(NEVER),
            fail_batch: AtomicUsize::new(0),
            write_delay_ms: AtomicU64::new(0),
            updates: AtomicUsize::new(0),
        }
    }

    /// Every later insert or breakdown update sleeps this long before writing.
    pub fn slow_writes(&self, delay: Duration) {
        self.write_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    async fn pause(&self) {
        let delay = self.write_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
    }

    /// Counting from now, the `nth` (zero-based) breakdown update fails once.
    pub fn fail_update(&self, nth: usize) {
        self.updates.store(0, Ordering::SeqCst);
        self.fail_update_at.store(nth, Ordering::SeqCst);
    }

    pub fn fail_next_batch(&self) {
        self.fail_batch.store(1, Ordering::SeqCst);
    }

    pub async fn plan_count(&self) -> usize {
        self.inner.plan_count().await
    }
}

#[async_trait]
impl PlanStore for FlakyStore {
    async fn insert_plan(&self, plan: &FinancialPlan) -> Result<()> {
        self.inner.insert_plan(plan).await
    }

    async fn insert_plan_with_breakdowns(
        &self,
        plan: &FinancialPlan,
        breakdowns: &[PlanMonthlyBreakdown],
    ) -> Result<()> {
        self.pause().await;
        if self.fail_batch.swap(0, Ordering::SeqCst) == 1 {
            return Err(PlanError::Persistence("disk full".into()));
        }
        self.inner.insert_plan_with_breakdowns(plan, breakdowns).await
    }

    async fn insert_breakdowns(
        &self,
        plan_id: Uuid,
        breakdowns: &[PlanMonthlyBreakdown],
    ) -> Result<()> {
        if self.fail_batch.swap(0, Ordering::SeqCst) == 1 {
            return Err(PlanError::Persistence("disk full".into()));
        }
        self.inner.insert_breakdowns(plan_id, breakdowns).await
    }

    async fn fetch_plans(&self) -> Result<Vec<FinancialPlan>> {
        self.inner.fetch_plans().await
    }

    async fn fetch_plan(&self, id: Uuid) -> Result<Option<FinancialPlan>> {
        self.inner.fetch_plan(id).await
    }

    async fn fetch_breakdowns(&self, plan_id: Uuid) -> Result<Vec<PlanMonthlyBreakdown>> {
        self.inner.fetch_breakdowns(plan_id).await
    }

    async fn update_breakdown(&self, breakdown: &PlanMonthlyBreakdown) -> Result<()> {
        self.pause().await;
        let seen = self.updates.fetch_add(1, Ordering::SeqCst);
        if seen == self.fail_update_at.load(Ordering::SeqCst) {
            self.fail_update_at.store(NEVER, Ordering::SeqCst);
            return Err(PlanError::Persistence("write interrupted".into()));
        }
        self.inner.update_breakdown(breakdown).await
    }

    async fn delete_plan(&self, id: Uuid) -> Result<bool> {
        self.inner.delete_plan(id).await
    }
}
