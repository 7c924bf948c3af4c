use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{sort_plans, PlanDocument, PlanStore};
use crate::{
    domain::{FinancialPlan, PlanMonthlyBreakdown},
    errors::{PlanError, Result},
};

/// In-process plan store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryPlanStore {
    documents: RwLock<HashMap<Uuid, PlanDocument>>,
}

impl MemoryPlanStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn plan_count(&self) -> usize {
        self.documents.read().await.len()
    }
}

#[async_trait]
impl PlanStore for MemoryPlanStore {
    async fn insert_plan(&self, plan: &FinancialPlan) -> Result<()> {
        self.insert_plan_with_breakdowns(plan, &[]).await
    }

    async fn insert_plan_with_breakdowns(
        &self,
        plan: &FinancialPlan,
        breakdowns: &[PlanMonthlyBreakdown],
    ) -> Result<()> {
        let mut documents = self.documents.write().await;
        if documents.contains_key(&plan.id) {
            return Err(PlanError::Persistence(format!(
                "plan {} already exists",
                plan.id
            )));
        }
        documents.insert(
            plan.id,
            PlanDocument::with_breakdowns(plan.clone(), breakdowns),
        );
        Ok(())
    }

    async fn insert_breakdowns(
        &self,
        plan_id: Uuid,
        breakdowns: &[PlanMonthlyBreakdown],
    ) -> Result<()> {
        let mut documents = self.documents.write().await;
        let document = documents
            .get_mut(&plan_id)
            .ok_or(PlanError::PlanNotFound(plan_id))?;
        document.breakdowns.extend_from_slice(breakdowns);
        Ok(())
    }

    async fn fetch_plans(&self) -> Result<Vec<FinancialPlan>> {
        let documents = self.documents.read().await;
        let mut plans: Vec<FinancialPlan> =
            documents.values().map(|doc| doc.plan.clone()).collect();
        sort_plans(&mut plans);
        Ok(plans)
    }

    async fn fetch_plan(&self, id: Uuid) -> Result<Option<FinancialPlan>> {
        Ok(self
            .documents
            .read()
            .await
            .get(&id)
            .map(|doc| doc.plan.clone()))
    }

    async fn fetch_breakdowns(&self, plan_id: Uuid) -> Result<Vec<PlanMonthlyBreakdown>> {
        Ok(self
            .documents
            .read()
            .await
            .get(&plan_id)
            .map(PlanDocument::ordered_breakdowns)
            .unwrap_or_default())
    }

    async fn update_breakdown(&self, breakdown: &PlanMonthlyBreakdown) -> Result<()> {
        let mut documents = self.documents.write().await;
        let document = documents
            .get_mut(&breakdown.plan_id)
            .ok_or(PlanError::PlanNotFound(breakdown.plan_id))?;
        if !document.replace_breakdown(breakdown) {
            return Err(PlanError::BreakdownNotFound(breakdown.id));
        }
        Ok(())
    }

    async fn delete_plan(&self, id: Uuid) -> Result<bool> {
        Ok(self.documents.write().await.remove(&id).is_some())
    }
}
