use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::{fs, sync::Mutex};
use tracing::debug;
use uuid::Uuid;

use super::{sort_plans, PlanDocument, PlanStore, CURRENT_SCHEMA_VERSION};
use crate::{
    config::Config,
    domain::{FinancialPlan, PlanMonthlyBreakdown},
    errors::{PlanError, Result},
};

const PLAN_EXTENSION: &str = "json";
const TMP_SUFFIX: &str = "tmp";

/// Filesystem-backed JSON persistence: one document per plan holding its breakdowns.
///
/// Each document is replaced atomically (tmp file plus rename), so a breakdown batch or a
/// cascading delete is never half-applied on disk.
#[derive(Debug)]
pub struct JsonPlanStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonPlanStore {
    pub async fn new(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub async fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.resolve_data_root()).await
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn plan_path(&self, id: Uuid) -> PathBuf {
        self.root.join(format!("{}.{}", id, PLAN_EXTENSION))
    }

    async fn read_document(&self, id: Uuid) -> Result<Option<PlanDocument>> {
        let path = self.plan_path(id);
        if !fs::try_exists(&path).await? {
            return Ok(None);
        }
        load_document(&path).await.map(Some)
    }

    async fn require_document(&self, id: Uuid) -> Result<PlanDocument> {
        self.read_document(id)
            .await?
            .ok_or(PlanError::PlanNotFound(id))
    }

    async fn write_document(&self, document: &PlanDocument) -> Result<()> {
        if let Some(month) = document
            .breakdowns
            .iter()
            .find(|month| month.non_finite_field().is_some())
        {
            return Err(PlanError::Persistence(format!(
                "refusing to write non-finite figures for month {} of plan {}",
                month.month_index, document.plan.id
            )));
        }
        let path = self.plan_path(document.plan.id);
        let json = serde_json::to_string_pretty(document)?;
        write_atomic(&path, &json).await?;
        debug!(path = %path.display(), "wrote plan document");
        Ok(())
    }
}

#[async_trait]
impl PlanStore for JsonPlanStore {
    async fn insert_plan(&self, plan: &FinancialPlan) -> Result<()> {
        self.insert_plan_with_breakdowns(plan, &[]).await
    }

    async fn insert_plan_with_breakdowns(
        &self,
        plan: &FinancialPlan,
        breakdowns: &[PlanMonthlyBreakdown],
    ) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if fs::try_exists(self.plan_path(plan.id)).await? {
            return Err(PlanError::Persistence(format!(
                "plan {} already exists",
                plan.id
            )));
        }
        self.write_document(&PlanDocument::with_breakdowns(plan.clone(), breakdowns))
            .await
    }

    async fn insert_breakdowns(
        &self,
        plan_id: Uuid,
        breakdowns: &[PlanMonthlyBreakdown],
    ) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.require_document(plan_id).await?;
        document.breakdowns.extend_from_slice(breakdowns);
        self.write_document(&document).await
    }

    async fn fetch_plans(&self) -> Result<Vec<FinancialPlan>> {
        let mut plans = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(PLAN_EXTENSION) {
                continue;
            }
            plans.push(load_document(&path).await?.plan);
        }
        sort_plans(&mut plans);
        Ok(plans)
    }

    async fn fetch_plan(&self, id: Uuid) -> Result<Option<FinancialPlan>> {
        Ok(self.read_document(id).await?.map(|document| document.plan))
    }

    async fn fetch_breakdowns(&self, plan_id: Uuid) -> Result<Vec<PlanMonthlyBreakdown>> {
        Ok(self
            .read_document(plan_id)
            .await?
            .map(|document| document.ordered_breakdowns())
            .unwrap_or_default())
    }

    async fn update_breakdown(&self, breakdown: &PlanMonthlyBreakdown) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.require_document(breakdown.plan_id).await?;
        if !document.replace_breakdown(breakdown) {
            return Err(PlanError::BreakdownNotFound(breakdown.id));
        }
        self.write_document(&document).await
    }

    async fn delete_plan(&self, id: Uuid) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let path = self.plan_path(id);
        if !fs::try_exists(&path).await? {
            return Ok(false);
        }
        fs::remove_file(&path).await?;
        Ok(true)
    }
}

async fn load_document(path: &Path) -> Result<PlanDocument> {
    let data = fs::read_to_string(path).await?;
    let document: PlanDocument = serde_json::from_str(&data)?;
    if document.schema_version > CURRENT_SCHEMA_VERSION {
        return Err(PlanError::Persistence(format!(
            "plan document `{}` uses schema v{}, newer than supported v{}",
            path.display(),
            document.schema_version,
            CURRENT_SCHEMA_VERSION
        )));
    }
    Ok(document)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    tmp.set_extension(format!("{}.{}", PLAN_EXTENSION, TMP_SUFFIX));
    tmp
}

async fn write_atomic(path: &Path, data: &str) -> Result<()> {
    let tmp = tmp_path(path);
    fs::write(&tmp, data).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}
