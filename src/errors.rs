use thiserror::Error;
use uuid::Uuid;

/// Unified error type for the domain, projection, storage, and coordinator layers.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("Plan not found: {0}")]
    PlanNotFound(Uuid),
    #[error("Breakdown not found: {0}")]
    BreakdownNotFound(Uuid),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PlanError {
    /// True when the error means the backing entity no longer exists.
    pub fn is_not_found(&self) -> bool {
        matches!(self, PlanError::PlanNotFound(_) | PlanError::BreakdownNotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, PlanError>;

/// Rejections raised while checking plan parameters or breakdown edits.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("plan name must not be empty")]
    EmptyName,
    #[error("monthly income must be a non-negative amount, got {0}")]
    InvalidIncome(f64),
    #[error("manual monthly expenses must be a non-negative amount, got {0}")]
    InvalidManualExpenses(f64),
    #[error("duration must be between 1 and 1200 months, got {0}")]
    InvalidDuration(i64),
    #[error("inflation is applied but no inflation rate was given")]
    MissingInflationRate,
    #[error("inflation rate must be non-negative, got {0}")]
    InvalidInflationRate(f64),
    #[error("interest is applied but no interest rate was given")]
    MissingInterestRate,
    #[error("interest rate must be non-negative, got {0}")]
    InvalidInterestRate(f64),
    #[error("currency code must not be empty")]
    EmptyCurrency,
    #[error("expected {expected} monthly expense figures, got {actual}")]
    ExpenseFigureCount { expected: u32, actual: usize },
    #[error("breakdown {breakdown} does not belong to plan {plan}")]
    ForeignBreakdown { breakdown: Uuid, plan: Uuid },
    #[error("month {month_index} is outside a plan of {duration} months")]
    MonthOutOfRange { month_index: u32, duration: u32 },
    #[error("edited amount for `{0}` must be finite")]
    NonFiniteAmount(&'static str),
    #[error("projected figures for month {month_index} overflow to a non-finite amount")]
    NonFiniteProjection { month_index: u32 },
}

impl From<std::io::Error> for PlanError {
    fn from(err: std::io::Error) -> Self {
        PlanError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for PlanError {
    fn from(err: serde_json::Error) -> Self {
        PlanError::Persistence(err.to_string())
    }
}
