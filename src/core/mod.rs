pub mod coordinator;
pub mod locks;
pub mod projection;
pub mod recalculation;
pub mod storage;
pub mod time;
pub mod validation;

pub use coordinator::{PlanCoordinator, PlanSelection};
pub use locks::PlanLocks;
pub use projection::ProjectionEngine;
pub use recalculation::RecalculationService;
pub use storage::{ExpenseDataSource, PlanStore};
pub use time::{Clock, FixedClock, SystemClock};
pub use validation::{build_plan, validate_parameters};
