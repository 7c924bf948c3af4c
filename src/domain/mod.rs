//! Pure plan data types: plans, monthly breakdowns, and recorded expenses.
//! No I/O and no storage; only values and the calendar math they need.

pub mod breakdown;
pub mod common;
pub mod expense;
pub mod plan;

pub use breakdown::*;
pub use common::CurrencyCode;
pub use expense::*;
pub use plan::*;
