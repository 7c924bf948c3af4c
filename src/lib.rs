#![doc(test(attr(deny(warnings))))]

//! Plan Core projects long-horizon savings plans month by month and keeps the projection
//! consistent as individual months are edited.
//!
//! The [`core::PlanCoordinator`] is the entry point: it validates new plans, runs the
//! [`core::ProjectionEngine`], persists through a [`core::PlanStore`], and recalculates
//! downstream months through the [`core::RecalculationService`].

pub mod config;
pub mod core;
pub mod domain;
pub mod errors;
pub mod storage;
pub mod utils;

/// Initializes global tracing with the default filter and emits a startup info log.
pub fn init() {
    init_with_config(&config::Config::default());
}

/// Initializes global tracing using the filter carried by `config`. Only the first call
/// installs a subscriber.
pub fn init_with_config(config: &config::Config) {
    utils::init_tracing(&config.log_filter);
}
