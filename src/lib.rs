//! Monte Carlo retirement projection engine.
//!
//! Draws many independent random futures for market returns and inflation,
//! advances each through an accumulation phase and a decumulation phase,
//! and reduces the ensemble to success probabilities, percentile bands,
//! risk statistics, and a calibrated sustainable withdrawal rate.
//!
//! Two entry points: [`simulation::run_plan`] projects a plan once and
//! returns the full output record; [`simulation::calibrate_plan`] reuses
//! the same batch runner to search for the highest constant withdrawal
//! rate meeting a target success probability.

pub mod analysis;
pub mod config;
pub mod error;
pub mod portfolio;
pub mod recommend;
pub mod sampling;
pub mod simulation;

pub use analysis::AnalysisResult;
pub use config::{MarketCondition, PlanInput, SimulationOptions};
pub use error::ConfigError;
pub use portfolio::{Batch, Path, PortfolioState};
pub use simulation::{PlanOutput, calibrate_plan, run_plan};
