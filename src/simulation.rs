use log::debug;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rayon::prelude::*;
use serde::Serialize;

use crate::analysis::{self, AnalysisResult, RiskMetrics};
use crate::config::{PlanInput, SimulationOptions};
use crate::error::ConfigError;
use crate::portfolio::{self, Batch, Path, PortfolioState};
use crate::recommend::{self, Recommendation};

/// Everything the surrounding application consumes from one projection.
/// Field names and nesting are a compatibility contract — do not rename.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanOutput {
    pub simulations: Batch,
    pub analysis: AnalysisResult,
    pub recommendations: Vec<Recommendation>,
    pub risk_metrics: RiskMetrics,
}

/// Simulate one path: accumulation transitions up to retirement age, then
/// decumulation transitions through the retirement horizon. Fixed length,
/// no error paths.
pub fn simulate_path(input: &PlanInput, options: &SimulationOptions, rng: &mut impl Rng) -> Path {
    let mut state = PortfolioState::initial(input, options);
    let mut path = Vec::with_capacity(input.horizon());

    for _ in 0..input.retirement_age.saturating_sub(input.age) {
        state = portfolio::accumulation_year(&state, input, options, rng);
        path.push(state.clone());
    }
    for _ in 0..input.years_in_retirement {
        state = portfolio::retirement_year(&state, input, options, rng);
        path.push(state.clone());
    }

    path
}

/// Run `simulation_count` independent trials. Trial i runs on its own
/// ChaCha20 stream seeded `seed + i`, so batches are reproducible and
/// trials uncorrelated. Trials are embarrassingly parallel; the caller
/// gets the batch only once every trial has finished.
pub fn run_batch(input: &PlanInput, options: &SimulationOptions) -> Result<Batch, ConfigError> {
    input.validate(options)?;

    let batch: Batch = (0..options.simulation_count as u64)
        .into_par_iter()
        .map(|i| {
            let mut rng = ChaCha20Rng::seed_from_u64(options.seed.wrapping_add(i));
            simulate_path(input, options, &mut rng)
        })
        .collect();

    debug!(
        "batch complete: {} trials × {} years (seed {})",
        batch.len(),
        input.horizon(),
        options.seed
    );
    Ok(batch)
}

/// Project once: run a batch, analyse it, derive recommendations.
pub fn run_plan(input: &PlanInput, options: &SimulationOptions) -> Result<PlanOutput, ConfigError> {
    let simulations = run_batch(input, options)?;
    let analysis = analysis::analyse(&simulations, input, options)?;
    let recommendations = recommend::generate(&analysis, input);
    let risk_metrics = analysis.risk_metrics.clone();

    Ok(PlanOutput { simulations, analysis, recommendations, risk_metrics })
}

/// Calibrate: run a batch and search for the highest constant withdrawal
/// rate meeting `target` success probability across it.
pub fn calibrate_plan(
    input: &PlanInput,
    options: &SimulationOptions,
    target: f64,
) -> Result<f64, ConfigError> {
    let batch = run_batch(input, options)?;
    Ok(analysis::sustainable_withdrawal_rate(&batch, target))
}
