use std::collections::BTreeMap;

use log::debug;
use rayon::prelude::*;
use serde::Serialize;

use crate::config::{PlanInput, SimulationOptions};
use crate::error::ConfigError;
use crate::portfolio::{Batch, Path, PortfolioState};

/// Success threshold used for the headline sustainable-withdrawal-rate
/// key metric.
pub const DEFAULT_SUCCESS_TARGET: f64 = 0.95;

/// A year counts as income-adequate at or above this fraction of the
/// desired retirement income.
const INCOME_FLOOR_FRACTION: f64 = 0.7;

/// Calibration bracket and stopping rules for the rate search.
const RATE_BRACKET_MAX: f64 = 0.10;
const RATE_TOLERANCE: f64 = 0.000_1;
const MAX_CALIBRATION_ITERATIONS: u32 = 20;

/// Ensemble statistics for one batch. Recomputed fresh on every call,
/// never updated incrementally.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// Percentage of paths that never ruin and never dip below the
    /// income floor. All-or-nothing per path.
    pub success_rate: f64,
    pub confidence_intervals: ConfidenceIntervals,
    /// Synthetic per-year medians — a statistical construct, not any
    /// single simulated trajectory.
    pub median_path: Vec<MedianPoint>,
    pub extreme_scenarios: ExtremeScenarios,
    pub risk_metrics: RiskMetrics,
    pub key_metrics: KeyMetrics,
}

/// Per-year percentile bands, one entry per simulated year, keyed by
/// percentile label ("p5", "p25", ...). The label set derives from the
/// configured confidence levels.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceIntervals {
    pub savings: Vec<BTreeMap<String, f64>>,
    pub income: Vec<BTreeMap<String, f64>>,
    pub expenses: Vec<BTreeMap<String, f64>>,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MedianPoint {
    pub age: u32,
    pub savings: f64,
    pub income: f64,
    pub expenses: f64,
}

/// Full paths ranked by final-year savings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtremeScenarios {
    pub worst: Path,
    pub best: Path,
    pub tenth_percentile: Path,
    pub ninetieth_percentile: Path,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskMetrics {
    /// Std dev of year-over-year fractional savings changes pooled across
    /// the whole batch.
    pub volatility: f64,
    /// Worst single-path peak-to-trough fractional decline in the batch.
    pub max_drawdown: f64,
    pub tail_risk: TailRisk,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TailRisk {
    /// 5th-percentile pooled return.
    pub var95: f64,
    /// Mean of pooled returns at or below var95.
    pub cvar95: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyMetrics {
    pub median_final_wealth: f64,
    /// Percentage of paths with at least one depleted year.
    pub probability_of_ruin: f64,
    pub sustainable_withdrawal_rate: f64,
    /// Percentage of paths whose final savings kept up with that path's
    /// own realised cumulative inflation.
    pub real_wealth_preservation: f64,
}

/// Reduce a finished batch to its ensemble statistics. The batch must be
/// complete and non-empty; analysis never observes in-flight trials.
pub fn analyse(
    batch: &Batch,
    input: &PlanInput,
    options: &SimulationOptions,
) -> Result<AnalysisResult, ConfigError> {
    if batch.is_empty() || batch[0].is_empty() {
        return Err(ConfigError::EmptyBatch);
    }

    Ok(AnalysisResult {
        success_rate: success_rate(batch, input),
        confidence_intervals: confidence_intervals(batch, &options.confidence_levels),
        median_path: median_path(batch),
        extreme_scenarios: extreme_scenarios(batch),
        risk_metrics: risk_metrics(batch),
        key_metrics: KeyMetrics {
            median_final_wealth: median(final_savings(batch)),
            probability_of_ruin: ruin_probability(batch),
            sustainable_withdrawal_rate: sustainable_withdrawal_rate(
                batch,
                DEFAULT_SUCCESS_TARGET,
            ),
            real_wealth_preservation: real_wealth_preservation(batch, input.retirement_savings),
        },
    })
}

// ── Success and ruin ─────────────────────────────────────────────────────

fn path_succeeds(path: &Path, income_floor: f64) -> bool {
    path.iter().all(|year| year.savings > 0.0 && year.income >= income_floor)
}

/// Percentage of paths where every year stays solvent and income-adequate.
/// One violating year disqualifies the whole path.
pub fn success_rate(batch: &Batch, input: &PlanInput) -> f64 {
    let floor = input.desired_retirement_income * INCOME_FLOOR_FRACTION;
    let successes = batch.iter().filter(|path| path_succeeds(path, floor)).count();
    successes as f64 / batch.len() as f64 * 100.0
}

/// Percentage of paths containing at least one depleted year.
pub fn ruin_probability(batch: &Batch) -> f64 {
    let ruined = batch
        .iter()
        .filter(|path| path.iter().any(|year| year.savings <= 0.0))
        .count();
    ruined as f64 / batch.len() as f64 * 100.0
}

// ── Percentile bands ─────────────────────────────────────────────────────

/// Each confidence level c contributes the (1 − c) and c percentiles;
/// the defaults [0.95, 0.75, 0.50] give p5, p25, p50, p75, p95.
fn percentile_set(confidence_levels: &[f64]) -> Vec<f64> {
    let mut pcts: Vec<f64> =
        confidence_levels.iter().flat_map(|&c| [1.0 - c, c]).collect();
    pcts.sort_by(|a, b| a.total_cmp(b));
    pcts.dedup_by(|a, b| (*a - *b).abs() < 1e-12);
    pcts
}

fn percentile_label(p: f64) -> String {
    let pct = p * 100.0;
    if (pct - pct.round()).abs() < 1e-9 {
        format!("p{}", pct.round() as i64)
    } else {
        format!("p{pct}")
    }
}

/// Empirical percentile of a sorted slice: index = floor(p × n), clamped.
fn empirical_percentile(sorted: &[f64], p: f64) -> f64 {
    let idx = ((p * sorted.len() as f64).floor() as usize).min(sorted.len() - 1);
    sorted[idx]
}

fn year_bands(
    batch: &Batch,
    pcts: &[f64],
    metric: impl Fn(&PortfolioState) -> f64,
) -> Vec<BTreeMap<String, f64>> {
    let years = batch[0].len();
    (0..years)
        .map(|t| {
            let mut values: Vec<f64> = batch.iter().map(|path| metric(&path[t])).collect();
            values.sort_by(|a, b| a.total_cmp(b));
            pcts.iter()
                .map(|&p| (percentile_label(p), empirical_percentile(&values, p)))
                .collect()
        })
        .collect()
}

pub fn confidence_intervals(batch: &Batch, confidence_levels: &[f64]) -> ConfidenceIntervals {
    let pcts = percentile_set(confidence_levels);
    ConfidenceIntervals {
        savings: year_bands(batch, &pcts, |y| y.savings),
        income: year_bands(batch, &pcts, |y| y.income),
        expenses: year_bands(batch, &pcts, |y| y.expenses),
    }
}

// ── Median path ──────────────────────────────────────────────────────────

fn median(mut values: Vec<f64>) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

pub fn median_path(batch: &Batch) -> Vec<MedianPoint> {
    let years = batch[0].len();
    (0..years)
        .map(|t| MedianPoint {
            age: batch[0][t].age,
            savings: median(batch.iter().map(|p| p[t].savings).collect()),
            income: median(batch.iter().map(|p| p[t].income).collect()),
            expenses: median(batch.iter().map(|p| p[t].expenses).collect()),
        })
        .collect()
}

// ── Extreme scenarios ────────────────────────────────────────────────────

fn final_savings(batch: &Batch) -> Vec<f64> {
    batch.iter().map(|path| path.last().map_or(0.0, |y| y.savings)).collect()
}

pub fn extreme_scenarios(batch: &Batch) -> ExtremeScenarios {
    let finals = final_savings(batch);
    let mut order: Vec<usize> = (0..batch.len()).collect();
    order.sort_by(|&a, &b| finals[a].total_cmp(&finals[b]));

    let n = order.len();
    let rank = |p: f64| order[((p * n as f64).floor() as usize).min(n - 1)];

    ExtremeScenarios {
        worst: batch[order[0]].clone(),
        best: batch[order[n - 1]].clone(),
        tenth_percentile: batch[rank(0.1)].clone(),
        ninetieth_percentile: batch[rank(0.9)].clone(),
    }
}

// ── Risk metrics ─────────────────────────────────────────────────────────

/// Year-over-year fractional savings changes pooled across all paths.
/// Years starting from a depleted balance are skipped (no denominator).
fn pooled_returns(batch: &Batch) -> Vec<f64> {
    let mut returns = Vec::new();
    for path in batch {
        for pair in path.windows(2) {
            if pair[0].savings > 0.0 {
                returns.push((pair[1].savings - pair[0].savings) / pair[0].savings);
            }
        }
    }
    returns
}

fn path_max_drawdown(path: &Path) -> f64 {
    let mut peak = path.first().map_or(0.0, |y| y.savings);
    let mut worst = 0.0_f64;
    for year in path {
        if year.savings > peak {
            peak = year.savings;
        }
        if peak > 0.0 {
            worst = worst.max((peak - year.savings) / peak);
        }
    }
    worst
}

pub fn risk_metrics(batch: &Batch) -> RiskMetrics {
    let mut returns = pooled_returns(batch);

    let volatility = if returns.is_empty() {
        0.0
    } else {
        let mean = returns.iter().sum::<f64>() / returns.len() as f64;
        let var =
            returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
        var.sqrt()
    };

    let max_drawdown = batch
        .iter()
        .map(|path| path_max_drawdown(path))
        .fold(0.0_f64, f64::max);

    let tail_risk = if returns.is_empty() {
        TailRisk { var95: 0.0, cvar95: 0.0 }
    } else {
        returns.sort_by(|a, b| a.total_cmp(b));
        let var95 = empirical_percentile(&returns, 0.05);
        let tail: Vec<f64> = returns.iter().copied().filter(|&r| r <= var95).collect();
        let cvar95 = tail.iter().sum::<f64>() / tail.len() as f64;
        TailRisk { var95, cvar95 }
    };

    RiskMetrics { volatility, max_drawdown, tail_risk }
}

// ── Real wealth preservation ─────────────────────────────────────────────

/// Percentage of paths whose final savings bought at least as much as the
/// starting savings did, deflating by the path's own inflation draws.
pub fn real_wealth_preservation(batch: &Batch, initial_savings: f64) -> f64 {
    let preserved = batch
        .iter()
        .filter(|path| {
            let cumulative: f64 = path.iter().map(|y| 1.0 + y.inflation).product();
            path.last().map_or(0.0, |y| y.savings) >= initial_savings * cumulative
        })
        .count();
    preserved as f64 / batch.len() as f64 * 100.0
}

// ── Withdrawal-rate calibration ──────────────────────────────────────────

/// Fraction of paths that stay positive every year when a constant
/// fraction `rate` of each year's balance is withdrawn on top of what the
/// path already spent. This is the calibration probe, deliberately
/// independent of the dynamic 5 %-cap policy the paths simulated.
pub fn constant_rate_success(batch: &Batch, rate: f64) -> f64 {
    let passing = batch
        .par_iter()
        .filter(|path| path.iter().all(|year| year.savings - year.savings * rate > 0.0))
        .count();
    passing as f64 / batch.len() as f64
}

/// Binary search for the highest constant withdrawal rate whose success
/// probability across the batch meets `target`. Bounded: at most 20
/// iterations or a bracket narrower than 1e-4, whichever first; the
/// returned midpoint is an approximation, not an exact root.
pub fn sustainable_withdrawal_rate(batch: &Batch, target: f64) -> f64 {
    let mut low = 0.0_f64;
    let mut high = RATE_BRACKET_MAX;
    let mut iterations = 0;

    while iterations < MAX_CALIBRATION_ITERATIONS && (high - low) > RATE_TOLERANCE {
        let mid = (low + high) / 2.0;
        let success = constant_rate_success(batch, mid);
        debug!(
            "calibration iter {iterations}: bracket [{low:.5}, {high:.5}], \
             rate {mid:.5} → success {success:.3}"
        );
        if success >= target {
            low = mid;
        } else {
            high = mid;
        }
        iterations += 1;
    }

    (low + high) / 2.0
}
