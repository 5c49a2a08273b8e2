use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::config::MarketCondition;

/// Return distribution for one asset class, annual fractional terms.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetClassParams {
    pub mean: f64,
    pub std_dev: f64,
}

impl AssetClassParams {
    /// Draw one year's fractional return under the given market regime.
    /// The regime shifts the mean additively and scales the volatility
    /// before sampling.
    pub fn draw(&self, condition: MarketCondition, rng: &mut impl Rng) -> f64 {
        let (mean_shift, vol_scale) = condition.adjustment();
        draw_normal(rng, self.mean + mean_shift, self.std_dev * vol_scale)
    }
}

/// Sample Normal(mean, std_dev). A non-positive std_dev collapses the
/// distribution to its mean without touching the entropy stream, so
/// zero-volatility configurations are exactly deterministic.
pub fn draw_normal(rng: &mut impl Rng, mean: f64, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return mean;
    }
    let dist = Normal::new(mean, std_dev).expect("invalid Normal params");
    dist.sample(rng)
}

/// Equity share of the blended return: a linear glide from 90 % equity at
/// 30+ years out down to 20 % at (and throughout) retirement.
pub fn equity_allocation(years_to_retirement: u32) -> f64 {
    (years_to_retirement as f64 / 30.0).clamp(0.2, 0.9)
}

/// Age-weighted blend of the equity and bond draws.
pub fn blended_return(stocks: f64, bonds: f64, years_to_retirement: u32) -> f64 {
    let equity = equity_allocation(years_to_retirement);
    equity * stocks + (1.0 - equity) * bonds
}
