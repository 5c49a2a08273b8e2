use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::sampling::AssetClassParams;

/// Guaranteed-income benefit is capped at this monthly amount.
const BENEFIT_MONTHLY_CAP: f64 = 3_000.0;

/// Market regime for a whole batch. Shifts the mean of every asset-class
/// draw additively and scales its volatility multiplicatively.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketCondition {
    #[default]
    Normal,
    Bull,
    Bear,
}

impl MarketCondition {
    /// (additive mean shift, multiplicative volatility scale).
    pub fn adjustment(self) -> (f64, f64) {
        match self {
            MarketCondition::Normal => (0.0, 1.0),
            MarketCondition::Bull => (0.02, 0.8),
            MarketCondition::Bear => (-0.02, 1.2),
        }
    }
}

/// Budget split in percent of monthly income. Only the savings share feeds
/// the projection (it fixes starting annual expenses); the remaining
/// categories ride along untouched for the surrounding application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetAllocation {
    #[serde(rename = "Savings")]
    pub savings: f64,
    #[serde(flatten)]
    pub other: BTreeMap<String, f64>,
}

impl BudgetAllocation {
    pub fn with_savings(savings: f64) -> Self {
        BudgetAllocation { savings, other: BTreeMap::new() }
    }
}

/// The household plan record consumed from the surrounding application.
/// Monetary amounts are annual unless the field name says monthly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanInput {
    pub age: u32,
    pub retirement_age: u32,
    pub years_in_retirement: u32,
    pub retirement_savings: f64,
    pub monthly_retirement_contribution: f64,
    /// Expected annual income growth, in percent (3 means 3 %/year).
    pub income_growth_rate: f64,
    pub monthly_income: f64,
    pub desired_retirement_income: f64,
    pub budget_allocation: BudgetAllocation,
}

impl PlanInput {
    /// The worked example plan: 40-year-old, retiring at 65 with 25 years
    /// of retirement to fund.
    pub fn canonical() -> Self {
        PlanInput {
            age: 40,
            retirement_age: 65,
            years_in_retirement: 25,
            retirement_savings: 200_000.0,
            monthly_retirement_contribution: 1_000.0,
            income_growth_rate: 3.0,
            monthly_income: 6_000.0,
            desired_retirement_income: 60_000.0,
            budget_allocation: BudgetAllocation::with_savings(15.0),
        }
    }

    /// Simulated years per path: accumulation plus decumulation.
    pub fn horizon(&self) -> usize {
        (self.retirement_age.saturating_sub(self.age) + self.years_in_retirement) as usize
    }

    pub fn annual_income(&self) -> f64 {
        self.monthly_income * 12.0
    }

    pub fn annual_contribution(&self) -> f64 {
        self.monthly_retirement_contribution * 12.0
    }

    /// Starting annual expenses: everything not allocated to savings.
    pub fn annual_expenses(&self) -> f64 {
        self.monthly_income * (1.0 - self.budget_allocation.savings / 100.0) * 12.0
    }

    /// Guaranteed-income estimate: 40 % of pre-retirement monthly income,
    /// capped, annualised.
    pub fn guaranteed_income_estimate(&self) -> f64 {
        (self.monthly_income * 0.4).min(BENEFIT_MONTHLY_CAP) * 12.0
    }

    pub fn validate(&self, options: &SimulationOptions) -> Result<(), ConfigError> {
        if options.simulation_count == 0 {
            return Err(ConfigError::NoSimulations);
        }
        if self.retirement_age <= self.age {
            return Err(ConfigError::RetirementBeforeCurrentAge {
                age: self.age,
                retirement_age: self.retirement_age,
            });
        }
        if self.years_in_retirement == 0 {
            return Err(ConfigError::NoRetirementYears);
        }
        Ok(())
    }
}

/// Batch-level simulation knobs. Every stochastic parameter lives here so
/// tests can force volatilities to zero and pin the seed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimulationOptions {
    pub simulation_count: usize,
    pub confidence_levels: Vec<f64>,
    pub inflation_mean: f64,
    pub inflation_volatility: f64,
    pub market_conditions: MarketCondition,
    pub income_growth_volatility: f64,
    pub stocks: AssetClassParams,
    pub bonds: AssetClassParams,
    pub cash: AssetClassParams,
    /// Master seed; trial i of a batch runs on seed + i.
    pub seed: u64,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        SimulationOptions {
            simulation_count: 1_000,
            confidence_levels: vec![0.95, 0.75, 0.50],
            inflation_mean: 0.02,
            inflation_volatility: 0.01,
            market_conditions: MarketCondition::Normal,
            income_growth_volatility: 0.01,
            stocks: AssetClassParams { mean: 0.10, std_dev: 0.15 },
            bonds: AssetClassParams { mean: 0.04, std_dev: 0.05 },
            cash: AssetClassParams { mean: 0.02, std_dev: 0.01 },
            seed: 42,
        }
    }
}

impl SimulationOptions {
    /// Zero out every source of randomness. Each trial then replays the
    /// same deterministic path of pure means.
    pub fn deterministic(mut self) -> Self {
        self.inflation_volatility = 0.0;
        self.income_growth_volatility = 0.0;
        self.stocks.std_dev = 0.0;
        self.bonds.std_dev = 0.0;
        self.cash.std_dev = 0.0;
        self
    }
}
