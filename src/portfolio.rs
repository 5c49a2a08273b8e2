use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::{PlanInput, SimulationOptions};
use crate::sampling::{blended_return, draw_normal};

/// Withdrawals above this fraction of the current balance are cut back to
/// exactly this fraction (circuit breaker against rapid depletion).
pub const WITHDRAWAL_CAP_RATE: f64 = 0.05;

/// Per-asset-class fractional returns for one simulated year plus the
/// age-weighted blend actually applied to the balance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnBreakdown {
    pub stocks: f64,
    pub bonds: f64,
    pub cash: f64,
    /// Blended fractional return applied to savings.
    pub total_return: f64,
    /// Monetary gain on the start-of-year balance.
    pub total: f64,
}

/// One simulated year of the household's finances. Immutable once built;
/// owned by the path that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioState {
    pub age: u32,
    /// Clamped to zero — a balance that would go negative is ruin.
    pub savings: f64,
    pub income: f64,
    pub expenses: f64,
    /// The year's realised inflation draw.
    pub inflation: f64,
    /// Absent only on the starting state, which precedes any draw.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub returns: Option<ReturnBreakdown>,
    /// Present only in retirement years.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub withdrawal: Option<f64>,
}

/// One simulated trajectory across the full horizon, in year order.
pub type Path = Vec<PortfolioState>;

/// All paths from one Monte Carlo run at one configuration.
pub type Batch = Vec<Path>;

impl PortfolioState {
    /// Starting state built from the plan record: current savings, current
    /// salary, expenses fixed by the budget's savings share.
    pub fn initial(input: &PlanInput, options: &SimulationOptions) -> Self {
        PortfolioState {
            age: input.age,
            savings: input.retirement_savings,
            income: input.annual_income(),
            expenses: input.annual_expenses(),
            inflation: options.inflation_mean,
            returns: None,
            withdrawal: None,
        }
    }
}

fn draw_year_returns(
    years_to_retirement: u32,
    balance: f64,
    options: &SimulationOptions,
    rng: &mut impl Rng,
) -> ReturnBreakdown {
    let condition = options.market_conditions;
    let stocks = options.stocks.draw(condition, rng);
    let bonds = options.bonds.draw(condition, rng);
    let cash = options.cash.draw(condition, rng);
    let total_return = blended_return(stocks, bonds, years_to_retirement);
    ReturnBreakdown { stocks, bonds, cash, total_return, total: balance * total_return }
}

/// Accumulation-mode transition: grow the balance, add the year's
/// contribution, grow salary and expenses.
pub fn accumulation_year(
    state: &PortfolioState,
    input: &PlanInput,
    options: &SimulationOptions,
    rng: &mut impl Rng,
) -> PortfolioState {
    let years_to_retirement = input.retirement_age.saturating_sub(state.age);
    let returns = draw_year_returns(years_to_retirement, state.savings, options, rng);
    let inflation = draw_normal(rng, options.inflation_mean, options.inflation_volatility);
    let income_growth = draw_normal(
        rng,
        input.income_growth_rate / 100.0,
        options.income_growth_volatility,
    );

    PortfolioState {
        age: state.age + 1,
        savings: state.savings * (1.0 + returns.total_return) + input.annual_contribution(),
        income: state.income * (1.0 + income_growth),
        expenses: state.expenses * (1.0 + inflation),
        inflation,
        returns: Some(returns),
        withdrawal: None,
    }
}

/// Decumulation-mode transition: withdraw (cap applied fresh each year),
/// grow what remains, clamp at zero on depletion. Income is the guaranteed
/// benefit plus the realised withdrawal.
pub fn retirement_year(
    state: &PortfolioState,
    input: &PlanInput,
    options: &SimulationOptions,
    rng: &mut impl Rng,
) -> PortfolioState {
    let returns = draw_year_returns(
        input.retirement_age.saturating_sub(state.age),
        state.savings,
        options,
        rng,
    );
    let inflation = draw_normal(rng, options.inflation_mean, options.inflation_volatility);
    let withdrawal = withdrawal_amount(state.savings, input.desired_retirement_income, inflation);

    PortfolioState {
        age: state.age + 1,
        savings: (state.savings * (1.0 + returns.total_return) - withdrawal).max(0.0),
        income: input.guaranteed_income_estimate() * (1.0 + inflation) + withdrawal,
        expenses: state.expenses * (1.0 + inflation),
        inflation,
        returns: Some(returns),
        withdrawal: Some(withdrawal),
    }
}

/// Dynamic withdrawal policy. The desired income is the nominal baseline;
/// if it exceeds 5 % of the current balance the withdrawal is cut to
/// exactly 5 %, otherwise it grows with the year's inflation draw. A
/// depleted balance withdraws nothing (ruin, not an error).
pub fn withdrawal_amount(savings: f64, desired_income: f64, inflation: f64) -> f64 {
    if savings <= 0.0 {
        return 0.0;
    }
    if desired_income / savings > WITHDRAWAL_CAP_RATE {
        desired_income.min(savings * WITHDRAWAL_CAP_RATE)
    } else {
        desired_income * (1.0 + inflation)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;
    use crate::config::PlanInput;

    fn rng() -> ChaCha20Rng {
        ChaCha20Rng::seed_from_u64(42)
    }

    fn flat_options() -> SimulationOptions {
        SimulationOptions::default().deterministic()
    }

    // ── Withdrawal policy ────────────────────────────────────────────────

    #[test]
    fn withdrawal_capped_at_five_percent_of_balance() {
        // 60k desired on a 500k balance is a 12 % rate → cut to 25k.
        let w = withdrawal_amount(500_000.0, 60_000.0, 0.02);
        assert!((w - 25_000.0).abs() < 1e-9);
    }

    #[test]
    fn withdrawal_below_cap_grows_with_inflation() {
        // 60k on 2M is 3 % → inflate the baseline.
        let w = withdrawal_amount(2_000_000.0, 60_000.0, 0.03);
        assert!((w - 61_800.0).abs() < 1e-9);
    }

    #[test]
    fn withdrawal_at_exact_cap_boundary_is_not_cut() {
        // Exactly 5 % does not trip the strict > comparison.
        let w = withdrawal_amount(1_200_000.0, 60_000.0, 0.0);
        assert!((w - 60_000.0).abs() < 1e-9);
    }

    #[test]
    fn depleted_balance_withdraws_nothing() {
        assert_eq!(withdrawal_amount(0.0, 60_000.0, 0.02), 0.0);
    }

    #[test]
    fn cap_has_no_memory_of_prior_years() {
        // Same inputs give the same answer regardless of history.
        let a = withdrawal_amount(100_000.0, 60_000.0, 0.02);
        let b = withdrawal_amount(100_000.0, 60_000.0, 0.02);
        assert_eq!(a, b);
        assert!((a - 5_000.0).abs() < 1e-9);
    }

    // ── Accumulation ─────────────────────────────────────────────────────

    #[test]
    fn accumulation_year_is_exact_under_zero_volatility() {
        let input = PlanInput::canonical();
        let options = flat_options();
        let state = PortfolioState::initial(&input, &options);
        let next = accumulation_year(&state, &input, &options, &mut rng());

        // 25 years out → 25/30 equity blend of pure means.
        let equity = 25.0 / 30.0;
        let expected_return = equity * 0.10 + (1.0 - equity) * 0.04;
        let expected_savings = 200_000.0 * (1.0 + expected_return) + 12_000.0;

        assert_eq!(next.age, 41);
        assert!((next.savings - expected_savings).abs() < 1e-6);
        assert!((next.income - 72_000.0 * 1.03).abs() < 1e-6);
        assert!((next.expenses - state.expenses * 1.02).abs() < 1e-6);
        assert_eq!(next.withdrawal, None);
    }

    #[test]
    fn equity_share_glides_down_across_accumulation() {
        let input = PlanInput::canonical();
        let options = flat_options();
        let mut state = PortfolioState::initial(&input, &options);
        let mut previous_return = f64::MAX;
        for _ in 0..25 {
            state = accumulation_year(&state, &input, &options, &mut rng());
            let r = state.returns.expect("accumulation year must carry returns");
            // Stocks mean > bonds mean, so shrinking equity share shrinks
            // the blended mean return year over year (until the clamp).
            assert!(r.total_return <= previous_return + 1e-12);
            previous_return = r.total_return;
        }
    }

    // ── Decumulation ─────────────────────────────────────────────────────

    #[test]
    fn retirement_year_income_combines_benefit_and_withdrawal() {
        let input = PlanInput::canonical();
        let options = flat_options();
        let state = PortfolioState {
            age: 65,
            savings: 2_000_000.0,
            income: 0.0,
            expenses: 60_000.0,
            inflation: 0.02,
            returns: None,
            withdrawal: None,
        };
        let next = retirement_year(&state, &input, &options, &mut rng());
        let withdrawal = next.withdrawal.expect("retirement year must withdraw");
        let benefit = input.guaranteed_income_estimate() * 1.02;
        assert!((next.income - (benefit + withdrawal)).abs() < 1e-9);
    }

    #[test]
    fn savings_never_go_negative() {
        let input = PlanInput::canonical();
        let options = flat_options();
        let state = PortfolioState {
            age: 70,
            savings: 1_000.0,
            income: 0.0,
            expenses: 60_000.0,
            inflation: 0.02,
            returns: None,
            withdrawal: None,
        };
        let next = retirement_year(&state, &input, &options, &mut rng());
        assert!(next.savings >= 0.0);
    }

    #[test]
    fn ruined_state_stays_ruined() {
        let input = PlanInput::canonical();
        let options = flat_options();
        let mut state = PortfolioState {
            age: 70,
            savings: 0.0,
            income: 0.0,
            expenses: 60_000.0,
            inflation: 0.02,
            returns: None,
            withdrawal: None,
        };
        let mut rng = rng();
        for _ in 0..5 {
            state = retirement_year(&state, &input, &options, &mut rng);
            assert_eq!(state.savings, 0.0);
            assert_eq!(state.withdrawal, Some(0.0));
        }
    }

    // ── Serialisation contract ───────────────────────────────────────────

    #[test]
    fn state_serialises_with_consumer_field_names() {
        let state = PortfolioState {
            age: 66,
            savings: 1_000.0,
            income: 90.0,
            expenses: 80.0,
            inflation: 0.02,
            returns: Some(ReturnBreakdown {
                stocks: 0.1,
                bonds: 0.04,
                cash: 0.02,
                total_return: 0.05,
                total: 50.0,
            }),
            withdrawal: Some(45.0),
        };
        let json = serde_json::to_value(&state).unwrap();
        assert!(json.get("totalReturn").is_none());
        assert_eq!(json["returns"]["totalReturn"], 0.05);
        assert_eq!(json["withdrawal"], 45.0);
        assert_eq!(json["inflation"], 0.02);
    }

    #[test]
    fn accumulation_state_omits_withdrawal_in_json() {
        let input = PlanInput::canonical();
        let options = flat_options();
        let state = PortfolioState::initial(&input, &options);
        let next = accumulation_year(&state, &input, &options, &mut rng());
        let json = serde_json::to_value(&next).unwrap();
        assert!(json.get("withdrawal").is_none());
        assert!(json.get("returns").is_some());
    }
}
