use std::fs::File;
use std::io::{BufWriter, Write};

use retiremc::analysis::AnalysisResult;
use retiremc::config::{MarketCondition, PlanInput, SimulationOptions};
use retiremc::recommend::Recommendation;
use retiremc::simulation;

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    let mut input_path: Option<String> = None;
    let mut output_path = "projection.json".to_string();
    let mut seed_override: Option<u64> = None;
    let mut count_override: Option<usize> = None;
    let mut market_override: Option<MarketCondition> = None;
    let mut calibrate_target: Option<f64> = None;
    let mut quiet = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--input" => {
                i += 1;
                input_path = Some(args[i].clone());
            }
            "--output" => {
                i += 1;
                output_path = args[i].clone();
            }
            "--seed" => {
                i += 1;
                seed_override = Some(args[i].parse().expect("--seed requires a u64"));
            }
            "--count" => {
                i += 1;
                count_override =
                    Some(args[i].parse().expect("--count requires a positive integer"));
            }
            "--market" => {
                i += 1;
                market_override = Some(match args[i].as_str() {
                    "normal" => MarketCondition::Normal,
                    "bull" => MarketCondition::Bull,
                    "bear" => MarketCondition::Bear,
                    other => panic!("--market must be normal|bull|bear, got {other}"),
                });
            }
            "--calibrate" => {
                i += 1;
                calibrate_target =
                    Some(args[i].parse().expect("--calibrate requires a fraction"));
            }
            "--quiet" => quiet = true,
            _ => {}
        }
        i += 1;
    }

    let input: PlanInput = match input_path {
        Some(path) => {
            let file =
                File::open(&path).unwrap_or_else(|e| panic!("failed to open {path}: {e}"));
            serde_json::from_reader(file)
                .unwrap_or_else(|e| panic!("failed to parse {path}: {e}"))
        }
        None => PlanInput::canonical(),
    };

    let mut options = SimulationOptions::default();
    if let Some(seed) = seed_override {
        options.seed = seed;
    }
    if let Some(count) = count_override {
        options.simulation_count = count;
    }
    if let Some(market) = market_override {
        options.market_conditions = market;
    }

    if let Some(target) = calibrate_target {
        let rate = simulation::calibrate_plan(&input, &options, target)
            .unwrap_or_else(|e| fail(&e));
        println!(
            "Sustainable withdrawal rate at {:.0}% success target: {:.3}%",
            target * 100.0,
            rate * 100.0
        );
        return;
    }

    let output = simulation::run_plan(&input, &options).unwrap_or_else(|e| fail(&e));

    let file =
        File::create(&output_path).unwrap_or_else(|e| panic!("failed to create {output_path}: {e}"));
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, &output).expect("failed to serialize output");
    writer.flush().expect("failed to flush output");

    if !quiet {
        println!(
            "Projected {} trials × {} years → {output_path}",
            output.simulations.len(),
            input.horizon()
        );
        print_summary(&output.analysis);
        print_savings_bands(&output.analysis);
        print_recommendations(&output.recommendations);
    }
}

fn fail(e: &retiremc::ConfigError) -> ! {
    eprintln!("error: {e}");
    std::process::exit(1);
}

fn print_summary(analysis: &AnalysisResult) {
    let key = &analysis.key_metrics;
    let risk = &analysis.risk_metrics;

    println!("\n=== Projection summary ===");
    println!("  Success rate:                {:>8.1}%", analysis.success_rate);
    println!("  Probability of ruin:         {:>8.1}%", key.probability_of_ruin);
    println!("  Median final wealth:         {:>12.0}", key.median_final_wealth);
    println!(
        "  Sustainable withdrawal rate: {:>8.2}%",
        key.sustainable_withdrawal_rate * 100.0
    );
    println!("  Real wealth preservation:    {:>8.1}%", key.real_wealth_preservation);

    println!("\n=== Risk metrics ===");
    println!("  Volatility:   {:>7.3}", risk.volatility);
    println!("  Max drawdown: {:>6.1}%", risk.max_drawdown * 100.0);
    println!("  VaR95:        {:>7.3}", risk.tail_risk.var95);
    println!("  CVaR95:       {:>7.3}", risk.tail_risk.cvar95);
}

fn print_savings_bands(analysis: &AnalysisResult) {
    println!("\n=== Savings percentile bands ===");
    print!("{:>4}", "Age");
    let mut labels: Vec<&String> = analysis
        .confidence_intervals
        .savings
        .first()
        .map(|band| band.keys().collect())
        .unwrap_or_default();
    // BTreeMap order is lexicographic ("p5" after "p25"); show numeric order.
    labels.sort_by(|a, b| {
        let pct = |s: &str| s[1..].parse::<f64>().unwrap_or(0.0);
        pct(a).total_cmp(&pct(b))
    });
    for label in &labels {
        print!(" | {label:>12}");
    }
    println!();

    for (point, band) in analysis
        .median_path
        .iter()
        .zip(&analysis.confidence_intervals.savings)
    {
        print!("{:>4}", point.age);
        for label in &labels {
            print!(" | {:>12.0}", band[*label]);
        }
        println!();
    }
}

fn print_recommendations(recommendations: &[Recommendation]) {
    if recommendations.is_empty() {
        println!("\nNo recommendations — the plan is on track.");
        return;
    }
    println!("\n=== Recommendations ===");
    for rec in recommendations {
        println!(
            "  [{:?}] {} (urgency {:.1})",
            rec.priority, rec.suggestion, rec.urgency
        );
        println!("      Impact: {}", rec.impact);
        for action in &rec.actions {
            println!("      - {action}");
        }
    }
}
