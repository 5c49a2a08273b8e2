use serde::Serialize;

use crate::analysis::AnalysisResult;
use crate::config::PlanInput;

/// Success rate below which savings/spending/risk advice is always
/// escalated to high priority.
const ESCALATION_SUCCESS_RATE: f64 = 75.0;

/// Variant order gives Ord: Low < Medium < High.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Savings,
    Spending,
    Risk,
    Inflation,
    SocialSecurity,
}

/// One advisory action for the household, ranked for display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub priority: Priority,
    pub category: Category,
    pub suggestion: &'static str,
    pub impact: &'static str,
    pub actions: Vec<&'static str>,
    /// 0–10 urgency score used as the tie-breaker within a priority.
    pub urgency: f64,
}

/// Map analysis thresholds to advisory actions, then rank them. Pure
/// function of the analysis output and the original plan.
pub fn generate(analysis: &AnalysisResult, input: &PlanInput) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();
    let key = &analysis.key_metrics;

    if analysis.success_rate < 85.0 {
        recommendations.push(Recommendation {
            priority: Priority::High,
            category: Category::Savings,
            suggestion: "Increase retirement savings",
            impact: "Improve probability of retirement success",
            actions: vec![
                "Increase monthly contributions",
                "Review investment allocation",
                "Consider delaying retirement",
            ],
            urgency: 0.0,
        });
    }

    if key.sustainable_withdrawal_rate < 0.04 {
        recommendations.push(Recommendation {
            priority: Priority::High,
            category: Category::Spending,
            suggestion: "Adjust retirement spending expectations",
            impact: "Ensure sustainable retirement income",
            actions: vec![
                "Review discretionary spending plans",
                "Consider part-time work in retirement",
                "Explore ways to reduce fixed expenses",
            ],
            urgency: 0.0,
        });
    }

    if key.probability_of_ruin > 5.0 {
        recommendations.push(Recommendation {
            priority: Priority::High,
            category: Category::Risk,
            suggestion: "Enhance retirement risk management",
            impact: "Reduce probability of outliving assets",
            actions: vec![
                "Build larger cash reserves",
                "Consider longevity insurance",
                "Develop multiple income streams",
            ],
            urgency: 0.0,
        });
    }

    if key.real_wealth_preservation < 50.0 {
        recommendations.push(Recommendation {
            priority: Priority::Medium,
            category: Category::Inflation,
            suggestion: "Strengthen inflation protection",
            impact: "Maintain purchasing power over time",
            actions: vec![
                "Include inflation-protected securities",
                "Consider real estate investments",
                "Review fixed income allocation",
            ],
            urgency: 0.0,
        });
    }

    if input.retirement_age < 70 && analysis.success_rate < 90.0 {
        recommendations.push(Recommendation {
            priority: Priority::Medium,
            category: Category::SocialSecurity,
            suggestion: "Optimize guaranteed-income strategy",
            impact: "Maximize guaranteed lifetime income",
            actions: vec![
                "Consider delaying benefits to age 70",
                "Review spousal benefit options",
                "Calculate break-even analysis",
            ],
            urgency: 0.0,
        });
    }

    prioritize(recommendations, analysis)
}

/// Escalate and rank: a weak overall success rate forces every
/// savings/spending/risk recommendation to high priority; ordering is by
/// priority, ties broken by urgency.
pub fn prioritize(
    mut recommendations: Vec<Recommendation>,
    analysis: &AnalysisResult,
) -> Vec<Recommendation> {
    for rec in &mut recommendations {
        if analysis.success_rate < ESCALATION_SUCCESS_RATE
            && matches!(rec.category, Category::Savings | Category::Spending | Category::Risk)
        {
            rec.priority = Priority::High;
        }
        rec.urgency = urgency(rec.category, analysis);
    }

    recommendations.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| b.urgency.total_cmp(&a.urgency))
    });
    recommendations
}

/// Urgency score in [0, 10], base 5, pushed up by how badly the relevant
/// metric misses its comfort zone.
fn urgency(category: Category, analysis: &AnalysisResult) -> f64 {
    let key = &analysis.key_metrics;
    let score = match category {
        Category::Savings => 5.0 + (100.0 - analysis.success_rate) / 10.0,
        Category::Risk => 5.0 + key.probability_of_ruin / 5.0,
        Category::Spending => 5.0 + (4.0 - key.sustainable_withdrawal_rate * 100.0) / 2.0,
        _ => 5.0 + (90.0 - analysis.success_rate) / 20.0,
    };
    score.clamp(0.0, 10.0)
}
