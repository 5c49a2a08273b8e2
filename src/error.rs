use thiserror::Error;

/// Configuration problems caught before any simulation work starts.
///
/// Bad inputs are never silently clamped: the caller asked for something
/// the engine cannot honestly answer, so the call fails synchronously.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("simulation count must be positive")]
    NoSimulations,

    #[error("retirement age {retirement_age} must be greater than current age {age}")]
    RetirementBeforeCurrentAge { age: u32, retirement_age: u32 },

    #[error("years in retirement must be positive")]
    NoRetirementYears,

    #[error("analysis requires a non-empty batch")]
    EmptyBatch,
}
