use super::domain::{ApplicationStep, JobApplication};
use super::registry::StepRegistry;

/// Raised when a step cannot be placed on the canonical order. Indicates a corrupt record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("step '{0}' has no position in the canonical lifecycle")]
pub struct UnknownStep(pub String);

#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressProjector;

impl ProgressProjector {
    /// `round(100 * (position + 1) / total)` for a canonical step.
    pub fn percentage(step: ApplicationStep) -> Result<u8, UnknownStep> {
        let position =
            StepRegistry::position(step).ok_or_else(|| UnknownStep(step.label().to_string()))?;
        let total = StepRegistry::total_steps() as f64;
        let percentage = (100.0 * (position + 1) as f64 / total).round();
        Ok(percentage as u8)
    }

    /// Rejected applications report the furthest canonical step they reached.
    pub fn project(application: &JobApplication) -> Result<u8, UnknownStep> {
        if application.current_step != ApplicationStep::Rejected {
            return Self::percentage(application.current_step);
        }

        let furthest = StepRegistry::canonical()
            .iter()
            .rev()
            .find(|step| application.reached_at(**step).is_some())
            .copied()
            .ok_or_else(|| UnknownStep(application.current_step.label().to_string()))?;
        Self::percentage(furthest)
    }
}
