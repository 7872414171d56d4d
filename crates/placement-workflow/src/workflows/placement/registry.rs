use super::domain::{ActorRole, ApplicationStep};

use ApplicationStep::*;

const CANONICAL_STEPS: [ApplicationStep; 14] = [
    ApplicationSubmitted,
    UnderReview,
    Shortlisted,
    InterviewScheduled,
    MedicalRequested,
    MedicalSubmitted,
    MedicalApproved,
    ContractSent,
    ContractSigned,
    VisaApplied,
    VisaApproved,
    FlightTicketSent,
    FlightTicketReceived,
    DeploymentReady,
];

/// Static lifecycle ordering and the per-role transition table.
///
/// Employers drive review, shortlisting, rejection, and the offer stages. Employees only
/// answer requests the employer made (medical, contract, flight ticket).
#[derive(Debug, Clone, Copy, Default)]
pub struct StepRegistry;

impl StepRegistry {
    pub const fn canonical() -> &'static [ApplicationStep] {
        &CANONICAL_STEPS
    }

    pub const fn total_steps() -> usize {
        CANONICAL_STEPS.len()
    }

    /// Zero-based position in canonical order. `None` for the `Rejected` branch.
    pub fn position(step: ApplicationStep) -> Option<usize> {
        CANONICAL_STEPS.iter().position(|candidate| *candidate == step)
    }

    /// Steps `role` may move an application to from `step`. Empty means no legal action.
    pub const fn next_steps(step: ApplicationStep, role: ActorRole) -> &'static [ApplicationStep] {
        match role {
            ActorRole::Employer => match step {
                ApplicationSubmitted => &[UnderReview, Shortlisted, Rejected],
                UnderReview => &[Shortlisted, Rejected],
                Shortlisted => &[InterviewScheduled, MedicalRequested, Rejected],
                InterviewScheduled => &[MedicalRequested, Rejected],
                MedicalSubmitted => &[MedicalApproved, Rejected],
                MedicalApproved => &[ContractSent],
                ContractSigned => &[VisaApplied],
                VisaApplied => &[VisaApproved],
                VisaApproved => &[FlightTicketSent],
                FlightTicketReceived => &[DeploymentReady],
                _ => &[],
            },
            ActorRole::Employee => match step {
                MedicalRequested => &[MedicalSubmitted],
                ContractSent => &[ContractSigned],
                FlightTicketSent => &[FlightTicketReceived],
                _ => &[],
            },
        }
    }

    pub fn permits(step: ApplicationStep, role: ActorRole, target: ApplicationStep) -> bool {
        Self::next_steps(step, role).contains(&target)
    }

    /// True when `step` counts against the one-candidate-per-job limit.
    pub fn holds_shortlist(step: ApplicationStep) -> bool {
        match (Self::position(step), Self::position(Shortlisted)) {
            (Some(position), Some(shortlisted)) => position >= shortlisted,
            _ => false,
        }
    }
}
