use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::progress::UnknownStep;

/// Identifier wrapper for job applications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

/// Identifier wrapper for job listings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub String);

/// Identifier shared by employer and employee accounts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

macro_rules! display_as_inner {
    ($($ty:ty),+) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        })+
    };
}

display_as_inner!(ApplicationId, JobId, UserId);

/// Lifecycle steps of a placement application.
///
/// Declaration order is the canonical order, with the `Rejected` branch last, so the
/// derived `Ord` doubles as the timeline tie-breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStep {
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
    Rejected,
}

impl ApplicationStep {
    pub const fn label(self) -> &'static str {
        match self {
            Self::ApplicationSubmitted => "APPLICATION_SUBMITTED",
            Self::UnderReview => "UNDER_REVIEW",
            Self::Shortlisted => "SHORTLISTED",
            Self::InterviewScheduled => "INTERVIEW_SCHEDULED",
            Self::MedicalRequested => "MEDICAL_REQUESTED",
            Self::MedicalSubmitted => "MEDICAL_SUBMITTED",
            Self::MedicalApproved => "MEDICAL_APPROVED",
            Self::ContractSent => "CONTRACT_SENT",
            Self::ContractSigned => "CONTRACT_SIGNED",
            Self::VisaApplied => "VISA_APPLIED",
            Self::VisaApproved => "VISA_APPROVED",
            Self::FlightTicketSent => "FLIGHT_TICKET_SENT",
            Self::FlightTicketReceived => "FLIGHT_TICKET_RECEIVED",
            Self::DeploymentReady => "DEPLOYMENT_READY",
            Self::Rejected => "REJECTED",
        }
    }

    /// No transition leaves a terminal step.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::DeploymentReady)
    }

    /// Legacy short status derived from the step. Never stored.
    pub const fn status(self) -> ApplicationStatus {
        match self {
            Self::ApplicationSubmitted => ApplicationStatus::Pending,
            Self::UnderReview => ApplicationStatus::UnderReview,
            Self::Shortlisted => ApplicationStatus::Shortlisted,
            Self::InterviewScheduled => ApplicationStatus::InterviewScheduled,
            Self::MedicalRequested | Self::MedicalSubmitted | Self::MedicalApproved => {
                ApplicationStatus::MedicalPending
            }
            Self::ContractSent | Self::ContractSigned => ApplicationStatus::ContractPending,
            Self::VisaApplied | Self::VisaApproved => ApplicationStatus::VisaProcessing,
            Self::FlightTicketSent | Self::FlightTicketReceived => ApplicationStatus::FlightPending,
            Self::DeploymentReady => ApplicationStatus::ReadyForDeployment,
            Self::Rejected => ApplicationStatus::Rejected,
        }
    }
}

impl fmt::Display for ApplicationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ApplicationStep {
    type Err = UnknownStep;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        const ALL: [ApplicationStep; 15] = [
            ApplicationStep::ApplicationSubmitted,
            ApplicationStep::UnderReview,
            ApplicationStep::Shortlisted,
            ApplicationStep::InterviewScheduled,
            ApplicationStep::MedicalRequested,
            ApplicationStep::MedicalSubmitted,
            ApplicationStep::MedicalApproved,
            ApplicationStep::ContractSent,
            ApplicationStep::ContractSigned,
            ApplicationStep::VisaApplied,
            ApplicationStep::VisaApproved,
            ApplicationStep::FlightTicketSent,
            ApplicationStep::FlightTicketReceived,
            ApplicationStep::DeploymentReady,
            ApplicationStep::Rejected,
        ];

        let wanted = raw.trim();
        ALL.into_iter()
            .find(|step| step.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownStep(raw.to_string()))
    }
}

/// Short status vocabulary kept for listing filters and older clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    Pending,
    UnderReview,
    Shortlisted,
    InterviewScheduled,
    MedicalPending,
    ContractPending,
    VisaProcessing,
    FlightPending,
    ReadyForDeployment,
    Rejected,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::UnderReview => "UNDER_REVIEW",
            Self::Shortlisted => "SHORTLISTED",
            Self::InterviewScheduled => "INTERVIEW_SCHEDULED",
            Self::MedicalPending => "MEDICAL_PENDING",
            Self::ContractPending => "CONTRACT_PENDING",
            Self::VisaProcessing => "VISA_PROCESSING",
            Self::FlightPending => "FLIGHT_PENDING",
            Self::ReadyForDeployment => "READY_FOR_DEPLOYMENT",
            Self::Rejected => "REJECTED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActorRole {
    Employer,
    Employee,
}

impl ActorRole {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Employer => "EMPLOYER",
            Self::Employee => "EMPLOYEE",
        }
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Role and identity of whoever initiated the request. Supplied per call, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub role: ActorRole,
    pub id: UserId,
}

impl Actor {
    pub fn employer(id: impl Into<String>) -> Self {
        Self {
            role: ActorRole::Employer,
            id: UserId(id.into()),
        }
    }

    pub fn employee(id: impl Into<String>) -> Self {
        Self {
            role: ActorRole::Employee,
            id: UserId(id.into()),
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.role, self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Open,
    Closed,
}

/// Job listing owned by an employer. Referenced, not owned, by applications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub employer_id: UserId,
    pub title: String,
    pub status: JobStatus,
}

/// Reference to a generated contract artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentRef(pub String);

display_as_inner!(DocumentRef);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewSlot {
    pub scheduled_for: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Ticket issued by the employer before travel. `details` is the itinerary as sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightTicket {
    pub document: DocumentRef,
    pub details: serde_json::Value,
}

/// Extra data a transition may carry.
///
/// `INTERVIEW_SCHEDULED` needs `interview_date`, `MEDICAL_SUBMITTED` needs
/// `medical_document`, and `FLIGHT_TICKET_SENT` needs both flight fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepDetails {
    pub interview_date: Option<DateTime<Utc>>,
    pub interview_notes: Option<String>,
    pub medical_document: Option<DocumentRef>,
    pub flight_ticket: Option<DocumentRef>,
    pub flight_details: Option<serde_json::Value>,
}

/// A worker's application to a job.
///
/// `step_timestamps` is the audit trail: a step is present iff it was reached and an entry
/// is never rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobApplication {
    pub id: ApplicationId,
    pub job_id: JobId,
    pub employee_id: UserId,
    pub current_step: ApplicationStep,
    pub expected_salary: Option<u32>,
    pub cover_letter: Option<String>,
    pub step_timestamps: BTreeMap<ApplicationStep, DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interview: Option<InterviewSlot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_ref: Option<DocumentRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medical_document: Option<DocumentRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flight_ticket: Option<FlightTicket>,
}

impl JobApplication {
    pub fn submitted(
        id: ApplicationId,
        job_id: JobId,
        employee_id: UserId,
        expected_salary: Option<u32>,
        cover_letter: Option<String>,
        at: DateTime<Utc>,
    ) -> Self {
        let mut step_timestamps = BTreeMap::new();
        step_timestamps.insert(ApplicationStep::ApplicationSubmitted, at);
        Self {
            id,
            job_id,
            employee_id,
            current_step: ApplicationStep::ApplicationSubmitted,
            expected_salary,
            cover_letter,
            step_timestamps,
            created_at: at,
            interview: None,
            contract_ref: None,
            medical_document: None,
            flight_ticket: None,
        }
    }

    pub fn reached_at(&self, step: ApplicationStep) -> Option<DateTime<Utc>> {
        self.step_timestamps.get(&step).copied()
    }

    pub fn status(&self) -> ApplicationStatus {
        self.current_step.status()
    }

    pub fn is_closed(&self) -> bool {
        self.current_step.is_terminal()
    }

    /// Move to `step`, stamping it. Refuses to overwrite an existing stamp.
    pub(crate) fn enter_step(
        &mut self,
        step: ApplicationStep,
        at: DateTime<Utc>,
    ) -> Result<(), StepAlreadyStamped> {
        if let Some(existing) = self.reached_at(step) {
            return Err(StepAlreadyStamped {
                step,
                stamped_at: existing,
            });
        }
        self.step_timestamps.insert(step, at);
        self.current_step = step;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("step {step} was already stamped at {stamped_at}")]
pub struct StepAlreadyStamped {
    pub step: ApplicationStep,
    pub stamped_at: DateTime<Utc>,
}

/// Chronological marker derived from the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimelineStatus {
    Current,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineEntry {
    pub step: ApplicationStep,
    pub timestamp: DateTime<Utc>,
    pub status: TimelineStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, minute, 0)
            .single()
            .expect("valid timestamp")
    }

    #[test]
    fn parses_step_names_case_insensitively() {
        assert_eq!(
            "contract_sent".parse::<ApplicationStep>(),
            Ok(ApplicationStep::ContractSent)
        );
        assert_eq!(
            "SHORTLISTED".parse::<ApplicationStep>(),
            Ok(ApplicationStep::Shortlisted)
        );
        assert_eq!(
            "HIRED".parse::<ApplicationStep>(),
            Err(UnknownStep("HIRED".to_string()))
        );
    }

    #[test]
    fn serde_names_match_labels() {
        let json = serde_json::to_string(&ApplicationStep::FlightTicketReceived).expect("json");
        assert_eq!(json, "\"FLIGHT_TICKET_RECEIVED\"");
        let json = serde_json::to_string(&ApplicationStatus::ReadyForDeployment).expect("json");
        assert_eq!(json, "\"READY_FOR_DEPLOYMENT\"");
    }

    #[test]
    fn status_groups_medical_and_contract_phases() {
        assert_eq!(
            ApplicationStep::MedicalSubmitted.status(),
            ApplicationStatus::MedicalPending
        );
        assert_eq!(
            ApplicationStep::ContractSigned.status(),
            ApplicationStatus::ContractPending
        );
        assert_eq!(
            ApplicationStep::ApplicationSubmitted.status(),
            ApplicationStatus::Pending
        );
    }

    #[test]
    fn enter_step_refuses_to_restamp() {
        let mut application = JobApplication::submitted(
            ApplicationId("app-1".to_string()),
            JobId("job-1".to_string()),
            UserId("worker-1".to_string()),
            Some(350),
            None,
            at(0),
        );

        application
            .enter_step(ApplicationStep::UnderReview, at(5))
            .expect("first stamp");
        let err = application
            .enter_step(ApplicationStep::UnderReview, at(9))
            .expect_err("second stamp refused");

        assert_eq!(err.stamped_at, at(5));
        assert_eq!(application.reached_at(ApplicationStep::UnderReview), Some(at(5)));
    }

    #[test]
    fn application_round_trips_with_step_keyed_timestamps() {
        let application = JobApplication::submitted(
            ApplicationId("app-2".to_string()),
            JobId("job-1".to_string()),
            UserId("worker-2".to_string()),
            None,
            Some("Five years of childcare".to_string()),
            at(1),
        );
        let value = serde_json::to_value(&application).expect("serializes");
        assert_eq!(
            value["stepTimestamps"]["APPLICATION_SUBMITTED"],
            serde_json::json!("2025-03-01T09:01:00Z")
        );
        let back: JobApplication = serde_json::from_value(value).expect("deserializes");
        assert_eq!(back, application);
    }
}
