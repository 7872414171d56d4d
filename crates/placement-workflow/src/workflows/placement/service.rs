use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use super::coordinator::{SideEffectCoordinator, SideEffectError};
use super::domain::{
    Actor, ActorRole, ApplicationId, ApplicationStatus, ApplicationStep, FlightTicket,
    InterviewSlot, JobApplication, JobId, JobStatus, StepDetails, TimelineEntry, UserId,
};
use super::guard::{TransitionError, TransitionGuard};
use super::locks::{hold, KeyedLocks};
use super::progress::{ProgressProjector, UnknownStep};
use super::registry::StepRegistry;
use super::repository::{
    ApplicationRepository, ContractDocumentProvider, MarketplaceDirectory, NotificationProvider,
    Recipient, RepositoryError,
};
use super::timeline::TimelineBuilder;

/// Time source so transitions can be stamped deterministically in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// New application filed by a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitApplication {
    pub job_id: JobId,
    pub expected_salary: Option<u32>,
    pub cover_letter: Option<String>,
}

/// Read model behind the progress endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationProgress {
    pub application: JobApplication,
    pub status: ApplicationStatus,
    pub progress_percentage: u8,
    pub next_actions: Vec<ApplicationStep>,
    pub timeline: Vec<TimelineEntry>,
}

/// Façade composing the guard, side-effect coordinator, and read projections.
pub struct ApplicationService<R, D> {
    repository: Arc<R>,
    directory: Arc<D>,
    guard: TransitionGuard<R, D>,
    coordinator: SideEffectCoordinator,
    clock: Arc<dyn Clock>,
    application_locks: KeyedLocks,
    job_locks: KeyedLocks,
}

impl<R, D> ApplicationService<R, D>
where
    R: ApplicationRepository + 'static,
    D: MarketplaceDirectory + 'static,
{
    pub fn new(
        repository: Arc<R>,
        directory: Arc<D>,
        documents: Arc<dyn ContractDocumentProvider>,
        notifications: Arc<dyn NotificationProvider>,
    ) -> Self {
        Self::with_clock(
            repository,
            directory,
            documents,
            notifications,
            Arc::new(SystemClock),
        )
    }

    pub fn with_clock(
        repository: Arc<R>,
        directory: Arc<D>,
        documents: Arc<dyn ContractDocumentProvider>,
        notifications: Arc<dyn NotificationProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let guard = TransitionGuard::new(repository.clone(), directory.clone());
        Self {
            repository,
            directory,
            guard,
            coordinator: SideEffectCoordinator::new(documents, notifications),
            clock,
            application_locks: KeyedLocks::new(),
            job_locks: KeyedLocks::new(),
        }
    }

    pub fn coordinator(&self) -> &SideEffectCoordinator {
        &self.coordinator
    }

    /// File a new application at `APPLICATION_SUBMITTED`.
    ///
    /// Identity verification is the caller's responsibility.
    pub fn submit(
        &self,
        actor: &Actor,
        request: SubmitApplication,
    ) -> Result<JobApplication, ApplicationServiceError> {
        if actor.role != ActorRole::Employee {
            return Err(TransitionError::Forbidden {
                actor: actor.clone(),
                resource: format!("job {}", request.job_id),
            }
            .into());
        }

        let job = self
            .directory
            .job(&request.job_id)?
            .ok_or_else(|| ApplicationServiceError::JobNotFound(request.job_id.clone()))?;
        if job.status == JobStatus::Closed {
            return Err(ApplicationServiceError::JobClosed(job.id));
        }

        let job_slot = self.job_locks.slot(&job.id.0);
        let _job_guard = hold(&job_slot);

        let already_applied = self
            .repository
            .for_job(&job.id)?
            .iter()
            .any(|existing| existing.employee_id == actor.id);
        if already_applied {
            return Err(ApplicationServiceError::DuplicateApplication {
                job_id: job.id,
                employee_id: actor.id.clone(),
            });
        }

        let application = JobApplication::submitted(
            self.repository.next_id()?,
            job.id.clone(),
            actor.id.clone(),
            request.expected_salary,
            request.cover_letter,
            self.clock.now(),
        );
        let stored = self.repository.insert(application)?;
        info!(
            application_id = %stored.id,
            job_id = %stored.job_id,
            employee_id = %stored.employee_id,
            "application submitted"
        );
        Ok(stored)
    }

    /// What happened so far and what `actor` may do next.
    pub fn get_progress(
        &self,
        application_id: &ApplicationId,
        actor: &Actor,
    ) -> Result<ApplicationProgress, ApplicationServiceError> {
        let application = self.load(application_id)?;
        self.guard.authorize(&application, actor)?;

        let progress_percentage = ProgressProjector::project(&application).map_err(|err| {
            error!(
                application_id = %application.id,
                step = %application.current_step,
                error = %err,
                "application record has no canonical position"
            );
            ApplicationServiceError::UnknownStep(err)
        })?;

        Ok(ApplicationProgress {
            status: application.status(),
            progress_percentage,
            next_actions: StepRegistry::next_steps(application.current_step, actor.role).to_vec(),
            timeline: TimelineBuilder::build(&application),
            application,
        })
    }

    /// Move an application to `target`, running any required side effect first.
    ///
    /// Holds the application's lock for the whole guard-to-write window, and the job's
    /// lock first when shortlisting. Lock order is always job then application.
    pub fn advance(
        &self,
        application_id: &ApplicationId,
        actor: &Actor,
        target: ApplicationStep,
        details: StepDetails,
    ) -> Result<JobApplication, ApplicationServiceError> {
        let job_id = self.load(application_id)?.job_id;

        let job_slot =
            (target == ApplicationStep::Shortlisted).then(|| self.job_locks.slot(&job_id.0));
        let _job_guard = job_slot.as_deref().map(hold);
        let application_slot = self.application_locks.slot(&application_id.0);
        let _application_guard = hold(&application_slot);

        let mut application = self.load(application_id)?;
        let transition = self.guard.evaluate(&application, target, actor)?;

        attach_step_details(&mut application, target, details)?;

        let dispatched_contract = SideEffectCoordinator::requires_side_effect(target);
        if dispatched_contract {
            let recipient = self.recipient_for(&application)?;
            let document = self
                .coordinator
                .dispatch_contract(&application, &recipient)?;
            application.contract_ref = Some(document);
        }

        let job_to_close = transition.job().id.clone();
        let from = transition.from_step();
        transition.apply_to(&mut application, self.clock.now())?;
        self.repository.update(application.clone())?;
        if dispatched_contract {
            self.coordinator.release(&application.id);
        }

        info!(
            application_id = %application.id,
            from = %from,
            to = %target,
            actor = %actor,
            "application advanced"
        );

        if dispatched_contract {
            if let Err(err) = self.directory.close_job(&job_to_close) {
                warn!(job_id = %job_to_close, error = %err, "job could not be closed after contract dispatch");
            }
        }

        Ok(application)
    }

    /// Applications visible to `actor`, newest first.
    pub fn list_for_actor(
        &self,
        actor: &Actor,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<JobApplication>, ApplicationServiceError> {
        let mut applications = match actor.role {
            ActorRole::Employee => self.repository.for_employee(&actor.id)?,
            ActorRole::Employer => {
                let mut owned = Vec::new();
                for job in self.directory.jobs_for_employer(&actor.id)? {
                    owned.extend(self.repository.for_job(&job.id)?);
                }
                owned
            }
        };

        if let Some(wanted) = status {
            applications.retain(|application| application.status() == wanted);
        }
        applications.sort_by(|left, right| {
            right
                .created_at
                .cmp(&left.created_at)
                .then_with(|| right.id.cmp(&left.id))
        });
        Ok(applications)
    }

    fn load(&self, application_id: &ApplicationId) -> Result<JobApplication, ApplicationServiceError> {
        self.repository
            .fetch(application_id)?
            .ok_or_else(|| ApplicationServiceError::NotFound(application_id.clone()))
    }

    fn recipient_for(&self, application: &JobApplication) -> Result<Recipient, ApplicationServiceError> {
        let display_name = self
            .directory
            .candidate_name(&application.employee_id)?
            .unwrap_or_else(|| application.employee_id.to_string());
        Ok(Recipient {
            employee_id: application.employee_id.clone(),
            display_name,
            application_id: application.id.clone(),
        })
    }
}

/// Copies the data `target` carries onto the record, refusing when a required field is absent.
fn attach_step_details(
    application: &mut JobApplication,
    target: ApplicationStep,
    details: StepDetails,
) -> Result<(), ApplicationServiceError> {
    let missing = |detail: &'static str| ApplicationServiceError::MissingStepDetail {
        step: target,
        detail,
    };

    match target {
        ApplicationStep::InterviewScheduled => {
            let scheduled_for = details.interview_date.ok_or_else(|| missing("interviewDate"))?;
            application.interview = Some(InterviewSlot {
                scheduled_for,
                notes: details.interview_notes,
            });
        }
        ApplicationStep::MedicalSubmitted => {
            let document = details
                .medical_document
                .ok_or_else(|| missing("medicalDocumentRef"))?;
            application.medical_document = Some(document);
        }
        ApplicationStep::FlightTicketSent => {
            let document = details
                .flight_ticket
                .ok_or_else(|| missing("flightTicketRef"))?;
            let itinerary = details
                .flight_details
                .filter(|value| !value.is_null())
                .ok_or_else(|| missing("flightDetails"))?;
            application.flight_ticket = Some(FlightTicket {
                document,
                details: itinerary,
            });
        }
        _ => {}
    }
    Ok(())
}

/// Error raised by the application service.
#[derive(Debug, thiserror::Error)]
pub enum ApplicationServiceError {
    #[error("application {0} not found")]
    NotFound(ApplicationId),
    #[error("job {0} not found")]
    JobNotFound(JobId),
    #[error("job {0} is no longer accepting applications")]
    JobClosed(JobId),
    #[error("{employee_id} already applied to job {job_id}")]
    DuplicateApplication { job_id: JobId, employee_id: UserId },
    #[error("{step} requires {detail}")]
    MissingStepDetail {
        step: ApplicationStep,
        detail: &'static str,
    },
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    SideEffect(#[from] SideEffectError),
    #[error(transparent)]
    UnknownStep(#[from] UnknownStep),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl ApplicationServiceError {
    /// Whether repeating the same request may succeed once the blocking condition clears.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::SideEffect(err) => err.is_retryable(),
            Self::Transition(TransitionError::ConflictAlreadyShortlisted { .. }) => true,
            Self::Repository(RepositoryError::Unavailable(_)) => true,
            _ => false,
        }
    }
}
