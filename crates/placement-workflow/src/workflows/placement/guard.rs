use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::domain::{
    Actor, ActorRole, ApplicationId, ApplicationStep, Job, JobApplication, JobId,
    StepAlreadyStamped,
};
use super::registry::StepRegistry;
use super::repository::{ApplicationRepository, MarketplaceDirectory, RepositoryError};

/// Rejections raised before any state is touched.
#[derive(Debug, thiserror::Error)]
pub enum TransitionError {
    #[error("{actor} is not allowed to act on {resource}")]
    Forbidden { actor: Actor, resource: String },
    #[error("{role} cannot move an application from {from} to {to}")]
    IllegalTransition {
        role: ActorRole,
        from: ApplicationStep,
        to: ApplicationStep,
    },
    #[error("{candidate_name} is already shortlisted for this job (application {blocking_application_id})")]
    ConflictAlreadyShortlisted {
        blocking_application_id: ApplicationId,
        candidate_name: String,
    },
    #[error("application {application_id} is closed at {step}")]
    ApplicationClosed {
        application_id: ApplicationId,
        step: ApplicationStep,
    },
    #[error("job {0} referenced by the application does not exist")]
    JobNotFound(JobId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Proof that a transition passed every guard rule. Only `ApplicationService::advance`
/// consumes it.
#[derive(Debug)]
#[must_use = "an authorized transition does nothing until it is applied"]
pub struct AuthorizedTransition {
    application_id: ApplicationId,
    job: Job,
    actor: Actor,
    from: ApplicationStep,
    to: ApplicationStep,
}

impl AuthorizedTransition {
    pub fn job(&self) -> &Job {
        &self.job
    }

    pub fn from_step(&self) -> ApplicationStep {
        self.from
    }

    pub(crate) fn apply_to(
        self,
        application: &mut JobApplication,
        at: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        if application.id != self.application_id || application.current_step != self.from {
            return Err(TransitionError::IllegalTransition {
                role: self.actor.role,
                from: application.current_step,
                to: self.to,
            });
        }
        let from = application.current_step;
        application
            .enter_step(self.to, at)
            .map_err(|_: StepAlreadyStamped| TransitionError::IllegalTransition {
                role: self.actor.role,
                from,
                to: self.to,
            })
    }
}

/// Validates requested transitions. Reads only; never writes.
pub struct TransitionGuard<R, D> {
    repository: Arc<R>,
    directory: Arc<D>,
}

impl<R, D> TransitionGuard<R, D>
where
    R: ApplicationRepository,
    D: MarketplaceDirectory,
{
    pub fn new(repository: Arc<R>, directory: Arc<D>) -> Self {
        Self {
            repository,
            directory,
        }
    }

    /// Ownership rule: employers own the job, employees own the application.
    pub fn authorize(
        &self,
        application: &JobApplication,
        actor: &Actor,
    ) -> Result<Job, TransitionError> {
        let job = self
            .directory
            .job(&application.job_id)?
            .ok_or_else(|| TransitionError::JobNotFound(application.job_id.clone()))?;

        let owner = match actor.role {
            ActorRole::Employer => &job.employer_id,
            ActorRole::Employee => &application.employee_id,
        };
        if *owner != actor.id {
            return Err(TransitionError::Forbidden {
                actor: actor.clone(),
                resource: format!("application {}", application.id),
            });
        }
        Ok(job)
    }

    /// Runs ownership, terminal, legality and shortlist checks in that order.
    ///
    /// A shortlist target must be evaluated while the caller holds the job's lock, so the
    /// sibling query and the eventual write form one critical section.
    pub fn evaluate(
        &self,
        application: &JobApplication,
        target: ApplicationStep,
        actor: &Actor,
    ) -> Result<AuthorizedTransition, TransitionError> {
        let outcome = self.check(application, target, actor);
        if let Err(error) = &outcome {
            warn!(
                application_id = %application.id,
                from = %application.current_step,
                to = %target,
                actor = %actor,
                %error,
                "transition rejected"
            );
        }
        outcome
    }

    /// Terminal runs ahead of legality: a closed step permits nothing, so in the other order
    /// every attempt on a closed application would surface as an illegal transition.
    fn check(
        &self,
        application: &JobApplication,
        target: ApplicationStep,
        actor: &Actor,
    ) -> Result<AuthorizedTransition, TransitionError> {
        let job = self.authorize(application, actor)?;

        if application.is_closed() {
            return Err(TransitionError::ApplicationClosed {
                application_id: application.id.clone(),
                step: application.current_step,
            });
        }

        if !StepRegistry::permits(application.current_step, actor.role, target) {
            return Err(TransitionError::IllegalTransition {
                role: actor.role,
                from: application.current_step,
                to: target,
            });
        }

        if target == ApplicationStep::Shortlisted {
            self.ensure_no_shortlisted_sibling(application)?;
        }

        debug!(application_id = %application.id, to = %target, "transition authorized");
        Ok(AuthorizedTransition {
            application_id: application.id.clone(),
            job,
            actor: actor.clone(),
            from: application.current_step,
            to: target,
        })
    }

    fn ensure_no_shortlisted_sibling(
        &self,
        application: &JobApplication,
    ) -> Result<(), TransitionError> {
        let blocking = self
            .repository
            .for_job(&application.job_id)?
            .into_iter()
            .filter(|sibling| sibling.id != application.id)
            .find(|sibling| StepRegistry::holds_shortlist(sibling.current_step));

        match blocking {
            None => Ok(()),
            Some(sibling) => {
                let candidate_name = self
                    .directory
                    .candidate_name(&sibling.employee_id)?
                    .unwrap_or_else(|| sibling.employee_id.to_string());
                Err(TransitionError::ConflictAlreadyShortlisted {
                    blocking_application_id: sibling.id,
                    candidate_name,
                })
            }
        }
    }
}
