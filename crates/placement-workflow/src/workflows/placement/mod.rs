//! Placement application lifecycle: the ordered step machine, its transition guard, the
//! contract side effects, and the read projections served to employers and workers.

pub mod coordinator;
pub mod domain;
pub mod guard;
pub(crate) mod locks;
pub mod progress;
pub mod registry;
pub mod repository;
pub mod router;
pub mod service;
pub mod timeline;

#[cfg(test)]
mod tests;

pub use coordinator::{SideEffectCoordinator, SideEffectError};
pub use domain::{
    Actor, ActorRole, ApplicationId, ApplicationStatus, ApplicationStep, DocumentRef,
    FlightTicket, InterviewSlot, Job, JobApplication, JobId, JobStatus, StepDetails, TimelineEntry,
    TimelineStatus, UserId,
};
pub use guard::{AuthorizedTransition, TransitionError, TransitionGuard};
pub use progress::{ProgressProjector, UnknownStep};
pub use registry::StepRegistry;
pub use repository::{
    ApplicationRepository, ContractDocumentProvider, Delivered, IdentityVerificationProvider,
    MarketplaceDirectory, NotificationProvider, ProviderError, Recipient, RepositoryError,
};
pub use router::{placement_router, PlacementApi};
pub use service::{
    ApplicationProgress, ApplicationService, ApplicationServiceError, Clock, SubmitApplication,
    SystemClock,
};
pub use timeline::TimelineBuilder;
