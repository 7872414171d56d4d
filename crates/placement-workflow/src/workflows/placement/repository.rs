use super::domain::{ApplicationId, DocumentRef, Job, JobApplication, JobId, UserId};

/// Storage abstraction so the service can be exercised in isolation.
pub trait ApplicationRepository: Send + Sync {
    /// Mint an id no stored application uses. Ids must stay unique across restarts.
    fn next_id(&self) -> Result<ApplicationId, RepositoryError>;
    fn insert(&self, application: JobApplication) -> Result<JobApplication, RepositoryError>;
    /// Replace the stored record in a single write.
    fn update(&self, application: JobApplication) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &ApplicationId) -> Result<Option<JobApplication>, RepositoryError>;
    /// Every application filed against `job_id`, in any step.
    fn for_job(&self, job_id: &JobId) -> Result<Vec<JobApplication>, RepositoryError>;
    fn for_employee(&self, employee_id: &UserId) -> Result<Vec<JobApplication>, RepositoryError>;
}

/// Read access to jobs and people owned by the wider marketplace.
pub trait MarketplaceDirectory: Send + Sync {
    fn job(&self, id: &JobId) -> Result<Option<Job>, RepositoryError>;
    fn jobs_for_employer(&self, employer_id: &UserId) -> Result<Vec<Job>, RepositoryError>;
    fn candidate_name(&self, employee_id: &UserId) -> Result<Option<String>, RepositoryError>;
    fn close_job(&self, id: &JobId) -> Result<(), RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Produces the employment contract for an application.
pub trait ContractDocumentProvider: Send + Sync {
    fn generate(&self, application: &JobApplication) -> Result<DocumentRef, ProviderError>;
}

/// Outbound delivery (e-mail, SMS). May fail; the caller decides whether to retry.
pub trait NotificationProvider: Send + Sync {
    fn send(&self, document: &DocumentRef, recipient: &Recipient)
        -> Result<Delivered, ProviderError>;
}

/// KYC result lookup consulted before a worker is allowed to apply.
pub trait IdentityVerificationProvider: Send + Sync {
    fn is_verified(&self, employee_id: &UserId) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub employee_id: UserId,
    pub display_name: String,
    pub application_id: ApplicationId,
}

/// Acknowledgement returned by a notification provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivered;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    #[error("provider rejected the request: {0}")]
    Rejected(String),
}
