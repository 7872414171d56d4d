use metrics_exporter_prometheus::PrometheusHandle;
use placement_workflow::workflows::placement::{
    ApplicationId, ApplicationRepository, ContractDocumentProvider, Delivered, DocumentRef,
    IdentityVerificationProvider, Job, JobApplication, JobId, JobStatus, MarketplaceDirectory,
    NotificationProvider, ProviderError, Recipient, RepositoryError, UserId,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable("in-memory store poisoned".to_string()))
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryApplicationRepository {
    records: Arc<Mutex<HashMap<ApplicationId, JobApplication>>>,
    sequence: Arc<AtomicU64>,
}

impl ApplicationRepository for InMemoryApplicationRepository {
    /// Skips ids already present, so records loaded from elsewhere never collide.
    fn next_id(&self) -> Result<ApplicationId, RepositoryError> {
        let guard = lock(&self.records)?;
        loop {
            let candidate = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
            let id = ApplicationId(format!("app-{candidate:06}"));
            if !guard.contains_key(&id) {
                return Ok(id);
            }
        }
    }

    fn insert(&self, application: JobApplication) -> Result<JobApplication, RepositoryError> {
        let mut guard = lock(&self.records)?;
        if guard.contains_key(&application.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(application.id.clone(), application.clone());
        Ok(application)
    }

    fn update(&self, application: JobApplication) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.records)?;
        if guard.contains_key(&application.id) {
            guard.insert(application.id.clone(), application);
            Ok(())
        } else {
            Err(RepositoryError::NotFound)
        }
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<JobApplication>, RepositoryError> {
        Ok(lock(&self.records)?.get(id).cloned())
    }

    fn for_job(&self, job_id: &JobId) -> Result<Vec<JobApplication>, RepositoryError> {
        Ok(lock(&self.records)?
            .values()
            .filter(|application| &application.job_id == job_id)
            .cloned()
            .collect())
    }

    fn for_employee(&self, employee_id: &UserId) -> Result<Vec<JobApplication>, RepositoryError> {
        Ok(lock(&self.records)?
            .values()
            .filter(|application| &application.employee_id == employee_id)
            .cloned()
            .collect())
    }
}

/// Jobs and worker display names the marketplace would normally own.
#[derive(Default, Clone)]
pub(crate) struct InMemoryDirectory {
    jobs: Arc<Mutex<HashMap<JobId, Job>>>,
    names: Arc<Mutex<HashMap<UserId, String>>>,
}

pub(crate) const DEMO_EMPLOYER: &str = "employer-chan";
pub(crate) const DEMO_JOB: &str = "job-000001";
pub(crate) const DEMO_WORKERS: [(&str, &str); 3] = [
    ("worker-ana", "Ana Reyes"),
    ("worker-dewi", "Dewi Lestari"),
    ("worker-joy", "Joy Mendoza"),
];

impl InMemoryDirectory {
    pub(crate) fn seeded() -> Self {
        let directory = Self::default();
        directory.publish(Job {
            id: JobId(DEMO_JOB.to_string()),
            employer_id: UserId(DEMO_EMPLOYER.to_string()),
            title: "Live-in domestic helper, Kowloon".to_string(),
            status: JobStatus::Open,
        });
        directory.publish(Job {
            id: JobId("job-000002".to_string()),
            employer_id: UserId("employer-tan".to_string()),
            title: "Elderly caregiver, Singapore".to_string(),
            status: JobStatus::Open,
        });
        for (id, name) in DEMO_WORKERS {
            directory.register_candidate(id, name);
        }
        directory
    }

    pub(crate) fn publish(&self, job: Job) {
        if let Ok(mut jobs) = lock(&self.jobs) {
            jobs.insert(job.id.clone(), job);
        }
    }

    pub(crate) fn register_candidate(&self, id: &str, name: &str) {
        if let Ok(mut names) = lock(&self.names) {
            names.insert(UserId(id.to_string()), name.to_string());
        }
    }
}

impl MarketplaceDirectory for InMemoryDirectory {
    fn job(&self, id: &JobId) -> Result<Option<Job>, RepositoryError> {
        Ok(lock(&self.jobs)?.get(id).cloned())
    }

    fn jobs_for_employer(&self, employer_id: &UserId) -> Result<Vec<Job>, RepositoryError> {
        Ok(lock(&self.jobs)?
            .values()
            .filter(|job| &job.employer_id == employer_id)
            .cloned()
            .collect())
    }

    fn candidate_name(&self, employee_id: &UserId) -> Result<Option<String>, RepositoryError> {
        Ok(lock(&self.names)?.get(employee_id).cloned())
    }

    fn close_job(&self, id: &JobId) -> Result<(), RepositoryError> {
        let mut jobs = lock(&self.jobs)?;
        let job = jobs.get_mut(id).ok_or(RepositoryError::NotFound)?;
        job.status = JobStatus::Closed;
        Ok(())
    }
}

/// Issues contract references such as `KZ-000001`.
pub(crate) struct PrefixedContractGenerator {
    prefix: String,
    sequence: AtomicU64,
}

impl PrefixedContractGenerator {
    pub(crate) fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            sequence: AtomicU64::new(1),
        }
    }
}

impl ContractDocumentProvider for PrefixedContractGenerator {
    fn generate(&self, application: &JobApplication) -> Result<DocumentRef, ProviderError> {
        let number = self.sequence.fetch_add(1, Ordering::Relaxed);
        let document = DocumentRef(format!("{}-{number:06}", self.prefix));
        info!(application_id = %application.id, %document, "contract generated");
        Ok(document)
    }
}

/// Records deliveries instead of sending them.
#[derive(Default)]
pub(crate) struct LoggingNotifier {
    fail_next: AtomicBool,
    outbox: Mutex<Vec<(DocumentRef, Recipient)>>,
}

impl LoggingNotifier {
    pub(crate) fn failing_once() -> Self {
        Self {
            fail_next: AtomicBool::new(true),
            outbox: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn delivered(&self) -> usize {
        lock(&self.outbox).map(|outbox| outbox.len()).unwrap_or(0)
    }
}

impl NotificationProvider for LoggingNotifier {
    fn send(
        &self,
        document: &DocumentRef,
        recipient: &Recipient,
    ) -> Result<Delivered, ProviderError> {
        if self.fail_next.swap(false, Ordering::AcqRel) {
            return Err(ProviderError::Unavailable(
                "sms gateway did not acknowledge".to_string(),
            ));
        }
        info!(
            %document,
            employee_id = %recipient.employee_id,
            display_name = %recipient.display_name,
            "contract notification queued"
        );
        lock(&self.outbox)
            .map_err(|err| ProviderError::Unavailable(err.to_string()))?
            .push((document.clone(), recipient.clone()));
        Ok(Delivered)
    }
}

pub(crate) struct AllowListIdentity {
    verified: HashSet<UserId>,
}

impl AllowListIdentity {
    pub(crate) fn new<'a>(ids: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            verified: ids.into_iter().map(|id| UserId(id.to_string())).collect(),
        }
    }

    pub(crate) fn demo() -> Self {
        Self::new(DEMO_WORKERS.iter().map(|(id, _)| *id))
    }
}

impl IdentityVerificationProvider for AllowListIdentity {
    fn is_verified(&self, employee_id: &UserId) -> bool {
        self.verified.contains(employee_id)
    }
}
