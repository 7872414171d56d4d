use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::placement::domain::{
    ApplicationId, ApplicationStep, DocumentRef, Job, JobApplication, JobId, JobStatus,
    StepDetails, UserId,
};
use crate::workflows::placement::repository::{
    ApplicationRepository, ContractDocumentProvider, Delivered, IdentityVerificationProvider,
    MarketplaceDirectory, NotificationProvider, ProviderError, Recipient, RepositoryError,
};
use crate::workflows::placement::{placement_router, ApplicationService, Clock, PlacementApi};

pub(super) const EMPLOYER: &str = "employer-hk-01";
pub(super) const OTHER_EMPLOYER: &str = "employer-hk-02";
pub(super) const WORKER: &str = "worker-ph-01";
pub(super) const SECOND_WORKER: &str = "worker-ph-02";
pub(super) const JOB: &str = "job-nanny-01";
pub(super) const OTHER_JOB: &str = "job-cook-02";

pub(super) fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 8, 0, 0)
        .single()
        .expect("valid timestamp")
}

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    pub(super) records: Arc<Mutex<HashMap<ApplicationId, JobApplication>>>,
    sequence: Arc<AtomicU64>,
}

impl MemoryRepository {
    pub(super) fn stored(&self, id: &ApplicationId) -> JobApplication {
        self.records
            .lock()
            .expect("repository mutex poisoned")
            .get(id)
            .cloned()
            .expect("application stored")
    }
}

impl ApplicationRepository for MemoryRepository {
    fn next_id(&self) -> Result<ApplicationId, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        loop {
            let candidate = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
            let id = ApplicationId(format!("app-{candidate:06}"));
            if !guard.contains_key(&id) {
                return Ok(id);
            }
        }
    }

    fn insert(&self, application: JobApplication) -> Result<JobApplication, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&application.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(application.id.clone(), application.clone());
        Ok(application)
    }

    fn update(&self, application: JobApplication) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        guard.insert(application.id.clone(), application);
        Ok(())
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<JobApplication>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn for_job(&self, job_id: &JobId) -> Result<Vec<JobApplication>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .filter(|application| &application.job_id == job_id)
            .cloned()
            .collect())
    }

    fn for_employee(&self, employee_id: &UserId) -> Result<Vec<JobApplication>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .filter(|application| &application.employee_id == employee_id)
            .cloned()
            .collect())
    }
}

pub(super) struct UnavailableRepository;

impl ApplicationRepository for UnavailableRepository {
    fn next_id(&self) -> Result<ApplicationId, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn insert(&self, _application: JobApplication) -> Result<JobApplication, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update(&self, _application: JobApplication) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &ApplicationId) -> Result<Option<JobApplication>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn for_job(&self, _job_id: &JobId) -> Result<Vec<JobApplication>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn for_employee(&self, _employee_id: &UserId) -> Result<Vec<JobApplication>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryDirectory {
    jobs: Arc<Mutex<HashMap<JobId, Job>>>,
    names: Arc<Mutex<HashMap<UserId, String>>>,
}

impl MemoryDirectory {
    pub(super) fn seeded() -> Self {
        let directory = Self::default();
        directory.add_job(JOB, EMPLOYER, JobStatus::Open);
        directory.add_job(OTHER_JOB, OTHER_EMPLOYER, JobStatus::Open);
        directory.add_candidate(WORKER, "Maria Santos");
        directory.add_candidate(SECOND_WORKER, "Siti Rahayu");
        directory
    }

    pub(super) fn add_job(&self, id: &str, employer: &str, status: JobStatus) {
        self.jobs.lock().expect("directory mutex poisoned").insert(
            JobId(id.to_string()),
            Job {
                id: JobId(id.to_string()),
                employer_id: UserId(employer.to_string()),
                title: format!("Listing {id}"),
                status,
            },
        );
    }

    pub(super) fn add_candidate(&self, id: &str, name: &str) {
        self.names
            .lock()
            .expect("directory mutex poisoned")
            .insert(UserId(id.to_string()), name.to_string());
    }

    pub(super) fn job_status(&self, id: &str) -> JobStatus {
        self.jobs
            .lock()
            .expect("directory mutex poisoned")
            .get(&JobId(id.to_string()))
            .map(|job| job.status)
            .expect("job seeded")
    }
}

impl MarketplaceDirectory for MemoryDirectory {
    fn job(&self, id: &JobId) -> Result<Option<Job>, RepositoryError> {
        Ok(self
            .jobs
            .lock()
            .expect("directory mutex poisoned")
            .get(id)
            .cloned())
    }

    fn jobs_for_employer(&self, employer_id: &UserId) -> Result<Vec<Job>, RepositoryError> {
        Ok(self
            .jobs
            .lock()
            .expect("directory mutex poisoned")
            .values()
            .filter(|job| &job.employer_id == employer_id)
            .cloned()
            .collect())
    }

    fn candidate_name(&self, employee_id: &UserId) -> Result<Option<String>, RepositoryError> {
        Ok(self
            .names
            .lock()
            .expect("directory mutex poisoned")
            .get(employee_id)
            .cloned())
    }

    fn close_job(&self, id: &JobId) -> Result<(), RepositoryError> {
        let mut jobs = self.jobs.lock().expect("directory mutex poisoned");
        let job = jobs.get_mut(id).ok_or(RepositoryError::NotFound)?;
        job.status = JobStatus::Closed;
        Ok(())
    }
}

/// Generates `KZ-000001`, `KZ-000002`, ... after failing the first `failures` calls.
#[derive(Default)]
pub(super) struct ScriptedDocuments {
    failures: Mutex<usize>,
    generated: Mutex<Vec<DocumentRef>>,
}

impl ScriptedDocuments {
    pub(super) fn failing(failures: usize) -> Self {
        Self {
            failures: Mutex::new(failures),
            generated: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn generated(&self) -> Vec<DocumentRef> {
        self.generated.lock().expect("documents mutex poisoned").clone()
    }
}

impl ContractDocumentProvider for ScriptedDocuments {
    fn generate(&self, _application: &JobApplication) -> Result<DocumentRef, ProviderError> {
        let mut failures = self.failures.lock().expect("documents mutex poisoned");
        if *failures > 0 {
            *failures -= 1;
            return Err(ProviderError::Unavailable("pdf renderer down".to_string()));
        }
        let mut generated = self.generated.lock().expect("documents mutex poisoned");
        let document = DocumentRef(format!("KZ-{:06}", generated.len() + 1));
        generated.push(document.clone());
        Ok(document)
    }
}

#[derive(Default)]
pub(super) struct ScriptedNotifier {
    failures: Mutex<usize>,
    sent: Mutex<Vec<(DocumentRef, Recipient)>>,
}

impl ScriptedNotifier {
    pub(super) fn failing(failures: usize) -> Self {
        Self {
            failures: Mutex::new(failures),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn sent(&self) -> Vec<(DocumentRef, Recipient)> {
        self.sent.lock().expect("notifier mutex poisoned").clone()
    }
}

impl NotificationProvider for ScriptedNotifier {
    fn send(
        &self,
        document: &DocumentRef,
        recipient: &Recipient,
    ) -> Result<Delivered, ProviderError> {
        let mut failures = self.failures.lock().expect("notifier mutex poisoned");
        if *failures > 0 {
            *failures -= 1;
            return Err(ProviderError::Unavailable("smtp relay timeout".to_string()));
        }
        self.sent
            .lock()
            .expect("notifier mutex poisoned")
            .push((document.clone(), recipient.clone()));
        Ok(Delivered)
    }
}

/// Advances one minute per reading.
pub(super) struct SteppingClock {
    next: Mutex<DateTime<Utc>>,
}

impl SteppingClock {
    pub(super) fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            next: Mutex::new(start),
        }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> DateTime<Utc> {
        let mut next = self.next.lock().expect("clock mutex poisoned");
        let current = *next;
        *next = current + Duration::minutes(1);
        current
    }
}

pub(super) struct StaticIdentity {
    verified: HashSet<UserId>,
}

impl StaticIdentity {
    pub(super) fn verifying(ids: &[&str]) -> Self {
        Self {
            verified: ids.iter().map(|id| UserId(id.to_string())).collect(),
        }
    }
}

impl IdentityVerificationProvider for StaticIdentity {
    fn is_verified(&self, employee_id: &UserId) -> bool {
        self.verified.contains(employee_id)
    }
}

pub(super) struct Harness {
    pub(super) service: Arc<ApplicationService<MemoryRepository, MemoryDirectory>>,
    pub(super) repository: Arc<MemoryRepository>,
    pub(super) directory: Arc<MemoryDirectory>,
    pub(super) documents: Arc<ScriptedDocuments>,
    pub(super) notifier: Arc<ScriptedNotifier>,
}

pub(super) fn harness() -> Harness {
    harness_with(ScriptedDocuments::default(), ScriptedNotifier::default())
}

pub(super) fn harness_with(documents: ScriptedDocuments, notifier: ScriptedNotifier) -> Harness {
    let repository = Arc::new(MemoryRepository::default());
    let directory = Arc::new(MemoryDirectory::seeded());
    let documents = Arc::new(documents);
    let notifier = Arc::new(notifier);
    let service = Arc::new(ApplicationService::with_clock(
        repository.clone(),
        directory.clone(),
        documents.clone(),
        notifier.clone(),
        Arc::new(SteppingClock::starting_at(base_time() + Duration::days(1))),
    ));
    Harness {
        service,
        repository,
        directory,
        documents,
        notifier,
    }
}

/// Store an application that already walked `path` (after submission), one hour per step.
pub(super) fn seed_application(
    repository: &MemoryRepository,
    id: &str,
    job: &str,
    employee: &str,
    path: &[ApplicationStep],
) -> ApplicationId {
    let mut application = JobApplication::submitted(
        ApplicationId(id.to_string()),
        JobId(job.to_string()),
        UserId(employee.to_string()),
        Some(5200),
        Some("Five years caring for toddlers.".to_string()),
        base_time(),
    );
    for (offset, step) in path.iter().enumerate() {
        application
            .enter_step(*step, base_time() + Duration::hours(offset as i64 + 1))
            .expect("seeded path stamps each step once");
    }
    repository
        .insert(application)
        .expect("seeded application stored")
        .id
}

/// Whatever `target` must carry to be accepted, and nothing else.
pub(super) fn details_for(target: ApplicationStep) -> StepDetails {
    match target {
        ApplicationStep::InterviewScheduled => StepDetails {
            interview_date: Some(base_time() + Duration::days(3)),
            ..StepDetails::default()
        },
        ApplicationStep::MedicalSubmitted => StepDetails {
            medical_document: Some(DocumentRef("uploads/medical/worker-ph-01.pdf".to_string())),
            ..StepDetails::default()
        },
        ApplicationStep::FlightTicketSent => StepDetails {
            flight_ticket: Some(DocumentRef("uploads/tickets/worker-ph-01.pdf".to_string())),
            flight_details: Some(serde_json::json!({
                "airline": "Cathay Pacific",
                "flightNumber": "CX906",
                "departureDate": "2025-09-01T06:40:00Z",
            })),
            ..StepDetails::default()
        },
        _ => StepDetails::default(),
    }
}

pub(super) fn router_for(harness: &Harness, verified: &[&str]) -> axum::Router {
    let api = PlacementApi::new(
        harness.service.clone(),
        Arc::new(StaticIdentity::verifying(verified)),
    );
    placement_router(Arc::new(api))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
