use crate::infra::{
    InMemoryApplicationRepository, InMemoryDirectory, LoggingNotifier,
    PrefixedContractGenerator, DEMO_EMPLOYER, DEMO_JOB, DEMO_WORKERS,
};
use chrono::{Duration, Utc};
use clap::Args;
use placement_workflow::config::ContractConfig;
use placement_workflow::error::AppError;
use placement_workflow::workflows::placement::{
    Actor, ApplicationId, ApplicationService, ApplicationServiceError, ApplicationStep,
    DocumentRef, JobId, StepDetails, SubmitApplication, TimelineStatus,
};
use serde_json::json;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Prefix for generated contract references (defaults to KZ).
    #[arg(long)]
    pub(crate) contract_prefix: Option<String>,
    /// Make the first contract notification fail so the retry path is shown.
    #[arg(long)]
    pub(crate) flaky_delivery: bool,
}

type DemoService = ApplicationService<InMemoryApplicationRepository, InMemoryDirectory>;

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let contracts = match args.contract_prefix.as_deref() {
        Some(raw) => ContractConfig::with_prefix(raw)?,
        None => ContractConfig::default(),
    };
    let notifier = if args.flaky_delivery {
        LoggingNotifier::failing_once()
    } else {
        LoggingNotifier::default()
    };
    let notifier = Arc::new(notifier);
    let service = ApplicationService::new(
        Arc::new(InMemoryApplicationRepository::default()),
        Arc::new(InMemoryDirectory::seeded()),
        Arc::new(PrefixedContractGenerator::new(contracts.reference_prefix)),
        notifier.clone(),
    );
    let employer = Actor::employer(DEMO_EMPLOYER);

    println!("Placement workflow demo ({DEMO_JOB})");

    let [(ana_id, ana_name), (dewi_id, dewi_name), (joy_id, joy_name)] = DEMO_WORKERS;
    let ana = apply(&service, ana_id, ana_name)?;
    let dewi = apply(&service, dewi_id, dewi_name)?;
    let joy = apply(&service, joy_id, joy_name)?;
    let worker = Actor::employee(ana_id);

    println!("\nScreening");
    step(&service, &ana, &employer, ApplicationStep::UnderReview)?;
    step(&service, &dewi, &employer, ApplicationStep::UnderReview)?;
    step(&service, &ana, &employer, ApplicationStep::Shortlisted)?;
    report_refusal(
        "shortlist a second candidate",
        service.advance(
            &dewi,
            &employer,
            ApplicationStep::Shortlisted,
            StepDetails::default(),
        ),
    );
    step(&service, &joy, &employer, ApplicationStep::Rejected)?;

    println!("\nInterview and medical");
    let interview = service.advance(
        &ana,
        &employer,
        ApplicationStep::InterviewScheduled,
        StepDetails {
            interview_date: Some(Utc::now() + Duration::days(3)),
            interview_notes: Some("Video call with the family".to_string()),
            ..StepDetails::default()
        },
    )?;
    println!("  -> {} for {}", interview.current_step, interview.id);
    step(&service, &ana, &employer, ApplicationStep::MedicalRequested)?;
    step_with(
        &service,
        &ana,
        &worker,
        ApplicationStep::MedicalSubmitted,
        StepDetails {
            medical_document: Some(DocumentRef(format!("uploads/medical/{ana}.pdf"))),
            ..StepDetails::default()
        },
    )?;
    step(&service, &ana, &employer, ApplicationStep::MedicalApproved)?;

    println!("\nContract");
    let first_attempt = service.advance(
        &ana,
        &employer,
        ApplicationStep::ContractSent,
        StepDetails::default(),
    );
    if let Err(error) = first_attempt {
        if !error.is_retryable() {
            return Err(error.into());
        }
        println!("  ! {error} (retrying)");
        step(&service, &ana, &employer, ApplicationStep::ContractSent)?;
    } else {
        println!("  -> {} for {ana}", ApplicationStep::ContractSent);
    }
    println!("  notifications delivered: {}", notifier.delivered());

    println!("\nVisa and travel");
    step(&service, &ana, &worker, ApplicationStep::ContractSigned)?;
    step(&service, &ana, &employer, ApplicationStep::VisaApplied)?;
    step(&service, &ana, &employer, ApplicationStep::VisaApproved)?;
    step_with(
        &service,
        &ana,
        &employer,
        ApplicationStep::FlightTicketSent,
        StepDetails {
            flight_ticket: Some(DocumentRef(format!("uploads/tickets/{ana}.pdf"))),
            flight_details: Some(json!({
                "airline": "Philippine Airlines",
                "flightNumber": "PR300",
                "departureDate": (Utc::now() + Duration::days(30)).to_rfc3339(),
            })),
            ..StepDetails::default()
        },
    )?;
    step(&service, &ana, &worker, ApplicationStep::FlightTicketReceived)?;
    step(&service, &ana, &employer, ApplicationStep::DeploymentReady)?;

    let progress = service.get_progress(&ana, &employer)?;
    println!(
        "\n{} is {} ({}%), contract {}",
        ana,
        progress.status.label(),
        progress.progress_percentage,
        progress
            .application
            .contract_ref
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "-".to_string())
    );
    for entry in &progress.timeline {
        let marker = match entry.status {
            TimelineStatus::Current => "*",
            TimelineStatus::Completed => " ",
        };
        println!(
            "  {marker} {:<24} {}",
            entry.step.label(),
            entry.timestamp.format("%Y-%m-%d %H:%M:%S")
        );
    }

    println!("\nEmployer pipeline");
    for application in service.list_for_actor(&employer, None)? {
        let progress = service.get_progress(&application.id, &employer)?;
        println!(
            "  {} {:<20} {:>3}%",
            application.id,
            progress.status.label(),
            progress.progress_percentage
        );
    }

    Ok(())
}

fn apply(service: &DemoService, worker: &str, name: &str) -> Result<ApplicationId, AppError> {
    let application = service.submit(
        &Actor::employee(worker),
        SubmitApplication {
            job_id: JobId(DEMO_JOB.to_string()),
            expected_salary: Some(4990),
            cover_letter: Some(format!("{name} is available from next month.")),
        },
    )?;
    println!("  {name} applied as {}", application.id);
    Ok(application.id)
}

fn step(
    service: &DemoService,
    application_id: &ApplicationId,
    actor: &Actor,
    target: ApplicationStep,
) -> Result<(), AppError> {
    step_with(service, application_id, actor, target, StepDetails::default())
}

fn step_with(
    service: &DemoService,
    application_id: &ApplicationId,
    actor: &Actor,
    target: ApplicationStep,
    details: StepDetails,
) -> Result<(), AppError> {
    let application = service.advance(application_id, actor, target, details)?;
    println!(
        "  -> {} for {} by {}",
        application.current_step, application.id, actor
    );
    Ok(())
}

fn report_refusal<T>(attempt: &str, outcome: Result<T, ApplicationServiceError>) {
    match outcome {
        Ok(_) => println!("  ? {attempt} unexpectedly succeeded"),
        Err(error) => println!("  x {attempt}: {error}"),
    }
}
