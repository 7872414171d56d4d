use super::domain::{JobApplication, TimelineEntry, TimelineStatus};

/// Derives the chronological event list from an application's audit trail.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimelineBuilder;

impl TimelineBuilder {
    /// Oldest first. Equal timestamps fall back to canonical step order.
    pub fn build(application: &JobApplication) -> Vec<TimelineEntry> {
        let mut entries: Vec<TimelineEntry> = application
            .step_timestamps
            .iter()
            .map(|(step, timestamp)| TimelineEntry {
                step: *step,
                timestamp: *timestamp,
                status: if *step == application.current_step {
                    TimelineStatus::Current
                } else {
                    TimelineStatus::Completed
                },
            })
            .collect();

        entries.sort_by(|left, right| {
            left.timestamp
                .cmp(&right.timestamp)
                .then_with(|| left.step.cmp(&right.step))
        });
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::placement::domain::{ApplicationId, ApplicationStep, JobId, UserId};
    use chrono::{DateTime, TimeZone, Utc};

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 10, hour, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    fn application() -> JobApplication {
        JobApplication::submitted(
            ApplicationId("app-t".to_string()),
            JobId("job-t".to_string()),
            UserId("worker-t".to_string()),
            Some(400),
            None,
            at(8),
        )
    }

    #[test]
    fn marks_only_the_current_step() {
        let mut application = application();
        application
            .enter_step(ApplicationStep::UnderReview, at(9))
            .expect("stamp");
        application
            .enter_step(ApplicationStep::Shortlisted, at(10))
            .expect("stamp");

        let timeline = TimelineBuilder::build(&application);
        let steps: Vec<_> = timeline.iter().map(|entry| entry.step).collect();
        assert_eq!(
            steps,
            vec![
                ApplicationStep::ApplicationSubmitted,
                ApplicationStep::UnderReview,
                ApplicationStep::Shortlisted
            ]
        );
        assert_eq!(timeline[2].status, TimelineStatus::Current);
        assert!(timeline[..2]
            .iter()
            .all(|entry| entry.status == TimelineStatus::Completed));
    }

    #[test]
    fn equal_timestamps_fall_back_to_canonical_order() {
        let mut application = application();
        application
            .enter_step(ApplicationStep::Shortlisted, at(9))
            .expect("stamp");
        application
            .enter_step(ApplicationStep::Rejected, at(9))
            .expect("stamp");

        let timeline = TimelineBuilder::build(&application);
        assert_eq!(timeline[1].step, ApplicationStep::Shortlisted);
        assert_eq!(timeline[2].step, ApplicationStep::Rejected);
        assert_eq!(timeline[2].status, TimelineStatus::Current);
    }

    #[test]
    fn orders_by_timestamp_even_when_stamps_disagree_with_canonical_order() {
        let mut application = application();
        application
            .step_timestamps
            .insert(ApplicationStep::UnderReview, at(7));

        let timeline = TimelineBuilder::build(&application);
        assert_eq!(timeline[0].step, ApplicationStep::UnderReview);
        assert!(timeline
            .windows(2)
            .all(|pair| pair[0].timestamp <= pair[1].timestamp));
    }

    #[test]
    fn repeated_reads_are_identical() {
        let mut application = application();
        application
            .enter_step(ApplicationStep::UnderReview, at(11))
            .expect("stamp");
        assert_eq!(
            TimelineBuilder::build(&application),
            TimelineBuilder::build(&application)
        );
    }
}
