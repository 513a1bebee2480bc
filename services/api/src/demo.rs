use std::sync::Arc;

use crate::infra::{parse_grades, sample_seed};
use admission_engine::config::EngineConfig;
use admission_engine::error::AppError;
use admission_engine::workflows::admissions::{
    AdmissionDirectory, AdmissionError, AdmissionService, CourseId, CourseRequirement, Decision,
    EligibilityEvaluator, EligibilityReport, InMemoryApplicationStore, InMemoryDirectory,
    InMemoryEventLog, InstitutionId, ManualClock, StudentId, SubjectGrades,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use clap::Args;
use serde::Serialize;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Print the walkthrough as JSON instead of text.
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug)]
pub(crate) struct EligibilityArgs {
    /// Student grades as Subject=Grade pairs, e.g. "Math=A,English=B".
    #[arg(long, value_parser = parse_grades)]
    pub(crate) subjects: SubjectGrades,
    /// Course minimums as Subject=Grade pairs. Omit for a course without requirements.
    #[arg(long, value_parser = parse_grades)]
    pub(crate) requires: Option<SubjectGrades>,
    /// Print the report as JSON instead of text.
    #[arg(long)]
    pub(crate) json: bool,
}

/// One line of the walkthrough.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct DemoStep {
    pub(crate) day: i64,
    pub(crate) action: String,
    pub(crate) outcome: String,
}

type DemoService = AdmissionService<InMemoryApplicationStore, InMemoryDirectory, InMemoryEventLog>;

struct Walkthrough {
    service: DemoService,
    directory: Arc<InMemoryDirectory>,
    events: Arc<InMemoryEventLog>,
    clock: Arc<ManualClock>,
    start: DateTime<Utc>,
    day: i64,
    steps: Vec<DemoStep>,
}

impl Walkthrough {
    fn new() -> Self {
        let start = Utc
            .with_ymd_and_hms(2025, 9, 1, 8, 0, 0)
            .single()
            .unwrap_or_else(Utc::now);
        let clock = Arc::new(ManualClock::starting_at(start));
        let directory = Arc::new(InMemoryDirectory::from_seed(sample_seed()));
        let events = Arc::new(InMemoryEventLog::default());
        let service = AdmissionService::new(
            Arc::new(InMemoryApplicationStore::with_clock(clock.clone())),
            directory.clone(),
            events.clone(),
            EngineConfig::default(),
        );

        Self {
            service,
            directory,
            events,
            clock,
            start,
            day: 0,
            steps: Vec::new(),
        }
    }

    fn on_day(&mut self, day: i64) {
        self.day = day;
        self.clock.set(self.start + Duration::days(day));
    }

    fn record(&mut self, action: impl Into<String>, outcome: impl Into<String>) {
        self.steps.push(DemoStep {
            day: self.day,
            action: action.into(),
            outcome: outcome.into(),
        });
    }
}

/// Run the scripted admission cycle against in-memory infrastructure.
pub(crate) fn walkthrough() -> Result<Vec<DemoStep>, AppError> {
    let mut demo = Walkthrough::new();
    let ada = StudentId("s-ada".to_string());
    let wren = StudentId("s-wren".to_string());
    let northfield = InstitutionId("i-northfield".to_string());
    let maths = CourseId("c-maths".to_string());
    let economics = CourseId("c-economics".to_string());
    let physics = CourseId("c-physics".to_string());

    let subjects = demo
        .directory
        .student_subjects(&ada)
        .map_err(AdmissionError::from)?
        .unwrap_or_default();
    let requirement = demo
        .directory
        .course(&maths)
        .map_err(AdmissionError::from)?
        .map(|course| course.requirement)
        .unwrap_or_default();
    let report = demo.service.check_eligibility(&subjects, &requirement);
    demo.record(format!("check {ada} against {maths}"), report.summary());

    let first = demo.service.apply(&ada, &maths)?;
    demo.record(
        format!("{ada} applies to {maths}"),
        format!("{} {}", first.id, first.status),
    );

    demo.on_day(1);
    let second = demo.service.apply(&ada, &economics)?;
    demo.record(
        format!("{ada} applies to {economics}"),
        format!("{} {}", second.id, second.status),
    );
    match demo.service.apply(&ada, &physics) {
        Err(err @ AdmissionError::InstitutionCapExceeded { .. }) => {
            demo.record(format!("{ada} applies to {physics}"), err.to_string())
        }
        Err(err) => return Err(err.into()),
        Ok(application) => demo.record(
            format!("{ada} applies to {physics}"),
            format!("{} {}", application.id, application.status),
        ),
    }

    demo.on_day(2);
    let queued = demo.service.apply(&wren, &maths)?;
    demo.record(
        format!("{wren} applies to {maths}"),
        format!("{} {}", queued.id, queued.status),
    );

    demo.on_day(5);
    let admitted = demo.service.decide(&northfield, first.id, Decision::Admit)?;
    demo.record(
        format!("{northfield} admits {}", first.id),
        format!("{} (student still sees {})", admitted.status, admitted.visible_status()),
    );
    let waitlisted = demo
        .service
        .decide(&northfield, queued.id, Decision::Waitlist)?;
    demo.record(
        format!("{northfield} waitlists {}", queued.id),
        waitlisted.status.to_string(),
    );
    if let Err(err) = demo.service.accept(&ada, first.id) {
        demo.record(format!("{ada} tries to accept {}", first.id), err.to_string());
    }

    demo.on_day(6);
    let summary = demo.service.publish(&northfield, &maths)?;
    demo.record(
        format!("{northfield} publishes {maths}"),
        format!("{} decisions released", summary.newly_published.len()),
    );

    demo.on_day(7);
    let outcome = demo.service.accept(&ada, first.id)?;
    let declined: Vec<String> = outcome
        .declined
        .iter()
        .map(|decline| format!("{} ({} -> rejected)", decline.application.id, decline.previous))
        .collect();
    demo.record(
        format!("{ada} accepts {}", first.id),
        format!("accepted; declined {}", declined.join(", ")),
    );

    let promoted = demo.service.on_seat_freed(&maths)?;
    demo.record(
        format!("seat freed on {maths}"),
        match promoted {
            Some(application) => format!(
                "{} promoted to {} (published: {})",
                application.id, application.status, application.admission_published
            ),
            None => "waitlist empty".to_string(),
        },
    );

    let delivered = demo.events.events().len();
    demo.record("notifications", format!("{delivered} events delivered"));
    Ok(demo.steps)
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let steps = walkthrough()?;

    if args.json {
        let rendered =
            serde_json::to_string_pretty(&steps).map_err(|err| AppError::Io(err.into()))?;
        println!("{rendered}");
        return Ok(());
    }

    println!("Admission walkthrough");
    for step in &steps {
        println!("  day {:>2}  {:<40} {}", step.day, step.action, step.outcome);
    }
    Ok(())
}

pub(crate) fn run_eligibility(args: EligibilityArgs) -> Result<(), AppError> {
    let requirement = CourseRequirement::from_minimums(args.requires.unwrap_or_default());
    let report = EligibilityEvaluator::new().assess(&args.subjects, &requirement);

    if args.json {
        let rendered =
            serde_json::to_string_pretty(&report).map_err(|err| AppError::Io(err.into()))?;
        println!("{rendered}");
        return Ok(());
    }

    render_report(&report);
    Ok(())
}

fn render_report(report: &EligibilityReport) {
    println!("{}", if report.eligible { "eligible" } else { "ineligible" });
    for shortfall in &report.shortfalls {
        println!("  - {}", shortfall.summary());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walkthrough_covers_the_full_cycle() {
        let steps = walkthrough().expect("walkthrough runs");

        let outcome_of = |prefix: &str| {
            steps
                .iter()
                .find(|step| step.action.starts_with(prefix))
                .map(|step| step.outcome.clone())
                .unwrap_or_default()
        };

        assert_eq!(outcome_of("check"), "meets all subject requirements");
        assert!(outcome_of("s-ada applies to c-physics").contains("at most 2"));
        assert!(outcome_of("s-ada tries").contains("not been published"));
        assert!(outcome_of("i-northfield publishes").starts_with("2 decisions"));
        assert!(outcome_of("s-ada accepts").contains("app-000002 (pending -> rejected)"));
        assert_eq!(
            outcome_of("seat freed"),
            "app-000003 promoted to admitted (published: true)"
        );
    }

    #[test]
    fn walkthrough_days_never_go_backwards() {
        let steps = walkthrough().expect("walkthrough runs");
        assert!(steps.windows(2).all(|pair| pair[0].day <= pair[1].day));
    }
}
