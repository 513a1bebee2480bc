use std::collections::BTreeMap;
use std::sync::Arc;

use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::config::EngineConfig;
use crate::workflows::admissions::clock::ManualClock;
use crate::workflows::admissions::domain::{
    Application, ApplicationId, Course, CourseId, CourseRequirement, Decision, InstitutionId,
    StudentId, SubjectGrades,
};
use crate::workflows::admissions::eligibility::Grade;
use crate::workflows::admissions::memory::{
    InMemoryApplicationStore, InMemoryDirectory, InMemoryEventLog,
};
use crate::workflows::admissions::repository::{AdmissionEvent, EventError, EventPublisher};
use crate::workflows::admissions::{admission_router, AdmissionService};

pub(super) type MemoryService =
    AdmissionService<InMemoryApplicationStore, InMemoryDirectory, InMemoryEventLog>;

pub(super) fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn sid(raw: &str) -> StudentId {
    StudentId(raw.to_string())
}

pub(super) fn cid(raw: &str) -> CourseId {
    CourseId(raw.to_string())
}

pub(super) fn iid(raw: &str) -> InstitutionId {
    InstitutionId(raw.to_string())
}

pub(super) fn grades(entries: &[(&str, Grade)]) -> SubjectGrades {
    entries
        .iter()
        .map(|(subject, grade)| (subject.to_string(), *grade))
        .collect()
}

pub(super) fn requirement(entries: &[(&str, Grade)]) -> CourseRequirement {
    CourseRequirement::from_minimums(entries.iter().map(|(s, g)| (s.to_string(), *g)).collect())
}

fn course(id: &str, institution: &str, title: &str, minimums: &[(&str, Grade)]) -> Course {
    Course {
        id: cid(id),
        institution: iid(institution),
        title: title.to_string(),
        requirement: requirement(minimums),
    }
}

pub(super) fn seeded_directory() -> InMemoryDirectory {
    let directory = InMemoryDirectory::default();

    directory.upsert_course(course(
        "nf-maths",
        "northfield",
        "Mathematics",
        &[("Math", Grade::B)],
    ));
    directory.upsert_course(course(
        "nf-physics",
        "northfield",
        "Physics",
        &[("Math", Grade::A), ("Physics", Grade::B)],
    ));
    directory.upsert_course(course("nf-history", "northfield", "History", &[]));
    directory.upsert_course(course(
        "sb-english",
        "southbank",
        "English Literature",
        &[("English", Grade::C)],
    ));
    directory.upsert_course(course(
        "sb-maths",
        "southbank",
        "Applied Mathematics",
        &[("Math", Grade::C)],
    ));

    directory.upsert_student(
        sid("ada"),
        grades(&[
            ("Math", Grade::A),
            ("English", Grade::B),
            ("Physics", Grade::C),
        ]),
    );
    directory.upsert_student(
        sid("grace"),
        grades(&[("Math", Grade::B), ("English", Grade::A)]),
    );
    directory.upsert_student(
        sid("alan"),
        grades(&[("Math", Grade::AStar), ("English", Grade::C)]),
    );
    directory.upsert_student(sid("linus"), BTreeMap::new());

    directory
}

pub(super) struct Harness {
    pub(super) service: Arc<MemoryService>,
    pub(super) store: Arc<InMemoryApplicationStore>,
    pub(super) directory: Arc<InMemoryDirectory>,
    pub(super) events: Arc<InMemoryEventLog>,
    pub(super) clock: Arc<ManualClock>,
}

impl Harness {
    /// Apply with the clock pinned to `day` days after the fixture start.
    pub(super) fn apply_on_day(&self, student: &str, course: &str, day: i64) -> Application {
        self.clock.set(start() + Duration::days(day));
        self.service
            .apply(&sid(student), &cid(course))
            .expect("apply succeeds")
    }

    pub(super) fn decide(&self, institution: &str, id: ApplicationId, decision: Decision) {
        self.service
            .decide(&iid(institution), id, decision)
            .expect("decision recorded");
    }

    pub(super) fn publish(&self, institution: &str, course: &str) {
        self.service
            .publish(&iid(institution), &cid(course))
            .expect("publish succeeds");
    }

    pub(super) fn stored(&self, id: ApplicationId) -> Application {
        self.service.get(id).expect("application stored")
    }

    pub(super) fn event_names(&self) -> Vec<&'static str> {
        self.events.events().iter().map(AdmissionEvent::name).collect()
    }
}

pub(super) fn harness() -> Harness {
    harness_with(EngineConfig::default())
}

pub(super) fn harness_with(config: EngineConfig) -> Harness {
    let clock = Arc::new(ManualClock::starting_at(start()));
    let store = Arc::new(InMemoryApplicationStore::with_clock(clock.clone()));
    let directory = Arc::new(seeded_directory());
    let events = Arc::new(InMemoryEventLog::default());
    let service = Arc::new(AdmissionService::new(
        store.clone(),
        directory.clone(),
        events.clone(),
        config,
    ));

    Harness {
        service,
        store,
        directory,
        events,
        clock,
    }
}

pub(super) struct FailingEvents;

impl EventPublisher for FailingEvents {
    fn publish(&self, _event: AdmissionEvent) -> Result<(), EventError> {
        Err(EventError::Transport("broker offline".to_string()))
    }
}

pub(super) fn router_for(harness: &Harness) -> axum::Router {
    admission_router(harness.service.clone())
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
