//! End-to-end admission flow through the public service facade: apply under the cap, decide,
//! publish, accept with cascade, and fill the vacated seat from the waitlist.

mod common {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use chrono::{DateTime, Duration, TimeZone, Utc};

    use admission_engine::config::EngineConfig;
    use admission_engine::workflows::admissions::{
        AdmissionService, Course, CourseId, CourseRequirement, Grade, InMemoryApplicationStore,
        InMemoryDirectory, InMemoryEventLog, InstitutionId, ManualClock, StudentId,
    };

    pub(super) type Service =
        AdmissionService<InMemoryApplicationStore, InMemoryDirectory, InMemoryEventLog>;

    pub(super) struct World {
        pub(super) service: Service,
        pub(super) events: Arc<InMemoryEventLog>,
        pub(super) clock: Arc<ManualClock>,
    }

    impl World {
        pub(super) fn on_day(&self, day: i64) {
            self.clock.set(start() + Duration::days(day));
        }
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 3, 8, 30, 0)
            .single()
            .expect("valid timestamp")
    }

    pub(super) fn student(raw: &str) -> StudentId {
        StudentId(raw.to_string())
    }

    pub(super) fn course(raw: &str) -> CourseId {
        CourseId(raw.to_string())
    }

    pub(super) fn institution(raw: &str) -> InstitutionId {
        InstitutionId(raw.to_string())
    }

    fn offering(id: &str, minimums: &[(&str, Grade)]) -> Course {
        Course {
            id: course(id),
            institution: institution("riverside"),
            title: id.to_uppercase(),
            requirement: CourseRequirement::from_minimums(
                minimums
                    .iter()
                    .map(|(subject, grade)| (subject.to_string(), *grade))
                    .collect(),
            ),
        }
    }

    pub(super) fn world() -> World {
        let directory = InMemoryDirectory::default();
        directory.upsert_course(offering("c1", &[("Math", Grade::B)]));
        directory.upsert_course(offering("c2", &[]));
        directory.upsert_course(offering("c3", &[("English", Grade::A)]));

        let mut s = BTreeMap::new();
        s.insert("Math".to_string(), Grade::A);
        s.insert("English".to_string(), Grade::B);
        directory.upsert_student(student("s"), s);

        let mut w = BTreeMap::new();
        w.insert("Math".to_string(), Grade::B);
        directory.upsert_student(student("w"), w);

        let mut r = BTreeMap::new();
        r.insert("Math".to_string(), Grade::AStar);
        directory.upsert_student(student("r"), r);

        let clock = Arc::new(ManualClock::starting_at(start()));
        let store = Arc::new(InMemoryApplicationStore::with_clock(clock.clone()));
        let events = Arc::new(InMemoryEventLog::default());
        let service = AdmissionService::new(
            store,
            Arc::new(directory),
            events.clone(),
            EngineConfig::default(),
        );

        World {
            service,
            events,
            clock,
        }
    }
}

use admission_engine::workflows::admissions::{
    AdmissionError, AdmissionEvent, ApplicationStatus, CourseRequirement, DecidedBy, Decision,
    EligibilityEvaluator, Grade, INSTITUTION_APPLICATION_CAP,
};
use common::*;

#[test]
fn student_applies_is_admitted_accepts_and_seat_passes_down_the_waitlist() {
    let world = world();
    let riverside = institution("riverside");

    let evaluator = EligibilityEvaluator::new();
    let subjects = [("Math", Grade::A), ("English", Grade::B)]
        .into_iter()
        .map(|(subject, grade)| (subject.to_string(), grade))
        .collect();
    let requirement =
        CourseRequirement::from_minimums([("Math".to_string(), Grade::B)].into_iter().collect());
    assert!(evaluator.evaluate(&subjects, &requirement));
    assert_eq!(
        evaluator.assess(&subjects, &requirement),
        evaluator.assess(&subjects, &requirement)
    );

    world.on_day(0);
    let a1 = world
        .service
        .apply(&student("s"), &course("c1"))
        .expect("first application");
    assert_eq!(a1.status, ApplicationStatus::Pending);
    assert!(a1.eligibility.eligible);

    world.on_day(1);
    let a2 = world
        .service
        .apply(&student("s"), &course("c2"))
        .expect("second application");

    match world.service.apply(&student("s"), &course("c3")) {
        Err(AdmissionError::InstitutionCapExceeded { cap, .. }) => {
            assert_eq!(cap, INSTITUTION_APPLICATION_CAP)
        }
        other => panic!("expected cap exceeded, got {other:?}"),
    }

    world.on_day(2);
    let w1 = world
        .service
        .apply(&student("w"), &course("c1"))
        .expect("waitlist candidate one");
    world.on_day(3);
    let w2 = world
        .service
        .apply(&student("r"), &course("c1"))
        .expect("waitlist candidate two");

    world.on_day(10);
    world
        .service
        .decide(&riverside, a1.id, Decision::Admit)
        .expect("admit a1");
    world
        .service
        .decide(&riverside, w2.id, Decision::Waitlist)
        .expect("waitlist w2");
    world
        .service
        .decide(&riverside, w1.id, Decision::Waitlist)
        .expect("waitlist w1");

    assert_eq!(
        world.service.accept(&student("s"), a1.id),
        Err(AdmissionError::NotYetPublished)
    );

    let summary = world
        .service
        .publish(&riverside, &course("c1"))
        .expect("publish c1");
    assert!(summary.newly_published.contains(&a1.id));
    assert!(world.service.get(a1.id).expect("a1").admission_published);

    world.on_day(11);
    let outcome = world
        .service
        .accept(&student("s"), a1.id)
        .expect("accept a1");
    assert_eq!(outcome.accepted.status, ApplicationStatus::Accepted);
    assert_eq!(outcome.declined.len(), 1);
    assert_eq!(outcome.declined[0].application.id, a2.id);
    assert!(outcome.promoted.is_empty());

    let a2 = world.service.get(a2.id).expect("a2");
    assert_eq!(a2.status, ApplicationStatus::Rejected);
    assert_eq!(a2.decided_by, Some(DecidedBy::CascadeDecline));

    let promoted = world
        .service
        .on_seat_freed(&course("c1"))
        .expect("seat freed")
        .expect("head of waitlist promoted");
    assert_eq!(promoted.id, w1.id);
    assert_eq!(promoted.status, ApplicationStatus::Admitted);
    assert!(promoted.admission_published);
    assert_eq!(
        world.service.get(w2.id).expect("w2").status,
        ApplicationStatus::Waitlisted
    );

    let events = world.events.events();
    assert!(events.iter().any(|event| matches!(
        event,
        AdmissionEvent::OfferCascadeDeclined { application_id, previous: ApplicationStatus::Pending, .. }
            if *application_id == a2.id
    )));
    assert!(events.iter().any(|event| matches!(
        event,
        AdmissionEvent::WaitlistPromoted { application_id, published: true, .. }
            if *application_id == w1.id
    )));
}

#[test]
fn institution_listing_is_ordered_by_apply_time() {
    let world = world();
    world.on_day(4);
    let later = world
        .service
        .apply(&student("w"), &course("c1"))
        .expect("apply");
    world.on_day(1);
    let earlier = world
        .service
        .apply(&student("s"), &course("c1"))
        .expect("apply");

    let listing = world
        .service
        .course_applications(&institution("riverside"), &course("c1"))
        .expect("listing");

    let ids: Vec<_> = listing.iter().map(|application| application.id).collect();
    assert_eq!(ids, vec![earlier.id, later.id]);
    assert!(matches!(
        world
            .service
            .course_applications(&institution("elsewhere"), &course("c1")),
        Err(AdmissionError::NotOwner(_))
    ));
}
