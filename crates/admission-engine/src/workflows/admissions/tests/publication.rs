use super::common::*;
use crate::workflows::admissions::domain::{ApplicationStatus, Decision};
use crate::workflows::admissions::service::{AdmissionError, Missing};

#[test]
fn publish_exposes_decided_applications_only() {
    let h = harness();
    let admitted = h.apply_on_day("ada", "nf-maths", 0);
    let rejected = h.apply_on_day("grace", "nf-maths", 0);
    let pending = h.apply_on_day("alan", "nf-maths", 1);
    h.decide("northfield", admitted.id, Decision::Admit);
    h.decide("northfield", rejected.id, Decision::Reject);

    let summary = h
        .service
        .publish(&iid("northfield"), &cid("nf-maths"))
        .expect("publish succeeds");

    assert_eq!(summary.newly_published, vec![admitted.id, rejected.id]);
    assert!(!summary.previously_published);
    assert!(h.stored(admitted.id).admission_published);
    assert!(h.stored(rejected.id).admission_published);

    let untouched = h.stored(pending.id);
    assert_eq!(untouched.status, ApplicationStatus::Pending);
    assert!(!untouched.admission_published);
}

#[test]
fn publishing_twice_changes_nothing() {
    let h = harness();
    let application = h.apply_on_day("ada", "nf-maths", 0);
    h.decide("northfield", application.id, Decision::Waitlist);
    h.publish("northfield", "nf-maths");
    let before = h.stored(application.id);

    let summary = h
        .service
        .publish(&iid("northfield"), &cid("nf-maths"))
        .expect("second publish succeeds");

    assert!(summary.is_noop());
    assert_eq!(h.stored(application.id), before);
    let published_events = h
        .event_names()
        .into_iter()
        .filter(|name| *name == "decisions_published")
        .count();
    assert_eq!(published_events, 1);
}

#[test]
fn decisions_made_after_publication_wait_for_next_publish() {
    let h = harness();
    let early = h.apply_on_day("ada", "nf-maths", 0);
    let late = h.apply_on_day("grace", "nf-maths", 0);
    h.decide("northfield", early.id, Decision::Admit);
    h.publish("northfield", "nf-maths");

    h.decide("northfield", late.id, Decision::Admit);
    assert!(!h.stored(late.id).admission_published);

    let summary = h
        .service
        .publish(&iid("northfield"), &cid("nf-maths"))
        .expect("republish succeeds");
    assert!(summary.previously_published);
    assert_eq!(summary.newly_published, vec![late.id]);
    assert!(h.stored(late.id).admission_published);
}

#[test]
fn unpublished_decisions_read_as_pending_to_students() {
    let h = harness();
    let application = h.apply_on_day("ada", "nf-maths", 0);
    h.decide("northfield", application.id, Decision::Admit);

    let hidden = h.stored(application.id).student_view();
    assert_eq!(hidden.status, "pending");
    assert!(!hidden.can_accept);

    h.publish("northfield", "nf-maths");
    let visible = h.stored(application.id).student_view();
    assert_eq!(visible.status, "admitted");
    assert!(visible.can_accept);
}

#[test]
fn publish_requires_owning_institution() {
    let h = harness();

    assert!(matches!(
        h.service.publish(&iid("southbank"), &cid("nf-maths")),
        Err(AdmissionError::NotOwner(_))
    ));
    assert!(matches!(
        h.service.publish(&iid("northfield"), &cid("nf-chemistry")),
        Err(AdmissionError::NotFound(Missing::Course(_)))
    ));
}

#[test]
fn publishing_an_empty_course_marks_it_published() {
    let h = harness();

    let summary = h
        .service
        .publish(&iid("northfield"), &cid("nf-history"))
        .expect("publish succeeds");

    assert!(summary.newly_published.is_empty());
    assert!(!summary.previously_published);
    let view = h
        .service
        .course_applications(&iid("northfield"), &cid("nf-history"))
        .expect("course listing");
    assert!(view.is_empty());
    assert!(h
        .service
        .publish(&iid("northfield"), &cid("nf-history"))
        .expect("second publish")
        .is_noop());
}
