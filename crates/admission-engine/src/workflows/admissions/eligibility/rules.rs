use super::super::domain::SubjectGrades;
use super::{Grade, Shortfall};

/// `None` when the student satisfies the requirement for `subject`.
pub(crate) fn check_subject(
    subjects: &SubjectGrades,
    subject: &str,
    minimum: Grade,
) -> Option<Shortfall> {
    match subjects.get(subject) {
        None => Some(Shortfall::MissingSubject {
            subject: subject.to_string(),
            required: minimum,
        }),
        Some(actual) if actual.meets(minimum) => None,
        Some(actual) => Some(Shortfall::BelowMinimum {
            subject: subject.to_string(),
            required: minimum,
            actual: *actual,
        }),
    }
}
