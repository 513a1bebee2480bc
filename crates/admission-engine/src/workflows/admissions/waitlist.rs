use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::domain::{Application, ApplicationStatus, CourseId, DecidedBy, StudentId};
use super::repository::{ApplicationStore, CourseView, Transaction};
use super::service::AdmissionError;

/// Fills freed seats from a course's waitlist in strict arrival order.
pub struct WaitlistPromoter<S> {
    store: Arc<S>,
}

impl<S> WaitlistPromoter<S>
where
    S: ApplicationStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Promote the head of the course's waitlist, if there is one.
    ///
    /// Selection and transition commit under the course revision, so two seats freeing at once
    /// can neither promote the same applicant twice nor jump the queue.
    pub fn on_seat_freed(&self, course: &CourseId) -> Result<Option<Application>, AdmissionError> {
        let view = self.store.course_view(course)?;
        let Some(promoted) = plan_promotion(&view, None, self.store.now())? else {
            return Ok(None);
        };

        let committed = self
            .store
            .commit(Transaction::new().guard_course(&view).update(promoted.clone()))?;
        Ok(committed.updated.into_iter().next().or(Some(promoted)))
    }
}

/// Earliest-applied waitlisted application, ties broken by the lower id.
pub fn next_in_line<'a, I>(applications: I) -> Option<&'a Application>
where
    I: IntoIterator<Item = &'a Application>,
{
    applications
        .into_iter()
        .filter(|application| application.status == ApplicationStatus::Waitlisted)
        .min_by_key(|application| application.waitlist_key())
}

/// The promoted copy of the next waitlisted application, ready to be written.
///
/// Applications belonging to `excluded` are skipped; the acceptance cascade uses this for the
/// accepting student, whose own records are being rewritten in the same transaction.
pub(crate) fn plan_promotion(
    view: &CourseView,
    excluded: Option<&StudentId>,
    at: DateTime<Utc>,
) -> Result<Option<Application>, AdmissionError> {
    let candidate = next_in_line(
        view.applications
            .iter()
            .filter(|application| Some(&application.student) != excluded),
    );
    let Some(candidate) = candidate else {
        return Ok(None);
    };

    let mut promoted = candidate.clone();
    promoted
        .transition(ApplicationStatus::Admitted, DecidedBy::WaitlistPromotion, at)
        .map_err(|err| AdmissionError::InvalidTransition {
            from: err.from,
            action: "promote",
        })?;
    if view.published {
        promoted.mark_published();
    }
    Ok(Some(promoted))
}
