use std::collections::BTreeSet;
use std::sync::Arc;

use super::domain::{Application, ApplicationId, ApplicationStatus, CourseId, DecidedBy, StudentId};
use super::repository::{ApplicationStore, Transaction};
use super::service::{AdmissionError, Missing};
use super::waitlist::plan_promotion;

/// An offer swept away by an acceptance elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeDecline {
    pub application: Application,
    pub previous: ApplicationStatus,
}

/// Everything one successful acceptance changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptanceOutcome {
    pub accepted: Application,
    pub declined: Vec<CascadeDecline>,
    pub promoted: Vec<Application>,
}

/// Enforces the one-accepted-offer rule across every institution.
pub struct OfferAcceptanceCoordinator<S> {
    store: Arc<S>,
}

impl<S> OfferAcceptanceCoordinator<S>
where
    S: ApplicationStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Accept one published admission and decline everything else the student holds.
    ///
    /// A student who already holds an accepted offer cannot accept another, even one admitted
    /// after a later reapplication.
    ///
    /// The acceptance, every cascade decline, and the waitlist promotion for each seat the
    /// cascade frees commit as one transaction guarded by the student's revision and the
    /// revision of every affected course.
    pub fn accept(
        &self,
        student: &StudentId,
        id: ApplicationId,
    ) -> Result<AcceptanceOutcome, AdmissionError> {
        let view = self.store.student_view(student)?;
        let Some(target) = view.find(id) else {
            return Err(match self.store.fetch(id)? {
                Some(_) => AdmissionError::NotOwner("application"),
                None => AdmissionError::NotFound(Missing::Application(id)),
            });
        };

        if view
            .applications
            .iter()
            .any(|application| application.status == ApplicationStatus::Accepted)
        {
            return Err(AdmissionError::AlreadyDecided {
                status: ApplicationStatus::Accepted,
            });
        }
        if target.status != ApplicationStatus::Admitted {
            return Err(AdmissionError::AlreadyDecided {
                status: target.status,
            });
        }
        if !target.admission_published {
            return Err(AdmissionError::NotYetPublished);
        }

        let at = self.store.now();
        let mut accepted = target.clone();
        accepted
            .transition(ApplicationStatus::Accepted, DecidedBy::Student, at)
            .map_err(|err| AdmissionError::AlreadyDecided { status: err.from })?;

        let mut declined = Vec::new();
        let mut freed: BTreeSet<CourseId> = BTreeSet::new();
        for other in view.applications.iter().filter(|application| {
            application.id != id && application.status.is_cascade_declinable()
        }) {
            let previous = other.status;
            let mut application = other.clone();
            application
                .transition(ApplicationStatus::Rejected, DecidedBy::CascadeDecline, at)
                .map_err(|err| AdmissionError::InvalidTransition {
                    from: err.from,
                    action: "decline",
                })?;
            if previous == ApplicationStatus::Admitted {
                freed.insert(application.course.clone());
            }
            declined.push(CascadeDecline {
                application,
                previous,
            });
        }

        let mut transaction = Transaction::new()
            .guard_student(&view)
            .update(accepted.clone());
        for decline in &declined {
            transaction = transaction.update(decline.application.clone());
        }

        let mut promoted = Vec::new();
        for course in &freed {
            let course_view = self.store.course_view(course)?;
            transaction = transaction.guard_course(&course_view);
            if let Some(application) = plan_promotion(&course_view, Some(student), at)? {
                transaction = transaction.update(application.clone());
                promoted.push(application);
            }
        }

        let committed = self.store.commit(transaction)?;
        Ok(reconcile(committed.updated, accepted, declined, promoted))
    }
}

/// Swap in the store's copies so callers see committed versions and timestamps.
fn reconcile(
    updated: Vec<Application>,
    accepted: Application,
    declined: Vec<CascadeDecline>,
    promoted: Vec<Application>,
) -> AcceptanceOutcome {
    let stored = |application: Application| {
        updated
            .iter()
            .find(|candidate| candidate.id == application.id)
            .cloned()
            .unwrap_or(application)
    };

    AcceptanceOutcome {
        accepted: stored(accepted),
        declined: declined
            .into_iter()
            .map(|decline| CascadeDecline {
                application: stored(decline.application),
                previous: decline.previous,
            })
            .collect(),
        promoted: promoted.into_iter().map(stored).collect(),
    }
}
