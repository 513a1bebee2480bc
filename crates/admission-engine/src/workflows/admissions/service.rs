use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::acceptance::{AcceptanceOutcome, OfferAcceptanceCoordinator};
use super::domain::{
    Application, ApplicationId, ApplicationStatus, CourseId, CourseRequirement, Decision,
    InstitutionId, StudentId, SubjectGrades,
};
use super::eligibility::{EligibilityEvaluator, EligibilityReport};
use super::ledger::ApplicationLedger;
use super::publisher::{AdmissionPublisher, PublicationSummary};
use super::repository::{
    AdmissionDirectory, AdmissionEvent, ApplicationStore, EventPublisher, RepositoryError,
};
use super::waitlist::WaitlistPromoter;
use crate::config::EngineConfig;

/// Facade composing the ledger, publisher, acceptance coordinator, and waitlist promoter.
///
/// Owns the conflict retry policy and event emission; the components underneath are single
/// attempts with no side effects beyond the store.
pub struct AdmissionService<S, D, E> {
    store: Arc<S>,
    directory: Arc<D>,
    events: Arc<E>,
    ledger: ApplicationLedger<S, D>,
    publisher: AdmissionPublisher<S, D>,
    coordinator: OfferAcceptanceCoordinator<S>,
    promoter: WaitlistPromoter<S>,
    evaluator: EligibilityEvaluator,
    config: EngineConfig,
}

impl<S, D, E> AdmissionService<S, D, E>
where
    S: ApplicationStore + 'static,
    D: AdmissionDirectory + 'static,
    E: EventPublisher + 'static,
{
    pub fn new(store: Arc<S>, directory: Arc<D>, events: Arc<E>, config: EngineConfig) -> Self {
        Self {
            ledger: ApplicationLedger::new(store.clone(), directory.clone()),
            publisher: AdmissionPublisher::new(store.clone(), directory.clone()),
            coordinator: OfferAcceptanceCoordinator::new(store.clone()),
            promoter: WaitlistPromoter::new(store.clone()),
            evaluator: EligibilityEvaluator::new(),
            store,
            directory,
            events,
            config,
        }
    }

    /// Submit a new application on behalf of `student`.
    pub fn apply(
        &self,
        student: &StudentId,
        course: &CourseId,
    ) -> Result<Application, AdmissionError> {
        let application = self.with_conflict_retry("apply", || self.ledger.apply(student, course))?;

        info!(
            application = %application.id,
            %student,
            %course,
            eligible = application.eligibility.eligible,
            "application submitted"
        );
        self.emit(AdmissionEvent::ApplicationSubmitted {
            application_id: application.id,
            student: student.clone(),
            course: course.clone(),
            eligible: application.eligibility.eligible,
        });
        Ok(application)
    }

    /// Record an institution's decision on a pending application.
    pub fn decide(
        &self,
        institution: &InstitutionId,
        id: ApplicationId,
        decision: Decision,
    ) -> Result<Application, AdmissionError> {
        let application = self.ledger.decide(institution, id, decision)?;

        info!(
            application = %application.id,
            %institution,
            status = application.status.label(),
            "application decided"
        );
        self.emit(AdmissionEvent::ApplicationDecided {
            application_id: application.id,
            student: application.student.clone(),
            course: application.course.clone(),
            status: application.status,
        });
        Ok(application)
    }

    /// Remove a pending application, releasing its cap slot.
    pub fn withdraw(&self, student: &StudentId, id: ApplicationId) -> Result<(), AdmissionError> {
        let removed = self.ledger.withdraw(student, id)?;

        info!(application = %removed.id, %student, "application withdrawn");
        self.emit(AdmissionEvent::ApplicationWithdrawn {
            application_id: removed.id,
            student: removed.student,
            course: removed.course,
        });
        Ok(())
    }

    /// Make a course's decisions visible to its applicants.
    pub fn publish(
        &self,
        institution: &InstitutionId,
        course: &CourseId,
    ) -> Result<PublicationSummary, AdmissionError> {
        let summary = self.publisher.publish(institution, course)?;

        if summary.is_noop() {
            debug!(%course, "course already published; nothing new to expose");
            return Ok(summary);
        }

        info!(
            %course,
            newly_published = summary.newly_published.len(),
            "admission decisions published"
        );
        self.emit(AdmissionEvent::DecisionsPublished {
            course: course.clone(),
            newly_published: summary.newly_published.len(),
        });
        Ok(summary)
    }

    /// Accept an admission offer, declining every other outstanding application of the student.
    pub fn accept(
        &self,
        student: &StudentId,
        id: ApplicationId,
    ) -> Result<AcceptanceOutcome, AdmissionError> {
        let outcome =
            self.with_conflict_retry("accept", || self.coordinator.accept(student, id))?;

        info!(
            application = %outcome.accepted.id,
            %student,
            declined = outcome.declined.len(),
            promoted = outcome.promoted.len(),
            "offer accepted"
        );
        self.emit(AdmissionEvent::OfferAccepted {
            application_id: outcome.accepted.id,
            student: student.clone(),
            course: outcome.accepted.course.clone(),
        });
        for decline in &outcome.declined {
            self.emit(AdmissionEvent::OfferCascadeDeclined {
                application_id: decline.application.id,
                student: student.clone(),
                course: decline.application.course.clone(),
                previous: decline.previous,
            });
        }
        for promoted in &outcome.promoted {
            self.announce_promotion(promoted);
        }
        Ok(outcome)
    }

    /// Promote the head of the course's waitlist after a seat frees outside an acceptance.
    pub fn on_seat_freed(&self, course: &CourseId) -> Result<Option<Application>, AdmissionError> {
        let promoted = self.promoter.on_seat_freed(course)?;
        match &promoted {
            Some(application) => self.announce_promotion(application),
            None => debug!(%course, "seat freed with an empty waitlist"),
        }
        Ok(promoted)
    }

    /// [`Self::on_seat_freed`] on behalf of the institution that owns the course.
    pub fn release_seat(
        &self,
        institution: &InstitutionId,
        course: &CourseId,
    ) -> Result<Option<Application>, AdmissionError> {
        self.owned_course(institution, course)?;
        self.on_seat_freed(course)
    }

    pub fn get(&self, id: ApplicationId) -> Result<Application, AdmissionError> {
        self.store
            .fetch(id)?
            .ok_or(AdmissionError::NotFound(Missing::Application(id)))
    }

    /// A student's applications in apply order.
    pub fn student_applications(
        &self,
        student: &StudentId,
    ) -> Result<Vec<Application>, AdmissionError> {
        let mut applications = self.store.student_view(student)?.applications;
        applications.sort_by_key(Application::waitlist_key);
        Ok(applications)
    }

    /// Every application to a course the institution owns, in apply order.
    pub fn course_applications(
        &self,
        institution: &InstitutionId,
        course: &CourseId,
    ) -> Result<Vec<Application>, AdmissionError> {
        self.owned_course(institution, course)?;

        let mut applications = self.store.course_view(course)?.applications;
        applications.sort_by_key(Application::waitlist_key);
        Ok(applications)
    }

    /// Run the eligibility rules without touching any state.
    pub fn check_eligibility(
        &self,
        subjects: &SubjectGrades,
        requirement: &CourseRequirement,
    ) -> EligibilityReport {
        self.evaluator.assess(subjects, requirement)
    }

    fn owned_course(
        &self,
        institution: &InstitutionId,
        course: &CourseId,
    ) -> Result<(), AdmissionError> {
        let known = self
            .directory
            .course(course)?
            .ok_or_else(|| AdmissionError::NotFound(Missing::Course(course.clone())))?;
        if &known.institution != institution {
            return Err(AdmissionError::NotOwner("course"));
        }
        Ok(())
    }

    fn with_conflict_retry<T>(
        &self,
        operation: &'static str,
        mut attempt: impl FnMut() -> Result<T, AdmissionError>,
    ) -> Result<T, AdmissionError> {
        let mut remaining = self.config.conflict_retries;
        loop {
            match attempt() {
                Err(AdmissionError::ConcurrentConflict) if remaining > 0 => {
                    remaining -= 1;
                    debug!(operation, "concurrent update detected; re-reading and retrying");
                }
                result => return result,
            }
        }
    }

    fn announce_promotion(&self, application: &Application) {
        info!(
            application = %application.id,
            course = %application.course,
            published = application.admission_published,
            "waitlisted applicant promoted"
        );
        self.emit(AdmissionEvent::WaitlistPromoted {
            application_id: application.id,
            student: application.student.clone(),
            course: application.course.clone(),
            published: application.admission_published,
        });
    }

    fn emit(&self, event: AdmissionEvent) {
        let name = event.name();
        if let Err(err) = self.events.publish(event) {
            warn!(event = name, error = %err, "event delivery failed after commit");
        }
    }
}

/// The entity a lookup failed to find.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Missing {
    Application(ApplicationId),
    Course(CourseId),
    Student(StudentId),
}

impl fmt::Display for Missing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Missing::Application(id) => write!(f, "application {id}"),
            Missing::Course(id) => write!(f, "course {id}"),
            Missing::Student(id) => write!(f, "student {id}"),
        }
    }
}

/// Error raised by the admission engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    #[error("student {student} has no recorded subjects or grades")]
    IncompleteProfile { student: StudentId },
    #[error("an active application ({existing}) to course {course} already exists")]
    DuplicateApplication {
        course: CourseId,
        existing: ApplicationId,
    },
    #[error("at most {cap} active applications are allowed at institution {institution}")]
    InstitutionCapExceeded {
        institution: InstitutionId,
        cap: usize,
    },
    #[error("cannot {action} an application that is {from}")]
    InvalidTransition {
        from: ApplicationStatus,
        action: &'static str,
    },
    #[error("offer is {status}; only admitted offers can be accepted")]
    AlreadyDecided { status: ApplicationStatus },
    #[error("{0} not found")]
    NotFound(Missing),
    #[error("caller does not own this {0}")]
    NotOwner(&'static str),
    #[error("admission decision has not been published yet")]
    NotYetPublished,
    #[error("lost a race with a concurrent update; retry the request")]
    ConcurrentConflict,
    #[error(transparent)]
    Repository(RepositoryError),
}

impl AdmissionError {
    /// Stable snake_case name of the error kind.
    pub const fn kind(&self) -> &'static str {
        match self {
            AdmissionError::IncompleteProfile { .. } => "incomplete_profile",
            AdmissionError::DuplicateApplication { .. } => "duplicate_application",
            AdmissionError::InstitutionCapExceeded { .. } => "institution_cap_exceeded",
            AdmissionError::InvalidTransition { .. } => "invalid_transition",
            AdmissionError::AlreadyDecided { .. } => "already_decided",
            AdmissionError::NotFound(_) => "not_found",
            AdmissionError::NotOwner(_) => "not_owner",
            AdmissionError::NotYetPublished => "not_yet_published",
            AdmissionError::ConcurrentConflict => "concurrent_conflict",
            AdmissionError::Repository(_) => "repository",
        }
    }

    /// Something the end user can fix themselves.
    pub const fn is_user_fixable(&self) -> bool {
        matches!(
            self,
            AdmissionError::IncompleteProfile { .. }
                | AdmissionError::DuplicateApplication { .. }
                | AdmissionError::InstitutionCapExceeded { .. }
        )
    }

    pub const fn is_authorization_failure(&self) -> bool {
        matches!(self, AdmissionError::NotFound(_) | AdmissionError::NotOwner(_))
    }

    pub const fn is_retryable(&self) -> bool {
        matches!(self, AdmissionError::ConcurrentConflict)
    }
}

impl From<RepositoryError> for AdmissionError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Conflict => AdmissionError::ConcurrentConflict,
            other => AdmissionError::Repository(other),
        }
    }
}
