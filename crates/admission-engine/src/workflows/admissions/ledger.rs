use std::sync::Arc;

use super::domain::{
    Application, ApplicationId, ApplicationStatus, CourseId, DecidedBy, Decision, InstitutionId,
    NewApplication, StudentId, INSTITUTION_APPLICATION_CAP,
};
use super::eligibility::EligibilityEvaluator;
use super::repository::{AdmissionDirectory, ApplicationStore, RepositoryError, Transaction};
use super::service::{AdmissionError, Missing};

/// Creates, decides, and withdraws applications. Each call is a single attempt; retrying on
/// conflict is the caller's business.
pub struct ApplicationLedger<S, D> {
    store: Arc<S>,
    directory: Arc<D>,
    evaluator: EligibilityEvaluator,
}

impl<S, D> ApplicationLedger<S, D>
where
    S: ApplicationStore,
    D: AdmissionDirectory,
{
    pub fn new(store: Arc<S>, directory: Arc<D>) -> Self {
        Self {
            store,
            directory,
            evaluator: EligibilityEvaluator::new(),
        }
    }

    /// Record a new pending application with a frozen copy of the student's grades.
    ///
    /// The cap and duplicate checks are committed under the student's revision, so a concurrent
    /// apply by the same student turns into `ConcurrentConflict` instead of a third application.
    pub fn apply(
        &self,
        student: &StudentId,
        course_id: &CourseId,
    ) -> Result<Application, AdmissionError> {
        let course = self
            .directory
            .course(course_id)?
            .ok_or_else(|| AdmissionError::NotFound(Missing::Course(course_id.clone())))?;
        let subjects = self
            .directory
            .student_subjects(student)?
            .ok_or_else(|| AdmissionError::NotFound(Missing::Student(student.clone())))?;
        if subjects.is_empty() {
            return Err(AdmissionError::IncompleteProfile {
                student: student.clone(),
            });
        }

        let view = self.store.student_view(student)?;
        let active: Vec<&Application> = view
            .applications
            .iter()
            .filter(|application| application.status.is_active())
            .collect();

        if let Some(existing) = active
            .iter()
            .find(|application| application.course == course.id)
        {
            return Err(AdmissionError::DuplicateApplication {
                course: course.id.clone(),
                existing: existing.id,
            });
        }

        let held = active
            .iter()
            .filter(|application| application.institution == course.institution)
            .count();
        if held >= INSTITUTION_APPLICATION_CAP {
            return Err(AdmissionError::InstitutionCapExceeded {
                institution: course.institution.clone(),
                cap: INSTITUTION_APPLICATION_CAP,
            });
        }

        let eligibility = self.evaluator.assess(&subjects, &course.requirement);
        let transaction = Transaction::new().guard_student(&view).insert(NewApplication {
            student: student.clone(),
            course: course.id.clone(),
            institution: course.institution.clone(),
            subjects,
            eligibility,
        });

        let committed = self.store.commit(transaction)?;
        committed.inserted.into_iter().next().ok_or_else(|| {
            RepositoryError::Unavailable("insert acknowledged without a record".to_string()).into()
        })
    }

    /// Apply an institution's ruling to a pending application. Publication is left untouched.
    pub fn decide(
        &self,
        institution: &InstitutionId,
        id: ApplicationId,
        decision: Decision,
    ) -> Result<Application, AdmissionError> {
        let mut application = self.load(id)?;
        if &application.institution != institution {
            return Err(AdmissionError::NotOwner("application"));
        }

        let at = self.store.now();
        application
            .transition(decision.status(), DecidedBy::Institution, at)
            .map_err(|err| AdmissionError::InvalidTransition {
                from: err.from,
                action: decision.verb(),
            })?;

        let committed = self
            .store
            .commit(Transaction::new().update(application.clone()))?;
        Ok(committed.updated.into_iter().next().unwrap_or(application))
    }

    /// Delete a still-pending application, returning what was removed.
    pub fn withdraw(
        &self,
        student: &StudentId,
        id: ApplicationId,
    ) -> Result<Application, AdmissionError> {
        let application = self.load(id)?;
        if &application.student != student {
            return Err(AdmissionError::NotOwner("application"));
        }
        if application.status != ApplicationStatus::Pending {
            return Err(AdmissionError::InvalidTransition {
                from: application.status,
                action: "withdraw",
            });
        }

        self.store.commit(Transaction::new().remove(&application))?;
        Ok(application)
    }

    fn load(&self, id: ApplicationId) -> Result<Application, AdmissionError> {
        self.store
            .fetch(id)?
            .ok_or(AdmissionError::NotFound(Missing::Application(id)))
    }
}
