use std::sync::Arc;

use super::domain::{ApplicationId, CourseId, InstitutionId};
use super::repository::{AdmissionDirectory, ApplicationStore, Transaction};
use super::service::{AdmissionError, Missing};

/// What a publish call changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicationSummary {
    pub course: CourseId,
    pub newly_published: Vec<ApplicationId>,
    /// The course had been published before this call.
    pub previously_published: bool,
}

impl PublicationSummary {
    pub fn is_noop(&self) -> bool {
        self.previously_published && self.newly_published.is_empty()
    }
}

/// Makes a course's decided applications visible to students. One-way.
pub struct AdmissionPublisher<S, D> {
    store: Arc<S>,
    directory: Arc<D>,
}

impl<S, D> AdmissionPublisher<S, D>
where
    S: ApplicationStore,
    D: AdmissionDirectory,
{
    pub fn new(store: Arc<S>, directory: Arc<D>) -> Self {
        Self { store, directory }
    }

    /// Publish every admitted, rejected, or waitlisted application on the course and mark the
    /// course itself as published. Pending applications are left alone; repeating the call is
    /// harmless.
    pub fn publish(
        &self,
        institution: &InstitutionId,
        course_id: &CourseId,
    ) -> Result<PublicationSummary, AdmissionError> {
        let course = self
            .directory
            .course(course_id)?
            .ok_or_else(|| AdmissionError::NotFound(Missing::Course(course_id.clone())))?;
        if &course.institution != institution {
            return Err(AdmissionError::NotOwner("course"));
        }

        let view = self.store.course_view(course_id)?;
        let mut transaction = Transaction::new().guard_course(&view);
        if !view.published {
            transaction = transaction.publish_course(course_id.clone());
        }

        let mut newly_published = Vec::new();
        for application in &view.applications {
            let mut application = application.clone();
            if application.mark_published() {
                newly_published.push(application.id);
                transaction = transaction.update(application);
            }
        }

        let summary = PublicationSummary {
            course: course_id.clone(),
            newly_published,
            previously_published: view.published,
        };
        if transaction.is_empty() {
            return Ok(summary);
        }

        self.store.commit(transaction)?;
        Ok(summary)
    }
}
