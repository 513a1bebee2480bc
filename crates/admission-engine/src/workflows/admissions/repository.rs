use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{
    Application, ApplicationId, ApplicationStatus, Course, CourseId, NewApplication, StudentId,
    SubjectGrades,
};

/// Monotonic counter bumped by the store whenever a student's records or a course's waitlist
/// change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Revision(pub u64);

impl Revision {
    pub fn next(self) -> Self {
        Revision(self.0 + 1)
    }
}

/// Every application a student holds, read at a single revision.
#[derive(Debug, Clone)]
pub struct StudentView {
    pub student: StudentId,
    pub revision: Revision,
    pub applications: Vec<Application>,
}

impl StudentView {
    pub fn find(&self, id: ApplicationId) -> Option<&Application> {
        self.applications.iter().find(|application| application.id == id)
    }
}

/// Every application to a course plus the course-level publication flag.
#[derive(Debug, Clone)]
pub struct CourseView {
    pub course: CourseId,
    /// Advances only when the course's waitlist or publication flag changes. New applications
    /// and decisions that never touch the waitlist leave it alone.
    pub revision: Revision,
    pub published: bool,
    pub applications: Vec<Application>,
}

/// Precondition checked atomically with a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guard {
    Student {
        student: StudentId,
        revision: Revision,
    },
    Course {
        course: CourseId,
        revision: Revision,
    },
}

#[derive(Debug, Clone)]
pub enum Write {
    Insert(NewApplication),
    /// Compare-and-write: the stored record must still carry `version`.
    Update(Application),
    Remove {
        id: ApplicationId,
        version: u64,
    },
    PublishCourse(CourseId),
}

/// Guards and writes applied all-or-nothing by [`ApplicationStore::commit`].
#[derive(Debug, Clone, Default)]
pub struct Transaction {
    pub guards: Vec<Guard>,
    pub writes: Vec<Write>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn guard_student(mut self, view: &StudentView) -> Self {
        self.guards.push(Guard::Student {
            student: view.student.clone(),
            revision: view.revision,
        });
        self
    }

    pub fn guard_course(mut self, view: &CourseView) -> Self {
        self.guards.push(Guard::Course {
            course: view.course.clone(),
            revision: view.revision,
        });
        self
    }

    pub fn insert(mut self, application: NewApplication) -> Self {
        self.writes.push(Write::Insert(application));
        self
    }

    pub fn update(mut self, application: Application) -> Self {
        self.writes.push(Write::Update(application));
        self
    }

    pub fn remove(mut self, application: &Application) -> Self {
        self.writes.push(Write::Remove {
            id: application.id,
            version: application.version,
        });
        self
    }

    pub fn publish_course(mut self, course: CourseId) -> Self {
        self.writes.push(Write::PublishCourse(course));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

/// Result of a successful commit.
#[derive(Debug, Clone, Default)]
pub struct Committed {
    pub inserted: Vec<Application>,
    pub updated: Vec<Application>,
}

/// Persistence collaborator. Implementations must make `commit` atomic with respect to every
/// other `commit` touching the same student or course.
pub trait ApplicationStore: Send + Sync {
    /// Server clock; every timestamp the engine writes comes from here.
    fn now(&self) -> DateTime<Utc>;
    fn fetch(&self, id: ApplicationId) -> Result<Option<Application>, RepositoryError>;
    fn student_view(&self, student: &StudentId) -> Result<StudentView, RepositoryError>;
    fn course_view(&self, course: &CourseId) -> Result<CourseView, RepositoryError>;
    fn commit(&self, transaction: Transaction) -> Result<Committed, RepositoryError>;
}

/// Read-only profile and catalog lookups.
pub trait AdmissionDirectory: Send + Sync {
    /// `None` when the student is unknown; an empty map when they have recorded nothing.
    fn student_subjects(&self, student: &StudentId)
        -> Result<Option<SubjectGrades>, RepositoryError>;
    fn course(&self, course: &CourseId) -> Result<Option<Course>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record changed concurrently")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("write would violate a storage invariant: {0}")]
    InvariantViolation(String),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Outbound hook for the notification collaborator.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: AdmissionEvent) -> Result<(), EventError>;
}

/// Logical events emitted after a state change commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AdmissionEvent {
    ApplicationSubmitted {
        application_id: ApplicationId,
        student: StudentId,
        course: CourseId,
        eligible: bool,
    },
    ApplicationWithdrawn {
        application_id: ApplicationId,
        student: StudentId,
        course: CourseId,
    },
    ApplicationDecided {
        application_id: ApplicationId,
        student: StudentId,
        course: CourseId,
        status: ApplicationStatus,
    },
    DecisionsPublished {
        course: CourseId,
        newly_published: usize,
    },
    OfferAccepted {
        application_id: ApplicationId,
        student: StudentId,
        course: CourseId,
    },
    OfferCascadeDeclined {
        application_id: ApplicationId,
        student: StudentId,
        course: CourseId,
        previous: ApplicationStatus,
    },
    WaitlistPromoted {
        application_id: ApplicationId,
        student: StudentId,
        course: CourseId,
        published: bool,
    },
}

impl AdmissionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            AdmissionEvent::ApplicationSubmitted { .. } => "application_submitted",
            AdmissionEvent::ApplicationWithdrawn { .. } => "application_withdrawn",
            AdmissionEvent::ApplicationDecided { .. } => "application_decided",
            AdmissionEvent::DecisionsPublished { .. } => "decisions_published",
            AdmissionEvent::OfferAccepted { .. } => "offer_accepted",
            AdmissionEvent::OfferCascadeDeclined { .. } => "offer_cascade_declined",
            AdmissionEvent::WaitlistPromoted { .. } => "waitlist_promoted",
        }
    }
}

/// Event dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("event transport unavailable: {0}")]
    Transport(String),
}
