use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::eligibility::{EligibilityReport, Grade};

/// Maximum number of simultaneously active applications a student may hold at one institution.
pub const INSTITUTION_APPLICATION_CAP: usize = 2;

/// Subject name to letter grade, keyed uniquely by subject.
pub type SubjectGrades = BTreeMap<String, Grade>;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StudentId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstitutionId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CourseId(pub String);

/// Store-assigned identifier. Ordering doubles as the waitlist tie-break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub u64);

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for InstitutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for CourseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "app-{:06}", self.0)
    }
}

/// Minimum grades a course demands, one entry per required subject.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CourseRequirement {
    minimums: BTreeMap<String, Grade>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequirementError {
    #[error("required subject '{0}' has no minimum grade")]
    MissingMinimum(String),
    #[error("minimum grade given for '{0}' which is not a required subject")]
    UnexpectedMinimum(String),
}

impl CourseRequirement {
    /// Build from a subject set and a grade map, rejecting subjects without a minimum.
    pub fn new(
        subjects: BTreeSet<String>,
        mut min_grades: BTreeMap<String, Grade>,
    ) -> Result<Self, RequirementError> {
        let mut minimums = BTreeMap::new();
        for subject in subjects {
            let grade = min_grades
                .remove(&subject)
                .ok_or_else(|| RequirementError::MissingMinimum(subject.clone()))?;
            minimums.insert(subject, grade);
        }

        if let Some((extra, _)) = min_grades.into_iter().next() {
            return Err(RequirementError::UnexpectedMinimum(extra));
        }

        Ok(Self { minimums })
    }

    pub fn from_minimums(minimums: BTreeMap<String, Grade>) -> Self {
        Self { minimums }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.minimums.is_empty()
    }

    pub fn subjects(&self) -> impl Iterator<Item = &str> {
        self.minimums.keys().map(String::as_str)
    }

    pub fn minimum_for(&self, subject: &str) -> Option<Grade> {
        self.minimums.get(subject).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Grade)> {
        self.minimums
            .iter()
            .map(|(subject, grade)| (subject.as_str(), *grade))
    }
}

/// Course offered by exactly one institution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub institution: InstitutionId,
    pub title: String,
    #[serde(default)]
    pub requirement: CourseRequirement,
}

/// Status of an application. Terminal states are `Rejected` and `Accepted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Admitted,
    Rejected,
    Waitlisted,
    Accepted,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Admitted => "admitted",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Waitlisted => "waitlisted",
            ApplicationStatus::Accepted => "accepted",
        }
    }

    /// Counts against the per-institution cap.
    pub const fn is_active(self) -> bool {
        match self {
            ApplicationStatus::Pending
            | ApplicationStatus::Admitted
            | ApplicationStatus::Waitlisted
            | ApplicationStatus::Accepted => true,
            ApplicationStatus::Rejected => false,
        }
    }

    /// An institution has ruled on it, so it may carry a published decision.
    pub const fn is_decided(self) -> bool {
        match self {
            ApplicationStatus::Admitted
            | ApplicationStatus::Rejected
            | ApplicationStatus::Waitlisted
            | ApplicationStatus::Accepted => true,
            ApplicationStatus::Pending => false,
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, ApplicationStatus::Rejected | ApplicationStatus::Accepted)
    }

    /// Swept into `Rejected` when the student accepts another offer.
    pub const fn is_cascade_declinable(self) -> bool {
        matches!(
            self,
            ApplicationStatus::Pending | ApplicationStatus::Admitted | ApplicationStatus::Waitlisted
        )
    }

    /// The complete transition table, keyed by who initiates the change.
    pub const fn permits(self, to: ApplicationStatus, by: DecidedBy) -> bool {
        use ApplicationStatus::*;
        match (self, to, by) {
            (Pending, Admitted | Rejected | Waitlisted, DecidedBy::Institution) => true,
            (Admitted, Accepted, DecidedBy::Student) => true,
            (Pending | Admitted | Waitlisted, Rejected, DecidedBy::CascadeDecline) => true,
            (Waitlisted, Admitted, DecidedBy::WaitlistPromotion) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// An institution's ruling on a pending application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Admit,
    Reject,
    Waitlist,
}

impl Decision {
    pub const fn status(self) -> ApplicationStatus {
        match self {
            Decision::Admit => ApplicationStatus::Admitted,
            Decision::Reject => ApplicationStatus::Rejected,
            Decision::Waitlist => ApplicationStatus::Waitlisted,
        }
    }

    pub const fn verb(self) -> &'static str {
        match self {
            Decision::Admit => "admit",
            Decision::Reject => "reject",
            Decision::Waitlist => "waitlist",
        }
    }
}

/// Who caused a status change. A cascade rejection and an institution rejection share a
/// status but not an origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecidedBy {
    Institution,
    Student,
    CascadeDecline,
    WaitlistPromotion,
}

/// One entry of an application's audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub from: ApplicationStatus,
    pub to: ApplicationStatus,
    pub by: DecidedBy,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{by:?} may not move an application from {from} to {to}")]
pub struct TransitionError {
    pub from: ApplicationStatus,
    pub to: ApplicationStatus,
    pub by: DecidedBy,
}

/// A student's application to one course, with the profile snapshot taken at apply time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub student: StudentId,
    pub course: CourseId,
    pub institution: InstitutionId,
    pub subjects: SubjectGrades,
    pub eligibility: EligibilityReport,
    pub status: ApplicationStatus,
    pub decided_by: Option<DecidedBy>,
    pub admission_published: bool,
    pub applied_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Record version used for compare-and-write; bumped by the store on every update.
    pub version: u64,
    pub history: Vec<StatusChange>,
}

impl Application {
    pub fn transition(
        &mut self,
        to: ApplicationStatus,
        by: DecidedBy,
        at: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        if !self.status.permits(to, by) {
            return Err(TransitionError {
                from: self.status,
                to,
                by,
            });
        }

        self.history.push(StatusChange {
            from: self.status,
            to,
            by,
            at,
        });
        self.status = to;
        self.decided_by = Some(by);
        self.updated_at = at;
        Ok(())
    }

    /// Make the decision visible to the student. Returns whether anything changed.
    ///
    /// Pending applications are never published and publication is never undone.
    pub fn mark_published(&mut self) -> bool {
        if self.admission_published || !self.status.is_decided() {
            return false;
        }
        self.admission_published = true;
        true
    }

    /// Priority key among waitlisted applications of one course.
    pub fn waitlist_key(&self) -> (DateTime<Utc>, ApplicationId) {
        (self.applied_at, self.id)
    }

    /// Status as the student is allowed to see it.
    pub fn visible_status(&self) -> ApplicationStatus {
        if self.status.is_decided() && !self.admission_published {
            ApplicationStatus::Pending
        } else {
            self.status
        }
    }

    pub fn status_view(&self) -> ApplicationView {
        ApplicationView {
            application_id: self.id.to_string(),
            student_id: self.student.clone(),
            course_id: self.course.clone(),
            institution_id: self.institution.clone(),
            status: self.status.label(),
            decided_by: self.decided_by,
            admission_published: self.admission_published,
            eligible: self.eligibility.eligible,
            applied_at: self.applied_at,
            updated_at: self.updated_at,
        }
    }

    pub fn student_view(&self) -> StudentApplicationView {
        let status = self.visible_status();
        StudentApplicationView {
            application_id: self.id.to_string(),
            course_id: self.course.clone(),
            institution_id: self.institution.clone(),
            status: status.label(),
            can_accept: status == ApplicationStatus::Admitted,
            applied_at: self.applied_at,
        }
    }
}

/// Fields an application is created from; the store assigns id and timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewApplication {
    pub student: StudentId,
    pub course: CourseId,
    pub institution: InstitutionId,
    pub subjects: SubjectGrades,
    pub eligibility: EligibilityReport,
}

/// Institution-facing representation of an application.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationView {
    pub application_id: String,
    pub student_id: StudentId,
    pub course_id: CourseId,
    pub institution_id: InstitutionId,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_by: Option<DecidedBy>,
    pub admission_published: bool,
    pub eligible: bool,
    pub applied_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Student-facing representation; unpublished decisions read as pending.
#[derive(Debug, Clone, Serialize)]
pub struct StudentApplicationView {
    pub application_id: String,
    pub course_id: CourseId,
    pub institution_id: InstitutionId,
    pub status: &'static str,
    pub can_accept: bool,
    pub applied_at: DateTime<Utc>,
}

impl ApplicationId {
    /// Accepts both `app-000042` and a bare `42`.
    pub fn parse(raw: &str) -> Option<Self> {
        let digits = raw.trim().trim_start_matches("app-");
        digits.parse::<u64>().ok().map(ApplicationId)
    }
}
