//! In-process implementations of the storage, directory, and notification collaborators.
//!
//! The store serializes commits behind one mutex and stages every transaction on a copy of the
//! state, so a failed guard or invariant check leaves nothing behind.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::clock::{Clock, SystemClock};
use super::domain::{
    Application, ApplicationId, ApplicationStatus, Course, CourseId, InstitutionId, StudentId,
    SubjectGrades, INSTITUTION_APPLICATION_CAP,
};
use super::eligibility::Grade;
use super::repository::{
    AdmissionDirectory, AdmissionEvent, ApplicationStore, Committed, CourseView, EventError,
    EventPublisher, Guard, RepositoryError, Revision, StudentView, Transaction, Write,
};

#[derive(Debug, Clone, Default)]
struct StoreState {
    records: BTreeMap<ApplicationId, Application>,
    student_revisions: HashMap<StudentId, Revision>,
    course_revisions: HashMap<CourseId, Revision>,
    published_courses: BTreeSet<CourseId>,
    last_id: u64,
}

impl StoreState {
    fn student_revision(&self, student: &StudentId) -> Revision {
        self.student_revisions.get(student).copied().unwrap_or_default()
    }

    fn course_revision(&self, course: &CourseId) -> Revision {
        self.course_revisions.get(course).copied().unwrap_or_default()
    }

    fn touch_student(&mut self, student: &StudentId) {
        let next = self.student_revision(student).next();
        self.student_revisions.insert(student.clone(), next);
    }

    fn touch_course(&mut self, course: &CourseId) {
        let next = self.course_revision(course).next();
        self.course_revisions.insert(course.clone(), next);
    }

    fn check(&self, guard: &Guard) -> Result<(), RepositoryError> {
        let (found, expected) = match guard {
            Guard::Student { student, revision } => (self.student_revision(student), *revision),
            Guard::Course { course, revision } => (self.course_revision(course), *revision),
        };
        if found == expected {
            Ok(())
        } else {
            Err(RepositoryError::Conflict)
        }
    }

    fn validate_student(&self, student: &StudentId) -> Result<(), RepositoryError> {
        let mut active_per_institution: HashMap<&InstitutionId, usize> = HashMap::new();
        let mut accepted = 0usize;

        for application in self.records.values().filter(|a| &a.student == student) {
            if application.status.is_active() {
                *active_per_institution
                    .entry(&application.institution)
                    .or_default() += 1;
            }
            if application.status == ApplicationStatus::Accepted {
                accepted += 1;
            }
            if application.admission_published && !application.status.is_decided() {
                return Err(RepositoryError::InvariantViolation(format!(
                    "{} is published while still {}",
                    application.id, application.status
                )));
            }
        }

        if let Some((institution, count)) = active_per_institution
            .into_iter()
            .find(|(_, count)| *count > INSTITUTION_APPLICATION_CAP)
        {
            return Err(RepositoryError::InvariantViolation(format!(
                "{student} would hold {count} active applications at {institution}"
            )));
        }

        if accepted > 1 {
            return Err(RepositoryError::InvariantViolation(format!(
                "{student} would hold {accepted} accepted offers"
            )));
        }

        Ok(())
    }
}

/// Mutex-backed [`ApplicationStore`].
pub struct InMemoryApplicationStore {
    state: Mutex<StoreState>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryApplicationStore {
    fn default() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }
}

impl InMemoryApplicationStore {
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            clock,
        }
    }

    /// Snapshot of every stored application, ordered by id.
    pub fn all(&self) -> Result<Vec<Application>, RepositoryError> {
        Ok(self.lock()?.records.values().cloned().collect())
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
    }

    fn apply_write(
        staged: &mut StoreState,
        write: Write,
        now: DateTime<Utc>,
        touched: &mut BTreeSet<StudentId>,
        committed: &mut Committed,
    ) -> Result<(), RepositoryError> {
        match write {
            Write::Insert(new) => {
                staged.last_id += 1;
                let application = Application {
                    id: ApplicationId(staged.last_id),
                    student: new.student,
                    course: new.course,
                    institution: new.institution,
                    subjects: new.subjects,
                    eligibility: new.eligibility,
                    status: ApplicationStatus::Pending,
                    decided_by: None,
                    admission_published: false,
                    applied_at: now,
                    updated_at: now,
                    version: 0,
                    history: Vec::new(),
                };
                staged.touch_student(&application.student);
                touched.insert(application.student.clone());
                committed.inserted.push(application.clone());
                staged.records.insert(application.id, application);
            }
            Write::Update(mut application) => {
                let current = staged
                    .records
                    .get(&application.id)
                    .ok_or(RepositoryError::NotFound)?;
                if current.version != application.version {
                    return Err(RepositoryError::Conflict);
                }
                if current.student != application.student
                    || current.course != application.course
                    || current.institution != application.institution
                    || current.applied_at != application.applied_at
                {
                    return Err(RepositoryError::InvariantViolation(format!(
                        "{} ownership and apply time are immutable",
                        application.id
                    )));
                }
                if current.admission_published && !application.admission_published {
                    return Err(RepositoryError::InvariantViolation(format!(
                        "{} publication cannot be withdrawn",
                        application.id
                    )));
                }

                let waitlist_changed = current.status == ApplicationStatus::Waitlisted
                    || application.status == ApplicationStatus::Waitlisted;
                application.version += 1;
                application.updated_at = now;
                staged.touch_student(&application.student);
                if waitlist_changed {
                    staged.touch_course(&application.course);
                }
                touched.insert(application.student.clone());
                committed.updated.push(application.clone());
                staged.records.insert(application.id, application);
            }
            Write::Remove { id, version } => {
                let current = staged.records.get(&id).ok_or(RepositoryError::NotFound)?;
                if current.version != version {
                    return Err(RepositoryError::Conflict);
                }
                let was_waitlisted = current.status == ApplicationStatus::Waitlisted;
                let (student, course) = (current.student.clone(), current.course.clone());
                staged.records.remove(&id);
                staged.touch_student(&student);
                if was_waitlisted {
                    staged.touch_course(&course);
                }
                touched.insert(student);
            }
            Write::PublishCourse(course) => {
                if staged.published_courses.insert(course.clone()) {
                    staged.touch_course(&course);
                }
            }
        }
        Ok(())
    }
}

impl ApplicationStore for InMemoryApplicationStore {
    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn fetch(&self, id: ApplicationId) -> Result<Option<Application>, RepositoryError> {
        Ok(self.lock()?.records.get(&id).cloned())
    }

    fn student_view(&self, student: &StudentId) -> Result<StudentView, RepositoryError> {
        let state = self.lock()?;
        Ok(StudentView {
            student: student.clone(),
            revision: state.student_revision(student),
            applications: state
                .records
                .values()
                .filter(|application| &application.student == student)
                .cloned()
                .collect(),
        })
    }

    fn course_view(&self, course: &CourseId) -> Result<CourseView, RepositoryError> {
        let state = self.lock()?;
        Ok(CourseView {
            course: course.clone(),
            revision: state.course_revision(course),
            published: state.published_courses.contains(course),
            applications: state
                .records
                .values()
                .filter(|application| &application.course == course)
                .cloned()
                .collect(),
        })
    }

    fn commit(&self, transaction: Transaction) -> Result<Committed, RepositoryError> {
        let now = self.clock.now();
        let mut state = self.lock()?;

        for guard in &transaction.guards {
            state.check(guard)?;
        }

        let mut staged = state.clone();
        let mut touched = BTreeSet::new();
        let mut committed = Committed::default();
        for write in transaction.writes {
            Self::apply_write(&mut staged, write, now, &mut touched, &mut committed)?;
        }

        for student in &touched {
            staged.validate_student(student)?;
        }

        *state = staged;
        Ok(committed)
    }
}

/// Student profile as supplied in a seed file.
#[derive(Debug, Clone, Deserialize)]
pub struct StudentSeed {
    pub id: StudentId,
    #[serde(default)]
    pub subjects: SubjectGrades,
}

/// Students and courses used to populate an [`InMemoryDirectory`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DirectorySeed {
    #[serde(default)]
    pub students: Vec<StudentSeed>,
    #[serde(default)]
    pub courses: Vec<Course>,
}

/// Lock-backed profile and course catalog.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    students: RwLock<HashMap<StudentId, SubjectGrades>>,
    courses: RwLock<HashMap<CourseId, Course>>,
}

impl InMemoryDirectory {
    pub fn from_seed(seed: DirectorySeed) -> Self {
        let directory = Self::default();
        for student in seed.students {
            directory.upsert_student(student.id, student.subjects);
        }
        for course in seed.courses {
            directory.upsert_course(course);
        }
        directory
    }

    pub fn upsert_student(&self, student: StudentId, subjects: SubjectGrades) {
        self.students
            .write()
            .expect("directory lock poisoned")
            .insert(student, subjects);
    }

    /// Record or overwrite one grade on a student's profile.
    pub fn record_grade(&self, student: &StudentId, subject: &str, grade: Grade) {
        self.students
            .write()
            .expect("directory lock poisoned")
            .entry(student.clone())
            .or_default()
            .insert(subject.to_string(), grade);
    }

    pub fn upsert_course(&self, course: Course) {
        self.courses
            .write()
            .expect("directory lock poisoned")
            .insert(course.id.clone(), course);
    }
}

impl AdmissionDirectory for InMemoryDirectory {
    fn student_subjects(
        &self,
        student: &StudentId,
    ) -> Result<Option<SubjectGrades>, RepositoryError> {
        let guard = self
            .students
            .read()
            .map_err(|_| RepositoryError::Unavailable("directory lock poisoned".to_string()))?;
        Ok(guard.get(student).cloned())
    }

    fn course(&self, course: &CourseId) -> Result<Option<Course>, RepositoryError> {
        let guard = self
            .courses
            .read()
            .map_err(|_| RepositoryError::Unavailable("directory lock poisoned".to_string()))?;
        Ok(guard.get(course).cloned())
    }
}

/// Event publisher that keeps everything it is handed.
#[derive(Debug, Default, Clone)]
pub struct InMemoryEventLog {
    events: Arc<Mutex<Vec<AdmissionEvent>>>,
}

impl InMemoryEventLog {
    pub fn events(&self) -> Vec<AdmissionEvent> {
        self.events.lock().expect("event mutex poisoned").clone()
    }
}

impl EventPublisher for InMemoryEventLog {
    fn publish(&self, event: AdmissionEvent) -> Result<(), EventError> {
        self.events
            .lock()
            .map_err(|_| EventError::Transport("event mutex poisoned".to_string()))?
            .push(event);
        Ok(())
    }
}
