use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use admission_engine::error::AppError;
use admission_engine::workflows::admissions::memory::StudentSeed;
use admission_engine::workflows::admissions::{
    Course, CourseId, CourseRequirement, DirectorySeed, Grade, InMemoryDirectory, InstitutionId,
    StudentId, SubjectGrades,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Directory contents from a JSON seed file, or the built-in sample catalog when none is given.
pub(crate) fn load_directory(seed: Option<&Path>) -> Result<InMemoryDirectory, AppError> {
    let Some(path) = seed else {
        info!("no directory seed configured; loading sample catalog");
        return Ok(InMemoryDirectory::from_seed(sample_seed()));
    };

    let raw = std::fs::read_to_string(path)?;
    let seed: DirectorySeed = serde_json::from_str(&raw)?;
    info!(
        path = %path.display(),
        students = seed.students.len(),
        courses = seed.courses.len(),
        "directory seed loaded"
    );
    Ok(InMemoryDirectory::from_seed(seed))
}

/// Two institutions, five courses, and a handful of students with varied grades.
pub(crate) fn sample_seed() -> DirectorySeed {
    let course = |id: &str, institution: &str, title: &str, minimums: &str| Course {
        id: CourseId(id.to_string()),
        institution: InstitutionId(institution.to_string()),
        title: title.to_string(),
        requirement: CourseRequirement::from_minimums(
            parse_grades(minimums).unwrap_or_default(),
        ),
    };
    let student = |id: &str, subjects: &str| StudentSeed {
        id: StudentId(id.to_string()),
        subjects: parse_grades(subjects).unwrap_or_default(),
    };

    DirectorySeed {
        students: vec![
            student("s-ada", "Math=A, English=B"),
            student("s-wren", "Math=B, English=C"),
            student("s-ivo", "Math=A*, Physics=A"),
        ],
        courses: vec![
            course("c-maths", "i-northfield", "Mathematics", "Math=B"),
            course("c-economics", "i-northfield", "Economics", ""),
            course("c-physics", "i-northfield", "Physics", "Math=A, Physics=B"),
            course("c-english", "i-southbank", "English Literature", "English=C"),
            course("c-history", "i-southbank", "History", ""),
        ],
    }
}

/// Parse `Subject=Grade` pairs separated by commas, e.g. `Math=A*, English=B`.
pub(crate) fn parse_grades(raw: &str) -> Result<SubjectGrades, String> {
    let mut grades = SubjectGrades::new();
    for entry in raw.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
        let (subject, grade) = entry
            .split_once('=')
            .ok_or_else(|| format!("expected Subject=Grade, got '{entry}'"))?;
        let subject = subject.trim();
        if subject.is_empty() {
            return Err(format!("missing subject name in '{entry}'"));
        }
        let grade: Grade = grade
            .trim()
            .parse()
            .map_err(|err| format!("failed to parse '{entry}' ({err})"))?;
        grades.insert(subject.to_string(), grade);
    }
    Ok(grades)
}
