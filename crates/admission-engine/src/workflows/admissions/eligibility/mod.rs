mod grades;
mod rules;

pub use grades::{Grade, GradeParseError};

use serde::{Deserialize, Serialize};

use super::domain::{CourseRequirement, SubjectGrades};

/// Stateless check of a student's grades against a course requirement.
#[derive(Debug, Clone, Copy, Default)]
pub struct EligibilityEvaluator;

impl EligibilityEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Eligible iff every required subject is present and meets its minimum.
    pub fn evaluate(&self, subjects: &SubjectGrades, requirement: &CourseRequirement) -> bool {
        requirement
            .iter()
            .all(|(subject, minimum)| rules::check_subject(subjects, subject, minimum).is_none())
    }

    /// Same verdict as [`evaluate`](Self::evaluate) with every shortfall listed.
    pub fn assess(
        &self,
        subjects: &SubjectGrades,
        requirement: &CourseRequirement,
    ) -> EligibilityReport {
        let shortfalls: Vec<Shortfall> = requirement
            .iter()
            .filter_map(|(subject, minimum)| rules::check_subject(subjects, subject, minimum))
            .collect();

        EligibilityReport {
            eligible: shortfalls.is_empty(),
            shortfalls,
        }
    }
}

/// Outcome of an eligibility assessment, frozen on the application at apply time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityReport {
    pub eligible: bool,
    pub shortfalls: Vec<Shortfall>,
}

impl EligibilityReport {
    pub fn summary(&self) -> String {
        if self.eligible {
            return "meets all subject requirements".to_string();
        }
        let details: Vec<String> = self.shortfalls.iter().map(Shortfall::summary).collect();
        format!("ineligible: {}", details.join("; "))
    }
}

/// A single unmet subject requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Shortfall {
    MissingSubject {
        subject: String,
        required: Grade,
    },
    BelowMinimum {
        subject: String,
        required: Grade,
        actual: Grade,
    },
}

impl Shortfall {
    pub fn subject(&self) -> &str {
        match self {
            Shortfall::MissingSubject { subject, .. } | Shortfall::BelowMinimum { subject, .. } => {
                subject
            }
        }
    }

    pub fn summary(&self) -> String {
        match self {
            Shortfall::MissingSubject { subject, required } => {
                format!("{subject} not taken (requires {required})")
            }
            Shortfall::BelowMinimum {
                subject,
                required,
                actual,
            } => format!("{subject} grade {actual} below required {required}"),
        }
    }
}
