use std::collections::{BTreeMap, BTreeSet};

use super::common::*;
use crate::workflows::admissions::domain::{CourseRequirement, RequirementError};
use crate::workflows::admissions::eligibility::{EligibilityEvaluator, Grade, Shortfall};

#[test]
fn higher_grade_satisfies_lower_minimum() {
    let evaluator = EligibilityEvaluator::new();
    let subjects = grades(&[("Math", Grade::A), ("English", Grade::B)]);

    assert!(evaluator.evaluate(&subjects, &requirement(&[("Math", Grade::B)])));
}

#[test]
fn equal_grade_is_enough() {
    let evaluator = EligibilityEvaluator::new();
    let subjects = grades(&[("Chemistry", Grade::C)]);

    assert!(evaluator.evaluate(&subjects, &requirement(&[("Chemistry", Grade::C)])));
}

#[test]
fn missing_subject_is_ineligible_whatever_else_is_recorded() {
    let evaluator = EligibilityEvaluator::new();
    let subjects = grades(&[
        ("Math", Grade::AStar),
        ("English", Grade::AStar),
        ("Physics", Grade::AStar),
    ]);
    let needs_biology = requirement(&[("Math", Grade::F), ("Biology", Grade::F)]);

    assert!(!evaluator.evaluate(&subjects, &needs_biology));
    let report = evaluator.assess(&subjects, &needs_biology);
    assert_eq!(
        report.shortfalls,
        vec![Shortfall::MissingSubject {
            subject: "Biology".to_string(),
            required: Grade::F,
        }]
    );
}

#[test]
fn empty_requirement_admits_anyone() {
    let evaluator = EligibilityEvaluator::new();

    assert!(evaluator.evaluate(&grades(&[]), &CourseRequirement::none()));
    assert!(evaluator.evaluate(&grades(&[("Art", Grade::F)]), &CourseRequirement::none()));
}

#[test]
fn assess_lists_every_shortfall_and_agrees_with_evaluate() {
    let evaluator = EligibilityEvaluator::new();
    let subjects = grades(&[("Math", Grade::C), ("English", Grade::A)]);
    let demanding = requirement(&[
        ("Math", Grade::A),
        ("English", Grade::B),
        ("Physics", Grade::D),
    ]);

    let report = evaluator.assess(&subjects, &demanding);

    assert!(!report.eligible);
    assert_eq!(report.eligible, evaluator.evaluate(&subjects, &demanding));
    assert_eq!(report.shortfalls.len(), 2);
    assert!(report.shortfalls.contains(&Shortfall::BelowMinimum {
        subject: "Math".to_string(),
        required: Grade::A,
        actual: Grade::C,
    }));
    assert!(report
        .shortfalls
        .iter()
        .any(|shortfall| shortfall.subject() == "Physics"));
    assert!(report.summary().contains("Math grade C below required A"));
}

#[test]
fn evaluation_is_exhaustively_consistent_with_point_table() {
    let evaluator = EligibilityEvaluator::new();
    for actual in Grade::ALL {
        for minimum in Grade::ALL {
            let subjects = grades(&[("Math", actual)]);
            let course = requirement(&[("Math", minimum)]);
            let first = evaluator.evaluate(&subjects, &course);
            let second = evaluator.evaluate(&subjects, &course);
            assert_eq!(first, second);
            assert_eq!(first, actual.points() >= minimum.points(), "{actual} vs {minimum}");
        }
    }
}

#[test]
fn requirement_rejects_subject_without_minimum() {
    let subjects: BTreeSet<String> = ["Math".to_string(), "Physics".to_string()].into();
    let mut minimums = BTreeMap::new();
    minimums.insert("Math".to_string(), Grade::B);

    assert_eq!(
        CourseRequirement::new(subjects, minimums),
        Err(RequirementError::MissingMinimum("Physics".to_string()))
    );
}

#[test]
fn requirement_rejects_stray_minimum() {
    let subjects: BTreeSet<String> = ["Math".to_string()].into();
    let mut minimums = BTreeMap::new();
    minimums.insert("Math".to_string(), Grade::B);
    minimums.insert("Latin".to_string(), Grade::E);

    assert_eq!(
        CourseRequirement::new(subjects, minimums),
        Err(RequirementError::UnexpectedMinimum("Latin".to_string()))
    );
}

#[test]
fn requirement_deserializes_from_subject_map() {
    let parsed: CourseRequirement =
        serde_json::from_str(r#"{"Math": "B", "Physics": "A*"}"#).expect("requirement parses");

    assert_eq!(parsed.minimum_for("Math"), Some(Grade::B));
    assert_eq!(parsed.minimum_for("Physics"), Some(Grade::AStar));
    assert_eq!(parsed.subjects().count(), 2);
}
