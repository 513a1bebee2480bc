use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Letter grades recognised by the engine, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "A*")]
    AStar,
    A,
    B,
    C,
    D,
    E,
    F,
}

/// The one grade-to-point table. Every eligibility comparison goes through it.
const GRADE_POINTS: [(Grade, u8); 7] = [
    (Grade::AStar, 100),
    (Grade::A, 90),
    (Grade::B, 80),
    (Grade::C, 70),
    (Grade::D, 60),
    (Grade::E, 50),
    (Grade::F, 0),
];

impl Grade {
    pub const ALL: [Grade; 7] = [
        Grade::AStar,
        Grade::A,
        Grade::B,
        Grade::C,
        Grade::D,
        Grade::E,
        Grade::F,
    ];

    pub const fn points(self) -> u8 {
        let mut index = 0;
        while index < GRADE_POINTS.len() {
            if GRADE_POINTS[index].0 as u8 == self as u8 {
                return GRADE_POINTS[index].1;
            }
            index += 1;
        }
        0
    }

    pub const fn label(self) -> &'static str {
        match self {
            Grade::AStar => "A*",
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::E => "E",
            Grade::F => "F",
        }
    }

    /// True when this grade is worth at least as many points as `minimum`.
    pub fn meets(self, minimum: Grade) -> bool {
        self.points() >= minimum.points()
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' is not a recognised letter grade (expected one of A*, A, B, C, D, E, F)")]
pub struct GradeParseError(pub String);

impl FromStr for Grade {
    type Err = GradeParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "A*" | "A+" => Ok(Grade::AStar),
            "A" => Ok(Grade::A),
            "B" => Ok(Grade::B),
            "C" => Ok(Grade::C),
            "D" => Ok(Grade::D),
            "E" => Ok(Grade::E),
            "F" => Ok(Grade::F),
            _ => Err(GradeParseError(raw.to_string())),
        }
    }
}
