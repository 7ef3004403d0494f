//! Decoding of the academic attributes packed into a student id.
//!
//! A student id is an 8-digit number laid out as
//! `[admission year suffix (2)][branch (1)][division (1)][roll (4)]`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Admission years are stored as a two-digit suffix of this century
const CENTURY_BASE: i32 = 2000;

/// Divisor that leaves the two leading digits of an 8-digit id
const YEAR_DIVISOR: u32 = 1_000_000;

/// Divisor that leaves the three leading digits of an 8-digit id
const BRANCH_DIVISOR: u32 = 100_000;

/// Divisor that leaves the four leading digits of an 8-digit id
const DIVISION_DIVISOR: u32 = 10_000;

/// Year of study derived from the admission year
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum AcademicYear {
    /// First year
    FE,
    /// Second year
    SE,
    /// Third year
    TE,
    /// Final year
    BE,
    /// Admitted four or more years ago
    Graduate,
    /// Admission year lies in the future
    NotYetAdmitted,
}

impl AcademicYear {
    /// Map the number of years since admission onto a year of study
    #[must_use]
    pub fn from_years_since_admission(diff: i32) -> Self {
        match diff {
            0 => Self::FE,
            1 => Self::SE,
            2 => Self::TE,
            3 => Self::BE,
            d if d < 0 => Self::NotYetAdmitted,
            _ => Self::Graduate,
        }
    }
}

impl fmt::Display for AcademicYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::FE => "FE",
            Self::SE => "SE",
            Self::TE => "TE",
            Self::BE => "BE",
            Self::Graduate => "Graduate",
            Self::NotYetAdmitted => "Not yet admitted",
        };
        f.write_str(label)
    }
}

/// Engineering branch encoded by the third digit
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Branch {
    /// Computer engineering
    Comps,
    /// Information technology
    IT,
    /// Artificial intelligence and machine learning
    AIML,
    /// Data science
    DS,
    /// Digit outside the known range
    Unknown,
}

impl Branch {
    /// Decode a branch digit
    #[must_use]
    pub fn from_digit(digit: u32) -> Self {
        match digit {
            1 => Self::Comps,
            2 => Self::IT,
            3 => Self::AIML,
            4 => Self::DS,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Comps => "Comps",
            Self::IT => "IT",
            Self::AIML => "AIML",
            Self::DS => "DS",
            Self::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

/// Class division encoded by the fourth digit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Division {
    /// Division A
    A,
    /// Division B
    B,
    /// Division C
    C,
    /// Digit outside the known range
    Unknown,
}

impl Division {
    /// Decode a division digit
    #[must_use]
    pub fn from_digit(digit: u32) -> Self {
        match digit {
            0 => Self::A,
            1 => Self::B,
            2 => Self::C,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for Division {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

/// Attributes decoded from a student id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StudentProfile {
    /// Year the student was admitted
    pub admission_year: i32,
    /// Year of study relative to the decoding year
    pub year: AcademicYear,
    /// Engineering branch
    pub branch: Branch,
    /// Class division
    pub division: Division,
}

impl StudentProfile {
    /// Decode a student id against the given calendar year.
    ///
    /// The id is expected to be an 8-digit number; callers validate the
    /// length before decoding.
    #[must_use]
    #[allow(clippy::arithmetic_side_effects, clippy::cast_possible_wrap)]
    pub fn decode(id: u32, current_year: i32) -> Self {
        // Two decimal digits always fit an i32.
        let admission_year = CENTURY_BASE + (id / YEAR_DIVISOR) as i32;
        let year = AcademicYear::from_years_since_admission(current_year - admission_year);
        let branch = Branch::from_digit((id / BRANCH_DIVISOR) % 10);
        let division = Division::from_digit((id / DIVISION_DIVISOR) % 10);

        Self { admission_year, year, branch, division }
    }
}

impl fmt::Display for StudentProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.year, self.branch, self.division)
    }
}
