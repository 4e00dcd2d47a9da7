//! Normalized entity structs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A student enrolled in one course. `(course_id, email)` is the natural key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StudentRecord {
    pub id: String,
    pub name: String,
    pub email: String,
    pub course_id: String,
    #[serde(default)]
    pub team: String,
    #[serde(default)]
    pub section: String,
    #[serde(default)]
    pub registered: bool,
}

impl StudentRecord {
    pub fn registration_status(&self) -> RegistrationStatus {
        RegistrationStatus::from_registered(self.registered)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CourseRecord {
    pub id: String,
    pub name: String,
}

/// One course-level privilege row for an instructor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstructorPrivilege {
    pub course_id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub can_view_student_in_sections: bool,
}

/// Derived registration state. Only ever serialized as one of the two literals.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistrationStatus {
    Registered,
    Unregistered,
}

impl RegistrationStatus {
    pub const fn from_registered(registered: bool) -> Self {
        if registered {
            Self::Registered
        } else {
            Self::Unregistered
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Registered => "REGISTERED",
            Self::Unregistered => "UNREGISTERED",
        }
    }

    /// Case-insensitive, whitespace-tolerant parse of the two literals.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("REGISTERED") {
            Some(Self::Registered)
        } else if trimmed.eq_ignore_ascii_case("UNREGISTERED") {
            Some(Self::Unregistered)
        } else {
            None
        }
    }
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional structured constraints for a search. `None` or blank means unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentFilters {
    pub course_id: Option<String>,
    pub section: Option<String>,
    pub team: Option<String>,
    pub registration_status: Option<String>,
}
