//! Projection of a student into the flat document shape stored in the index.

use serde::{Deserialize, Serialize};

use crate::model::types::{CourseRecord, RegistrationStatus, StudentRecord};

/// Wire name of the free-text blob field.
pub const TEXT_FIELD: &str = "_text_";

/// The indexed form of a student. Serializes to the same field map the index stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentSearchDocument {
    pub id: String,
    #[serde(rename = "_text_")]
    pub text: String,
    #[serde(rename = "courseId")]
    pub course_id: String,
    pub email: String,
    pub name: String,
    pub team: String,
    pub section: String,
    #[serde(rename = "registrationStatus")]
    pub registration_status: RegistrationStatus,
}

impl StudentSearchDocument {
    /// Build the document for `student`. A missing course contributes an empty name.
    pub fn build(student: &StudentRecord, course: Option<&CourseRecord>) -> Self {
        let registration_status = student.registration_status();
        let course_name = course.map_or("", |c| c.name.as_str());
        let text = [
            student.name.as_str(),
            student.email.as_str(),
            student.course_id.as_str(),
            course_name,
            student.team.as_str(),
            student.section.as_str(),
            registration_status.as_str(),
        ]
        .join(" ");

        Self {
            id: student.id.clone(),
            text,
            course_id: student.course_id.clone(),
            email: student.email.clone(),
            name: student.name.clone(),
            team: student.team.clone(),
            section: student.section.clone(),
            registration_status,
        }
    }

    /// Natural key used to re-fetch the student from the store.
    pub fn lookup_key(&self) -> (&str, &str) {
        (&self.course_id, &self.email)
    }
}
