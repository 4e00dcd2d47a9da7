//! Student search orchestration: compile, restrict, execute, re-verify, rebuild, sort.

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::model::types::{CourseRecord, InstructorPrivilege, StudentFilters, StudentRecord};
use crate::search::document::StudentSearchDocument;
use crate::search::error::{SearchError, SearchServiceError};
use crate::search::query::{CompiledQuery, FilterField};
use crate::search::tantivy::SearchIndex;
use crate::search::visibility::{Visibility, allowed_courses};
use crate::storage::sqlite::StudentStore;

/// Proxy between callers, the search index and the student store.
///
/// Holds no mutable state of its own; concurrent calls are safe as long as both
/// collaborators are.
pub struct StudentSearchManager {
    index: Arc<dyn SearchIndex>,
    store: Arc<dyn StudentStore>,
}

impl StudentSearchManager {
    pub fn new(index: Arc<dyn SearchIndex>, store: Arc<dyn StudentStore>) -> Self {
        Self { index, store }
    }

    /// Index (or re-index) one student. The course may be absent.
    pub fn index_student(
        &self,
        student: &StudentRecord,
        course: Option<&CourseRecord>,
    ) -> Result<(), SearchServiceError> {
        let doc = StudentSearchDocument::build(student, course);
        self.index.put_documents(std::slice::from_ref(&doc))
    }

    /// Index one student, looking its course up in the store first.
    pub fn index_student_from_store(&self, student: &StudentRecord) -> Result<(), SearchError> {
        let course = self.store.find_course(&student.course_id)?;
        self.index_student(student, course.as_ref())?;
        Ok(())
    }

    /// Index many students in a single write.
    pub fn index_students(
        &self,
        students: &[(StudentRecord, Option<CourseRecord>)],
    ) -> Result<(), SearchServiceError> {
        let docs: Vec<StudentSearchDocument> = students
            .iter()
            .map(|(student, course)| StudentSearchDocument::build(student, course.as_ref()))
            .collect();
        self.index.put_documents(&docs)?;
        info!(count = docs.len(), "students_indexed");
        Ok(())
    }

    pub fn delete_students(&self, ids: &[String]) -> Result<(), SearchServiceError> {
        self.index.delete_documents(ids)
    }

    pub fn reset(&self) -> Result<(), SearchServiceError> {
        self.index.reset()
    }

    /// Search students visible to `instructors`.
    ///
    /// `None` instructors means unrestricted. An instructor list without any
    /// view-student privilege yields an empty result without touching the index.
    pub fn search(
        &self,
        raw_text: &str,
        instructors: Option<&[InstructorPrivilege]>,
        filters: &StudentFilters,
    ) -> Result<Vec<StudentRecord>, SearchError> {
        let mut query = CompiledQuery::compile(raw_text);

        let visibility = allowed_courses(instructors);
        if visibility.is_empty() {
            debug!(query = raw_text, "search_short_circuit");
            return Ok(Vec::new());
        }
        visibility.apply(&mut query);

        query.add_filter(FilterField::CourseId, filters.course_id.as_deref());
        query.add_filter(FilterField::Section, filters.section.as_deref());
        query.add_filter(FilterField::Team, filters.team.as_deref());
        query.add_registration_filter(filters.registration_status.as_deref());

        info!(
            query = %query.to_query_string(),
            clauses = query.filters().len(),
            "search_start"
        );
        let documents = self.index.execute(&query)?;
        let returned = documents.len();

        let visible = post_filter(documents, &visibility);
        if visible.len() != returned {
            warn!(
                dropped = returned - visible.len(),
                "post_filter_dropped"
            );
        }

        let mut students = self.reconstruct(visible)?;
        sort_students(&mut students);
        debug!(returned, kept = students.len(), "search_done");
        Ok(students)
    }

    /// Re-fetch each hit from the store. Hits the store no longer knows are
    /// dropped and removed from the index. A hit whose key changed but whose id
    /// still exists is only dropped: a concurrent re-index owns that document.
    fn reconstruct(
        &self,
        documents: Vec<StudentSearchDocument>,
    ) -> Result<Vec<StudentRecord>, SearchError> {
        let mut students = Vec::with_capacity(documents.len());
        let mut stale = Vec::new();
        for doc in documents {
            let (course_id, email) = doc.lookup_key();
            if let Some(student) = self.store.find_student_by_email(course_id, email)? {
                students.push(student);
            } else if self.store.find_student(&doc.id)?.is_some() {
                debug!(id = doc.id.as_str(), "stale_key_skipped");
            } else {
                stale.push(doc.id);
            }
        }
        if !stale.is_empty() {
            warn!(count = stale.len(), "stale_documents_removed");
            if let Err(err) = self.index.delete_documents(&stale) {
                warn!(error = %err, "stale_document_cleanup_failed");
            }
        }
        Ok(students)
    }
}

/// Authoritative visibility re-check on raw index results.
pub fn post_filter(
    documents: Vec<StudentSearchDocument>,
    visibility: &Visibility,
) -> Vec<StudentSearchDocument> {
    match visibility {
        Visibility::Unrestricted => documents,
        Visibility::Courses(_) => documents
            .into_iter()
            .filter(|doc| visibility.permits(&doc.course_id))
            .collect(),
    }
}

/// Course, section, team, name, email; ascending ordinal comparison.
pub fn compare_students(a: &StudentRecord, b: &StudentRecord) -> Ordering {
    a.course_id
        .cmp(&b.course_id)
        .then_with(|| a.section.cmp(&b.section))
        .then_with(|| a.team.cmp(&b.team))
        .then_with(|| a.name.cmp(&b.name))
        .then_with(|| a.email.cmp(&b.email))
}

pub fn sort_students(students: &mut [StudentRecord]) {
    students.sort_by(compare_students);
}
