//! Instructor privilege -> visible course set.

use std::collections::BTreeSet;

use crate::model::types::InstructorPrivilege;
use crate::search::query::{CompiledQuery, FilterField};

/// Which courses a caller may see students in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    /// Internal callers: no course restriction, no post-filter.
    Unrestricted,
    /// End-user callers: only these courses. May be empty.
    Courses(BTreeSet<String>),
}

impl Visibility {
    /// The caller can never see any student.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Courses(courses) if courses.is_empty())
    }

    pub fn permits(&self, course_id: &str) -> bool {
        match self {
            Self::Unrestricted => true,
            Self::Courses(courses) => courses.contains(course_id),
        }
    }

    /// Adds the single OR-combined `courseId` clause. No-op when unrestricted.
    pub fn apply(&self, query: &mut CompiledQuery) -> bool {
        match self {
            Self::Unrestricted => false,
            Self::Courses(courses) => query.add_filter_values(FilterField::CourseId, courses),
        }
    }
}

/// `None` means no restriction; `Some` restricts to the distinct courses where the
/// instructor can view students in sections.
pub fn allowed_courses(instructors: Option<&[InstructorPrivilege]>) -> Visibility {
    match instructors {
        None => Visibility::Unrestricted,
        Some(privileges) => Visibility::Courses(
            privileges
                .iter()
                .filter(|p| p.can_view_student_in_sections)
                .map(|p| p.course_id.clone())
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn privilege(course: &str, can_view: bool) -> InstructorPrivilege {
        InstructorPrivilege {
            course_id: course.into(),
            email: "ins@x.com".into(),
            can_view_student_in_sections: can_view,
        }
    }

    #[test]
    fn absent_list_is_unrestricted() {
        let visibility = allowed_courses(None);
        assert_eq!(visibility, Visibility::Unrestricted);
        assert!(!visibility.is_empty());
        assert!(visibility.permits("anything"));

        let mut q = CompiledQuery::compile("ann");
        assert!(!visibility.apply(&mut q));
        assert!(q.filters().is_empty());
    }

    #[test]
    fn keeps_distinct_viewable_courses() {
        let privileges = vec![
            privilege("C2", true),
            privilege("C1", true),
            privilege("C2", true),
            privilege("C3", false),
        ];
        let visibility = allowed_courses(Some(privileges.as_slice()));
        let Visibility::Courses(courses) = &visibility else {
            panic!("expected restricted visibility");
        };
        assert_eq!(courses.iter().collect::<Vec<_>>(), ["C1", "C2"]);
        assert!(!visibility.permits("C3"));

        let mut q = CompiledQuery::compile("");
        assert!(visibility.apply(&mut q));
        assert_eq!(q.filters().len(), 1);
        assert_eq!(q.filters()[0].field(), FilterField::CourseId);
        assert_eq!(q.filters()[0].values(), ["C1", "C2"]);
    }

    #[test]
    fn no_viewable_course_is_empty() {
        assert!(allowed_courses(Some(Vec::new().as_slice())).is_empty());
        assert!(allowed_courses(Some(vec![privilege("C1", false)].as_slice())).is_empty());
    }
}
