use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use student_search::model::types::{CourseRecord, InstructorPrivilege, StudentRecord};
use student_search::search::document::StudentSearchDocument;
use student_search::search::error::SearchServiceError;
use student_search::search::query::CompiledQuery;
use student_search::search::service::StudentSearchManager;
use student_search::search::tantivy::{IndexSettings, SearchIndex, TantivyIndex};
use student_search::storage::sqlite::SqliteStorage;

/// Captures tracing output for tests.
#[allow(dead_code)]
pub struct TestTracing {
    buffer: Arc<std::sync::Mutex<Vec<u8>>>,
}

#[allow(dead_code)]
impl TestTracing {
    pub fn new() -> Self {
        Self {
            buffer: Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.buffer.clone();
        let make_writer = move || TestWriter(writer.clone());
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .without_time()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(make_writer)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn output(&self) -> String {
        let buf = self.buffer.lock().unwrap();
        String::from_utf8_lossy(&buf).to_string()
    }

    pub fn assert_contains(&self, needle: &str) {
        let out = self.output();
        assert!(
            out.contains(needle),
            "expected logs to contain `{needle}`, got:\n{out}"
        );
    }
}

struct TestWriter(Arc<std::sync::Mutex<Vec<u8>>>);

impl std::io::Write for TestWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut guard = self.0.lock().unwrap();
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[allow(dead_code)]
pub fn student(
    id: &str,
    course: &str,
    section: &str,
    team: &str,
    name: &str,
    registered: bool,
) -> StudentRecord {
    StudentRecord {
        id: id.into(),
        name: name.into(),
        email: format!("{}@x.com", name.to_lowercase()),
        course_id: course.into(),
        team: team.into(),
        section: section.into(),
        registered,
    }
}

#[allow(dead_code)]
pub fn course(id: &str, name: &str) -> CourseRecord {
    CourseRecord {
        id: id.into(),
        name: name.into(),
    }
}

#[allow(dead_code)]
pub fn privilege(course: &str, can_view: bool) -> InstructorPrivilege {
    InstructorPrivilege {
        course_id: course.into(),
        email: "ins@x.com".into(),
        can_view_student_in_sections: can_view,
    }
}

/// Three courses, five students. CS102 has no course row.
#[allow(dead_code)]
pub fn roster() -> (Vec<CourseRecord>, Vec<StudentRecord>) {
    let courses = vec![
        course("CS101", "Programming Methodology"),
        course("MA201", "Linear Algebra"),
    ];
    let students = vec![
        student("s1", "CS101", "Sec 2", "Team X", "Bob", true),
        student("s2", "CS101", "Sec 1", "Team Y", "Ann", true),
        student("s3", "CS101", "Sec 1", "Team Y", "Cat", false),
        student("s4", "MA201", "Sec 1", "Team A", "Dan", false),
        student("s5", "CS102", "Sec 1", "Team A", "Eve", true),
    ];
    (courses, students)
}

/// Wraps a real index and counts queries.
#[allow(dead_code)]
pub struct CountingIndex {
    pub inner: TantivyIndex,
    pub executions: AtomicUsize,
}

#[allow(dead_code)]
impl CountingIndex {
    pub fn new() -> Self {
        Self {
            inner: TantivyIndex::create_in_ram(IndexSettings::default()).expect("ram index"),
            executions: AtomicUsize::new(0),
        }
    }

    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

impl SearchIndex for CountingIndex {
    fn put_documents(&self, docs: &[StudentSearchDocument]) -> Result<(), SearchServiceError> {
        self.inner.put_documents(docs)
    }

    fn delete_documents(&self, ids: &[String]) -> Result<(), SearchServiceError> {
        self.inner.delete_documents(ids)
    }

    fn reset(&self) -> Result<(), SearchServiceError> {
        self.inner.reset()
    }

    fn execute(
        &self,
        query: &CompiledQuery,
    ) -> Result<Vec<StudentSearchDocument>, SearchServiceError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        self.inner.execute(query)
    }
}

/// Ignores every clause and returns a fixed document set, like a stale index would.
#[allow(dead_code)]
pub struct StaleIndex {
    pub docs: Vec<StudentSearchDocument>,
    pub last_query: std::sync::Mutex<Option<CompiledQuery>>,
    pub deleted: std::sync::Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl StaleIndex {
    pub fn new(docs: Vec<StudentSearchDocument>) -> Self {
        Self {
            docs,
            last_query: std::sync::Mutex::new(None),
            deleted: std::sync::Mutex::new(Vec::new()),
        }
    }
}

impl SearchIndex for StaleIndex {
    fn put_documents(&self, _docs: &[StudentSearchDocument]) -> Result<(), SearchServiceError> {
        Ok(())
    }

    fn delete_documents(&self, ids: &[String]) -> Result<(), SearchServiceError> {
        self.deleted.lock().unwrap().extend_from_slice(ids);
        Ok(())
    }

    fn reset(&self) -> Result<(), SearchServiceError> {
        Ok(())
    }

    fn execute(
        &self,
        query: &CompiledQuery,
    ) -> Result<Vec<StudentSearchDocument>, SearchServiceError> {
        *self.last_query.lock().unwrap() = Some(query.clone());
        Ok(self.docs.clone())
    }
}

/// Always fails, like an unreachable index.
#[allow(dead_code)]
pub struct DownIndex;

impl SearchIndex for DownIndex {
    fn put_documents(&self, _docs: &[StudentSearchDocument]) -> Result<(), SearchServiceError> {
        Err(down())
    }

    fn delete_documents(&self, _ids: &[String]) -> Result<(), SearchServiceError> {
        Err(down())
    }

    fn reset(&self) -> Result<(), SearchServiceError> {
        Err(down())
    }

    fn execute(
        &self,
        _query: &CompiledQuery,
    ) -> Result<Vec<StudentSearchDocument>, SearchServiceError> {
        Err(down())
    }
}

#[allow(dead_code)]
fn down() -> SearchServiceError {
    SearchServiceError::Io(std::io::Error::new(
        std::io::ErrorKind::ConnectionRefused,
        "index unreachable",
    ))
}

/// Store seeded with [`roster`].
#[allow(dead_code)]
pub fn seeded_store() -> Arc<SqliteStorage> {
    let store = SqliteStorage::open_in_memory().expect("in-memory store");
    let (courses, students) = roster();
    for c in &courses {
        store.upsert_course(c).expect("course");
    }
    for s in &students {
        store.upsert_student(s).expect("student");
    }
    Arc::new(store)
}

/// Manager over a counting in-RAM index with the whole roster indexed from the store.
#[allow(dead_code)]
pub fn seeded_manager() -> (StudentSearchManager, Arc<CountingIndex>, Arc<SqliteStorage>) {
    let store = seeded_store();
    let index = Arc::new(CountingIndex::new());
    let manager = StudentSearchManager::new(index.clone(), store.clone());
    for s in roster().1 {
        manager.index_student_from_store(&s).expect("index student");
    }
    (manager, index, store)
}
