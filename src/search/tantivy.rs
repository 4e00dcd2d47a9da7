use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tantivy::collector::TopDocs;
use tantivy::query::{AllQuery, BooleanQuery, Occur, Query, QueryParser, TermQuery};
use tantivy::schema::{
    Field, IndexRecordOption, STORED, STRING, Schema, TEXT, Term, Value,
};
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument};
use tracing::{debug, info};

use crate::model::types::RegistrationStatus;
use crate::search::document::{StudentSearchDocument, TEXT_FIELD};
use crate::search::error::SearchServiceError;
use crate::search::query::{CompiledQuery, FilterField, PrimaryClause};

/// Collection holding one document per student.
pub const COLLECTION_NAME: &str = "students";

const SCHEMA_VERSION: &str = "v1";

/// Smallest heap tantivy accepts for a single indexing thread.
const MIN_WRITER_HEAP: usize = 15_000_000;

/// The index collaborator: accepts documents, executes compiled queries.
pub trait SearchIndex: Send + Sync {
    /// Write documents, replacing any existing document with the same `id`.
    fn put_documents(&self, docs: &[StudentSearchDocument]) -> Result<(), SearchServiceError>;

    fn delete_documents(&self, ids: &[String]) -> Result<(), SearchServiceError>;

    /// Drop every document in the collection.
    fn reset(&self) -> Result<(), SearchServiceError>;

    fn execute(&self, query: &CompiledQuery)
    -> Result<Vec<StudentSearchDocument>, SearchServiceError>;
}

#[derive(Debug, Clone)]
pub struct IndexSettings {
    pub writer_heap_bytes: usize,
    pub max_hits: usize,
    pub allow_reset: bool,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            writer_heap_bytes: 50_000_000,
            max_hits: 10_000,
            allow_reset: false,
        }
    }
}

#[derive(Clone, Copy)]
pub struct Fields {
    pub id: Field,
    pub text: Field,
    pub course_id: Field,
    pub email: Field,
    pub name: Field,
    pub team: Field,
    pub section: Field,
    pub registration_status: Field,
}

impl Fields {
    fn for_filter(&self, field: FilterField) -> Field {
        match field {
            FilterField::CourseId => self.course_id,
            FilterField::Section => self.section,
            FilterField::Team => self.team,
            FilterField::RegistrationStatus => self.registration_status,
        }
    }
}

pub struct TantivyIndex {
    index: Index,
    writer: Mutex<IndexWriter>,
    reader: IndexReader,
    fields: Fields,
    settings: IndexSettings,
}

impl TantivyIndex {
    pub fn open_or_create(path: &Path, settings: IndexSettings) -> Result<Self, SearchServiceError> {
        std::fs::create_dir_all(path)?;
        let index = if path.join("meta.json").exists() {
            Index::open_in_dir(path)?
        } else {
            Index::create_in_dir(path, build_schema())?
        };
        info!(
            collection = COLLECTION_NAME,
            path = %path.display(),
            "index opened"
        );
        Self::from_index(index, settings)
    }

    /// Non-persistent index, for tests and one-shot tools.
    pub fn create_in_ram(settings: IndexSettings) -> Result<Self, SearchServiceError> {
        Self::from_index(Index::create_in_ram(build_schema()), settings)
    }

    fn from_index(index: Index, settings: IndexSettings) -> Result<Self, SearchServiceError> {
        let fields = fields_from_schema(&index.schema())?;
        let writer = index.writer_with_num_threads(1, settings.writer_heap_bytes.max(MIN_WRITER_HEAP))?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;
        Ok(Self {
            index,
            writer: Mutex::new(writer),
            reader,
            fields,
            settings,
        })
    }

    pub fn num_docs(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    fn commit(&self, writer: &mut IndexWriter) -> Result<(), SearchServiceError> {
        writer.commit()?;
        self.reader.reload()?;
        Ok(())
    }

    fn to_tantivy(&self, doc: &StudentSearchDocument) -> TantivyDocument {
        let f = &self.fields;
        let mut d = TantivyDocument::default();
        d.add_text(f.id, &doc.id);
        d.add_text(f.text, &doc.text);
        d.add_text(f.course_id, &doc.course_id);
        d.add_text(f.email, &doc.email);
        d.add_text(f.name, &doc.name);
        d.add_text(f.team, &doc.team);
        d.add_text(f.section, &doc.section);
        d.add_text(f.registration_status, doc.registration_status.as_str());
        d
    }

    fn from_tantivy(&self, doc: &TantivyDocument) -> Result<StudentSearchDocument, SearchServiceError> {
        let f = &self.fields;
        let get = |field: Field, name: &str| -> Result<String, SearchServiceError> {
            doc.get_first(field)
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .ok_or_else(|| SearchServiceError::Corrupt(format!("missing field {name}")))
        };
        let status = get(f.registration_status, "registrationStatus")?;
        let registration_status = RegistrationStatus::parse(&status).ok_or_else(|| {
            SearchServiceError::Corrupt(format!("bad registrationStatus {status:?}"))
        })?;
        Ok(StudentSearchDocument {
            id: get(f.id, "id")?,
            text: get(f.text, TEXT_FIELD)?,
            course_id: get(f.course_id, "courseId")?,
            email: get(f.email, "email")?,
            name: get(f.name, "name")?,
            team: get(f.team, "team")?,
            section: get(f.section, "section")?,
            registration_status,
        })
    }

    fn build_query(&self, query: &CompiledQuery) -> Box<dyn Query> {
        let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();

        if let PrimaryClause::Text(text) = query.primary()
            && !text.is_empty()
        {
            let parser = QueryParser::for_index(&self.index, vec![self.fields.text]);
            let (parsed, errors) = parser.parse_query_lenient(text);
            if !errors.is_empty() {
                debug!(query = text.as_str(), errors = errors.len(), "lenient_parse_recovered");
            }
            clauses.push((Occur::Must, parsed));
        }

        for clause in query.filters() {
            let field = self.fields.for_filter(clause.field());
            let terms = clause
                .values()
                .iter()
                .map(|value| {
                    (
                        Occur::Should,
                        Box::new(TermQuery::new(
                            Term::from_field_text(field, value),
                            IndexRecordOption::Basic,
                        )) as Box<dyn Query>,
                    )
                })
                .collect();
            clauses.push((Occur::Must, Box::new(BooleanQuery::new(terms))));
        }

        if clauses.is_empty() {
            Box::new(AllQuery)
        } else {
            Box::new(BooleanQuery::new(clauses))
        }
    }
}

impl SearchIndex for TantivyIndex {
    fn put_documents(&self, docs: &[StudentSearchDocument]) -> Result<(), SearchServiceError> {
        if docs.is_empty() {
            return Ok(());
        }
        let mut writer = self.writer.lock();
        for doc in docs {
            writer.delete_term(Term::from_field_text(self.fields.id, &doc.id));
            writer.add_document(self.to_tantivy(doc))?;
        }
        self.commit(&mut writer)?;
        debug!(collection = COLLECTION_NAME, count = docs.len(), "documents_put");
        Ok(())
    }

    fn delete_documents(&self, ids: &[String]) -> Result<(), SearchServiceError> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut writer = self.writer.lock();
        for id in ids {
            writer.delete_term(Term::from_field_text(self.fields.id, id));
        }
        self.commit(&mut writer)?;
        debug!(collection = COLLECTION_NAME, count = ids.len(), "documents_deleted");
        Ok(())
    }

    fn reset(&self) -> Result<(), SearchServiceError> {
        if !self.settings.allow_reset {
            return Err(SearchServiceError::ResetNotAllowed);
        }
        let mut writer = self.writer.lock();
        writer.delete_all_documents()?;
        self.commit(&mut writer)?;
        info!(collection = COLLECTION_NAME, "collection_reset");
        Ok(())
    }

    fn execute(
        &self,
        query: &CompiledQuery,
    ) -> Result<Vec<StudentSearchDocument>, SearchServiceError> {
        let q = self.build_query(query);
        let searcher = self.reader.searcher();
        let top_docs = searcher.search(&*q, &TopDocs::with_limit(self.settings.max_hits.max(1)))?;
        let mut docs = Vec::with_capacity(top_docs.len());
        for (_score, addr) in top_docs {
            let stored: TantivyDocument = searcher.doc(addr)?;
            docs.push(self.from_tantivy(&stored)?);
        }
        Ok(docs)
    }
}

pub fn build_schema() -> Schema {
    let mut schema_builder = Schema::builder();
    schema_builder.add_text_field("id", STRING | STORED);
    schema_builder.add_text_field(TEXT_FIELD, TEXT | STORED);
    schema_builder.add_text_field(FilterField::CourseId.name(), STRING | STORED);
    schema_builder.add_text_field("email", STRING | STORED);
    schema_builder.add_text_field("name", STRING | STORED);
    schema_builder.add_text_field(FilterField::Team.name(), STRING | STORED);
    schema_builder.add_text_field(FilterField::Section.name(), STRING | STORED);
    schema_builder.add_text_field(FilterField::RegistrationStatus.name(), STRING | STORED);
    schema_builder.build()
}

pub fn fields_from_schema(schema: &Schema) -> Result<Fields, SearchServiceError> {
    Ok(Fields {
        id: schema.get_field("id")?,
        text: schema.get_field(TEXT_FIELD)?,
        course_id: schema.get_field(FilterField::CourseId.name())?,
        email: schema.get_field("email")?,
        name: schema.get_field("name")?,
        team: schema.get_field(FilterField::Team.name())?,
        section: schema.get_field(FilterField::Section.name())?,
        registration_status: schema.get_field(FilterField::RegistrationStatus.name())?,
    })
}

pub fn index_dir(base: &Path) -> PathBuf {
    base.join("index").join(COLLECTION_NAME).join(SCHEMA_VERSION)
}
