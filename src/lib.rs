pub mod config;
pub mod model;
pub mod search;
pub mod storage;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::info;

use config::SearchConfig;
use model::types::{CourseRecord, InstructorPrivilege, StudentFilters, StudentRecord};
use search::service::StudentSearchManager;
use search::tantivy::TantivyIndex;
use storage::sqlite::{SqliteStorage, StudentStore};

/// Command-line interface.
#[derive(Parser, Debug)]
#[command(
    name = "stusearch",
    version,
    about = "Visibility-aware search over course student records"
)]
pub struct Cli {
    /// Path to the SQLite database (defaults to <data-dir>/students.db)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Override data dir (index + db). Defaults to platform data dir.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load courses, students and instructors from a JSON file into the store
    Import {
        file: PathBuf,
    },
    /// Index every student in the store
    Index {
        /// Clear the index first (requires STUSEARCH_ALLOW_RESET)
        #[arg(long)]
        full: bool,
    },
    /// Search students
    Search {
        /// Free text; the bare words REGISTERED / UNREGISTERED filter by status
        #[arg(default_value = "")]
        query: String,

        /// Restrict to courses this instructor may view (omit for unrestricted)
        #[arg(long)]
        instructor: Option<String>,

        #[arg(long)]
        course: Option<String>,

        #[arg(long)]
        section: Option<String>,

        #[arg(long)]
        team: Option<String>,

        /// REGISTERED or UNREGISTERED
        #[arg(long)]
        registration: Option<String>,

        /// Emit JSON instead of tab-separated lines
        #[arg(long)]
        json: bool,
    },
    /// Remove documents from the index by student id
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Drop every document from the index (requires STUSEARCH_ALLOW_RESET)
    Reset,
}

/// Shape of an `import` file.
#[derive(Debug, Default, Deserialize)]
pub struct ImportBundle {
    #[serde(default)]
    pub courses: Vec<CourseRecord>,
    #[serde(default)]
    pub students: Vec<StudentRecord>,
    #[serde(default)]
    pub instructors: Vec<InstructorPrivilege>,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let cfg = SearchConfig::resolve(cli.data_dir, cli.db)?;

    match cli.command {
        Commands::Import { file } => run_import(&cfg, &file),
        Commands::Index { full } => run_index(&cfg, full),
        Commands::Search {
            query,
            instructor,
            course,
            section,
            team,
            registration,
            json,
        } => {
            let filters = StudentFilters {
                course_id: course,
                section,
                team,
                registration_status: registration,
            };
            run_search(&cfg, &query, instructor.as_deref(), &filters, json)
        }
        Commands::Delete { ids } => {
            let (manager, _) = open_manager(&cfg)?;
            manager.delete_students(&ids)?;
            Ok(())
        }
        Commands::Reset => {
            let (manager, _) = open_manager(&cfg)?;
            manager.reset()?;
            Ok(())
        }
    }
}

fn open_manager(cfg: &SearchConfig) -> Result<(StudentSearchManager, Arc<SqliteStorage>)> {
    let store = Arc::new(SqliteStorage::open(&cfg.db_path)?);
    let index = TantivyIndex::open_or_create(&cfg.index_dir, cfg.index_settings())
        .with_context(|| format!("opening index at {}", cfg.index_dir.display()))?;
    let manager = StudentSearchManager::new(Arc::new(index), store.clone());
    Ok((manager, store))
}

fn run_import(cfg: &SearchConfig, file: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let bundle: ImportBundle =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", file.display()))?;
    let store = SqliteStorage::open(&cfg.db_path)?;
    for course in &bundle.courses {
        store.upsert_course(course)?;
    }
    for student in &bundle.students {
        store.upsert_student(student)?;
    }
    for privilege in &bundle.instructors {
        store.upsert_instructor(privilege)?;
    }
    info!(
        courses = bundle.courses.len(),
        students = bundle.students.len(),
        instructors = bundle.instructors.len(),
        "import complete"
    );
    Ok(())
}

fn run_index(cfg: &SearchConfig, full: bool) -> Result<()> {
    let (manager, store) = open_manager(cfg)?;
    if full {
        manager.reset().context("full reindex needs a reset")?;
    }
    let mut courses: HashMap<String, Option<CourseRecord>> = HashMap::new();
    let mut batch = Vec::new();
    for student in store.list_students()? {
        if !courses.contains_key(&student.course_id) {
            let course = store.find_course(&student.course_id)?;
            courses.insert(student.course_id.clone(), course);
        }
        let course = courses.get(&student.course_id).cloned().flatten();
        batch.push((student, course));
    }
    manager.index_students(&batch)?;
    println!("indexed {} students", batch.len());
    Ok(())
}

fn run_search(
    cfg: &SearchConfig,
    query: &str,
    instructor: Option<&str>,
    filters: &StudentFilters,
    json: bool,
) -> Result<()> {
    let (manager, store) = open_manager(cfg)?;
    let privileges = instructor
        .map(|email| store.instructor_privileges(email))
        .transpose()?;
    let students = manager.search(query, privileges.as_deref(), filters)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&students)?);
    } else {
        for s in &students {
            println!(
                "{}\t{}\t{}\t{}\t{}\t{}",
                s.course_id,
                s.section,
                s.team,
                s.name,
                s.email,
                s.registration_status()
            );
        }
    }
    Ok(())
}
