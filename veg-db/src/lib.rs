//! SQLite repository for vegetation survey projects.
//!
//! This crate stores projects, the survey entities imported into them
//! (plots, quadrants, subplots, species, records, canopy cover) and canopy
//! photo analyses, and exposes typed query methods over them.
//!
//! # Architecture
//!
//! - `Rc<RefCell<Connection>>` wrapper so clones share one connection
//! - file-backed SQLite via `rusqlite`, or in-memory for tests
//! - imports are committed in a single transaction
//!
//! # Usage
//!
//! ```rust
//! use veg_db::Database;
//! use veg_model::{import::import_vegetation, project::DEFAULT_PROJECT_ID};
//!
//! let db = Database::new().unwrap();
//! db.ensure_default_project().unwrap();
//!
//! let woody = "Plot_ID,Location_Name,Quad_ID,Species_Scientific,Growth_Form,Tree_ID\n\
//!              P01,North Ridge,Q1,Shorea robusta,Tree,T001\n";
//! let bundle = import_vegetation(woody, "", chrono::Utc::now());
//! db.import_bundle(DEFAULT_PROJECT_ID, &bundle).unwrap();
//!
//! let plots = db.get_plots(DEFAULT_PROJECT_ID).unwrap();
//! assert_eq!(plots.len(), 1);
//! ```
//!
//! # Tables
//!
//! See [`schema::create_schema`] for the full SQL schema.

pub mod schema;
mod loader;
mod queries;
pub mod models;

pub use loader::ImportSummary;

use rusqlite::Connection;
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use veg_model::{
    photo::{CanopyAnalysisStore, CanopyPhotoAnalysis},
    project::{default_project, Project},
};
use veg_utils::dates::now;

/// Path that opens an in-memory database instead of a file.
pub const IN_MEMORY: &str = ":memory:";

/// SQLite store for survey projects and photo analyses.
///
/// This struct is cheaply cloneable (via `Rc`); clones share the same
/// connection.
///
/// # Example
///
/// ```rust
/// use veg_db::Database;
///
/// let db = Database::new().unwrap();
/// let project = db.ensure_default_project().unwrap();
/// assert_eq!(db.get_all_projects().unwrap(), vec![project]);
/// ```
#[derive(Clone)]
pub struct Database {
    conn: Rc<RefCell<Connection>>,
}

impl Database {
    /// Create a new in-memory database with the full schema applied.
    pub fn new() -> anyhow::Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Open (or create) a database file and apply the schema.
    /// [`IN_MEMORY`] opens an in-memory database.
    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if path == Path::new(IN_MEMORY) {
            return Self::new();
        }
        log::debug!("db: opening {}", path.display());
        Self::from_connection(Connection::open(path)?)
    }

    fn from_connection(conn: Connection) -> anyhow::Result<Self> {
        conn.execute_batch(schema::create_schema())?;
        Ok(Self {
            conn: Rc::new(RefCell::new(conn)),
        })
    }

    /// Create the default project when no project exists yet.
    ///
    /// Returns the default project, or the first stored project when the
    /// store is already populated.
    pub fn ensure_default_project(&self) -> anyhow::Result<Project> {
        if let Some(existing) = self.get_all_projects()?.into_iter().next() {
            return Ok(existing);
        }
        let project = default_project(now());
        self.create_project(&project)?;
        Ok(project)
    }
}

impl CanopyAnalysisStore for Database {
    fn save_canopy_analysis(&self, analysis: &CanopyPhotoAnalysis) -> anyhow::Result<()> {
        self.save_analysis(analysis)
    }
}
