//! SQL schema for the field-data store.
//!
//! Survey entities are scoped by project; photo analyses are not.
//! The schema is applied as a single batch when the database is opened.

/// Returns the full SQL schema as a single batch string.
///
/// - `projects` - project metadata, list columns stored as JSON text
/// - `plots`, `quadrants`, `subplots`, `species` - de-duplicated survey entities
/// - `records` - one row per survey sheet line
/// - `canopy_cover` - herb/floor cover observations
/// - `canopy_analyses` - photo analysis results
pub fn create_schema() -> &'static str {
    r#"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS projects (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT NOT NULL,
        status TEXT NOT NULL,
        tools TEXT NOT NULL,
        data_sources TEXT NOT NULL,
        progress INTEGER NOT NULL,
        plot_count INTEGER NOT NULL DEFAULT 0,
        species_count INTEGER NOT NULL DEFAULT 0,
        record_count INTEGER NOT NULL DEFAULT 0,
        total_data_points INTEGER NOT NULL DEFAULT 0,
        last_synced TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS plots (
        project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
        id TEXT NOT NULL,
        plot_id TEXT NOT NULL,
        location_name TEXT NOT NULL,
        description TEXT,
        latitude REAL,
        longitude REAL,
        elevation REAL,
        size TEXT,
        habitat_type TEXT,
        notes TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (project_id, id)
    );

    CREATE TABLE IF NOT EXISTS quadrants (
        project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
        id TEXT NOT NULL,
        plot_id TEXT NOT NULL,
        quadrant_id TEXT NOT NULL,
        description TEXT,
        notes TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (project_id, id)
    );
    CREATE INDEX IF NOT EXISTS idx_quadrants_plot ON quadrants(project_id, plot_id);

    CREATE TABLE IF NOT EXISTS subplots (
        project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
        id TEXT NOT NULL,
        plot_id TEXT NOT NULL,
        quadrant_id TEXT NOT NULL,
        subplot_id TEXT NOT NULL,
        layer_type TEXT NOT NULL,
        species_category TEXT,
        cover_percentage REAL,
        avg_height REAL,
        notes TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (project_id, id)
    );
    CREATE INDEX IF NOT EXISTS idx_subplots_plot ON subplots(project_id, plot_id);

    CREATE TABLE IF NOT EXISTS species (
        project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
        id TEXT NOT NULL,
        scientific_name TEXT NOT NULL,
        common_name TEXT NOT NULL,
        growth_form TEXT NOT NULL,
        family TEXT,
        PRIMARY KEY (project_id, id)
    );

    CREATE TABLE IF NOT EXISTS records (
        project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
        id TEXT NOT NULL,
        species_id TEXT NOT NULL,
        plot_id TEXT NOT NULL,
        quadrant_id TEXT,
        subplot_id TEXT,
        tree_id TEXT,
        height REAL,
        gbh REAL,
        total_gbh REAL,
        cover_percentage REAL,
        avg_height REAL,
        stems INTEGER,
        condition TEXT,
        notes TEXT,
        timestamp TEXT NOT NULL,
        PRIMARY KEY (project_id, id)
    );
    CREATE INDEX IF NOT EXISTS idx_records_plot ON records(project_id, plot_id);

    CREATE TABLE IF NOT EXISTS canopy_cover (
        project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
        id TEXT NOT NULL,
        plot_id TEXT NOT NULL,
        quadrant_id TEXT NOT NULL,
        subplot_id TEXT NOT NULL,
        cover_type TEXT NOT NULL,
        species_name TEXT,
        cover_percentage REAL NOT NULL,
        measurement_date TEXT NOT NULL,
        notes TEXT,
        PRIMARY KEY (project_id, id)
    );
    CREATE INDEX IF NOT EXISTS idx_cover_plot ON canopy_cover(project_id, plot_id);

    CREATE TABLE IF NOT EXISTS canopy_analyses (
        id TEXT PRIMARY KEY,
        plot_id TEXT NOT NULL,
        quadrant_id TEXT NOT NULL,
        subplot_id TEXT,
        image_file_name TEXT NOT NULL,
        image_url TEXT NOT NULL,
        canopy_cover_percentage REAL NOT NULL,
        estimated_lai REAL NOT NULL,
        gap_fraction REAL NOT NULL,
        mask_image_url TEXT,
        segmented_image_url TEXT,
        notes TEXT,
        analysis_date TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_analyses_plot ON canopy_analyses(plot_id);
    "#
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn count_objects(conn: &Connection, kind: &str, name: &str) -> i64 {
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = ?1 AND name = ?2",
            [kind, name],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn schema_creates_all_tables() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(create_schema()).unwrap();

        for table in [
            "projects",
            "plots",
            "quadrants",
            "subplots",
            "species",
            "records",
            "canopy_cover",
            "canopy_analyses",
        ] {
            assert_eq!(count_objects(&conn, "table", table), 1, "Table '{}' should exist", table);
        }
        for index in ["idx_quadrants_plot", "idx_records_plot", "idx_cover_plot"] {
            assert_eq!(count_objects(&conn, "index", index), 1, "Index '{}' should exist", index);
        }
    }

    #[test]
    fn schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(create_schema()).unwrap();
        conn.execute_batch(create_schema())
            .expect("Applying schema twice should succeed due to IF NOT EXISTS");
    }

    #[test]
    fn survey_rows_require_a_project() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(create_schema()).unwrap();
        let result = conn.execute(
            "INSERT INTO plots (project_id, id, plot_id, location_name, created_at, updated_at)
             VALUES ('nope', 'plot_P01', 'P01', '', '', '')",
            [],
        );
        assert!(result.is_err());
    }
}
