//! Create / read / update / delete over the stored entities.
//!
//! Lookups by id return `Ok(None)` when nothing matches; `Err` is kept
//! for storage failures.

use crate::loader::{insert_plot, insert_quadrant, insert_species, insert_subplot, OnConflict};
use crate::models::{
    analysis_from_row, cover_from_row, plot_from_row, project_from_row, quadrant_from_row,
    record_from_row, species_from_row, subplot_from_row, PlotDetails, ProjectCounts, ANALYSIS_COLUMNS,
    COVER_COLUMNS, PLOT_COLUMNS, PROJECT_COLUMNS, QUADRANT_COLUMNS, RECORD_COLUMNS,
    SPECIES_COLUMNS, SUBPLOT_COLUMNS,
};
use crate::Database;
use rusqlite::{params, OptionalExtension, Row, ToSql};
use veg_model::{
    cover::CanopyCoverData,
    photo::CanopyPhotoAnalysis,
    plot::{Plot, Quadrant, Subplot},
    project::Project,
    species::{Species, SpeciesRecord},
};

impl Database {
    fn query_list<T, F>(&self, sql: &str, params: &[&dyn ToSql], map: F) -> anyhow::Result<Vec<T>>
    where
        F: FnMut(&Row) -> rusqlite::Result<T>,
    {
        let conn = self.conn.borrow();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, map)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn query_one<T, F>(&self, sql: &str, params: &[&dyn ToSql], map: F) -> anyhow::Result<Option<T>>
    where
        F: FnOnce(&Row) -> rusqlite::Result<T>,
    {
        let conn = self.conn.borrow();
        Ok(conn.query_row(sql, params, map).optional()?)
    }

    fn execute(&self, sql: &str, params: &[&dyn ToSql]) -> anyhow::Result<usize> {
        Ok(self.conn.borrow().execute(sql, params)?)
    }

    // ───────────────────── Projects ─────────────────────

    pub fn create_project(&self, p: &Project) -> anyhow::Result<()> {
        self.execute(
            &format!(
                "INSERT INTO projects ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                PROJECT_COLUMNS
            ),
            params![
                p.id,
                p.name,
                p.description,
                p.status.as_str(),
                serde_json::to_string(&p.tools)?,
                serde_json::to_string(&p.data_sources)?,
                p.progress,
                p.plot_count,
                p.species_count,
                p.record_count,
                p.total_data_points,
                p.last_synced,
                p.created_at,
                p.updated_at
            ],
        )?;
        log::info!("query: created project {}", p.id);
        Ok(())
    }

    pub fn get_project(&self, id: &str) -> anyhow::Result<Option<Project>> {
        self.query_one(
            &format!("SELECT {} FROM projects WHERE id = ?1", PROJECT_COLUMNS),
            params![id],
            project_from_row,
        )
    }

    pub fn get_all_projects(&self) -> anyhow::Result<Vec<Project>> {
        self.query_list(
            &format!("SELECT {} FROM projects ORDER BY created_at, id", PROJECT_COLUMNS),
            params![],
            project_from_row,
        )
    }

    /// Returns false when the project is not stored.
    pub fn update_project(&self, p: &Project) -> anyhow::Result<bool> {
        let changed = self.execute(
            "UPDATE projects SET name = ?2, description = ?3, status = ?4, tools = ?5,
                data_sources = ?6, progress = ?7, plot_count = ?8, species_count = ?9,
                record_count = ?10, total_data_points = ?11, last_synced = ?12, updated_at = ?13
             WHERE id = ?1",
            params![
                p.id,
                p.name,
                p.description,
                p.status.as_str(),
                serde_json::to_string(&p.tools)?,
                serde_json::to_string(&p.data_sources)?,
                p.progress,
                p.plot_count,
                p.species_count,
                p.record_count,
                p.total_data_points,
                p.last_synced,
                p.updated_at
            ],
        )?;
        Ok(changed > 0)
    }

    /// Delete a project and all of its survey data.
    pub fn delete_project(&self, id: &str) -> anyhow::Result<bool> {
        Ok(self.execute("DELETE FROM projects WHERE id = ?1", params![id])? > 0)
    }

    pub fn project_counts(&self, project_id: &str) -> anyhow::Result<ProjectCounts> {
        let conn = self.conn.borrow();
        let count = |table: &str| -> rusqlite::Result<u32> {
            conn.query_row(
                &format!("SELECT COUNT(*) FROM {} WHERE project_id = ?1", table),
                params![project_id],
                |row| row.get(0),
            )
        };
        Ok(ProjectCounts {
            plots: count("plots")?,
            species: count("species")?,
            records: count("records")?,
            cover_observations: count("canopy_cover")?,
        })
    }

    // ───────────────────── Plots ─────────────────────

    /// Store a new plot; fails if the plot id is already used in the project.
    pub fn add_plot(&self, project_id: &str, plot: &Plot) -> anyhow::Result<()> {
        insert_plot(&self.conn.borrow(), project_id, plot, OnConflict::Fail)?;
        log::info!("query: added plot {} to {}", plot.plot_id, project_id);
        Ok(())
    }

    /// Look up a plot by its survey id (e.g. "P01").
    pub fn get_plot(&self, project_id: &str, plot_id: &str) -> anyhow::Result<Option<Plot>> {
        self.query_one(
            &format!(
                "SELECT {} FROM plots WHERE project_id = ?1 AND plot_id = ?2",
                PLOT_COLUMNS
            ),
            params![project_id, plot_id],
            plot_from_row,
        )
    }

    pub fn get_plots(&self, project_id: &str) -> anyhow::Result<Vec<Plot>> {
        self.query_list(
            &format!(
                "SELECT {} FROM plots WHERE project_id = ?1 ORDER BY plot_id",
                PLOT_COLUMNS
            ),
            params![project_id],
            plot_from_row,
        )
    }

    pub fn update_plot(&self, project_id: &str, p: &Plot) -> anyhow::Result<bool> {
        let changed = self.execute(
            "UPDATE plots SET location_name = ?3, description = ?4, latitude = ?5, longitude = ?6,
                elevation = ?7, size = ?8, habitat_type = ?9, notes = ?10, updated_at = ?11
             WHERE project_id = ?1 AND plot_id = ?2",
            params![
                project_id,
                p.plot_id,
                p.location_name,
                p.description,
                p.latitude,
                p.longitude,
                p.elevation,
                p.size,
                p.habitat_type,
                p.notes,
                p.updated_at
            ],
        )?;
        Ok(changed > 0)
    }

    /// A plot with its quadrants and records.
    pub fn get_plot_details(&self, project_id: &str, plot_id: &str) -> anyhow::Result<Option<PlotDetails>> {
        let Some(plot) = self.get_plot(project_id, plot_id)? else {
            return Ok(None);
        };
        Ok(Some(PlotDetails {
            plot,
            quadrants: self.get_quadrants(project_id, Some(plot_id))?,
            records: self.get_records(project_id, Some(plot_id))?,
        }))
    }

    /// Delete a plot together with its quadrants, subplots, records and
    /// cover observations. Returns false when the plot is not stored.
    pub fn delete_plot(&self, project_id: &str, plot_id: &str) -> anyhow::Result<bool> {
        let mut conn = self.conn.borrow_mut();
        let tx = conn.transaction()?;
        for table in ["quadrants", "subplots", "records", "canopy_cover"] {
            let removed = tx.execute(
                &format!("DELETE FROM {} WHERE project_id = ?1 AND plot_id = ?2", table),
                params![project_id, plot_id],
            )?;
            log::debug!("query: delete_plot {} removed {} from {}", plot_id, removed, table);
        }
        let deleted = tx.execute(
            "DELETE FROM plots WHERE project_id = ?1 AND plot_id = ?2",
            params![project_id, plot_id],
        )?;
        tx.commit()?;
        Ok(deleted > 0)
    }

    // ───────────────────── Quadrants & subplots ─────────────────────

    pub fn add_quadrant(&self, project_id: &str, quadrant: &Quadrant) -> anyhow::Result<()> {
        insert_quadrant(&self.conn.borrow(), project_id, quadrant, OnConflict::Fail)?;
        Ok(())
    }

    pub fn get_quadrant(&self, project_id: &str, id: &str) -> anyhow::Result<Option<Quadrant>> {
        self.query_one(
            &format!(
                "SELECT {} FROM quadrants WHERE project_id = ?1 AND id = ?2",
                QUADRANT_COLUMNS
            ),
            params![project_id, id],
            quadrant_from_row,
        )
    }

    pub fn get_quadrants(&self, project_id: &str, plot_id: Option<&str>) -> anyhow::Result<Vec<Quadrant>> {
        self.query_list(
            &format!(
                "SELECT {} FROM quadrants
                 WHERE project_id = ?1 AND (?2 IS NULL OR plot_id = ?2)
                 ORDER BY plot_id, quadrant_id",
                QUADRANT_COLUMNS
            ),
            params![project_id, plot_id],
            quadrant_from_row,
        )
    }

    pub fn update_quadrant(&self, project_id: &str, q: &Quadrant) -> anyhow::Result<bool> {
        let changed = self.execute(
            "UPDATE quadrants SET description = ?3, notes = ?4, updated_at = ?5
             WHERE project_id = ?1 AND id = ?2",
            params![project_id, q.id, q.description, q.notes, q.updated_at],
        )?;
        Ok(changed > 0)
    }

    pub fn delete_quadrant(&self, project_id: &str, id: &str) -> anyhow::Result<bool> {
        Ok(self.execute(
            "DELETE FROM quadrants WHERE project_id = ?1 AND id = ?2",
            params![project_id, id],
        )? > 0)
    }

    pub fn add_subplot(&self, project_id: &str, subplot: &Subplot) -> anyhow::Result<()> {
        insert_subplot(&self.conn.borrow(), project_id, subplot, OnConflict::Fail)?;
        Ok(())
    }

    pub fn get_subplot(&self, project_id: &str, id: &str) -> anyhow::Result<Option<Subplot>> {
        self.query_one(
            &format!(
                "SELECT {} FROM subplots WHERE project_id = ?1 AND id = ?2",
                SUBPLOT_COLUMNS
            ),
            params![project_id, id],
            subplot_from_row,
        )
    }

    pub fn get_subplots(&self, project_id: &str, plot_id: Option<&str>) -> anyhow::Result<Vec<Subplot>> {
        self.query_list(
            &format!(
                "SELECT {} FROM subplots
                 WHERE project_id = ?1 AND (?2 IS NULL OR plot_id = ?2)
                 ORDER BY plot_id, subplot_id",
                SUBPLOT_COLUMNS
            ),
            params![project_id, plot_id],
            subplot_from_row,
        )
    }

    pub fn update_subplot(&self, project_id: &str, s: &Subplot) -> anyhow::Result<bool> {
        let changed = self.execute(
            "UPDATE subplots SET quadrant_id = ?3, layer_type = ?4, species_category = ?5,
                cover_percentage = ?6, avg_height = ?7, notes = ?8, updated_at = ?9
             WHERE project_id = ?1 AND id = ?2",
            params![
                project_id,
                s.id,
                s.quadrant_id,
                s.layer_type,
                s.species_category,
                s.cover_percentage,
                s.avg_height,
                s.notes,
                s.updated_at
            ],
        )?;
        Ok(changed > 0)
    }

    pub fn delete_subplot(&self, project_id: &str, id: &str) -> anyhow::Result<bool> {
        Ok(self.execute(
            "DELETE FROM subplots WHERE project_id = ?1 AND id = ?2",
            params![project_id, id],
        )? > 0)
    }

    // ───────────────────── Species & records ─────────────────────

    pub fn add_species(&self, project_id: &str, species: &Species) -> anyhow::Result<()> {
        insert_species(&self.conn.borrow(), project_id, species, OnConflict::Fail)?;
        Ok(())
    }

    pub fn get_species_by_id(&self, project_id: &str, id: &str) -> anyhow::Result<Option<Species>> {
        self.query_one(
            &format!(
                "SELECT {} FROM species WHERE project_id = ?1 AND id = ?2",
                SPECIES_COLUMNS
            ),
            params![project_id, id],
            species_from_row,
        )
    }

    pub fn get_species(&self, project_id: &str) -> anyhow::Result<Vec<Species>> {
        self.query_list(
            &format!(
                "SELECT {} FROM species WHERE project_id = ?1 ORDER BY scientific_name",
                SPECIES_COLUMNS
            ),
            params![project_id],
            species_from_row,
        )
    }

    pub fn update_species(&self, project_id: &str, s: &Species) -> anyhow::Result<bool> {
        let changed = self.execute(
            "UPDATE species SET scientific_name = ?3, common_name = ?4, growth_form = ?5, family = ?6
             WHERE project_id = ?1 AND id = ?2",
            params![project_id, s.id, s.scientific_name, s.common_name, s.growth_form, s.family],
        )?;
        Ok(changed > 0)
    }

    pub fn delete_species(&self, project_id: &str, id: &str) -> anyhow::Result<bool> {
        Ok(self.execute(
            "DELETE FROM species WHERE project_id = ?1 AND id = ?2",
            params![project_id, id],
        )? > 0)
    }

    /// Records in insertion order, optionally for one plot.
    pub fn get_records(&self, project_id: &str, plot_id: Option<&str>) -> anyhow::Result<Vec<SpeciesRecord>> {
        self.query_list(
            &format!(
                "SELECT {} FROM records
                 WHERE project_id = ?1 AND (?2 IS NULL OR plot_id = ?2)
                 ORDER BY rowid",
                RECORD_COLUMNS
            ),
            params![project_id, plot_id],
            record_from_row,
        )
    }

    pub fn get_record(&self, project_id: &str, id: &str) -> anyhow::Result<Option<SpeciesRecord>> {
        self.query_one(
            &format!(
                "SELECT {} FROM records WHERE project_id = ?1 AND id = ?2",
                RECORD_COLUMNS
            ),
            params![project_id, id],
            record_from_row,
        )
    }

    pub fn get_records_by_species(&self, project_id: &str, species_id: &str) -> anyhow::Result<Vec<SpeciesRecord>> {
        self.query_list(
            &format!(
                "SELECT {} FROM records WHERE project_id = ?1 AND species_id = ?2 ORDER BY rowid",
                RECORD_COLUMNS
            ),
            params![project_id, species_id],
            record_from_row,
        )
    }

    pub fn update_record(&self, project_id: &str, r: &SpeciesRecord) -> anyhow::Result<bool> {
        let changed = self.execute(
            "UPDATE records SET species_id = ?3, plot_id = ?4, quadrant_id = ?5, subplot_id = ?6,
                tree_id = ?7, height = ?8, gbh = ?9, total_gbh = ?10, cover_percentage = ?11,
                avg_height = ?12, stems = ?13, condition = ?14, notes = ?15
             WHERE project_id = ?1 AND id = ?2",
            params![
                project_id,
                r.id,
                r.species_id,
                r.plot_id,
                r.quadrant_id,
                r.subplot_id,
                r.tree_id,
                r.height,
                r.gbh,
                r.total_gbh,
                r.cover_percentage,
                r.avg_height,
                r.stems,
                r.condition,
                r.notes
            ],
        )?;
        Ok(changed > 0)
    }

    pub fn delete_record(&self, project_id: &str, id: &str) -> anyhow::Result<bool> {
        Ok(self.execute(
            "DELETE FROM records WHERE project_id = ?1 AND id = ?2",
            params![project_id, id],
        )? > 0)
    }

    // ───────────────────── Canopy cover ─────────────────────

    /// Cover observations in insertion order, optionally for one plot.
    pub fn get_canopy_cover(&self, project_id: &str, plot_id: Option<&str>) -> anyhow::Result<Vec<CanopyCoverData>> {
        self.query_list(
            &format!(
                "SELECT {} FROM canopy_cover
                 WHERE project_id = ?1 AND (?2 IS NULL OR plot_id = ?2)
                 ORDER BY rowid",
                COVER_COLUMNS
            ),
            params![project_id, plot_id],
            cover_from_row,
        )
    }

    pub fn delete_canopy_cover(&self, project_id: &str, id: &str) -> anyhow::Result<bool> {
        Ok(self.execute(
            "DELETE FROM canopy_cover WHERE project_id = ?1 AND id = ?2",
            params![project_id, id],
        )? > 0)
    }

    // ───────────────────── Photo analyses ─────────────────────

    /// Insert or replace an analysis by id.
    pub fn save_analysis(&self, a: &CanopyPhotoAnalysis) -> anyhow::Result<()> {
        self.execute(
            &format!(
                "INSERT OR REPLACE INTO canopy_analyses ({})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                ANALYSIS_COLUMNS
            ),
            params![
                a.id,
                a.plot_id,
                a.quadrant_id,
                a.subplot_id,
                a.image_file_name,
                a.image_url,
                a.canopy_cover_percentage,
                a.estimated_lai,
                a.gap_fraction,
                a.mask_image_url,
                a.segmented_image_url,
                a.notes,
                a.analysis_date,
                a.created_at,
                a.updated_at
            ],
        )?;
        Ok(())
    }

    pub fn get_analysis(&self, id: &str) -> anyhow::Result<Option<CanopyPhotoAnalysis>> {
        self.query_one(
            &format!("SELECT {} FROM canopy_analyses WHERE id = ?1", ANALYSIS_COLUMNS),
            params![id],
            analysis_from_row,
        )
    }

    /// Analyses newest first, optionally for one plot.
    pub fn get_analyses(&self, plot_id: Option<&str>) -> anyhow::Result<Vec<CanopyPhotoAnalysis>> {
        self.query_list(
            &format!(
                "SELECT {} FROM canopy_analyses
                 WHERE ?1 IS NULL OR plot_id = ?1
                 ORDER BY analysis_date DESC, id",
                ANALYSIS_COLUMNS
            ),
            params![plot_id],
            analysis_from_row,
        )
    }

    pub fn delete_analysis(&self, id: &str) -> anyhow::Result<bool> {
        Ok(self.execute("DELETE FROM canopy_analyses WHERE id = ?1", params![id])? > 0)
    }
}
